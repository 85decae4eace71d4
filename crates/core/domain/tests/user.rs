use domain::{AppUser, RequestIdentity, Role};

fn user(role: Role) -> AppUser {
    AppUser {
        id: "user-1".to_string(),
        email: "jane@example.dz".to_string(),
        username: "jane".to_string(),
        full_name: None,
        phone: None,
        role,
        retailer_id: Some("retailer-1".to_string()),
        is_active: true,
        preferred_language: "en".to_string(),
        last_login_at: None,
        login_count: 0,
        created_at: 0,
        updated_at: 0,
    }
}

#[test]
fn role_flags_are_exclusive() {
    assert!(user(Role::Admin).is_admin());
    assert!(!user(Role::Admin).is_retailer());
    assert!(user(Role::Retailer).is_retailer());

    let driver = user(Role::Driver);
    assert!(!driver.is_admin());
    assert!(!driver.is_retailer());
}

#[test]
fn cached_user_json_uses_camel_case() {
    let json = serde_json::to_value(user(Role::Retailer)).expect("json");
    assert_eq!(json["retailerId"], "retailer-1");
    assert_eq!(json["role"], "retailer");
    assert_eq!(json["preferredLanguage"], "en");
}

#[test]
fn request_identity_copies_role_and_retailer() {
    let identity = RequestIdentity::from_user(&user(Role::Retailer));
    assert_eq!(identity.user_id, "user-1");
    assert_eq!(identity.role, Role::Retailer);
    assert_eq!(identity.retailer_id.as_deref(), Some("retailer-1"));
}
