use domain::Role;
use souk_storage::{InMemoryUserStore, NewUser, UserStore};

fn new_user(id: &str, username: &str) -> NewUser {
    NewUser {
        id: id.to_string(),
        email: format!("{username}@souk.dz"),
        username: username.to_string(),
        full_name: None,
        role: Role::Retailer,
        retailer_id: None,
        is_active: true,
        preferred_language: "fr".to_string(),
    }
}

#[tokio::test]
async fn find_default_admin() {
    let store = InMemoryUserStore::with_default_admin();
    let user = store
        .find_by_username("admin")
        .await
        .expect("query")
        .expect("admin");
    assert_eq!(user.username, "admin");
    assert_eq!(user.role, Role::Admin);
    assert!(user.must_change_password);
}

#[tokio::test]
async fn get_user_for_login_flags_unmigrated_accounts() {
    let store = InMemoryUserStore::with_default_admin();
    let lookup = store
        .get_user_for_login("admin")
        .await
        .expect("query")
        .expect("lookup");
    assert_eq!(lookup.email, "admin@souk.dz");
    assert!(lookup.needs_migration);

    assert!(store.get_user_for_login("ghost").await.expect("query").is_none());
}

#[tokio::test]
async fn create_user_rejects_duplicates() {
    let store = InMemoryUserStore::new();
    store.create_user(new_user("u-1", "jane")).await.expect("create");
    assert!(store.create_user(new_user("u-1", "other")).await.is_err());
    assert!(store.create_user(new_user("u-2", "jane")).await.is_err());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn record_login_stamps_and_counts() {
    let store = InMemoryUserStore::new();
    store.create_user(new_user("u-1", "jane")).await.expect("create");

    assert!(store.record_login("u-1", 1_000).await.expect("update"));
    assert!(store.record_login("u-1", 2_000).await.expect("update"));
    assert!(!store.record_login("missing", 3_000).await.expect("update"));

    let user = store.find_by_id("u-1").await.expect("query").expect("user");
    assert_eq!(user.last_login_at, Some(2_000));
    assert_eq!(user.login_count, 2);
}

#[tokio::test]
async fn password_update_clears_migration_flags() {
    let store = InMemoryUserStore::with_default_admin();
    let admin = store
        .find_by_username("admin")
        .await
        .expect("query")
        .expect("admin");

    assert!(
        store
            .update_password_hash(&admin.id, "$argon2id$fake")
            .await
            .expect("update")
    );
    let admin = store.find_by_id(&admin.id).await.expect("query").expect("admin");
    assert_eq!(admin.password_hash.as_deref(), Some("$argon2id$fake"));
    assert!(admin.temp_password.is_none());
    assert!(!admin.must_change_password);
}

#[tokio::test]
async fn offline_store_reports_errors() {
    let store = InMemoryUserStore::with_default_admin();
    store.set_offline(true);
    assert!(store.find_by_username("admin").await.is_err());
    store.set_offline(false);
    assert!(store.find_by_username("admin").await.is_ok());
}
