use domain::{LoginAction, Role, UNKNOWN_USER_ID};
use souk_auth::{
    AuthService, ClientInfo, GENERIC_ERROR, INVALID_CURRENT_PASSWORD, INVALID_EMAIL_OR_PASSWORD,
    INVALID_TOKEN, INVALID_USERNAME_OR_PASSWORD, IdentityProvider, JwtManager,
    LocalIdentityProvider, LoginFailure, hash_password,
};
use souk_storage::{InMemoryLoginAttemptStore, InMemoryUserStore, UserRecord, UserStore};
use std::sync::Arc;

struct Fixture {
    identity: Arc<LocalIdentityProvider>,
    users: Arc<InMemoryUserStore>,
    attempts: Arc<InMemoryLoginAttemptStore>,
    service: AuthService,
}

fn record(id: &str, email: &str, username: &str, role: Role) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        email: email.to_string(),
        username: username.to_string(),
        full_name: None,
        phone: None,
        role,
        retailer_id: None,
        is_active: true,
        preferred_language: "en".to_string(),
        last_login_at: None,
        login_count: 0,
        password_hash: None,
        temp_password: None,
        must_change_password: false,
        created_at: 0,
        updated_at: 0,
    }
}

/// jane：已迁移的零售商；admin：仍使用临时口令；idle：已停用。
fn fixture() -> Fixture {
    let identity = Arc::new(LocalIdentityProvider::new(
        JwtManager::new("test-secret".to_string(), 3600),
        "http://localhost:9999",
    ));
    identity
        .register_with_id("user-jane", "jane@souk.dz", Some("secret123"))
        .expect("register jane");
    identity
        .register_with_id("user-idle", "idle@souk.dz", Some("secret123"))
        .expect("register idle");

    let mut jane = record("user-jane", "jane@souk.dz", "jane", Role::Retailer);
    jane.password_hash = Some(hash_password("secret123").expect("hash"));
    let mut admin = record("user-admin", "admin@souk.dz", "admin", Role::Admin);
    admin.temp_password = Some("admin123".to_string());
    let mut idle = record("user-idle", "idle@souk.dz", "idle", Role::Retailer);
    idle.is_active = false;

    let users = Arc::new(InMemoryUserStore::with_users(vec![jane, admin, idle]));
    let attempts = Arc::new(InMemoryLoginAttemptStore::new());
    let service = AuthService::new(identity.clone(), users.clone(), attempts.clone());
    Fixture {
        identity,
        users,
        attempts,
        service,
    }
}

fn client() -> ClientInfo {
    ClientInfo::new("10.0.0.1", Some("test-agent".to_string()))
}

#[tokio::test]
async fn identity_login_stamps_user_and_audits() {
    let fx = fixture();
    let result = fx
        .service
        .login_with_supabase("jane@souk.dz", "secret123", &client())
        .await;

    assert!(result.success);
    assert!(result.token.is_some());
    assert!(result.expires_at.is_some());
    assert!(!result.requires_password_change);
    let user = result.user.expect("user");
    assert_eq!(user.id, "user-jane");
    assert_eq!(user.login_count, 1);
    assert!(user.last_login_at.is_some());

    let stored = fx.users.find_by_id("user-jane").await.expect("query").expect("jane");
    assert_eq!(stored.login_count, 1);

    let attempts = fx.attempts.all();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].user_id, "user-jane");
    assert_eq!(attempts[0].ip_address, "10.0.0.1");
    assert_eq!(attempts[0].user_agent.as_deref(), Some("test-agent"));
    assert!(attempts[0].success);
    assert_eq!(attempts[0].action, LoginAction::Login);
}

#[tokio::test]
async fn inactive_user_fails_like_bad_credentials_and_signs_out() {
    let fx = fixture();
    let inactive = fx
        .service
        .login_with_supabase("idle@souk.dz", "secret123", &client())
        .await;
    let wrong = fx
        .service
        .login_with_supabase("jane@souk.dz", "wrong", &client())
        .await;

    assert!(!inactive.success);
    assert_eq!(inactive.message.as_deref(), Some(INVALID_EMAIL_OR_PASSWORD));
    assert_eq!(inactive.failure, Some(LoginFailure::AccountUnavailable));
    assert!(inactive.token.is_none());

    assert_eq!(wrong.message, inactive.message);
    assert_eq!(wrong.failure, Some(LoginFailure::InvalidCredentials));

    // 不能遗留没有应用用户的身份会话
    assert_eq!(fx.identity.get_session().await.expect("session"), None);

    let attempts = fx.attempts.all();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].user_id, "user-idle");
    assert_eq!(attempts[1].user_id, UNKNOWN_USER_ID);
    assert!(attempts.iter().all(|attempt| !attempt.success));
}

#[tokio::test]
async fn identity_login_with_store_offline_is_a_backend_error() {
    let fx = fixture();
    fx.users.set_offline(true);
    let result = fx
        .service
        .login_with_supabase("jane@souk.dz", "secret123", &client())
        .await;
    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some(GENERIC_ERROR));
    assert_eq!(result.failure, Some(LoginFailure::Backend));
}

#[tokio::test]
async fn legacy_login_failure_messages_are_identical() {
    let fx = fixture();
    let ghost = fx
        .service
        .login_with_credentials("ghost_user", "whatever", &client())
        .await;
    let wrong = fx
        .service
        .login_with_credentials("jane", "wrong_password", &client())
        .await;

    assert!(!ghost.success);
    assert!(!wrong.success);
    assert_eq!(ghost.message.as_deref(), Some(INVALID_USERNAME_OR_PASSWORD));
    assert_eq!(ghost.message, wrong.message);
    assert_eq!(ghost.user.is_none(), wrong.user.is_none());
    assert_eq!(ghost.token, wrong.token);

    let attempts = fx.attempts.all();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].user_id, UNKNOWN_USER_ID);
    assert_eq!(attempts[1].user_id, "user-jane");
}

#[tokio::test]
async fn legacy_temp_password_login_flags_password_change() {
    let fx = fixture();
    let result = fx
        .service
        .login_with_credentials("admin", "admin123", &client())
        .await;

    assert!(result.success);
    assert!(result.requires_password_change);
    assert!(result.token.is_none());
    let stored = fx.users.find_by_id("user-admin").await.expect("query").expect("admin");
    assert!(stored.must_change_password);
    assert!(fx.attempts.all()[0].success);
}

#[tokio::test]
async fn legacy_login_rejects_inactive_accounts() {
    let fx = fixture();
    let result = fx
        .service
        .login_with_credentials("idle", "anything", &client())
        .await;
    assert_eq!(result.message.as_deref(), Some(INVALID_USERNAME_OR_PASSWORD));
    assert_eq!(result.failure, Some(LoginFailure::AccountUnavailable));
}

#[tokio::test]
async fn username_login_resolves_email() {
    let fx = fixture();
    let ok = fx
        .service
        .login_with_username("jane", "secret123", &client())
        .await;
    assert!(ok.success);
    assert!(ok.token.is_some());

    let wrong = fx
        .service
        .login_with_username("jane", "nope", &client())
        .await;
    let ghost = fx
        .service
        .login_with_username("ghost", "nope", &client())
        .await;
    assert_eq!(wrong.message.as_deref(), Some(INVALID_USERNAME_OR_PASSWORD));
    assert_eq!(ghost.message, wrong.message);

    let lookup = fx
        .service
        .lookup_login_email("admin")
        .await
        .expect("lookup")
        .expect("admin");
    assert_eq!(lookup.email, "admin@souk.dz");
    assert!(lookup.needs_migration);
    assert!(fx.service.lookup_login_email("  ").await.expect("lookup").is_none());
}

#[tokio::test]
async fn token_validation_rechecks_application_user() {
    let fx = fixture();
    let login = fx
        .service
        .login_with_supabase("jane@souk.dz", "secret123", &client())
        .await;
    let token = login.token.expect("token");

    let valid = fx.service.validate_supabase_token(&token).await;
    assert!(valid.valid);
    assert_eq!(valid.user.expect("user").id, "user-jane");

    let garbage = fx.service.validate_token("garbage").await;
    assert!(!garbage.valid);
    assert_eq!(garbage.error.as_deref(), Some(INVALID_TOKEN));
    assert_eq!(garbage.failure, Some(LoginFailure::InvalidToken));

    // 身份 token 仍有效，但应用用户已停用
    let idle = fx
        .identity
        .sign_in_with_password("idle@souk.dz", "secret123")
        .await
        .expect("identity sign in");
    let inactive = fx.service.validate_token(&idle.access_token).await;
    assert!(!inactive.valid);
    assert_eq!(inactive.failure, Some(LoginFailure::AccountUnavailable));
}

#[tokio::test]
async fn logout_audits_resolved_user_only() {
    let fx = fixture();
    let login = fx
        .service
        .login_with_supabase("jane@souk.dz", "secret123", &client())
        .await;
    let token = login.token.expect("token");

    let result = fx.service.logout_supabase(&token, &client()).await;
    assert!(result.success);
    assert!(!fx.service.validate_token(&token).await.valid);

    let attempts = fx.attempts.all();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1].action, LoginAction::Logout);
    assert_eq!(attempts[1].user_id, "user-jane");

    // 无法解析用户时仍然登出，但不写审计
    let result = fx.service.logout_supabase("garbage", &client()).await;
    assert!(result.success);
    assert_eq!(fx.attempts.all().len(), 2);
}

#[tokio::test]
async fn identity_password_change_clears_flag() {
    let fx = fixture();
    fx.users
        .set_must_change_password("user-jane", true)
        .await
        .expect("flag");
    let login = fx
        .service
        .login_with_supabase("jane@souk.dz", "secret123", &client())
        .await;
    assert!(login.requires_password_change);
    let token = login.token.expect("token");

    let weak = fx
        .service
        .change_password_supabase(&token, "123", &client())
        .await;
    assert!(!weak.success);
    assert_eq!(weak.failure, Some(LoginFailure::WeakPassword));

    let changed = fx
        .service
        .change_password_supabase(&token, "brand-new-secret", &client())
        .await;
    assert!(changed.success);
    let stored = fx.users.find_by_id("user-jane").await.expect("query").expect("jane");
    assert!(!stored.must_change_password);

    let relogin = fx
        .service
        .login_with_supabase("jane@souk.dz", "brand-new-secret", &client())
        .await;
    assert!(relogin.success);

    let bad_token = fx
        .service
        .change_password_supabase("garbage", "brand-new-secret", &client())
        .await;
    assert_eq!(bad_token.message, GENERIC_ERROR);
    assert_eq!(bad_token.failure, Some(LoginFailure::InvalidToken));

    let change = fx.attempts.all().into_iter().rev().nth(1).expect("attempt");
    assert_eq!(change.action, LoginAction::PasswordChange);
    assert!(change.success);
}

#[tokio::test]
async fn legacy_password_change_migrates_temp_password() {
    let fx = fixture();
    let wrong = fx
        .service
        .change_password("user-admin", "not-it", "brand-new-secret", &client())
        .await;
    assert!(!wrong.success);
    assert_eq!(wrong.message, INVALID_CURRENT_PASSWORD);

    let missing = fx
        .service
        .change_password("user-ghost", "admin123", "brand-new-secret", &client())
        .await;
    assert_eq!(missing.message, wrong.message);

    let changed = fx
        .service
        .change_password("user-admin", "admin123", "brand-new-secret", &client())
        .await;
    assert!(changed.success);

    let stored = fx.users.find_by_id("user-admin").await.expect("query").expect("admin");
    assert!(stored.password_hash.is_some());
    assert!(stored.temp_password.is_none());
    assert!(!stored.must_change_password);

    let old = fx
        .service
        .login_with_credentials("admin", "admin123", &client())
        .await;
    assert!(!old.success);
    let new = fx
        .service
        .login_with_credentials("admin", "brand-new-secret", &client())
        .await;
    assert!(new.success);
    assert!(!new.requires_password_change);
}

#[tokio::test]
async fn password_reset_always_reports_success() {
    let fx = fixture();
    let known = fx.service.request_password_reset("jane@souk.dz", None).await;
    let unknown = fx
        .service
        .request_password_reset("ghost@souk.dz", Some("http://localhost:3000/reset"))
        .await;
    assert!(known.success);
    assert_eq!(known, unknown);
    assert_eq!(fx.identity.reset_requests().len(), 2);
}

#[tokio::test]
async fn attempts_listed_newest_first() {
    let fx = fixture();
    for _ in 0..3 {
        fx.service
            .login_with_credentials("jane", "wrong", &client())
            .await;
    }
    let attempts = fx
        .service
        .list_login_attempts("user-jane", 2)
        .await
        .expect("list");
    assert_eq!(attempts.len(), 2);
    assert!(attempts[0].ts_ms >= attempts[1].ts_ms);
}
