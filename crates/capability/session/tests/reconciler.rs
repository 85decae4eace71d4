use async_trait::async_trait;
use domain::{AppUser, AuthMode, Retailer, RetailerAddress, RetailerStatus, Role};
use souk_auth::{
    AuthChangeEvent, IdentityProvider, JwtManager, LocalIdentityProvider, OAuthProvider,
};
use souk_session::{AuthReconciler, AuthState, LOGIN_UNAVAILABLE, ReconcilerOptions, TokenStorage};
use souk_storage::{
    InMemoryRetailerStore, InMemoryUserStore, LoginLookup, NewUser, StorageError, UserRecord,
    UserStore,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

fn record(id: &str, username: &str, role: Role, retailer_id: Option<&str>) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        email: format!("{username}@souk.dz"),
        username: username.to_string(),
        full_name: None,
        phone: None,
        role,
        retailer_id: retailer_id.map(str::to_string),
        is_active: true,
        preferred_language: "ar".to_string(),
        last_login_at: None,
        login_count: 0,
        password_hash: None,
        temp_password: None,
        must_change_password: false,
        created_at: 0,
        updated_at: 0,
    }
}

fn retailer(id: &str) -> Retailer {
    Retailer {
        id: id.to_string(),
        business_name: "Epicerie Atlas".to_string(),
        business_type: Some("grocery".to_string()),
        registration_number: None,
        tax_number: None,
        contact_email: None,
        contact_phone: None,
        address: RetailerAddress {
            city: Some("Oran".to_string()),
            ..RetailerAddress::default()
        },
        credit_limit: 50_000.0,
        current_balance: 0.0,
        status: RetailerStatus::Active,
        approved_by: None,
        approved_at: None,
        documents: Vec::new(),
        metadata: BTreeMap::new(),
        created_at: 0,
        updated_at: 0,
    }
}

fn identity() -> Arc<LocalIdentityProvider> {
    Arc::new(LocalIdentityProvider::new(
        JwtManager::new("test-secret".to_string(), 3600),
        "http://localhost:9999",
    ))
}

/// 认证状态的互斥不变式。
fn assert_consistent(state: &AuthState) {
    assert_eq!(
        state.is_authenticated(),
        state.session().is_some() || state.token().is_some()
    );
    assert!(!(state.session().is_some() && state.token().is_some()));
    match state.auth_mode() {
        AuthMode::OAuth => assert!(state.token().is_none()),
        AuthMode::Jwt => assert!(state.session().is_none()),
        AuthMode::None => assert!(!state.is_authenticated()),
    }
    if state.retailer().is_some() {
        assert!(state.user().and_then(|user| user.retailer_id.as_ref()).is_some());
    }
    assert!(!(state.is_admin() && state.is_retailer()));
}

struct Setup {
    identity: Arc<LocalIdentityProvider>,
    users: Arc<InMemoryUserStore>,
    retailers: Arc<InMemoryRetailerStore>,
    storage: TokenStorage,
}

impl Setup {
    fn new(users: Vec<UserRecord>, retailers: Vec<Retailer>) -> Self {
        Self {
            identity: identity(),
            users: Arc::new(InMemoryUserStore::with_users(users)),
            retailers: Arc::new(InMemoryRetailerStore::with_retailers(retailers)),
            storage: TokenStorage::in_memory(),
        }
    }

    fn reconciler(&self) -> AuthReconciler {
        self.reconciler_with(ReconcilerOptions::default())
    }

    fn reconciler_with(&self, options: ReconcilerOptions) -> AuthReconciler {
        AuthReconciler::new(
            self.identity.clone(),
            self.users.clone(),
            self.retailers.clone(),
            self.storage.clone(),
            options,
        )
    }

    async fn sign_in(&self, id: &str, email: &str) {
        self.identity
            .register_with_id(id, email, Some("secret123"))
            .expect("register");
        self.identity
            .sign_in_with_password(email, "secret123")
            .await
            .expect("sign in");
    }
}

#[tokio::test]
async fn nothing_stored_settles_unauthenticated() {
    let setup = Setup::new(Vec::new(), Vec::new());
    let reconciler = setup.reconciler();
    assert!(reconciler.state().is_loading());

    reconciler.initialize().await;
    let state = reconciler.state();
    assert!(!state.is_loading());
    assert!(!state.is_authenticated());
    assert_eq!(state.auth_mode(), AuthMode::None);
    assert_consistent(&state);
}

#[tokio::test]
async fn oauth_session_provisions_user_once() {
    let setup = Setup::new(Vec::new(), Vec::new());
    setup
        .identity
        .complete_oauth(OAuthProvider::Google, "jane@x.com")
        .expect("oauth");
    let reconciler = setup.reconciler();

    reconciler.initialize().await;
    let state = reconciler.state();
    assert_consistent(&state);
    assert_eq!(state.auth_mode(), AuthMode::OAuth);
    let user = state.user().expect("user").clone();
    assert_eq!(user.username, "jane");
    assert_eq!(user.email, "jane@x.com");
    assert_eq!(user.role, Role::Admin);
    assert!(user.is_active);
    assert_eq!(user.preferred_language, "en");
    assert_eq!(setup.users.len(), 1);

    reconciler.initialize().await;
    assert_eq!(setup.users.len(), 1);
    assert_eq!(reconciler.state().user().expect("user").id, user.id);
}

#[tokio::test]
async fn provisioning_role_is_configurable() {
    let setup = Setup::new(Vec::new(), Vec::new());
    setup
        .identity
        .complete_oauth(OAuthProvider::Facebook, "shop@x.com")
        .expect("oauth");
    let reconciler = setup.reconciler_with(ReconcilerOptions {
        default_oauth_role: Role::Retailer,
        ..ReconcilerOptions::default()
    });
    reconciler.initialize().await;
    assert!(reconciler.state().is_retailer());
}

#[tokio::test]
async fn provisioning_failure_leaves_unauthenticated() {
    let setup = Setup::new(Vec::new(), Vec::new());
    setup
        .identity
        .complete_oauth(OAuthProvider::Google, "jane@x.com")
        .expect("oauth");
    setup.users.set_offline(true);
    let reconciler = setup.reconciler();
    reconciler.initialize().await;
    let state = reconciler.state();
    assert!(!state.is_authenticated());
    assert!(!state.is_loading());
}

#[tokio::test]
async fn missing_retailer_does_not_block_authentication() {
    let setup = Setup::new(
        vec![record("user-1", "shop", Role::Retailer, Some("ret-missing"))],
        Vec::new(),
    );
    setup.sign_in("user-1", "shop@souk.dz").await;
    let reconciler = setup.reconciler();

    reconciler.initialize().await;
    let state = reconciler.state();
    assert!(state.is_authenticated());
    assert!(state.is_retailer());
    assert!(state.retailer().is_none());
    assert_consistent(&state);

    setup.retailers.set_offline(true);
    reconciler.refresh_user().await;
    assert!(reconciler.state().is_authenticated());
}

#[tokio::test]
async fn linked_retailer_loaded_after_user() {
    let setup = Setup::new(
        vec![record("user-1", "shop", Role::Retailer, Some("ret-1"))],
        vec![retailer("ret-1")],
    );
    setup.sign_in("user-1", "shop@souk.dz").await;
    let reconciler = setup.reconciler();
    reconciler.initialize().await;
    let state = reconciler.state();
    assert_eq!(
        state.retailer().map(|retailer| retailer.business_name.as_str()),
        Some("Epicerie Atlas")
    );
    assert_consistent(&state);
}

#[tokio::test]
async fn inactive_user_is_unauthenticated() {
    let mut idle = record("user-1", "idle", Role::Admin, None);
    idle.is_active = false;
    let setup = Setup::new(vec![idle], Vec::new());
    setup.sign_in("user-1", "idle@souk.dz").await;
    let reconciler = setup.reconciler();
    reconciler.initialize().await;
    assert!(!reconciler.state().is_authenticated());
}

fn cached_user() -> AppUser {
    record("user-9", "driver", Role::Driver, None).to_app_user()
}

#[tokio::test]
async fn cached_token_uses_jwt_branch() {
    let setup = Setup::new(Vec::new(), Vec::new());
    setup.storage.store_auth_token("local-token");
    setup.storage.store_user_data(&cached_user());
    let reconciler = setup.reconciler();

    reconciler.initialize().await;
    let state = reconciler.state();
    assert_consistent(&state);
    assert_eq!(state.auth_mode(), AuthMode::Jwt);
    assert_eq!(state.token(), Some("local-token"));
    // driver 既不是 admin 也不是 retailer
    assert!(!state.is_admin());
    assert!(!state.is_retailer());

    // 与 JWT 无关的 OAuth 登出事件不清除状态
    reconciler.handle_event(AuthChangeEvent::SignedOut).await;
    assert_eq!(reconciler.state().auth_mode(), AuthMode::Jwt);

    reconciler.logout().await;
    assert!(!reconciler.state().is_authenticated());
    assert_eq!(setup.storage.get_auth_token(), None);
    assert_eq!(setup.storage.get_user_data(), None);
}

#[tokio::test]
async fn token_without_cached_user_is_unauthenticated() {
    let setup = Setup::new(Vec::new(), Vec::new());
    setup.storage.store_auth_token("local-token");
    let reconciler = setup.reconciler();
    reconciler.initialize().await;
    assert!(!reconciler.state().is_authenticated());
}

#[tokio::test]
async fn oauth_sign_out_event_clears_state() {
    let setup = Setup::new(vec![record("user-1", "boss", Role::Admin, None)], Vec::new());
    setup.sign_in("user-1", "boss@souk.dz").await;
    let reconciler = setup.reconciler();
    let _subscription = reconciler.start().await;
    assert!(reconciler.state().is_admin());

    let mut states = reconciler.watch();
    states.borrow_and_update();
    let token = reconciler
        .state()
        .session()
        .expect("session")
        .access_token
        .clone();
    setup.identity.sign_out(&token).await.expect("sign out");

    tokio::time::timeout(Duration::from_secs(2), states.changed())
        .await
        .expect("state change")
        .expect("channel open");
    let state = reconciler.state();
    assert!(!state.is_authenticated());
    assert_consistent(&state);
}

#[tokio::test]
async fn sign_in_event_reconciles_via_subscription() {
    let setup = Setup::new(Vec::new(), Vec::new());
    let reconciler = setup.reconciler();
    let subscription = reconciler.start().await;
    assert!(subscription.is_active());
    assert!(!reconciler.state().is_authenticated());

    let mut states = reconciler.watch();
    states.borrow_and_update();
    setup
        .identity
        .complete_oauth(OAuthProvider::Github, "dev@x.com")
        .expect("oauth");
    tokio::time::timeout(Duration::from_secs(2), states.changed())
        .await
        .expect("state change")
        .expect("channel open");
    assert_eq!(reconciler.state().auth_mode(), AuthMode::OAuth);
}

#[tokio::test]
async fn unsubscribed_reconciler_ignores_events() {
    let setup = Setup::new(Vec::new(), Vec::new());
    let reconciler = setup.reconciler();
    let subscription = reconciler.start().await;
    subscription.unsubscribe();

    setup
        .identity
        .complete_oauth(OAuthProvider::Github, "dev@x.com")
        .expect("oauth");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!reconciler.state().is_authenticated());
}

#[tokio::test]
async fn oauth_logout_signs_out_of_identity() {
    let setup = Setup::new(vec![record("user-1", "boss", Role::Admin, None)], Vec::new());
    setup.sign_in("user-1", "boss@souk.dz").await;
    let reconciler = setup.reconciler();
    reconciler.initialize().await;

    reconciler.logout().await;
    assert!(!reconciler.state().is_authenticated());
    assert_eq!(setup.identity.get_session().await.expect("session"), None);
    // 再次登出不报错
    reconciler.logout().await;
}

#[tokio::test]
async fn login_stub_and_oauth_redirect() {
    let setup = Setup::new(Vec::new(), Vec::new());
    let reconciler = setup.reconciler_with(ReconcilerOptions {
        oauth_redirect_to: Some("http://localhost:3000/auth/callback".to_string()),
        ..ReconcilerOptions::default()
    });

    let result = reconciler.login("admin", "admin123").await;
    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some(LOGIN_UNAVAILABLE));

    let url = reconciler
        .login_with_oauth(OAuthProvider::Google)
        .await
        .expect("url");
    assert!(url.contains("provider=google"));
    assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"));
}

/// 按用户 id 注入延迟的用户存储；`create_delay` 作用于建档写入之前。
struct SlowUserStore {
    inner: InMemoryUserStore,
    delays: HashMap<String, Duration>,
    create_delay: Option<Duration>,
}

#[async_trait]
impl UserStore for SlowUserStore {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError> {
        if let Some(delay) = self.delays.get(user_id) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.find_by_id(user_id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        self.inner.find_by_username(username).await
    }

    async fn get_user_for_login(
        &self,
        username: &str,
    ) -> Result<Option<LoginLookup>, StorageError> {
        self.inner.get_user_for_login(username).await
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StorageError> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.create_user(user).await
    }

    async fn record_login(&self, user_id: &str, at_ms: i64) -> Result<bool, StorageError> {
        self.inner.record_login(user_id, at_ms).await
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, StorageError> {
        self.inner.update_password_hash(user_id, password_hash).await
    }

    async fn set_must_change_password(
        &self,
        user_id: &str,
        must_change: bool,
    ) -> Result<bool, StorageError> {
        self.inner.set_must_change_password(user_id, must_change).await
    }
}

#[tokio::test(start_paused = true)]
async fn stale_reconciliation_is_discarded() {
    let identity = identity();
    identity
        .register_with_id("user-a", "a@souk.dz", Some("secret123"))
        .expect("register");
    identity
        .register_with_id("user-b", "b@souk.dz", Some("secret123"))
        .expect("register");
    identity
        .sign_in_with_password("a@souk.dz", "secret123")
        .await
        .expect("sign in");

    let users = Arc::new(SlowUserStore {
        inner: InMemoryUserStore::with_users(vec![
            record("user-a", "a", Role::Admin, None),
            record("user-b", "b", Role::Retailer, None),
        ]),
        delays: HashMap::from([("user-a".to_string(), Duration::from_secs(5))]),
        create_delay: None,
    });
    let reconciler = AuthReconciler::new(
        identity.clone(),
        users,
        Arc::new(InMemoryRetailerStore::new()),
        TokenStorage::in_memory(),
        ReconcilerOptions::default(),
    );

    let before = souk_telemetry::metrics().snapshot().reconcile_discarded;
    let initial = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.initialize().await }
    });
    // 让首次协调先读到会话 A 并卡在慢查询上
    tokio::time::sleep(Duration::from_millis(10)).await;

    let session_b = identity
        .sign_in_with_password("b@souk.dz", "secret123")
        .await
        .expect("sign in");
    reconciler
        .handle_event(AuthChangeEvent::SignedIn(session_b))
        .await;
    assert_eq!(reconciler.state().user().expect("user").id, "user-b");

    initial.await.expect("initial pass");
    let state = reconciler.state();
    assert_eq!(state.user().expect("user").id, "user-b");
    assert!(state.is_retailer());
    assert!(souk_telemetry::metrics().snapshot().reconcile_discarded > before);
}

#[tokio::test(start_paused = true)]
async fn overlapping_provisioning_keeps_session_authenticated() {
    let identity = identity();
    identity
        .register_with_id("user-new", "fresh@souk.dz", Some("secret123"))
        .expect("register");
    identity
        .sign_in_with_password("fresh@souk.dz", "secret123")
        .await
        .expect("sign in");

    let users = Arc::new(SlowUserStore {
        inner: InMemoryUserStore::new(),
        delays: HashMap::new(),
        create_delay: Some(Duration::from_secs(1)),
    });
    let reconciler = AuthReconciler::new(
        identity.clone(),
        users.clone(),
        Arc::new(InMemoryRetailerStore::new()),
        TokenStorage::in_memory(),
        ReconcilerOptions::default(),
    );

    let initial = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.initialize().await }
    });
    // 首次协调卡在建档写入上
    tokio::time::sleep(Duration::from_millis(10)).await;

    let refreshed = identity.refresh_session().expect("refresh");
    reconciler
        .handle_event(AuthChangeEvent::TokenRefreshed(refreshed))
        .await;
    initial.await.expect("initial pass");

    let state = reconciler.state();
    assert_consistent(&state);
    assert!(state.is_authenticated());
    assert_eq!(state.user().expect("user").id, "user-new");
    assert_eq!(state.user().expect("user").username, "fresh");
    assert!(users.find_by_id("user-new").await.expect("lookup").is_some());
}

#[tokio::test]
async fn inactive_cached_user_is_cleared() {
    let setup = Setup::new(Vec::new(), Vec::new());
    let mut user = cached_user();
    user.is_active = false;
    setup.storage.store_auth_token("local-token");
    setup.storage.store_user_data(&user);
    let reconciler = setup.reconciler();

    reconciler.initialize().await;
    let state = reconciler.state();
    assert!(!state.is_loading());
    assert!(!state.is_authenticated());
    assert_eq!(setup.storage.get_auth_token(), None);
    assert_eq!(setup.storage.get_user_data(), None);
}
