use souk_auth::{
    AuthChangeEvent, IdentityError, IdentityProvider, JwtManager, LocalIdentityProvider,
    OAuthProvider,
};

fn provider() -> LocalIdentityProvider {
    LocalIdentityProvider::new(
        JwtManager::new("test-secret".to_string(), 3600),
        "http://localhost:9999/",
    )
}

#[tokio::test]
async fn password_sign_in_issues_verifiable_token() {
    let identity = provider();
    let account = identity
        .register_with_id("user-1", "Jane@Souk.dz", Some("secret123"))
        .expect("register");
    assert_eq!(account.id, "user-1");

    let session = identity
        .sign_in_with_password("jane@souk.dz", "secret123")
        .await
        .expect("sign in");
    assert_eq!(session.user.id, "user-1");
    assert!(session.expires_at > domain::now_epoch_ms());

    let user = identity.get_user(&session.access_token).await.expect("user");
    assert_eq!(user.id, "user-1");
    assert_eq!(
        identity.get_session().await.expect("session"),
        Some(session)
    );
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let identity = provider();
    identity.register("jane@souk.dz", "secret123").expect("register");

    let wrong = identity.sign_in_with_password("jane@souk.dz", "nope").await;
    let ghost = identity.sign_in_with_password("ghost@souk.dz", "nope").await;
    assert_eq!(wrong, Err(IdentityError::InvalidCredentials));
    assert_eq!(ghost, Err(IdentityError::InvalidCredentials));
}

#[tokio::test]
async fn sign_out_revokes_token_and_emits_event() {
    let identity = provider();
    identity.register("jane@souk.dz", "secret123").expect("register");
    let mut events = identity.subscribe();

    let session = identity
        .sign_in_with_password("jane@souk.dz", "secret123")
        .await
        .expect("sign in");
    assert!(matches!(events.recv().await, Ok(AuthChangeEvent::SignedIn(_))));

    identity.sign_out(&session.access_token).await.expect("sign out");
    assert_eq!(events.recv().await, Ok(AuthChangeEvent::SignedOut));
    assert_eq!(
        identity.get_user(&session.access_token).await,
        Err(IdentityError::InvalidToken)
    );
    assert_eq!(identity.get_session().await.expect("session"), None);
}

#[tokio::test]
async fn garbage_token_is_invalid() {
    let identity = provider();
    let err = identity.get_user("not-a-jwt").await.expect_err("invalid");
    assert!(err.is_token_error());
    // 登出对无效 token 幂等
    identity.sign_out("not-a-jwt").await.expect("sign out");
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() {
    let identity = provider();
    identity.register("jane@souk.dz", "secret123").expect("register");
    let session = identity
        .sign_in_with_password("jane@souk.dz", "secret123")
        .await
        .expect("sign in");

    let other = LocalIdentityProvider::new(JwtManager::new("other".to_string(), 3600), "http://x");
    assert_eq!(
        other.get_user(&session.access_token).await,
        Err(IdentityError::InvalidToken)
    );
}

#[tokio::test]
async fn password_update_changes_credentials() {
    let identity = provider();
    identity.register("jane@souk.dz", "secret123").expect("register");
    let session = identity
        .sign_in_with_password("jane@souk.dz", "secret123")
        .await
        .expect("sign in");

    let mut events = identity.subscribe();
    identity
        .update_user_password(&session.access_token, "better-secret")
        .await
        .expect("update");
    assert!(matches!(events.recv().await, Ok(AuthChangeEvent::UserUpdated(_))));

    assert!(identity.sign_in_with_password("jane@souk.dz", "secret123").await.is_err());
    assert!(identity
        .sign_in_with_password("jane@souk.dz", "better-secret")
        .await
        .is_ok());
}

#[tokio::test]
async fn oauth_flow_builds_url_and_provisions_account() {
    let identity = provider();
    let url = identity
        .sign_in_with_oauth(OAuthProvider::Github, Some("http://localhost:3000/auth/callback"))
        .await
        .expect("url");
    assert!(url.starts_with("http://localhost:9999/authorize?provider=github&redirect_to="));

    let mut events = identity.subscribe();
    let first = identity
        .complete_oauth(OAuthProvider::Github, "new@souk.dz")
        .expect("callback");
    assert!(matches!(events.recv().await, Ok(AuthChangeEvent::SignedIn(_))));
    let second = identity
        .complete_oauth(OAuthProvider::Github, "NEW@souk.dz")
        .expect("callback");
    assert_eq!(first.user.id, second.user.id);

    let refreshed = identity.refresh_session().expect("refresh");
    assert!(matches!(
        events.recv().await,
        Ok(AuthChangeEvent::SignedIn(_))
    ));
    assert!(matches!(
        events.recv().await,
        Ok(AuthChangeEvent::TokenRefreshed(_))
    ));
    assert_eq!(
        identity.get_user(&second.access_token).await,
        Err(IdentityError::InvalidToken)
    );
    assert_eq!(
        identity.get_user(&refreshed.access_token).await.expect("user").id,
        first.user.id
    );
}

#[tokio::test]
async fn reset_requests_are_recorded_for_any_email() {
    let identity = provider();
    identity
        .reset_password_for_email(" Ghost@Souk.dz ", None)
        .await
        .expect("reset");
    assert_eq!(identity.reset_requests(), vec!["ghost@souk.dz".to_string()]);
}

#[test]
fn oauth_provider_parses_case_insensitively() {
    assert_eq!("Google".parse::<OAuthProvider>(), Ok(OAuthProvider::Google));
    assert_eq!(
        "myspace".parse::<OAuthProvider>(),
        Err(IdentityError::UnsupportedProvider("myspace".to_string()))
    );
}
