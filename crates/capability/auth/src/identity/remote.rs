//! GoTrue 兼容的远端身份服务。

use super::{
    AuthChangeEvent, EVENT_CHANNEL_CAPACITY, IdentityError, IdentityProvider, IdentitySession,
    IdentityUser, OAuthProvider,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::sync::RwLock;
use tokio::sync::broadcast;

const API_KEY_HEADER: &str = "apikey";

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<RemoteUser> for IdentityUser {
    fn from(user: RemoteUser) -> Self {
        IdentityUser {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix 秒
    #[serde(default)]
    expires_at: Option<i64>,
    user: RemoteUser,
}

impl RemoteTokenResponse {
    fn into_session(self) -> IdentitySession {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at.saturating_mul(1000),
            (None, Some(ttl)) => domain::now_epoch_ms() + ttl.saturating_mul(1000),
            (None, None) => domain::now_epoch_ms(),
        };
        IdentitySession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.into(),
        }
    }
}

/// 远端身份服务客户端。
pub struct RemoteIdentityProvider {
    client: Client,
    base_url: String,
    anon_key: String,
    current: RwLock<Option<IdentitySession>>,
    events: broadcast::Sender<AuthChangeEvent>,
}

impl RemoteIdentityProvider {
    /// `base_url` 为服务根地址（不含 `/auth/v1`）。
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            current: RwLock::new(None),
            events,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// OAuth 授权地址。
    pub fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<Url, IdentityError> {
        let mut params = vec![("provider", provider.as_str())];
        if let Some(redirect_to) = redirect_to {
            params.push(("redirect_to", redirect_to));
        }
        Url::parse_with_params(&self.endpoint("authorize"), &params)
            .map_err(|err| IdentityError::Backend(err.to_string()))
    }

    /// PKCE 授权地址；回调带回的 `code` 用 [`Self::exchange_code_for_session`] 换取会话。
    pub fn pkce_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
        code_challenge: &str,
    ) -> Result<Url, IdentityError> {
        let mut url = self.authorize_url(provider, redirect_to)?;
        url.query_pairs_mut()
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }

    /// 用授权码与 PKCE verifier 换取会话，成功后广播 `SignedIn`。
    pub async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<IdentitySession, IdentityError> {
        let response = self
            .token_request(
                "pkce",
                json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
            )
            .send()
            .await
            .map_err(backend_error)?;
        let session = read_session(response, IdentityError::InvalidToken).await?;
        self.set_current(Some(session.clone()))?;
        self.emit(AuthChangeEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// 接受隐式流程回调（`#access_token=...&refresh_token=...`），
    /// 经 `get_user` 确认 token 后建立会话并广播 `SignedIn`。
    pub async fn set_session_from_callback(
        &self,
        callback: &str,
    ) -> Result<IdentitySession, IdentityError> {
        let tokens = parse_callback(callback)?;
        let user = self.get_user(&tokens.access_token).await?;
        let session = tokens.into_session(user);
        self.set_current(Some(session.clone()))?;
        self.emit(AuthChangeEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// 用当前会话的 refresh token 轮换会话并广播 `TokenRefreshed`。
    pub async fn refresh_session(&self) -> Result<IdentitySession, IdentityError> {
        let refresh_token = self
            .get_session()
            .await?
            .and_then(|session| session.refresh_token)
            .ok_or(IdentityError::InvalidToken)?;
        let response = self
            .token_request("refresh_token", json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(backend_error)?;
        let session = read_session(response, IdentityError::InvalidToken).await?;
        self.set_current(Some(session.clone()))?;
        self.emit(AuthChangeEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    fn token_request(&self, grant_type: &str, body: serde_json::Value) -> RequestBuilder {
        self.client
            .post(self.endpoint("token"))
            .query(&[("grant_type", grant_type)])
            .header(API_KEY_HEADER, &self.anon_key)
            .json(&body)
    }

    fn set_current(&self, session: Option<IdentitySession>) -> Result<(), IdentityError> {
        *self
            .current
            .write()
            .map_err(|_| IdentityError::Backend("lock failed".to_string()))? = session;
        Ok(())
    }

    /// 只清除与登出 token 匹配的当前会话。
    fn clear_current_if(&self, access_token: &str) -> Result<(), IdentityError> {
        let mut current = self
            .current
            .write()
            .map_err(|_| IdentityError::Backend("lock failed".to_string()))?;
        if current
            .as_ref()
            .is_some_and(|session| session.access_token == access_token)
        {
            *current = None;
        }
        Ok(())
    }

    fn emit(&self, event: AuthChangeEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentityProvider {
    async fn get_session(&self) -> Result<Option<IdentitySession>, IdentityError> {
        Ok(self
            .current
            .read()
            .map_err(|_| IdentityError::Backend("lock failed".to_string()))?
            .clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChangeEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentitySession, IdentityError> {
        let response = self
            .token_request("password", json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(backend_error)?;
        let session = read_session(response, IdentityError::InvalidCredentials).await?;
        self.set_current(Some(session.clone()))?;
        self.emit(AuthChangeEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<String, IdentityError> {
        Ok(self.authorize_url(provider, redirect_to)?.to_string())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(self.endpoint("logout"))
            .header(API_KEY_HEADER, &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(backend_error)?;
        let status = response.status();
        // 已失效的 token 视为已登出
        if !status.is_success() && status != StatusCode::UNAUTHORIZED {
            return Err(status_error(status));
        }
        self.clear_current_if(access_token)?;
        self.emit(AuthChangeEvent::SignedOut);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<IdentityUser, IdentityError> {
        let response = self
            .client
            .get(self.endpoint("user"))
            .header(API_KEY_HEADER, &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(backend_error)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IdentityError::InvalidToken);
        }
        if !status.is_success() {
            return Err(status_error(status));
        }
        let user: RemoteUser = response.json().await.map_err(backend_error)?;
        Ok(user.into())
    }

    async fn update_user_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<IdentityUser, IdentityError> {
        let response = self
            .client
            .put(self.endpoint("user"))
            .header(API_KEY_HEADER, &self.anon_key)
            .bearer_auth(access_token)
            .json(&json!({ "password": new_password }))
            .send()
            .await
            .map_err(backend_error)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IdentityError::InvalidToken);
        }
        if !status.is_success() {
            return Err(status_error(status));
        }
        let user: IdentityUser = response.json::<RemoteUser>().await.map_err(backend_error)?.into();
        self.emit(AuthChangeEvent::UserUpdated(user.clone()));
        Ok(user)
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), IdentityError> {
        let mut request = self
            .client
            .post(self.endpoint("recover"))
            .header(API_KEY_HEADER, &self.anon_key)
            .json(&json!({ "email": email }));
        if let Some(redirect_to) = redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        let response = request.send().await.map_err(backend_error)?;
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }
        Ok(())
    }
}

/// 读取 token 接口响应；400/401 映射为 `rejected`。
async fn read_session(
    response: Response,
    rejected: IdentityError,
) -> Result<IdentitySession, IdentityError> {
    let status = response.status();
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
        return Err(rejected);
    }
    if !status.is_success() {
        return Err(status_error(status));
    }
    let body: RemoteTokenResponse = response.json().await.map_err(backend_error)?;
    Ok(body.into_session())
}

/// OAuth 回调携带的 token。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    /// Unix 秒
    pub expires_at: Option<i64>,
}

impl CallbackTokens {
    fn into_session(self, user: IdentityUser) -> IdentitySession {
        RemoteTokenResponse {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
            expires_at: self.expires_at,
            user: RemoteUser {
                id: user.id,
                email: user.email,
            },
        }
        .into_session()
    }
}

/// 解析回调 fragment 或 query 串（可带前导 `#` / `?`）。
///
/// 回调带 `error` 时返回其描述。
pub fn parse_callback(callback: &str) -> Result<CallbackTokens, IdentityError> {
    let params = callback.trim_start_matches(['#', '?']);
    let url = Url::parse(&format!("http://callback/?{params}"))
        .map_err(|err| IdentityError::Backend(err.to_string()))?;
    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_in = None;
    let mut expires_at = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "refresh_token" => refresh_token = Some(value.into_owned()),
            "expires_in" => expires_in = value.parse().ok(),
            "expires_at" => expires_at = value.parse().ok(),
            "error_description" => error = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = error {
        return Err(IdentityError::Backend(error));
    }
    let access_token = access_token
        .filter(|token| !token.is_empty())
        .ok_or(IdentityError::InvalidToken)?;
    Ok(CallbackTokens {
        access_token,
        refresh_token: refresh_token.filter(|token| !token.is_empty()),
        expires_in,
        expires_at,
    })
}

fn backend_error(err: reqwest::Error) -> IdentityError {
    IdentityError::Backend(err.to_string())
}

fn status_error(status: StatusCode) -> IdentityError {
    IdentityError::Backend(format!("identity service returned {status}"))
}
