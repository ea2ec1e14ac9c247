//! Session manager
//!
//! Owns the three persisted session values (access token, refresh token,
//! serialized user) and everything derived from them: unverified JWT claim
//! inspection, role checks, the silent refresh, and the session-expired
//! hook. Login and refresh talk to the API directly rather than through the
//! gateway, because the gateway consults this session for its bearer token.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use common::clock::Clock;
use common::storage::KeyValueStore;

use crate::config::ClientConfig;
use crate::endpoints;
use crate::error::{ApiError, ApiResult};
use crate::gateway::normalize;
use crate::models::{AuthData, LoginRequest, RefreshRequest, Usuario};
use crate::validation;

pub const TOKEN_KEY: &str = "unique_motors_token";
pub const REFRESH_TOKEN_KEY: &str = "unique_motors_refresh_token";
pub const USER_KEY: &str = "unique_motors_user";

/// Refresh the access token this long before its `exp` claim
const REFRESH_MARGIN_SECS: i64 = 5 * 60;

type ExpiredHook = Box<dyn Fn() + Send + Sync>;

/// Authenticated session backed by a [`KeyValueStore`]
pub struct AuthSession {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    on_expired: Mutex<Option<ExpiredHook>>,
}

impl AuthSession {
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        AuthSession {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            store,
            clock,
            on_expired: Mutex::new(None),
        }
    }

    /// Register the hook fired when the session expires (a failed token
    /// refresh). Typically routes the UI to the login screen.
    pub fn set_on_session_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut slot) = self.on_expired.lock() {
            *slot = Some(Box::new(hook));
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: &impl Serialize) -> ApiResult<Value> {
        let resp = self
            .http
            .post(self.url(path))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(ApiError::Network)?;
        normalize(resp).await
    }

    /// Authenticate and persist the session
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<Usuario> {
        validation::validate_email(email)?;
        if password.is_empty() {
            return Err(ApiError::Validation("Password is required".to_string()));
        }

        let body = self
            .post_json(endpoints::LOGIN, &LoginRequest::new(email, password))
            .await?;
        let auth: AuthData =
            serde_json::from_value(body).map_err(|_| ApiError::Parse { status: 0 })?;

        let (Some(token), Some(user)) = (auth.token, auth.user) else {
            return Err(ApiError::Parse { status: 0 });
        };

        self.store.set(TOKEN_KEY, &token);
        if let Some(refresh) = auth.refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, &refresh);
        }
        if let Ok(serialized) = serde_json::to_string(&user) {
            self.store.set(USER_KEY, &serialized);
        }

        info!(email, "login succeeded");
        Ok(user)
    }

    /// Exchange the refresh token for a fresh access token.
    ///
    /// Any failure clears the session and fires the session-expired hook;
    /// the caller always sees [`ApiError::SessionExpired`] in that case.
    pub async fn refresh(&self) -> ApiResult<()> {
        let Some(refresh_token) = self.store.get(REFRESH_TOKEN_KEY) else {
            self.expire();
            return Err(ApiError::SessionExpired);
        };

        let result = self
            .post_json(endpoints::LOGIN_REFRESH, &RefreshRequest::new(&refresh_token))
            .await
            .and_then(|body| {
                serde_json::from_value::<AuthData>(body).map_err(|_| ApiError::Parse { status: 0 })
            });

        match result {
            Ok(auth) => {
                let Some(token) = auth.token else {
                    warn!("refresh response carried no token");
                    self.expire();
                    return Err(ApiError::SessionExpired);
                };
                self.store.set(TOKEN_KEY, &token);
                if let Some(new_refresh) = auth.refresh_token {
                    self.store.set(REFRESH_TOKEN_KEY, &new_refresh);
                }
                info!("access token refreshed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, clearing session");
                self.expire();
                Err(ApiError::SessionExpired)
            }
        }
    }

    /// Clear the session without firing the hook (user-initiated)
    pub fn logout(&self) {
        self.store.remove(TOKEN_KEY);
        self.store.remove(REFRESH_TOKEN_KEY);
        self.store.remove(USER_KEY);
        info!("session cleared");
    }

    /// Clear the session and fire the session-expired hook
    pub fn expire(&self) {
        self.logout();
        if let Ok(slot) = self.on_expired.lock() {
            if let Some(hook) = slot.as_ref() {
                hook();
            }
        }
    }

    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.store.get(REFRESH_TOKEN_KEY).is_some()
    }

    /// A session is authenticated while a token is present and its `exp`
    /// claim, when it carries one, has not passed. An expired or
    /// undecodable token clears the session on the spot; a decodable token
    /// without `exp` never expires client-side.
    pub fn is_authenticated(&self) -> bool {
        let Some(token) = self.token() else {
            return false;
        };
        let Some(claims) = decode_claims(&token) else {
            self.logout();
            return false;
        };
        match claims.get("exp").and_then(Value::as_i64) {
            None => true,
            Some(exp) if exp > self.clock.now().timestamp() => true,
            Some(_) => {
                self.logout();
                false
            }
        }
    }

    pub fn user(&self) -> Option<Usuario> {
        let raw = self.store.get(USER_KEY)?;
        serde_json::from_str(&raw).ok()
    }

    pub fn user_id(&self) -> Option<String> {
        self.user().and_then(|u| u.id)
    }

    pub fn user_email(&self) -> Option<String> {
        self.user().and_then(|u| u.email)
    }

    /// Display name, falling back to the email when none was provided
    pub fn user_name(&self) -> Option<String> {
        self.user().and_then(|u| u.name.or(u.email))
    }

    pub fn comprador_id(&self) -> Option<String> {
        self.user().and_then(|u| u.comprador_id)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.user().is_some_and(|u| u.roles.iter().any(|r| r == role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("Admin")
    }

    pub fn is_comprador(&self) -> bool {
        self.has_role("Comprador")
    }

    pub fn is_vendedor(&self) -> bool {
        self.has_role("Vendedor")
    }

    /// Activate a buyer account from an invitation code and choose the
    /// initial password
    pub async fn create_comprador(&self, code: &str, password: &str) -> ApiResult<Value> {
        validation::validate_password(password)?;
        self.post_json(
            endpoints::CREATE_COMPRADOR,
            &serde_json::json!({ "codigo": code, "password": password }),
        )
        .await
    }

    /// Request a password-setup link be mailed to the given address
    pub async fn generate_password_link(&self, email: &str) -> ApiResult<Value> {
        validation::validate_email(email)?;
        self.post_json(
            endpoints::GENERA_LIGA_PASSWORD,
            &serde_json::json!({ "email": email }),
        )
        .await
    }

    /// Set the password using the code from a password-setup link
    pub async fn set_password(&self, code: &str, password: &str) -> ApiResult<Value> {
        validation::validate_password(password)?;
        self.post_json(
            endpoints::ESTABLECE_PASSWORD,
            &serde_json::json!({ "codigo": code, "password": password }),
        )
        .await
    }

    /// Background task that refreshes the token five minutes before each
    /// expiry. Stops once the session is gone.
    pub fn spawn_auto_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let Some(token) = session.token() else {
                    return;
                };

                let Some(exp) = token_expiry(&token) else {
                    // undecodable token, nothing to schedule against
                    return;
                };
                let wait_secs =
                    (exp - REFRESH_MARGIN_SECS - session.clock.now().timestamp()).max(0);
                tokio::time::sleep(Duration::from_secs(wait_secs as u64)).await;

                if session.token().is_none() {
                    return;
                }
                if let Err(err) = session.refresh().await {
                    error!(error = %err, "auto-refresh failed, stopping");
                    return;
                }
            }
        })
    }
}

/// Decode a JWT payload without verifying the signature.
///
/// The client only reads display claims (`exp`, identity, roles); trust
/// decisions stay on the server. Tolerates both base64 alphabets and
/// stray padding.
pub fn decode_claims(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Unix timestamp of the token's `exp` claim, when present
pub fn token_expiry(token: &str) -> Option<i64> {
    decode_claims(token)?.get("exp")?.as_i64()
}
