use crate::config::Config;
use crate::errors::AppError;
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::Mutex;

/// Static ERP credentials sent as headers on the login call.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub appkey: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            token: config.sankhya_token.clone(),
            appkey: config.sankhya_appkey.clone(),
            username: config.sankhya_username.clone(),
            password: config.sankhya_password.clone(),
        }
    }

    /// Same credentials with a different user, for portal logins.
    pub fn for_user(&self, username: &str, password: &str) -> Self {
        Self {
            token: self.token.clone(),
            appkey: self.appkey.clone(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

/// Performs the ERP login and returns the bearer token.
///
/// The token arrives under `bearerToken` or `token` depending on the gateway
/// version; when neither is present the login is considered failed and
/// nothing must be cached.
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    credentials: &Credentials,
) -> Result<String, AppError> {
    let url = format!("{}/login", base_url);
    tracing::info!("Logging into Sankhya as '{}'", credentials.username);

    let response = client
        .post(&url)
        .header("token", &credentials.token)
        .header("appkey", &credentials.appkey)
        .header("username", &credentials.username)
        .header("password", &credentials.password)
        .json(&json!({}))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let data: serde_json::Value = response
        .json()
        .await
        .map_err(|e| AppError::Decode(format!("login response is not JSON: {}", e)))?;

    let token = data
        .get("bearerToken")
        .or_else(|| data.get("token"))
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty());

    match token {
        Some(token) => Ok(token.to_string()),
        None => Err(AppError::Authentication(
            "login response carried no bearerToken or token".to_string(),
        )),
    }
}

/// Single-slot cache for the service account's bearer token.
///
/// The slot is shared process-wide; validity is unknown until a downstream
/// call is refused, at which point the gateway clears it. The lock is never
/// held across the outbound login call, so concurrent misses may log in
/// twice. The duplicate login is harmless and the last writer wins.
pub struct TokenCache {
    slot: Mutex<Option<String>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Option<String> {
        self.slot.lock().await.clone()
    }

    pub async fn store(&self, token: String) {
        *self.slot.lock().await = Some(token);
    }

    pub async fn clear(&self) {
        *self.slot.lock().await = None;
    }

    /// Returns the cached token, logging in first when the slot is empty.
    pub async fn get_or_login(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        credentials: &Credentials,
    ) -> Result<String, AppError> {
        if let Some(token) = self.get().await {
            return Ok(token);
        }

        let token = login(client, base_url, credentials).await?;
        self.store(token.clone()).await;
        tracing::debug!("Sankhya bearer token cached");
        Ok(token)
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Basic e-mail shape check used by the portal login endpoint.
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid regex")
    });
    re.is_match(email)
}
