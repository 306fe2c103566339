use crate::auth::{login, Credentials, TokenCache};
use crate::config::Config;
use crate::errors::AppError;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Client for the Sankhya REST gateway.
///
/// Owns the service account's token cache; every request goes out with the
/// cached bearer token, acquired at most once per call.
pub struct SankhyaGateway {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    token_cache: TokenCache,
}

impl SankhyaGateway {
    /// Creates a new `SankhyaGateway`.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration carrying base URL and the ERP
    ///   login credentials.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create Sankhya client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.sankhya_base_url.clone(),
            credentials: Credentials::from_config(config),
            token_cache: TokenCache::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Logs in with caller-supplied credentials and returns the token.
    ///
    /// Used by the portal login endpoint to verify a user's own ERP
    /// credentials. The resulting token is not cached; the service account
    /// slot keeps its own.
    pub async fn login_as(&self, username: &str, password: &str) -> Result<String, AppError> {
        let user_credentials = self.credentials.for_user(username, password);
        login(&self.client, &self.base_url, &user_credentials).await
    }

    /// Invokes a named gateway service with the given JSON payload.
    ///
    /// A 401/403 means the ERP no longer accepts the cached token: the slot
    /// is cleared and the call fails with `SessionExpired`. There is no
    /// in-call retry; the caller's next invocation logs in again.
    pub async fn invoke_service(
        &self,
        service_name: &str,
        payload: &Value,
    ) -> Result<Value, AppError> {
        let token = self
            .token_cache
            .get_or_login(&self.client, &self.base_url, &self.credentials)
            .await?;

        let url = reqwest::Url::parse_with_params(
            &format!("{}/gateway/v1/mge/service.sbr", self.base_url),
            &[("serviceName", service_name), ("outputType", "json")],
        )
        .map_err(|e| AppError::Internal(format!("Failed to build service URL: {}", e)))?;

        tracing::debug!("Invoking Sankhya service {}", service_name);

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", token))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.token_cache.clear().await;
            tracing::warn!(
                "Sankhya refused the cached token on {} ({}), session cleared",
                service_name,
                status
            );
            return Err(AppError::SessionExpired);
        }

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

        let data: Value = response
            .json()
            .await
            .map_err(|e| AppError::Decode(format!("{} response is not JSON: {}", service_name, e)))?;

        Ok(data)
    }

    /// Reads records through `CRUDServiceProvider.loadRecords`.
    pub async fn load_records(&self, payload: &Value) -> Result<Value, AppError> {
        self.invoke_service("CRUDServiceProvider.loadRecords", payload)
            .await
    }

    /// Upserts a record through `DatasetSP.save`.
    pub async fn save_record(&self, payload: &Value) -> Result<Value, AppError> {
        self.invoke_service("DatasetSP.save", payload).await
    }

    /// Runs a raw SQL query through `DbExplorerSP.executeQuery`.
    pub async fn execute_query(&self, sql: &str) -> Result<Value, AppError> {
        let payload = serde_json::json!({
            "requestBody": {
                "sql": sql
            }
        });
        self.invoke_service("DbExplorerSP.executeQuery", &payload)
            .await
    }
}
