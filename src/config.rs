use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub sankhya_base_url: String,
    pub sankhya_token: String,
    pub sankhya_appkey: String,
    pub sankhya_username: String,
    pub sankhya_password: String,
    /// TTL for cached product searches, in seconds.
    pub produto_cache_ttl_secs: u64,
    /// TTL for cached partner searches, in seconds.
    pub parceiro_cache_ttl_secs: u64,
    /// Soft entry cap for each search cache.
    pub search_cache_capacity: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            sankhya_base_url: std::env::var("SANKHYA_BASE_URL")
                .unwrap_or_else(|_| "https://api.sandbox.sankhya.com.br".to_string())
                .trim_end_matches('/')
                .to_string(),
            // Missing credentials are sent as empty strings and refused by the
            // ERP at login time rather than blocking startup.
            sankhya_token: std::env::var("SANKHYA_TOKEN").unwrap_or_default(),
            sankhya_appkey: std::env::var("SANKHYA_APPKEY").unwrap_or_default(),
            sankhya_username: std::env::var("SANKHYA_USERNAME").unwrap_or_default(),
            sankhya_password: std::env::var("SANKHYA_PASSWORD").unwrap_or_default(),
            produto_cache_ttl_secs: std::env::var("PRODUTO_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "180".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PRODUTO_CACHE_TTL_SECS must be a valid number"))?,
            parceiro_cache_ttl_secs: std::env::var("PARCEIRO_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PARCEIRO_CACHE_TTL_SECS must be a valid number"))?,
            search_cache_capacity: std::env::var("SEARCH_CACHE_CAPACITY")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SEARCH_CACHE_CAPACITY must be a valid number"))?,
        };

        if !config.sankhya_base_url.starts_with("http://")
            && !config.sankhya_base_url.starts_with("https://")
        {
            anyhow::bail!("SANKHYA_BASE_URL must start with http:// or https://");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Sankhya Base URL: {}", config.sankhya_base_url);
        tracing::debug!("Server Port: {}", config.port);
        for (name, value) in [
            ("SANKHYA_TOKEN", &config.sankhya_token),
            ("SANKHYA_APPKEY", &config.sankhya_appkey),
            ("SANKHYA_USERNAME", &config.sankhya_username),
            ("SANKHYA_PASSWORD", &config.sankhya_password),
        ] {
            if value.trim().is_empty() {
                tracing::warn!("{} is not set; ERP logins will be refused", name);
            }
        }

        Ok(config)
    }
}
