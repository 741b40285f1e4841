//! API configuration.

use std::collections::HashSet;

/// How requests authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// No authentication at all
    #[default]
    Disabled,
    /// Credentials are verified when present, anonymous requests pass
    Optional,
    /// Every request must carry a valid credential
    Required,
}

impl AuthMode {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "required" => Self::Required,
            "optional" => Self::Optional,
            _ => Self::Disabled,
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// HS256 secret for bearer tokens
    pub jwt_secret: Option<String>,
    /// Accepted opaque API keys
    pub api_keys: HashSet<String>,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub rate_limit_rps: u32,
    pub max_body_size: usize,
    pub environment: String,
    pub auth: AuthConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 2 * 1024 * 1024,
            environment: "development".to_string(),
            auth: AuthConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2 * 1024 * 1024),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            auth: AuthConfig {
                mode: std::env::var("AUTH_MODE")
                    .map(|s| AuthMode::parse(&s))
                    .unwrap_or_default(),
                jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
                api_keys: std::env::var("AUTH_API_KEYS")
                    .map(|s| {
                        s.split(',')
                            .map(|k| k.trim().to_string())
                            .filter(|k| !k.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
