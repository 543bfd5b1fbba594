//! Process configuration, read once from the environment at startup.
//!
//! | Variable                   | Default              |
//! |----------------------------|----------------------|
//! | `EXTERNAL_SERVICE_URL`     | unset (stub backend) |
//! | `EXTERNAL_SERVICE_API_KEY` | unset                |
//! | `PORT`                     | `8443`               |
//! | `TLS_CERT_PATH`            | `/etc/certs/tls.crt` |
//! | `TLS_KEY_PATH`             | `/etc/certs/tls.key` |
//!
//! Empty values are treated as unset.

use std::path::PathBuf;

use reqwest::Url;
use thiserror::Error;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8443;
/// Default path to the webhook TLS certificate
pub const DEFAULT_TLS_CERT_PATH: &str = "/etc/certs/tls.crt";
/// Default path to the webhook TLS private key
pub const DEFAULT_TLS_KEY_PATH: &str = "/etc/certs/tls.key";

pub const ENV_EXTERNAL_SERVICE_URL: &str = "EXTERNAL_SERVICE_URL";
pub const ENV_EXTERNAL_SERVICE_API_KEY: &str = "EXTERNAL_SERVICE_API_KEY";
pub const ENV_PORT: &str = "PORT";
pub const ENV_TLS_CERT_PATH: &str = "TLS_CERT_PATH";
pub const ENV_TLS_KEY_PATH: &str = "TLS_KEY_PATH";

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid PORT value {0:?}: expected a port number")]
    InvalidPort(String),

    #[error("invalid EXTERNAL_SERVICE_URL value {url:?}: {reason}")]
    InvalidServiceUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Webhook configuration
#[derive(Clone)]
pub struct Config {
    /// Base URL of the change service; `None` selects the stub backend
    pub external_service_url: Option<Url>,
    /// Bearer token for the change service
    pub external_service_api_key: Option<String>,
    /// HTTPS listen port
    pub port: u16,
    /// PEM certificate served by the webhook
    pub tls_cert_path: PathBuf,
    /// PEM private key for the certificate
    pub tls_key_path: PathBuf,
}

// Hand-written so the API key never lands in logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("external_service_url", &self.external_service_url)
            .field(
                "external_service_api_key",
                &self.external_service_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("port", &self.port)
            .field("tls_cert_path", &self.tls_cert_path)
            .field("tls_key_path", &self.tls_key_path)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` to resolve variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let external_service_url = get(ENV_EXTERNAL_SERVICE_URL)
            .map(|raw| parse_service_url(&raw))
            .transpose()?;

        let port = match get(ENV_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            external_service_url,
            external_service_api_key: get(ENV_EXTERNAL_SERVICE_API_KEY),
            port,
            tls_cert_path: get(ENV_TLS_CERT_PATH)
                .unwrap_or_else(|| DEFAULT_TLS_CERT_PATH.to_string())
                .into(),
            tls_key_path: get(ENV_TLS_KEY_PATH)
                .unwrap_or_else(|| DEFAULT_TLS_KEY_PATH.to_string())
                .into(),
        })
    }
}

fn parse_service_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidServiceUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {:?}", other))),
    }
}
