use crate::workflows::questionnaire::{SessionSettings, DEFAULT_COUNTRY};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub questionnaire: QuestionnaireConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            questionnaire: QuestionnaireConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Remote endpoints backing the questionnaire.
///
/// The URLs are only required by commands that talk to them, so missing
/// values are reported by [`QuestionnaireConfig::session_settings`].
#[derive(Debug, Clone)]
pub struct QuestionnaireConfig {
    pub country_config_url: Option<String>,
    pub inference_url: Option<String>,
    pub admin_inference_url: Option<String>,
    pub default_country: String,
    pub http_timeout: Duration,
}

impl QuestionnaireConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let http_timeout = match non_empty_var("EMRI_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout),
            },
            None => Duration::from_secs(30),
        };

        Ok(Self {
            country_config_url: non_empty_var("EMRI_COUNTRY_CONFIG_URL"),
            inference_url: non_empty_var("EMRI_INFERENCE_URL"),
            admin_inference_url: non_empty_var("EMRI_ADMIN_INFERENCE_URL"),
            default_country: non_empty_var("EMRI_DEFAULT_COUNTRY")
                .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            http_timeout,
        })
    }

    /// Administrator payloads go to the respondent endpoint unless overridden.
    pub fn session_settings(&self) -> Result<SessionSettings, ConfigError> {
        let country_config_url = self
            .country_config_url
            .clone()
            .ok_or(ConfigError::Missing("EMRI_COUNTRY_CONFIG_URL"))?;
        let inference_url = self
            .inference_url
            .clone()
            .ok_or(ConfigError::Missing("EMRI_INFERENCE_URL"))?;
        let admin_inference_url = self
            .admin_inference_url
            .clone()
            .unwrap_or_else(|| inference_url.clone());

        Ok(SessionSettings {
            country_config_url,
            inference_url,
            admin_inference_url,
            default_country: self.default_country.clone(),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "EMRI_HTTP_TIMEOUT_SECS must be a positive number of seconds")
            }
            ConfigError::Missing(name) => write!(f, "{name} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort | ConfigError::InvalidTimeout | ConfigError::Missing(_) => {
                None
            }
        }
    }
}
