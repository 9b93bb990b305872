use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_UNISENDER_URL: &str = "https://api.unisender.com/ru/api/sendEmail";
const DEVELOPMENT_SESSION_SECRET: &str = "insurance-exchange-development-secret";

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
    pub session: SessionConfig,
    pub notifications: NotificationConfig,
    pub cache: CacheConfig,
    pub marketplace: MarketplaceConfig,
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

        let secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingSessionSecret)
            }
            _ => DEVELOPMENT_SESSION_SECRET.to_string(),
        };
        let ttl_secs = parse_number("SESSION_TTL_SECS", 86_400)?;

        let notifications = NotificationConfig {
            api_key: env::var("UNISENDER_KEY").unwrap_or_else(|_| "api_key".to_string()),
            api_url: env::var("UNISENDER_URL").unwrap_or_else(|_| DEFAULT_UNISENDER_URL.to_string()),
            sender_name: env::var("COMPANY_NAME").unwrap_or_else(|_| "name".to_string()),
            sender_email: env::var("COMPANY_EMAIL").unwrap_or_else(|_| "email".to_string()),
            workers: parse_number("NOTIFICATION_WORKERS", 2)?,
            timeout_secs: parse_number("UNISENDER_TIMEOUT_SECS", 10)?,
        };

        let cache = CacheConfig {
            host: env::var("CACHE_HOST")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            port: env::var("CACHE_PORT")
                .unwrap_or_else(|_| "6379".to_string())
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber {
                    variable: "CACHE_PORT",
                })?,
            timeout_ms: parse_number("CACHE_TIMEOUT_MS", 500)?,
        };

        let marketplace = MarketplaceConfig {
            enforce_update_ownership: parse_flag("ENFORCE_UPDATE_OWNERSHIP", false)?,
            seed_catalog: parse_flag("SEED_CATALOG", true)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            session: SessionConfig { secret, ttl_secs },
            notifications,
            cache,
            marketplace,
        })
    }
}

fn parse_number<T: std::str::FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { variable }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(variable: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(variable) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { variable }),
        },
        Err(_) => Ok(default),
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Signing material and lifetime for session tokens.
#[derive(Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_secs: u64,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Outbound email API credentials, the worker pool size and the per-request
/// deadline.
#[derive(Clone)]
pub struct NotificationConfig {
    pub api_key: String,
    pub api_url: String,
    pub sender_name: String,
    pub sender_email: String,
    pub workers: usize,
    pub timeout_secs: u64,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("sender_name", &self.sender_name)
            .field("sender_email", &self.sender_email)
            .field("workers", &self.workers)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Location of the key-value store backing view counters. Without a host the
/// counters live in process memory.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub host: Option<String>,
    pub port: u16,
    pub timeout_ms: u64,
}

impl CacheConfig {
    /// Bound on connecting to, reading from and writing to the cache.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }

    pub fn redis_url(&self) -> Option<String> {
        self.host
            .as_ref()
            .map(|host| format!("redis://{}:{}/", host.trim(), self.port))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketplaceConfig {
    pub enforce_update_ownership: bool,
    pub seed_catalog: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
    InvalidFlag { variable: &'static str },
    MissingSessionSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a non-negative integer")
            }
            ConfigError::InvalidFlag { variable } => {
                write!(f, "{variable} must be one of true/false/1/0/yes/no/on/off")
            }
            ConfigError::MissingSessionSecret => {
                write!(f, "SESSION_SECRET is required in production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidFlag { .. }
            | ConfigError::MissingSessionSecret => None,
        }
    }
}
