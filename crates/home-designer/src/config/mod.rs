use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::design::{BuildMode, SessionDefaults};

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
    pub design: DesignConfig,
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
        let include_targets = flag_var("APP_LOG_TARGETS", false)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets,
            },
            design: DesignConfig::from_env()?,
        })
    }
}

fn flag_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { name, value: raw }),
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
    pub include_targets: bool,
}

/// Defaults applied to every new design session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesignConfig {
    pub build_mode: BuildMode,
    pub include_contracted_options: bool,
    pub persistence_timeout: Duration,
}

impl DesignConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let build_mode = match env::var("DESIGN_BUILD_MODE") {
            Ok(raw) => BuildMode::parse(&raw).ok_or(ConfigError::InvalidBuildMode(raw))?,
            Err(_) => BuildMode::Buyer,
        };
        let include_contracted_options = flag_var("DESIGN_INCLUDE_CONTRACTED", false)?;
        let timeout_ms = env::var("DESIGN_PERSISTENCE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        Ok(Self {
            build_mode,
            include_contracted_options,
            persistence_timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            build_mode: self.build_mode,
            include_contracted_options: self.include_contracted_options,
            persistence_timeout: self.persistence_timeout,
        }
    }
}

impl Default for DesignConfig {
    fn default() -> Self {
        let defaults = SessionDefaults::default();
        Self {
            build_mode: defaults.build_mode,
            include_contracted_options: defaults.include_contracted_options,
            persistence_timeout: defaults.persistence_timeout,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBuildMode(String),
    InvalidFlag { name: &'static str, value: String },
    InvalidTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBuildMode(value) => write!(
                f,
                "DESIGN_BUILD_MODE '{value}' is not one of preview, presale, buyer, buyer_preview"
            ),
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be true or false, got '{value}'")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "DESIGN_PERSISTENCE_TIMEOUT_MS must be a whole number of milliseconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidBuildMode(_)
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvalidTimeout => None,
        }
    }
}
