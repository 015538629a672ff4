//! Process configuration, read from the environment.

use std::net::SocketAddr;

use adminkit_observability::LogFormat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not valid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    /// Populate the store with the demo console at startup.
    pub seed_demo_data: bool,
    pub seed_password: String,
    pub log_format: LogFormat,
    /// No secret was configured and `jwt_secret` is the insecure default.
    pub used_default_secret: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: "dev-secret".to_string(),
            access_ttl_minutes: 15,
            refresh_ttl_minutes: 24 * 60,
            seed_demo_data: true,
            seed_password: "Test@1234".to_string(),
            log_format: LogFormat::Json,
            used_default_secret: true,
        }
    }
}

impl ApiConfig {
    /// Read `ADMINKIT_*` variables, falling back to [`ApiConfig::default`].
    ///
    /// `JWT_SECRET` is accepted as well. A missing secret keeps the insecure
    /// default and sets `used_default_secret`; log it once tracing is up.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("ADMINKIT_BIND") {
            config.bind = bind.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "ADMINKIT_BIND",
                reason: e.to_string(),
            })?;
        }

        if let Some(secret) = lookup("ADMINKIT_JWT_SECRET")
            .or_else(|| lookup("JWT_SECRET"))
            .filter(|s| !s.is_empty())
        {
            config.jwt_secret = secret;
            config.used_default_secret = false;
        }

        if let Some(raw) = lookup("ADMINKIT_ACCESS_TTL_MINUTES") {
            config.access_ttl_minutes = parse_minutes("ADMINKIT_ACCESS_TTL_MINUTES", &raw)?;
        }
        if let Some(raw) = lookup("ADMINKIT_REFRESH_TTL_MINUTES") {
            config.refresh_ttl_minutes = parse_minutes("ADMINKIT_REFRESH_TTL_MINUTES", &raw)?;
        }

        if let Some(raw) = lookup("ADMINKIT_SEED") {
            config.seed_demo_data = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ConfigError::Invalid {
                        name: "ADMINKIT_SEED",
                        reason: format!("expected a boolean, got '{other}'"),
                    });
                }
            };
        }
        if let Some(password) = lookup("ADMINKIT_SEED_PASSWORD") {
            config.seed_password = password;
        }

        if let Some(format) = lookup("ADMINKIT_LOG_FORMAT") {
            config.log_format = format.parse().map_err(|reason| ConfigError::Invalid {
                name: "ADMINKIT_LOG_FORMAT",
                reason,
            })?;
        }

        Ok(config)
    }
}

fn parse_minutes(name: &'static str, raw: &str) -> Result<i64, ConfigError> {
    let minutes: i64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if minutes <= 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be positive".to_string(),
        });
    }
    Ok(minutes)
}
