//! Server configuration

use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::str::FromStr;

/// Deployment environment, from `APP_ENV`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    /// Internal error details are only sent to clients in development.
    pub fn exposes_error_details(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(Error::Config {
                reason: format!(
                    "APP_ENV must be development, production, or test (got \"{}\")",
                    other
                ),
            }),
        }
    }
}

/// Network, security, and upload configuration for the PDF form server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind (default: 0.0.0.0)
    pub host: String,
    /// TCP port (default: 3000)
    pub port: u16,
    /// Shared secret expected in the `Authorization` header.
    /// `None` makes every `/api` request fail with a configuration error.
    pub api_secret: Option<String>,
    /// Maximum size of an uploaded file in bytes (default: 10MB)
    pub max_upload_bytes: usize,
    pub environment: Environment,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_secret: None,
            max_upload_bytes: 10 * 1024 * 1024, // 10MB
            environment: Environment::Development,
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup; unset keys keep their
    /// defaults and empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: match get("PORT") {
                Some(value) => parse_number("PORT", &value)?,
                None => defaults.port,
            },
            api_secret: get("API_SECRET"),
            max_upload_bytes: match get("MAX_UPLOAD_BYTES") {
                Some(value) => parse_number("MAX_UPLOAD_BYTES", &value)?,
                None => defaults.max_upload_bytes,
            },
            environment: match get("APP_ENV") {
                Some(value) => value.parse()?,
                None => defaults.environment,
            },
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config {
                reason: format!("Invalid listen address {}:{}: {}", self.host, self.port, e),
            })
    }
}

/// Parse a strictly positive integer setting.
fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let invalid = |detail: String| Error::Config {
        reason: format!("{} must be a positive integer (got \"{}\"){}", key, value, detail),
    };
    let number: T = value
        .trim()
        .parse()
        .map_err(|e| invalid(format!(": {}", e)))?;
    if number == T::default() {
        return Err(invalid(String::new()));
    }
    Ok(number)
}
