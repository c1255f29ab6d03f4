use crate::error::ConfigurationError;
use lettre::Address;
use std::{collections::HashMap, time::Duration};

pub const SMTP_HOST: &str = "SMTP_HOST";
pub const SMTP_PORT: &str = "SMTP_PORT";
pub const SMTP_USER: &str = "SMTP_USER";
pub const SMTP_PASS: &str = "SMTP_PASS";
pub const SMTP_ENABLE_SSL: &str = "SMTP_ENABLE_SSL";
pub const SMTP_TIMEOUT_SECS: &str = "SMTP_TIMEOUT_SECS";
pub const TO_EMAIL: &str = "TO_EMAIL";

/// Where the handler finds its settings.
pub trait ConfigurationSource {
    fn get(&self, key: &'static str) -> Option<String>;
}

/// Reads settings from the process environment, as set on the deployed function.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvironmentConfigurationSource;

impl ConfigurationSource for EnvironmentConfigurationSource {
    fn get(&self, key: &'static str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigurationSource for HashMap<&'static str, String> {
    fn get(&self, key: &'static str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpConfiguration {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub enable_tls: bool,
    pub recipient: Address,
    /// Overrides lettre's default command timeout when set.
    pub timeout: Option<Duration>,
}

impl SmtpConfiguration {
    pub fn load(source: &impl ConfigurationSource) -> Result<Self, ConfigurationError> {
        let host = required(source, SMTP_HOST)?;
        let port = parse_port(&required(source, SMTP_PORT)?)?;
        let recipient = required(source, TO_EMAIL)?;
        let recipient: Address = recipient
            .parse()
            .map_err(|_| ConfigurationError::InvalidAddress {
                key: TO_EMAIL,
                value: recipient,
            })?;
        let enable_tls = match optional(source, SMTP_ENABLE_SSL) {
            Some(value) => parse_flag(&value)?,
            None => true,
        };
        let timeout = optional(source, SMTP_TIMEOUT_SECS)
            .map(|value| parse_timeout(&value))
            .transpose()?;

        Ok(Self {
            host,
            port,
            username: source.get(SMTP_USER).filter(|value| !value.is_empty()),
            password: source.get(SMTP_PASS).filter(|value| !value.is_empty()),
            enable_tls,
            recipient,
            timeout,
        })
    }

    /// Username and password, if both are configured. Otherwise the connection is anonymous.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.username.as_deref()?, self.password.as_deref()?))
    }
}

fn optional(source: &impl ConfigurationSource, key: &'static str) -> Option<String> {
    source
        .get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(
    source: &impl ConfigurationSource,
    key: &'static str,
) -> Result<String, ConfigurationError> {
    optional(source, key).ok_or(ConfigurationError::Missing(key))
}

fn parse_port(value: &str) -> Result<u16, ConfigurationError> {
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigurationError::InvalidPort(value.into())),
    }
}

fn parse_flag(value: &str) -> Result<bool, ConfigurationError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConfigurationError::InvalidTlsFlag(value.into()))
    }
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigurationError> {
    match value.parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(ConfigurationError::InvalidTimeout(value.into())),
    }
}
