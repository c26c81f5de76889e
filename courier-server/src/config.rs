//! Configuration profiles
//!
//! A profile (`development`, `testing`, `production`) supplies defaults for every
//! setting; environment variables then override individual values.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::BootstrapError;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Named configuration profile, selected through `APP_ENV`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Testing,
    Production,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Development => "development",
            Profile::Testing => "testing",
            Profile::Production => "production",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Profile::Development),
            "testing" | "test" => Ok(Profile::Testing),
            "production" | "prod" => Ok(Profile::Production),
            other => Err(BootstrapError::UnknownProfile(other.to_string())),
        }
    }
}

/// Settings resolved for one profile
#[derive(Debug, Clone)]
pub struct Settings {
    pub profile: Profile,
    pub debug: bool,
    /// Server host (default: 127.0.0.1, 0.0.0.0 in production)
    pub host: [u8; 4],
    /// Server port (default: 5000)
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_acquire_timeout_secs: u64,
    pub database_idle_timeout_secs: u64,
    /// Title advertised in the OpenAPI document
    pub api_title: String,
    pub api_version: String,
    /// Access token lifetime in seconds (default: 15 minutes)
    pub access_token_expires_secs: u64,
    /// Refresh token lifetime in seconds (default: 30 days)
    pub refresh_token_expires_secs: u64,
    /// Request body limit in MB
    pub body_limit_mb: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_sec: u64,
    pub rate_limit_burst: u32,
}

impl Settings {
    /// Defaults for a profile, without consulting the environment
    pub fn for_profile(profile: Profile) -> Self {
        let base = Self {
            profile,
            debug: true,
            host: [127, 0, 0, 1],
            port: 5000,
            database_url: "postgres://localhost/courier".to_string(),
            database_max_connections: 10,
            database_min_connections: 0,
            database_acquire_timeout_secs: 5,
            database_idle_timeout_secs: 600,
            api_title: "Courier REST API".to_string(),
            api_version: "v1".to_string(),
            access_token_expires_secs: 15 * 60,
            refresh_token_expires_secs: 30 * 24 * 60 * 60,
            body_limit_mb: 2,
            timeout_secs: 30,
            rate_limit_enabled: false,
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
        };

        match profile {
            Profile::Development => base,
            Profile::Testing => Self {
                database_url: "postgres://localhost/courier_test".to_string(),
                database_max_connections: 2,
                database_acquire_timeout_secs: 2,
                database_idle_timeout_secs: 60,
                ..base
            },
            Profile::Production => Self {
                debug: false,
                host: [0, 0, 0, 0],
                database_max_connections: 20,
                database_min_connections: 2,
                database_acquire_timeout_secs: 10,
                rate_limit_enabled: true,
                ..base
            },
        }
    }

    /// Profile defaults overridden by variables visible through `lookup`
    pub fn from_lookup<F>(profile: Profile, lookup: &F) -> Result<Self, BootstrapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::for_profile(profile);

        let url_key = match profile {
            Profile::Testing => "TEST_DATABASE_URL",
            _ => "DATABASE_URL",
        };
        if let Some(url) = lookup(url_key).filter(|u| !u.trim().is_empty()) {
            settings.database_url = url;
        }

        if let Some(host) = lookup("HOST") {
            settings.host = parse_host(&host)?;
        }
        override_parsed(lookup, "PORT", &mut settings.port)?;
        override_parsed(
            lookup,
            "DATABASE_MAX_CONNECTIONS",
            &mut settings.database_max_connections,
        )?;
        override_parsed(
            lookup,
            "DATABASE_MIN_CONNECTIONS",
            &mut settings.database_min_connections,
        )?;
        override_parsed(
            lookup,
            "DATABASE_ACQUIRE_TIMEOUT_SECS",
            &mut settings.database_acquire_timeout_secs,
        )?;
        override_parsed(
            lookup,
            "DATABASE_IDLE_TIMEOUT_SECS",
            &mut settings.database_idle_timeout_secs,
        )?;
        override_parsed(
            lookup,
            "JWT_ACCESS_TOKEN_EXPIRES",
            &mut settings.access_token_expires_secs,
        )?;
        override_parsed(
            lookup,
            "JWT_REFRESH_TOKEN_EXPIRES",
            &mut settings.refresh_token_expires_secs,
        )?;
        override_parsed(lookup, "BODY_LIMIT_MB", &mut settings.body_limit_mb)?;
        override_parsed(lookup, "REQUEST_TIMEOUT_SECS", &mut settings.timeout_secs)?;
        override_parsed(lookup, "RATE_LIMIT_PER_SEC", &mut settings.rate_limit_per_sec)?;
        override_parsed(lookup, "RATE_LIMIT_BURST", &mut settings.rate_limit_burst)?;

        if let Some(enabled) = lookup("RATE_LIMIT_ENABLED") {
            settings.rate_limit_enabled = parse_flag("RATE_LIMIT_ENABLED", &enabled)?;
        }
        if let Some(title) = lookup("API_TITLE") {
            settings.api_title = title;
        }
        if let Some(version) = lookup("API_VERSION") {
            settings.api_version = version;
        }

        if settings.database_max_connections == 0 {
            return Err(BootstrapError::Config(
                "DATABASE_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        if settings.body_limit_mb.checked_mul(BYTES_PER_MB).is_none() {
            return Err(BootstrapError::Config(format!(
                "BODY_LIMIT_MB ({}) is too large",
                settings.body_limit_mb
            )));
        }
        if settings.database_min_connections > settings.database_max_connections {
            return Err(BootstrapError::Config(format!(
                "DATABASE_MIN_CONNECTIONS ({}) exceeds DATABASE_MAX_CONNECTIONS ({})",
                settings.database_min_connections, settings.database_max_connections
            )));
        }

        Ok(settings)
    }

    /// Get socket address from settings
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Request body limit in bytes, saturating for hand-built settings
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(BYTES_PER_MB)
    }

    pub fn access_token_expires(&self) -> Duration {
        Duration::from_secs(self.access_token_expires_secs)
    }

    pub fn refresh_token_expires(&self) -> Duration {
        Duration::from_secs(self.refresh_token_expires_secs)
    }
}

/// Resolve the active profile and its settings.
///
/// `APP_ENV` names the profile (default: `development`); an unknown name fails.
pub fn get_config<F>(lookup: &F) -> Result<Settings, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    let profile = match lookup("APP_ENV") {
        Some(name) if !name.trim().is_empty() => name.parse()?,
        _ => Profile::default(),
    };

    Settings::from_lookup(profile, lookup)
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, BootstrapError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(BootstrapError::Config(format!(
            "{key} has an invalid value: '{raw}'"
        ))),
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), BootstrapError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| BootstrapError::Config(format!("{key} has an invalid value: '{raw}'")))?;
    }
    Ok(())
}

fn parse_host(raw: &str) -> Result<[u8; 4], BootstrapError> {
    raw.trim()
        .parse::<std::net::Ipv4Addr>()
        .map(|ip| ip.octets())
        .map_err(|_| BootstrapError::Config(format!("HOST has an invalid value: '{raw}'")))
}
