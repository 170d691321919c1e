use crate::api::v1::Extractor;
use crate::application_impl::HasherParams;
use crate::application_port::{Audience, AuthError};
use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub jwt: Jwt,
    pub store: Store,
    #[serde(default)]
    pub hasher: Hasher,
    #[serde(default)]
    pub extractor: Extractors,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(with = "humantime_serde")]
    pub access_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub refresh_ttl: Duration,
    pub issuer: String,
    pub audience: Audience,
}

impl fmt::Debug for Jwt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwt")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "redis"
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(with = "humantime_serde", default = "default_store_timeout")]
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct Hasher {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Hasher {
    fn default() -> Self {
        let params = HasherParams::default();
        Hasher {
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
        }
    }
}

impl From<&Hasher> for HasherParams {
    fn from(hasher: &Hasher) -> Self {
        HasherParams {
            memory_kib: hasher.memory_kib,
            iterations: hasher.iterations,
            parallelism: hasher.parallelism,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Extractors {
    #[serde(default)]
    pub access: Extractor,
    #[serde(default)]
    pub refresh: Extractor,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_base_path() -> String {
    "auth".to_string()
}

fn default_prefix() -> String {
    "tokens".to_string()
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Settings {
    /// Refuse to start with settings that would make every token unsafe or
    /// unusable.
    pub fn validate(&self) -> Result<(), AuthError> {
        let fail = |reason: &str| Err(AuthError::Configuration(reason.to_string()));

        if self.jwt.access_secret.is_empty() || self.jwt.refresh_secret.is_empty() {
            return fail("jwt secrets must not be empty");
        }
        if self.jwt.access_secret == self.jwt.refresh_secret {
            return fail("access and refresh secrets must differ");
        }
        if self.jwt.access_ttl.is_zero() || self.jwt.refresh_ttl.is_zero() {
            return fail("token lifetimes must be positive");
        }
        if self.jwt.issuer.is_empty() {
            return fail("jwt issuer must not be empty");
        }
        if self.jwt.audience.is_empty() {
            return fail("jwt audience must not be empty");
        }
        if self.store.timeout.is_zero() {
            return fail("store timeout must be positive");
        }
        match self.store.backend.as_str() {
            "memory" => {}
            "redis" if self.store.url.is_empty() => return fail("redis store needs a url"),
            "redis" => {}
            other => {
                return Err(AuthError::Configuration(format!(
                    "unknown store backend: {}",
                    other
                )));
            }
        }
        Ok(())
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Load settings from `path` (or the build's default), then let
/// `AUTHLANE__SECTION__KEY` environment variables override file values.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("AUTHLANE").separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
