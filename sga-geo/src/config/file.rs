//! INI configuration file loading.
//!
//! ```ini
//! [geocoding]
//! api_key = ...
//! language = pt
//! geoapify_timeout_ms = 3000
//! nominatim_timeout_ms = 5000
//! user_agent = SGA-Geo/0.1
//! nominatim_language = pt-BR
//! notify_on_fallback = true
//!
//! [queue]
//! max_concurrent = 5
//! min_spacing_ms = 220
//! channel_capacity = 1000
//!
//! [cache]
//! directory = /var/cache/sga-geo
//! persist = true
//! ttl_secs = 432000
//! flush_interval_secs = 30
//! purge_interval_secs = 900
//!
//! [routing]
//! timeout_ms = 5000
//! max_retries = 1
//! retry_delay_ms = 1000
//! route_ttl_secs = 2592000
//! ```
//!
//! Every key is optional. Unknown keys are ignored. The environment
//! variables [`ENV_API_KEY`] and [`ENV_CACHE_DIR`] take precedence over the
//! file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;
use tracing::debug;

use super::GeocoderConfig;

/// Environment variable overriding `[geocoding] api_key`.
pub const ENV_API_KEY: &str = "GEOAPIFY_API_KEY";

/// Environment variable overriding `[cache] directory`.
pub const ENV_CACHE_DIR: &str = "SGA_GEO_CACHE_DIR";

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value {value:?} for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Loader turning INI text into a [`GeocoderConfig`].
pub struct ConfigFile;

impl ConfigFile {
    /// Loads `path` and applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<GeocoderConfig, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loading config file");
        Ok(Self::env_overrides(Self::parse(&text)?))
    }

    /// Loads `path` if it exists, otherwise starts from defaults. Environment
    /// overrides apply either way.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<GeocoderConfig, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::env_overrides(GeocoderConfig::default()))
        }
    }

    /// Parses INI text on top of the defaults. No environment lookup.
    pub fn parse(text: &str) -> Result<GeocoderConfig, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = GeocoderConfig::default();

        if let Some(section) = ini.section(Some("geocoding")) {
            let reader = SectionReader::new("geocoding", section);
            let geo = &mut config.geocoding;
            if let Some(key) = reader.string("api_key") {
                geo.geoapify_api_key = Some(key);
            }
            if let Some(language) = reader.string("language") {
                geo.language = language;
            }
            if let Some(timeout) = reader.millis("geoapify_timeout_ms")? {
                geo.geoapify_timeout = timeout;
            }
            if let Some(timeout) = reader.millis("nominatim_timeout_ms")? {
                geo.nominatim_timeout = timeout;
            }
            if let Some(agent) = reader.string("user_agent") {
                geo.user_agent = agent;
            }
            if let Some(language) = reader.string("nominatim_language") {
                geo.nominatim_language = language;
            }
            if let Some(notify) = reader.bool("notify_on_fallback")? {
                geo.notify_on_fallback = notify;
            }
        }

        if let Some(section) = ini.section(Some("queue")) {
            let reader = SectionReader::new("queue", section);
            if let Some(n) = reader.positive("max_concurrent")? {
                config.queue.max_concurrent = n as usize;
            }
            if let Some(spacing) = reader.millis("min_spacing_ms")? {
                config.queue.min_spacing = spacing;
            }
            if let Some(n) = reader.positive("channel_capacity")? {
                config.queue.channel_capacity = n as usize;
            }
        }

        if let Some(section) = ini.section(Some("cache")) {
            let reader = SectionReader::new("cache", section);
            if let Some(directory) = reader.string("directory") {
                config.cache.directory = Some(PathBuf::from(directory));
            }
            if reader.bool("persist")? == Some(false) {
                config.cache.directory = None;
            }
            if let Some(ttl) = reader.secs("ttl_secs")? {
                config.cache.ttl = ttl;
            }
            if let Some(interval) = reader.secs("flush_interval_secs")? {
                config.cache.flush_interval = interval;
            }
            if let Some(interval) = reader.secs("purge_interval_secs")? {
                config.cache.purge_interval = interval;
            }
        }

        if let Some(section) = ini.section(Some("routing")) {
            let reader = SectionReader::new("routing", section);
            if let Some(timeout) = reader.millis("timeout_ms")? {
                config.routing.timeout = timeout;
            }
            if let Some(retries) = reader.u64("max_retries")? {
                config.routing.max_retries = u32::try_from(retries)
                    .map_err(|_| reader.invalid("max_retries", "too large"))?;
            }
            if let Some(delay) = reader.millis("retry_delay_ms")? {
                config.routing.retry_delay = delay;
            }
            if let Some(ttl) = reader.secs("route_ttl_secs")? {
                config.routing.route_ttl = ttl;
            }
        }

        Ok(config)
    }

    /// Applies [`ENV_API_KEY`] and [`ENV_CACHE_DIR`] from the process environment.
    pub fn env_overrides(config: GeocoderConfig) -> GeocoderConfig {
        Self::apply_overrides(config, |name| std::env::var(name).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(mut config: GeocoderConfig, lookup: F) -> GeocoderConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            config.geocoding.geoapify_api_key = Some(key);
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.trim().is_empty()) {
            config.cache.directory = Some(PathBuf::from(dir));
        }
        config
    }
}

/// Typed accessors over one INI section.
struct SectionReader<'a> {
    name: &'static str,
    props: &'a Properties,
}

impl<'a> SectionReader<'a> {
    fn new(name: &'static str, props: &'a Properties) -> Self {
        Self { name, props }
    }

    fn raw(&self, key: &str) -> Option<&'a str> {
        self.props
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn invalid(&self, key: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: self.raw(key).unwrap_or_default().to_string(),
            reason: reason.to_string(),
        }
    }

    fn string(&self, key: &str) -> Option<String> {
        self.raw(key).map(str::to_string)
    }

    fn u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        self.raw(key)
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|_| self.invalid(key, "expected a non-negative integer"))
            })
            .transpose()
    }

    fn positive(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        match self.u64(key)? {
            Some(0) => Err(self.invalid(key, "must be greater than zero")),
            other => Ok(other),
        }
    }

    fn millis(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.u64(key)?.map(Duration::from_millis))
    }

    fn secs(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.u64(key)?.map(Duration::from_secs))
    }

    fn bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.raw(key)
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.invalid(key, "expected true or false")),
            })
            .transpose()
    }
}
