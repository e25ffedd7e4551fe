//! Provider settings
//!
//! Settings are read from a TOML file and overridden by `FETCHKIT_*`
//! environment variables, then turned into a [`ProviderContext`].

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use fetchkit_http::Headers;
use serde::{Deserialize, Serialize};

use crate::config::{CachePolicy, Options, ProviderContext};
use crate::error::Error;

/// Global base URL
pub const ENV_URL: &str = "FETCHKIT_URL";
/// Whether the provider speaks GraphQL
pub const ENV_GRAPHQL: &str = "FETCHKIT_GRAPHQL";
/// Cache policy name
pub const ENV_CACHE_POLICY: &str = "FETCHKIT_CACHE_POLICY";
/// Cache entry lifetime in milliseconds
pub const ENV_CACHE_LIFE_MS: &str = "FETCHKIT_CACHE_LIFE_MS";
/// Retry budget
pub const ENV_RETRIES: &str = "FETCHKIT_RETRIES";
/// Pause between retries in milliseconds
pub const ENV_RETRY_DELAY_MS: &str = "FETCHKIT_RETRY_DELAY_MS";
/// Per attempt time budget in milliseconds
pub const ENV_TIMEOUT_MS: &str = "FETCHKIT_TIMEOUT_MS";
/// Keep cached responses in persistent storage
pub const ENV_PERSIST: &str = "FETCHKIT_PERSIST";

/// Provider settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Global base URL
    pub url: Option<String>,
    /// Whether the provider speaks GraphQL
    pub graphql: bool,
    /// Cache policy
    pub cache_policy: Option<CachePolicy>,
    /// Cache entry lifetime in milliseconds
    pub cache_life_ms: Option<u64>,
    /// Retry budget
    pub retries: Option<u32>,
    /// Pause between retries in milliseconds
    pub retry_delay_ms: Option<u64>,
    /// Per attempt time budget in milliseconds
    pub timeout_ms: Option<u64>,
    /// Keep cached responses in persistent storage
    pub persist: Option<bool>,
    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl Settings {
    /// Load settings from `config_file`, falling back to defaults
    pub fn new<P>(config_file: Option<P>) -> Self
    where
        P: AsRef<Path>,
    {
        let Some(config_file) = config_file else {
            return Self::default();
        };

        match Self::from_file(config_file) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!("Error reading config file, falling back to defaults. Error: {e}");
                Self::default()
            }
        }
    }

    /// Load settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Override values from the process environment
    pub fn from_env(self) -> Result<Self, Error> {
        self.apply_env(|key| env::var(key).ok())
    }

    /// Override values using `lookup` to read `FETCHKIT_*` variables
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.url = Some(url);
        }

        if let Some(graphql) = lookup(ENV_GRAPHQL) {
            self.graphql = parse(ENV_GRAPHQL, &graphql)?;
        }

        if let Some(policy) = lookup(ENV_CACHE_POLICY) {
            self.cache_policy = Some(CachePolicy::from_str(&policy)?);
        }

        if let Some(cache_life) = lookup(ENV_CACHE_LIFE_MS) {
            self.cache_life_ms = Some(parse(ENV_CACHE_LIFE_MS, &cache_life)?);
        }

        if let Some(retries) = lookup(ENV_RETRIES) {
            self.retries = Some(parse(ENV_RETRIES, &retries)?);
        }

        if let Some(retry_delay) = lookup(ENV_RETRY_DELAY_MS) {
            self.retry_delay_ms = Some(parse(ENV_RETRY_DELAY_MS, &retry_delay)?);
        }

        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = Some(parse(ENV_TIMEOUT_MS, &timeout)?);
        }

        if let Some(persist) = lookup(ENV_PERSIST) {
            self.persist = Some(parse(ENV_PERSIST, &persist)?);
        }

        Ok(self)
    }

    /// Provider context carrying these settings as global options
    pub fn into_context(self) -> ProviderContext {
        let mut options = Options::new();

        if !self.headers.is_empty() {
            options.headers = Some(self.headers.into_iter().collect::<Headers>());
        }
        options.cache_policy = self.cache_policy;
        options.cache_life = self.cache_life_ms.map(Duration::from_millis);
        options.retries = self.retries;
        options.retry_delay = self
            .retry_delay_ms
            .map(|ms| Duration::from_millis(ms).into());
        options.timeout = self.timeout_ms.map(Duration::from_millis);
        options.persist = self.persist;

        ProviderContext {
            url: self.url,
            options,
            graphql: self.graphql,
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::Settings(format!("Invalid value for {key}: {value}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use super::*;
    use crate::config::{resolve, CallArgs, RetryDelay};

    const SETTINGS: &str = r#"
url = "https://api.example.com"
graphql = false
cache_policy = "no-cache"
retries = 3
retry_delay_ms = 250
timeout_ms = 5000

[headers]
Authorization = "Bearer token"
"#;

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fetchkit.toml");
        fs::write(&path, SETTINGS).expect("write settings");

        let settings = Settings::from_file(&path).expect("settings");

        assert_eq!(settings.url.as_deref(), Some("https://api.example.com"));
        assert_eq!(settings.cache_policy, Some(CachePolicy::NoCache));
        assert_eq!(settings.retries, Some(3));
        assert_eq!(settings.persist, None);
        assert_eq!(
            settings.headers.values().collect::<Vec<_>>(),
            vec!["Bearer token"]
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings::new(Some(dir.path().join("missing.toml")));

        assert_eq!(settings, Settings::default());
        assert_eq!(Settings::new(None::<&Path>), Settings::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_URL, "https://env.example.com"),
            (ENV_PERSIST, "true"),
            (ENV_CACHE_POLICY, "cache-first"),
            (ENV_RETRIES, "1"),
        ]
        .into_iter()
        .collect();

        let settings = Settings {
            retries: Some(5),
            cache_policy: Some(CachePolicy::NoCache),
            ..Default::default()
        }
        .apply_env(|key| vars.get(key).map(|value| value.to_string()))
        .expect("env");

        assert_eq!(settings.url.as_deref(), Some("https://env.example.com"));
        assert_eq!(settings.persist, Some(true));
        assert_eq!(settings.cache_policy, Some(CachePolicy::CacheFirst));
        assert_eq!(settings.retries, Some(1));
    }

    #[test]
    fn test_invalid_env_value() {
        let result = Settings::default().apply_env(|key| {
            (key == ENV_TIMEOUT_MS).then(|| "soon".to_string())
        });

        assert!(matches!(result, Err(Error::Settings(_))));
    }

    #[test]
    fn test_into_context_feeds_resolver() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fetchkit.toml");
        fs::write(&path, SETTINGS).expect("write settings");

        let context = Settings::new(Some(&path)).into_context();
        let config =
            resolve(&context, &CallArgs::from(Options::new().path("/users"))).expect("config");

        assert_eq!(config.url, "https://api.example.com");
        assert_eq!(config.path, "/users");
        assert_eq!(config.cache_policy, CachePolicy::NoCache);
        assert_eq!(config.retries, 3);
        assert_eq!(config.retry_delay, RetryDelay::Fixed(Duration::from_millis(250)));
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.headers.get("authorization"), Some("Bearer token"));
    }
}
