//! Configuration loading and types for the bucket index.
//!
//! Configuration is read once from the process environment and collected
//! into the [`Config`] struct.  Each subsection governs a different part of
//! the system: the HTTP listener, the storage bucket being indexed, page
//! presentation, cache refresh and logging.

use std::fmt;
use std::time::Duration;

use crate::errors::IndexError;

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Bucket and credentials used for listing.
    pub storage: StorageConfig,

    /// Presentation of the rendered listing.
    pub site: SiteConfig,

    /// Refresh behaviour of the snapshot cache.
    pub cache: CacheConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host address.
    pub host: String,

    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Storage provider settings for the bucket being indexed.
#[derive(Clone)]
pub struct StorageConfig {
    /// Static access key.
    pub access_key: String,
    /// Static secret key.
    pub secret_key: String,
    /// Provider region.
    pub region: String,
    /// S3-compatible endpoint URL.
    pub endpoint_url: String,
    /// Bucket to list.
    pub bucket: String,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Presentation settings for the rendered listing.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Prefix prepended to every object key to form its public URL.
    pub public_domain: String,
    /// Page title.
    pub title: String,
    /// Group name for keys that contain no `/`.
    pub ungrouped_name: String,
    /// Percent-encode keys when building public URLs.
    pub encode_keys: bool,
}

/// Cache refresh settings.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Overall deadline for a single refresh.  `None` waits for completion.
    pub refresh_timeout: Option<Duration>,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,

    /// Log format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

/// Sentinel group for top-level objects.
pub const DEFAULT_UNGROUPED_NAME: &str = "Binários";

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Environment variables that must be present and non-empty.
pub const REQUIRED_VARS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_DEFAULT_REGION",
    "ENDPOINT_URL",
    "BUCKET",
    "PUBLIC_DOMAIN",
];

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, IndexError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Every missing required variable is collected before failing, so the
    /// error names all of them rather than just the first.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|key| get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(IndexError::MissingEnv { names: missing });
        }

        let required = |key: &str| get(key).unwrap_or_default();
        let storage = StorageConfig {
            access_key: required("AWS_ACCESS_KEY_ID"),
            secret_key: required("AWS_SECRET_ACCESS_KEY"),
            region: required("AWS_DEFAULT_REGION"),
            endpoint_url: required("ENDPOINT_URL"),
            bucket: required("BUCKET"),
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| IndexError::InvalidConfig {
                name: "PORT".to_string(),
                message: format!("'{raw}' is not a valid port: {e}"),
            })?,
            None => default_port(),
        };
        let server = ServerConfig {
            host: get("HOST").unwrap_or_else(default_host),
            port,
        };

        let encode_keys = match get("ENCODE_KEYS") {
            Some(raw) => parse_bool("ENCODE_KEYS", &raw)?,
            None => false,
        };
        let site = SiteConfig {
            public_domain: required("PUBLIC_DOMAIN"),
            title: get("PAGE_TITLE").unwrap_or_else(|| storage.bucket.clone()),
            ungrouped_name: get("UNGROUPED_NAME")
                .unwrap_or_else(|| DEFAULT_UNGROUPED_NAME.to_string()),
            encode_keys,
        };

        let refresh_timeout = match get("REFRESH_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| IndexError::InvalidConfig {
                    name: "REFRESH_TIMEOUT_SECS".to_string(),
                    message: format!("'{raw}' is not a number of seconds: {e}"),
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        let format = get("LOG_FORMAT").unwrap_or_else(default_log_format);
        if format != "text" && format != "json" {
            return Err(IndexError::InvalidConfig {
                name: "LOG_FORMAT".to_string(),
                message: format!("expected 'text' or 'json', got '{format}'"),
            });
        }
        let logging = LoggingConfig {
            level: get("LOG_LEVEL").unwrap_or_else(default_log_level),
            format,
        };

        Ok(Self {
            server,
            storage,
            site,
            cache: CacheConfig { refresh_timeout },
            logging,
        })
    }

    /// `host:port` the HTTP listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, IndexError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(IndexError::InvalidConfig {
            name: name.to_string(),
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, String> {
        let mut env = HashMap::new();
        env.insert("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE".to_string());
        env.insert("AWS_SECRET_ACCESS_KEY", "secret".to_string());
        env.insert("AWS_DEFAULT_REGION", "auto".to_string());
        env.insert("ENDPOINT_URL", "https://s3.example.com".to_string());
        env.insert("BUCKET", "mirror".to_string());
        env.insert("PUBLIC_DOMAIN", "https://files.example.com/".to_string());
        env
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, IndexError> {
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&full_env()).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.site.title, "mirror");
        assert_eq!(config.site.ungrouped_name, DEFAULT_UNGROUPED_NAME);
        assert!(!config.site.encode_keys);
        assert!(config.cache.refresh_timeout.is_none());
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_missing_variables_are_all_reported() {
        let mut env = full_env();
        env.remove("BUCKET");
        env.remove("AWS_ACCESS_KEY_ID");
        env.insert("PUBLIC_DOMAIN", String::new());

        match load(&env) {
            Err(IndexError::MissingEnv { names }) => {
                assert_eq!(names, vec!["AWS_ACCESS_KEY_ID", "BUCKET", "PUBLIC_DOMAIN"]);
            }
            other => panic!("expected MissingEnv, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_message_lists_names() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing environment variable(s): AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, \
             AWS_DEFAULT_REGION, ENDPOINT_URL, BUCKET, PUBLIC_DOMAIN"
        );
    }

    #[test]
    fn test_port_override_and_invalid_port() {
        let mut env = full_env();
        env.insert("PORT", "9090".to_string());
        assert_eq!(load(&env).unwrap().server.port, 9090);

        env.insert("PORT", "http".to_string());
        assert!(matches!(
            load(&env),
            Err(IndexError::InvalidConfig { ref name, .. }) if name == "PORT"
        ));
    }

    #[test]
    fn test_optional_settings() {
        let mut env = full_env();
        env.insert("ENCODE_KEYS", "true".to_string());
        env.insert("REFRESH_TIMEOUT_SECS", "45".to_string());
        env.insert("UNGROUPED_NAME", "misc".to_string());
        env.insert("PAGE_TITLE", "Downloads".to_string());
        env.insert("LOG_FORMAT", "json".to_string());

        let config = load(&env).unwrap();
        assert!(config.site.encode_keys);
        assert_eq!(config.cache.refresh_timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.site.ungrouped_name, "misc");
        assert_eq!(config.site.title, "Downloads");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let mut env = full_env();
        env.insert("REFRESH_TIMEOUT_SECS", "0".to_string());
        assert!(load(&env).unwrap().cache.refresh_timeout.is_none());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut env = full_env();
        env.insert("LOG_FORMAT", "xml".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = load(&full_env()).unwrap();
        let rendered = format!("{:?}", config.storage);
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}
