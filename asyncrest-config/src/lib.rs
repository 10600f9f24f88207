use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

/// Keys of the per-method task map, `{method}_{request_type}`.
static TASK_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(get|post|put|patch|delete)_(list|detail)$").unwrap());

/// HTTP methods a resource may allow, lower-cased.
pub const KNOWN_METHODS: &[&str] = &["get", "post", "put", "patch", "delete"];

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub throttle: Option<ThrottleSection>,
    #[serde(default)]
    pub auth: Option<AuthSection>,
    #[serde(default)]
    pub queue: Option<QueueSection>,
    #[serde(default)]
    pub resources: Option<BTreeMap<String, ResourceConfig>>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ThrottleSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub per_user: Option<bool>,
    #[serde(default)]
    pub rate_per_sec: Option<f64>,
    #[serde(default)]
    pub burst: Option<usize>,
    #[serde(default)]
    pub exempt_paths: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub jwt_pem: Option<String>,
    #[serde(default)]
    pub jwt_pem_path: Option<String>,
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub allow_anonymous: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct QueueSection {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub eager: Option<bool>,
}

/// Dispatch configuration for one resource.
///
/// `tasks` maps `{method}_{request_type}` (for example `post_list`) to a task
/// name; `task` is the fallback for every method without an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub allowed_methods: Option<Vec<String>>,
    #[serde(default)]
    pub list_allowed_methods: Option<Vec<String>>,
    #[serde(default)]
    pub detail_allowed_methods: Option<Vec<String>>,
    #[serde(default)]
    pub tasks: BTreeMap<String, String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub require_authentication: Option<bool>,
    #[serde(default)]
    pub throttle: Option<bool>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try each enabled format in turn.
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub throttle: ThrottleConfig,
    pub auth: AuthConfig,
    pub queue: QueueConfig,
    pub resources: BTreeMap<String, ResourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThrottleConfig {
    pub enabled: bool,
    pub per_user: bool,
    pub rate_per_sec: f64,
    pub burst: usize,
    /// Resource paths relative to the `/api` mount, e.g. `/documents`.
    /// Health and readiness routes are never throttled.
    pub exempt_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthConfig {
    pub jwt_pem: Option<String>,
    pub jwt_pem_path: Option<String>,
    pub jwt_secret: Option<String>,
    /// Without key material, accept every request as anonymous instead of
    /// starting in maintenance mode.
    pub allow_anonymous: bool,
}

impl AuthConfig {
    /// True when a PEM, PEM path or HS256 secret is configured.
    pub fn has_key_material(&self) -> bool {
        self.jwt_pem.is_some() || self.jwt_pem_path.is_some() || self.jwt_secret.is_some()
    }

    /// Anonymous access only applies while no key material is configured.
    pub fn anonymous_mode(&self) -> bool {
        self.allow_anonymous && !self.has_key_material()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueConfig {
    pub workers: usize,
    pub capacity: usize,
    pub max_results: usize,
    /// Run tasks inline at submission time instead of on workers.
    pub eager: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 6000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            throttle: ThrottleConfig {
                enabled: false,
                per_user: true,
                rate_per_sec: 100.0,
                burst: 200,
                exempt_paths: Vec::new(),
            },
            auth: AuthConfig {
                jwt_pem: None,
                jwt_pem_path: None,
                jwt_secret: None,
                allow_anonymous: false,
            },
            queue: QueueConfig {
                workers: 4,
                capacity: 1024,
                max_results: 1000,
                eager: false,
            },
            resources: BTreeMap::new(),
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => Err(()),
    }
}

#[inline]
fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .filter_map(|p| {
            let trimmed = p.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        if let Some(server) = raw.server {
            apply_opt!(cfg.server.host, server.host);
            apply_opt!(cfg.server.port, server.port);
        }
        if let Some(logging) = raw.logging {
            apply_opt!(cfg.logging.level, logging.level);
            apply_opt!(cfg.logging.json, logging.json);
        }
        if let Some(t) = raw.throttle {
            apply_opt!(cfg.throttle.enabled, t.enabled);
            apply_opt!(cfg.throttle.per_user, t.per_user);
            apply_opt!(cfg.throttle.rate_per_sec, t.rate_per_sec);
            apply_opt!(cfg.throttle.burst, t.burst);
            apply_opt!(cfg.throttle.exempt_paths, t.exempt_paths);
        }
        if let Some(auth) = raw.auth {
            apply_opt!(cfg.auth.jwt_pem, auth.jwt_pem, wrap);
            apply_opt!(cfg.auth.jwt_pem_path, auth.jwt_pem_path, wrap);
            apply_opt!(cfg.auth.jwt_secret, auth.jwt_secret, wrap);
            apply_opt!(cfg.auth.allow_anonymous, auth.allow_anonymous);
        }
        if let Some(q) = raw.queue {
            apply_opt!(cfg.queue.workers, q.workers);
            apply_opt!(cfg.queue.capacity, q.capacity);
            apply_opt!(cfg.queue.max_results, q.max_results);
            apply_opt!(cfg.queue.eager, q.eager);
        }
        if let Some(resources) = raw.resources {
            cfg.resources = resources;
        }
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Server
    if let Some(v) = env_str("ASYNCREST_SERVER_HOST") {
        cfg.server.host = v;
    }
    if let Some(v) = env_parse::<u16>("ASYNCREST_SERVER_PORT")? {
        cfg.server.port = v;
    }

    // Logging
    if let Some(v) = env_str("ASYNCREST_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("ASYNCREST_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Throttling
    if let Some(v) = env_bool("ASYNCREST_THROTTLE_ENABLED")? {
        cfg.throttle.enabled = v;
    }
    if let Some(v) = env_bool("ASYNCREST_THROTTLE_PER_USER")? {
        cfg.throttle.per_user = v;
    }
    if let Some(v) = env_parse::<f64>("ASYNCREST_THROTTLE_PER_SEC")? {
        cfg.throttle.rate_per_sec = v;
    }
    if let Some(v) = env_parse::<usize>("ASYNCREST_THROTTLE_BURST")? {
        cfg.throttle.burst = v;
    }
    if let Some(v) = env_str("ASYNCREST_THROTTLE_EXEMPT_PATHS") {
        cfg.throttle.exempt_paths = split_csv(&v);
    }

    // Auth
    if let Some(v) = env_str("ASYNCREST_JWT_PEM") {
        cfg.auth.jwt_pem = Some(v);
    }
    if let Some(v) = env_str("ASYNCREST_JWT_PEM_PATH") {
        cfg.auth.jwt_pem_path = Some(v);
    }
    if let Some(v) = env_str("ASYNCREST_JWT_SECRET") {
        cfg.auth.jwt_secret = Some(v);
    }
    if let Some(v) = env_bool("ASYNCREST_AUTH_ALLOW_ANONYMOUS")? {
        cfg.auth.allow_anonymous = v;
    }

    // Queue
    if let Some(v) = env_parse::<usize>("ASYNCREST_QUEUE_WORKERS")? {
        cfg.queue.workers = v;
    }
    if let Some(v) = env_parse::<usize>("ASYNCREST_QUEUE_CAPACITY")? {
        cfg.queue.capacity = v;
    }
    if let Some(v) = env_parse::<usize>("ASYNCREST_QUEUE_MAX_RESULTS")? {
        cfg.queue.max_results = v;
    }
    if let Some(v) = env_bool("ASYNCREST_QUEUE_EAGER")? {
        cfg.queue.eager = v;
    }

    Ok(())
}

fn validate_methods(resource: &str, field: &str, methods: &[String]) -> Result<(), ConfigError> {
    for m in methods {
        if !KNOWN_METHODS.contains(&m.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "resources.{resource}.{field}: unknown method {m}"
            )));
        }
    }
    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }

    if cfg.queue.capacity == 0 {
        return Err(ConfigError::Validation("queue.capacity must be > 0".into()));
    }
    if cfg.queue.workers == 0 && !cfg.queue.eager {
        return Err(ConfigError::Validation(
            "queue.workers must be > 0 unless queue.eager is set".into(),
        ));
    }
    if cfg.throttle.enabled {
        let rate = cfg.throttle.rate_per_sec;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "throttle.rate_per_sec must be a finite number > 0, got {rate}"
            )));
        }
        if cfg.throttle.burst == 0 {
            return Err(ConfigError::Validation("throttle.burst must be > 0".into()));
        }
    }
    for path in &cfg.throttle.exempt_paths {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "throttle.exempt_paths entry {path:?} must start with '/'"
            )));
        }
    }

    for (name, resource) in &cfg.resources {
        for (field, methods) in [
            ("allowed_methods", &resource.allowed_methods),
            ("list_allowed_methods", &resource.list_allowed_methods),
            ("detail_allowed_methods", &resource.detail_allowed_methods),
        ] {
            if let Some(methods) = methods {
                validate_methods(name, field, methods)?;
            }
        }
        for (key, task) in &resource.tasks {
            if !TASK_KEY_REGEX.is_match(key) {
                return Err(ConfigError::Validation(format!(
                    "resources.{name}.tasks: invalid key {key} (expected {{method}}_{{list|detail}})"
                )));
            }
            if task.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "resources.{name}.tasks.{key}: task name is empty"
                )));
            }
        }
    }
    Ok(())
}
