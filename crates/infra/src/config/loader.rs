//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment when one exists
//! 2. Attempts to load from environment variables
//! 3. If a required variable is missing, falls back to loading from file
//! 4. Probes multiple paths for config files (JSON or TOML)
//!
//! ## Environment Variables
//! Required:
//! - `CHATLAB_ENVIRONMENT`: `development`, `staging` or `production`
//! - `CHATLAB_GOOGLE_CLIENT_ID`: Google OAuth client id
//!
//! Optional (defaults from [`AppConfig::default`]):
//! - `CHATLAB_GOOGLE_CLIENT_SECRET`: Client secret for the direct fallback
//! - `CHATLAB_OAUTH_REDIRECT_URI`: OAuth redirect URI
//! - `CHATLAB_OAUTH_DIRECT_FALLBACK`: Force the direct fallback on or off
//! - `CHATLAB_IDENTITY_URL`: Identity backend base URL
//! - `CHATLAB_OAUTH_PROXY_URL`: Chat Lab backend base URL
//! - `CHATLAB_HTTP_TIMEOUT_SECS`: HTTP request timeout
//! - `CHATLAB_AUTO_SYNC_DELAY_MINUTES`: Auto-sync delay
//! - `CHATLAB_AUTO_SYNC_MAX_RETRIES`: Auto-sync retry cap
//! - `CHATLAB_AUTO_SYNC_RETRY_DELAY_MINUTES`: Delay between auto-sync retries
//! - `CHATLAB_STATE_PATH`: JSON state file
//! - `CHATLAB_LOG_LEVEL`: Default tracing filter
//! - `CHATLAB_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes `chatlab.{toml,json}` then `config.{toml,json}` in the
//! working directory, its parent, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chatlab_domain::{AppConfig, ChatLabError, Environment, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["chatlab.toml", "chatlab.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables (after reading any
/// `.env` file). If a required variable is missing, falls back to a config
/// file.
///
/// # Errors
/// Returns `ChatLabError::Config` if neither source yields a configuration
/// or a value is malformed.
pub fn load() -> Result<AppConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!(
                environment = config.environment.as_str(),
                "Configuration loaded from environment variables"
            );
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from process environment variables
///
/// # Errors
/// Returns `ChatLabError::Config` if a required variable is missing or any
/// variable has an invalid value.
pub fn load_from_env() -> Result<AppConfig> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Build configuration from an arbitrary variable lookup
///
/// `lookup` returns the value of a variable, or `None` when unset.
///
/// # Errors
/// Same as [`load_from_env`].
pub fn from_lookup<F>(lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let vars = Vars { lookup };
    let environment = Environment::from_str(&vars.required("CHATLAB_ENVIRONMENT")?)
        .map_err(|e| ChatLabError::Config(format!("Invalid CHATLAB_ENVIRONMENT: {e}")))?;

    let mut config = AppConfig::for_environment(environment);
    config.oauth.client_id = vars.required("CHATLAB_GOOGLE_CLIENT_ID")?;
    config.oauth.client_secret = vars.optional("CHATLAB_GOOGLE_CLIENT_SECRET");
    if let Some(uri) = vars.optional("CHATLAB_OAUTH_REDIRECT_URI") {
        config.oauth.redirect_uri = uri;
    }
    config.oauth.allow_direct_fallback = vars.flag("CHATLAB_OAUTH_DIRECT_FALLBACK")?;

    if let Some(url) = vars.optional("CHATLAB_IDENTITY_URL") {
        config.endpoints.identity_base_url = url;
    }
    if let Some(url) = vars.optional("CHATLAB_OAUTH_PROXY_URL") {
        config.endpoints.oauth_proxy_base_url = url;
    }
    if let Some(secs) = vars.number("CHATLAB_HTTP_TIMEOUT_SECS")? {
        config.endpoints.request_timeout_secs = secs;
    }

    if let Some(minutes) = vars.number("CHATLAB_AUTO_SYNC_DELAY_MINUTES")? {
        config.auto_sync.delay_minutes = minutes;
    }
    if let Some(retries) = vars.number("CHATLAB_AUTO_SYNC_MAX_RETRIES")? {
        config.auto_sync.max_retries = retries;
    }
    if let Some(minutes) = vars.number("CHATLAB_AUTO_SYNC_RETRY_DELAY_MINUTES")? {
        config.auto_sync.retry_delay_minutes = minutes;
    }

    config.storage.state_path = vars.optional("CHATLAB_STATE_PATH").map(PathBuf::from);
    if let Some(level) = vars.optional("CHATLAB_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = vars.flag("CHATLAB_LOG_JSON")? {
        config.logging.json = json;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations via
/// [`probe_config_paths`]. Format is detected by file extension.
///
/// # Errors
/// Returns `ChatLabError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ChatLabError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ChatLabError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ChatLabError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// # Errors
/// Returns `ChatLabError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ChatLabError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ChatLabError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ChatLabError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// Returns the first existing candidate, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set, non-blank value
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key).ok_or_else(|| {
            ChatLabError::Config(format!("Missing required environment variable: {key}"))
        })
    }

    fn number<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| ChatLabError::Config(format!("Invalid {key} ({raw}): {e}")))
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<Option<bool>> {
        self.optional(key).map(|raw| parse_bool(key, &raw)).transpose()
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ChatLabError::Config(format!("Invalid {key}: expected a boolean, got {raw}"))),
    }
}
