//! Configuration loader and validator for the FAQ site.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub site: Site,
    pub admin: Admin,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// Public URLs of the front-end assets and the admin screens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Site {
    pub assets_url: String,
    pub asset_version: String,
    pub admin_url: String,
    pub jquery_url: String,
    pub jquery_ui_url: String,
}

/// Admin actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Admin {
    /// Lifetime of a single-use action token.
    pub token_ttl_seconds: u64,
    /// Appended to the title of a duplicated entry.
    pub duplicate_suffix: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// `DATABASE_URL` from the environment, else a file under `app.data_dir`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}/faq.db",
                self.app.data_dir.trim_end_matches('/')
            )
        })
    }

    /// Absolute admin URL for a path such as `admin.php?action=...`.
    pub fn admin_link(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.site.admin_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    if cfg.site.assets_url.trim().is_empty() {
        return Err(ConfigError::Invalid("site.assets_url must be non-empty"));
    }
    if cfg.site.asset_version.trim().is_empty() {
        return Err(ConfigError::Invalid("site.asset_version must be non-empty"));
    }
    if cfg.site.admin_url.trim().is_empty() {
        return Err(ConfigError::Invalid("site.admin_url must be non-empty"));
    }
    if cfg.site.jquery_url.trim().is_empty() {
        return Err(ConfigError::Invalid("site.jquery_url must be non-empty"));
    }
    if cfg.site.jquery_ui_url.trim().is_empty() {
        return Err(ConfigError::Invalid("site.jquery_ui_url must be non-empty"));
    }

    if cfg.admin.token_ttl_seconds == 0 {
        return Err(ConfigError::Invalid("admin.token_ttl_seconds must be > 0"));
    }
    if cfg.admin.duplicate_suffix.trim().is_empty() {
        return Err(ConfigError::Invalid("admin.duplicate_suffix must be non-empty"));
    }

    Ok(())
}

/// Example configuration document.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

site:
  assets_url: "/assets"
  asset_version: "1.9"
  admin_url: "/admin"
  jquery_url: "https://code.jquery.com/jquery-3.7.1.min.js"
  jquery_ui_url: "https://code.jquery.com/ui/1.13.2/jquery-ui.min.js"

admin:
  token_ttl_seconds: 86400
  duplicate_suffix: " (Copy)"
"#
}
