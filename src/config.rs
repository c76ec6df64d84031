use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "mailterm";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the remote endpoints live and how to talk to them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Auth endpoint (register/login)
    pub auth_url: String,
    /// Mailbox endpoint (list/send/draft)
    pub emails_url: String,
    /// Whole-request timeout applied by the HTTP client
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ServerConfig {
    /// Builds a config from explicit endpoint URLs
    pub fn from_urls(auth_url: impl Into<String>, emails_url: impl Into<String>) -> Result<Self> {
        let config = Self {
            auth_url: auth_url.into(),
            emails_url: emails_url.into(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.auth_url)
            .with_context(|| format!("Invalid auth_url {:?}", self.auth_url))?;
        Url::parse(&self.emails_url)
            .with_context(|| format!("Invalid emails_url {:?}", self.emails_url))?;
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Returns the configuration directory path
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .context("Failed to determine config directory")
}

/// Returns the path to the config file
pub fn config_path() -> Result<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Ensures the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir()?;
    if !dir.exists() {
        fs::create_dir_all(&dir).context("Failed to create config directory")?;
    }
    Ok(dir)
}

/// Parses and validates config file contents
pub fn parse_config(content: &str) -> Result<ServerConfig> {
    let config: ServerConfig = toml::from_str(content).context("Failed to parse config.toml")?;
    config.validate()?;
    Ok(config)
}

/// Writes a template config for the user to edit
pub fn write_template(path: &Path) -> Result<()> {
    let sample = ServerConfig {
        auth_url: "https://mail.example.com/api/auth".to_string(),
        emails_url: "https://mail.example.com/api/emails".to_string(),
        request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        user_agent: None,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let content = toml::to_string_pretty(&sample).context("Failed to render config template")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write config template to {:?}", path))
}

/// Loads the config file, from `path` or the default location.
/// A missing file is replaced by a template and reported as an error.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };

    if !path.exists() {
        write_template(&path)?;
        anyhow::bail!(
            "Created a template config at {:?}. Set auth_url and emails_url, then run again.",
            path
        );
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    parse_config(&content)
}
