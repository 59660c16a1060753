use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "chat_client.toml";
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_GREETING: &str = "Hello! How can I help you today?";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub primary_url: String,
    pub backup_url: String,
    pub request_timeout_secs: u64,
    pub summary_reveal_delay_ms: u64,
    pub greeting: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            primary_url: DEFAULT_API_URL.into(),
            backup_url: DEFAULT_API_URL.into(),
            request_timeout_secs: 30,
            summary_reveal_delay_ms: 2000,
            greeting: DEFAULT_GREETING.into(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn summary_reveal_delay(&self) -> Duration {
        Duration::from_millis(self.summary_reveal_delay_ms)
    }
}

/// Loads settings from `path` (or `chat_client.toml` when present), then
/// applies environment overrides and validates the base URLs.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if default_path.exists() {
                read_settings_file(&default_path)?
            } else {
                Settings::default()
            }
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;

    settings.primary_url = normalize_base_url(&settings.primary_url)
        .with_context(|| format!("invalid primary_url '{}'", settings.primary_url))?;
    settings.backup_url = normalize_base_url(&settings.backup_url)
        .with_context(|| format!("invalid backup_url '{}'", settings.backup_url))?;

    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))
}

fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = lookup("CHAT_PRIMARY_URL") {
        settings.primary_url = v;
    }
    if let Some(v) = lookup("APP__PRIMARY_URL") {
        settings.primary_url = v;
    }

    if let Some(v) = lookup("CHAT_BACKUP_URL") {
        settings.backup_url = v;
    }
    if let Some(v) = lookup("APP__BACKUP_URL") {
        settings.backup_url = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v
            .trim()
            .parse()
            .with_context(|| format!("APP__REQUEST_TIMEOUT_SECS must be an integer, got '{v}'"))?;
    }
    if let Some(v) = lookup("APP__SUMMARY_REVEAL_DELAY_MS") {
        settings.summary_reveal_delay_ms = v.trim().parse().with_context(|| {
            format!("APP__SUMMARY_REVEAL_DELAY_MS must be an integer, got '{v}'")
        })?;
    }

    if let Some(v) = lookup("APP__GREETING") {
        settings.greeting = v;
    }

    Ok(())
}

pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("unsupported scheme '{other}', expected http or https")),
    }
    if parsed.host_str().is_none() {
        return Err(anyhow!("base url has no host"));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
