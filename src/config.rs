use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AppError;

const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// `DATA_DIR` value that keeps documents in memory
pub const MEMORY_DATA_DIR: &str = ":memory:";

/// Runtime settings read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub admin_password: String,
    pub data_dir: PathBuf,
    pub sheet_url: Option<String>,
    pub sync_debounce: Duration,
    pub remote_timeout: Duration,
    pub layout_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            data_dir: PathBuf::from("data"),
            sheet_url: None,
            sync_debounce: Duration::from_millis(500),
            remote_timeout: Duration::from_secs(15),
            layout_path: None,
        }
    }
}

/// Loads `.env` if there is one. Variables already set win.
pub fn load_dotenv() {
    if !Path::new(".env").exists() {
        return;
    }
    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from: {}", path.display()),
        Err(e) => warn!(error = %e, "Could not read .env, skipping"),
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Validation(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Config::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let admin_password = text("ADMIN_PASSWORD").unwrap_or_else(|| {
            warn!("ADMIN_PASSWORD not set, using the default password");
            defaults.admin_password.clone()
        });

        Ok(Config {
            port: parse_var(&lookup, "PORT", defaults.port)?,
            admin_password,
            data_dir: text("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            sheet_url: text("SHEET_URL"),
            sync_debounce: Duration::from_millis(parse_var(&lookup, "SYNC_DEBOUNCE_MS", 500)?),
            remote_timeout: Duration::from_secs(parse_var(&lookup, "REMOTE_TIMEOUT_SECS", 15)?),
            layout_path: text("LAYOUT_PATH").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.admin_password, "admin123");
        assert_eq!(config.sync_debounce, Duration::from_millis(500));
        assert!(config.sheet_url.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("ADMIN_PASSWORD", "kepsek"),
            ("SHEET_URL", " https://script.example.com/exec "),
            ("SYNC_DEBOUNCE_MS", "250"),
            ("DATA_DIR", "/var/lib/jadwal"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.admin_password, "kepsek");
        assert_eq!(config.sheet_url.as_deref(), Some("https://script.example.com/exec"));
        assert_eq!(config.sync_debounce, Duration::from_millis(250));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/jadwal"));
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(Config::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
    }
}
