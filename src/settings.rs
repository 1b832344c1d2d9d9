use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::constants::{ENV_DB_PATH, ENV_SETTINGS_PATH, SETTINGS_FILE_PATH};
use crate::ApiError;

/// Top-level configuration, read from `settings.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub engine: EngineSettings,
    pub logging: LoggingSettings,
    pub data_store: DataStoreSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    pub passphrase_mandates: PassphraseMandates,
}

/// Minimum composition of a private key passphrase.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PassphraseMandates {
    pub min_length: u32,
    pub min_upper_case: u32,
    pub min_lower_case: u32,
    pub min_digit: u32,
    pub min_special: u32,
}

impl Default for PassphraseMandates {
    fn default() -> Self {
        Self {
            min_length: 8,
            min_upper_case: 1,
            min_lower_case: 1,
            min_digit: 1,
            min_special: 1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    pub level: LogLevel,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataStoreBackend {
    #[default]
    Memory,
    File { path: PathBuf },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct DataStoreSettings {
    pub backend: DataStoreBackend,
}

impl Settings {
    /// Load settings from `path`, `$CAAPI_SETTINGS` or `settings.json`, in that order.
    /// A missing file yields defaults. Environment overrides are applied last.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var(ENV_SETTINGS_PATH)
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_PATH)),
        };

        let mut settings = if path.exists() {
            debug!(settings_path = %path.display(), "loading settings");
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("unable to read settings file {}", path.display()))?;
            serde_json::from_str::<Settings>(&contents)
                .with_context(|| format!("failed to parse settings file {}", path.display()))?
        } else {
            debug!(settings_path = %path.display(), "settings file not found, using defaults");
            Settings::default()
        };

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .with_context(|| format!("unable to write settings file {}", path.display()))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(db_path) = std::env::var(ENV_DB_PATH) {
            let db_path = db_path.trim();
            self.data_store.backend = match db_path {
                "" => return,
                ":memory:" => DataStoreBackend::Memory,
                _ => DataStoreBackend::File { path: PathBuf::from(db_path) },
            };
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        self.engine.passphrase_mandates.validate()?;
        if let DataStoreBackend::File { path } = &self.data_store.backend {
            if path.as_os_str().is_empty() {
                return Err(ApiError::Precondition("data store path must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

impl PassphraseMandates {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.min_length == 0 {
            return Err(ApiError::Precondition("MinLength must be greater than zero".to_string()));
        }
        Ok(())
    }
}
