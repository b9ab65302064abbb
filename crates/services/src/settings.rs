//! Runtime settings: defaults, the secrets file and `SURVEY__*` environment overrides.

use std::path::{Path, PathBuf};

use chrono::Duration;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use storage::sheets::{Credentials, ServiceAccountKey, SheetsConfig};
use survey_core::model::RESULTS_SHEET_TITLE;

use crate::error::SettingsError;
use crate::retry::RetryPolicy;

pub const DEFAULT_SECRETS_PATH: &str = ".survey/secrets.toml";
/// Environment variable naming an alternative secrets file.
pub const SECRETS_PATH_VAR: &str = "SURVEY_SECRETS";

const ENV_PREFIX: &str = "SURVEY";
const DEFAULT_QUESTIONS_PATH: &str = "questions.csv";
const DEFAULT_ANSWERED_TTL_SECS: i64 = 30;
const DEFAULT_RETRY_BACKOFF_MS: [i64; 4] = [500, 1_000, 2_000, 4_000];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub questions_path: PathBuf,
    pub results_sheet: String,
    pub answered_ttl_secs: u64,
    pub retry_backoff_ms: Vec<u64>,
    pub store: StoreSettings,
}

/// Where responses are kept, selected by `store.backend`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreSettings {
    GoogleSheets(SheetsSettings),
    Sqlite { database_url: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetsSettings {
    pub sheet_id: String,
    pub service_account: ServiceAccountKey,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Settings {
    /// Load from `$SURVEY_SECRETS`, falling back to `.survey/secrets.toml`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the file is missing or a required secret is absent.
    pub fn load() -> Result<Self, SettingsError> {
        let path = std::env::var_os(SECRETS_PATH_VAR)
            .map_or_else(|| PathBuf::from(DEFAULT_SECRETS_PATH), PathBuf::from);
        Self::from_file(&path)
    }

    /// Load from the given TOML file plus process environment overrides.
    ///
    /// # Errors
    ///
    /// Same as [`Settings::load`].
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        Self::from_sources(path, environment())
    }

    fn from_sources(path: &Path, env: Environment) -> Result<Self, SettingsError> {
        let cfg = ConfigBuilder::<DefaultState>::default()
            .set_default("questions_path", DEFAULT_QUESTIONS_PATH)?
            .set_default("results_sheet", RESULTS_SHEET_TITLE)?
            .set_default("answered_ttl_secs", DEFAULT_ANSWERED_TTL_SECS)?
            .set_default("retry_backoff_ms", DEFAULT_RETRY_BACKOFF_MS.to_vec())?
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(env)
            .build()?;

        match cfg.get::<config::Value>("store") {
            Err(ConfigError::NotFound(_)) => return Err(SettingsError::Missing("store")),
            Err(other) => return Err(other.into()),
            Ok(_) => {}
        }

        let settings: Self = cfg.try_deserialize()?;
        settings.validate()
    }

    fn validate(self) -> Result<Self, SettingsError> {
        if self.results_sheet.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "results_sheet",
                reason: "must not be blank".into(),
            });
        }
        match &self.store {
            StoreSettings::GoogleSheets(sheets) => {
                require("store.sheet_id", &sheets.sheet_id)?;
                require(
                    "store.service_account.client_email",
                    &sheets.service_account.client_email,
                )?;
                require(
                    "store.service_account.private_key",
                    &sheets.service_account.private_key,
                )?;
            }
            StoreSettings::Sqlite { database_url } => require("store.database_url", database_url)?,
        }
        Ok(self)
    }

    #[must_use]
    pub fn answered_ttl(&self) -> Duration {
        Duration::from_std(std::time::Duration::from_secs(self.answered_ttl_secs))
            .unwrap_or(Duration::MAX)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_millis(&self.retry_backoff_ms)
    }
}

impl SheetsSettings {
    /// Client configuration authorized with the service-account key.
    #[must_use]
    pub fn client_config(&self) -> SheetsConfig {
        let config = SheetsConfig::new(
            self.sheet_id.trim(),
            Credentials::ServiceAccount(self.service_account.clone()),
        );
        match &self.api_base {
            Some(base) => config.with_api_base(base.as_str()),
            None => config,
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
}

fn require(key: &'static str, value: &str) -> Result<(), SettingsError> {
    if value.trim().is_empty() {
        Err(SettingsError::Missing(key))
    } else {
        Ok(())
    }
}
