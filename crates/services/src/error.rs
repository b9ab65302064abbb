//! Shared error types for the services crate.

use thiserror::Error;

use storage::QuestionSourceError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use survey_core::model::ValidationError;

/// Errors emitted by `SurveySession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("enter your name to begin")]
    NoParticipant,
    #[error("survey already completed")]
    Completed,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while loading settings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("missing secret `{0}`")]
    Missing(&'static str),
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Questions(#[from] QuestionSourceError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
