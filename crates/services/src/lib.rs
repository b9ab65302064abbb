#![forbid(unsafe_code)]

pub mod answered_cache;
pub mod app_services;
pub mod error;
pub mod response_store;
pub mod retry;
pub mod sessions;
pub mod settings;

pub use survey_core::Clock;
pub use sessions as session;

pub use answered_cache::AnsweredCache;
pub use app_services::AppServices;
pub use error::{AppServicesError, SessionError, SettingsError};
pub use response_store::ResponseStore;
pub use retry::{RetryPolicy, Retryable};
pub use sessions::{SessionProgress, SessionState, SubmitOutcome, SurveySession, next_question};
pub use settings::{SheetsSettings, Settings, StoreSettings};
