use std::sync::Arc;

use storage::QuestionSource;
use storage::repository::Storage;
use survey_core::model::Question;

use crate::Clock;
use crate::error::AppServicesError;
use crate::response_store::ResponseStore;
use crate::sessions::SurveySession;
use crate::settings::{Settings, StoreSettings};

/// Loaded questions plus the shared response store.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    questions: Arc<[Question]>,
    store: Arc<ResponseStore>,
}

impl AppServices {
    /// Load questions and connect the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the question file is unusable or the
    /// backend cannot be initialized. No remote call is made here; the results
    /// sheet is created on first use.
    pub async fn from_settings(settings: &Settings, clock: Clock) -> Result<Self, AppServicesError> {
        let questions = QuestionSource::new(&settings.questions_path).load()?;

        let storage = match &settings.store {
            StoreSettings::Sqlite { database_url } => Storage::sqlite(database_url).await?,
            StoreSettings::GoogleSheets(sheets) => Storage::google_sheets(sheets.client_config())?,
        };

        let store = ResponseStore::new(clock, storage.responses)
            .with_retry(settings.retry_policy())
            .with_answered_ttl(settings.answered_ttl())
            .with_sheet_title(settings.results_sheet.trim());

        Ok(Self::new(clock, questions, store))
    }

    #[must_use]
    pub fn new(clock: Clock, questions: Vec<Question>, store: ResponseStore) -> Self {
        Self {
            clock,
            questions: questions.into(),
            store: Arc::new(store),
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn response_store(&self) -> Arc<ResponseStore> {
        Arc::clone(&self.store)
    }

    /// A fresh session with no participant yet.
    #[must_use]
    pub fn new_session(&self) -> SurveySession {
        SurveySession::new(self.clock, Arc::clone(&self.questions), Arc::clone(&self.store))
    }
}
