use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use survey_core::model::{
    Participant, QuestionIndex, RESULTS_HEADER, RESULTS_SHEET_TITLE, ResponseRecord,
};
use storage::repository::{ResponseRow, ResponseSheet, SheetHandle, SheetTable, StorageError};
use tokio::sync::OnceCell;

use crate::Clock;
use crate::answered_cache::AnsweredCache;
use crate::retry::RetryPolicy;

/// Remote append-only results table with a memoized sheet handle, retried
/// backend calls and a per-participant answered-set cache.
pub struct ResponseStore {
    clock: Clock,
    sheets: Arc<dyn ResponseSheet>,
    title: String,
    sheet: OnceCell<SheetHandle>,
    retry: RetryPolicy,
    cache: AnsweredCache,
}

impl ResponseStore {
    #[must_use]
    pub fn new(clock: Clock, sheets: Arc<dyn ResponseSheet>) -> Self {
        Self {
            clock,
            sheets,
            title: RESULTS_SHEET_TITLE.to_owned(),
            sheet: OnceCell::new(),
            retry: RetryPolicy::default(),
            cache: AnsweredCache::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_answered_ttl(mut self, ttl: Duration) -> Self {
        self.cache = AnsweredCache::new(ttl);
        self
    }

    #[must_use]
    pub fn with_sheet_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn sheet_title(&self) -> &str {
        &self.title
    }

    /// Handle of the results sheet, created with its header on first use.
    ///
    /// # Errors
    ///
    /// Returns the backend error once retries are exhausted; the next call tries again.
    pub async fn ensure_sheet(&self) -> Result<&SheetHandle, StorageError> {
        self.sheet
            .get_or_try_init(|| async {
                let handle = self
                    .retry
                    .run("open_or_create", || {
                        self.sheets.open_or_create(&self.title, &RESULTS_HEADER)
                    })
                    .await?;
                tracing::debug!(title = %handle.title, sheet_id = handle.sheet_id, "results sheet ready");
                Ok::<_, StorageError>(handle)
            })
            .await
    }

    /// Indices already recorded for `name`, matched case-insensitively.
    ///
    /// A blank name yields the empty set without touching the backend.
    ///
    /// # Errors
    ///
    /// Propagates backend errors after retries.
    pub async fn answered_indices(
        &self,
        name: &str,
    ) -> Result<BTreeSet<QuestionIndex>, StorageError> {
        let Ok(participant) = Participant::parse(name) else {
            return Ok(BTreeSet::new());
        };

        let now = self.clock.now();
        if let Some(cached) = self.cache.get(participant.key(), now) {
            return Ok(cached);
        }

        let sheet = self.ensure_sheet().await?;
        let rows = self
            .retry
            .run("read_answer_keys", || self.sheets.read_answer_keys(sheet))
            .await?;

        let answered: BTreeSet<QuestionIndex> = rows
            .iter()
            .filter(|row| participant.matches(&row.participant))
            .filter_map(|row| QuestionIndex::parse_cell(&row.q_index))
            .collect();
        tracing::debug!(
            participant = participant.key(),
            rows = rows.len(),
            answered = answered.len(),
            "loaded answered set"
        );

        self.cache.put(participant.key(), answered.clone(), now);
        Ok(answered)
    }

    /// Append one response row, then drop the participant's cached answered set.
    ///
    /// # Errors
    ///
    /// Propagates backend errors after retries; the cache is left untouched.
    pub async fn append(&self, record: &ResponseRecord) -> Result<(), StorageError> {
        let sheet = self.ensure_sheet().await?;
        let row = ResponseRow::from_record(record);
        self.retry
            .run("append_row", || self.sheets.append_row(sheet, &row))
            .await?;

        tracing::info!(
            participant = %record.participant,
            q_index = record.sequence_index.value(),
            qid = %record.qid,
            "response recorded"
        );
        self.invalidate(&record.participant);
        Ok(())
    }

    pub fn invalidate(&self, name: &str) {
        if let Ok(participant) = Participant::parse(name) {
            self.cache.invalidate(participant.key());
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    /// Header and every stored row.
    ///
    /// # Errors
    ///
    /// Propagates backend errors after retries.
    pub async fn read_all(&self) -> Result<SheetTable, StorageError> {
        let sheet = self.ensure_sheet().await?;
        self.retry
            .run("read_table", || self.sheets.read_table(sheet))
            .await
    }

    /// CSV of the stored rows belonging to `name`, with the stored header.
    ///
    /// Returns `None` for a blank name or when nothing was recorded yet.
    ///
    /// # Errors
    ///
    /// Propagates backend errors after retries, or `Serialization` if the CSV
    /// cannot be rendered.
    pub async fn export_csv(&self, name: &str) -> Result<Option<String>, StorageError> {
        let Ok(participant) = Participant::parse(name) else {
            return Ok(None);
        };

        let table = self.read_all().await?;
        let Some(column) = table.column("participant") else {
            return Ok(None);
        };
        let rows: Vec<&Vec<String>> = table
            .rows
            .iter()
            .filter(|row| row.get(column).is_some_and(|cell| participant.matches(cell)))
            .collect();
        if rows.is_empty() {
            return Ok(None);
        }

        render_csv(&table.header, &rows).map(Some)
    }
}

fn render_csv(header: &[String], rows: &[&Vec<String>]) -> Result<String, StorageError> {
    let csv_err = |e: csv::Error| StorageError::Serialization(e.to_string());

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        let padded = (0..header.len()).map(|i| row.get(i).map_or("", String::as_str));
        writer.write_record(padded).map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}
