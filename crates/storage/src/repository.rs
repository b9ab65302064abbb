use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use survey_core::model::{QuestionIndex, Rating, ResponseRecord, RESULTS_HEADER};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("rate limited by the remote store")]
    RateLimited,

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Connection(_) | StorageError::RateLimited | StorageError::Unavailable(_)
        )
    }
}

//
// ─── SHEET SHAPES ──────────────────────────────────────────────────────────────
//

/// Resolved reference to a sheet inside the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetHandle {
    pub title: String,
    pub sheet_id: i64,
}

/// The participant and index cells of one stored row, unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKeyRow {
    pub participant: String,
    pub q_index: String,
}

impl AnswerKeyRow {
    /// Builds a key row from a projected `[participant, q_index]` row; missing cells are empty.
    #[must_use]
    pub fn from_cells(cells: &[String]) -> Self {
        Self {
            participant: cells.first().cloned().unwrap_or_default(),
            q_index: cells.get(1).cloned().unwrap_or_default(),
        }
    }
}

/// A single cell written to the sheet.
///
/// Numbers stay numbers so the remote sheet stores them as numeric cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(i64),
}

impl CellValue {
    /// The sheet's native stringification of the cell.
    #[must_use]
    pub fn to_cell_string(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
        }
    }
}

/// Persisted shape of a response: the 11 cells in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRow {
    pub cells: [CellValue; 11],
}

impl ResponseRow {
    #[must_use]
    pub fn from_record(record: &ResponseRecord) -> Self {
        let rating = |r: Rating| CellValue::Number(i64::from(r.value()));
        Self {
            cells: [
                CellValue::Text(record.timestamp.clone()),
                CellValue::Text(record.participant.clone()),
                CellValue::Number(i64::from(record.sequence_index.value())),
                CellValue::Text(record.qid.clone()),
                CellValue::Text(record.question_text.clone()),
                CellValue::Text(record.model_answer.clone()),
                rating(record.accuracy),
                rating(record.completeness),
                rating(record.usefulness),
                rating(record.style_tone),
                CellValue::Text(record.comment.clone().unwrap_or_default()),
            ],
        }
    }

    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.cells.iter().map(CellValue::to_cell_string).collect()
    }
}

/// Everything in a sheet: the header row plus data rows, as strings.
///
/// Rows may be shorter than the header when trailing cells are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetTable {
    /// Splits raw sheet values into header and data rows.
    #[must_use]
    pub fn from_values(mut values: Vec<Vec<String>>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let rows = values.split_off(1);
        let header = values.pop().unwrap_or_default();
        Self { header, rows }
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.trim() == name)
    }

    /// Returns the cell in `row` under column `name`, empty if absent.
    #[must_use]
    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.column(name)
            .and_then(|idx| row.get(idx))
            .map_or("", String::as_str)
    }

    /// Parses every data row back into a `ResponseRecord`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a column is missing or a cell
    /// cannot be read back.
    pub fn response_records(&self) -> Result<Vec<ResponseRecord>, StorageError> {
        for name in RESULTS_HEADER {
            if self.column(name).is_none() {
                return Err(StorageError::Serialization(format!(
                    "missing column: {name}"
                )));
            }
        }
        self.rows
            .iter()
            .map(|row| self.record_from_row(row))
            .collect()
    }

    fn record_from_row(&self, row: &[String]) -> Result<ResponseRecord, StorageError> {
        let text = |name: &str| self.cell(row, name).to_owned();
        let rating = |name: &str| -> Result<Rating, StorageError> {
            self.cell(row, name)
                .parse::<Rating>()
                .map_err(|e| StorageError::Serialization(format!("{name}: {e}")))
        };
        let q_index = self.cell(row, "q_index");
        let comment = text("comment");

        Ok(ResponseRecord {
            timestamp: text("ts_iso"),
            participant: text("participant"),
            sequence_index: QuestionIndex::parse_cell(q_index).ok_or_else(|| {
                StorageError::Serialization(format!("invalid q_index: {q_index:?}"))
            })?,
            qid: text("qid"),
            question_text: text("question"),
            model_answer: text("model_answer"),
            accuracy: rating("accuracy")?,
            completeness: rating("completeness")?,
            usefulness: rating("usefulness")?,
            style_tone: rating("style_tone")?,
            comment: (!comment.is_empty()).then_some(comment),
        })
    }
}

/// Contract for an append-only tabular store holding survey responses.
#[async_trait]
pub trait ResponseSheet: Send + Sync {
    /// Find the sheet titled `title`, creating it and writing `header` as its
    /// first row when it does not exist yet. Calling it again never rewrites the header.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the sheet cannot be looked up or created.
    async fn open_or_create(
        &self,
        title: &str,
        header: &[&str],
    ) -> Result<SheetHandle, StorageError>;

    /// Read only the participant and q_index columns of every data row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn read_answer_keys(&self, sheet: &SheetHandle)
    -> Result<Vec<AnswerKeyRow>, StorageError>;

    /// Append one row after the last row. Existing rows are never touched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the append fails.
    async fn append_row(&self, sheet: &SheetHandle, row: &ResponseRow)
    -> Result<(), StorageError>;

    /// Read the header and all rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn read_table(&self, sheet: &SheetHandle) -> Result<SheetTable, StorageError>;
}

/// In-memory sheet store for tests and prototyping.
///
/// Failures can be queued with [`InMemoryRepository::inject_failures`]; each
/// call pops one before doing any work.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sheets: Arc<Mutex<Vec<(String, Vec<Vec<String>>)>>>,
    failures: Arc<Mutex<VecDeque<StorageError>>>,
    calls: Arc<Mutex<HashMap<&'static str, usize>>>,
    header_writes: Arc<AtomicUsize>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue errors to be returned by the next calls, in order.
    pub fn inject_failures(&self, errors: impl IntoIterator<Item = StorageError>) {
        if let Ok(mut guard) = self.failures.lock() {
            guard.extend(errors);
        }
    }

    /// Number of times `op` was invoked, failures included.
    #[must_use]
    pub fn calls(&self, op: &str) -> usize {
        self.calls
            .lock()
            .map(|guard| guard.get(op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of header rows written across all sheets.
    #[must_use]
    pub fn header_writes(&self) -> usize {
        self.header_writes.load(Ordering::SeqCst)
    }

    /// Raw rows of a sheet, header included.
    #[must_use]
    pub fn rows(&self, title: &str) -> Vec<Vec<String>> {
        self.sheets
            .lock()
            .ok()
            .and_then(|guard| {
                guard
                    .iter()
                    .find(|(t, _)| t == title)
                    .map(|(_, rows)| rows.clone())
            })
            .unwrap_or_default()
    }

    /// Push raw rows into an existing sheet, bypassing `append_row`.
    pub fn seed_rows(&self, title: &str, rows: Vec<Vec<String>>) {
        if let Ok(mut guard) = self.sheets.lock() {
            if let Some((_, existing)) = guard.iter_mut().find(|(t, _)| t == title) {
                existing.extend(rows);
            }
        }
    }

    fn enter(&self, op: &'static str) -> Result<(), StorageError> {
        {
            let mut calls = self
                .calls
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            *calls.entry(op).or_insert(0) += 1;
        }
        let mut failures = self
            .failures
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        match failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn with_sheet<T>(
        &self,
        sheet: &SheetHandle,
        f: impl FnOnce(&mut Vec<Vec<String>>) -> T,
    ) -> Result<T, StorageError> {
        let mut guard = self
            .sheets
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let idx = usize::try_from(sheet.sheet_id).map_err(|_| StorageError::NotFound)?;
        match guard.get_mut(idx) {
            Some((title, rows)) if *title == sheet.title => Ok(f(rows)),
            _ => Err(StorageError::NotFound),
        }
    }
}

#[async_trait]
impl ResponseSheet for InMemoryRepository {
    async fn open_or_create(
        &self,
        title: &str,
        header: &[&str],
    ) -> Result<SheetHandle, StorageError> {
        self.enter("open_or_create")?;
        let mut guard = self
            .sheets
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let idx = match guard.iter().position(|(t, _)| t == title) {
            Some(idx) => idx,
            None => {
                let header_row = header.iter().map(|h| (*h).to_owned()).collect();
                guard.push((title.to_owned(), vec![header_row]));
                self.header_writes.fetch_add(1, Ordering::SeqCst);
                guard.len() - 1
            }
        };
        Ok(SheetHandle {
            title: title.to_owned(),
            sheet_id: i64::try_from(idx).map_err(|_| StorageError::Conflict)?,
        })
    }

    async fn read_answer_keys(
        &self,
        sheet: &SheetHandle,
    ) -> Result<Vec<AnswerKeyRow>, StorageError> {
        self.enter("read_answer_keys")?;
        self.with_sheet(sheet, |rows| {
            rows.iter()
                .skip(1)
                .map(|row| AnswerKeyRow::from_cells(row.get(1..).unwrap_or_default()))
                .collect()
        })
    }

    async fn append_row(
        &self,
        sheet: &SheetHandle,
        row: &ResponseRow,
    ) -> Result<(), StorageError> {
        self.enter("append_row")?;
        self.with_sheet(sheet, |rows| rows.push(row.to_strings()))
    }

    async fn read_table(&self, sheet: &SheetHandle) -> Result<SheetTable, StorageError> {
        self.enter("read_table")?;
        self.with_sheet(sheet, |rows| SheetTable::from_values(rows.clone()))
    }
}

/// Bundles the configured response sheet behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub responses: Arc<dyn ResponseSheet>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_repository(repo: impl ResponseSheet + 'static) -> Self {
        Self {
            responses: Arc::new(repo),
        }
    }
}
