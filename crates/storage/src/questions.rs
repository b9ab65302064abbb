//! Loader for the local question table.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use survey_core::model::{Question, QuestionIndex};
use thiserror::Error;

/// Accepted header names per column role, in priority order.
const QID_ALIASES: &[&str] = &["qid", "id"];
const QUESTION_ALIASES: &[&str] = &["question", "prompt"];
const ANSWER_ALIASES: &[&str] = &["answer", "model_answer", "response"];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionSourceError {
    #[error("cannot read question file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed question file: {0}")]
    Csv(#[from] csv::Error),
    #[error("question file must have columns: qid, question, answer/model_answer (missing: {})", .missing.join(", "))]
    MissingColumns { missing: Vec<&'static str> },
    #[error("question file has more rows than can be numbered")]
    TooManyRows,
}

/// Reads questions from a CSV file with a header row.
#[derive(Debug, Clone)]
pub struct QuestionSource {
    path: PathBuf,
}

impl QuestionSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all questions, numbering them 1..=N in file order.
    ///
    /// # Errors
    ///
    /// Returns `QuestionSourceError::MissingColumns` when a required column has
    /// no matching header, or I/O and CSV errors.
    pub fn load(&self) -> Result<Vec<Question>, QuestionSourceError> {
        let file = File::open(&self.path).map_err(|source| QuestionSourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let questions = parse_questions(file)?;
        tracing::info!(
            path = %self.path.display(),
            count = questions.len(),
            "loaded questions"
        );
        Ok(questions)
    }
}

/// Parse questions from any CSV reader.
///
/// # Errors
///
/// Same as [`QuestionSource::load`], minus file opening.
pub fn parse_questions(input: impl Read) -> Result<Vec<Question>, QuestionSourceError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();

    let find = |aliases: &[&str]| {
        aliases
            .iter()
            .find_map(|alias| headers.iter().position(|h| h == alias))
    };
    let qid_col = find(QID_ALIASES);
    let question_col = find(QUESTION_ALIASES);
    let answer_col = find(ANSWER_ALIASES);

    let (Some(qid_col), Some(question_col), Some(answer_col)) = (qid_col, question_col, answer_col)
    else {
        let missing = [
            (qid_col, "qid"),
            (question_col, "question"),
            (answer_col, "answer"),
        ]
        .into_iter()
        .filter_map(|(col, role)| col.is_none().then_some(role))
        .collect();
        return Err(QuestionSourceError::MissingColumns { missing });
    };

    let mut questions = Vec::new();
    for (offset, record) in reader.records().enumerate() {
        let record = record?;
        let cell = |idx: usize| record.get(idx).unwrap_or_default().to_owned();
        let index = u32::try_from(offset + 1)
            .ok()
            .and_then(QuestionIndex::new)
            .ok_or(QuestionSourceError::TooManyRows)?;
        questions.push(Question::new(
            index,
            cell(qid_col),
            cell(question_col),
            cell(answer_col),
        ));
    }
    Ok(questions)
}
