use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::QuestionIndex;
use crate::model::participant::Participant;
use crate::model::question::Question;
use crate::model::rating::{Rating, RatingDraft, RatingField};
use crate::time::format_timestamp;

/// Title of the sheet that collects responses.
pub const RESULTS_SHEET_TITLE: &str = "results";

/// Column order of the results sheet. Appends and exports use exactly this order.
pub const RESULTS_HEADER: [&str; 11] = [
    "ts_iso",
    "participant",
    "q_index",
    "qid",
    "question",
    "model_answer",
    "accuracy",
    "completeness",
    "usefulness",
    "style_tone",
    "comment",
];

/// Raised when a submission still has rating fields at the neutral position.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Please rate: {}", join_labels(.missing))]
pub struct ValidationError {
    pub missing: Vec<RatingField>,
}

fn join_labels(fields: &[RatingField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One submitted rating, as appended to the results sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    /// ISO-8601 UTC, see [`format_timestamp`].
    pub timestamp: String,
    pub participant: String,
    pub sequence_index: QuestionIndex,
    pub qid: String,
    pub question_text: String,
    pub model_answer: String,
    pub accuracy: Rating,
    pub completeness: Rating,
    pub usefulness: Rating,
    pub style_tone: Rating,
    pub comment: Option<String>,
}

impl ResponseRecord {
    /// Build a record from the form state.
    ///
    /// The comment is trimmed; an empty comment becomes `None`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming every field left unset. Nothing is built in that case.
    pub fn from_submission(
        participant: &Participant,
        question: &Question,
        draft: &RatingDraft,
        comment: &str,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let (Some(accuracy), Some(completeness), Some(usefulness), Some(style_tone)) = (
            draft.accuracy.rating(),
            draft.completeness.rating(),
            draft.usefulness.rating(),
            draft.style_tone.rating(),
        ) else {
            return Err(ValidationError {
                missing: draft.unset_fields(),
            });
        };

        let comment = comment.trim();
        Ok(Self {
            timestamp: format_timestamp(submitted_at),
            participant: participant.name().to_owned(),
            sequence_index: question.sequence_index,
            qid: question.qid.clone(),
            question_text: question.question_text.clone(),
            model_answer: question.model_answer.clone(),
            accuracy,
            completeness,
            usefulness,
            style_tone,
            comment: (!comment.is_empty()).then(|| comment.to_owned()),
        })
    }

    #[must_use]
    pub fn rating(&self, field: RatingField) -> Rating {
        match field {
            RatingField::Accuracy => self.accuracy,
            RatingField::Completeness => self.completeness,
            RatingField::Usefulness => self.usefulness,
            RatingField::StyleTone => self.style_tone,
        }
    }
}
