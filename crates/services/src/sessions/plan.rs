use std::collections::BTreeSet;

use survey_core::model::{Question, QuestionIndex};

use super::progress::SessionProgress;

/// Lowest-indexed question not yet answered; `None` once everything is.
#[must_use]
pub fn next_question<'a>(
    questions: &'a [Question],
    answered: &BTreeSet<QuestionIndex>,
) -> Option<&'a Question> {
    questions
        .iter()
        .filter(|q| !answered.contains(&q.sequence_index))
        .min_by_key(|q| q.sequence_index)
}

/// Progress over the loaded question set; stray answered indices are not counted.
#[must_use]
pub fn progress_for(questions: &[Question], answered: &BTreeSet<QuestionIndex>) -> SessionProgress {
    let total = questions.len();
    let answered = questions
        .iter()
        .filter(|q| answered.contains(&q.sequence_index))
        .count();
    let remaining = total.saturating_sub(answered);
    SessionProgress {
        total,
        answered,
        remaining,
        is_complete: remaining == 0,
    }
}
