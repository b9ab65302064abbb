use std::collections::BTreeSet;
use std::sync::Arc;

use survey_core::model::{
    Participant, Question, QuestionIndex, RatingDraft, ResponseRecord, ValidationError,
};

use super::plan::{next_question, progress_for};
use super::progress::SessionProgress;
use crate::Clock;
use crate::error::SessionError;
use crate::response_store::ResponseStore;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Where the participant is in the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoName,
    /// Name known, answered set not loaded yet.
    NameEntered,
    InProgress { current: QuestionIndex },
    Completed,
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub record: ResponseRecord,
    pub state: SessionState,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Survey session for one participant at a time.
///
/// Serves the lowest unanswered question, validates and appends submissions
/// through the `ResponseStore`, and recomputes after every append.
pub struct SurveySession {
    clock: Clock,
    questions: Arc<[Question]>,
    store: Arc<ResponseStore>,
    participant: Option<Participant>,
    answered: BTreeSet<QuestionIndex>,
    state: SessionState,
}

impl SurveySession {
    #[must_use]
    pub fn new(clock: Clock, questions: Arc<[Question]>, store: Arc<ResponseStore>) -> Self {
        Self {
            clock,
            questions,
            store,
            participant: None,
            answered: BTreeSet::new(),
            state: SessionState::NoName,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn participant(&self) -> Option<&Participant> {
        self.participant.as_ref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answered(&self) -> &BTreeSet<QuestionIndex> {
        &self.answered
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            SessionState::InProgress { current } => {
                self.questions.iter().find(|q| q.sequence_index == current)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        progress_for(&self.questions, &self.answered)
    }

    /// Set or switch the participant and load what they already answered.
    ///
    /// Blank input clears the participant and returns to `NoName`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the answered set cannot be loaded;
    /// the session then stays in `NameEntered` and `refresh` can be retried.
    pub async fn enter_name(&mut self, raw: &str) -> Result<SessionState, SessionError> {
        let Ok(participant) = Participant::parse(raw) else {
            self.clear_participant();
            return Ok(self.state);
        };

        tracing::info!(participant = participant.name(), "participant entered");
        self.answered.clear();
        self.participant = Some(participant);
        self.state = SessionState::NameEntered;
        self.refresh().await
    }

    /// Forget the participant and return to `NoName`.
    pub fn clear_participant(&mut self) {
        self.participant = None;
        self.answered.clear();
        self.state = SessionState::NoName;
    }

    /// Reload the answered set (through the store cache) and pick the next question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the store read fails; state is unchanged.
    pub async fn refresh(&mut self) -> Result<SessionState, SessionError> {
        let Some(participant) = &self.participant else {
            return Ok(self.state);
        };
        self.answered = self.store.answered_indices(participant.name()).await?;
        self.recompute();
        Ok(self.state)
    }

    /// Validate the draft, append it for the current question and advance.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoParticipant` before a name was entered.
    /// - `SessionError::Completed` when no question is left.
    /// - `SessionError::Validation` listing every unset rating, checked before any
    ///   store call; nothing is stored.
    /// - `SessionError::Storage` if the append fails after retries; state is unchanged.
    pub async fn submit(
        &mut self,
        draft: &RatingDraft,
        comment: &str,
    ) -> Result<SubmitOutcome, SessionError> {
        if self.participant.is_none() {
            return Err(SessionError::NoParticipant);
        }
        let missing = draft.unset_fields();
        if !missing.is_empty() {
            return Err(ValidationError { missing }.into());
        }
        if self.state == SessionState::NameEntered {
            self.refresh().await?;
        }
        let Some(participant) = &self.participant else {
            return Err(SessionError::NoParticipant);
        };
        let Some(question) = self.current_question() else {
            return Err(SessionError::Completed);
        };

        let record =
            ResponseRecord::from_submission(participant, question, draft, comment, self.clock.now())?;
        self.store.append(&record).await?;

        // The row is stored; a failed reload must not invite a resubmission.
        match self.store.answered_indices(&record.participant).await {
            Ok(fresh) => self.answered = fresh,
            Err(err) => {
                tracing::warn!(error = %err, "reload after submit failed, using local answered set");
            }
        }
        self.answered.insert(record.sequence_index);
        self.recompute();

        Ok(SubmitOutcome {
            record,
            state: self.state,
        })
    }

    /// CSV of everything stored for the current participant.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the full read fails.
    pub async fn export_csv(&self) -> Result<Option<String>, SessionError> {
        let Some(participant) = &self.participant else {
            return Ok(None);
        };
        Ok(self.store.export_csv(participant.name()).await?)
    }

    fn recompute(&mut self) {
        self.state = match next_question(&self.questions, &self.answered) {
            Some(question) => SessionState::InProgress {
                current: question.sequence_index,
            },
            None => SessionState::Completed,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use storage::repository::{InMemoryRepository, StorageError};
    use survey_core::model::{RESULTS_SHEET_TITLE, Rating, RatingField};
    use survey_core::time::{fixed_clock, parse_timestamp};

    fn questions(n: u32) -> Arc<[Question]> {
        (1..=n)
            .map(|i| {
                Question::new(
                    QuestionIndex::new(i).unwrap(),
                    format!("q{i}"),
                    format!("Question {i}?"),
                    format!("Answer {i}."),
                )
            })
            .collect()
    }

    fn session(repo: &InMemoryRepository, n: u32) -> SurveySession {
        let store = ResponseStore::new(fixed_clock(), Arc::new(repo.clone()))
            .with_retry(RetryPolicy::no_retry());
        SurveySession::new(fixed_clock(), questions(n), Arc::new(store))
    }

    fn full_draft() -> RatingDraft {
        RatingDraft::default()
            .with(RatingField::Accuracy, Rating::Five)
            .with(RatingField::Completeness, Rating::Four)
            .with(RatingField::Usefulness, Rating::Three)
            .with(RatingField::StyleTone, Rating::Two)
    }

    fn at(index: u32) -> SessionState {
        SessionState::InProgress {
            current: QuestionIndex::new(index).unwrap(),
        }
    }

    #[tokio::test]
    async fn blank_name_stays_without_participant() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 3);

        assert_eq!(session.enter_name("  ").await.unwrap(), SessionState::NoName);
        assert!(session.participant().is_none());
        assert!(session.current_question().is_none());
        assert_eq!(repo.calls("read_answer_keys"), 0);
    }

    #[tokio::test]
    async fn returning_participant_resumes_after_answered_questions() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 3);
        session.store.ensure_sheet().await.unwrap();
        repo.seed_rows(
            RESULTS_SHEET_TITLE,
            vec![
                vec!["t".into(), "alice".into(), "1".into()],
                vec!["t".into(), "alice".into(), "2".into()],
            ],
        );

        assert_eq!(session.enter_name("Alice ").await.unwrap(), at(3));
        assert_eq!(session.participant().unwrap().name(), "Alice");
        assert_eq!(session.current_question().unwrap().qid, "q3");
        assert_eq!(
            session.progress(),
            SessionProgress {
                total: 3,
                answered: 2,
                remaining: 1,
                is_complete: false,
            }
        );
    }

    #[tokio::test]
    async fn unset_ratings_are_rejected_without_storing() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 2);
        session.enter_name("bob").await.unwrap();

        let draft = RatingDraft::default()
            .with(RatingField::Completeness, Rating::Three)
            .with(RatingField::Usefulness, Rating::Three);
        let err = session.submit(&draft, "hm").await.unwrap_err();

        match err {
            SessionError::Validation(validation) => {
                assert_eq!(
                    validation.missing,
                    vec![RatingField::Accuracy, RatingField::StyleTone]
                );
                assert_eq!(validation.to_string(), "Please rate: Accuracy, Style/Tone");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(repo.calls("append_row"), 0);
        assert_eq!(session.state(), at(1));
    }

    #[tokio::test]
    async fn invalid_draft_does_not_reload_a_pending_participant() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 2);
        repo.inject_failures([StorageError::Unavailable("503".into())]);
        assert!(session.enter_name("judy").await.is_err());
        assert_eq!(session.state(), SessionState::NameEntered);

        let err = session.submit(&RatingDraft::default(), "").await.unwrap_err();

        assert!(matches!(err, SessionError::Validation(ref v) if v.missing.len() == 4));
        assert_eq!(session.state(), SessionState::NameEntered);
        assert_eq!(repo.calls("open_or_create"), 1);
        assert_eq!(repo.calls("read_answer_keys"), 0);
    }

    #[tokio::test]
    async fn pending_participant_is_reloaded_on_valid_submit() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 2);
        repo.inject_failures([StorageError::Unavailable("503".into())]);
        assert!(session.enter_name("judy").await.is_err());

        let outcome = session.submit(&full_draft(), "").await.unwrap();
        assert_eq!(outcome.record.qid, "q1");
        assert_eq!(outcome.state, at(2));
    }

    #[tokio::test]
    async fn clearing_participant_returns_to_no_name() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 2);
        session.enter_name("kim").await.unwrap();
        session.submit(&full_draft(), "").await.unwrap();

        session.clear_participant();

        assert_eq!(session.state(), SessionState::NoName);
        assert!(session.participant().is_none());
        assert!(session.answered().is_empty());
        assert!(session.current_question().is_none());
        assert!(matches!(
            session.submit(&full_draft(), "").await,
            Err(SessionError::NoParticipant)
        ));
    }

    #[tokio::test]
    async fn submit_appends_and_advances() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 2);
        session.enter_name("Bob").await.unwrap();

        let outcome = session.submit(&full_draft(), "  fine  ").await.unwrap();

        assert_eq!(outcome.state, at(2));
        assert_eq!(outcome.record.participant, "Bob");
        assert_eq!(outcome.record.qid, "q1");
        assert_eq!(outcome.record.comment.as_deref(), Some("fine"));
        assert_eq!(outcome.record.timestamp, "2023-11-14T22:13:20Z");
        assert!(parse_timestamp(&outcome.record.timestamp).is_some());

        let rows = repo.rows(RESULTS_SHEET_TITLE);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], "Bob");
        assert_eq!(rows[1][2], "1");
        assert_eq!(session.progress().answered, 1);
    }

    #[tokio::test]
    async fn last_submission_completes_the_survey() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 2);
        session.enter_name("carol").await.unwrap();

        session.submit(&full_draft(), "").await.unwrap();
        let outcome = session.submit(&full_draft(), "").await.unwrap();
        assert_eq!(outcome.state, SessionState::Completed);
        assert!(session.progress().is_complete);

        assert!(matches!(
            session.submit(&full_draft(), "").await,
            Err(SessionError::Completed)
        ));
        assert_eq!(repo.calls("append_row"), 2);
    }

    #[tokio::test]
    async fn submit_without_name_is_refused() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 2);
        assert!(matches!(
            session.submit(&full_draft(), "").await,
            Err(SessionError::NoParticipant)
        ));
    }

    #[tokio::test]
    async fn failed_append_keeps_the_current_question() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 2);
        session.enter_name("dave").await.unwrap();
        repo.inject_failures([StorageError::Unavailable("503".into())]);

        let err = session.submit(&full_draft(), "").await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(StorageError::Unavailable(_))));
        assert_eq!(session.state(), at(1));

        let outcome = session.submit(&full_draft(), "").await.unwrap();
        assert_eq!(outcome.state, at(2));
    }

    #[tokio::test]
    async fn empty_question_set_is_immediately_complete() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 0);
        assert_eq!(session.enter_name("erin").await.unwrap(), SessionState::Completed);
    }

    #[tokio::test]
    async fn switching_participant_recomputes() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 3);
        session.enter_name("frank").await.unwrap();
        session.submit(&full_draft(), "").await.unwrap();
        assert_eq!(session.state(), at(2));

        assert_eq!(session.enter_name("grace").await.unwrap(), at(1));
        assert_eq!(session.progress().answered, 0);
        assert_eq!(session.enter_name("FRANK").await.unwrap(), at(2));
    }

    #[tokio::test]
    async fn export_covers_only_the_current_participant() {
        let repo = InMemoryRepository::new();
        let mut session = session(&repo, 2);
        assert_eq!(session.export_csv().await.unwrap(), None);

        session.enter_name("heidi").await.unwrap();
        assert_eq!(session.export_csv().await.unwrap(), None);
        session.submit(&full_draft(), "").await.unwrap();
        session.enter_name("ivan").await.unwrap();
        session.submit(&full_draft(), "").await.unwrap();

        let csv = session.export_csv().await.unwrap().unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains(",ivan,1,q1,"));
    }
}
