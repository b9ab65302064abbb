mod plan;
mod progress;
mod service;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use plan::{next_question, progress_for};
pub use progress::SessionProgress;
pub use service::{SessionState, SubmitOutcome, SurveySession};
