mod ids;
mod participant;
mod question;
mod rating;
mod response;

pub use ids::QuestionIndex;
pub use participant::{Participant, ParticipantError};
pub use question::Question;
pub use rating::{Rating, RatingDraft, RatingError, RatingField, RatingSlot};
pub use response::{RESULTS_HEADER, RESULTS_SHEET_TITLE, ResponseRecord, ValidationError};
