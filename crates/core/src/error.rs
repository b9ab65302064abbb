use thiserror::Error;

use crate::model::{ParticipantError, RatingError, ValidationError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    Participant(#[from] ParticipantError),
}
