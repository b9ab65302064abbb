use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParticipantError {
    #[error("participant name is blank")]
    Blank,
}

/// A participant identified by the name they typed.
///
/// The display name is trimmed; matching against stored rows uses [`Participant::key`],
/// which is additionally lowercased, so `"Alice "` and `"alice"` are the same person.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Participant {
    name: String,
    key: String,
}

impl Participant {
    /// Builds a participant from raw input.
    ///
    /// # Errors
    ///
    /// Returns `ParticipantError::Blank` if the input is empty after trimming.
    pub fn parse(raw: &str) -> Result<Self, ParticipantError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(ParticipantError::Blank);
        }
        Ok(Self {
            name: name.to_owned(),
            key: Self::normalize(name),
        })
    }

    /// Trimmed name as entered; this is what gets written to the sheet.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive matching key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a stored participant cell belongs to this participant.
    #[must_use]
    pub fn matches(&self, cell: &str) -> bool {
        Self::normalize(cell) == self.key
    }

    fn normalize(raw: &str) -> String {
        raw.trim().to_lowercase()
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Participant({:?})", self.name)
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
