use std::fmt;
use std::str::FromStr;

use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RatingError {
    #[error("rating must be between 1 and 5, got {0}")]
    OutOfRange(i64),
    #[error("not a rating: {0:?}")]
    Unparsable(String),
}

//
// ─── RATING ───────────────────────────────────────────────────────────────────
//

/// A 1–5 score on one rating field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rating {
    One,
    Two,
    Three,
    Four,
    Five,
}

impl Rating {
    pub const ALL: [Rating; 5] = [
        Rating::One,
        Rating::Two,
        Rating::Three,
        Rating::Four,
        Rating::Five,
    ];

    /// Converts a numeric score to a `Rating`.
    ///
    /// # Errors
    ///
    /// Returns `RatingError::OutOfRange` outside 1-5.
    pub fn from_value(value: i64) -> Result<Self, RatingError> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            5 => Ok(Self::Five),
            other => Err(RatingError::OutOfRange(other)),
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        match self {
            Rating::One => 1,
            Rating::Two => 2,
            Rating::Three => 3,
            Rating::Four => 4,
            Rating::Five => 5,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl FromStr for Rating {
    type Err = RatingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| RatingError::Unparsable(s.to_owned()))?;
        Self::from_value(value)
    }
}

//
// ─── SLOT ─────────────────────────────────────────────────────────────────────
//

/// Input state of one rating widget. `Unset` is the neutral starting position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatingSlot {
    #[default]
    Unset,
    Rated(Rating),
}

impl RatingSlot {
    /// Label shown for the neutral position.
    pub const UNSET_LABEL: &'static str = "—";

    #[must_use]
    pub fn rating(self) -> Option<Rating> {
        match self {
            RatingSlot::Unset => None,
            RatingSlot::Rated(r) => Some(r),
        }
    }

    #[must_use]
    pub fn is_unset(self) -> bool {
        matches!(self, RatingSlot::Unset)
    }

    /// Parses form input: blank, `-` or `—` mean unset, otherwise 1-5.
    ///
    /// # Errors
    ///
    /// Returns `RatingError` for any other input.
    pub fn parse_input(raw: &str) -> Result<Self, RatingError> {
        match raw.trim() {
            "" | "-" | Self::UNSET_LABEL => Ok(RatingSlot::Unset),
            other => other.parse().map(RatingSlot::Rated),
        }
    }
}

impl From<Rating> for RatingSlot {
    fn from(r: Rating) -> Self {
        RatingSlot::Rated(r)
    }
}

impl fmt::Display for RatingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingSlot::Unset => f.write_str(Self::UNSET_LABEL),
            RatingSlot::Rated(r) => write!(f, "{r}"),
        }
    }
}

//
// ─── FIELDS ───────────────────────────────────────────────────────────────────
//

/// The four rated dimensions, in form and column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RatingField {
    Accuracy,
    Completeness,
    Usefulness,
    StyleTone,
}

impl RatingField {
    pub const ALL: [RatingField; 4] = [
        RatingField::Accuracy,
        RatingField::Completeness,
        RatingField::Usefulness,
        RatingField::StyleTone,
    ];

    /// Human label used in prompts and validation messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            RatingField::Accuracy => "Accuracy",
            RatingField::Completeness => "Completeness",
            RatingField::Usefulness => "Usefulness",
            RatingField::StyleTone => "Style/Tone",
        }
    }

    /// Results sheet column name.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            RatingField::Accuracy => "accuracy",
            RatingField::Completeness => "completeness",
            RatingField::Usefulness => "usefulness",
            RatingField::StyleTone => "style_tone",
        }
    }
}

impl fmt::Display for RatingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//
// ─── DRAFT ────────────────────────────────────────────────────────────────────
//

/// The four rating widgets of the form, all unset until the participant moves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatingDraft {
    pub accuracy: RatingSlot,
    pub completeness: RatingSlot,
    pub usefulness: RatingSlot,
    pub style_tone: RatingSlot,
}

impl RatingDraft {
    #[must_use]
    pub fn get(&self, field: RatingField) -> RatingSlot {
        match field {
            RatingField::Accuracy => self.accuracy,
            RatingField::Completeness => self.completeness,
            RatingField::Usefulness => self.usefulness,
            RatingField::StyleTone => self.style_tone,
        }
    }

    pub fn set(&mut self, field: RatingField, slot: RatingSlot) {
        match field {
            RatingField::Accuracy => self.accuracy = slot,
            RatingField::Completeness => self.completeness = slot,
            RatingField::Usefulness => self.usefulness = slot,
            RatingField::StyleTone => self.style_tone = slot,
        }
    }

    #[must_use]
    pub fn with(mut self, field: RatingField, rating: Rating) -> Self {
        self.set(field, RatingSlot::Rated(rating));
        self
    }

    /// Fields still at the neutral position, in canonical order.
    #[must_use]
    pub fn unset_fields(&self) -> Vec<RatingField> {
        RatingField::ALL
            .into_iter()
            .filter(|field| self.get(*field).is_unset())
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
