use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// 1-based position of a question in the loaded question table.
///
/// Assigned at load time; only stable for the lifetime of one load.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionIndex(NonZeroU32);

impl QuestionIndex {
    /// Creates a new `QuestionIndex`, or `None` for zero.
    #[must_use]
    pub fn new(index: u32) -> Option<Self> {
        NonZeroU32::new(index).map(Self)
    }

    /// Returns the underlying value (always >= 1).
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0.get()
    }

    /// Parses a stored index cell.
    ///
    /// Cells may carry a spreadsheet's numeric formatting, so `"3"` and `"3.0"`
    /// are both accepted and fractions are truncated toward zero. Empty,
    /// non-numeric, non-finite and sub-1 values yield `None`.
    #[must_use]
    pub fn parse_cell(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(value) = raw.parse::<u32>() {
            return Self::new(value);
        }
        let value = raw.parse::<f64>().ok()?;
        if !value.is_finite() || value < 1.0 || value > f64::from(u32::MAX) {
            return None;
        }
        // Range checked above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let truncated = value.trunc() as u32;
        Self::new(truncated)
    }
}

impl fmt::Debug for QuestionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionIndex({})", self.0)
    }
}

impl fmt::Display for QuestionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
