use chrono::{DateTime, SecondsFormat, Utc};

/// Wall clock used to stamp submissions; fixed in tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }
}

/// Formats a timestamp the way it is written to the results sheet:
/// ISO-8601, UTC, whole seconds, `Z` suffix (`2023-11-14T22:13:20Z`).
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses a timestamp previously produced by [`format_timestamp`].
///
/// Returns `None` for anything that is not RFC 3339.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_whole_seconds_with_zulu_suffix() {
        assert_eq!(format_timestamp(fixed_now()), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn sub_second_precision_is_dropped() {
        let at = fixed_now() + chrono::Duration::milliseconds(750);
        assert_eq!(format_timestamp(at), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn parses_what_it_formats() {
        let raw = format_timestamp(fixed_now());
        assert_eq!(parse_timestamp(&raw), Some(fixed_now()));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn fixed_clock_does_not_move() {
        let clock = fixed_clock();
        assert_eq!(clock.now(), clock.now());
        assert!(matches!(Clock::default_clock(), Clock::Default));
    }
}
