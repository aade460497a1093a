//! Validity intervals for temporal fact versions.
//!
//! Every fact version is true for a half-open interval of valid time:
//! `[from, until)`. An interval with no `until` is open-ended — the
//! version is "current" until the store seals it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A half-open interval of valid time: `[from, until)`.
///
/// `until = None` means open-ended. Sealing an interval (setting `until`)
/// is how the fact store supersedes or expires a version; the start never
/// moves once written.
///
/// # Examples
///
/// ```
/// use twingraph::Interval;
/// use chrono::Utc;
///
/// let open = Interval::starting_at(Utc::now());
/// assert!(open.is_open());
/// assert!(open.contains(Utc::now()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// Start of validity (inclusive).
    pub from: DateTime<Utc>,

    /// End of validity (exclusive). `None` means open-ended.
    pub until: Option<DateTime<Utc>>,
}

impl Interval {
    /// Creates a closed interval `[from, until)`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidInterval` if `from >= until`.
    pub fn new(from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self, ValidationError> {
        if from >= until {
            return Err(ValidationError::InvalidInterval { from, until });
        }
        Ok(Self {
            from,
            until: Some(until),
        })
    }

    /// Creates an open-ended interval starting at the given time.
    #[must_use]
    pub const fn starting_at(from: DateTime<Utc>) -> Self {
        Self { from, until: None }
    }

    /// Returns true if the interval has no end.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.until.is_none()
    }

    /// Returns true if `at` falls within `[from, until)`.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && self.until.map_or(true, |until| at < until)
    }

    /// Returns true if the two intervals share any instant.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let self_end = self.until.unwrap_or(DateTime::<Utc>::MAX_UTC);
        let other_end = other.until.unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.from < other_end && other.from < self_end
    }

    /// Duration of a closed interval; `None` while open-ended.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.until.map(|until| until - self.from)
    }

    /// Seals the interval at `at`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidInterval` if `at` precedes `from`.
    pub fn seal_at(&mut self, at: DateTime<Utc>) -> Result<(), ValidationError> {
        if at < self.from {
            return Err(ValidationError::InvalidInterval {
                from: self.from,
                until: at,
            });
        }
        self.until = Some(at);
        Ok(())
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.until {
            Some(until) => write!(f, "[{} → {})", self.from, until),
            None => write!(f, "[{} → ∞)", self.from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_interval_new_valid() {
        let now = Utc::now();
        let later = now + Duration::hours(1);
        let iv = Interval::new(now, later).unwrap();

        assert_eq!(iv.from, now);
        assert_eq!(iv.until, Some(later));
        assert!(!iv.is_open());
    }

    #[test]
    fn test_interval_new_inverted() {
        let now = Utc::now();
        let earlier = now - Duration::hours(1);

        assert!(Interval::new(now, earlier).is_err());
        assert!(Interval::new(now, now).is_err()); // zero-length is invalid
    }

    #[test]
    fn test_interval_contains_half_open() {
        let start = Utc::now();
        let end = start + Duration::hours(1);
        let iv = Interval::new(start, end).unwrap();

        assert!(iv.contains(start)); // inclusive start
        assert!(iv.contains(start + Duration::minutes(30)));
        assert!(!iv.contains(end)); // exclusive end
        assert!(!iv.contains(start - Duration::seconds(1)));
    }

    #[test]
    fn test_interval_contains_open_ended() {
        let start = Utc::now() - Duration::hours(1);
        let iv = Interval::starting_at(start);

        assert!(iv.contains(start));
        assert!(iv.contains(Utc::now() + Duration::days(365)));
        assert!(!iv.contains(start - Duration::seconds(1)));
    }

    #[test]
    fn test_interval_overlaps() {
        let now = Utc::now();

        let a = Interval::new(now, now + Duration::hours(2)).unwrap();
        let b = Interval::new(now + Duration::hours(1), now + Duration::hours(3)).unwrap();
        let c = Interval::new(now + Duration::hours(3), now + Duration::hours(4)).unwrap();

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn test_interval_overlaps_open_ended() {
        let now = Utc::now();

        let open = Interval::starting_at(now);
        let later = Interval::new(now + Duration::hours(1), now + Duration::hours(2)).unwrap();
        let earlier = Interval::new(now - Duration::hours(2), now - Duration::hours(1)).unwrap();

        assert!(open.overlaps(&later));
        assert!(!open.overlaps(&earlier));
    }

    #[test]
    fn test_interval_seal_at() {
        let now = Utc::now();
        let mut iv = Interval::starting_at(now);

        iv.seal_at(now + Duration::hours(1)).unwrap();
        assert_eq!(iv.until, Some(now + Duration::hours(1)));
    }

    #[test]
    fn test_interval_seal_before_start() {
        let now = Utc::now();
        let mut iv = Interval::starting_at(now);

        assert!(iv.seal_at(now - Duration::hours(1)).is_err());
    }

    #[test]
    fn test_interval_seal_at_start_is_allowed() {
        // A fact can be retracted the instant it was asserted; the resulting
        // empty interval contains nothing.
        let now = Utc::now();
        let mut iv = Interval::starting_at(now);

        iv.seal_at(now).unwrap();
        assert!(!iv.contains(now));
    }

    #[test]
    fn test_interval_duration() {
        let now = Utc::now();
        let iv = Interval::new(now, now + Duration::hours(2)).unwrap();
        assert_eq!(iv.duration(), Some(Duration::hours(2)));
        assert!(Interval::starting_at(now).duration().is_none());
    }

    #[test]
    fn test_interval_display() {
        let iv = Interval::starting_at(Utc::now());
        let s = format!("{iv}");
        assert!(s.contains('∞'));
    }

    #[test]
    fn test_interval_serialization() {
        let iv = Interval::starting_at(Utc::now());
        let json = serde_json::to_string(&iv).unwrap();
        let back: Interval = serde_json::from_str(&json).unwrap();
        assert_eq!(iv, back);
    }
}
