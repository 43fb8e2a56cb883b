//! Value types for drip-mailing schedules.

use serde::{Deserialize, Serialize};

/// A 1-based chapter number.
///
/// Stored values below 1 are treated as chapter 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chapter(u32);

impl Chapter {
    /// The first chapter.
    pub const FIRST: Self = Self(1);

    /// Create a chapter number, clamping to at least 1.
    #[must_use]
    pub const fn new(n: u32) -> Self {
        if n == 0 { Self::FIRST } else { Self(n) }
    }

    /// Interpret a stored column value, clamping to at least 1.
    #[must_use]
    pub fn from_stored(n: i32) -> Self {
        Self::new(u32::try_from(n).unwrap_or(1))
    }

    /// The chapter number.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Column value for storage.
    #[must_use]
    pub fn to_stored(self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }

    /// The following chapter.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for Chapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of days between two sends of a schedule (1–30).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CadenceDays(u8);

impl CadenceDays {
    /// Shortest allowed cadence.
    pub const MIN: u8 = 1;
    /// Longest allowed cadence.
    pub const MAX: u8 = 30;
    /// Cadence used when none (or zero) is requested.
    pub const DEFAULT: Self = Self(3);

    /// Build a cadence from a requested number of days.
    ///
    /// Missing or zero requests fall back to the default; everything else is
    /// clamped into `MIN..=MAX`.
    #[must_use]
    pub fn from_request(days: Option<i64>) -> Self {
        match days {
            None | Some(0) => Self::DEFAULT,
            Some(d) => {
                let clamped = d.clamp(i64::from(Self::MIN), i64::from(Self::MAX));
                Self(u8::try_from(clamped).unwrap_or(Self::MAX))
            }
        }
    }

    /// Interpret a stored column value; unusable values use the default.
    #[must_use]
    pub fn from_stored(days: i32) -> Self {
        if days <= 0 {
            Self::DEFAULT
        } else {
            Self::from_request(Some(i64::from(days)))
        }
    }

    /// Number of days.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

impl Default for CadenceDays {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for CadenceDays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_clamps_to_first() {
        assert_eq!(Chapter::new(0), Chapter::FIRST);
        assert_eq!(Chapter::from_stored(-4), Chapter::FIRST);
        assert_eq!(Chapter::from_stored(2).get(), 2);
    }

    #[test]
    fn test_chapter_next() {
        assert_eq!(Chapter::FIRST.next().get(), 2);
    }

    #[test]
    fn test_cadence_defaults() {
        assert_eq!(CadenceDays::from_request(None).get(), 3);
        assert_eq!(CadenceDays::from_request(Some(0)).get(), 3);
        assert_eq!(CadenceDays::from_stored(0).get(), 3);
    }

    #[test]
    fn test_cadence_clamps() {
        assert_eq!(CadenceDays::from_request(Some(-5)).get(), 1);
        assert_eq!(CadenceDays::from_request(Some(45)).get(), 30);
        assert_eq!(CadenceDays::from_request(Some(7)).get(), 7);
    }
}
