//! Partner mailing schedule domain types.
//!
//! A schedule drives recurring chapter delivery to one partner address. Its
//! state is a tagged enum, so a finished schedule carries no send date and no
//! transition out of it can be expressed.

use chrono::{DateTime, Duration, Utc};

use guidebook_core::{CadenceDays, Chapter, Email, MailingId, MailingStatus};

/// A persisted partner mailing schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailingSchedule {
    /// Database ID.
    pub id: MailingId,
    /// Account that requested the mailing.
    pub user_email: Email,
    /// Partner address receiving the chapters.
    pub recipient: Email,
    /// Days between sends.
    pub cadence: CadenceDays,
    /// Lifecycle state.
    pub state: ScheduleState,
}

/// Lifecycle state of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Still sending; `chapter` goes out once `next_send_at` has passed.
    Active {
        chapter: Chapter,
        next_send_at: DateTime<Utc>,
    },
    /// Every chapter has been delivered. Terminal.
    Finished { last_chapter: Chapter },
}

impl ScheduleState {
    /// Status column value for this state.
    #[must_use]
    pub const fn status(&self) -> MailingStatus {
        match self {
            Self::Active { .. } => MailingStatus::Active,
            Self::Finished { .. } => MailingStatus::Finished,
        }
    }
}

impl MailingSchedule {
    /// Whether the schedule should be sent at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state, ScheduleState::Active { next_send_at, .. } if next_send_at <= now)
    }

    /// View an active schedule as one that can be sent.
    ///
    /// Returns `None` for finished schedules.
    #[must_use]
    pub fn into_sendable(self) -> Option<DueSchedule> {
        match self.state {
            ScheduleState::Active {
                chapter,
                next_send_at,
            } => Some(DueSchedule {
                id: self.id,
                recipient: self.recipient,
                cadence: self.cadence,
                chapter,
                next_send_at,
            }),
            ScheduleState::Finished { .. } => None,
        }
    }
}

/// An active schedule selected for sending.
///
/// Only constructible from an `Active` schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueSchedule {
    pub id: MailingId,
    pub recipient: Email,
    pub cadence: CadenceDays,
    pub chapter: Chapter,
    pub next_send_at: DateTime<Utc>,
}

impl DueSchedule {
    /// Compute the transition after `chapter` was delivered at `now`.
    #[must_use]
    pub fn after_delivery(&self, now: DateTime<Utc>, interval: Interval, max: Chapter) -> Advance {
        if self.chapter >= max {
            Advance::Finish
        } else {
            Advance::Continue {
                chapter: self.chapter.next(),
                next_send_at: now + interval.duration(self.cadence),
            }
        }
    }
}

/// Result of a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Move on to `chapter`, due at `next_send_at`.
    Continue {
        chapter: Chapter,
        next_send_at: DateTime<Utc>,
    },
    /// The last chapter went out.
    Finish,
}

/// Spacing between sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    /// The schedule's own cadence in days.
    #[default]
    Cadence,
    /// Fixed number of minutes regardless of cadence (test mode).
    Minutes(u32),
}

impl Interval {
    /// Concrete delay for a schedule with `cadence`.
    #[must_use]
    pub fn duration(self, cadence: CadenceDays) -> Duration {
        match self {
            Self::Cadence => Duration::days(i64::from(cadence.get())),
            Self::Minutes(m) => Duration::minutes(i64::from(m.max(1))),
        }
    }
}

/// Parameters for creating a schedule.
#[derive(Debug, Clone)]
pub struct NewMailing {
    pub user_email: Email,
    pub recipient: Email,
    pub cadence: CadenceDays,
    /// First send time; the schedule is due immediately when this is "now".
    pub first_send_at: DateTime<Utc>,
}
