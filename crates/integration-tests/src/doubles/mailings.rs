//! In-memory schedule store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use guidebook_core::{Chapter, MailingId};
use guidebook_storefront::db::{MailingStore, RepositoryError};
use guidebook_storefront::models::{Advance, MailingSchedule, NewMailing, ScheduleState};

/// Schedules kept in a vector.
///
/// `apply` has the same compare-and-set semantics as the SQL update: it
/// only touches a schedule that is still active at the expected chapter.
#[derive(Default)]
pub struct InMemoryMailingStore {
    rows: Mutex<Vec<MailingSchedule>>,
    reads: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryMailingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a schedule as-is, keeping its ID.
    pub fn seed(&self, schedule: MailingSchedule) {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(schedule);
    }

    /// Snapshot of every schedule, ordered by ID.
    #[must_use]
    pub fn all(&self) -> Vec<MailingSchedule> {
        let mut rows = self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        rows.sort_by_key(|s| s.id);
        rows
    }

    /// One schedule by ID.
    #[must_use]
    pub fn get(&self, id: MailingId) -> Option<MailingSchedule> {
        self.all().into_iter().find(|s| s.id == id)
    }

    /// How many times `select_active` was called.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make `select_active` fail.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Make `insert` fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

fn next_send_at(schedule: &MailingSchedule) -> Option<DateTime<Utc>> {
    match schedule.state {
        ScheduleState::Active { next_send_at, .. } => Some(next_send_at),
        ScheduleState::Finished { .. } => None,
    }
}

#[async_trait]
impl MailingStore for InMemoryMailingStore {
    async fn insert(&self, mailing: NewMailing) -> Result<MailingSchedule, RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::DataCorruption("insert rejected".into()));
        }
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let id = rows.iter().map(|s| s.id.get()).max().unwrap_or(0) + 1;
        let schedule = MailingSchedule {
            id: MailingId::new(id),
            user_email: mailing.user_email,
            recipient: mailing.recipient,
            cadence: mailing.cadence,
            state: ScheduleState::Active {
                chapter: Chapter::FIRST,
                next_send_at: mailing.first_send_at,
            },
        };
        rows.push(schedule.clone());
        Ok(schedule)
    }

    async fn select_active(
        &self,
        due_before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<MailingSchedule>, RepositoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::DataCorruption("read rejected".into()));
        }

        let mut active: Vec<MailingSchedule> = self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| match due_before {
                Some(cutoff) => s.is_due(cutoff),
                None => next_send_at(s).is_some(),
            })
            .cloned()
            .collect();
        active.sort_by_key(|s| (next_send_at(s), s.id));
        active.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(active)
    }

    async fn apply(
        &self,
        id: MailingId,
        expected_chapter: Chapter,
        advance: Advance,
    ) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(row) = rows.iter_mut().find(|s| {
            s.id == id
                && matches!(s.state, ScheduleState::Active { chapter, .. } if chapter == expected_chapter)
        }) else {
            return Ok(false);
        };

        row.state = match advance {
            Advance::Continue {
                chapter,
                next_send_at,
            } => ScheduleState::Active {
                chapter,
                next_send_at,
            },
            Advance::Finish => ScheduleState::Finished {
                last_chapter: expected_chapter,
            },
        };
        Ok(true)
    }
}
