//! Partner chapter drip mailing.
//!
//! Each run picks up to [`BATCH_SIZE`] active schedules, mails the current
//! chapter to the partner and moves the schedule forward. Delivery failures
//! leave the schedule untouched so the next run retries it.
//!
//! There is no claim step before sending: two overlapping runs can both mail
//! the same chapter. The conditional update in [`MailingStore::apply`] only
//! keeps them from advancing the schedule twice.

use askama::Template;
use chrono::{DateTime, Utc};
use thiserror::Error;

use guidebook_core::{CadenceDays, Chapter};

use super::chapters::ChapterLibrary;
use super::email::{EmailError, Mailer, OutgoingEmail};
use crate::db::{MailingStore, RepositoryError};
use crate::models::{Advance, DueSchedule, Interval};

/// Maximum schedules handled per run.
pub const BATCH_SIZE: u32 = 50;

#[derive(Template)]
#[template(path = "email/partner_chapter.txt")]
struct PartnerChapterText {
    chapter: Chapter,
    cadence_days: CadenceDays,
}

/// Subject line for a chapter mail.
#[must_use]
pub fn chapter_subject(chapter: Chapter) -> String {
    format!("Rozdział {chapter} — Wasz plan krok po kroku")
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Active schedules could not be read.
    #[error("failed to load schedules: {0}")]
    Load(#[from] RepositoryError),
}

/// Options for a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Send every active schedule regardless of its send time.
    pub force: bool,
    /// Spacing applied to schedules that continue.
    pub interval: Interval,
}

/// Outcome of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Schedules whose chapter was delivered.
    pub processed: usize,
    /// Schedules whose delivery failed.
    pub failed: usize,
}

/// Sends partner chapters for due schedules.
pub struct DripScheduler<'a> {
    store: &'a dyn MailingStore,
    mailer: &'a dyn Mailer,
    chapters: &'a dyn ChapterLibrary,
    from: &'a str,
    max_chapters: Chapter,
}

impl<'a> DripScheduler<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn MailingStore,
        mailer: &'a dyn Mailer,
        chapters: &'a dyn ChapterLibrary,
        from: &'a str,
        max_chapters: Chapter,
    ) -> Self {
        Self {
            store,
            mailer,
            chapters,
            from,
            max_chapters,
        }
    }

    /// Run one batch.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Load` if the schedules can't be read. Per
    /// schedule failures are logged and reported in [`RunReport::failed`].
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        options: RunOptions,
    ) -> Result<RunReport, SchedulerError> {
        let due_before = (!options.force).then_some(now);
        let schedules = self.store.select_active(due_before, BATCH_SIZE).await?;

        let mut report = RunReport::default();
        for due in schedules.into_iter().filter_map(|s| s.into_sendable()) {
            if let Err(e) = self.deliver(&due).await {
                tracing::warn!(
                    mailing_id = %due.id,
                    chapter = %due.chapter,
                    error = %e,
                    "Partner chapter delivery failed"
                );
                report.failed += 1;
                continue;
            }
            report.processed += 1;

            let advance = due.after_delivery(now, options.interval, self.max_chapters);
            self.record(&due, advance).await;
        }

        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            force = options.force,
            "Partner mail run complete"
        );
        Ok(report)
    }

    async fn deliver(&self, due: &DueSchedule) -> Result<(), EmailError> {
        let text = PartnerChapterText {
            chapter: due.chapter,
            cadence_days: due.cadence,
        }
        .render()?;

        let attachments = self
            .chapters
            .attachment(due.chapter)
            .await
            .into_iter()
            .collect();

        self.mailer
            .send(OutgoingEmail {
                from: self.from.to_owned(),
                to: due.recipient.clone(),
                subject: chapter_subject(due.chapter),
                text,
                attachments,
            })
            .await
    }

    async fn record(&self, due: &DueSchedule, advance: Advance) {
        match self.store.apply(due.id, due.chapter, advance).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                mailing_id = %due.id,
                chapter = %due.chapter,
                "Schedule changed during run, transition skipped"
            ),
            Err(e) => tracing::error!(
                mailing_id = %due.id,
                chapter = %due.chapter,
                error = %e,
                "Chapter sent but schedule update failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_names_chapter() {
        assert_eq!(
            chapter_subject(Chapter::new(2)),
            "Rozdział 2 — Wasz plan krok po kroku"
        );
    }

    #[test]
    fn test_body_mentions_cadence_and_chapter() {
        let text = PartnerChapterText {
            chapter: Chapter::new(3),
            cadence_days: CadenceDays::from_request(Some(7)),
        }
        .render()
        .unwrap_or_default();

        assert!(text.starts_with("Cześć!"));
        assert!(text.contains("co 7 dni"));
        assert!(text.contains("Rozdział 3."));
    }
}
