//! Partner mailing repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use guidebook_core::{CadenceDays, Chapter, MailingId, MailingStatus};

use super::{MailingStore, RepositoryError, parse_stored_email};
use crate::models::{Advance, MailingSchedule, NewMailing, ScheduleState};

/// Postgres-backed [`MailingStore`].
#[derive(Clone)]
pub struct MailingRepository {
    pool: PgPool,
}

impl MailingRepository {
    /// Create a new mailing repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct MailingRow {
    id: i64,
    user_email: String,
    partner_email: String,
    cadence_days: i32,
    current_chapter: i32,
    next_send_at: DateTime<Utc>,
    status: String,
}

impl TryFrom<MailingRow> for MailingSchedule {
    type Error = RepositoryError;

    fn try_from(row: MailingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<MailingStatus>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        let chapter = Chapter::from_stored(row.current_chapter);

        let state = match status {
            MailingStatus::Active => ScheduleState::Active {
                chapter,
                next_send_at: row.next_send_at,
            },
            MailingStatus::Finished => ScheduleState::Finished {
                last_chapter: chapter,
            },
        };

        Ok(Self {
            id: MailingId::new(row.id),
            user_email: parse_stored_email(&row.user_email)?,
            recipient: parse_stored_email(&row.partner_email)?,
            cadence: CadenceDays::from_stored(row.cadence_days),
            state,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, user_email, partner_email, cadence_days, current_chapter, next_send_at, status";

#[async_trait]
impl MailingStore for MailingRepository {
    async fn insert(&self, mailing: NewMailing) -> Result<MailingSchedule, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO storefront.partner_mailing
                (user_email, partner_email, cadence_days, current_chapter, next_send_at, status)
            VALUES ($1, $2, $3, 1, $4, 'active')
            RETURNING {SELECT_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, MailingRow>(&sql)
            .bind(mailing.user_email.as_str())
            .bind(mailing.recipient.as_str())
            .bind(i32::from(mailing.cadence.get()))
            .bind(mailing.first_send_at)
            .fetch_one(&self.pool)
            .await?;

        MailingSchedule::try_from(row)
    }

    async fn select_active(
        &self,
        due_before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<MailingSchedule>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {SELECT_COLUMNS}
            FROM storefront.partner_mailing
            WHERE status = 'active'
              AND ($1::timestamptz IS NULL OR next_send_at <= $1)
            ORDER BY next_send_at ASC, id ASC
            LIMIT $2
            "
        );

        let rows = sqlx::query_as::<_, MailingRow>(&sql)
            .bind(due_before)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(MailingSchedule::try_from).collect()
    }

    async fn apply(
        &self,
        id: MailingId,
        expected_chapter: Chapter,
        advance: Advance,
    ) -> Result<bool, RepositoryError> {
        let result = match advance {
            Advance::Continue {
                chapter,
                next_send_at,
            } => {
                sqlx::query(
                    r"
                    UPDATE storefront.partner_mailing
                    SET current_chapter = $3, next_send_at = $4
                    WHERE id = $1 AND status = 'active' AND current_chapter = $2
                    ",
                )
                .bind(id.get())
                .bind(expected_chapter.to_stored())
                .bind(chapter.to_stored())
                .bind(next_send_at)
                .execute(&self.pool)
                .await?
            }
            Advance::Finish => {
                sqlx::query(
                    r"
                    UPDATE storefront.partner_mailing
                    SET status = 'finished'
                    WHERE id = $1 AND status = 'active' AND current_chapter = $2
                    ",
                )
                .bind(id.get())
                .bind(expected_chapter.to_stored())
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }
}
