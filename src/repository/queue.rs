use chrono::NaiveDateTime;
use diesel::dsl::count_star;
use diesel::prelude::*;

use crate::domain::campaign::CampaignStatus;
use crate::domain::contact::ContactActivity;
use crate::domain::event::{EventType, NewEmailEvent};
use crate::domain::queue::{NewQueuedEmail, QueueStatistics, QueueStatus, QueuedEmail};
use crate::domain::types::{CampaignId, EmailConfigId};
use crate::repository::contact::record_activity;
use crate::repository::email_config::increment_usage;
use crate::repository::errors::{RepositoryError, RepositoryResult};
use crate::repository::{DieselRepository, QueueReader, QueueWriter};

fn outstanding_codes() -> [&'static str; 3] {
    QueueStatus::OUTSTANDING.map(QueueStatus::as_str)
}

impl QueueReader for DieselRepository {
    fn count_outstanding(&self, campaign_id: CampaignId) -> RepositoryResult<i64> {
        use crate::schema::email_queue;

        let mut conn = self.conn()?;
        let total = email_queue::table
            .filter(email_queue::campaign_id.eq(campaign_id.get()))
            .filter(email_queue::status.eq_any(outstanding_codes()))
            .count()
            .get_result::<i64>(&mut conn)?;
        Ok(total)
    }

    fn get_queue_statistics(&self) -> RepositoryResult<QueueStatistics> {
        use crate::schema::email_queue;

        let mut conn = self.conn()?;
        let counts = email_queue::table
            .group_by(email_queue::status)
            .select((email_queue::status, count_star()))
            .load::<(String, i64)>(&mut conn)?;

        let mut stats = QueueStatistics::default();
        for (status, count) in counts {
            match status.parse::<QueueStatus>() {
                Ok(QueueStatus::Pending) => stats.pending = count,
                Ok(QueueStatus::Sending) => stats.sending = count,
                Ok(QueueStatus::Retrying) => stats.retrying = count,
                Ok(QueueStatus::Sent) => stats.sent = count,
                Ok(QueueStatus::Failed) => stats.failed = count,
                Ok(QueueStatus::Cancelled) => stats.cancelled = count,
                Err(_) => log::warn!("Unknown queue status `{status}` in statistics"),
            }
        }
        Ok(stats)
    }
}

impl QueueWriter for DieselRepository {
    fn enqueue_emails(&self, rows: &[NewQueuedEmail]) -> RepositoryResult<usize> {
        use crate::models::queue::NewQueuedEmail as DbNewQueuedEmail;
        use crate::schema::email_queue;

        let mut conn = self.conn()?;
        let insertables: Vec<DbNewQueuedEmail> = rows.iter().map(Into::into).collect();

        let inserted = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let mut inserted = 0;
            for chunk in insertables.chunks(500) {
                inserted += diesel::insert_into(email_queue::table)
                    .values(chunk)
                    .execute(conn)?;
            }
            Ok(inserted)
        })?;

        Ok(inserted)
    }

    fn claim_due_emails(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> RepositoryResult<Vec<QueuedEmail>> {
        use crate::models::queue::QueuedEmail as DbQueuedEmail;
        use crate::schema::{email_campaigns, email_queue};

        let mut conn = self.conn()?;

        let claimed = conn.transaction::<Vec<DbQueuedEmail>, diesel::result::Error, _>(|conn| {
            let sending = email_campaigns::table
                .filter(email_campaigns::status.eq(CampaignStatus::Sending.as_str()))
                .select(email_campaigns::id);

            let due = email_queue::table
                .filter(email_queue::status.eq_any([
                    QueueStatus::Pending.as_str(),
                    QueueStatus::Retrying.as_str(),
                ]))
                .filter(email_queue::scheduled_at.le(now))
                .filter(email_queue::campaign_id.eq_any(sending))
                .order((
                    email_queue::priority.asc(),
                    email_queue::scheduled_at.asc(),
                    email_queue::id.asc(),
                ))
                .limit(limit)
                .select(DbQueuedEmail::as_select())
                .load::<DbQueuedEmail>(conn)?;

            let ids: Vec<i32> = due.iter().map(|row| row.id).collect();
            diesel::update(email_queue::table.filter(email_queue::id.eq_any(&ids)))
                .set((
                    email_queue::status.eq(QueueStatus::Sending.as_str()),
                    email_queue::updated_at.eq(now),
                ))
                .execute(conn)?;

            Ok(due
                .into_iter()
                .map(|mut row| {
                    row.status = QueueStatus::Sending.as_str().to_string();
                    row
                })
                .collect())
        })?;

        let rows = claimed
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<QueuedEmail>, _>>()?;
        Ok(rows)
    }

    fn update_queued_email(&self, row: &QueuedEmail, at: NaiveDateTime) -> RepositoryResult<()> {
        use crate::models::queue::QueueStatusChange;
        use crate::schema::email_queue;

        let mut conn = self.conn()?;
        let changes = QueueStatusChange::new(row, at);
        diesel::update(email_queue::table.find(row.id.get()))
            .set(&changes)
            .execute(&mut conn)?;
        Ok(())
    }

    fn complete_delivery(
        &self,
        row: &QueuedEmail,
        config_id: EmailConfigId,
        at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        use crate::models::event::NewEmailEvent as DbNewEmailEvent;
        use crate::models::queue::QueueStatusChange;
        use crate::schema::{email_campaigns as c, email_events, email_queue};

        let changes = QueueStatusChange::new(row, at);
        let event = NewEmailEvent::new(row.campaign_id, row.contact_id, EventType::Sent);
        let insertable = DbNewEmailEvent::new(&event, at);
        let mut conn = self.conn()?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            diesel::update(email_queue::table.find(row.id.get()))
                .set(&changes)
                .execute(conn)?;
            diesel::update(c::table.find(row.campaign_id.get()))
                .set((c::emails_sent.eq(c::emails_sent + 1), c::updated_at.eq(at)))
                .execute(conn)?;
            record_activity(conn, row.contact_id, ContactActivity::Received, at)?;
            increment_usage(conn, config_id, at)?;
            diesel::insert_into(email_events::table)
                .values(&insertable)
                .execute(conn)?;
            Ok(())
        })
    }

    fn give_up_delivery(&self, row: &QueuedEmail, at: NaiveDateTime) -> RepositoryResult<()> {
        use crate::models::event::NewEmailEvent as DbNewEmailEvent;
        use crate::models::queue::QueueStatusChange;
        use crate::schema::{email_campaigns as c, email_events, email_queue};

        let changes = QueueStatusChange::new(row, at);
        let mut event = NewEmailEvent::new(row.campaign_id, row.contact_id, EventType::Failed);
        event.data = serde_json::json!({ "error": row.error_message });
        let insertable = DbNewEmailEvent::new(&event, at);
        let mut conn = self.conn()?;

        conn.transaction::<_, RepositoryError, _>(|conn| {
            diesel::update(email_queue::table.find(row.id.get()))
                .set(&changes)
                .execute(conn)?;
            diesel::update(c::table.find(row.campaign_id.get()))
                .set((c::emails_failed.eq(c::emails_failed + 1), c::updated_at.eq(at)))
                .execute(conn)?;
            diesel::insert_into(email_events::table)
                .values(&insertable)
                .execute(conn)?;
            Ok(())
        })
    }

    fn release_stale_claims(
        &self,
        claimed_before: NaiveDateTime,
        at: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        use crate::schema::email_queue;

        let mut conn = self.conn()?;
        let released = diesel::update(
            email_queue::table
                .filter(email_queue::status.eq(QueueStatus::Sending.as_str()))
                .filter(email_queue::updated_at.lt(claimed_before)),
        )
        .set((
            email_queue::status.eq(QueueStatus::Retrying.as_str()),
            email_queue::updated_at.eq(at),
        ))
        .execute(&mut conn)?;
        Ok(released)
    }

    fn cancel_queued_emails(&self, campaign_id: CampaignId) -> RepositoryResult<usize> {
        use crate::schema::email_queue;

        let mut conn = self.conn()?;
        let cancelled = diesel::update(
            email_queue::table
                .filter(email_queue::campaign_id.eq(campaign_id.get()))
                .filter(email_queue::status.eq_any([
                    QueueStatus::Pending.as_str(),
                    QueueStatus::Retrying.as_str(),
                ])),
        )
        .set((
            email_queue::status.eq(QueueStatus::Cancelled.as_str()),
            email_queue::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;
        Ok(cancelled)
    }
}
