use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::queue::{NewQueuedEmail as DomainNewQueuedEmail, QueuedEmail as DomainQueuedEmail};
use crate::domain::types::{CampaignId, ContactId, EmailAddress, QueuedEmailId, TypeConstraintError};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::email_queue)]
pub struct QueuedEmail {
    pub id: i32,
    pub campaign_id: i32,
    pub contact_id: i32,
    pub recipient_email: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub status: String,
    pub priority: i32,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error_message: Option<String>,
    pub scheduled_at: NaiveDateTime,
    pub sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::email_queue)]
pub struct NewQueuedEmail<'a> {
    pub campaign_id: i32,
    pub contact_id: i32,
    pub recipient_email: &'a str,
    pub subject: &'a str,
    pub html_content: &'a str,
    pub text_content: Option<&'a str>,
    pub priority: i32,
    pub max_attempts: i32,
    pub scheduled_at: NaiveDateTime,
}

/// Delivery outcome written back to a row.
#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::email_queue)]
#[diesel(treat_none_as_null = true)]
pub struct QueueStatusChange<'a> {
    pub status: &'a str,
    pub attempts: i32,
    pub error_message: Option<&'a str>,
    pub scheduled_at: NaiveDateTime,
    pub sent_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<QueuedEmail> for DomainQueuedEmail {
    type Error = TypeConstraintError;

    fn try_from(row: QueuedEmail) -> Result<Self, Self::Error> {
        Ok(Self {
            id: QueuedEmailId::new(row.id)?,
            campaign_id: CampaignId::new(row.campaign_id)?,
            contact_id: ContactId::new(row.contact_id)?,
            recipient_email: EmailAddress::new(row.recipient_email)?,
            subject: row.subject,
            html_content: row.html_content,
            text_content: row.text_content,
            status: row.status.parse()?,
            priority: row.priority,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            error_message: row.error_message,
            scheduled_at: row.scheduled_at,
            sent_at: row.sent_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl<'a> From<&'a DomainNewQueuedEmail> for NewQueuedEmail<'a> {
    fn from(row: &'a DomainNewQueuedEmail) -> Self {
        Self {
            campaign_id: row.campaign_id.get(),
            contact_id: row.contact_id.get(),
            recipient_email: row.recipient_email.as_str(),
            subject: &row.subject,
            html_content: &row.html_content,
            text_content: row.text_content.as_deref(),
            priority: row.priority,
            max_attempts: row.max_attempts,
            scheduled_at: row.scheduled_at,
        }
    }
}

impl<'a> QueueStatusChange<'a> {
    pub fn new(row: &'a DomainQueuedEmail, now: NaiveDateTime) -> Self {
        Self {
            status: row.status.as_str(),
            attempts: row.attempts,
            error_message: row.error_message.as_deref(),
            scheduled_at: row.scheduled_at,
            sent_at: row.sent_at,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::queue::QueueStatus;

    #[test]
    fn failed_row_produces_retry_changeset() {
        let now = NaiveDate::from_ymd_opt(2025, 4, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let row = QueuedEmail {
            id: 1,
            campaign_id: 2,
            contact_id: 3,
            recipient_email: "kwame@example.gh".into(),
            subject: "Hi".into(),
            html_content: "<p>Hi</p>".into(),
            text_content: None,
            status: "SENDING".into(),
            priority: 1,
            attempts: 0,
            max_attempts: 3,
            error_message: None,
            scheduled_at: now,
            sent_at: None,
            created_at: now,
            updated_at: now,
        };
        let mut queued: DomainQueuedEmail = row.try_into().unwrap();
        queued.mark_failed("connection refused", now);

        let change = QueueStatusChange::new(&queued, now);
        assert_eq!(change.status, QueueStatus::Retrying.as_str());
        assert_eq!(change.attempts, 1);
        assert_eq!(change.error_message, Some("connection refused"));
        assert!(change.scheduled_at > now);
    }
}
