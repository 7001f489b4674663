//! Personalized messages waiting for delivery.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::{CampaignId, ContactId, EmailAddress, QueuedEmailId, code_enum};

pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;
/// Rows delivered per queue pass.
pub const BATCH_SIZE: usize = 50;
/// Retry delay grows by this many minutes per attempt.
pub const RETRY_BACKOFF_MINUTES: i64 = 5;
/// Claimed rows untouched for this long are handed back to the queue.
pub const STALE_CLAIM_MINUTES: i64 = 15;

code_enum! {
    QueueStatus {
        Pending => "PENDING",
        Sending => "SENDING",
        Sent => "SENT",
        Failed => "FAILED",
        Retrying => "RETRYING",
        Cancelled => "CANCELLED",
    }
}

impl QueueStatus {
    /// Rows that still have to be delivered.
    pub const OUTSTANDING: [QueueStatus; 3] =
        [QueueStatus::Pending, QueueStatus::Retrying, QueueStatus::Sending];

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            QueueStatus::Sent | QueueStatus::Failed | QueueStatus::Cancelled
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QueuedEmail {
    pub id: QueuedEmailId,
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    pub recipient_email: EmailAddress,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub status: QueueStatus,
    pub priority: i32,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error_message: Option<String>,
    pub scheduled_at: NaiveDateTime,
    pub sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// What happened to a row after a failed delivery attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    Retry { at: NaiveDateTime },
    GaveUp,
}

impl QueuedEmail {
    pub fn mark_sent(&mut self, at: NaiveDateTime) {
        self.status = QueueStatus::Sent;
        self.sent_at = Some(at);
        self.error_message = None;
    }

    /// Records a failed attempt and either reschedules or gives up.
    pub fn mark_failed(&mut self, error: impl Into<String>, now: NaiveDateTime) -> FailureOutcome {
        self.attempts += 1;
        self.error_message = Some(error.into());
        if self.attempts >= self.max_attempts {
            self.status = QueueStatus::Failed;
            FailureOutcome::GaveUp
        } else {
            let at = now + Duration::minutes(RETRY_BACKOFF_MINUTES * i64::from(self.attempts));
            self.status = QueueStatus::Retrying;
            self.scheduled_at = at;
            FailureOutcome::Retry { at }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewQueuedEmail {
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    pub recipient_email: EmailAddress,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub priority: i32,
    pub max_attempts: i32,
    pub scheduled_at: NaiveDateTime,
}

/// Queue backlog per status.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct QueueStatistics {
    pub pending: i64,
    pub sending: i64,
    pub retrying: i64,
    pub sent: i64,
    pub failed: i64,
    pub cancelled: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contact::tests::now;

    fn sample_row() -> QueuedEmail {
        QueuedEmail {
            id: QueuedEmailId::new(1).unwrap(),
            campaign_id: CampaignId::new(5).unwrap(),
            contact_id: ContactId::new(7).unwrap(),
            recipient_email: EmailAddress::new("a@example.com").unwrap(),
            subject: "Hi".into(),
            html_content: "<p>Hi</p>".into(),
            text_content: None,
            status: QueueStatus::Sending,
            priority: 5,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            error_message: None,
            scheduled_at: now(),
            sent_at: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn failures_back_off_then_give_up() {
        let mut row = sample_row();

        let first = row.mark_failed("timeout", now());
        assert_eq!(
            first,
            FailureOutcome::Retry {
                at: now() + Duration::minutes(5)
            }
        );
        assert_eq!(row.status, QueueStatus::Retrying);

        let second = row.mark_failed("timeout", now());
        assert_eq!(
            second,
            FailureOutcome::Retry {
                at: now() + Duration::minutes(10)
            }
        );

        assert_eq!(row.mark_failed("refused", now()), FailureOutcome::GaveUp);
        assert_eq!(row.status, QueueStatus::Failed);
        assert_eq!(row.attempts, 3);
        assert_eq!(row.error_message.as_deref(), Some("refused"));
    }

    #[test]
    fn sent_rows_are_finished() {
        let mut row = sample_row();
        row.mark_sent(now());
        assert!(row.status.is_finished());
        assert_eq!(row.sent_at, Some(now()));
        assert!(!QueueStatus::Retrying.is_finished());
    }
}
