//! Email campaigns: authoring state, lifecycle transitions and delivery counters.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::contact::round2;
use crate::domain::email_config::EmailDomainConfig;
use crate::domain::types::{
    CampaignId, CampaignName, EmailConfigId, TemplateId, UserId, code_enum,
};

code_enum! {
    CampaignType {
        Regular => "REGULAR",
        AbTest => "A_B_TEST",
        Autoresponder => "AUTORESPONDER",
        Rss => "RSS",
    }
}

code_enum! {
    CampaignStatus {
        Draft => "DRAFT",
        Scheduled => "SCHEDULED",
        Sending => "SENDING",
        Sent => "SENT",
        Paused => "PAUSED",
        Cancelled => "CANCELLED",
        Failed => "FAILED",
    }
}

code_enum! {
    CampaignPriority {
        Low => "LOW",
        Normal => "NORMAL",
        High => "HIGH",
    }
}

impl CampaignPriority {
    /// Queue ordering value; lower values are delivered first.
    pub const fn queue_priority(self) -> i32 {
        match self {
            CampaignPriority::High => 1,
            CampaignPriority::Normal => 5,
            CampaignPriority::Low => 10,
        }
    }
}

/// Why a campaign cannot be sent or change state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CampaignStateError {
    #[error("Campaign is not in draft status")]
    NotDraft,
    #[error("No email configuration selected")]
    NoEmailConfig,
    #[error("Email domain is not verified")]
    DomainNotVerified,
    #[error("Campaign has no recipients")]
    NoRecipients,
    #[error("Email configuration has reached sending limits")]
    SendingLimitReached,
    #[error("Campaign has no content")]
    NoContent,
    #[error("Campaign has no subject")]
    NoSubject,
    #[error("Only sending campaigns can be paused")]
    CannotPause,
    #[error("Only paused campaigns can be resumed")]
    CannotResume,
    #[error("Campaign cannot be cancelled in its current status")]
    CannotCancel,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmailCampaign {
    pub id: CampaignId,
    pub user_id: UserId,
    pub name: CampaignName,
    pub description: Option<String>,
    pub campaign_type: CampaignType,
    pub status: CampaignStatus,
    pub priority: CampaignPriority,
    pub email_config_id: Option<EmailConfigId>,
    pub template_id: Option<TemplateId>,
    pub subject: String,
    pub preheader: Option<String>,
    pub from_name: String,
    pub from_email: String,
    pub reply_to: Option<String>,
    pub html_content: String,
    pub text_content: Option<String>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub send_immediately: bool,
    pub track_opens: bool,
    pub track_clicks: bool,
    pub track_unsubscribes: bool,
    pub recipient_count: i32,
    pub emails_sent: i32,
    pub emails_delivered: i32,
    pub emails_bounced: i32,
    pub emails_failed: i32,
    pub unique_opens: i32,
    pub total_opens: i32,
    pub unique_clicks: i32,
    pub total_clicks: i32,
    pub unsubscribes: i32,
    pub complaints: i32,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

fn rate(part: i32, whole: i32) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        round2(f64::from(part) / f64::from(whole) * 100.0)
    }
}

impl EmailCampaign {
    pub fn open_rate(&self) -> f64 {
        rate(self.unique_opens, self.emails_delivered)
    }

    pub fn click_rate(&self) -> f64 {
        rate(self.unique_clicks, self.emails_delivered)
    }

    pub fn unsubscribe_rate(&self) -> f64 {
        rate(self.unsubscribes, self.emails_delivered)
    }

    pub fn complaint_rate(&self) -> f64 {
        rate(self.complaints, self.emails_delivered)
    }

    pub fn bounce_rate(&self) -> f64 {
        rate(self.emails_bounced, self.emails_sent)
    }

    pub fn delivery_rate(&self) -> f64 {
        rate(self.emails_delivered, self.emails_sent)
    }

    pub fn is_editable(&self) -> bool {
        self.status == CampaignStatus::Draft
    }

    /// Checks every precondition for sending in a fixed order.
    pub fn validate_for_send(
        &self,
        config: Option<&EmailDomainConfig>,
        recipient_count: i64,
    ) -> Result<(), CampaignStateError> {
        if self.status != CampaignStatus::Draft {
            return Err(CampaignStateError::NotDraft);
        }
        let config = config.ok_or(CampaignStateError::NoEmailConfig)?;
        if !config.is_verified() {
            return Err(CampaignStateError::DomainNotVerified);
        }
        if recipient_count <= 0 {
            return Err(CampaignStateError::NoRecipients);
        }
        if !config.can_send() {
            return Err(CampaignStateError::SendingLimitReached);
        }
        if self.html_content.trim().is_empty()
            && self
                .text_content
                .as_deref()
                .is_none_or(|text| text.trim().is_empty())
        {
            return Err(CampaignStateError::NoContent);
        }
        if self.subject.trim().is_empty() {
            return Err(CampaignStateError::NoSubject);
        }
        Ok(())
    }

    /// Whether a send request should only schedule the campaign.
    pub fn should_schedule(&self, now: NaiveDateTime) -> bool {
        !self.send_immediately && self.scheduled_at.is_some_and(|at| at > now)
    }

    pub fn pause(&mut self) -> Result<(), CampaignStateError> {
        if self.status != CampaignStatus::Sending {
            return Err(CampaignStateError::CannotPause);
        }
        self.status = CampaignStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), CampaignStateError> {
        if self.status != CampaignStatus::Paused {
            return Err(CampaignStateError::CannotResume);
        }
        self.status = CampaignStatus::Sending;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), CampaignStateError> {
        match self.status {
            CampaignStatus::Sending | CampaignStatus::Paused | CampaignStatus::Scheduled => {
                self.status = CampaignStatus::Cancelled;
                Ok(())
            }
            _ => Err(CampaignStateError::CannotCancel),
        }
    }

    /// Draft copy with the same content and settings but fresh counters.
    pub fn duplicate(&self) -> NewEmailCampaign {
        NewEmailCampaign {
            user_id: self.user_id,
            name: CampaignName::new(format!("Copy of {}", self.name))
                .unwrap_or_else(|_| self.name.clone()),
            description: self.description.clone(),
            campaign_type: self.campaign_type,
            priority: self.priority,
            email_config_id: self.email_config_id,
            template_id: self.template_id,
            subject: self.subject.clone(),
            preheader: self.preheader.clone(),
            from_name: self.from_name.clone(),
            from_email: self.from_email.clone(),
            reply_to: self.reply_to.clone(),
            html_content: self.html_content.clone(),
            text_content: self.text_content.clone(),
            scheduled_at: None,
            send_immediately: false,
            track_opens: self.track_opens,
            track_clicks: self.track_clicks,
            track_unsubscribes: self.track_unsubscribes,
        }
    }

    pub fn statistics(&self) -> CampaignStatistics {
        CampaignStatistics {
            recipients: self.recipient_count,
            sent: self.emails_sent,
            delivered: self.emails_delivered,
            bounced: self.emails_bounced,
            failed: self.emails_failed,
            unique_opens: self.unique_opens,
            total_opens: self.total_opens,
            unique_clicks: self.unique_clicks,
            total_clicks: self.total_clicks,
            unsubscribes: self.unsubscribes,
            complaints: self.complaints,
            open_rate: self.open_rate(),
            click_rate: self.click_rate(),
            bounce_rate: self.bounce_rate(),
            delivery_rate: self.delivery_rate(),
            unsubscribe_rate: self.unsubscribe_rate(),
            complaint_rate: self.complaint_rate(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_seconds: match (self.started_at, self.completed_at) {
                (Some(start), Some(end)) => Some((end - start).num_seconds()),
                _ => None,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewEmailCampaign {
    pub user_id: UserId,
    pub name: CampaignName,
    pub description: Option<String>,
    pub campaign_type: CampaignType,
    pub priority: CampaignPriority,
    pub email_config_id: Option<EmailConfigId>,
    pub template_id: Option<TemplateId>,
    pub subject: String,
    pub preheader: Option<String>,
    pub from_name: String,
    pub from_email: String,
    pub reply_to: Option<String>,
    pub html_content: String,
    pub text_content: Option<String>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub send_immediately: bool,
    pub track_opens: bool,
    pub track_clicks: bool,
    pub track_unsubscribes: bool,
}

/// Increments applied to a campaign's delivery and engagement counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CampaignCounterDelta {
    pub sent: i32,
    pub delivered: i32,
    pub bounced: i32,
    pub failed: i32,
    pub unique_opens: i32,
    pub total_opens: i32,
    pub unique_clicks: i32,
    pub total_clicks: i32,
    pub unsubscribes: i32,
    pub complaints: i32,
}

/// Authoring fields editable while the campaign is a draft.
pub type UpdateEmailCampaign = NewEmailCampaign;

/// Flattened counters, rates and timing of a campaign.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CampaignStatistics {
    pub recipients: i32,
    pub sent: i32,
    pub delivered: i32,
    pub bounced: i32,
    pub failed: i32,
    pub unique_opens: i32,
    pub total_opens: i32,
    pub unique_clicks: i32,
    pub total_clicks: i32,
    pub unsubscribes: i32,
    pub complaints: i32,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
    pub delivery_rate: f64,
    pub unsubscribe_rate: f64,
    pub complaint_rate: f64,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub duration_seconds: Option<i64>,
}

/// One point on a campaign's activity timeline.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TimelineEntry {
    pub at: NaiveDateTime,
    pub label: String,
    pub count: i64,
}

/// Aggregate over a user's recent campaigns.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct CampaignSummary {
    pub total_campaigns: i64,
    pub sent_campaigns: i64,
    pub total_emails_sent: i64,
    pub total_delivered: i64,
    pub total_unique_opens: i64,
    pub total_unique_clicks: i64,
    pub average_open_rate: f64,
    pub average_click_rate: f64,
}

impl CampaignSummary {
    pub fn from_campaigns(campaigns: &[EmailCampaign]) -> Self {
        let sent: Vec<&EmailCampaign> = campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Sent)
            .collect();
        let average = |f: fn(&EmailCampaign) -> f64| {
            if sent.is_empty() {
                0.0
            } else {
                round2(sent.iter().map(|c| f(c)).sum::<f64>() / sent.len() as f64)
            }
        };
        Self {
            total_campaigns: campaigns.len() as i64,
            sent_campaigns: sent.len() as i64,
            total_emails_sent: campaigns.iter().map(|c| i64::from(c.emails_sent)).sum(),
            total_delivered: campaigns.iter().map(|c| i64::from(c.emails_delivered)).sum(),
            total_unique_opens: campaigns.iter().map(|c| i64::from(c.unique_opens)).sum(),
            total_unique_clicks: campaigns.iter().map(|c| i64::from(c.unique_clicks)).sum(),
            average_open_rate: average(EmailCampaign::open_rate),
            average_click_rate: average(EmailCampaign::click_rate),
        }
    }
}
