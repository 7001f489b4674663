use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::campaign::{
    EmailCampaign as DomainEmailCampaign, NewEmailCampaign as DomainNewEmailCampaign,
};
use crate::domain::types::{
    CampaignId, CampaignName, EmailConfigId, TemplateId, TypeConstraintError, UserId,
};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::email_campaigns)]
pub struct EmailCampaign {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub campaign_type: String,
    pub status: String,
    pub priority: String,
    pub email_config_id: Option<i32>,
    pub template_id: Option<i32>,
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

/// Authoring columns shared by inserts and draft updates.
#[derive(Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::email_campaigns)]
#[diesel(treat_none_as_null = true)]
pub struct CampaignContent<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub campaign_type: &'a str,
    pub priority: &'a str,
    pub email_config_id: Option<i32>,
    pub template_id: Option<i32>,
    pub subject: &'a str,
    pub preheader: Option<&'a str>,
    pub from_name: &'a str,
    pub from_email: &'a str,
    pub reply_to: Option<&'a str>,
    pub html_content: &'a str,
    pub text_content: Option<&'a str>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub send_immediately: bool,
    pub track_opens: bool,
    pub track_clicks: bool,
    pub track_unsubscribes: bool,
    pub updated_at: NaiveDateTime,
}

/// Lifecycle columns changed by send/pause/resume/cancel/complete.
#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::email_campaigns)]
pub struct CampaignStatusChange<'a> {
    pub status: &'a str,
    pub recipient_count: Option<i32>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::campaign_lists)]
pub struct NewCampaignList {
    pub campaign_id: i32,
    pub list_id: i32,
}

impl TryFrom<EmailCampaign> for DomainEmailCampaign {
    type Error = TypeConstraintError;

    fn try_from(campaign: EmailCampaign) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CampaignId::new(campaign.id)?,
            user_id: UserId::new(campaign.user_id)?,
            name: CampaignName::new(campaign.name)?,
            description: campaign.description,
            campaign_type: campaign.campaign_type.parse()?,
            status: campaign.status.parse()?,
            priority: campaign.priority.parse()?,
            email_config_id: campaign.email_config_id.map(EmailConfigId::new).transpose()?,
            template_id: campaign.template_id.map(TemplateId::new).transpose()?,
            subject: campaign.subject,
            preheader: campaign.preheader,
            from_name: campaign.from_name,
            from_email: campaign.from_email,
            reply_to: campaign.reply_to,
            html_content: campaign.html_content,
            text_content: campaign.text_content,
            scheduled_at: campaign.scheduled_at,
            send_immediately: campaign.send_immediately,
            track_opens: campaign.track_opens,
            track_clicks: campaign.track_clicks,
            track_unsubscribes: campaign.track_unsubscribes,
            recipient_count: campaign.recipient_count,
            emails_sent: campaign.emails_sent,
            emails_delivered: campaign.emails_delivered,
            emails_bounced: campaign.emails_bounced,
            emails_failed: campaign.emails_failed,
            unique_opens: campaign.unique_opens,
            total_opens: campaign.total_opens,
            unique_clicks: campaign.unique_clicks,
            total_clicks: campaign.total_clicks,
            unsubscribes: campaign.unsubscribes,
            complaints: campaign.complaints,
            started_at: campaign.started_at,
            completed_at: campaign.completed_at,
            created_at: campaign.created_at,
            updated_at: campaign.updated_at,
        })
    }
}

impl<'a> CampaignContent<'a> {
    pub fn new(campaign: &'a DomainNewEmailCampaign, now: NaiveDateTime) -> Self {
        Self {
            user_id: campaign.user_id.get(),
            name: campaign.name.as_str(),
            description: campaign.description.as_deref(),
            campaign_type: campaign.campaign_type.as_str(),
            priority: campaign.priority.as_str(),
            email_config_id: campaign.email_config_id.map(EmailConfigId::get),
            template_id: campaign.template_id.map(TemplateId::get),
            subject: &campaign.subject,
            preheader: campaign.preheader.as_deref(),
            from_name: &campaign.from_name,
            from_email: &campaign.from_email,
            reply_to: campaign.reply_to.as_deref(),
            html_content: &campaign.html_content,
            text_content: campaign.text_content.as_deref(),
            scheduled_at: campaign.scheduled_at,
            send_immediately: campaign.send_immediately,
            track_opens: campaign.track_opens,
            track_clicks: campaign.track_clicks,
            track_unsubscribes: campaign.track_unsubscribes,
            updated_at: now,
        }
    }
}

impl<'a> From<&'a DomainEmailCampaign> for CampaignStatusChange<'a> {
    fn from(campaign: &'a DomainEmailCampaign) -> Self {
        Self {
            status: campaign.status.as_str(),
            recipient_count: Some(campaign.recipient_count),
            started_at: campaign.started_at,
            completed_at: campaign.completed_at,
            updated_at: campaign.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::campaign::CampaignStatus;
    use crate::domain::campaign::tests::sample_campaign;

    #[test]
    fn content_changeset_uses_codes() {
        let campaign = sample_campaign(CampaignStatus::Draft);
        let new = campaign.duplicate();
        let content = CampaignContent::new(&new, campaign.created_at);
        assert_eq!(content.campaign_type, "REGULAR");
        assert_eq!(content.priority, "NORMAL");
        assert_eq!(content.email_config_id, Some(3));
        assert_eq!(content.name, "Copy of May newsletter");
    }

    #[test]
    fn status_change_mirrors_domain() {
        let mut campaign = sample_campaign(CampaignStatus::Sending);
        campaign.pause().unwrap();
        let change: CampaignStatusChange = (&campaign).into();
        assert_eq!(change.status, "PAUSED");
    }
}
