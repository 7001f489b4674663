use serde::Deserialize;
use validator::Validate;

use crate::domain::campaign::{CampaignPriority, CampaignType, NewEmailCampaign};
use crate::domain::types::{
    CampaignName, ContactListId, EmailAddress, EmailConfigId, TemplateId, UserId,
};
use crate::forms::{FormError, checkbox, clean_text, optional_number, parse_datetime, trimmed};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CampaignForm {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub campaign_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub email_config_id: Option<i32>,
    #[serde(default, deserialize_with = "optional_number")]
    pub template_id: Option<i32>,
    #[validate(length(max = 300))]
    #[serde(default)]
    pub subject: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub preheader: Option<String>,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub from_email: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub html_content: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<String>,
    #[serde(default, deserialize_with = "checkbox")]
    pub send_immediately: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub track_opens: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub track_clicks: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub track_unsubscribes: bool,
    #[serde(default)]
    pub list_ids: Vec<i32>,
}

/// Validated campaign plus its target lists.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignPayload {
    pub campaign: NewEmailCampaign,
    pub list_ids: Vec<ContactListId>,
}

impl CampaignForm {
    pub fn into_payload(self, user_id: UserId) -> Result<CampaignPayload, FormError> {
        self.validate()?;

        let campaign_type = match trimmed(self.campaign_type) {
            Some(code) => code.parse()?,
            None => CampaignType::Regular,
        };
        let priority = match trimmed(self.priority) {
            Some(code) => code.parse()?,
            None => CampaignPriority::Normal,
        };
        let from_email = match trimmed(Some(self.from_email)) {
            Some(email) => EmailAddress::new(email)?.into_inner(),
            None => String::new(),
        };
        let reply_to = trimmed(self.reply_to)
            .map(|email| EmailAddress::new(email).map(EmailAddress::into_inner))
            .transpose()?;
        let scheduled_at = trimmed(self.scheduled_at)
            .map(|raw| parse_datetime(&raw))
            .transpose()?;

        let mut list_ids = self
            .list_ids
            .into_iter()
            .map(ContactListId::new)
            .collect::<Result<Vec<_>, _>>()?;
        list_ids.sort_unstable();
        list_ids.dedup();

        Ok(CampaignPayload {
            campaign: NewEmailCampaign {
                user_id,
                name: CampaignName::new(ammonia::clean(self.name.trim()))?,
                description: clean_text(self.description),
                campaign_type,
                priority,
                email_config_id: self.email_config_id.map(EmailConfigId::new).transpose()?,
                template_id: self.template_id.map(TemplateId::new).transpose()?,
                subject: self.subject.trim().to_string(),
                preheader: clean_text(self.preheader),
                from_name: ammonia::clean(self.from_name.trim()),
                from_email,
                reply_to,
                html_content: self.html_content,
                text_content: trimmed(self.text_content),
                scheduled_at,
                send_immediately: self.send_immediately,
                track_opens: self.track_opens,
                track_clicks: self.track_clicks,
                track_unsubscribes: self.track_unsubscribes,
            },
            list_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_form_parses_lists_and_schedule() {
        let raw = "name=Launch&subject=Hi&html_content=%3Cp%3EHi%3C%2Fp%3E\
                   &email_config_id=3&template_id=&list_ids=2&list_ids=1&list_ids=2\
                   &scheduled_at=2025-06-01T09%3A30&track_opens=on&priority=high";
        let form: CampaignForm = serde_html_form::from_str(raw).unwrap();
        let payload = form.into_payload(UserId::new(1).unwrap()).unwrap();

        assert_eq!(payload.list_ids.len(), 2);
        assert_eq!(payload.campaign.priority, CampaignPriority::High);
        assert_eq!(payload.campaign.template_id, None);
        assert_eq!(
            payload.campaign.email_config_id,
            Some(EmailConfigId::new(3).unwrap())
        );
        assert!(payload.campaign.track_opens);
        assert!(!payload.campaign.track_clicks);
        assert_eq!(
            payload.campaign.scheduled_at.map(|at| at.to_string()),
            Some("2025-06-01 09:30:00".to_string())
        );
    }

    #[test]
    fn bad_sender_is_rejected() {
        let form = CampaignForm {
            name: "Launch".into(),
            from_email: "nope".into(),
            ..CampaignForm::default()
        };
        assert!(matches!(
            form.into_payload(UserId::new(1).unwrap()),
            Err(FormError::InvalidEmail)
        ));
    }
}
