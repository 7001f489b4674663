use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::event::{EmailEvent as DomainEmailEvent, NewEmailEvent as DomainNewEmailEvent};
use crate::domain::types::{CampaignId, ContactId, EventId, TypeConstraintError};
use crate::models::{parse_json, to_json};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::email_events)]
pub struct EmailEvent {
    pub id: i32,
    pub campaign_id: i32,
    pub contact_id: i32,
    pub event_type: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub clicked_url: Option<String>,
    pub bounce_type: Option<String>,
    pub bounce_reason: Option<String>,
    pub data: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::email_events)]
pub struct NewEmailEvent<'a> {
    pub campaign_id: i32,
    pub contact_id: i32,
    pub event_type: &'a str,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub clicked_url: Option<&'a str>,
    pub bounce_type: Option<&'a str>,
    pub bounce_reason: Option<&'a str>,
    pub data: String,
    pub created_at: NaiveDateTime,
}

impl TryFrom<EmailEvent> for DomainEmailEvent {
    type Error = TypeConstraintError;

    fn try_from(event: EmailEvent) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EventId::new(event.id)?,
            campaign_id: CampaignId::new(event.campaign_id)?,
            contact_id: ContactId::new(event.contact_id)?,
            event_type: event.event_type.parse()?,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            clicked_url: event.clicked_url,
            bounce_type: event.bounce_type.map(|b| b.parse()).transpose()?,
            bounce_reason: event.bounce_reason,
            data: parse_json(&event.data, "data")?,
            created_at: event.created_at,
        })
    }
}

impl<'a> NewEmailEvent<'a> {
    pub fn new(event: &'a DomainNewEmailEvent, now: NaiveDateTime) -> Self {
        Self {
            campaign_id: event.campaign_id.get(),
            contact_id: event.contact_id.get(),
            event_type: event.event_type.as_str(),
            ip_address: event.ip_address.as_deref(),
            user_agent: event.user_agent.as_deref(),
            clicked_url: event.clicked_url.as_deref(),
            bounce_type: event.bounce_type.map(|b| b.as_str()),
            bounce_reason: event.bounce_reason.as_deref(),
            data: to_json(&event.data),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::event::{BounceType, EventType};

    #[test]
    fn bounce_details_survive_conversion() {
        let now = NaiveDate::from_ymd_opt(2025, 4, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut domain = DomainNewEmailEvent::new(
            CampaignId::new(1).unwrap(),
            ContactId::new(2).unwrap(),
            EventType::Bounced,
        );
        domain.bounce_type = Some(BounceType::Hard);
        let row = NewEmailEvent::new(&domain, now);
        assert_eq!(row.bounce_type, Some("HARD"));

        let stored = EmailEvent {
            id: 1,
            campaign_id: row.campaign_id,
            contact_id: row.contact_id,
            event_type: row.event_type.into(),
            ip_address: None,
            user_agent: None,
            clicked_url: None,
            bounce_type: row.bounce_type.map(Into::into),
            bounce_reason: None,
            data: row.data.clone(),
            created_at: now,
        };
        let event: DomainEmailEvent = stored.try_into().unwrap();
        assert_eq!(event.event_type, EventType::Bounced);
        assert_eq!(event.bounce_type, Some(BounceType::Hard));
    }
}
