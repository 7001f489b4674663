use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::contact::{
    Contact as DomainContact, NewContact as DomainNewContact, UpdateContact as DomainUpdateContact,
};
use crate::domain::types::{ContactId, EmailAddress, TypeConstraintError, UserId};
use crate::models::{parse_json, to_json};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::contacts)]
/// Diesel model for [`crate::domain::contact::Contact`].
pub struct Contact {
    pub id: i32,
    pub user_id: i32,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub website: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub is_active: bool,
    pub subscribed_at: NaiveDateTime,
    pub unsubscribed_at: Option<NaiveDateTime>,
    pub unsubscribe_reason: Option<String>,
    pub source: String,
    pub referrer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub custom_fields: String,
    pub engagement_score: f64,
    pub total_emails_received: i32,
    pub total_emails_opened: i32,
    pub total_emails_clicked: i32,
    pub last_email_opened_at: Option<NaiveDateTime>,
    pub last_email_clicked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::contacts)]
pub struct NewContact<'a> {
    pub user_id: i32,
    pub email: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub company: Option<&'a str>,
    pub job_title: Option<&'a str>,
    pub website: Option<&'a str>,
    pub city: Option<&'a str>,
    pub country: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub source: &'a str,
    pub referrer: Option<&'a str>,
    pub utm_source: Option<&'a str>,
    pub utm_medium: Option<&'a str>,
    pub utm_campaign: Option<&'a str>,
    pub custom_fields: String,
    pub subscribed_at: NaiveDateTime,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::contacts)]
#[diesel(treat_none_as_null = true)]
pub struct UpdateContact<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub company: Option<&'a str>,
    pub job_title: Option<&'a str>,
    pub website: Option<&'a str>,
    pub city: Option<&'a str>,
    pub country: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub custom_fields: String,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<Contact> for DomainContact {
    type Error = TypeConstraintError;

    fn try_from(contact: Contact) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ContactId::new(contact.id)?,
            user_id: UserId::new(contact.user_id)?,
            email: EmailAddress::new(contact.email)?,
            first_name: contact.first_name,
            last_name: contact.last_name,
            phone: contact.phone,
            company: contact.company,
            job_title: contact.job_title,
            website: contact.website,
            city: contact.city,
            country: contact.country,
            notes: contact.notes,
            status: contact.status.parse()?,
            is_active: contact.is_active,
            subscribed_at: contact.subscribed_at,
            unsubscribed_at: contact.unsubscribed_at,
            unsubscribe_reason: contact.unsubscribe_reason,
            source: contact.source.parse()?,
            referrer: contact.referrer,
            utm_source: contact.utm_source,
            utm_medium: contact.utm_medium,
            utm_campaign: contact.utm_campaign,
            custom_fields: parse_json(&contact.custom_fields, "custom_fields")?,
            engagement_score: contact.engagement_score,
            total_emails_received: contact.total_emails_received,
            total_emails_opened: contact.total_emails_opened,
            total_emails_clicked: contact.total_emails_clicked,
            last_email_opened_at: contact.last_email_opened_at,
            last_email_clicked_at: contact.last_email_clicked_at,
            created_at: contact.created_at,
            updated_at: contact.updated_at,
        })
    }
}

impl<'a> NewContact<'a> {
    pub fn new(contact: &'a DomainNewContact, now: NaiveDateTime) -> Self {
        Self {
            user_id: contact.user_id.get(),
            email: contact.email.as_str(),
            first_name: contact.first_name.as_deref(),
            last_name: contact.last_name.as_deref(),
            phone: contact.phone.as_deref(),
            company: contact.company.as_deref(),
            job_title: contact.job_title.as_deref(),
            website: contact.website.as_deref(),
            city: contact.city.as_deref(),
            country: contact.country.as_deref(),
            notes: contact.notes.as_deref(),
            source: contact.source.as_str(),
            referrer: contact.referrer.as_deref(),
            utm_source: contact.utm_source.as_deref(),
            utm_medium: contact.utm_medium.as_deref(),
            utm_campaign: contact.utm_campaign.as_deref(),
            custom_fields: to_json(&contact.custom_fields),
            subscribed_at: now,
        }
    }
}

impl<'a> UpdateContact<'a> {
    pub fn new(update: &'a DomainUpdateContact, now: NaiveDateTime) -> Self {
        Self {
            first_name: update.first_name.as_deref(),
            last_name: update.last_name.as_deref(),
            phone: update.phone.as_deref(),
            company: update.company.as_deref(),
            job_title: update.job_title.as_deref(),
            website: update.website.as_deref(),
            city: update.city.as_deref(),
            country: update.country.as_deref(),
            notes: update.notes.as_deref(),
            custom_fields: to_json(&update.custom_fields),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contact::tests::now;
    use crate::domain::contact::{ContactSource, ContactStatus};

    fn db_contact(custom_fields: &str) -> Contact {
        Contact {
            id: 9,
            user_id: 1,
            email: "fatou@example.sn".into(),
            first_name: Some("Fatou".into()),
            last_name: None,
            phone: None,
            company: None,
            job_title: None,
            website: None,
            city: Some("Dakar".into()),
            country: Some("SN".into()),
            notes: None,
            status: "UNSUBSCRIBED".into(),
            is_active: false,
            subscribed_at: now(),
            unsubscribed_at: Some(now()),
            unsubscribe_reason: None,
            source: "import".into(),
            referrer: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            custom_fields: custom_fields.into(),
            engagement_score: 12.5,
            total_emails_received: 4,
            total_emails_opened: 1,
            total_emails_clicked: 0,
            last_email_opened_at: None,
            last_email_clicked_at: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn contact_row_converts_into_domain() {
        let contact: DomainContact = db_contact(r#"{"plan":"gold"}"#).try_into().unwrap();
        assert_eq!(contact.status, ContactStatus::Unsubscribed);
        assert_eq!(contact.source, ContactSource::Import);
        assert_eq!(contact.custom_fields.get("plan").map(String::as_str), Some("gold"));
    }

    #[test]
    fn malformed_custom_fields_are_rejected() {
        let result: Result<DomainContact, _> = db_contact("not json").try_into();
        assert!(result.is_err());
    }

    #[test]
    fn new_contact_serializes_custom_fields() {
        let mut domain = DomainNewContact::new(
            UserId::new(1).unwrap(),
            EmailAddress::new("a@example.com").unwrap(),
            ContactSource::Api,
        );
        domain.custom_fields.insert("plan".into(), "gold".into());
        let row = NewContact::new(&domain, now());
        assert_eq!(row.source, "api");
        assert_eq!(row.custom_fields, r#"{"plan":"gold"}"#);
    }
}
