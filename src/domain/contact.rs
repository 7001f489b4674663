use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::{ContactId, EmailAddress, UserId, code_enum};

code_enum! {
    /// Subscription state of a contact.
    ContactStatus {
        Active => "ACTIVE",
        Unsubscribed => "UNSUBSCRIBED",
        Bounced => "BOUNCED",
        Complained => "COMPLAINED",
        Blocked => "BLOCKED",
    }
}

code_enum! {
    /// Where a contact came from.
    ContactSource {
        Manual => "manual",
        Import => "import",
        Api => "api",
    }
}

/// Free-form per-contact attributes usable as `{{key}}` placeholders.
pub type CustomFields = BTreeMap<String, String>;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub id: ContactId,
    pub user_id: UserId,
    pub email: EmailAddress,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub website: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
    pub status: ContactStatus,
    pub is_active: bool,
    pub subscribed_at: NaiveDateTime,
    pub unsubscribed_at: Option<NaiveDateTime>,
    pub unsubscribe_reason: Option<String>,
    pub source: ContactSource,
    pub referrer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub custom_fields: CustomFields,
    pub engagement_score: f64,
    pub total_emails_received: i32,
    pub total_emails_opened: i32,
    pub total_emails_clicked: i32,
    pub last_email_opened_at: Option<NaiveDateTime>,
    pub last_email_clicked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Title-cases every alphabetic run, e.g. `john.doe` → `John.Doe`.
fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut capitalize = true;
    for c in value.chars() {
        if c.is_alphabetic() {
            if capitalize {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            capitalize = false;
        } else {
            result.push(c);
            capitalize = true;
        }
    }
    result
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn percentage(part: i32, whole: i32) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole) * 100.0
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Contact {
    pub fn full_name(&self) -> String {
        match (non_empty(&self.first_name), non_empty(&self.last_name)) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => title_case(self.email.local_part()),
        }
    }

    pub fn short_name(&self) -> String {
        match non_empty(&self.first_name) {
            Some(first) => first.to_string(),
            None => title_case(self.email.local_part()),
        }
    }

    pub fn open_rate(&self) -> f64 {
        percentage(self.total_emails_opened, self.total_emails_received)
    }

    pub fn click_rate(&self) -> f64 {
        percentage(self.total_emails_clicked, self.total_emails_received)
    }

    /// Weighted open/click rate plus a bonus for recent opens, capped at 100.
    pub fn calculate_engagement_score(&self, now: NaiveDateTime) -> f64 {
        if self.total_emails_received == 0 {
            return 0.0;
        }
        let bonus = match self.last_email_opened_at {
            Some(opened) if opened >= now - Duration::days(7) => 10.0,
            Some(opened) if opened >= now - Duration::days(30) => 5.0,
            _ => 0.0,
        };
        let score = self.open_rate() * 0.6 + self.click_rate() * 0.4 + bonus;
        round2(score.min(100.0))
    }

    /// Whether campaign mail may be sent to this contact.
    pub fn is_mailable(&self) -> bool {
        self.is_active && self.status == ContactStatus::Active
    }
}

/// Per-contact counter bumped by delivery and tracking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactActivity {
    Received,
    Opened,
    Clicked,
}

/// Subscription transition applied in place by the repository.
///
/// A transition only applies to contacts currently in one of
/// [`StatusChange::allowed_from`], so concurrent writers cannot undo each
/// other's opt-outs.
#[derive(Clone, Debug, PartialEq)]
pub enum StatusChange {
    Unsubscribe { reason: Option<String> },
    Resubscribe,
    Bounce,
    Complain,
}

impl StatusChange {
    pub fn target(&self) -> ContactStatus {
        match self {
            StatusChange::Unsubscribe { .. } => ContactStatus::Unsubscribed,
            StatusChange::Resubscribe => ContactStatus::Active,
            StatusChange::Bounce => ContactStatus::Bounced,
            StatusChange::Complain => ContactStatus::Complained,
        }
    }

    pub fn allowed_from(&self) -> &'static [ContactStatus] {
        match self {
            StatusChange::Unsubscribe { .. } => &[
                ContactStatus::Active,
                ContactStatus::Bounced,
                ContactStatus::Complained,
                ContactStatus::Blocked,
            ],
            StatusChange::Resubscribe => &[
                ContactStatus::Unsubscribed,
                ContactStatus::Bounced,
                ContactStatus::Complained,
                ContactStatus::Blocked,
            ],
            StatusChange::Bounce => &[ContactStatus::Active],
            StatusChange::Complain => &[
                ContactStatus::Active,
                ContactStatus::Bounced,
                ContactStatus::Unsubscribed,
            ],
        }
    }

    pub fn applies_to(&self, status: ContactStatus) -> bool {
        self.allowed_from().contains(&status)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewContact {
    pub user_id: UserId,
    pub email: EmailAddress,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub website: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
    pub source: ContactSource,
    pub referrer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub custom_fields: CustomFields,
}

impl NewContact {
    /// Minimal contact with only an email address.
    pub fn new(user_id: UserId, email: EmailAddress, source: ContactSource) -> Self {
        Self {
            user_id,
            email,
            first_name: None,
            last_name: None,
            phone: None,
            company: None,
            job_title: None,
            website: None,
            city: None,
            country: None,
            notes: None,
            source,
            referrer: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            custom_fields: CustomFields::new(),
        }
    }

    /// Profile fields of this record as an update for an existing contact.
    pub fn to_update(&self) -> UpdateContact {
        UpdateContact {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            company: self.company.clone(),
            job_title: self.job_title.clone(),
            website: self.website.clone(),
            city: self.city.clone(),
            country: self.country.clone(),
            notes: self.notes.clone(),
            custom_fields: self.custom_fields.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub website: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
    pub custom_fields: CustomFields,
}

/// Dashboard numbers about a user's audience.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ContactStatistics {
    pub total: i64,
    pub active: i64,
    pub unsubscribed: i64,
    pub bounced: i64,
    pub complained: i64,
    pub blocked: i64,
    pub average_engagement: f64,
    pub added_today: i64,
    pub added_this_week: i64,
    pub added_this_month: i64,
    pub top_countries: Vec<(String, i64)>,
    pub top_companies: Vec<(String, i64)>,
}
