//! Daily roll-ups and dashboard aggregates.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::campaign::EmailCampaign;
use crate::domain::contact::{ContactStatistics, round2};
use crate::domain::types::{CampaignId, ContactId, UserId};
use crate::domain::user::UserActivity;

fn pct(part: i32, whole: i32) -> f64 {
    if whole > 0 {
        round2(f64::from(part) / f64::from(whole) * 100.0)
    } else {
        0.0
    }
}

/// Event counts of one campaign on one day.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyCampaignCounts {
    pub sent: i32,
    pub delivered: i32,
    pub bounced: i32,
    pub opened: i32,
    pub unique_opens: i32,
    pub clicked: i32,
    pub unique_clicks: i32,
    pub unsubscribed: i32,
    pub complained: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CampaignAnalytics {
    pub campaign_id: CampaignId,
    pub date: NaiveDate,
    pub counts: DailyCampaignCounts,
    pub delivery_rate: f64,
    pub bounce_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub unsubscribe_rate: f64,
}

impl CampaignAnalytics {
    pub fn from_counts(campaign_id: CampaignId, date: NaiveDate, counts: DailyCampaignCounts) -> Self {
        Self {
            campaign_id,
            date,
            delivery_rate: pct(counts.delivered, counts.sent),
            bounce_rate: pct(counts.bounced, counts.sent),
            open_rate: pct(counts.unique_opens, counts.delivered),
            click_rate: pct(counts.unique_clicks, counts.delivered),
            unsubscribe_rate: pct(counts.unsubscribed, counts.delivered),
            counts,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContactEngagement {
    pub contact_id: ContactId,
    pub date: NaiveDate,
    pub emails_received: i32,
    pub emails_opened: i32,
    pub emails_clicked: i32,
    pub engagement_score: f64,
}

impl ContactEngagement {
    pub fn new(
        contact_id: ContactId,
        date: NaiveDate,
        received: i32,
        opened: i32,
        clicked: i32,
    ) -> Self {
        let score = if received > 0 {
            let open_rate = f64::from(opened) / f64::from(received) * 100.0;
            let click_rate = f64::from(clicked) / f64::from(received) * 100.0;
            round2(open_rate * 0.6 + click_rate * 0.4)
        } else {
            0.0
        };
        Self {
            contact_id,
            date,
            emails_received: received,
            emails_opened: opened,
            emails_clicked: clicked,
            engagement_score: score,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PlatformAnalytics {
    pub date: NaiveDate,
    pub total_users: i32,
    pub active_users: i32,
    pub new_users: i32,
    pub total_contacts: i32,
    pub total_campaigns: i32,
    pub emails_sent: i32,
    pub emails_delivered: i32,
    pub emails_opened: i32,
    pub emails_clicked: i32,
    pub average_open_rate: f64,
    pub average_click_rate: f64,
    pub average_bounce_rate: f64,
}

/// Averages the rates of one day's campaign analytics rows.
pub fn average_rates(rows: &[CampaignAnalytics]) -> (f64, f64, f64) {
    if rows.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let n = rows.len() as f64;
    let sum = |f: fn(&CampaignAnalytics) -> f64| round2(rows.iter().map(f).sum::<f64>() / n);
    (
        sum(|r| r.open_rate),
        sum(|r| r.click_rate),
        sum(|r| r.bounce_rate),
    )
}

/// One `/api` request as seen by the usage middleware.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ApiUsage {
    pub user_id: Option<UserId>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub response_time_ms: i32,
    pub ip_address: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewApiUsage {
    pub user_id: Option<UserId>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub response_time_ms: i32,
    pub ip_address: Option<String>,
}

/// Campaign counts keyed by status code.
pub type StatusCounts = Vec<(String, i64)>;

/// Everything rendered on the user dashboard.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Dashboard {
    pub contacts: ContactStatistics,
    pub list_count: i64,
    pub campaigns_by_status: StatusCounts,
    pub emails_sent_this_month: i64,
    pub average_open_rate: f64,
    pub average_click_rate: f64,
    pub recent_campaigns: Vec<EmailCampaign>,
    pub recent_activity: Vec<UserActivity>,
}

/// Platform-wide numbers for the admin panel.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct SystemStatistics {
    pub total_users: i64,
    pub active_users: i64,
    pub verified_users: i64,
    pub total_contacts: i64,
    pub total_campaigns: i64,
    pub sending_campaigns: i64,
    pub emails_sent_today: i64,
    pub emails_sent_this_month: i64,
    pub queue_backlog: i64,
    pub failed_in_queue: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
    }

    #[test]
    fn campaign_rates_use_sent_or_delivered() {
        let counts = DailyCampaignCounts {
            sent: 50,
            delivered: 40,
            bounced: 10,
            unique_opens: 10,
            unique_clicks: 4,
            unsubscribed: 2,
            ..DailyCampaignCounts::default()
        };
        let row = CampaignAnalytics::from_counts(CampaignId::new(1).unwrap(), day(), counts);
        assert_eq!(row.delivery_rate, 80.0);
        assert_eq!(row.bounce_rate, 20.0);
        assert_eq!(row.open_rate, 25.0);
        assert_eq!(row.click_rate, 10.0);
        assert_eq!(row.unsubscribe_rate, 5.0);
    }

    #[test]
    fn nothing_delivered_means_zero_engagement_rates() {
        let counts = DailyCampaignCounts {
            sent: 3,
            ..DailyCampaignCounts::default()
        };
        let row = CampaignAnalytics::from_counts(CampaignId::new(1).unwrap(), day(), counts);
        assert_eq!(row.open_rate, 0.0);
        assert_eq!(row.delivery_rate, 0.0);
    }

    #[test]
    fn contact_engagement_has_no_recency_bonus() {
        let row = ContactEngagement::new(ContactId::new(2).unwrap(), day(), 4, 2, 1);
        // 50 * 0.6 + 25 * 0.4
        assert_eq!(row.engagement_score, 40.0);
        assert_eq!(
            ContactEngagement::new(ContactId::new(2).unwrap(), day(), 0, 0, 0).engagement_score,
            0.0
        );
    }

    #[test]
    fn averages_cover_all_rows() {
        let a = CampaignAnalytics::from_counts(
            CampaignId::new(1).unwrap(),
            day(),
            DailyCampaignCounts {
                sent: 10,
                delivered: 10,
                unique_opens: 5,
                ..Default::default()
            },
        );
        let b = CampaignAnalytics::from_counts(
            CampaignId::new(2).unwrap(),
            day(),
            DailyCampaignCounts {
                sent: 10,
                delivered: 10,
                unique_opens: 1,
                ..Default::default()
            },
        );
        assert_eq!(average_rates(&[a, b]), (30.0, 0.0, 0.0));
        assert_eq!(average_rates(&[]), (0.0, 0.0, 0.0));
    }
}
