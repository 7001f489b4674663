use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::contact::round2;
use crate::domain::types::{CampaignId, ContactId, EventId, code_enum};

code_enum! {
    EventType {
        Sent => "SENT",
        Delivered => "DELIVERED",
        Opened => "OPENED",
        Clicked => "CLICKED",
        Bounced => "BOUNCED",
        Unsubscribed => "UNSUBSCRIBED",
        Complained => "COMPLAINED",
        Failed => "FAILED",
    }
}

code_enum! {
    BounceType {
        Hard => "HARD",
        Soft => "SOFT",
        Block => "BLOCK",
    }
}

/// Something that happened to a delivered message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmailEvent {
    pub id: EventId,
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    pub event_type: EventType,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub clicked_url: Option<String>,
    pub bounce_type: Option<BounceType>,
    pub bounce_reason: Option<String>,
    pub data: Value,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewEmailEvent {
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    pub event_type: EventType,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub clicked_url: Option<String>,
    pub bounce_type: Option<BounceType>,
    pub bounce_reason: Option<String>,
    pub data: Value,
}

impl NewEmailEvent {
    pub fn new(campaign_id: CampaignId, contact_id: ContactId, event_type: EventType) -> Self {
        Self {
            campaign_id,
            contact_id,
            event_type,
            ip_address: None,
            user_agent: None,
            clicked_url: None,
            bounce_type: None,
            bounce_reason: None,
            data: Value::Object(Default::default()),
        }
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// Event counts and rates over a period.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct DeliveryStatistics {
    pub days: i64,
    pub sent: i64,
    pub delivered: i64,
    pub opened: i64,
    pub clicked: i64,
    pub bounced: i64,
    pub unsubscribed: i64,
    pub complained: i64,
    pub failed: i64,
    pub delivery_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
}

impl DeliveryStatistics {
    /// Builds statistics from `(event type, count)` pairs.
    pub fn from_counts(days: i64, counts: &[(EventType, i64)]) -> Self {
        let mut stats = Self {
            days,
            ..Self::default()
        };
        for (event_type, count) in counts {
            let slot = match event_type {
                EventType::Sent => &mut stats.sent,
                EventType::Delivered => &mut stats.delivered,
                EventType::Opened => &mut stats.opened,
                EventType::Clicked => &mut stats.clicked,
                EventType::Bounced => &mut stats.bounced,
                EventType::Unsubscribed => &mut stats.unsubscribed,
                EventType::Complained => &mut stats.complained,
                EventType::Failed => &mut stats.failed,
            };
            *slot += count;
        }
        let pct = |part: i64, whole: i64| {
            if whole > 0 {
                round2(part as f64 / whole as f64 * 100.0)
            } else {
                0.0
            }
        };
        stats.delivery_rate = pct(stats.delivered, stats.sent);
        stats.bounce_rate = pct(stats.bounced, stats.sent);
        stats.open_rate = pct(stats.opened, stats.delivered);
        stats.click_rate = pct(stats.clicked, stats.delivered);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_sum_counts_and_compute_rates() {
        let stats = DeliveryStatistics::from_counts(
            30,
            &[
                (EventType::Sent, 100),
                (EventType::Delivered, 80),
                (EventType::Opened, 20),
                (EventType::Opened, 20),
                (EventType::Clicked, 8),
                (EventType::Bounced, 5),
            ],
        );
        assert_eq!(stats.opened, 40);
        assert_eq!(stats.delivery_rate, 80.0);
        assert_eq!(stats.open_rate, 50.0);
        assert_eq!(stats.click_rate, 10.0);
        assert_eq!(stats.bounce_rate, 5.0);
    }

    #[test]
    fn statistics_without_sends_have_zero_rates() {
        let stats = DeliveryStatistics::from_counts(7, &[]);
        assert_eq!(stats.days, 7);
        assert_eq!(stats.delivery_rate, 0.0);
    }
}
