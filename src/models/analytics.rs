use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

use crate::domain::analytics::{
    ApiUsage as DomainApiUsage, CampaignAnalytics as DomainCampaignAnalytics,
    ContactEngagement as DomainContactEngagement, DailyCampaignCounts,
    NewApiUsage as DomainNewApiUsage, PlatformAnalytics as DomainPlatformAnalytics,
};
use crate::domain::types::{CampaignId, ContactId, TypeConstraintError, UserId};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::campaign_analytics)]
pub struct CampaignAnalytics {
    pub id: i32,
    pub campaign_id: i32,
    pub date: NaiveDate,
    pub emails_sent: i32,
    pub emails_delivered: i32,
    pub emails_bounced: i32,
    pub emails_opened: i32,
    pub unique_opens: i32,
    pub emails_clicked: i32,
    pub unique_clicks: i32,
    pub unsubscribes: i32,
    pub complaints: i32,
    pub delivery_rate: f64,
    pub bounce_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub unsubscribe_rate: f64,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::campaign_analytics)]
pub struct NewCampaignAnalytics {
    pub campaign_id: i32,
    pub date: NaiveDate,
    pub emails_sent: i32,
    pub emails_delivered: i32,
    pub emails_bounced: i32,
    pub emails_opened: i32,
    pub unique_opens: i32,
    pub emails_clicked: i32,
    pub unique_clicks: i32,
    pub unsubscribes: i32,
    pub complaints: i32,
    pub delivery_rate: f64,
    pub bounce_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub unsubscribe_rate: f64,
}

impl TryFrom<CampaignAnalytics> for DomainCampaignAnalytics {
    type Error = TypeConstraintError;

    fn try_from(row: CampaignAnalytics) -> Result<Self, Self::Error> {
        Ok(Self {
            campaign_id: CampaignId::new(row.campaign_id)?,
            date: row.date,
            counts: DailyCampaignCounts {
                sent: row.emails_sent,
                delivered: row.emails_delivered,
                bounced: row.emails_bounced,
                opened: row.emails_opened,
                unique_opens: row.unique_opens,
                clicked: row.emails_clicked,
                unique_clicks: row.unique_clicks,
                unsubscribed: row.unsubscribes,
                complained: row.complaints,
            },
            delivery_rate: row.delivery_rate,
            bounce_rate: row.bounce_rate,
            open_rate: row.open_rate,
            click_rate: row.click_rate,
            unsubscribe_rate: row.unsubscribe_rate,
        })
    }
}

impl From<&DomainCampaignAnalytics> for NewCampaignAnalytics {
    fn from(row: &DomainCampaignAnalytics) -> Self {
        Self {
            campaign_id: row.campaign_id.get(),
            date: row.date,
            emails_sent: row.counts.sent,
            emails_delivered: row.counts.delivered,
            emails_bounced: row.counts.bounced,
            emails_opened: row.counts.opened,
            unique_opens: row.counts.unique_opens,
            emails_clicked: row.counts.clicked,
            unique_clicks: row.counts.unique_clicks,
            unsubscribes: row.counts.unsubscribed,
            complaints: row.counts.complained,
            delivery_rate: row.delivery_rate,
            bounce_rate: row.bounce_rate,
            open_rate: row.open_rate,
            click_rate: row.click_rate,
            unsubscribe_rate: row.unsubscribe_rate,
        }
    }
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::contact_engagements)]
pub struct NewContactEngagement {
    pub contact_id: i32,
    pub date: NaiveDate,
    pub emails_received: i32,
    pub emails_opened: i32,
    pub emails_clicked: i32,
    pub engagement_score: f64,
}

impl From<&DomainContactEngagement> for NewContactEngagement {
    fn from(row: &DomainContactEngagement) -> Self {
        Self {
            contact_id: row.contact_id.get(),
            date: row.date,
            emails_received: row.emails_received,
            emails_opened: row.emails_opened,
            emails_clicked: row.emails_clicked,
            engagement_score: row.engagement_score,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::contact_engagements)]
pub struct ContactEngagement {
    pub id: i32,
    pub contact_id: i32,
    pub date: NaiveDate,
    pub emails_received: i32,
    pub emails_opened: i32,
    pub emails_clicked: i32,
    pub engagement_score: f64,
}

impl TryFrom<ContactEngagement> for DomainContactEngagement {
    type Error = TypeConstraintError;

    fn try_from(row: ContactEngagement) -> Result<Self, Self::Error> {
        Ok(Self {
            contact_id: ContactId::new(row.contact_id)?,
            date: row.date,
            emails_received: row.emails_received,
            emails_opened: row.emails_opened,
            emails_clicked: row.emails_clicked,
            engagement_score: row.engagement_score,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::platform_analytics)]
pub struct PlatformAnalytics {
    pub id: i32,
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

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::platform_analytics)]
pub struct NewPlatformAnalytics {
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

impl From<PlatformAnalytics> for DomainPlatformAnalytics {
    fn from(row: PlatformAnalytics) -> Self {
        Self {
            date: row.date,
            total_users: row.total_users,
            active_users: row.active_users,
            new_users: row.new_users,
            total_contacts: row.total_contacts,
            total_campaigns: row.total_campaigns,
            emails_sent: row.emails_sent,
            emails_delivered: row.emails_delivered,
            emails_opened: row.emails_opened,
            emails_clicked: row.emails_clicked,
            average_open_rate: row.average_open_rate,
            average_click_rate: row.average_click_rate,
            average_bounce_rate: row.average_bounce_rate,
        }
    }
}

impl From<&DomainPlatformAnalytics> for NewPlatformAnalytics {
    fn from(row: &DomainPlatformAnalytics) -> Self {
        Self {
            date: row.date,
            total_users: row.total_users,
            active_users: row.active_users,
            new_users: row.new_users,
            total_contacts: row.total_contacts,
            total_campaigns: row.total_campaigns,
            emails_sent: row.emails_sent,
            emails_delivered: row.emails_delivered,
            emails_opened: row.emails_opened,
            emails_clicked: row.emails_clicked,
            average_open_rate: row.average_open_rate,
            average_click_rate: row.average_click_rate,
            average_bounce_rate: row.average_bounce_rate,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::api_usage)]
pub struct ApiUsage {
    pub id: i32,
    pub user_id: Option<i32>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub response_time_ms: i32,
    pub ip_address: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::api_usage)]
pub struct NewApiUsage<'a> {
    pub user_id: Option<i32>,
    pub endpoint: &'a str,
    pub method: &'a str,
    pub status_code: i32,
    pub response_time_ms: i32,
    pub ip_address: Option<&'a str>,
}

impl TryFrom<ApiUsage> for DomainApiUsage {
    type Error = TypeConstraintError;

    fn try_from(row: ApiUsage) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.user_id.map(UserId::new).transpose()?,
            endpoint: row.endpoint,
            method: row.method,
            status_code: row.status_code,
            response_time_ms: row.response_time_ms,
            ip_address: row.ip_address,
            created_at: row.created_at,
        })
    }
}

impl<'a> From<&'a DomainNewApiUsage> for NewApiUsage<'a> {
    fn from(row: &'a DomainNewApiUsage) -> Self {
        Self {
            user_id: row.user_id.map(UserId::get),
            endpoint: &row.endpoint,
            method: &row.method,
            status_code: row.status_code,
            response_time_ms: row.response_time_ms,
            ip_address: row.ip_address.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_analytics_columns_map_to_counts() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let domain = DomainCampaignAnalytics::from_counts(
            CampaignId::new(4).unwrap(),
            date,
            DailyCampaignCounts {
                sent: 10,
                delivered: 8,
                unique_opens: 4,
                opened: 6,
                ..Default::default()
            },
        );
        let row: NewCampaignAnalytics = (&domain).into();
        assert_eq!(row.emails_sent, 10);
        assert_eq!(row.emails_opened, 6);
        assert_eq!(row.open_rate, 50.0);
    }
}
