use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

use crate::domain::analytics::{
    CampaignAnalytics, ContactEngagement, NewApiUsage, PlatformAnalytics, SystemStatistics,
};
use crate::domain::campaign::CampaignStatus;
use crate::domain::event::EventType;
use crate::domain::queue::QueueStatus;
use crate::domain::types::CampaignId;
use crate::domain::user::start_of_month;
use crate::repository::errors::RepositoryResult;
use crate::repository::event::day_bounds;
use crate::repository::{AnalyticsReader, AnalyticsWriter, DieselRepository, PlatformCounts};

impl AnalyticsReader for DieselRepository {
    fn list_campaign_analytics(
        &self,
        campaign_id: CampaignId,
    ) -> RepositoryResult<Vec<CampaignAnalytics>> {
        use crate::models::analytics::CampaignAnalytics as DbCampaignAnalytics;
        use crate::schema::campaign_analytics;

        let mut conn = self.conn()?;
        let rows = campaign_analytics::table
            .filter(campaign_analytics::campaign_id.eq(campaign_id.get()))
            .order(campaign_analytics::date.asc())
            .select(DbCampaignAnalytics::as_select())
            .load::<DbCampaignAnalytics>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<CampaignAnalytics>, _>>()?;

        Ok(rows)
    }

    fn list_campaign_analytics_for_date(
        &self,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<CampaignAnalytics>> {
        use crate::models::analytics::CampaignAnalytics as DbCampaignAnalytics;
        use crate::schema::campaign_analytics;

        let mut conn = self.conn()?;
        let rows = campaign_analytics::table
            .filter(campaign_analytics::date.eq(date))
            .order(campaign_analytics::campaign_id.asc())
            .select(DbCampaignAnalytics::as_select())
            .load::<DbCampaignAnalytics>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<CampaignAnalytics>, _>>()?;

        Ok(rows)
    }

    fn list_platform_analytics(&self, limit: i64) -> RepositoryResult<Vec<PlatformAnalytics>> {
        use crate::models::analytics::PlatformAnalytics as DbPlatformAnalytics;
        use crate::schema::platform_analytics;

        let mut conn = self.conn()?;
        let rows = platform_analytics::table
            .order(platform_analytics::date.desc())
            .limit(limit)
            .select(DbPlatformAnalytics::as_select())
            .load::<DbPlatformAnalytics>(&mut conn)?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(rows)
    }

    fn get_platform_counts(&self, date: NaiveDate) -> RepositoryResult<PlatformCounts> {
        use crate::schema::{contacts, email_campaigns, users};

        let mut conn = self.conn()?;
        let (start, end) = day_bounds(date);

        let total_users = users::table
            .filter(users::is_active.eq(true))
            .count()
            .get_result::<i64>(&mut conn)?;
        let active_users = users::table
            .filter(users::last_login_at.ge(start))
            .filter(users::last_login_at.lt(end))
            .count()
            .get_result::<i64>(&mut conn)?;
        let new_users = users::table
            .filter(users::created_at.ge(start))
            .filter(users::created_at.lt(end))
            .count()
            .get_result::<i64>(&mut conn)?;
        let total_contacts = contacts::table
            .filter(contacts::is_active.eq(true))
            .count()
            .get_result::<i64>(&mut conn)?;
        let total_campaigns = email_campaigns::table
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(PlatformCounts {
            total_users,
            active_users,
            new_users,
            total_contacts,
            total_campaigns,
        })
    }

    fn get_system_statistics(&self, now: NaiveDateTime) -> RepositoryResult<SystemStatistics> {
        use crate::schema::{contacts, email_campaigns, email_events, email_queue, users};

        let mut conn = self.conn()?;
        let (today, _) = day_bounds(now.date());
        let month = start_of_month(now);

        let sent_since = |since: NaiveDateTime, conn: &mut diesel::SqliteConnection| {
            email_events::table
                .filter(email_events::event_type.eq(EventType::Sent.as_str()))
                .filter(email_events::created_at.ge(since))
                .count()
                .get_result::<i64>(conn)
        };

        Ok(SystemStatistics {
            total_users: users::table.count().get_result(&mut conn)?,
            active_users: users::table
                .filter(users::is_active.eq(true))
                .count()
                .get_result(&mut conn)?,
            verified_users: users::table
                .filter(users::is_email_verified.eq(true))
                .count()
                .get_result(&mut conn)?,
            total_contacts: contacts::table.count().get_result(&mut conn)?,
            total_campaigns: email_campaigns::table.count().get_result(&mut conn)?,
            sending_campaigns: email_campaigns::table
                .filter(email_campaigns::status.eq(CampaignStatus::Sending.as_str()))
                .count()
                .get_result(&mut conn)?,
            emails_sent_today: sent_since(today, &mut conn)?,
            emails_sent_this_month: sent_since(month, &mut conn)?,
            queue_backlog: email_queue::table
                .filter(email_queue::status.eq_any(QueueStatus::OUTSTANDING.map(QueueStatus::as_str)))
                .count()
                .get_result(&mut conn)?,
            failed_in_queue: email_queue::table
                .filter(email_queue::status.eq(QueueStatus::Failed.as_str()))
                .count()
                .get_result(&mut conn)?,
        })
    }
}

impl AnalyticsWriter for DieselRepository {
    fn upsert_campaign_analytics(&self, row: &CampaignAnalytics) -> RepositoryResult<()> {
        use crate::models::analytics::NewCampaignAnalytics;
        use crate::schema::campaign_analytics;

        let mut conn = self.conn()?;
        let values: NewCampaignAnalytics = row.into();
        diesel::insert_into(campaign_analytics::table)
            .values(&values)
            .on_conflict((campaign_analytics::campaign_id, campaign_analytics::date))
            .do_update()
            .set(&values)
            .execute(&mut conn)?;
        Ok(())
    }

    fn upsert_contact_engagement(&self, row: &ContactEngagement) -> RepositoryResult<()> {
        use crate::models::analytics::NewContactEngagement;
        use crate::schema::contact_engagements;

        let mut conn = self.conn()?;
        let values: NewContactEngagement = row.into();
        diesel::insert_into(contact_engagements::table)
            .values(&values)
            .on_conflict((contact_engagements::contact_id, contact_engagements::date))
            .do_update()
            .set(&values)
            .execute(&mut conn)?;
        Ok(())
    }

    fn upsert_platform_analytics(&self, row: &PlatformAnalytics) -> RepositoryResult<()> {
        use crate::models::analytics::NewPlatformAnalytics;
        use crate::schema::platform_analytics;

        let mut conn = self.conn()?;
        let values: NewPlatformAnalytics = row.into();
        diesel::insert_into(platform_analytics::table)
            .values(&values)
            .on_conflict(platform_analytics::date)
            .do_update()
            .set(&values)
            .execute(&mut conn)?;
        Ok(())
    }

    fn record_api_usage(&self, usage: &NewApiUsage) -> RepositoryResult<()> {
        use crate::models::analytics::NewApiUsage as DbNewApiUsage;
        use crate::schema::api_usage;

        let mut conn = self.conn()?;
        let values: DbNewApiUsage = usage.into();
        diesel::insert_into(api_usage::table)
            .values(&values)
            .execute(&mut conn)?;
        Ok(())
    }
}
