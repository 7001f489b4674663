//! Daily roll-ups run by the worker and the dashboards built on them.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::domain::analytics::{
    CampaignAnalytics, ContactEngagement, Dashboard, PlatformAnalytics, average_rates,
};
use crate::domain::auth::AuthenticatedUser;
use crate::domain::campaign::CampaignSummary;
use crate::domain::email_config::{DomainReputation, reputation_score};
use crate::domain::event::EventType;
use crate::domain::types::{ContactId, UserId};
use crate::domain::user::start_of_month;
use crate::dto::analytics::AnalyticsOverview;
use crate::repository::{
    AnalyticsReader, AnalyticsWriter, CampaignListQuery, CampaignReader, ContactListReader,
    ContactReader, ContactWriter, EmailConfigReader, EmailConfigWriter, EventReader, UserReader,
};
use crate::services::campaigns::SUMMARY_DAYS;
use crate::services::tracking::delivery_statistics;
use crate::services::{ServiceResult, owner_id};

pub const DEFAULT_ENGAGEMENT_BATCH: i64 = 100;
const RECENT_CAMPAIGNS: usize = 5;
const RECENT_ACTIVITY: i64 = 10;

fn to_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Rows written by one analytics run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyticsRun {
    pub campaigns: usize,
    pub contacts: usize,
    pub domains: usize,
}

/// Rebuilds campaign, contact, domain and platform analytics for one day.
pub fn generate_daily_analytics<R>(repo: &R, date: NaiveDate) -> ServiceResult<AnalyticsRun>
where
    R: AnalyticsReader
        + AnalyticsWriter
        + EventReader
        + EmailConfigReader
        + EmailConfigWriter
        + ?Sized,
{
    let mut run = AnalyticsRun::default();

    let campaign_rows: Vec<CampaignAnalytics> = repo
        .get_daily_campaign_counts(date)?
        .into_iter()
        .map(|(campaign_id, counts)| CampaignAnalytics::from_counts(campaign_id, date, counts))
        .collect();
    for row in &campaign_rows {
        repo.upsert_campaign_analytics(row)?;
    }
    run.campaigns = campaign_rows.len();

    for counts in repo.get_daily_contact_counts(date)? {
        let row = ContactEngagement::new(
            counts.contact_id,
            date,
            counts.received,
            counts.opened,
            counts.clicked,
        );
        repo.upsert_contact_engagement(&row)?;
        run.contacts += 1;
    }

    for config in repo.list_active_email_configs()? {
        let (sent, bounces, complaints) = repo.get_config_event_counts(config.id, date)?;
        repo.save_domain_reputation(&DomainReputation {
            email_config_id: config.id,
            date,
            emails_sent: sent,
            bounces,
            complaints,
            is_blacklisted: false,
            reputation_score: reputation_score(sent, bounces, complaints, false),
        })?;
        run.domains += 1;
    }

    let counts = repo.get_platform_counts(date)?;
    let total = |f: fn(&CampaignAnalytics) -> i32| campaign_rows.iter().map(f).sum::<i32>();
    let (average_open_rate, average_click_rate, average_bounce_rate) =
        average_rates(&campaign_rows);
    repo.upsert_platform_analytics(&PlatformAnalytics {
        date,
        total_users: to_i32(counts.total_users),
        active_users: to_i32(counts.active_users),
        new_users: to_i32(counts.new_users),
        total_contacts: to_i32(counts.total_contacts),
        total_campaigns: to_i32(counts.total_campaigns),
        emails_sent: total(|r| r.counts.sent),
        emails_delivered: total(|r| r.counts.delivered),
        emails_opened: total(|r| r.counts.opened),
        emails_clicked: total(|r| r.counts.clicked),
        average_open_rate,
        average_click_rate,
        average_bounce_rate,
    })?;

    log::info!(
        "Analytics for {date}: {} campaigns, {} contacts, {} domains",
        run.campaigns,
        run.contacts,
        run.domains
    );
    Ok(run)
}

/// Runs [`generate_daily_analytics`] for `today` and the `days - 1` days before it.
pub fn generate_analytics_range<R>(repo: &R, today: NaiveDate, days: i64) -> ServiceResult<usize>
where
    R: AnalyticsReader
        + AnalyticsWriter
        + EventReader
        + EmailConfigReader
        + EmailConfigWriter
        + ?Sized,
{
    let days = days.max(1);
    for offset in 0..days {
        generate_daily_analytics(repo, today - Duration::days(offset))?;
    }
    Ok(usize::try_from(days).unwrap_or_default())
}

/// Recomputes the stored engagement score of every contact, page by page.
pub fn update_engagement_scores<R>(
    repo: &R,
    user_id: Option<UserId>,
    batch_size: i64,
    now: NaiveDateTime,
) -> ServiceResult<usize>
where
    R: ContactReader + ContactWriter + ?Sized,
{
    let batch_size = batch_size.max(1);
    let mut after: Option<ContactId> = None;
    let mut updated = 0;

    loop {
        let batch = repo.list_contacts_batch(user_id, after, batch_size)?;
        let Some(last) = batch.last() else {
            break;
        };
        after = Some(last.id);
        let full = batch.len() as i64 == batch_size;

        for contact in batch {
            let score = contact.calculate_engagement_score(now);
            if (score - contact.engagement_score).abs() > f64::EPSILON {
                repo.save_engagement_score(contact.id, score)?;
                updated += 1;
            }
        }
        if !full {
            break;
        }
    }

    log::info!("Updated engagement scores for {updated} contacts");
    Ok(updated)
}

pub fn dashboard<R>(repo: &R, user: &AuthenticatedUser, now: NaiveDateTime) -> ServiceResult<Dashboard>
where
    R: UserReader + ContactReader + ContactListReader + CampaignReader + EventReader + ?Sized,
{
    let user_id = owner_id(user)?;

    let (_, recent) = repo.list_campaigns(
        CampaignListQuery::new(user_id)
            .created_since(now - Duration::days(SUMMARY_DAYS)),
    )?;
    let summary = CampaignSummary::from_campaigns(&recent);
    let emails_sent_this_month = repo
        .count_events_by_type(Some(user_id), start_of_month(now))?
        .into_iter()
        .filter(|(event_type, _)| *event_type == EventType::Sent)
        .map(|(_, count)| count)
        .sum();
    let (_, recent_campaigns) =
        repo.list_campaigns(CampaignListQuery::new(user_id).paginate(1, RECENT_CAMPAIGNS))?;

    Ok(Dashboard {
        contacts: repo.get_contact_statistics(user_id, now)?,
        list_count: repo.list_contact_lists(user_id)?.len() as i64,
        campaigns_by_status: repo.count_campaigns_by_status(user_id)?,
        emails_sent_this_month,
        average_open_rate: summary.average_open_rate,
        average_click_rate: summary.average_click_rate,
        recent_campaigns,
        recent_activity: repo.list_user_activities(user_id, RECENT_ACTIVITY)?,
    })
}

pub fn analytics_overview<R>(
    repo: &R,
    user: &AuthenticatedUser,
    days: Option<i64>,
    now: NaiveDateTime,
) -> ServiceResult<AnalyticsOverview>
where
    R: UserReader + ContactReader + ContactListReader + CampaignReader + EventReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let (_, recent) = repo.list_campaigns(
        CampaignListQuery::new(user_id).created_since(now - Duration::days(SUMMARY_DAYS)),
    )?;

    Ok(AnalyticsOverview {
        dashboard: dashboard(repo, user, now)?,
        delivery: delivery_statistics(repo, user, days, now)?,
        campaigns: CampaignSummary::from_campaigns(&recent),
    })
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use super::*;
    use crate::domain::analytics::DailyCampaignCounts;
    use crate::domain::contact::tests::{now, sample_contact};
    use crate::domain::email_config::VerificationStatus;
    use crate::domain::email_config::tests::sample_config;
    use crate::domain::types::CampaignId;
    use crate::repository::mock::MockRepository;
    use crate::repository::{DailyContactCounts, PlatformCounts};

    #[test]
    fn daily_run_writes_every_rollup() {
        let mut repo = MockRepository::new();
        repo.expect_get_daily_campaign_counts().returning(|_| {
            Ok(vec![(
                CampaignId::new(5).unwrap(),
                DailyCampaignCounts {
                    sent: 10,
                    delivered: 8,
                    opened: 6,
                    unique_opens: 4,
                    ..DailyCampaignCounts::default()
                },
            )])
        });
        repo.expect_upsert_campaign_analytics()
            .withf(|row| row.open_rate == 50.0 && row.delivery_rate == 80.0)
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_get_daily_contact_counts().returning(|_| {
            Ok(vec![DailyContactCounts {
                contact_id: ContactId::new(7).unwrap(),
                received: 2,
                opened: 1,
                clicked: 0,
            }])
        });
        repo.expect_upsert_contact_engagement()
            .withf(|row| row.engagement_score == 30.0)
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_list_active_email_configs()
            .returning(|| Ok(vec![sample_config(VerificationStatus::Verified)]));
        repo.expect_get_config_event_counts()
            .returning(|_, _| Ok((100, 20, 0)));
        repo.expect_save_domain_reputation()
            .withf(|rep| rep.reputation_score == 80.0)
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_get_platform_counts().returning(|_| {
            Ok(PlatformCounts {
                total_users: 3,
                ..PlatformCounts::default()
            })
        });
        repo.expect_upsert_platform_analytics()
            .withf(|row| row.total_users == 3 && row.emails_sent == 10 && row.emails_opened == 6)
            .times(1)
            .returning(|_| Ok(()));

        let run = generate_daily_analytics(&repo, now().date()).unwrap();
        assert_eq!(
            run,
            AnalyticsRun {
                campaigns: 1,
                contacts: 1,
                domains: 1
            }
        );
    }

    #[test]
    fn engagement_update_pages_through_contacts() {
        let mut repo = MockRepository::new();
        repo.expect_list_contacts_batch()
            .withf(|_, after, _| after.is_none())
            .times(1)
            .returning(|_, _, _| {
                let mut engaged = sample_contact(1, "a@example.com");
                engaged.total_emails_received = 4;
                engaged.total_emails_opened = 2;
                Ok(vec![engaged, sample_contact(2, "b@example.com")])
            });
        repo.expect_list_contacts_batch()
            .withf(|_, after, _| after.map(ContactId::get) == Some(2))
            .times(1)
            .returning(|_, _, _| Ok(vec![]));
        repo.expect_save_engagement_score()
            .withf(|id, score| id.get() == 1 && *score > 0.0)
            .times(1)
            .returning(|_, _| Ok(()));

        assert_eq!(update_engagement_scores(&repo, None, 2, now()).unwrap(), 1);
    }
}
