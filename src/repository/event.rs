use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use diesel::dsl::{count, count_star};
use diesel::expression_methods::AggregateExpressionMethods;
use diesel::prelude::*;

use crate::domain::analytics::DailyCampaignCounts;
use crate::domain::contact::ContactActivity;
use crate::domain::event::{EmailEvent, EventType, NewEmailEvent};
use crate::domain::types::{CampaignId, ContactId, EmailConfigId, UserId};
use crate::repository::contact::record_activity;
use crate::repository::errors::{RepositoryError, RepositoryResult};
use crate::repository::{DailyContactCounts, DieselRepository, EventReader, EventWriter};

/// `[start, end)` bounds of a calendar day.
pub(crate) fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    let end = date
        .checked_add_days(Days::new(1))
        .unwrap_or(date)
        .and_time(NaiveTime::MIN);
    (start, end)
}

fn parse_counts(rows: Vec<(String, i64)>) -> Vec<(EventType, i64)> {
    rows.into_iter()
        .filter_map(|(code, count)| match code.parse::<EventType>() {
            Ok(event_type) => Some((event_type, count)),
            Err(_) => {
                log::warn!("Unknown event type `{code}` skipped");
                None
            }
        })
        .collect()
}

impl EventReader for DieselRepository {
    fn has_event(
        &self,
        campaign_id: CampaignId,
        contact_id: ContactId,
        event_type: EventType,
    ) -> RepositoryResult<bool> {
        use crate::schema::email_events;

        let mut conn = self.conn()?;
        let found = diesel::select(diesel::dsl::exists(
            email_events::table
                .filter(email_events::campaign_id.eq(campaign_id.get()))
                .filter(email_events::contact_id.eq(contact_id.get()))
                .filter(email_events::event_type.eq(event_type.as_str())),
        ))
        .get_result::<bool>(&mut conn)?;
        Ok(found)
    }

    fn count_events_by_type(
        &self,
        user_id: Option<UserId>,
        since: NaiveDateTime,
    ) -> RepositoryResult<Vec<(EventType, i64)>> {
        use crate::schema::{email_campaigns, email_events};

        let mut conn = self.conn()?;
        let mut query = email_events::table
            .filter(email_events::created_at.ge(since))
            .group_by(email_events::event_type)
            .select((email_events::event_type, count_star()))
            .into_boxed::<diesel::sqlite::Sqlite>();

        if let Some(user_id) = user_id {
            query = query.filter(
                email_events::campaign_id.eq_any(
                    email_campaigns::table
                        .filter(email_campaigns::user_id.eq(user_id.get()))
                        .select(email_campaigns::id),
                ),
            );
        }

        let rows = query.load::<(String, i64)>(&mut conn)?;
        Ok(parse_counts(rows))
    }

    fn list_campaign_events(&self, campaign_id: CampaignId) -> RepositoryResult<Vec<EmailEvent>> {
        use crate::models::event::EmailEvent as DbEmailEvent;
        use crate::schema::email_events;

        let mut conn = self.conn()?;
        let events = email_events::table
            .filter(email_events::campaign_id.eq(campaign_id.get()))
            .order((email_events::created_at.asc(), email_events::id.asc()))
            .select(DbEmailEvent::as_select())
            .load::<DbEmailEvent>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<EmailEvent>, _>>()?;

        Ok(events)
    }

    fn list_recent_events(&self, limit: i64) -> RepositoryResult<Vec<EmailEvent>> {
        use crate::models::event::EmailEvent as DbEmailEvent;
        use crate::schema::email_events;

        let mut conn = self.conn()?;
        let events = email_events::table
            .order((email_events::created_at.desc(), email_events::id.desc()))
            .limit(limit)
            .select(DbEmailEvent::as_select())
            .load::<DbEmailEvent>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<EmailEvent>, _>>()?;

        Ok(events)
    }

    fn get_daily_campaign_counts(
        &self,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<(CampaignId, DailyCampaignCounts)>> {
        use crate::schema::email_events;

        let mut conn = self.conn()?;
        let (start, end) = day_bounds(date);

        let totals = email_events::table
            .filter(email_events::created_at.ge(start))
            .filter(email_events::created_at.lt(end))
            .group_by((email_events::campaign_id, email_events::event_type))
            .select((
                email_events::campaign_id,
                email_events::event_type,
                count_star(),
            ))
            .load::<(i32, String, i64)>(&mut conn)?;

        let uniques = email_events::table
            .filter(email_events::created_at.ge(start))
            .filter(email_events::created_at.lt(end))
            .filter(
                email_events::event_type
                    .eq_any([EventType::Opened.as_str(), EventType::Clicked.as_str()]),
            )
            .group_by((email_events::campaign_id, email_events::event_type))
            .select((
                email_events::campaign_id,
                email_events::event_type,
                count(email_events::contact_id).aggregate_distinct(),
            ))
            .load::<(i32, String, i64)>(&mut conn)?;

        let mut per_campaign: BTreeMap<i32, DailyCampaignCounts> = BTreeMap::new();
        for (campaign_id, code, count) in totals {
            let counts = per_campaign.entry(campaign_id).or_default();
            let count = count as i32;
            match code.parse::<EventType>() {
                Ok(EventType::Sent) => counts.sent = count,
                Ok(EventType::Delivered) => counts.delivered = count,
                Ok(EventType::Bounced) => counts.bounced = count,
                Ok(EventType::Opened) => counts.opened = count,
                Ok(EventType::Clicked) => counts.clicked = count,
                Ok(EventType::Unsubscribed) => counts.unsubscribed = count,
                Ok(EventType::Complained) => counts.complained = count,
                Ok(EventType::Failed) => {}
                Err(_) => log::warn!("Unknown event type `{code}` skipped"),
            }
        }
        for (campaign_id, code, count) in uniques {
            let counts = per_campaign.entry(campaign_id).or_default();
            if code == EventType::Opened.as_str() {
                counts.unique_opens = count as i32;
            } else {
                counts.unique_clicks = count as i32;
            }
        }

        per_campaign
            .into_iter()
            .map(|(id, counts)| Ok((CampaignId::new(id)?, counts)))
            .collect()
    }

    fn get_daily_contact_counts(
        &self,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<DailyContactCounts>> {
        use crate::schema::email_events;

        let mut conn = self.conn()?;
        let (start, end) = day_bounds(date);

        let rows = email_events::table
            .filter(email_events::created_at.ge(start))
            .filter(email_events::created_at.lt(end))
            .filter(email_events::event_type.eq_any([
                EventType::Sent.as_str(),
                EventType::Opened.as_str(),
                EventType::Clicked.as_str(),
            ]))
            .group_by((email_events::contact_id, email_events::event_type))
            .select((
                email_events::contact_id,
                email_events::event_type,
                count_star(),
            ))
            .load::<(i32, String, i64)>(&mut conn)?;

        let mut per_contact: BTreeMap<i32, (i32, i32, i32)> = BTreeMap::new();
        for (contact_id, code, count) in rows {
            let entry = per_contact.entry(contact_id).or_default();
            match code.parse::<EventType>() {
                Ok(EventType::Sent) => entry.0 = count as i32,
                Ok(EventType::Opened) => entry.1 = count as i32,
                Ok(EventType::Clicked) => entry.2 = count as i32,
                _ => {}
            }
        }

        per_contact
            .into_iter()
            .map(|(id, (received, opened, clicked))| {
                Ok(DailyContactCounts {
                    contact_id: ContactId::new(id)?,
                    received,
                    opened,
                    clicked,
                })
            })
            .collect()
    }

    fn get_config_event_counts(
        &self,
        config_id: EmailConfigId,
        date: NaiveDate,
    ) -> RepositoryResult<(i32, i32, i32)> {
        use crate::schema::{email_campaigns, email_events};

        let mut conn = self.conn()?;
        let (start, end) = day_bounds(date);

        let rows = email_events::table
            .inner_join(email_campaigns::table)
            .filter(email_campaigns::email_config_id.eq(config_id.get()))
            .filter(email_events::created_at.ge(start))
            .filter(email_events::created_at.lt(end))
            .group_by(email_events::event_type)
            .select((email_events::event_type, count_star()))
            .load::<(String, i64)>(&mut conn)?;

        let mut counts = (0, 0, 0);
        for (event_type, count) in parse_counts(rows) {
            match event_type {
                EventType::Sent => counts.0 = count as i32,
                EventType::Bounced => counts.1 = count as i32,
                EventType::Complained => counts.2 = count as i32,
                _ => {}
            }
        }
        Ok(counts)
    }
}

impl EventWriter for DieselRepository {
    fn record_event(&self, event: &NewEmailEvent, at: NaiveDateTime) -> RepositoryResult<EmailEvent> {
        use crate::models::event::{EmailEvent as DbEmailEvent, NewEmailEvent as DbNewEmailEvent};
        use crate::schema::email_events;

        let mut conn = self.conn()?;
        let insertable = DbNewEmailEvent::new(event, at);
        let created = diesel::insert_into(email_events::table)
            .values(&insertable)
            .returning(DbEmailEvent::as_returning())
            .get_result::<DbEmailEvent>(&mut conn)?;

        Ok(created.try_into()?)
    }

    fn record_engagement(&self, event: &NewEmailEvent, at: NaiveDateTime) -> RepositoryResult<bool> {
        use crate::models::event::NewEmailEvent as DbNewEmailEvent;
        use crate::schema::{email_campaigns as c, email_events};

        let activity = match event.event_type {
            EventType::Opened => ContactActivity::Opened,
            EventType::Clicked => ContactActivity::Clicked,
            other => {
                return Err(RepositoryError::Unexpected(format!(
                    "{other} is not an engagement event"
                )));
            }
        };
        let insertable = DbNewEmailEvent::new(event, at);
        let mut conn = self.conn()?;

        // Takes the write lock up front so concurrent first opens serialize.
        let first = conn.immediate_transaction::<_, RepositoryError, _>(|conn| {
            diesel::insert_into(email_events::table)
                .values(&insertable)
                .execute(conn)?;
            let seen = email_events::table
                .filter(email_events::campaign_id.eq(event.campaign_id.get()))
                .filter(email_events::contact_id.eq(event.contact_id.get()))
                .filter(email_events::event_type.eq(event.event_type.as_str()))
                .count()
                .get_result::<i64>(conn)?;
            let first = seen == 1;
            let unique = i32::from(first);

            let campaign = c::table.find(event.campaign_id.get());
            if activity == ContactActivity::Opened {
                diesel::update(campaign)
                    .set((
                        c::total_opens.eq(c::total_opens + 1),
                        c::unique_opens.eq(c::unique_opens + unique),
                        c::updated_at.eq(at),
                    ))
                    .execute(conn)?;
            } else {
                diesel::update(campaign)
                    .set((
                        c::total_clicks.eq(c::total_clicks + 1),
                        c::unique_clicks.eq(c::unique_clicks + unique),
                        c::updated_at.eq(at),
                    ))
                    .execute(conn)?;
            }

            record_activity(conn, event.contact_id, activity, at)?;
            Ok(first)
        })?;

        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_bounds_span_one_calendar_day() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        let (start, end) = day_bounds(date);
        assert_eq!(start.to_string(), "2025-02-28 00:00:00");
        assert_eq!(end.to_string(), "2025-03-01 00:00:00");
    }

    #[test]
    fn unknown_event_codes_are_dropped() {
        let parsed = parse_counts(vec![("OPENED".into(), 3), ("VIEWED".into(), 1)]);
        assert_eq!(parsed, vec![(EventType::Opened, 3)]);
    }
}
