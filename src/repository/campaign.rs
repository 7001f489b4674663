use chrono::NaiveDateTime;
use diesel::dsl::count_star;
use diesel::prelude::*;

use crate::domain::campaign::{
    CampaignCounterDelta, CampaignStatus, EmailCampaign, NewEmailCampaign, UpdateEmailCampaign,
};
use crate::domain::contact::{Contact, ContactStatus};
use crate::domain::types::{CampaignId, ContactListId, UserId};
use crate::repository::errors::RepositoryResult;
use crate::repository::{CampaignListQuery, CampaignReader, CampaignWriter, DieselRepository};

impl CampaignReader for DieselRepository {
    fn get_campaign(
        &self,
        id: CampaignId,
        user_id: UserId,
    ) -> RepositoryResult<Option<EmailCampaign>> {
        use crate::models::campaign::EmailCampaign as DbCampaign;
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;
        let campaign = email_campaigns::table
            .filter(email_campaigns::id.eq(id.get()))
            .filter(email_campaigns::user_id.eq(user_id.get()))
            .select(DbCampaign::as_select())
            .first::<DbCampaign>(&mut conn)
            .optional()?;

        Ok(campaign.map(TryInto::try_into).transpose()?)
    }

    fn find_campaign(&self, id: CampaignId) -> RepositoryResult<Option<EmailCampaign>> {
        use crate::models::campaign::EmailCampaign as DbCampaign;
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;
        let campaign = email_campaigns::table
            .find(id.get())
            .select(DbCampaign::as_select())
            .first::<DbCampaign>(&mut conn)
            .optional()?;

        Ok(campaign.map(TryInto::try_into).transpose()?)
    }

    fn list_campaigns(
        &self,
        query: CampaignListQuery,
    ) -> RepositoryResult<(usize, Vec<EmailCampaign>)> {
        use crate::models::campaign::EmailCampaign as DbCampaign;
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;

        let query_builder = || {
            let mut items = email_campaigns::table
                .filter(email_campaigns::user_id.eq(query.user_id.get()))
                .into_boxed::<diesel::sqlite::Sqlite>();

            if let Some(status) = query.status {
                items = items.filter(email_campaigns::status.eq(status.as_str()));
            }
            if let Some(since) = query.created_since {
                items = items.filter(email_campaigns::created_at.ge(since));
            }
            if let Some(term) = query.search.as_ref().filter(|t| !t.trim().is_empty()) {
                let pattern = format!("%{}%", term.trim());
                items = items.filter(
                    email_campaigns::name
                        .like(pattern.clone())
                        .or(email_campaigns::subject.like(pattern)),
                );
            }
            items
        };

        let total = query_builder().count().get_result::<i64>(&mut conn)? as usize;

        let mut items = query_builder().order((
            email_campaigns::created_at.desc(),
            email_campaigns::id.desc(),
        ));
        if let Some(pagination) = &query.pagination {
            items = items.limit(pagination.limit()).offset(pagination.offset());
        }

        let campaigns = items
            .select(DbCampaign::as_select())
            .load::<DbCampaign>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<EmailCampaign>, _>>()?;

        Ok((total, campaigns))
    }

    fn list_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> RepositoryResult<Vec<EmailCampaign>> {
        use crate::models::campaign::EmailCampaign as DbCampaign;
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;
        let campaigns = email_campaigns::table
            .filter(email_campaigns::status.eq(status.as_str()))
            .order(email_campaigns::id.asc())
            .select(DbCampaign::as_select())
            .load::<DbCampaign>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<EmailCampaign>, _>>()?;

        Ok(campaigns)
    }

    fn list_due_scheduled_campaigns(
        &self,
        now: NaiveDateTime,
    ) -> RepositoryResult<Vec<EmailCampaign>> {
        use crate::models::campaign::EmailCampaign as DbCampaign;
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;
        let campaigns = email_campaigns::table
            .filter(email_campaigns::status.eq(CampaignStatus::Scheduled.as_str()))
            .filter(email_campaigns::scheduled_at.le(now))
            .order(email_campaigns::scheduled_at.asc())
            .select(DbCampaign::as_select())
            .load::<DbCampaign>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<EmailCampaign>, _>>()?;

        Ok(campaigns)
    }

    fn get_campaign_list_ids(&self, id: CampaignId) -> RepositoryResult<Vec<ContactListId>> {
        use crate::schema::campaign_lists;

        let mut conn = self.conn()?;
        let ids = campaign_lists::table
            .filter(campaign_lists::campaign_id.eq(id.get()))
            .order(campaign_lists::list_id.asc())
            .select(campaign_lists::list_id)
            .load::<i32>(&mut conn)?
            .into_iter()
            .map(ContactListId::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids)
    }

    fn count_campaigns_since(
        &self,
        user_id: UserId,
        since: NaiveDateTime,
    ) -> RepositoryResult<i64> {
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;
        let total = email_campaigns::table
            .filter(email_campaigns::user_id.eq(user_id.get()))
            .filter(email_campaigns::created_at.ge(since))
            .count()
            .get_result::<i64>(&mut conn)?;
        Ok(total)
    }

    fn list_recipients(&self, id: CampaignId) -> RepositoryResult<Vec<Contact>> {
        use crate::models::contact::Contact as DbContact;
        use crate::schema::{campaign_lists, contact_list_members, contacts};

        let mut conn = self.conn()?;
        let list_ids = campaign_lists::table
            .filter(campaign_lists::campaign_id.eq(id.get()))
            .select(campaign_lists::list_id);
        let member_ids = contact_list_members::table
            .filter(contact_list_members::list_id.eq_any(list_ids))
            .select(contact_list_members::contact_id);

        let recipients = contacts::table
            .filter(contacts::id.eq_any(member_ids))
            .filter(contacts::is_active.eq(true))
            .filter(contacts::status.eq(ContactStatus::Active.as_str()))
            .order(contacts::id.asc())
            .select(DbContact::as_select())
            .load::<DbContact>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Contact>, _>>()?;

        Ok(recipients)
    }

    fn count_recipients(&self, id: CampaignId) -> RepositoryResult<i64> {
        use crate::schema::{campaign_lists, contact_list_members, contacts};

        let mut conn = self.conn()?;
        let list_ids = campaign_lists::table
            .filter(campaign_lists::campaign_id.eq(id.get()))
            .select(campaign_lists::list_id);
        let member_ids = contact_list_members::table
            .filter(contact_list_members::list_id.eq_any(list_ids))
            .select(contact_list_members::contact_id);

        let total = contacts::table
            .filter(contacts::id.eq_any(member_ids))
            .filter(contacts::is_active.eq(true))
            .filter(contacts::status.eq(ContactStatus::Active.as_str()))
            .count()
            .get_result::<i64>(&mut conn)?;
        Ok(total)
    }

    fn count_campaigns_by_status(&self, user_id: UserId) -> RepositoryResult<Vec<(String, i64)>> {
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;
        let mut counts = email_campaigns::table
            .filter(email_campaigns::user_id.eq(user_id.get()))
            .group_by(email_campaigns::status)
            .select((email_campaigns::status, count_star()))
            .load::<(String, i64)>(&mut conn)?;
        counts.sort();
        Ok(counts)
    }
}

fn replace_lists(
    conn: &mut diesel::SqliteConnection,
    campaign_id: i32,
    list_ids: &[ContactListId],
) -> QueryResult<()> {
    use crate::models::campaign::NewCampaignList;
    use crate::schema::campaign_lists;

    diesel::delete(campaign_lists::table.filter(campaign_lists::campaign_id.eq(campaign_id)))
        .execute(conn)?;

    let rows: Vec<NewCampaignList> = list_ids
        .iter()
        .map(|list_id| NewCampaignList {
            campaign_id,
            list_id: list_id.get(),
        })
        .collect();
    diesel::insert_or_ignore_into(campaign_lists::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

impl CampaignWriter for DieselRepository {
    fn create_campaign(
        &self,
        campaign: &NewEmailCampaign,
        list_ids: &[ContactListId],
    ) -> RepositoryResult<EmailCampaign> {
        use crate::models::campaign::{CampaignContent, EmailCampaign as DbCampaign};
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;
        let insertable = CampaignContent::new(campaign, chrono::Utc::now().naive_utc());

        let created = conn.transaction::<DbCampaign, diesel::result::Error, _>(|conn| {
            let created = diesel::insert_into(email_campaigns::table)
                .values(&insertable)
                .returning(DbCampaign::as_returning())
                .get_result::<DbCampaign>(conn)?;
            replace_lists(conn, created.id, list_ids)?;
            Ok(created)
        })?;

        Ok(created.try_into()?)
    }

    fn update_campaign(
        &self,
        id: CampaignId,
        updates: &UpdateEmailCampaign,
        list_ids: &[ContactListId],
    ) -> RepositoryResult<EmailCampaign> {
        use crate::models::campaign::{CampaignContent, EmailCampaign as DbCampaign};
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;
        let changes = CampaignContent::new(updates, chrono::Utc::now().naive_utc());

        let updated = conn.transaction::<DbCampaign, diesel::result::Error, _>(|conn| {
            let updated = diesel::update(email_campaigns::table.find(id.get()))
                .set(&changes)
                .returning(DbCampaign::as_returning())
                .get_result::<DbCampaign>(conn)?;
            replace_lists(conn, updated.id, list_ids)?;
            Ok(updated)
        })?;

        Ok(updated.try_into()?)
    }

    fn delete_campaign(&self, id: CampaignId) -> RepositoryResult<()> {
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;
        diesel::delete(email_campaigns::table.find(id.get())).execute(&mut conn)?;
        Ok(())
    }

    fn save_campaign_status(&self, campaign: &EmailCampaign) -> RepositoryResult<()> {
        use crate::models::campaign::CampaignStatusChange;
        use crate::schema::email_campaigns;

        let mut conn = self.conn()?;
        let changes: CampaignStatusChange = campaign.into();
        diesel::update(email_campaigns::table.find(campaign.id.get()))
            .set(&changes)
            .execute(&mut conn)?;
        Ok(())
    }

    fn increment_campaign_counters(
        &self,
        id: CampaignId,
        delta: CampaignCounterDelta,
    ) -> RepositoryResult<()> {
        use crate::schema::email_campaigns as c;

        let mut conn = self.conn()?;
        diesel::update(c::table.find(id.get()))
            .set((
                c::emails_sent.eq(c::emails_sent + delta.sent),
                c::emails_delivered.eq(c::emails_delivered + delta.delivered),
                c::emails_bounced.eq(c::emails_bounced + delta.bounced),
                c::emails_failed.eq(c::emails_failed + delta.failed),
                c::unique_opens.eq(c::unique_opens + delta.unique_opens),
                c::total_opens.eq(c::total_opens + delta.total_opens),
                c::unique_clicks.eq(c::unique_clicks + delta.unique_clicks),
                c::total_clicks.eq(c::total_clicks + delta.total_clicks),
                c::unsubscribes.eq(c::unsubscribes + delta.unsubscribes),
                c::complaints.eq(c::complaints + delta.complaints),
                c::updated_at.eq(chrono::Utc::now().naive_utc()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }
}
