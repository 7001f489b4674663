use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use diesel::SqliteConnection;
use diesel::dsl::{avg, count_star};
use diesel::prelude::*;

use crate::domain::contact::{
    Contact, ContactActivity, ContactStatistics, ContactStatus, NewContact, StatusChange,
    UpdateContact, round2,
};
use crate::domain::contact_list::{ContactList, ContactTag};
use crate::domain::types::{ContactId, ContactListId, EmailAddress, TagId, UserId};
use crate::domain::user::start_of_month;
use crate::repository::contact_list::recount_lists;
use crate::repository::errors::RepositoryResult;
use crate::repository::{
    ContactExportRow, ContactListQuery, ContactReader, ContactWriter, DieselRepository,
};

const TOP_GROUPS: usize = 5;

/// Sorts `(value, count)` groups by count then value and keeps the top entries.
fn top_groups(groups: Vec<(Option<String>, i64)>) -> Vec<(String, i64)> {
    let mut groups: Vec<(String, i64)> = groups
        .into_iter()
        .filter_map(|(value, count)| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (v, count))
        })
        .collect();
    groups.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    groups.truncate(TOP_GROUPS);
    groups
}

fn ids(contacts: &[ContactId]) -> Vec<i32> {
    contacts.iter().map(|id| id.get()).collect()
}

/// Bumps one engagement counter in place and refreshes the stored score from
/// the updated row. Status and subscription columns are left alone.
pub(crate) fn record_activity(
    conn: &mut SqliteConnection,
    id: ContactId,
    activity: ContactActivity,
    at: NaiveDateTime,
) -> RepositoryResult<()> {
    use crate::models::contact::Contact as DbContact;
    use crate::schema::contacts;

    let target = || contacts::table.find(id.get());
    match activity {
        ContactActivity::Received => diesel::update(target())
            .set(contacts::total_emails_received.eq(contacts::total_emails_received + 1))
            .execute(conn)?,
        ContactActivity::Opened => diesel::update(target())
            .set((
                contacts::total_emails_opened.eq(contacts::total_emails_opened + 1),
                contacts::last_email_opened_at.eq(Some(at)),
            ))
            .execute(conn)?,
        ContactActivity::Clicked => diesel::update(target())
            .set((
                contacts::total_emails_clicked.eq(contacts::total_emails_clicked + 1),
                contacts::last_email_clicked_at.eq(Some(at)),
            ))
            .execute(conn)?,
    };

    let Some(row) = target()
        .select(DbContact::as_select())
        .first::<DbContact>(conn)
        .optional()?
    else {
        return Ok(());
    };
    let contact: Contact = row.try_into()?;
    diesel::update(target())
        .set(contacts::engagement_score.eq(contact.calculate_engagement_score(at)))
        .execute(conn)?;
    Ok(())
}

impl ContactReader for DieselRepository {
    fn get_contact_by_id(
        &self,
        id: ContactId,
        user_id: UserId,
    ) -> RepositoryResult<Option<Contact>> {
        use crate::models::contact::Contact as DbContact;
        use crate::schema::contacts;

        let mut conn = self.conn()?;
        let contact = contacts::table
            .filter(contacts::id.eq(id.get()))
            .filter(contacts::user_id.eq(user_id.get()))
            .select(DbContact::as_select())
            .first::<DbContact>(&mut conn)
            .optional()?;

        Ok(contact.map(TryInto::try_into).transpose()?)
    }

    fn find_contact(&self, id: ContactId) -> RepositoryResult<Option<Contact>> {
        use crate::models::contact::Contact as DbContact;
        use crate::schema::contacts;

        let mut conn = self.conn()?;
        let contact = contacts::table
            .find(id.get())
            .select(DbContact::as_select())
            .first::<DbContact>(&mut conn)
            .optional()?;

        Ok(contact.map(TryInto::try_into).transpose()?)
    }

    fn get_contact_by_email(
        &self,
        user_id: UserId,
        email: &EmailAddress,
    ) -> RepositoryResult<Option<Contact>> {
        use crate::models::contact::Contact as DbContact;
        use crate::schema::contacts;

        let mut conn = self.conn()?;
        let contact = contacts::table
            .filter(contacts::user_id.eq(user_id.get()))
            .filter(contacts::email.eq(email.as_str()))
            .select(DbContact::as_select())
            .first::<DbContact>(&mut conn)
            .optional()?;

        Ok(contact.map(TryInto::try_into).transpose()?)
    }

    fn list_contacts(&self, query: ContactListQuery) -> RepositoryResult<(usize, Vec<Contact>)> {
        use crate::models::contact::Contact as DbContact;
        use crate::schema::{contact_list_members, contact_tag_assignments, contacts};

        let mut conn = self.conn()?;

        let query_builder = || {
            let mut items = contacts::table
                .filter(contacts::user_id.eq(query.user_id.get()))
                .into_boxed::<diesel::sqlite::Sqlite>();

            if let Some(status) = query.status {
                items = items.filter(contacts::status.eq(status.as_str()));
            }
            if let Some(list_id) = query.list_id {
                items = items.filter(
                    contacts::id.eq_any(
                        contact_list_members::table
                            .filter(contact_list_members::list_id.eq(list_id.get()))
                            .select(contact_list_members::contact_id),
                    ),
                );
            }
            if let Some(tag_id) = query.tag_id {
                items = items.filter(
                    contacts::id.eq_any(
                        contact_tag_assignments::table
                            .filter(contact_tag_assignments::tag_id.eq(tag_id.get()))
                            .select(contact_tag_assignments::contact_id),
                    ),
                );
            }
            if let Some(term) = query.search.as_ref().filter(|t| !t.trim().is_empty()) {
                let pattern = format!("%{}%", term.trim());
                items = items.filter(
                    contacts::email
                        .like(pattern.clone())
                        .or(contacts::first_name.like(pattern.clone()))
                        .or(contacts::last_name.like(pattern.clone()))
                        .or(contacts::company.like(pattern)),
                );
            }
            items
        };

        let total = query_builder().count().get_result::<i64>(&mut conn)? as usize;

        let mut items = query_builder().order((contacts::created_at.desc(), contacts::id.desc()));
        if let Some(pagination) = &query.pagination {
            items = items.limit(pagination.limit()).offset(pagination.offset());
        }

        let contacts = items
            .select(DbContact::as_select())
            .load::<DbContact>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Contact>, _>>()?;

        Ok((total, contacts))
    }

    fn count_contacts(&self, user_id: UserId) -> RepositoryResult<i64> {
        use crate::schema::contacts;

        let mut conn = self.conn()?;
        let total = contacts::table
            .filter(contacts::user_id.eq(user_id.get()))
            .count()
            .get_result::<i64>(&mut conn)?;
        Ok(total)
    }

    fn get_contact_statistics(
        &self,
        user_id: UserId,
        now: NaiveDateTime,
    ) -> RepositoryResult<ContactStatistics> {
        use crate::schema::contacts;

        let mut conn = self.conn()?;
        let owner = contacts::user_id.eq(user_id.get());

        let by_status = contacts::table
            .filter(owner)
            .group_by(contacts::status)
            .select((contacts::status, count_star()))
            .load::<(String, i64)>(&mut conn)?;

        let mut stats = ContactStatistics::default();
        for (status, count) in by_status {
            stats.total += count;
            match status.parse::<ContactStatus>() {
                Ok(ContactStatus::Active) => stats.active += count,
                Ok(ContactStatus::Unsubscribed) => stats.unsubscribed += count,
                Ok(ContactStatus::Bounced) => stats.bounced += count,
                Ok(ContactStatus::Complained) => stats.complained += count,
                Ok(ContactStatus::Blocked) => stats.blocked += count,
                Err(_) => log::warn!("Unknown contact status `{status}` in statistics"),
            }
        }

        stats.average_engagement = contacts::table
            .filter(owner)
            .select(avg(contacts::engagement_score))
            .first::<Option<f64>>(&mut conn)?
            .map(round2)
            .unwrap_or(0.0);

        for (since, slot) in [
            (now.date().and_time(NaiveTime::MIN), &mut stats.added_today),
            (now - Duration::days(7), &mut stats.added_this_week),
            (start_of_month(now), &mut stats.added_this_month),
        ] {
            *slot = contacts::table
                .filter(owner)
                .filter(contacts::created_at.ge(since))
                .count()
                .get_result::<i64>(&mut conn)?;
        }

        let countries = contacts::table
            .filter(owner)
            .group_by(contacts::country)
            .select((contacts::country, count_star()))
            .load::<(Option<String>, i64)>(&mut conn)?;
        stats.top_countries = top_groups(countries);

        let companies = contacts::table
            .filter(owner)
            .group_by(contacts::company)
            .select((contacts::company, count_star()))
            .load::<(Option<String>, i64)>(&mut conn)?;
        stats.top_companies = top_groups(companies);

        Ok(stats)
    }

    fn list_contact_memberships(
        &self,
        contact_id: ContactId,
    ) -> RepositoryResult<(Vec<ContactList>, Vec<ContactTag>)> {
        use crate::models::contact_list::{ContactList as DbContactList, ContactTag as DbContactTag};
        use crate::schema::{contact_list_members, contact_lists, contact_tag_assignments, contact_tags};

        let mut conn = self.conn()?;

        let lists = contact_lists::table
            .inner_join(contact_list_members::table)
            .filter(contact_list_members::contact_id.eq(contact_id.get()))
            .order(contact_lists::name.asc())
            .select(DbContactList::as_select())
            .load::<DbContactList>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<ContactList>, _>>()?;

        let tags = contact_tags::table
            .inner_join(contact_tag_assignments::table)
            .filter(contact_tag_assignments::contact_id.eq(contact_id.get()))
            .order(contact_tags::name.asc())
            .select(DbContactTag::as_select())
            .load::<DbContactTag>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<ContactTag>, _>>()?;

        Ok((lists, tags))
    }

    fn list_contacts_for_export(
        &self,
        user_id: UserId,
    ) -> RepositoryResult<Vec<ContactExportRow>> {
        use crate::models::contact::Contact as DbContact;
        use crate::schema::{
            contact_list_members, contact_lists, contact_tag_assignments, contact_tags, contacts,
        };

        let mut conn = self.conn()?;

        let rows = contacts::table
            .filter(contacts::user_id.eq(user_id.get()))
            .order(contacts::email.asc())
            .select(DbContact::as_select())
            .load::<DbContact>(&mut conn)?;

        let mut lists: HashMap<i32, Vec<String>> = HashMap::new();
        for (contact_id, name) in contact_list_members::table
            .inner_join(contact_lists::table)
            .filter(contact_lists::user_id.eq(user_id.get()))
            .order(contact_lists::name.asc())
            .select((contact_list_members::contact_id, contact_lists::name))
            .load::<(i32, String)>(&mut conn)?
        {
            lists.entry(contact_id).or_default().push(name);
        }

        let mut tags: HashMap<i32, Vec<String>> = HashMap::new();
        for (contact_id, name) in contact_tag_assignments::table
            .inner_join(contact_tags::table)
            .filter(contact_tags::user_id.eq(user_id.get()))
            .order(contact_tags::name.asc())
            .select((contact_tag_assignments::contact_id, contact_tags::name))
            .load::<(i32, String)>(&mut conn)?
        {
            tags.entry(contact_id).or_default().push(name);
        }

        rows.into_iter()
            .map(|row| {
                let id = row.id;
                Ok(ContactExportRow {
                    contact: row.try_into()?,
                    lists: lists.remove(&id).unwrap_or_default(),
                    tags: tags.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    fn list_contacts_batch(
        &self,
        user_id: Option<UserId>,
        after: Option<ContactId>,
        limit: i64,
    ) -> RepositoryResult<Vec<Contact>> {
        use crate::models::contact::Contact as DbContact;
        use crate::schema::contacts;

        let mut conn = self.conn()?;
        let mut items = contacts::table.into_boxed::<diesel::sqlite::Sqlite>();
        if let Some(user_id) = user_id {
            items = items.filter(contacts::user_id.eq(user_id.get()));
        }
        if let Some(after) = after {
            items = items.filter(contacts::id.gt(after.get()));
        }

        let contacts = items
            .order(contacts::id.asc())
            .limit(limit)
            .select(DbContact::as_select())
            .load::<DbContact>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Contact>, _>>()?;

        Ok(contacts)
    }
}

impl ContactWriter for DieselRepository {
    fn create_contact(&self, new_contact: &NewContact) -> RepositoryResult<Contact> {
        use crate::models::contact::{Contact as DbContact, NewContact as DbNewContact};
        use crate::schema::contacts;

        let mut conn = self.conn()?;
        let insertable = DbNewContact::new(new_contact, chrono::Utc::now().naive_utc());
        let created = diesel::insert_into(contacts::table)
            .values(&insertable)
            .returning(DbContact::as_returning())
            .get_result::<DbContact>(&mut conn)?;

        Ok(created.try_into()?)
    }

    fn update_contact(&self, id: ContactId, updates: &UpdateContact) -> RepositoryResult<Contact> {
        use crate::models::contact::{Contact as DbContact, UpdateContact as DbUpdateContact};
        use crate::schema::contacts;

        let mut conn = self.conn()?;
        let changes = DbUpdateContact::new(updates, chrono::Utc::now().naive_utc());
        let updated = diesel::update(contacts::table.find(id.get()))
            .set(&changes)
            .returning(DbContact::as_returning())
            .get_result::<DbContact>(&mut conn)?;

        Ok(updated.try_into()?)
    }

    fn change_contact_status(
        &self,
        id: ContactId,
        change: &StatusChange,
        at: NaiveDateTime,
    ) -> RepositoryResult<Option<Contact>> {
        use crate::models::contact::Contact as DbContact;
        use crate::schema::{contact_list_members, contacts};

        let mut conn = self.conn()?;
        let from: Vec<&str> = change.allowed_from().iter().map(|s| s.as_str()).collect();
        let target = change.target().as_str();

        let changed = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let guarded = contacts::table
                .filter(contacts::id.eq(id.get()))
                .filter(contacts::status.eq_any(from));
            let updated = match change {
                StatusChange::Unsubscribe { reason } => diesel::update(guarded)
                    .set((
                        contacts::status.eq(target),
                        contacts::is_active.eq(false),
                        contacts::unsubscribed_at.eq(Some(at)),
                        contacts::unsubscribe_reason.eq(reason.as_deref()),
                        contacts::updated_at.eq(at),
                    ))
                    .execute(conn)?,
                StatusChange::Resubscribe => diesel::update(guarded)
                    .set((
                        contacts::status.eq(target),
                        contacts::is_active.eq(true),
                        contacts::subscribed_at.eq(at),
                        contacts::unsubscribed_at.eq(None::<NaiveDateTime>),
                        contacts::unsubscribe_reason.eq(None::<String>),
                        contacts::updated_at.eq(at),
                    ))
                    .execute(conn)?,
                StatusChange::Bounce | StatusChange::Complain => diesel::update(guarded)
                    .set((contacts::status.eq(target), contacts::updated_at.eq(at)))
                    .execute(conn)?,
            };
            if updated == 0 {
                return Ok(None);
            }

            let list_ids = contact_list_members::table
                .filter(contact_list_members::contact_id.eq(id.get()))
                .select(contact_list_members::list_id)
                .load::<i32>(conn)?;
            recount_lists(conn, &list_ids)?;

            contacts::table
                .find(id.get())
                .select(DbContact::as_select())
                .first::<DbContact>(conn)
                .map(Some)
        })?;

        Ok(changed.map(TryInto::try_into).transpose()?)
    }

    fn save_engagement_score(&self, id: ContactId, score: f64) -> RepositoryResult<()> {
        use crate::schema::contacts;

        let mut conn = self.conn()?;
        diesel::update(contacts::table.find(id.get()))
            .set(contacts::engagement_score.eq(score))
            .execute(&mut conn)?;
        Ok(())
    }

    fn delete_contacts(
        &self,
        user_id: UserId,
        ids_to_delete: &[ContactId],
    ) -> RepositoryResult<usize> {
        use crate::schema::{contact_list_members, contacts};

        let mut conn = self.conn()?;
        let ids = ids(ids_to_delete);

        let deleted = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let owned = contacts::table
                .filter(contacts::user_id.eq(user_id.get()))
                .filter(contacts::id.eq_any(&ids))
                .select(contacts::id)
                .load::<i32>(conn)?;

            let list_ids = contact_list_members::table
                .filter(contact_list_members::contact_id.eq_any(&owned))
                .select(contact_list_members::list_id)
                .distinct()
                .load::<i32>(conn)?;

            let deleted =
                diesel::delete(contacts::table.filter(contacts::id.eq_any(&owned))).execute(conn)?;
            recount_lists(conn, &list_ids)?;
            Ok(deleted)
        })?;

        Ok(deleted)
    }

    fn add_contacts_to_list(
        &self,
        list_id: ContactListId,
        contact_ids: &[ContactId],
    ) -> RepositoryResult<usize> {
        use crate::models::contact_list::NewListMember;
        use crate::schema::contact_list_members;

        let mut conn = self.conn()?;
        let now = chrono::Utc::now().naive_utc();
        let rows: Vec<NewListMember> = contact_ids
            .iter()
            .map(|contact_id| NewListMember {
                list_id: list_id.get(),
                contact_id: contact_id.get(),
                added_at: now,
            })
            .collect();

        let added = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let added = diesel::insert_or_ignore_into(contact_list_members::table)
                .values(&rows)
                .execute(conn)?;
            recount_lists(conn, &[list_id.get()])?;
            Ok(added)
        })?;

        Ok(added)
    }

    fn remove_contacts_from_list(
        &self,
        list_id: ContactListId,
        contact_ids: &[ContactId],
    ) -> RepositoryResult<usize> {
        use crate::schema::contact_list_members;

        let mut conn = self.conn()?;
        let ids = ids(contact_ids);

        let removed = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let removed = diesel::delete(
                contact_list_members::table
                    .filter(contact_list_members::list_id.eq(list_id.get()))
                    .filter(contact_list_members::contact_id.eq_any(&ids)),
            )
            .execute(conn)?;
            recount_lists(conn, &[list_id.get()])?;
            Ok(removed)
        })?;

        Ok(removed)
    }

    fn tag_contacts(&self, tag_id: TagId, contact_ids: &[ContactId]) -> RepositoryResult<usize> {
        use crate::models::contact_list::NewTagAssignment;
        use crate::schema::contact_tag_assignments;

        let mut conn = self.conn()?;
        let rows: Vec<NewTagAssignment> = contact_ids
            .iter()
            .map(|contact_id| NewTagAssignment {
                tag_id: tag_id.get(),
                contact_id: contact_id.get(),
            })
            .collect();

        let tagged = diesel::insert_or_ignore_into(contact_tag_assignments::table)
            .values(&rows)
            .execute(&mut conn)?;
        Ok(tagged)
    }

    fn unsubscribe_contacts(
        &self,
        user_id: UserId,
        contact_ids: &[ContactId],
        at: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        use crate::schema::{contact_list_members, contacts};

        let mut conn = self.conn()?;
        let ids = ids(contact_ids);

        let updated = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let updated = diesel::update(
                contacts::table
                    .filter(contacts::user_id.eq(user_id.get()))
                    .filter(contacts::id.eq_any(&ids))
                    .filter(contacts::status.ne(ContactStatus::Unsubscribed.as_str())),
            )
            .set((
                contacts::status.eq(ContactStatus::Unsubscribed.as_str()),
                contacts::is_active.eq(false),
                contacts::unsubscribed_at.eq(Some(at)),
                contacts::updated_at.eq(at),
            ))
            .execute(conn)?;

            let list_ids = contact_list_members::table
                .filter(contact_list_members::contact_id.eq_any(&ids))
                .select(contact_list_members::list_id)
                .distinct()
                .load::<i32>(conn)?;
            recount_lists(conn, &list_ids)?;
            Ok(updated)
        })?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_groups_skip_blank_values_and_keep_five() {
        let groups = vec![
            (Some("Cameroon".to_string()), 4),
            (None, 10),
            (Some("  ".to_string()), 3),
            (Some("Senegal".to_string()), 4),
            (Some("Ghana".to_string()), 2),
            (Some("Kenya".to_string()), 1),
            (Some("Nigeria".to_string()), 6),
            (Some("Togo".to_string()), 1),
        ];
        let top = top_groups(groups);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0], ("Nigeria".to_string(), 6));
        assert_eq!(top[1], ("Cameroon".to_string(), 4));
        assert_eq!(top[2], ("Senegal".to_string(), 4));
        assert_eq!(top[4], ("Kenya".to_string(), 1));
    }
}
