use diesel::SqliteConnection;
use diesel::prelude::*;

use crate::domain::contact::ContactStatus;
use crate::domain::contact_list::{
    ContactList, ContactTag, NewContactList, NewContactTag, UpdateContactList,
};
use crate::domain::types::{ContactListId, TagId, UserId};
use crate::repository::errors::RepositoryResult;
use crate::repository::{ContactListReader, ContactListWriter, DieselRepository};

/// Sets `contact_count` of each list to the number of its active members.
pub(crate) fn recount_lists(conn: &mut SqliteConnection, list_ids: &[i32]) -> QueryResult<()> {
    use crate::schema::{contact_list_members, contact_lists, contacts};

    for list_id in list_ids {
        let active = contact_list_members::table
            .inner_join(contacts::table)
            .filter(contact_list_members::list_id.eq(list_id))
            .filter(contacts::is_active.eq(true))
            .filter(contacts::status.eq(ContactStatus::Active.as_str()))
            .count()
            .get_result::<i64>(conn)?;

        diesel::update(contact_lists::table.find(list_id))
            .set(contact_lists::contact_count.eq(active as i32))
            .execute(conn)?;
    }
    Ok(())
}

impl ContactListReader for DieselRepository {
    fn get_contact_list(
        &self,
        id: ContactListId,
        user_id: UserId,
    ) -> RepositoryResult<Option<ContactList>> {
        use crate::models::contact_list::ContactList as DbContactList;
        use crate::schema::contact_lists;

        let mut conn = self.conn()?;
        let list = contact_lists::table
            .filter(contact_lists::id.eq(id.get()))
            .filter(contact_lists::user_id.eq(user_id.get()))
            .select(DbContactList::as_select())
            .first::<DbContactList>(&mut conn)
            .optional()?;

        Ok(list.map(TryInto::try_into).transpose()?)
    }

    fn list_contact_lists(&self, user_id: UserId) -> RepositoryResult<Vec<ContactList>> {
        use crate::models::contact_list::ContactList as DbContactList;
        use crate::schema::contact_lists;

        let mut conn = self.conn()?;
        let lists = contact_lists::table
            .filter(contact_lists::user_id.eq(user_id.get()))
            .order((contact_lists::is_favorite.desc(), contact_lists::name.asc()))
            .select(DbContactList::as_select())
            .load::<DbContactList>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<ContactList>, _>>()?;

        Ok(lists)
    }

    fn get_tag(&self, id: TagId, user_id: UserId) -> RepositoryResult<Option<ContactTag>> {
        use crate::models::contact_list::ContactTag as DbContactTag;
        use crate::schema::contact_tags;

        let mut conn = self.conn()?;
        let tag = contact_tags::table
            .filter(contact_tags::id.eq(id.get()))
            .filter(contact_tags::user_id.eq(user_id.get()))
            .select(DbContactTag::as_select())
            .first::<DbContactTag>(&mut conn)
            .optional()?;

        Ok(tag.map(TryInto::try_into).transpose()?)
    }

    fn list_tags(&self, user_id: UserId) -> RepositoryResult<Vec<ContactTag>> {
        use crate::models::contact_list::ContactTag as DbContactTag;
        use crate::schema::contact_tags;

        let mut conn = self.conn()?;
        let tags = contact_tags::table
            .filter(contact_tags::user_id.eq(user_id.get()))
            .order(contact_tags::name.asc())
            .select(DbContactTag::as_select())
            .load::<DbContactTag>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<ContactTag>, _>>()?;

        Ok(tags)
    }
}

impl ContactListWriter for DieselRepository {
    fn create_contact_list(&self, list: &NewContactList) -> RepositoryResult<ContactList> {
        use crate::models::contact_list::{
            ContactList as DbContactList, NewContactList as DbNewContactList,
        };
        use crate::schema::contact_lists;

        let mut conn = self.conn()?;
        let insertable: DbNewContactList = list.into();
        let created = diesel::insert_into(contact_lists::table)
            .values(&insertable)
            .returning(DbContactList::as_returning())
            .get_result::<DbContactList>(&mut conn)?;

        Ok(created.try_into()?)
    }

    fn update_contact_list(
        &self,
        id: ContactListId,
        updates: &UpdateContactList,
    ) -> RepositoryResult<ContactList> {
        use crate::models::contact_list::{
            ContactList as DbContactList, UpdateContactList as DbUpdateContactList,
        };
        use crate::schema::contact_lists;

        let mut conn = self.conn()?;
        let changes = DbUpdateContactList::new(updates, chrono::Utc::now().naive_utc());
        let updated = diesel::update(contact_lists::table.find(id.get()))
            .set(&changes)
            .returning(DbContactList::as_returning())
            .get_result::<DbContactList>(&mut conn)?;

        Ok(updated.try_into()?)
    }

    fn delete_contact_list(&self, id: ContactListId) -> RepositoryResult<()> {
        use crate::schema::contact_lists;

        let mut conn = self.conn()?;
        diesel::delete(contact_lists::table.find(id.get())).execute(&mut conn)?;
        Ok(())
    }

    fn create_tag(&self, tag: &NewContactTag) -> RepositoryResult<ContactTag> {
        use crate::models::contact_list::{ContactTag as DbContactTag, NewContactTag as DbNewTag};
        use crate::schema::contact_tags;

        let mut conn = self.conn()?;
        let insertable: DbNewTag = tag.into();
        let created = diesel::insert_into(contact_tags::table)
            .values(&insertable)
            .returning(DbContactTag::as_returning())
            .get_result::<DbContactTag>(&mut conn)?;

        Ok(created.try_into()?)
    }

    fn delete_tag(&self, id: TagId) -> RepositoryResult<()> {
        use crate::schema::contact_tags;

        let mut conn = self.conn()?;
        diesel::delete(contact_tags::table.find(id.get())).execute(&mut conn)?;
        Ok(())
    }
}
