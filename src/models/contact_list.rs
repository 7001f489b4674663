use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::contact_list::{
    ContactList as DomainContactList, ContactTag as DomainContactTag,
    NewContactList as DomainNewContactList, NewContactTag as DomainNewContactTag,
    UpdateContactList as DomainUpdateContactList,
};
use crate::domain::types::{
    ContactListId, HexColor, ListName, TagId, TagName, TypeConstraintError, UserId,
};
use crate::models::{parse_json, to_json};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::contact_lists)]
pub struct ContactList {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub list_type: String,
    pub conditions: String,
    pub is_active: bool,
    pub is_favorite: bool,
    pub contact_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::contact_lists)]
pub struct NewContactList<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub list_type: &'a str,
    pub conditions: String,
    pub is_favorite: bool,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::contact_lists)]
#[diesel(treat_none_as_null = true)]
pub struct UpdateContactList<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub is_active: bool,
    pub is_favorite: bool,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::contact_tags)]
pub struct ContactTag {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub color: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::contact_tags)]
pub struct NewContactTag<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub color: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::contact_list_members)]
pub struct NewListMember {
    pub list_id: i32,
    pub contact_id: i32,
    pub added_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::contact_tag_assignments)]
pub struct NewTagAssignment {
    pub tag_id: i32,
    pub contact_id: i32,
}

impl TryFrom<ContactList> for DomainContactList {
    type Error = TypeConstraintError;

    fn try_from(list: ContactList) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ContactListId::new(list.id)?,
            user_id: UserId::new(list.user_id)?,
            name: ListName::new(list.name)?,
            description: list.description,
            list_type: list.list_type.parse()?,
            conditions: parse_json(&list.conditions, "conditions")?,
            is_active: list.is_active,
            is_favorite: list.is_favorite,
            contact_count: list.contact_count,
            created_at: list.created_at,
            updated_at: list.updated_at,
        })
    }
}

impl<'a> From<&'a DomainNewContactList> for NewContactList<'a> {
    fn from(list: &'a DomainNewContactList) -> Self {
        Self {
            user_id: list.user_id.get(),
            name: list.name.as_str(),
            description: list.description.as_deref(),
            list_type: list.list_type.as_str(),
            conditions: to_json(&list.conditions),
            is_favorite: list.is_favorite,
        }
    }
}

impl<'a> UpdateContactList<'a> {
    pub fn new(update: &'a DomainUpdateContactList, now: NaiveDateTime) -> Self {
        Self {
            name: update.name.as_str(),
            description: update.description.as_deref(),
            is_active: update.is_active,
            is_favorite: update.is_favorite,
            updated_at: now,
        }
    }
}

impl TryFrom<ContactTag> for DomainContactTag {
    type Error = TypeConstraintError;

    fn try_from(tag: ContactTag) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TagId::new(tag.id)?,
            user_id: UserId::new(tag.user_id)?,
            name: TagName::new(tag.name)?,
            color: HexColor::new(tag.color)?,
            created_at: tag.created_at,
        })
    }
}

impl<'a> From<&'a DomainNewContactTag> for NewContactTag<'a> {
    fn from(tag: &'a DomainNewContactTag) -> Self {
        Self {
            user_id: tag.user_id.get(),
            name: tag.name.as_str(),
            color: tag.color.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::contact_list::ListType;

    #[test]
    fn list_row_converts_into_domain() {
        let now = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let row = ContactList {
            id: 2,
            user_id: 1,
            name: "VIP".into(),
            description: None,
            list_type: "IMPORTED".into(),
            conditions: "{}".into(),
            is_active: true,
            is_favorite: false,
            contact_count: 12,
            created_at: now,
            updated_at: now,
        };
        let list: DomainContactList = row.try_into().unwrap();
        assert_eq!(list.list_type, ListType::Imported);
        assert_eq!(list.contact_count, 12);
    }

    #[test]
    fn new_list_keeps_conditions_as_json() {
        let domain = DomainNewContactList::new(
            UserId::new(1).unwrap(),
            ListName::new("Newsletter").unwrap(),
            ListType::Manual,
        );
        let row: NewContactList = (&domain).into();
        assert_eq!(row.conditions, "{}");
        assert_eq!(row.list_type, "MANUAL");
    }

    #[test]
    fn tag_with_bad_color_is_rejected() {
        let row = ContactTag {
            id: 1,
            user_id: 1,
            name: "vip".into(),
            color: "blue".into(),
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        };
        let result: Result<DomainContactTag, _> = row.try_into();
        assert_eq!(result, Err(TypeConstraintError::InvalidColor));
    }
}
