use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::types::{ContactListId, HexColor, ListName, TagId, TagName, UserId, code_enum};

code_enum! {
    ListType {
        Manual => "MANUAL",
        Dynamic => "DYNAMIC",
        Imported => "IMPORTED",
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContactList {
    pub id: ContactListId,
    pub user_id: UserId,
    pub name: ListName,
    pub description: Option<String>,
    pub list_type: ListType,
    /// Segment rules for dynamic lists.
    pub conditions: Value,
    pub is_active: bool,
    pub is_favorite: bool,
    /// Number of active contacts in the list.
    pub contact_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewContactList {
    pub user_id: UserId,
    pub name: ListName,
    pub description: Option<String>,
    pub list_type: ListType,
    pub conditions: Value,
    pub is_favorite: bool,
}

impl NewContactList {
    pub fn new(user_id: UserId, name: ListName, list_type: ListType) -> Self {
        Self {
            user_id,
            name,
            description: None,
            list_type,
            conditions: Value::Object(Default::default()),
            is_favorite: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateContactList {
    pub name: ListName,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_favorite: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContactTag {
    pub id: TagId,
    pub user_id: UserId,
    pub name: TagName,
    pub color: HexColor,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewContactTag {
    pub user_id: UserId,
    pub name: TagName,
    pub color: HexColor,
}
