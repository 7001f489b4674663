use serde::Deserialize;
use validator::Validate;

use crate::domain::contact_list::{ListType, NewContactList, NewContactTag, UpdateContactList};
use crate::domain::types::{HexColor, ListName, TagName, UserId};
use crate::forms::{FormError, checkbox, clean_text, trimmed};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ContactListForm {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub list_type: Option<String>,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_favorite: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_active: bool,
}

impl ContactListForm {
    fn name(&self) -> Result<ListName, FormError> {
        Ok(ListName::new(ammonia::clean(self.name.trim()))?)
    }

    pub fn to_new_list(&self, user_id: UserId) -> Result<NewContactList, FormError> {
        self.validate()?;
        let list_type = match trimmed(self.list_type.clone()) {
            Some(code) => code.parse::<ListType>()?,
            None => ListType::Manual,
        };
        Ok(NewContactList {
            description: clean_text(self.description.clone()),
            is_favorite: self.is_favorite,
            ..NewContactList::new(user_id, self.name()?, list_type)
        })
    }

    pub fn to_update(&self) -> Result<UpdateContactList, FormError> {
        self.validate()?;
        Ok(UpdateContactList {
            name: self.name()?,
            description: clean_text(self.description.clone()),
            is_active: self.is_active,
            is_favorite: self.is_favorite,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TagForm {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl TagForm {
    pub fn to_new_tag(&self, user_id: UserId) -> Result<NewContactTag, FormError> {
        self.validate()?;
        let color = match trimmed(self.color.clone()) {
            Some(color) => HexColor::new(color)?,
            None => HexColor::default(),
        };
        Ok(NewContactTag {
            user_id,
            name: TagName::new(ammonia::clean(self.name.trim()))?,
            color,
        })
    }
}
