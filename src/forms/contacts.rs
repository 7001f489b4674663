//! Contact forms: single-contact editing, bulk actions and CSV uploads.

use std::collections::BTreeMap;

use actix_multipart::form::{MultipartForm, tempfile::TempFile, text::Text};
use serde::Deserialize;
use validator::Validate;

use crate::domain::contact::{ContactSource, CustomFields, NewContact, UpdateContact};
use crate::domain::types::{
    ContactId, ContactListId, EmailAddress, PhoneNumber, TagId, UserId, WebsiteUrl,
};
use crate::forms::{FormError, clean_text, optional_number, trimmed};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ContactForm {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub notes: Option<String>,
    /// Custom field names, paired by position with `value`.
    #[serde(default)]
    pub field: Vec<String>,
    #[serde(default)]
    pub value: Vec<String>,
    /// Custom fields sent as an object by API clients.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub list_ids: Vec<i32>,
}

/// Validated contact data shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactPayload {
    pub email: EmailAddress,
    pub details: UpdateContact,
    pub list_ids: Vec<ContactListId>,
}

impl TryFrom<ContactForm> for ContactPayload {
    type Error = FormError;

    fn try_from(form: ContactForm) -> Result<Self, Self::Error> {
        form.validate()?;
        let email = EmailAddress::new(&form.email)?;

        let phone = trimmed(form.phone)
            .map(|p| PhoneNumber::new(p).map(PhoneNumber::into_inner))
            .transpose()?;
        let website = trimmed(form.website)
            .map(|w| WebsiteUrl::new(w).map(WebsiteUrl::into_inner))
            .transpose()?;

        let mut custom_fields: CustomFields = form.custom_fields;
        for (key, value) in form.field.iter().zip(form.value.iter()) {
            let key = key.trim();
            if !key.is_empty() {
                custom_fields.insert(key.to_string(), ammonia::clean(value.trim()));
            }
        }

        let list_ids = form
            .list_ids
            .into_iter()
            .map(ContactListId::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            email,
            details: UpdateContact {
                first_name: clean_text(form.first_name),
                last_name: clean_text(form.last_name),
                phone,
                company: clean_text(form.company),
                job_title: clean_text(form.job_title),
                website,
                city: clean_text(form.city),
                country: clean_text(form.country),
                notes: clean_text(form.notes),
                custom_fields,
            },
            list_ids,
        })
    }
}

impl ContactPayload {
    pub fn to_new_contact(&self, user_id: UserId, source: ContactSource) -> NewContact {
        let details = self.details.clone();
        NewContact {
            first_name: details.first_name,
            last_name: details.last_name,
            phone: details.phone,
            company: details.company,
            job_title: details.job_title,
            website: details.website,
            city: details.city,
            country: details.country,
            notes: details.notes,
            custom_fields: details.custom_fields,
            ..NewContact::new(user_id, self.email.clone(), source)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkActionForm {
    pub action: String,
    #[serde(default)]
    pub contact_ids: Vec<i32>,
    #[serde(default, deserialize_with = "optional_number")]
    pub list_id: Option<i32>,
    #[serde(default, deserialize_with = "optional_number")]
    pub tag_id: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    AddToList(ContactListId),
    RemoveFromList(ContactListId),
    AddTag(TagId),
    Unsubscribe,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkActionPayload {
    pub action: BulkAction,
    pub contact_ids: Vec<ContactId>,
}

impl TryFrom<BulkActionForm> for BulkActionPayload {
    type Error = FormError;

    fn try_from(form: BulkActionForm) -> Result<Self, Self::Error> {
        let mut ids = form
            .contact_ids
            .into_iter()
            .map(ContactId::new)
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(FormError::InvalidValue("No contacts selected".into()));
        }

        let list = || -> Result<ContactListId, FormError> {
            let raw = form
                .list_id
                .ok_or_else(|| FormError::InvalidValue("No list selected".into()))?;
            Ok(ContactListId::new(raw)?)
        };

        let action = match form.action.trim() {
            "add_to_list" => BulkAction::AddToList(list()?),
            "remove_from_list" => BulkAction::RemoveFromList(list()?),
            "add_tag" => {
                let raw = form
                    .tag_id
                    .ok_or_else(|| FormError::InvalidValue("No tag selected".into()))?;
                BulkAction::AddTag(TagId::new(raw)?)
            }
            "unsubscribe" => BulkAction::Unsubscribe,
            "delete" => BulkAction::Delete,
            other => return Err(FormError::InvalidValue(format!("unknown action `{other}`"))),
        };

        Ok(Self {
            action,
            contact_ids: ids,
        })
    }
}

#[derive(MultipartForm)]
pub struct ImportContactsForm {
    #[multipart(limit = "10MB")]
    pub csv: TempFile,
    pub list_id: Option<Text<String>>,
    pub update_existing: Option<Text<String>>,
}

/// An uploaded CSV with its import options.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactUpload {
    pub file_name: String,
    pub content: String,
    pub target_list_id: Option<ContactListId>,
    pub update_existing: bool,
}

impl ImportContactsForm {
    pub fn into_upload(self) -> Result<ContactUpload, FormError> {
        let file_name = self
            .csv
            .file_name
            .clone()
            .unwrap_or_else(|| "contacts.csv".to_string());
        let content = std::fs::read_to_string(self.csv.file.path())
            .map_err(|e| FormError::Csv(e.to_string()))?;
        let target_list_id = self
            .list_id
            .map(|t| t.into_inner())
            .and_then(|raw| trimmed(Some(raw)))
            .map(|raw| {
                raw.parse::<i32>()
                    .map_err(|_| FormError::InvalidId)
                    .and_then(|id| Ok(ContactListId::new(id)?))
            })
            .transpose()?;
        let update_existing = self
            .update_existing
            .map(|t| matches!(t.into_inner().trim(), "on" | "true" | "1"))
            .unwrap_or(false);

        Ok(ContactUpload {
            file_name,
            content,
            target_list_id,
            update_existing,
        })
    }
}

/// JSON body of `POST /api/contacts/bulk-import`.
#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    /// Rows keyed by column name, using the same aliases as CSV headers.
    pub contacts: Vec<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "optional_number")]
    pub list_id: Option<i32>,
    #[serde(default)]
    pub update_existing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_fields_are_paired_by_position() {
        let form = ContactForm {
            email: "Amina@Example.com".into(),
            first_name: Some("  Amina ".into()),
            field: vec!["plan".into(), " ".into()],
            value: vec!["gold".into(), "ignored".into()],
            list_ids: vec![2],
            ..ContactForm::default()
        };
        let payload = ContactPayload::try_from(form).unwrap();
        assert_eq!(payload.email.as_str(), "amina@example.com");
        assert_eq!(payload.details.first_name.as_deref(), Some("Amina"));
        assert_eq!(payload.details.custom_fields.len(), 1);
        assert_eq!(payload.details.custom_fields["plan"], "gold");
        assert_eq!(payload.list_ids, vec![ContactListId::new(2).unwrap()]);
    }

    #[test]
    fn invalid_phone_is_rejected() {
        let form = ContactForm {
            email: "a@example.com".into(),
            phone: Some("not a phone".into()),
            ..ContactForm::default()
        };
        assert!(matches!(
            ContactPayload::try_from(form),
            Err(FormError::InvalidPhoneNumber)
        ));
    }

    #[test]
    fn bulk_action_requires_target_and_selection() {
        let form = BulkActionForm {
            action: "add_to_list".into(),
            contact_ids: vec![3, 1, 3],
            list_id: Some(9),
            tag_id: None,
        };
        let payload = BulkActionPayload::try_from(form).unwrap();
        assert_eq!(
            payload.action,
            BulkAction::AddToList(ContactListId::new(9).unwrap())
        );
        assert_eq!(payload.contact_ids.len(), 2);

        let missing_list = BulkActionForm {
            action: "remove_from_list".into(),
            contact_ids: vec![1],
            list_id: None,
            tag_id: None,
        };
        assert!(BulkActionPayload::try_from(missing_list).is_err());

        let empty = BulkActionForm {
            action: "delete".into(),
            contact_ids: vec![],
            list_id: None,
            tag_id: None,
        };
        assert!(BulkActionPayload::try_from(empty).is_err());
    }
}
