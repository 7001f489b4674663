use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::import::{
    ContactImport as DomainContactImport, ImportSummary, NewContactImport as DomainNewContactImport,
};
use crate::domain::types::{ContactListId, ImportId, TypeConstraintError, UserId};
use crate::models::{parse_json, to_json};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::contact_imports)]
pub struct ContactImport {
    pub id: i32,
    pub user_id: i32,
    pub file_name: String,
    pub status: String,
    pub target_list_id: Option<i32>,
    pub update_existing: bool,
    pub total_rows: i32,
    pub successful_imports: i32,
    pub failed_imports: i32,
    pub duplicate_skipped: i32,
    pub errors: String,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::contact_imports)]
pub struct NewContactImport<'a> {
    pub user_id: i32,
    pub file_name: &'a str,
    pub status: &'a str,
    pub target_list_id: Option<i32>,
    pub update_existing: bool,
    pub started_at: Option<NaiveDateTime>,
}

/// Counters and status written when an import finishes.
#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::contact_imports)]
pub struct FinishContactImport<'a> {
    pub status: &'a str,
    pub total_rows: i32,
    pub successful_imports: i32,
    pub failed_imports: i32,
    pub duplicate_skipped: i32,
    pub errors: String,
    pub completed_at: NaiveDateTime,
}

impl TryFrom<ContactImport> for DomainContactImport {
    type Error = TypeConstraintError;

    fn try_from(import: ContactImport) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ImportId::new(import.id)?,
            user_id: UserId::new(import.user_id)?,
            file_name: import.file_name,
            status: import.status.parse()?,
            target_list_id: import.target_list_id.map(ContactListId::new).transpose()?,
            update_existing: import.update_existing,
            total_rows: import.total_rows,
            successful_imports: import.successful_imports,
            failed_imports: import.failed_imports,
            duplicate_skipped: import.duplicate_skipped,
            errors: parse_json(&import.errors, "errors")?,
            started_at: import.started_at,
            completed_at: import.completed_at,
            created_at: import.created_at,
        })
    }
}

impl<'a> NewContactImport<'a> {
    pub fn new(import: &'a DomainNewContactImport, status: &'a str, now: NaiveDateTime) -> Self {
        Self {
            user_id: import.user_id.get(),
            file_name: &import.file_name,
            status,
            target_list_id: import.target_list_id.map(ContactListId::get),
            update_existing: import.update_existing,
            started_at: Some(now),
        }
    }
}

impl<'a> FinishContactImport<'a> {
    pub fn new(status: &'a str, summary: &ImportSummary, now: NaiveDateTime) -> Self {
        Self {
            status,
            total_rows: summary.total_rows,
            successful_imports: summary.successful_imports,
            failed_imports: summary.failed_imports,
            duplicate_skipped: summary.duplicate_skipped,
            errors: to_json(&summary.errors),
            completed_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::import::ImportStatus;

    #[test]
    fn errors_round_trip_through_json_column() {
        let now = NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut summary = ImportSummary {
            total_rows: 2,
            successful_imports: 1,
            ..ImportSummary::default()
        };
        summary.push_error(3, "Invalid email address", now);
        let finish = FinishContactImport::new("COMPLETED", &summary, now);

        let row = ContactImport {
            id: 1,
            user_id: 1,
            file_name: "contacts.csv".into(),
            status: finish.status.into(),
            target_list_id: None,
            update_existing: false,
            total_rows: finish.total_rows,
            successful_imports: finish.successful_imports,
            failed_imports: finish.failed_imports,
            duplicate_skipped: 0,
            errors: finish.errors.clone(),
            started_at: Some(now),
            completed_at: Some(now),
            created_at: now,
        };
        let import: DomainContactImport = row.try_into().unwrap();
        assert_eq!(import.status, ImportStatus::Completed);
        assert_eq!(import.failed_imports, 1);
        assert_eq!(import.errors[0].row, 3);
        assert_eq!(import.success_rate(), 50.0);
    }
}
