//! CSV and JSON bulk import of contacts.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::contact::{Contact, ContactSource, CustomFields, NewContact, UpdateContact};
use crate::domain::import::{ContactImport, ImportStatus, ImportSummary, NewContactImport};
use crate::domain::types::{ContactId, ContactListId, EmailAddress, PhoneNumber, UserId};
use crate::domain::user::{ActivityType, NewUserActivity, RequestMeta};
use crate::forms::contacts::{BulkImportRequest, ContactUpload};
use crate::repository::{
    ContactListReader, ContactReader, ContactWriter, ImportReader, ImportWriter, UserReader,
    UserWriter,
};
use crate::services::contacts::contact_capacity;
use crate::services::{ServiceError, ServiceResult, now, owner_id};

/// Accepted column names per contact field, after header normalization.
const FIELD_ALIASES: [(&str, &[&str]); 9] = [
    ("email", &["email", "email_address", "e_mail"]),
    ("first_name", &["first_name", "firstname", "fname", "given_name"]),
    ("last_name", &["last_name", "lastname", "lname", "surname", "family_name"]),
    ("phone", &["phone", "phone_number", "mobile", "telephone"]),
    ("company", &["company", "organization", "org", "business"]),
    ("job_title", &["job_title", "title", "position", "role"]),
    ("city", &["city", "town"]),
    ("country", &["country", "nation"]),
    ("website", &["website", "url", "web_site"]),
];

const MISSING_EMAIL: &str = "Missing email address";
const INVALID_EMAIL: &str = "Invalid email address";
const LIMIT_REACHED: &str = "Contact limit reached";

/// One data row keyed by normalized column name.
type ImportRow = BTreeMap<String, String>;

pub(crate) fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

fn is_known_column(column: &str) -> bool {
    FIELD_ALIASES
        .iter()
        .any(|(_, aliases)| aliases.contains(&column))
}

/// First non-empty value among the aliases of `field`.
fn field_value(row: &ImportRow, field: &str) -> Option<String> {
    let (_, aliases) = FIELD_ALIASES.iter().find(|(name, _)| *name == field)?;
    aliases
        .iter()
        .filter_map(|alias| row.get(*alias))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Parses CSV content into rows; the header line is normalized.
fn parse_csv(content: &str) -> Result<Vec<ImportRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = ImportRow::new();
        for (i, field) in record.iter().enumerate() {
            match headers.get(i) {
                Some(header) if !header.is_empty() => {
                    row.insert(header.clone(), field.to_string());
                }
                _ => continue,
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Builds the contact a row describes, or the row error message.
fn row_to_contact(
    user_id: UserId,
    row: &ImportRow,
    source: ContactSource,
) -> Result<NewContact, &'static str> {
    let email = field_value(row, "email").ok_or(MISSING_EMAIL)?;
    let email = EmailAddress::new(email).map_err(|_| INVALID_EMAIL)?;

    // Unparseable numbers are kept as written.
    let phone = field_value(row, "phone")
        .map(|raw| PhoneNumber::new(raw.as_str()).map(PhoneNumber::into_inner).unwrap_or(raw));

    let custom_fields: CustomFields = row
        .iter()
        .filter(|(column, value)| !is_known_column(column) && !value.trim().is_empty())
        .map(|(column, value)| (column.clone(), ammonia::clean(value.trim())))
        .collect();

    Ok(NewContact {
        first_name: field_value(row, "first_name"),
        last_name: field_value(row, "last_name"),
        phone,
        company: field_value(row, "company"),
        job_title: field_value(row, "job_title"),
        website: field_value(row, "website"),
        city: field_value(row, "city"),
        country: field_value(row, "country"),
        custom_fields,
        ..NewContact::new(user_id, email, source)
    })
}

/// Overlays the non-empty imported fields on an existing contact.
fn merge_into(existing: &Contact, incoming: &NewContact) -> UpdateContact {
    fn pick(new: &Option<String>, old: &Option<String>) -> Option<String> {
        new.clone().or_else(|| old.clone())
    }
    let mut custom_fields = existing.custom_fields.clone();
    custom_fields.extend(incoming.custom_fields.clone());

    UpdateContact {
        first_name: pick(&incoming.first_name, &existing.first_name),
        last_name: pick(&incoming.last_name, &existing.last_name),
        phone: pick(&incoming.phone, &existing.phone),
        company: pick(&incoming.company, &existing.company),
        job_title: pick(&incoming.job_title, &existing.job_title),
        website: pick(&incoming.website, &existing.website),
        city: pick(&incoming.city, &existing.city),
        country: pick(&incoming.country, &existing.country),
        notes: existing.notes.clone(),
        custom_fields,
    }
}

struct ImportOptions {
    source: ContactSource,
    target_list_id: Option<ContactListId>,
    update_existing: bool,
    /// Row number of the first row, 2 when a header line precedes it.
    first_row: usize,
}

fn process_rows<R>(
    repo: &R,
    user: &AuthenticatedUser,
    user_id: UserId,
    rows: &[ImportRow],
    options: &ImportOptions,
    at: NaiveDateTime,
) -> ServiceResult<ImportSummary>
where
    R: UserReader + ContactReader + ContactWriter + ?Sized,
{
    let mut summary = ImportSummary {
        total_rows: i32::try_from(rows.len()).unwrap_or(i32::MAX),
        ..ImportSummary::default()
    };
    let mut remaining = contact_capacity(repo, user, user_id)?;
    let mut joined: Vec<ContactId> = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + options.first_row;
        let new_contact = match row_to_contact(user_id, row, options.source) {
            Ok(contact) => contact,
            Err(message) => {
                summary.push_error(row_number, message, at);
                continue;
            }
        };

        match repo.get_contact_by_email(user_id, &new_contact.email) {
            Ok(Some(existing)) if options.update_existing => {
                match repo.update_contact(existing.id, &merge_into(&existing, &new_contact)) {
                    Ok(updated) => {
                        summary.successful_imports += 1;
                        joined.push(updated.id);
                    }
                    Err(err) => summary.push_error(row_number, err.to_string(), at),
                }
            }
            Ok(Some(_)) => summary.duplicate_skipped += 1,
            Ok(None) => {
                if remaining.is_some_and(|left| left <= 0) {
                    summary.push_error(row_number, LIMIT_REACHED, at);
                    continue;
                }
                match repo.create_contact(&new_contact) {
                    Ok(created) => {
                        summary.successful_imports += 1;
                        remaining = remaining.map(|left| left - 1);
                        joined.push(created.id);
                    }
                    Err(err) => summary.push_error(row_number, err.to_string(), at),
                }
            }
            Err(err) => summary.push_error(row_number, err.to_string(), at),
        }
    }

    if let Some(list_id) = options.target_list_id
        && !joined.is_empty()
    {
        repo.add_contacts_to_list(list_id, &joined)?;
    }

    Ok(summary)
}

fn run_import<R>(
    repo: &R,
    user: &AuthenticatedUser,
    file_name: String,
    rows: Result<Vec<ImportRow>, String>,
    options: ImportOptions,
    meta: &RequestMeta,
) -> ServiceResult<ContactImport>
where
    R: UserReader
        + UserWriter
        + ContactReader
        + ContactWriter
        + ContactListReader
        + ImportWriter
        + ?Sized,
{
    let user_id = owner_id(user)?;
    if let Some(list_id) = options.target_list_id {
        repo.get_contact_list(list_id, user_id)?
            .ok_or(ServiceError::NotFound)?;
    }

    let started = now();
    let record = repo
        .start_import(
            &NewContactImport {
                user_id,
                file_name: file_name.clone(),
                target_list_id: options.target_list_id,
                update_existing: options.update_existing,
            },
            started,
        )
        .map_err(|err| {
            log::error!("Failed to start contact import: {err}");
            err
        })?;

    let rows = match rows {
        Ok(rows) => rows,
        Err(message) => {
            let mut summary = ImportSummary::default();
            summary.push_error(0, message.clone(), started);
            repo.finish_import(record.id, ImportStatus::Failed, &summary, now())?;
            return Err(ServiceError::Form(format!("Invalid CSV file: {message}")));
        }
    };

    let summary = match process_rows(repo, user, user_id, &rows, &options, started) {
        Ok(summary) => summary,
        Err(err) => {
            log::error!("Contact import {} failed: {err}", record.id);
            let mut summary = ImportSummary::default();
            summary.push_error(0, err.to_string(), started);
            repo.finish_import(record.id, ImportStatus::Failed, &summary, now())?;
            return Err(err);
        }
    };
    let finished = repo.finish_import(record.id, ImportStatus::Completed, &summary, now())?;

    log::info!(
        "Import {} for user {user_id}: {} imported, {} failed, {} duplicates",
        finished.id,
        summary.successful_imports,
        summary.failed_imports,
        summary.duplicate_skipped
    );

    let activity = NewUserActivity::new(
        user_id,
        ActivityType::ContactImported,
        format!(
            "Imported {} contacts from {file_name}",
            summary.successful_imports
        ),
        meta,
    )
    .with_metadata(serde_json::json!({
        "import_id": finished.id.get(),
        "successful": summary.successful_imports,
        "failed": summary.failed_imports,
        "duplicates": summary.duplicate_skipped,
    }));
    if let Err(err) = repo.log_activity(&activity) {
        log::error!("Failed to log contact import: {err}");
    }

    Ok(finished)
}

/// Imports an uploaded CSV file.
pub fn import_contacts<R>(
    repo: &R,
    user: &AuthenticatedUser,
    upload: ContactUpload,
    meta: &RequestMeta,
) -> ServiceResult<ContactImport>
where
    R: UserReader
        + UserWriter
        + ContactReader
        + ContactWriter
        + ContactListReader
        + ImportWriter
        + ?Sized,
{
    let rows = parse_csv(&upload.content).map_err(|err| err.to_string());
    let options = ImportOptions {
        source: ContactSource::Import,
        target_list_id: upload.target_list_id,
        update_existing: upload.update_existing,
        first_row: 2,
    };
    run_import(repo, user, upload.file_name, rows, options, meta)
}

/// Imports contacts posted as JSON objects through the API.
pub fn bulk_import<R>(
    repo: &R,
    user: &AuthenticatedUser,
    request: BulkImportRequest,
    meta: &RequestMeta,
) -> ServiceResult<ContactImport>
where
    R: UserReader
        + UserWriter
        + ContactReader
        + ContactWriter
        + ContactListReader
        + ImportWriter
        + ?Sized,
{
    let target_list_id = request.list_id.map(ContactListId::new).transpose()?;
    let rows = request
        .contacts
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(key, value)| (normalize_header(&key), value))
                .collect::<ImportRow>()
        })
        .collect();
    let options = ImportOptions {
        source: ContactSource::Api,
        target_list_id,
        update_existing: request.update_existing,
        first_row: 1,
    };
    run_import(repo, user, "api-bulk-import".to_string(), Ok(rows), options, meta)
}

pub fn recent_imports<R>(repo: &R, user: &AuthenticatedUser) -> ServiceResult<Vec<ContactImport>>
where
    R: ImportReader + ?Sized,
{
    let user_id = owner_id(user)?;
    Ok(repo.list_imports(user_id, 10)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_normalized_and_aliased() {
        let rows = parse_csv("E-Mail Address,First Name,Surname\n").unwrap();
        assert!(rows.is_empty());

        let rows = parse_csv("Email Address,First Name,Surname,Plan\njean@example.com, Jean ,Mballa,gold\n")
            .unwrap();
        let contact = row_to_contact(UserId::new(1).unwrap(), &rows[0], ContactSource::Import).unwrap();
        assert_eq!(contact.email.as_str(), "jean@example.com");
        assert_eq!(contact.first_name.as_deref(), Some("Jean"));
        assert_eq!(contact.last_name.as_deref(), Some("Mballa"));
        assert_eq!(contact.custom_fields.get("plan").map(String::as_str), Some("gold"));
    }

    #[test]
    fn row_errors_name_the_email_problem() {
        let user = UserId::new(1).unwrap();
        let mut row = ImportRow::new();
        row.insert("fname".into(), "Awa".into());
        assert_eq!(row_to_contact(user, &row, ContactSource::Import), Err(MISSING_EMAIL));

        row.insert("e_mail".into(), "not-an-email".into());
        assert_eq!(row_to_contact(user, &row, ContactSource::Import), Err(INVALID_EMAIL));
    }

    #[test]
    fn merge_keeps_existing_values_for_blank_columns() {
        use crate::domain::contact::tests::sample_contact;

        let mut existing = sample_contact(4, "awa@example.com");
        existing.company = Some("Orange".into());
        existing.city = Some("Dakar".into());
        let mut incoming = NewContact::new(
            UserId::new(1).unwrap(),
            existing.email.clone(),
            ContactSource::Import,
        );
        incoming.city = Some("Abidjan".into());

        let merged = merge_into(&existing, &incoming);
        assert_eq!(merged.company.as_deref(), Some("Orange"));
        assert_eq!(merged.city.as_deref(), Some("Abidjan"));
    }
}

#[cfg(all(test, feature = "test-mocks"))]
mod service_tests {
    use super::*;
    use crate::domain::contact::tests::sample_contact;
    use crate::domain::types::ImportId;
    use crate::repository::mock::MockRepository;
    use crate::services::test_support::client_user;

    fn import_record(status: ImportStatus, summary: &ImportSummary) -> ContactImport {
        ContactImport {
            id: ImportId::new(11).unwrap(),
            user_id: UserId::new(1).unwrap(),
            file_name: "contacts.csv".into(),
            status,
            target_list_id: None,
            update_existing: false,
            total_rows: summary.total_rows,
            successful_imports: summary.successful_imports,
            failed_imports: summary.failed_imports,
            duplicate_skipped: summary.duplicate_skipped,
            errors: summary.errors.clone(),
            started_at: None,
            completed_at: None,
            created_at: crate::domain::contact::tests::now(),
        }
    }

    fn upload(content: &str) -> ContactUpload {
        ContactUpload {
            file_name: "contacts.csv".into(),
            content: content.into(),
            target_list_id: None,
            update_existing: false,
        }
    }

    #[test]
    fn import_counts_created_failed_and_duplicate_rows() {
        let mut repo = MockRepository::new();
        repo.expect_get_user_profile().returning(|_| Ok(None));
        repo.expect_count_contacts().returning(|_| Ok(0));
        repo.expect_start_import()
            .returning(|_, _| Ok(import_record(ImportStatus::Processing, &ImportSummary::default())));
        repo.expect_get_contact_by_email().returning(|_, email| {
            if email.as_str() == "dup@example.com" {
                Ok(Some(sample_contact(2, "dup@example.com")))
            } else {
                Ok(None)
            }
        });
        repo.expect_create_contact()
            .times(1)
            .returning(|new| Ok(sample_contact(3, new.email.as_str())));
        repo.expect_finish_import()
            .withf(|_, status, summary, _| {
                *status == ImportStatus::Completed
                    && summary.total_rows == 4
                    && summary.successful_imports == 1
                    && summary.failed_imports == 2
                    && summary.duplicate_skipped == 1
                    && summary.errors[0].row == 3
                    && summary.errors[0].error == MISSING_EMAIL
                    && summary.errors[1].row == 4
            })
            .returning(|_, status, summary, _| Ok(import_record(status, summary)));
        repo.expect_log_activity()
            .withf(|a| a.activity_type == ActivityType::ContactImported)
            .returning(|_| Ok(()));

        let csv = "email,name\nnew@example.com,A\n,B\nbroken,C\ndup@example.com,D\n";
        let record = import_contacts(&repo, &client_user(), upload(csv), &RequestMeta::default())
            .unwrap();

        assert_eq!(record.successful_imports, 1);
    }

    #[test]
    fn import_stops_creating_at_contact_limit() {
        let mut repo = MockRepository::new();
        repo.expect_get_user_profile().returning(|_| Ok(None));
        repo.expect_count_contacts()
            .returning(|_| Ok(i64::from(crate::domain::user::UserProfile::DEFAULT_MAX_CONTACTS) - 1));
        repo.expect_start_import()
            .returning(|_, _| Ok(import_record(ImportStatus::Processing, &ImportSummary::default())));
        repo.expect_get_contact_by_email().returning(|_, _| Ok(None));
        repo.expect_create_contact()
            .times(1)
            .returning(|new| Ok(sample_contact(3, new.email.as_str())));
        repo.expect_finish_import()
            .withf(|_, _, summary, _| {
                summary.successful_imports == 1 && summary.errors[0].error == LIMIT_REACHED
            })
            .returning(|_, status, summary, _| Ok(import_record(status, summary)));
        repo.expect_log_activity().returning(|_| Ok(()));

        let csv = "email\na@example.com\nb@example.com\n";
        import_contacts(&repo, &client_user(), upload(csv), &RequestMeta::default()).unwrap();
    }

    #[test]
    fn bulk_import_rejects_foreign_target_list() {
        let mut repo = MockRepository::new();
        repo.expect_get_contact_list().returning(|_, _| Ok(None));
        repo.expect_start_import().times(0);

        let request = BulkImportRequest {
            contacts: vec![BTreeMap::from([("Email".to_string(), "a@example.com".to_string())])],
            list_id: Some(3),
            update_existing: true,
        };
        let result = bulk_import(&repo, &client_user(), request, &RequestMeta::default());

        assert!(matches!(result, Err(ServiceError::NotFound)));
    }
}
