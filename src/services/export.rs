use crate::domain::auth::AuthenticatedUser;
use crate::repository::{ContactExportRow, ContactReader};
use crate::services::{ServiceError, ServiceResult, owner_id};

const EXPORT_HEADER: [&str; 13] = [
    "email",
    "first_name",
    "last_name",
    "phone",
    "company",
    "job_title",
    "city",
    "country",
    "status",
    "engagement_score",
    "subscribed_at",
    "lists",
    "tags",
];

fn write_rows(rows: &[ContactExportRow]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;

    for row in rows {
        let contact = &row.contact;
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        writer.write_record([
            contact.email.to_string(),
            text(&contact.first_name),
            text(&contact.last_name),
            text(&contact.phone),
            text(&contact.company),
            text(&contact.job_title),
            text(&contact.city),
            text(&contact.country),
            contact.status.to_string(),
            contact.engagement_score.to_string(),
            contact.subscribed_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            row.lists.join(", "),
            row.tags.join(", "),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

/// CSV with every active contact of the user.
pub fn export_contacts<R>(repo: &R, user: &AuthenticatedUser) -> ServiceResult<Vec<u8>>
where
    R: ContactReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let rows: Vec<ContactExportRow> = repo
        .list_contacts_for_export(user_id)?
        .into_iter()
        .filter(|row| row.contact.is_active)
        .collect();

    write_rows(&rows).map_err(|err| {
        log::error!("Failed to write contact export: {err}");
        ServiceError::Internal
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contact::tests::sample_contact;

    #[test]
    fn export_joins_lists_and_tags() {
        let mut contact = sample_contact(1, "awa@example.com");
        contact.first_name = Some("Awa".into());
        contact.engagement_score = 42.5;
        let rows = vec![ContactExportRow {
            contact,
            lists: vec!["Customers".into(), "VIP".into()],
            tags: vec!["lead".into()],
        }];

        let csv = String::from_utf8(write_rows(&rows).unwrap()).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("email,first_name,last_name,phone,company,job_title,city,country,status,engagement_score,subscribed_at,lists,tags")
        );
        assert_eq!(
            lines.next(),
            Some("awa@example.com,Awa,,,,,,,ACTIVE,42.5,2025-05-20T10:00:00,\"Customers, VIP\",lead")
        );
    }
}

#[cfg(all(test, feature = "test-mocks"))]
mod service_tests {
    use super::*;
    use crate::domain::contact::tests::sample_contact;
    use crate::repository::mock::MockRepository;
    use crate::services::test_support::client_user;

    #[test]
    fn inactive_contacts_are_not_exported() {
        let mut repo = MockRepository::new();
        repo.expect_list_contacts_for_export().returning(|_| {
            let mut gone = sample_contact(2, "gone@example.com");
            gone.is_active = false;
            Ok(vec![
                ContactExportRow {
                    contact: sample_contact(1, "kept@example.com"),
                    lists: vec![],
                    tags: vec![],
                },
                ContactExportRow {
                    contact: gone,
                    lists: vec![],
                    tags: vec![],
                },
            ])
        });

        let csv = String::from_utf8(export_contacts(&repo, &client_user()).unwrap()).unwrap();

        assert!(csv.contains("kept@example.com"));
        assert!(!csv.contains("gone@example.com"));
    }
}
