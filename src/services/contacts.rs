//! Contact management for the signed-in tenant.

use crate::domain::auth::AuthenticatedUser;
use crate::domain::contact::{
    Contact, ContactSource, ContactStatistics, ContactStatus, StatusChange,
};
use crate::domain::types::{ContactId, ContactListId, TagId, UserId};
use crate::domain::user::{ActivityType, NewUserActivity, RequestMeta, UserProfile};
use crate::dto::contacts::{
    ApiContactsPage, ApiContactsQuery, ContactDetail, ContactsPageData, ContactsQuery,
};
use crate::forms::contacts::{BulkAction, BulkActionForm, BulkActionPayload, ContactForm, ContactPayload};
use crate::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use crate::repository::{
    ContactListQuery, ContactListReader, ContactReader, ContactWriter, UserReader, UserWriter,
};
use crate::services::{ServiceError, ServiceResult, now, owner_id};

pub const API_PAGE_LIMIT: usize = 25;
const API_MAX_LIMIT: usize = 100;

/// How many more contacts the user may create; `None` means unlimited.
pub(crate) fn contact_capacity<R>(
    repo: &R,
    user: &AuthenticatedUser,
    user_id: UserId,
) -> ServiceResult<Option<i64>>
where
    R: UserReader + ContactReader + ?Sized,
{
    if user.is_super_admin() {
        return Ok(None);
    }
    let max_contacts = repo
        .get_user_profile(user_id)?
        .map(|profile| profile.max_contacts)
        .unwrap_or(UserProfile::DEFAULT_MAX_CONTACTS);
    let current = repo.count_contacts(user_id)?;
    Ok(Some((i64::from(max_contacts) - current).max(0)))
}

fn limit_reached() -> ServiceError {
    ServiceError::LimitExceeded(
        "You have reached the maximum number of contacts for your plan".to_string(),
    )
}

fn page_size<R>(repo: &R, user_id: UserId) -> ServiceResult<usize>
where
    R: UserReader + ?Sized,
{
    Ok(repo
        .get_user_profile(user_id)?
        .map(|profile| profile.per_page())
        .unwrap_or(DEFAULT_ITEMS_PER_PAGE))
}

fn owned_list<R>(repo: &R, list_id: ContactListId, user_id: UserId) -> ServiceResult<()>
where
    R: ContactListReader + ?Sized,
{
    repo.get_contact_list(list_id, user_id)?
        .map(|_| ())
        .ok_or(ServiceError::NotFound)
}

fn owned_contact_ids<R>(
    repo: &R,
    user_id: UserId,
    ids: &[ContactId],
) -> ServiceResult<Vec<ContactId>>
where
    R: ContactReader + ?Sized,
{
    let mut owned = Vec::with_capacity(ids.len());
    for id in ids {
        if repo.get_contact_by_id(*id, user_id)?.is_some() {
            owned.push(*id);
        }
    }
    Ok(owned)
}

pub fn list_contacts<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: ContactsQuery,
) -> ServiceResult<ContactsPageData>
where
    R: UserReader + ContactReader + ContactListReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let page = query.page.unwrap_or(1).max(1);
    let per_page = page_size(repo, user_id)?;

    let search_query = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let mut list_query = ContactListQuery::new(user_id).paginate(page, per_page);
    if let Some(term) = &search_query {
        list_query = list_query.search(term.clone());
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        list_query = list_query.status(status.parse::<ContactStatus>()?);
    }
    if let Some(list_id) = query.list_id {
        list_query = list_query.list(ContactListId::new(list_id)?);
    }
    if let Some(tag_id) = query.tag_id {
        list_query = list_query.tag(TagId::new(tag_id)?);
    }

    let (total, contacts) = repo.list_contacts(list_query).map_err(|err| {
        log::error!("Failed to list contacts: {err}");
        err
    })?;

    Ok(ContactsPageData {
        contacts: Paginated::from_total(contacts, page, total, per_page),
        total,
        search_query,
        status: query.status,
        list_id: query.list_id,
        tag_id: query.tag_id,
        lists: repo.list_contact_lists(user_id)?,
        tags: repo.list_tags(user_id)?,
    })
}

/// Offset-based search used by the JSON API.
pub fn search_contacts_api<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: ApiContactsQuery,
) -> ServiceResult<ApiContactsPage>
where
    R: ContactReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let limit = query.limit.unwrap_or(API_PAGE_LIMIT).clamp(1, API_MAX_LIMIT);
    // Offsets are rounded down to a page boundary.
    let page = query.offset.unwrap_or(0) / limit + 1;
    let offset = (page - 1) * limit;

    let mut list_query = ContactListQuery::new(user_id).paginate(page, limit);
    if let Some(term) = query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        list_query = list_query.search(term);
    }
    let (total, contacts) = repo.list_contacts(list_query)?;

    Ok(ApiContactsPage {
        has_next: offset + contacts.len() < total,
        contacts,
        total,
        limit,
        offset,
    })
}

pub fn get_contact<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<ContactDetail>
where
    R: ContactReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let contact = repo
        .get_contact_by_id(ContactId::new(id)?, user_id)?
        .ok_or(ServiceError::NotFound)?;
    let (lists, tags) = repo.list_contact_memberships(contact.id)?;

    Ok(ContactDetail {
        open_rate: contact.open_rate(),
        click_rate: contact.click_rate(),
        contact,
        lists,
        tags,
    })
}

pub fn create_contact<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: ContactForm,
    source: ContactSource,
    meta: &RequestMeta,
) -> ServiceResult<Contact>
where
    R: UserReader + UserWriter + ContactReader + ContactWriter + ContactListReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let payload = ContactPayload::try_from(form)?;

    if contact_capacity(repo, user, user_id)?.is_some_and(|left| left <= 0) {
        return Err(limit_reached());
    }
    if repo.get_contact_by_email(user_id, &payload.email)?.is_some() {
        return Err(ServiceError::Form(
            "A contact with this email already exists".to_string(),
        ));
    }
    for list_id in &payload.list_ids {
        owned_list(repo, *list_id, user_id)?;
    }

    let contact = repo
        .create_contact(&payload.to_new_contact(user_id, source))
        .map_err(|err| {
            log::error!("Failed to create contact: {err}");
            err
        })?;
    for list_id in &payload.list_ids {
        repo.add_contacts_to_list(*list_id, &[contact.id])?;
    }

    let activity = NewUserActivity::new(
        user_id,
        ActivityType::ContactCreated,
        format!("Created contact {}", contact.email),
        meta,
    )
    .with_metadata(serde_json::json!({ "contact_id": contact.id.get() }));
    if let Err(err) = repo.log_activity(&activity) {
        log::error!("Failed to log contact creation: {err}");
    }

    Ok(contact)
}

/// Updates profile fields and replaces the contact's list memberships.
pub fn update_contact<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
    form: ContactForm,
) -> ServiceResult<Contact>
where
    R: ContactReader + ContactWriter + ContactListReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let contact = repo
        .get_contact_by_id(ContactId::new(id)?, user_id)?
        .ok_or(ServiceError::NotFound)?;
    let payload = ContactPayload::try_from(form)?;

    if payload.email != contact.email {
        return Err(ServiceError::Form(
            "The email address of a contact cannot be changed".to_string(),
        ));
    }
    for list_id in &payload.list_ids {
        owned_list(repo, *list_id, user_id)?;
    }

    let updated = repo
        .update_contact(contact.id, &payload.details)
        .map_err(|err| {
            log::error!("Failed to update contact: {err}");
            err
        })?;

    let (current_lists, _) = repo.list_contact_memberships(contact.id)?;
    for list in &current_lists {
        if !payload.list_ids.contains(&list.id) {
            repo.remove_contacts_from_list(list.id, &[contact.id])?;
        }
    }
    for list_id in &payload.list_ids {
        if !current_lists.iter().any(|list| list.id == *list_id) {
            repo.add_contacts_to_list(*list_id, &[contact.id])?;
        }
    }

    Ok(updated)
}

pub fn delete_contact<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<()>
where
    R: ContactWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let deleted = repo.delete_contacts(user_id, &[ContactId::new(id)?])?;
    if deleted == 0 {
        return Err(ServiceError::NotFound);
    }
    Ok(())
}

/// Applies the selected bulk action; returns the number of affected contacts.
pub fn bulk_action<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: BulkActionForm,
) -> ServiceResult<usize>
where
    R: ContactReader + ContactWriter + ContactListReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let payload = BulkActionPayload::try_from(form)?;

    let affected = match payload.action {
        BulkAction::AddToList(list_id) => {
            owned_list(repo, list_id, user_id)?;
            let ids = owned_contact_ids(repo, user_id, &payload.contact_ids)?;
            repo.add_contacts_to_list(list_id, &ids)?
        }
        BulkAction::RemoveFromList(list_id) => {
            owned_list(repo, list_id, user_id)?;
            let ids = owned_contact_ids(repo, user_id, &payload.contact_ids)?;
            repo.remove_contacts_from_list(list_id, &ids)?
        }
        BulkAction::AddTag(tag_id) => {
            repo.get_tag(tag_id, user_id)?.ok_or(ServiceError::NotFound)?;
            let ids = owned_contact_ids(repo, user_id, &payload.contact_ids)?;
            repo.tag_contacts(tag_id, &ids)?
        }
        BulkAction::Unsubscribe => {
            repo.unsubscribe_contacts(user_id, &payload.contact_ids, now())?
        }
        BulkAction::Delete => repo.delete_contacts(user_id, &payload.contact_ids)?,
    };

    log::info!(
        "Bulk action {:?} affected {affected} contacts for user {user_id}",
        payload.action
    );
    Ok(affected)
}

pub fn unsubscribe_contact<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
    reason: Option<String>,
) -> ServiceResult<Contact>
where
    R: ContactReader + ContactWriter + ?Sized,
{
    let change = StatusChange::Unsubscribe { reason };
    apply_status_change(repo, user, id, &change)
}

pub fn resubscribe_contact<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<Contact>
where
    R: ContactReader + ContactWriter + ?Sized,
{
    apply_status_change(repo, user, id, &StatusChange::Resubscribe)
}

/// Applies a subscription change to one of the user's contacts. A contact
/// already in the target state is returned unchanged.
fn apply_status_change<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
    change: &StatusChange,
) -> ServiceResult<Contact>
where
    R: ContactReader + ContactWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let contact = repo
        .get_contact_by_id(ContactId::new(id)?, user_id)?
        .ok_or(ServiceError::NotFound)?;
    match repo.change_contact_status(contact.id, change, now())? {
        Some(updated) => Ok(updated),
        None if contact.status == change.target() => Ok(contact),
        None => Err(ServiceError::InvalidState(format!(
            "Contact is {} and cannot change to {}",
            contact.status,
            change.target()
        ))),
    }
}

pub fn contact_statistics<R>(repo: &R, user: &AuthenticatedUser) -> ServiceResult<ContactStatistics>
where
    R: ContactReader + ?Sized,
{
    let user_id = owner_id(user)?;
    repo.get_contact_statistics(user_id, now()).map_err(|err| {
        log::error!("Failed to load contact statistics: {err}");
        err.into()
    })
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use chrono::NaiveDate;
    use serde_json::Value;

    use super::*;
    use crate::domain::contact::tests::sample_contact;
    use crate::domain::contact_list::{ContactList, ListType};
    use crate::domain::types::ListName;
    use crate::repository::mock::MockRepository;
    use crate::services::test_support::{admin_user, client_user};

    fn profile(max_contacts: i32) -> UserProfile {
        let at = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        UserProfile {
            user_id: UserId::new(1).unwrap(),
            max_contacts,
            max_campaigns_per_month: 100,
            max_emails_per_month: 50_000,
            items_per_page: 20,
            default_from_name: None,
            default_reply_to: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn sample_list(id: i32) -> ContactList {
        let at = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        ContactList {
            id: ContactListId::new(id).unwrap(),
            user_id: UserId::new(1).unwrap(),
            name: ListName::new("Customers").unwrap(),
            description: None,
            list_type: ListType::Manual,
            conditions: Value::Object(Default::default()),
            is_active: true,
            is_favorite: false,
            contact_count: 0,
            created_at: at,
            updated_at: at,
        }
    }

    fn contact_form(email: &str) -> ContactForm {
        ContactForm {
            email: email.into(),
            first_name: Some("Jean".into()),
            list_ids: vec![4],
            ..ContactForm::default()
        }
    }

    #[test]
    fn create_respects_contact_limit() {
        let mut repo = MockRepository::new();
        repo.expect_get_user_profile()
            .returning(|_| Ok(Some(profile(2))));
        repo.expect_count_contacts().returning(|_| Ok(2));
        repo.expect_create_contact().times(0);

        let result = create_contact(
            &repo,
            &client_user(),
            contact_form("jean@example.com"),
            ContactSource::Manual,
            &RequestMeta::default(),
        );

        assert!(matches!(result, Err(ServiceError::LimitExceeded(_))));
    }

    #[test]
    fn super_admin_bypasses_contact_limit() {
        let mut repo = MockRepository::new();
        repo.expect_get_user_profile().times(0);
        repo.expect_count_contacts().times(0);
        repo.expect_get_contact_by_email().returning(|_, _| Ok(None));
        repo.expect_get_contact_list()
            .returning(|id, _| Ok(Some(sample_list(id.get()))));
        repo.expect_create_contact()
            .returning(|_| Ok(sample_contact(10, "jean@example.com")));
        repo.expect_add_contacts_to_list().returning(|_, ids| Ok(ids.len()));
        repo.expect_log_activity().returning(|_| Ok(()));

        let contact = create_contact(
            &repo,
            &admin_user(),
            contact_form("jean@example.com"),
            ContactSource::Manual,
            &RequestMeta::default(),
        )
        .unwrap();
        assert_eq!(contact.id.get(), 10);
    }

    #[test]
    fn create_rejects_duplicate_email() {
        let mut repo = MockRepository::new();
        repo.expect_get_user_profile()
            .returning(|_| Ok(Some(profile(100))));
        repo.expect_count_contacts().returning(|_| Ok(1));
        repo.expect_get_contact_by_email()
            .returning(|_, _| Ok(Some(sample_contact(3, "jean@example.com"))));
        repo.expect_create_contact().times(0);

        let result = create_contact(
            &repo,
            &client_user(),
            contact_form("Jean@Example.com"),
            ContactSource::Manual,
            &RequestMeta::default(),
        );

        assert!(matches!(result, Err(ServiceError::Form(_))));
    }

    #[test]
    fn create_joins_lists_and_logs_activity() {
        let mut repo = MockRepository::new();
        repo.expect_get_user_profile()
            .returning(|_| Ok(Some(profile(100))));
        repo.expect_count_contacts().returning(|_| Ok(1));
        repo.expect_get_contact_by_email().returning(|_, _| Ok(None));
        repo.expect_get_contact_list()
            .returning(|id, _| Ok(Some(sample_list(id.get()))));
        repo.expect_create_contact()
            .withf(|new| new.source == ContactSource::Manual && new.first_name.as_deref() == Some("Jean"))
            .returning(|_| Ok(sample_contact(10, "jean@example.com")));
        repo.expect_add_contacts_to_list()
            .withf(|list_id, ids| list_id.get() == 4 && ids.len() == 1 && ids[0].get() == 10)
            .times(1)
            .returning(|_, _| Ok(1));
        repo.expect_log_activity()
            .withf(|a| a.activity_type == ActivityType::ContactCreated)
            .times(1)
            .returning(|_| Ok(()));

        create_contact(
            &repo,
            &client_user(),
            contact_form("jean@example.com"),
            ContactSource::Manual,
            &RequestMeta::default(),
        )
        .unwrap();
    }

    #[test]
    fn update_syncs_list_memberships() {
        let mut repo = MockRepository::new();
        repo.expect_get_contact_by_id()
            .returning(|id, _| Ok(Some(sample_contact(id.get(), "jean@example.com"))));
        repo.expect_get_contact_list()
            .returning(|id, _| Ok(Some(sample_list(id.get()))));
        repo.expect_update_contact()
            .returning(|id, _| Ok(sample_contact(id.get(), "jean@example.com")));
        repo.expect_list_contact_memberships()
            .returning(|_| Ok((vec![sample_list(2)], vec![])));
        repo.expect_remove_contacts_from_list()
            .withf(|list_id, _| list_id.get() == 2)
            .times(1)
            .returning(|_, _| Ok(1));
        repo.expect_add_contacts_to_list()
            .withf(|list_id, _| list_id.get() == 4)
            .times(1)
            .returning(|_, _| Ok(1));

        update_contact(&repo, &client_user(), 7, contact_form("jean@example.com")).unwrap();
    }

    #[test]
    fn bulk_tagging_requires_owned_tag() {
        let mut repo = MockRepository::new();
        repo.expect_get_tag().returning(|_, _| Ok(None));
        repo.expect_tag_contacts().times(0);
        let form = BulkActionForm {
            action: "add_tag".into(),
            contact_ids: vec![1, 2],
            list_id: None,
            tag_id: Some(9),
        };

        let result = bulk_action(&repo, &client_user(), form);

        assert!(matches!(result, Err(ServiceError::NotFound)));
    }

    #[test]
    fn bulk_add_to_list_skips_foreign_contacts() {
        let mut repo = MockRepository::new();
        repo.expect_get_contact_list()
            .returning(|id, _| Ok(Some(sample_list(id.get()))));
        repo.expect_get_contact_by_id().returning(|id, _| {
            if id.get() == 1 {
                Ok(Some(sample_contact(1, "a@example.com")))
            } else {
                Ok(None)
            }
        });
        repo.expect_add_contacts_to_list()
            .withf(|_, ids| ids.len() == 1 && ids[0].get() == 1)
            .times(1)
            .returning(|_, ids| Ok(ids.len()));
        let form = BulkActionForm {
            action: "add_to_list".into(),
            contact_ids: vec![1, 2],
            list_id: Some(4),
            tag_id: None,
        };

        assert_eq!(bulk_action(&repo, &client_user(), form).unwrap(), 1);
    }

    #[test]
    fn bulk_delete_is_scoped_to_owner() {
        let mut repo = MockRepository::new();
        repo.expect_delete_contacts()
            .withf(|user_id, ids| user_id.get() == 1 && ids.len() == 2)
            .times(1)
            .returning(|_, ids| Ok(ids.len()));
        let form = BulkActionForm {
            action: "delete".into(),
            contact_ids: vec![5, 6, 5],
            list_id: None,
            tag_id: None,
        };

        assert_eq!(bulk_action(&repo, &client_user(), form).unwrap(), 2);
    }

    #[test]
    fn api_search_reports_next_page() {
        let mut repo = MockRepository::new();
        repo.expect_list_contacts()
            .withf(|q| {
                q.search.as_deref() == Some("jean")
                    && q.pagination.as_ref().is_some_and(|p| p.page == 2 && p.per_page == 25)
            })
            .returning(|_| {
                Ok((
                    60,
                    (1..=25)
                        .map(|i| sample_contact(i, &format!("c{i}@example.com")))
                        .collect(),
                ))
            });

        let page = search_contacts_api(
            &repo,
            &client_user(),
            ApiContactsQuery {
                search: Some(" jean ".into()),
                limit: None,
                offset: Some(25),
            },
        )
        .unwrap();

        assert_eq!(page.offset, 25);
        assert!(page.has_next);
    }

    #[test]
    fn missing_contact_is_not_found() {
        let mut repo = MockRepository::new();
        repo.expect_get_contact_by_id().returning(|_, _| Ok(None));

        assert!(matches!(
            get_contact(&repo, &client_user(), 42),
            Err(ServiceError::NotFound)
        ));
    }

    #[test]
    fn resubscribing_an_active_contact_returns_it_unchanged() {
        let mut repo = MockRepository::new();
        repo.expect_get_contact_by_id()
            .returning(|id, _| Ok(Some(sample_contact(id.get(), "awa@example.com"))));
        repo.expect_change_contact_status()
            .withf(|_, change, _| *change == StatusChange::Resubscribe)
            .times(1)
            .returning(|_, _, _| Ok(None));

        let contact = resubscribe_contact(&repo, &client_user(), 7).unwrap();
        assert_eq!(contact.status, ContactStatus::Active);
    }

    #[test]
    fn unsubscribe_uses_the_guarded_update() {
        let mut repo = MockRepository::new();
        repo.expect_get_contact_by_id()
            .returning(|id, _| Ok(Some(sample_contact(id.get(), "awa@example.com"))));
        repo.expect_change_contact_status()
            .withf(|id, change, _| {
                id.get() == 7
                    && *change
                        == StatusChange::Unsubscribe {
                            reason: Some("moved".into()),
                        }
            })
            .times(1)
            .returning(|id, _, _| {
                let mut contact = sample_contact(id.get(), "awa@example.com");
                contact.status = ContactStatus::Unsubscribed;
                contact.is_active = false;
                Ok(Some(contact))
            });

        let contact =
            unsubscribe_contact(&repo, &client_user(), 7, Some("moved".into())).unwrap();
        assert_eq!(contact.status, ContactStatus::Unsubscribed);
    }
}
