//! Super-admin panel and the account provisioning used by `afrimail-admin`.

use chrono::NaiveDateTime;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::contact_list::{ListType, NewContactList, NewContactTag};
use crate::domain::types::{EmailAddress, HexColor, ListName, TagName, UserId};
use crate::domain::user::{NewUser, User, UserRole, validate_password_strength};
use crate::dto::analytics::{EmailLogsPage, SystemStatsPage, UsersPageData, UsersQuery};
use crate::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use crate::repository::{
    AnalyticsReader, ContactListReader, ContactListWriter, EventReader, QueueReader,
    UserListQuery, UserReader, UserWriter,
};
use crate::services::auth::hash_password;
use crate::services::tracking::DEFAULT_STATISTICS_DAYS;
use crate::services::{ServiceError, ServiceResult, ensure_super_admin, owner_id};

const EMAIL_LOG_LIMIT: i64 = 100;
const HISTORY_DAYS: i64 = 30;

pub fn system_statistics<R>(
    repo: &R,
    user: &AuthenticatedUser,
    now: NaiveDateTime,
) -> ServiceResult<SystemStatsPage>
where
    R: AnalyticsReader + QueueReader + EventReader + ?Sized,
{
    ensure_super_admin(user)?;
    let since = now - chrono::Duration::days(DEFAULT_STATISTICS_DAYS);
    let counts = repo.count_events_by_type(None, since)?;

    Ok(SystemStatsPage {
        statistics: repo.get_system_statistics(now)?,
        queue: repo.get_queue_statistics()?,
        delivery: crate::domain::event::DeliveryStatistics::from_counts(
            DEFAULT_STATISTICS_DAYS,
            &counts,
        ),
        history: repo.list_platform_analytics(HISTORY_DAYS)?,
    })
}

pub fn list_users<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: UsersQuery,
) -> ServiceResult<UsersPageData>
where
    R: UserReader + ?Sized,
{
    ensure_super_admin(user)?;
    let page = query.page.unwrap_or(1).max(1);
    let search_query = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let mut list_query = UserListQuery::new().paginate(page, DEFAULT_ITEMS_PER_PAGE);
    if let Some(term) = &search_query {
        list_query = list_query.search(term.clone());
    }
    let (total, users) = repo.list_users(list_query)?;

    Ok(UsersPageData {
        users: Paginated::from_total(users, page, total, DEFAULT_ITEMS_PER_PAGE),
        total,
        search_query,
    })
}

pub fn set_user_active<R>(
    repo: &R,
    user: &AuthenticatedUser,
    target_id: i32,
    active: bool,
) -> ServiceResult<()>
where
    R: UserReader + UserWriter + ?Sized,
{
    ensure_super_admin(user)?;
    let target = repo
        .get_user_by_id(UserId::new(target_id)?)?
        .ok_or(ServiceError::NotFound)?;
    if !active && target.id == owner_id(user)? {
        return Err(ServiceError::InvalidState(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    repo.set_user_active(target.id, active)?;
    log::info!(
        "User {} {} by {}",
        target.email,
        if active { "activated" } else { "deactivated" },
        user.email
    );
    Ok(())
}

pub fn email_logs<R>(repo: &R, user: &AuthenticatedUser) -> ServiceResult<EmailLogsPage>
where
    R: EventReader + ?Sized,
{
    ensure_super_admin(user)?;
    Ok(EmailLogsPage {
        events: repo.list_recent_events(EMAIL_LOG_LIMIT)?,
    })
}

/// Account created from the command line, already verified.
#[derive(Debug, Clone)]
pub struct AccountSpec {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub phone: Option<String>,
    pub country: String,
    pub city: Option<String>,
    pub role: UserRole,
}

/// Creates the account unless the email is taken. Returns `None` when it already exists.
pub fn provision_account<R>(repo: &R, spec: AccountSpec) -> ServiceResult<Option<User>>
where
    R: UserReader + UserWriter + ?Sized,
{
    let email = EmailAddress::new(&spec.email)?;
    if repo.get_user_by_email(&email)?.is_some() {
        return Ok(None);
    }
    validate_password_strength(&spec.password)
        .map_err(|err| ServiceError::Form(err.to_string()))?;

    let user = repo.create_user(&NewUser {
        email,
        password_hash: hash_password(&spec.password)?,
        first_name: spec.first_name,
        last_name: spec.last_name,
        phone: spec.phone,
        company: spec.company,
        company_website: None,
        industry: None,
        company_size: None,
        country: spec.country,
        city: spec.city,
        role: spec.role,
        is_active: true,
        is_email_verified: true,
        email_verification_token: None,
        email_verification_sent_at: None,
    })?;
    log::info!("Provisioned {} account {}", user.role, user.email);
    Ok(Some(user))
}

const SAMPLE_LISTS: [(&str, &str); 3] = [
    ("Newsletter Subscribers", "General newsletter subscribers"),
    ("Premium Customers", "High-value customers"),
    ("Event Attendees", "People who attended our events"),
];

const SAMPLE_TAGS: [(&str, &str); 4] = [
    ("VIP", "#FFD700"),
    ("Lead", "#32CD32"),
    ("Active", "#1E90FF"),
    ("Inactive", "#DC143C"),
];

/// Adds the demo lists and tags the user does not have yet. Returns how many were created.
pub fn seed_sample_data<R>(repo: &R, user_id: UserId) -> ServiceResult<usize>
where
    R: ContactListReader + ContactListWriter + ?Sized,
{
    let existing_lists: Vec<String> = repo
        .list_contact_lists(user_id)?
        .into_iter()
        .map(|list| list.name.into_inner())
        .collect();
    let existing_tags: Vec<String> = repo
        .list_tags(user_id)?
        .into_iter()
        .map(|tag| tag.name.into_inner())
        .collect();
    let mut created = 0;

    for (name, description) in SAMPLE_LISTS {
        if existing_lists.iter().any(|n| n == name) {
            continue;
        }
        let mut list = NewContactList::new(user_id, ListName::new(name)?, ListType::Manual);
        list.description = Some(description.to_string());
        repo.create_contact_list(&list)?;
        created += 1;
    }
    for (name, color) in SAMPLE_TAGS {
        if existing_tags.iter().any(|n| n == name) {
            continue;
        }
        repo.create_tag(&NewContactTag {
            user_id,
            name: TagName::new(name)?,
            color: HexColor::new(color)?,
        })?;
        created += 1;
    }
    Ok(created)
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use super::*;
    use crate::domain::user::tests::sample_user;
    use crate::repository::mock::MockRepository;
    use crate::services::test_support::{admin_user, client_user};

    #[test]
    fn clients_cannot_open_admin_pages() {
        let repo = MockRepository::new();
        assert!(matches!(
            email_logs(&repo, &client_user()),
            Err(ServiceError::Unauthorized)
        ));
    }

    #[test]
    fn admins_cannot_deactivate_themselves() {
        let mut repo = MockRepository::new();
        repo.expect_get_user_by_id().returning(|id| {
            let mut user = sample_user(UserRole::SuperAdmin);
            user.id = id;
            Ok(Some(user))
        });
        repo.expect_set_user_active().times(0);

        assert!(matches!(
            set_user_active(&repo, &admin_user(), 99, false),
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[test]
    fn existing_accounts_are_left_alone() {
        let mut repo = MockRepository::new();
        repo.expect_get_user_by_email()
            .returning(|_| Ok(Some(sample_user(UserRole::Client))));
        repo.expect_create_user().times(0);

        let spec = AccountSpec {
            email: "marie@techstartup.cm".into(),
            password: "ClientUser123!".into(),
            first_name: "Marie".into(),
            last_name: "Kouam".into(),
            company: "TechStartup Cameroon".into(),
            phone: None,
            country: "CM".into(),
            city: Some("Douala".into()),
            role: UserRole::Client,
        };
        assert!(provision_account(&repo, spec).unwrap().is_none());
    }

    #[test]
    fn seeding_skips_existing_names() {
        let mut repo = MockRepository::new();
        repo.expect_list_contact_lists().returning(|user_id| {
            let at = crate::domain::contact::tests::now();
            Ok(vec![crate::domain::contact_list::ContactList {
                id: crate::domain::types::ContactListId::new(1).unwrap(),
                user_id,
                name: ListName::new("Premium Customers").unwrap(),
                description: None,
                list_type: ListType::Manual,
                conditions: serde_json::json!({}),
                is_active: true,
                is_favorite: false,
                contact_count: 0,
                created_at: at,
                updated_at: at,
            }])
        });
        repo.expect_list_tags().returning(|_| Ok(vec![]));
        repo.expect_create_contact_list()
            .withf(|list| list.name.as_str() != "Premium Customers")
            .times(2)
            .returning(|list| {
                let at = crate::domain::contact::tests::now();
                Ok(crate::domain::contact_list::ContactList {
                    id: crate::domain::types::ContactListId::new(2).unwrap(),
                    user_id: list.user_id,
                    name: list.name.clone(),
                    description: list.description.clone(),
                    list_type: list.list_type,
                    conditions: list.conditions.clone(),
                    is_active: true,
                    is_favorite: false,
                    contact_count: 0,
                    created_at: at,
                    updated_at: at,
                })
            });
        repo.expect_create_tag().times(4).returning(|tag| {
            Ok(crate::domain::contact_list::ContactTag {
                id: crate::domain::types::TagId::new(1).unwrap(),
                user_id: tag.user_id,
                name: tag.name.clone(),
                color: tag.color.clone(),
                created_at: crate::domain::contact::tests::now(),
            })
        });

        assert_eq!(seed_sample_data(&repo, UserId::new(1).unwrap()).unwrap(), 6);
    }
}
