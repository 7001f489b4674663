//! Persistence traits and their Diesel implementation.
//!
//! Services depend on the narrow `*Reader`/`*Writer` traits; the single
//! [`DieselRepository`] implements all of them on top of the r2d2 pool, and
//! `mock::MockRepository` replaces it in service tests.

use chrono::{NaiveDate, NaiveDateTime};

use crate::db::{DbConnection, DbPool};
use crate::domain::analytics::{
    CampaignAnalytics, ContactEngagement, DailyCampaignCounts, NewApiUsage, PlatformAnalytics,
    SystemStatistics,
};
use crate::domain::campaign::{
    CampaignCounterDelta, CampaignStatus, EmailCampaign, NewEmailCampaign, UpdateEmailCampaign,
};
use crate::domain::contact::{
    Contact, ContactStatistics, ContactStatus, NewContact, StatusChange, UpdateContact,
};
use crate::domain::contact_list::{
    ContactList, ContactTag, NewContactList, NewContactTag, UpdateContactList,
};
use crate::domain::email_config::{
    DomainReputation, EmailDomainConfig, NewEmailDomainConfig, UpdateEmailDomainConfig,
    VerificationStatus,
};
use crate::domain::event::{EmailEvent, EventType, NewEmailEvent};
use crate::domain::import::{ContactImport, ImportStatus, ImportSummary, NewContactImport};
use crate::domain::queue::{NewQueuedEmail, QueueStatistics, QueuedEmail};
use crate::domain::template::{EmailTemplate, NewEmailTemplate, UpdateEmailTemplate};
use crate::domain::types::{
    CampaignId, ContactId, ContactListId, EmailAddress, EmailConfigId, ImportId, TagId,
    TemplateId, UserId,
};
use crate::domain::user::{
    NewUser, NewUserActivity, UpdateUser, UsageStats, User, UserActivity, UserProfile,
};
use crate::repository::errors::RepositoryResult;

pub mod analytics;
pub mod campaign;
pub mod contact;
pub mod contact_list;
pub mod email_config;
pub mod errors;
pub mod event;
pub mod import;
pub mod maintenance;
pub mod queue;
pub mod template;
pub mod user;

#[cfg(feature = "test-mocks")]
pub mod mock;

#[derive(Clone)]
pub struct DieselRepository {
    pool: DbPool,
}

impl DieselRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> RepositoryResult<DbConnection> {
        Ok(self.pool.get()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) as i64 * self.per_page as i64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactListQuery {
    pub user_id: UserId,
    pub search: Option<String>,
    pub status: Option<ContactStatus>,
    pub list_id: Option<ContactListId>,
    pub tag_id: Option<TagId>,
    pub pagination: Option<Pagination>,
}

impl ContactListQuery {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            search: None,
            status: None,
            list_id: None,
            tag_id: None,
            pagination: None,
        }
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn status(mut self, status: ContactStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn list(mut self, list_id: ContactListId) -> Self {
        self.list_id = Some(list_id);
        self
    }

    pub fn tag(mut self, tag_id: TagId) -> Self {
        self.tag_id = Some(tag_id);
        self
    }

    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination { page, per_page });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignListQuery {
    pub user_id: UserId,
    pub search: Option<String>,
    pub status: Option<CampaignStatus>,
    pub created_since: Option<NaiveDateTime>,
    pub pagination: Option<Pagination>,
}

impl CampaignListQuery {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            search: None,
            status: None,
            created_since: None,
            pagination: None,
        }
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn status(mut self, status: CampaignStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn created_since(mut self, since: NaiveDateTime) -> Self {
        self.created_since = Some(since);
        self
    }

    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination { page, per_page });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub pagination: Option<Pagination>,
}

impl UserListQuery {
    pub fn new() -> Self {
        Self {
            search: None,
            pagination: None,
        }
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn paginate(mut self, page: usize, per_page: usize) -> Self {
        self.pagination = Some(Pagination { page, per_page });
        self
    }
}

impl Default for UserListQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// A contact with the names of its lists and tags, as exported to CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactExportRow {
    pub contact: Contact,
    pub lists: Vec<String>,
    pub tags: Vec<String>,
}

/// Per-contact event counts of one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyContactCounts {
    pub contact_id: ContactId,
    pub received: i32,
    pub opened: i32,
    pub clicked: i32,
}

/// Platform-wide totals snapshotted by the daily analytics job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformCounts {
    pub total_users: i64,
    pub active_users: i64,
    pub new_users: i64,
    pub total_contacts: i64,
    pub total_campaigns: i64,
}

/// Rows removed (or that would be removed) by the retention cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub events: usize,
    pub activities: usize,
    pub api_usage: usize,
    pub imports: usize,
    pub queue_rows: usize,
}

pub trait UserReader {
    fn get_user_by_id(&self, id: UserId) -> RepositoryResult<Option<User>>;
    fn get_user_by_email(&self, email: &EmailAddress) -> RepositoryResult<Option<User>>;
    fn get_user_by_verification_token(&self, token: &str) -> RepositoryResult<Option<User>>;
    fn get_user_by_reset_token(&self, token: &str) -> RepositoryResult<Option<User>>;
    fn get_user_profile(&self, user_id: UserId) -> RepositoryResult<Option<UserProfile>>;
    fn list_users(&self, query: UserListQuery) -> RepositoryResult<(usize, Vec<User>)>;
    fn get_usage_stats(
        &self,
        user_id: UserId,
        month_start: NaiveDateTime,
    ) -> RepositoryResult<UsageStats>;
    fn list_user_activities(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> RepositoryResult<Vec<UserActivity>>;
}

pub trait UserWriter {
    /// Inserts the user together with a default profile.
    fn create_user(&self, new_user: &NewUser) -> RepositoryResult<User>;
    fn update_user(&self, id: UserId, updates: &UpdateUser) -> RepositoryResult<User>;
    fn record_login(
        &self,
        id: UserId,
        ip_address: Option<&str>,
        at: NaiveDateTime,
    ) -> RepositoryResult<()>;
    fn set_verification_token(
        &self,
        id: UserId,
        token: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<()>;
    fn mark_email_verified(&self, id: UserId, at: NaiveDateTime) -> RepositoryResult<User>;
    fn set_password_reset_token(
        &self,
        id: UserId,
        token: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<()>;
    /// Stores a new hash and clears any pending reset token.
    fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<()>;
    fn set_user_active(&self, id: UserId, active: bool) -> RepositoryResult<()>;
    fn log_activity(&self, activity: &NewUserActivity) -> RepositoryResult<()>;
}

pub trait ContactReader {
    fn get_contact_by_id(&self, id: ContactId, user_id: UserId)
    -> RepositoryResult<Option<Contact>>;
    /// Lookup without tenant scoping, used by tracking endpoints.
    fn find_contact(&self, id: ContactId) -> RepositoryResult<Option<Contact>>;
    fn get_contact_by_email(
        &self,
        user_id: UserId,
        email: &EmailAddress,
    ) -> RepositoryResult<Option<Contact>>;
    fn list_contacts(&self, query: ContactListQuery) -> RepositoryResult<(usize, Vec<Contact>)>;
    fn count_contacts(&self, user_id: UserId) -> RepositoryResult<i64>;
    fn get_contact_statistics(
        &self,
        user_id: UserId,
        now: NaiveDateTime,
    ) -> RepositoryResult<ContactStatistics>;
    fn list_contact_memberships(
        &self,
        contact_id: ContactId,
    ) -> RepositoryResult<(Vec<ContactList>, Vec<ContactTag>)>;
    fn list_contacts_for_export(&self, user_id: UserId)
    -> RepositoryResult<Vec<ContactExportRow>>;
    /// Batch of contacts ordered by id, optionally limited to one owner.
    fn list_contacts_batch(
        &self,
        user_id: Option<UserId>,
        after: Option<ContactId>,
        limit: i64,
    ) -> RepositoryResult<Vec<Contact>>;
}

pub trait ContactWriter {
    fn create_contact(&self, new_contact: &NewContact) -> RepositoryResult<Contact>;
    fn update_contact(&self, id: ContactId, updates: &UpdateContact) -> RepositoryResult<Contact>;
    /// Applies the transition if the contact is in one of its source states
    /// and returns the updated contact, or `None` when the guard rejected it.
    fn change_contact_status(
        &self,
        id: ContactId,
        change: &StatusChange,
        at: NaiveDateTime,
    ) -> RepositoryResult<Option<Contact>>;
    /// Writes only the engagement score column.
    fn save_engagement_score(&self, id: ContactId, score: f64) -> RepositoryResult<()>;
    fn delete_contacts(&self, user_id: UserId, ids: &[ContactId]) -> RepositoryResult<usize>;
    fn add_contacts_to_list(
        &self,
        list_id: ContactListId,
        ids: &[ContactId],
    ) -> RepositoryResult<usize>;
    fn remove_contacts_from_list(
        &self,
        list_id: ContactListId,
        ids: &[ContactId],
    ) -> RepositoryResult<usize>;
    fn tag_contacts(&self, tag_id: TagId, ids: &[ContactId]) -> RepositoryResult<usize>;
    fn unsubscribe_contacts(
        &self,
        user_id: UserId,
        ids: &[ContactId],
        at: NaiveDateTime,
    ) -> RepositoryResult<usize>;
}

pub trait ContactListReader {
    fn get_contact_list(
        &self,
        id: ContactListId,
        user_id: UserId,
    ) -> RepositoryResult<Option<ContactList>>;
    fn list_contact_lists(&self, user_id: UserId) -> RepositoryResult<Vec<ContactList>>;
    fn get_tag(&self, id: TagId, user_id: UserId) -> RepositoryResult<Option<ContactTag>>;
    fn list_tags(&self, user_id: UserId) -> RepositoryResult<Vec<ContactTag>>;
}

pub trait ContactListWriter {
    fn create_contact_list(&self, list: &NewContactList) -> RepositoryResult<ContactList>;
    fn update_contact_list(
        &self,
        id: ContactListId,
        updates: &UpdateContactList,
    ) -> RepositoryResult<ContactList>;
    fn delete_contact_list(&self, id: ContactListId) -> RepositoryResult<()>;
    fn create_tag(&self, tag: &NewContactTag) -> RepositoryResult<ContactTag>;
    fn delete_tag(&self, id: TagId) -> RepositoryResult<()>;
}

pub trait ImportReader {
    fn get_import(&self, id: ImportId, user_id: UserId) -> RepositoryResult<Option<ContactImport>>;
    fn list_imports(&self, user_id: UserId, limit: i64) -> RepositoryResult<Vec<ContactImport>>;
}

pub trait ImportWriter {
    /// Creates the import record in `PROCESSING` state.
    fn start_import(
        &self,
        import: &NewContactImport,
        at: NaiveDateTime,
    ) -> RepositoryResult<ContactImport>;
    fn finish_import(
        &self,
        id: ImportId,
        status: ImportStatus,
        summary: &ImportSummary,
        at: NaiveDateTime,
    ) -> RepositoryResult<ContactImport>;
}

pub trait EmailConfigReader {
    fn get_email_config(
        &self,
        id: EmailConfigId,
        user_id: UserId,
    ) -> RepositoryResult<Option<EmailDomainConfig>>;
    fn find_email_config(&self, id: EmailConfigId) -> RepositoryResult<Option<EmailDomainConfig>>;
    fn list_email_configs(&self, user_id: UserId) -> RepositoryResult<Vec<EmailDomainConfig>>;
    fn get_default_email_config(
        &self,
        user_id: UserId,
    ) -> RepositoryResult<Option<EmailDomainConfig>>;
    fn list_active_email_configs(&self) -> RepositoryResult<Vec<EmailDomainConfig>>;
}

pub trait EmailConfigWriter {
    /// Inserts the configuration; a default one replaces the previous default.
    fn create_email_config(
        &self,
        config: &NewEmailDomainConfig,
    ) -> RepositoryResult<EmailDomainConfig>;
    fn update_email_config(
        &self,
        id: EmailConfigId,
        user_id: UserId,
        updates: &UpdateEmailDomainConfig,
    ) -> RepositoryResult<EmailDomainConfig>;
    fn delete_email_config(&self, id: EmailConfigId) -> RepositoryResult<()>;
    fn record_verification(
        &self,
        id: EmailConfigId,
        status: VerificationStatus,
        at: NaiveDateTime,
    ) -> RepositoryResult<EmailDomainConfig>;
    fn reset_daily_usage(&self) -> RepositoryResult<usize>;
    fn reset_monthly_usage(&self) -> RepositoryResult<usize>;
    fn save_domain_reputation(&self, reputation: &DomainReputation) -> RepositoryResult<()>;
}

pub trait TemplateReader {
    /// Own templates and active shared ones.
    fn get_template(&self, id: TemplateId, user_id: UserId)
    -> RepositoryResult<Option<EmailTemplate>>;
    fn list_templates(&self, user_id: UserId) -> RepositoryResult<Vec<EmailTemplate>>;
}

pub trait TemplateWriter {
    fn create_template(&self, template: &NewEmailTemplate) -> RepositoryResult<EmailTemplate>;
    fn update_template(
        &self,
        id: TemplateId,
        updates: &UpdateEmailTemplate,
    ) -> RepositoryResult<EmailTemplate>;
    fn delete_template(&self, id: TemplateId) -> RepositoryResult<()>;
    fn mark_template_used(&self, id: TemplateId, at: NaiveDateTime) -> RepositoryResult<()>;
}

pub trait CampaignReader {
    fn get_campaign(&self, id: CampaignId, user_id: UserId)
    -> RepositoryResult<Option<EmailCampaign>>;
    fn find_campaign(&self, id: CampaignId) -> RepositoryResult<Option<EmailCampaign>>;
    fn list_campaigns(
        &self,
        query: CampaignListQuery,
    ) -> RepositoryResult<(usize, Vec<EmailCampaign>)>;
    fn list_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> RepositoryResult<Vec<EmailCampaign>>;
    fn list_due_scheduled_campaigns(
        &self,
        now: NaiveDateTime,
    ) -> RepositoryResult<Vec<EmailCampaign>>;
    fn get_campaign_list_ids(&self, id: CampaignId) -> RepositoryResult<Vec<ContactListId>>;
    fn count_campaigns_since(
        &self,
        user_id: UserId,
        since: NaiveDateTime,
    ) -> RepositoryResult<i64>;
    /// Active, subscribed contacts across the campaign's lists, each once.
    fn list_recipients(&self, id: CampaignId) -> RepositoryResult<Vec<Contact>>;
    fn count_recipients(&self, id: CampaignId) -> RepositoryResult<i64>;
    fn count_campaigns_by_status(&self, user_id: UserId) -> RepositoryResult<Vec<(String, i64)>>;
}

pub trait CampaignWriter {
    fn create_campaign(
        &self,
        campaign: &NewEmailCampaign,
        list_ids: &[ContactListId],
    ) -> RepositoryResult<EmailCampaign>;
    fn update_campaign(
        &self,
        id: CampaignId,
        updates: &UpdateEmailCampaign,
        list_ids: &[ContactListId],
    ) -> RepositoryResult<EmailCampaign>;
    fn delete_campaign(&self, id: CampaignId) -> RepositoryResult<()>;
    /// Persists status, recipient count and lifecycle timestamps.
    fn save_campaign_status(&self, campaign: &EmailCampaign) -> RepositoryResult<()>;
    fn increment_campaign_counters(
        &self,
        id: CampaignId,
        delta: CampaignCounterDelta,
    ) -> RepositoryResult<()>;
}

pub trait QueueReader {
    fn count_outstanding(&self, campaign_id: CampaignId) -> RepositoryResult<i64>;
    fn get_queue_statistics(&self) -> RepositoryResult<QueueStatistics>;
}

pub trait QueueWriter {
    fn enqueue_emails(&self, rows: &[NewQueuedEmail]) -> RepositoryResult<usize>;
    /// Flips due rows of sending campaigns to `SENDING` and returns them.
    fn claim_due_emails(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> RepositoryResult<Vec<QueuedEmail>>;
    fn update_queued_email(&self, row: &QueuedEmail, at: NaiveDateTime) -> RepositoryResult<()>;
    /// Stores the sent row and books the send on its campaign, contact and
    /// sending domain together with the `SENT` event, in one transaction.
    fn complete_delivery(
        &self,
        row: &QueuedEmail,
        config_id: EmailConfigId,
        at: NaiveDateTime,
    ) -> RepositoryResult<()>;
    /// Stores the failed row with the campaign's failure count and a `FAILED`
    /// event, in one transaction.
    fn give_up_delivery(&self, row: &QueuedEmail, at: NaiveDateTime) -> RepositoryResult<()>;
    /// Returns `SENDING` rows last touched before `claimed_before` to
    /// `RETRYING` so a later pass can claim them again.
    fn release_stale_claims(
        &self,
        claimed_before: NaiveDateTime,
        at: NaiveDateTime,
    ) -> RepositoryResult<usize>;
    fn cancel_queued_emails(&self, campaign_id: CampaignId) -> RepositoryResult<usize>;
}

pub trait EventReader {
    fn has_event(
        &self,
        campaign_id: CampaignId,
        contact_id: ContactId,
        event_type: EventType,
    ) -> RepositoryResult<bool>;
    fn count_events_by_type(
        &self,
        user_id: Option<UserId>,
        since: NaiveDateTime,
    ) -> RepositoryResult<Vec<(EventType, i64)>>;
    fn list_campaign_events(&self, campaign_id: CampaignId) -> RepositoryResult<Vec<EmailEvent>>;
    fn list_recent_events(&self, limit: i64) -> RepositoryResult<Vec<EmailEvent>>;
    fn get_daily_campaign_counts(
        &self,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<(CampaignId, DailyCampaignCounts)>>;
    fn get_daily_contact_counts(&self, date: NaiveDate)
    -> RepositoryResult<Vec<DailyContactCounts>>;
    /// `(sent, bounced, complained)` for campaigns sent through the config.
    fn get_config_event_counts(
        &self,
        config_id: EmailConfigId,
        date: NaiveDate,
    ) -> RepositoryResult<(i32, i32, i32)>;
}

pub trait EventWriter {
    fn record_event(&self, event: &NewEmailEvent, at: NaiveDateTime)
    -> RepositoryResult<EmailEvent>;
    /// Books an open or click with its campaign and contact counters in one
    /// transaction. Returns whether it was the contact's first of that type
    /// for the campaign.
    fn record_engagement(&self, event: &NewEmailEvent, at: NaiveDateTime) -> RepositoryResult<bool>;
}

pub trait AnalyticsReader {
    fn list_campaign_analytics(
        &self,
        campaign_id: CampaignId,
    ) -> RepositoryResult<Vec<CampaignAnalytics>>;
    fn list_campaign_analytics_for_date(
        &self,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<CampaignAnalytics>>;
    fn list_platform_analytics(&self, limit: i64) -> RepositoryResult<Vec<PlatformAnalytics>>;
    fn get_platform_counts(&self, date: NaiveDate) -> RepositoryResult<PlatformCounts>;
    fn get_system_statistics(&self, now: NaiveDateTime) -> RepositoryResult<SystemStatistics>;
}

pub trait AnalyticsWriter {
    fn upsert_campaign_analytics(&self, row: &CampaignAnalytics) -> RepositoryResult<()>;
    fn upsert_contact_engagement(&self, row: &ContactEngagement) -> RepositoryResult<()>;
    fn upsert_platform_analytics(&self, row: &PlatformAnalytics) -> RepositoryResult<()>;
    fn record_api_usage(&self, usage: &NewApiUsage) -> RepositoryResult<()>;
}

pub trait MaintenanceWriter {
    /// Deletes retention-expired rows, or only counts them when `dry_run` is set.
    fn cleanup_before(&self, cutoff: NaiveDateTime, dry_run: bool)
    -> RepositoryResult<CleanupReport>;
}
