//! Mock repository implementations for isolating services in tests.

use chrono::{NaiveDate, NaiveDateTime};
use mockall::mock;

use crate::domain::analytics::{
    CampaignAnalytics, ContactEngagement, DailyCampaignCounts, NewApiUsage, PlatformAnalytics,
    SystemStatistics,
};
use crate::domain::campaign::{
    CampaignCounterDelta, CampaignStatus, EmailCampaign, NewEmailCampaign, UpdateEmailCampaign,
};
use crate::domain::contact::{
    Contact, ContactStatistics, NewContact, StatusChange, UpdateContact,
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
use crate::repository::{
    AnalyticsReader, AnalyticsWriter, CampaignListQuery, CampaignReader, CampaignWriter,
    CleanupReport, ContactExportRow, ContactListQuery, ContactListReader, ContactListWriter,
    ContactReader, ContactWriter, DailyContactCounts, EmailConfigReader, EmailConfigWriter,
    EventReader, EventWriter, ImportReader, ImportWriter, MaintenanceWriter, PlatformCounts,
    QueueReader, QueueWriter, TemplateReader, TemplateWriter, UserListQuery, UserReader,
    UserWriter,
};

mock! {
    pub Repository {}

    impl UserReader for Repository {
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

    impl UserWriter for Repository {
        fn create_user(&self, new_user: &NewUser) -> RepositoryResult<User>;
        fn update_user(&self, id: UserId, updates: &UpdateUser) -> RepositoryResult<User>;
        fn record_login<'a>(
            &self,
            id: UserId,
            ip_address: Option<&'a str>,
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
        fn update_password(
            &self,
            id: UserId,
            password_hash: &str,
            at: NaiveDateTime,
        ) -> RepositoryResult<()>;
        fn set_user_active(&self, id: UserId, active: bool) -> RepositoryResult<()>;
        fn log_activity(&self, activity: &NewUserActivity) -> RepositoryResult<()>;
    }

    impl ContactReader for Repository {
        fn get_contact_by_id(&self, id: ContactId, user_id: UserId)
        -> RepositoryResult<Option<Contact>>;
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
        fn list_contacts_batch(
            &self,
            user_id: Option<UserId>,
            after: Option<ContactId>,
            limit: i64,
        ) -> RepositoryResult<Vec<Contact>>;
    }

    impl ContactWriter for Repository {
        fn create_contact(&self, new_contact: &NewContact) -> RepositoryResult<Contact>;
        fn update_contact(&self, id: ContactId, updates: &UpdateContact) -> RepositoryResult<Contact>;
        fn change_contact_status(
            &self,
            id: ContactId,
            change: &StatusChange,
            at: NaiveDateTime,
        ) -> RepositoryResult<Option<Contact>>;
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

    impl ContactListReader for Repository {
        fn get_contact_list(
            &self,
            id: ContactListId,
            user_id: UserId,
        ) -> RepositoryResult<Option<ContactList>>;
        fn list_contact_lists(&self, user_id: UserId) -> RepositoryResult<Vec<ContactList>>;
        fn get_tag(&self, id: TagId, user_id: UserId) -> RepositoryResult<Option<ContactTag>>;
        fn list_tags(&self, user_id: UserId) -> RepositoryResult<Vec<ContactTag>>;
    }

    impl ContactListWriter for Repository {
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

    impl ImportReader for Repository {
        fn get_import(&self, id: ImportId, user_id: UserId) -> RepositoryResult<Option<ContactImport>>;
        fn list_imports(&self, user_id: UserId, limit: i64) -> RepositoryResult<Vec<ContactImport>>;
    }

    impl ImportWriter for Repository {
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

    impl EmailConfigReader for Repository {
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

    impl EmailConfigWriter for Repository {
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

    impl TemplateReader for Repository {
        fn get_template(&self, id: TemplateId, user_id: UserId)
        -> RepositoryResult<Option<EmailTemplate>>;
        fn list_templates(&self, user_id: UserId) -> RepositoryResult<Vec<EmailTemplate>>;
    }

    impl TemplateWriter for Repository {
        fn create_template(&self, template: &NewEmailTemplate) -> RepositoryResult<EmailTemplate>;
        fn update_template(
            &self,
            id: TemplateId,
            updates: &UpdateEmailTemplate,
        ) -> RepositoryResult<EmailTemplate>;
        fn delete_template(&self, id: TemplateId) -> RepositoryResult<()>;
        fn mark_template_used(&self, id: TemplateId, at: NaiveDateTime) -> RepositoryResult<()>;
    }

    impl CampaignReader for Repository {
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
        fn list_recipients(&self, id: CampaignId) -> RepositoryResult<Vec<Contact>>;
        fn count_recipients(&self, id: CampaignId) -> RepositoryResult<i64>;
        fn count_campaigns_by_status(&self, user_id: UserId) -> RepositoryResult<Vec<(String, i64)>>;
    }

    impl CampaignWriter for Repository {
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
        fn save_campaign_status(&self, campaign: &EmailCampaign) -> RepositoryResult<()>;
        fn increment_campaign_counters(
            &self,
            id: CampaignId,
            delta: CampaignCounterDelta,
        ) -> RepositoryResult<()>;
    }

    impl QueueReader for Repository {
        fn count_outstanding(&self, campaign_id: CampaignId) -> RepositoryResult<i64>;
        fn get_queue_statistics(&self) -> RepositoryResult<QueueStatistics>;
    }

    impl QueueWriter for Repository {
        fn enqueue_emails(&self, rows: &[NewQueuedEmail]) -> RepositoryResult<usize>;
        fn claim_due_emails(
            &self,
            now: NaiveDateTime,
            limit: i64,
        ) -> RepositoryResult<Vec<QueuedEmail>>;
        fn update_queued_email(&self, row: &QueuedEmail, at: NaiveDateTime) -> RepositoryResult<()>;
        fn complete_delivery(
            &self,
            row: &QueuedEmail,
            config_id: EmailConfigId,
            at: NaiveDateTime,
        ) -> RepositoryResult<()>;
        fn give_up_delivery(&self, row: &QueuedEmail, at: NaiveDateTime) -> RepositoryResult<()>;
        fn release_stale_claims(
            &self,
            claimed_before: NaiveDateTime,
            at: NaiveDateTime,
        ) -> RepositoryResult<usize>;
        fn cancel_queued_emails(&self, campaign_id: CampaignId) -> RepositoryResult<usize>;
    }

    impl EventReader for Repository {
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
        fn get_config_event_counts(
            &self,
            config_id: EmailConfigId,
            date: NaiveDate,
        ) -> RepositoryResult<(i32, i32, i32)>;
    }

    impl EventWriter for Repository {
        fn record_event(&self, event: &NewEmailEvent, at: NaiveDateTime)
        -> RepositoryResult<EmailEvent>;
        fn record_engagement(&self, event: &NewEmailEvent, at: NaiveDateTime) -> RepositoryResult<bool>;
    }

    impl AnalyticsReader for Repository {
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

    impl AnalyticsWriter for Repository {
        fn upsert_campaign_analytics(&self, row: &CampaignAnalytics) -> RepositoryResult<()>;
        fn upsert_contact_engagement(&self, row: &ContactEngagement) -> RepositoryResult<()>;
        fn upsert_platform_analytics(&self, row: &PlatformAnalytics) -> RepositoryResult<()>;
        fn record_api_usage(&self, usage: &NewApiUsage) -> RepositoryResult<()>;
    }

    impl MaintenanceWriter for Repository {
        fn cleanup_before(&self, cutoff: NaiveDateTime, dry_run: bool)
        -> RepositoryResult<CleanupReport>;
    }
}
