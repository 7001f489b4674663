//! Campaign authoring, lifecycle and reporting.
//!
//! Sending never delivers mail inline: it renders one queue row per recipient,
//! moves the campaign to `SENDING` and wakes the worker.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::domain::auth::AuthenticatedUser;
use crate::domain::campaign::{
    CampaignStatus, CampaignSummary, EmailCampaign, NewEmailCampaign, TimelineEntry,
    UpdateEmailCampaign,
};
use crate::domain::contact::{Contact, ContactSource, ContactStatus};
use crate::domain::contact_list::ContactList;
use crate::domain::email_config::EmailDomainConfig;
use crate::domain::event::EmailEvent;
use crate::domain::types::{CampaignId, ContactId, ContactListId, EmailAddress, TemplateId, UserId};
use crate::domain::user::{ActivityType, NewUserActivity, RequestMeta, UserProfile, start_of_month};
use crate::dto::campaigns::{
    CampaignAnalyticsPage, CampaignDetail, CampaignFormData, CampaignPreview, CampaignsPageData,
    CampaignsQuery,
};
use crate::forms::campaigns::{CampaignForm, CampaignPayload};
use crate::models::zmq::WorkerMessage;
use crate::pagination::{DEFAULT_ITEMS_PER_PAGE, Paginated};
use crate::repository::{
    AnalyticsReader, CampaignListQuery, CampaignReader, CampaignWriter, ContactListQuery,
    ContactListReader, ContactReader, EmailConfigReader, EventReader, QueueWriter, TemplateReader,
    TemplateWriter, UserReader, UserWriter,
};
use crate::services::delivery::{TrackingToken, build_queue_rows, personalize};
use crate::services::{ServiceError, ServiceResult, Site, notify_worker, now, owner_id};
use crate::zmq::WorkerNotifier;

/// Window of the campaign summary shown on the dashboard and API.
pub const SUMMARY_DAYS: i64 = 30;

const DELETABLE: [CampaignStatus; 3] = [
    CampaignStatus::Draft,
    CampaignStatus::Failed,
    CampaignStatus::Cancelled,
];

fn owned_campaign<R>(repo: &R, user_id: UserId, id: i32) -> ServiceResult<EmailCampaign>
where
    R: CampaignReader + ?Sized,
{
    repo.get_campaign(CampaignId::new(id)?, user_id)?
        .ok_or(ServiceError::NotFound)
}

fn log_campaign_activity<R>(
    repo: &R,
    campaign: &EmailCampaign,
    activity_type: ActivityType,
    description: String,
    meta: &RequestMeta,
) where
    R: UserWriter + ?Sized,
{
    let activity = NewUserActivity::new(campaign.user_id, activity_type, description, meta)
        .with_metadata(serde_json::json!({ "campaign_id": campaign.id.get() }));
    if let Err(err) = repo.log_activity(&activity) {
        log::error!("Failed to log campaign activity: {err}");
    }
}

/// Rejects a new campaign once the monthly allowance is used up.
fn ensure_campaign_capacity<R>(
    repo: &R,
    user: &AuthenticatedUser,
    user_id: UserId,
) -> ServiceResult<()>
where
    R: UserReader + CampaignReader + ?Sized,
{
    if user.is_super_admin() {
        return Ok(());
    }
    let this_month = repo.count_campaigns_since(user_id, start_of_month(now()))?;
    let allowed = match repo.get_user_profile(user_id)? {
        Some(profile) => profile.can_create_campaign(this_month),
        None => this_month < i64::from(UserProfile::DEFAULT_MAX_CAMPAIGNS_PER_MONTH),
    };
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::LimitExceeded(
            "You have reached your monthly campaign limit".to_string(),
        ))
    }
}

/// Verifies that every referenced list, config and template belongs to the
/// user, and fills empty content from the template.
fn resolve_payload<R>(repo: &R, user_id: UserId, payload: &mut CampaignPayload) -> ServiceResult<()>
where
    R: ContactListReader + EmailConfigReader + TemplateReader + TemplateWriter + ?Sized,
{
    for list_id in &payload.list_ids {
        repo.get_contact_list(*list_id, user_id)?
            .ok_or(ServiceError::NotFound)?;
    }

    let campaign = &mut payload.campaign;
    if let Some(config_id) = campaign.email_config_id {
        let config = repo
            .get_email_config(config_id, user_id)?
            .ok_or(ServiceError::NotFound)?;
        if campaign.from_email.is_empty() {
            campaign.from_email = config.from_email.to_string();
        }
        if campaign.from_name.is_empty() {
            campaign.from_name = config.from_name.clone();
        }
        if campaign.reply_to.is_none() {
            campaign.reply_to = config.reply_to.as_ref().map(ToString::to_string);
        }
    }

    if let Some(template_id) = campaign.template_id {
        let template = repo
            .get_template(template_id, user_id)?
            .ok_or(ServiceError::NotFound)?;
        if campaign.html_content.trim().is_empty() {
            campaign.html_content = template.html_content.clone();
            if campaign.text_content.is_none() {
                campaign.text_content = template.text_content.clone();
            }
            if campaign.subject.is_empty() {
                campaign.subject = template.subject.clone();
            }
            repo.mark_template_used(template.id, now())?;
        }
    }
    Ok(())
}

/// Stores the current audience size on the campaign.
fn refresh_recipient_count<R>(repo: &R, mut campaign: EmailCampaign) -> ServiceResult<EmailCampaign>
where
    R: CampaignReader + CampaignWriter + ?Sized,
{
    campaign.recipient_count = i32::try_from(repo.count_recipients(campaign.id)?).unwrap_or(i32::MAX);
    repo.save_campaign_status(&campaign)?;
    Ok(campaign)
}

fn authoring_fields(campaign: &EmailCampaign) -> UpdateEmailCampaign {
    NewEmailCampaign {
        user_id: campaign.user_id,
        name: campaign.name.clone(),
        description: campaign.description.clone(),
        campaign_type: campaign.campaign_type,
        priority: campaign.priority,
        email_config_id: campaign.email_config_id,
        template_id: campaign.template_id,
        subject: campaign.subject.clone(),
        preheader: campaign.preheader.clone(),
        from_name: campaign.from_name.clone(),
        from_email: campaign.from_email.clone(),
        reply_to: campaign.reply_to.clone(),
        html_content: campaign.html_content.clone(),
        text_content: campaign.text_content.clone(),
        scheduled_at: campaign.scheduled_at,
        send_immediately: campaign.send_immediately,
        track_opens: campaign.track_opens,
        track_clicks: campaign.track_clicks,
        track_unsubscribes: campaign.track_unsubscribes,
    }
}

pub fn list_campaigns<R>(
    repo: &R,
    user: &AuthenticatedUser,
    query: CampaignsQuery,
) -> ServiceResult<CampaignsPageData>
where
    R: UserReader + CampaignReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let page = query.page.unwrap_or(1).max(1);
    let per_page = repo
        .get_user_profile(user_id)?
        .map(|profile| profile.per_page())
        .unwrap_or(DEFAULT_ITEMS_PER_PAGE);
    let search_query = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let mut list_query = CampaignListQuery::new(user_id).paginate(page, per_page);
    if let Some(term) = &search_query {
        list_query = list_query.search(term.clone());
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        list_query = list_query.status(status.parse::<CampaignStatus>()?);
    }

    let (total, campaigns) = repo.list_campaigns(list_query).map_err(|err| {
        log::error!("Failed to list campaigns: {err}");
        err
    })?;

    Ok(CampaignsPageData {
        campaigns: Paginated::from_total(campaigns, page, total, per_page),
        total,
        search_query,
        status: query.status,
    })
}

pub fn campaign_form_data<R>(repo: &R, user: &AuthenticatedUser) -> ServiceResult<CampaignFormData>
where
    R: ContactListReader + EmailConfigReader + TemplateReader + ?Sized,
{
    let user_id = owner_id(user)?;
    Ok(CampaignFormData {
        lists: repo.list_contact_lists(user_id)?,
        email_configs: repo
            .list_email_configs(user_id)?
            .into_iter()
            .filter(|config| config.is_active)
            .collect(),
        templates: repo
            .list_templates(user_id)?
            .into_iter()
            .filter(|template| template.is_active)
            .collect(),
    })
}

pub fn get_campaign<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<CampaignDetail>
where
    R: CampaignReader + ContactListReader + EmailConfigReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let campaign = owned_campaign(repo, user_id, id)?;
    let list_ids = repo.get_campaign_list_ids(campaign.id)?;
    let lists: Vec<ContactList> = repo
        .list_contact_lists(user_id)?
        .into_iter()
        .filter(|list| list_ids.contains(&list.id))
        .collect();
    let email_config = match campaign.email_config_id {
        Some(config_id) => repo.get_email_config(config_id, user_id)?,
        None => None,
    };

    Ok(CampaignDetail {
        statistics: campaign.statistics(),
        campaign,
        lists,
        email_config,
    })
}

pub fn create_campaign<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: CampaignForm,
    meta: &RequestMeta,
) -> ServiceResult<EmailCampaign>
where
    R: UserReader
        + UserWriter
        + CampaignReader
        + CampaignWriter
        + ContactListReader
        + EmailConfigReader
        + TemplateReader
        + TemplateWriter
        + ?Sized,
{
    let user_id = owner_id(user)?;
    ensure_campaign_capacity(repo, user, user_id)?;

    let mut payload = form.into_payload(user_id)?;
    resolve_payload(repo, user_id, &mut payload)?;

    let campaign = repo
        .create_campaign(&payload.campaign, &payload.list_ids)
        .map_err(|err| {
            log::error!("Failed to create campaign: {err}");
            err
        })?;
    let campaign = refresh_recipient_count(repo, campaign)?;

    log_campaign_activity(
        repo,
        &campaign,
        ActivityType::CampaignCreated,
        format!("Created campaign {}", campaign.name),
        meta,
    );
    Ok(campaign)
}

pub fn update_campaign<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
    form: CampaignForm,
) -> ServiceResult<EmailCampaign>
where
    R: CampaignReader
        + CampaignWriter
        + ContactListReader
        + EmailConfigReader
        + TemplateReader
        + TemplateWriter
        + ?Sized,
{
    let user_id = owner_id(user)?;
    let campaign = owned_campaign(repo, user_id, id)?;
    if !campaign.is_editable() {
        return Err(ServiceError::InvalidState(
            "Only draft campaigns can be edited".to_string(),
        ));
    }

    let mut payload = form.into_payload(user_id)?;
    resolve_payload(repo, user_id, &mut payload)?;

    let updated = repo
        .update_campaign(campaign.id, &payload.campaign, &payload.list_ids)
        .map_err(|err| {
            log::error!("Failed to update campaign {}: {err}", campaign.id);
            err
        })?;
    refresh_recipient_count(repo, updated)
}

pub fn delete_campaign<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<()>
where
    R: CampaignReader + CampaignWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let campaign = owned_campaign(repo, user_id, id)?;
    if !DELETABLE.contains(&campaign.status) {
        return Err(ServiceError::InvalidState(
            "Cannot delete campaigns that have been sent or are currently sending.".to_string(),
        ));
    }
    repo.delete_campaign(campaign.id)?;
    Ok(())
}

/// Copies the template's subject and content into a draft.
pub fn apply_template<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
    template_id: i32,
) -> ServiceResult<EmailCampaign>
where
    R: CampaignReader + CampaignWriter + TemplateReader + TemplateWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let campaign = owned_campaign(repo, user_id, id)?;
    if !campaign.is_editable() {
        return Err(ServiceError::InvalidState(
            "Only draft campaigns can be edited".to_string(),
        ));
    }
    let template = repo
        .get_template(TemplateId::new(template_id)?, user_id)?
        .ok_or(ServiceError::NotFound)?;

    let mut updates = authoring_fields(&campaign);
    updates.template_id = Some(template.id);
    updates.subject = template.subject.clone();
    updates.html_content = template.html_content.clone();
    updates.text_content = template.text_content.clone();

    let list_ids = repo.get_campaign_list_ids(campaign.id)?;
    let updated = repo.update_campaign(campaign.id, &updates, &list_ids)?;
    repo.mark_template_used(template.id, now())?;
    Ok(updated)
}

/// Renders the queue rows for every recipient and moves the campaign to `SENDING`.
pub(crate) fn start_sending<R>(
    repo: &R,
    site: &Site,
    mut campaign: EmailCampaign,
    at: NaiveDateTime,
) -> ServiceResult<EmailCampaign>
where
    R: CampaignReader + CampaignWriter + QueueWriter + ?Sized,
{
    let recipients = repo.list_recipients(campaign.id)?;
    let rows = build_queue_rows(&campaign, &recipients, site, at);
    let queued = repo.enqueue_emails(&rows).map_err(|err| {
        log::error!("Failed to queue campaign {}: {err}", campaign.id);
        err
    })?;

    campaign.status = CampaignStatus::Sending;
    campaign.started_at = Some(at);
    campaign.recipient_count = i32::try_from(rows.len()).unwrap_or(i32::MAX);
    repo.save_campaign_status(&campaign)?;
    log::info!("Campaign {} queued {queued} emails", campaign.id);
    Ok(campaign)
}

/// Validates the campaign and either schedules it or queues it for delivery.
pub fn send_campaign<R, N>(
    repo: &R,
    notifier: &N,
    site: &Site,
    user: &AuthenticatedUser,
    id: i32,
    meta: &RequestMeta,
) -> ServiceResult<EmailCampaign>
where
    R: UserWriter
        + CampaignReader
        + CampaignWriter
        + EmailConfigReader
        + QueueWriter
        + ?Sized,
    N: WorkerNotifier + ?Sized,
{
    let user_id = owner_id(user)?;
    let mut campaign = owned_campaign(repo, user_id, id)?;
    let config: Option<EmailDomainConfig> = match campaign.email_config_id {
        Some(config_id) => repo.get_email_config(config_id, user_id)?,
        None => None,
    };
    let recipients = repo.count_recipients(campaign.id)?;
    campaign.validate_for_send(config.as_ref(), recipients)?;

    let at = now();
    let scheduled = campaign.should_schedule(at);
    let campaign = if scheduled {
        campaign.status = CampaignStatus::Scheduled;
        campaign.recipient_count = i32::try_from(recipients).unwrap_or(i32::MAX);
        repo.save_campaign_status(&campaign)?;
        campaign
    } else {
        let campaign = start_sending(repo, site, campaign, at)?;
        notify_worker(notifier, &WorkerMessage::ProcessQueue);
        campaign
    };

    let description = match campaign.scheduled_at {
        Some(when) if scheduled => format!("Scheduled campaign {} for {when}", campaign.name),
        _ => format!("Sent campaign {} to {} recipients", campaign.name, campaign.recipient_count),
    };
    log_campaign_activity(repo, &campaign, ActivityType::CampaignSent, description, meta);
    Ok(campaign)
}

/// Starts scheduled campaigns whose time has come. Campaigns whose sending
/// domain can no longer send are marked failed.
pub fn start_due_campaigns<R>(repo: &R, site: &Site, at: NaiveDateTime) -> ServiceResult<usize>
where
    R: CampaignReader + CampaignWriter + EmailConfigReader + QueueWriter + ?Sized,
{
    let mut started = 0;
    for mut campaign in repo.list_due_scheduled_campaigns(at)? {
        let config = match campaign.email_config_id {
            Some(config_id) => repo.find_email_config(config_id)?,
            None => None,
        };
        if !config.as_ref().is_some_and(|c| c.is_verified() && c.can_send()) {
            log::warn!(
                "Scheduled campaign {} cannot send: configuration unavailable",
                campaign.id
            );
            campaign.status = CampaignStatus::Failed;
            repo.save_campaign_status(&campaign)?;
            continue;
        }
        start_sending(repo, site, campaign, at)?;
        started += 1;
    }
    Ok(started)
}

pub fn pause_campaign<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<EmailCampaign>
where
    R: CampaignReader + CampaignWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let mut campaign = owned_campaign(repo, user_id, id)?;
    campaign.pause()?;
    repo.save_campaign_status(&campaign)?;
    Ok(campaign)
}

pub fn resume_campaign<R, N>(
    repo: &R,
    notifier: &N,
    user: &AuthenticatedUser,
    id: i32,
) -> ServiceResult<EmailCampaign>
where
    R: CampaignReader + CampaignWriter + ?Sized,
    N: WorkerNotifier + ?Sized,
{
    let user_id = owner_id(user)?;
    let mut campaign = owned_campaign(repo, user_id, id)?;
    campaign.resume()?;
    repo.save_campaign_status(&campaign)?;
    notify_worker(notifier, &WorkerMessage::ProcessQueue);
    Ok(campaign)
}

pub fn cancel_campaign<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<EmailCampaign>
where
    R: CampaignReader + CampaignWriter + QueueWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let mut campaign = owned_campaign(repo, user_id, id)?;
    campaign.cancel()?;
    let cancelled = repo.cancel_queued_emails(campaign.id)?;
    repo.save_campaign_status(&campaign)?;
    log::info!("Campaign {} cancelled, {cancelled} queued emails dropped", campaign.id);
    Ok(campaign)
}

pub fn duplicate_campaign<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
    meta: &RequestMeta,
) -> ServiceResult<EmailCampaign>
where
    R: UserReader + UserWriter + CampaignReader + CampaignWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let original = owned_campaign(repo, user_id, id)?;
    ensure_campaign_capacity(repo, user, user_id)?;

    let list_ids: Vec<ContactListId> = repo.get_campaign_list_ids(original.id)?;
    let copy = repo.create_campaign(&original.duplicate(), &list_ids)?;
    let copy = refresh_recipient_count(repo, copy)?;

    log_campaign_activity(
        repo,
        &copy,
        ActivityType::CampaignCreated,
        format!("Duplicated campaign {} as {}", original.name, copy.name),
        meta,
    );
    Ok(copy)
}

/// Stand-in recipient used when the user has no active contacts yet.
fn sample_recipient(user_id: UserId, at: NaiveDateTime) -> ServiceResult<Contact> {
    Ok(Contact {
        id: ContactId::new(1)?,
        user_id,
        email: EmailAddress::new("john.doe@example.com")?,
        first_name: Some("John".to_string()),
        last_name: Some("Doe".to_string()),
        phone: None,
        company: Some("Example Company".to_string()),
        job_title: None,
        website: None,
        city: Some("Douala".to_string()),
        country: Some("Cameroon".to_string()),
        notes: None,
        status: ContactStatus::Active,
        is_active: true,
        subscribed_at: at,
        unsubscribed_at: None,
        unsubscribe_reason: None,
        source: ContactSource::Manual,
        referrer: None,
        utm_source: None,
        utm_medium: None,
        utm_campaign: None,
        custom_fields: Default::default(),
        engagement_score: 0.0,
        total_emails_received: 0,
        total_emails_opened: 0,
        total_emails_clicked: 0,
        last_email_opened_at: None,
        last_email_clicked_at: None,
        created_at: at,
        updated_at: at,
    })
}

/// Personalizes the campaign against the user's first active contact.
pub fn preview_campaign<R>(
    repo: &R,
    site: &Site,
    user: &AuthenticatedUser,
    id: i32,
) -> ServiceResult<CampaignPreview>
where
    R: CampaignReader + ContactReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let campaign = owned_campaign(repo, user_id, id)?;
    let (_, contacts) = repo.list_contacts(
        ContactListQuery::new(user_id)
            .status(ContactStatus::Active)
            .paginate(1, 1),
    )?;
    let contact = match contacts.into_iter().next() {
        Some(contact) => contact,
        None => sample_recipient(user_id, now())?,
    };
    let unsubscribe_url = site.url(&format!(
        "/unsubscribe/{}/",
        TrackingToken::unsubscribe(campaign.id, contact.id)
    ));

    Ok(CampaignPreview {
        recipient: contact.email.to_string(),
        subject: personalize(&campaign.subject, &contact, &unsubscribe_url),
        html: personalize(&campaign.html_content, &contact, &unsubscribe_url),
        text: campaign
            .text_content
            .as_deref()
            .map(|text| personalize(text, &contact, &unsubscribe_url)),
    })
}

/// Lifecycle milestones followed by per-hour event activity, oldest first.
pub fn build_timeline(campaign: &EmailCampaign, events: &[EmailEvent]) -> Vec<TimelineEntry> {
    let mut timeline = vec![TimelineEntry {
        at: campaign.created_at,
        label: "Campaign Created".to_string(),
        count: 0,
    }];
    if let Some(at) = campaign.started_at {
        timeline.push(TimelineEntry {
            at,
            label: "Sending Started".to_string(),
            count: i64::from(campaign.recipient_count),
        });
    }
    if let Some(at) = campaign.completed_at {
        timeline.push(TimelineEntry {
            at,
            label: "Sending Completed".to_string(),
            count: i64::from(campaign.emails_sent),
        });
    }

    let mut hourly: BTreeMap<NaiveDateTime, i64> = BTreeMap::new();
    for event in events {
        let hour = event
            .created_at
            .with_minute(0)
            .and_then(|at| at.with_second(0))
            .and_then(|at| at.with_nanosecond(0))
            .unwrap_or(event.created_at);
        *hourly.entry(hour).or_default() += 1;
    }
    timeline.extend(hourly.into_iter().map(|(at, count)| TimelineEntry {
        at,
        label: "Email Activity".to_string(),
        count,
    }));

    timeline.sort_by_key(|entry| entry.at);
    timeline
}

pub fn campaign_analytics<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
) -> ServiceResult<CampaignAnalyticsPage>
where
    R: CampaignReader + EventReader + AnalyticsReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let campaign = owned_campaign(repo, user_id, id)?;
    let events = repo.list_campaign_events(campaign.id)?;

    Ok(CampaignAnalyticsPage {
        statistics: campaign.statistics(),
        timeline: build_timeline(&campaign, &events),
        daily: repo.list_campaign_analytics(campaign.id)?,
        campaign,
    })
}

/// Totals over the campaigns created in the last [`SUMMARY_DAYS`] days.
pub fn campaign_summary<R>(repo: &R, user: &AuthenticatedUser) -> ServiceResult<CampaignSummary>
where
    R: CampaignReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let since = now() - Duration::days(SUMMARY_DAYS);
    let (_, campaigns) =
        repo.list_campaigns(CampaignListQuery::new(user_id).created_since(since))?;
    Ok(CampaignSummary::from_campaigns(&campaigns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::campaign::tests::sample_campaign;
    use crate::domain::contact::tests::now as fixed_now;
    use crate::domain::event::EventType;
    use crate::domain::types::EventId;

    fn event(minutes: i64) -> EmailEvent {
        EmailEvent {
            id: EventId::new(1).unwrap(),
            campaign_id: CampaignId::new(5).unwrap(),
            contact_id: ContactId::new(7).unwrap(),
            event_type: EventType::Opened,
            ip_address: None,
            user_agent: None,
            clicked_url: None,
            bounce_type: None,
            bounce_reason: None,
            data: serde_json::json!({}),
            created_at: fixed_now() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn timeline_groups_events_by_hour() {
        let mut campaign = sample_campaign(CampaignStatus::Sent);
        campaign.started_at = Some(fixed_now() + Duration::minutes(5));
        campaign.completed_at = Some(fixed_now() + Duration::minutes(90));
        campaign.emails_sent = 3;

        let timeline = build_timeline(&campaign, &[event(10), event(50), event(70)]);
        let labels: Vec<(&str, i64)> = timeline
            .iter()
            .map(|entry| (entry.label.as_str(), entry.count))
            .collect();

        assert_eq!(
            labels,
            vec![
                ("Campaign Created", 0),
                ("Email Activity", 2),
                ("Sending Started", 0),
                ("Email Activity", 1),
                ("Sending Completed", 3),
            ]
        );
    }

    #[test]
    fn authoring_fields_keep_content() {
        let campaign = sample_campaign(CampaignStatus::Draft);
        let fields = authoring_fields(&campaign);
        assert_eq!(fields.name, campaign.name);
        assert_eq!(fields.html_content, campaign.html_content);
        assert!(fields.send_immediately);
    }
}

#[cfg(all(test, feature = "test-mocks"))]
mod service_tests {
    use super::*;
    use crate::domain::campaign::tests::sample_campaign;
    use crate::domain::contact::tests::sample_contact;
    use crate::domain::email_config::VerificationStatus;
    use crate::domain::email_config::tests::sample_config;
    use crate::repository::mock::MockRepository;
    use crate::services::test_support::{admin_user, client_user, site};
    use crate::zmq::MockWorkerNotifier;

    fn draft_repo() -> MockRepository {
        let mut repo = MockRepository::new();
        repo.expect_get_campaign()
            .returning(|_, _| Ok(Some(sample_campaign(CampaignStatus::Draft))));
        repo
    }

    #[test]
    fn sending_queues_every_recipient_and_wakes_worker() {
        let mut repo = draft_repo();
        repo.expect_get_email_config()
            .returning(|_, _| Ok(Some(sample_config(VerificationStatus::Verified))));
        repo.expect_count_recipients().returning(|_| Ok(2));
        repo.expect_list_recipients().returning(|_| {
            Ok(vec![
                sample_contact(1, "a@example.com"),
                sample_contact(2, "b@example.com"),
            ])
        });
        repo.expect_enqueue_emails()
            .withf(|rows| rows.len() == 2 && rows[0].subject == "Hello A")
            .times(1)
            .returning(|rows| Ok(rows.len()));
        repo.expect_save_campaign_status()
            .withf(|c| {
                c.status == CampaignStatus::Sending
                    && c.started_at.is_some()
                    && c.recipient_count == 2
            })
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_log_activity()
            .withf(|a| a.activity_type == ActivityType::CampaignSent)
            .times(1)
            .returning(|_| Ok(()));
        let mut notifier = MockWorkerNotifier::new();
        notifier
            .expect_notify()
            .withf(|message| *message == WorkerMessage::ProcessQueue)
            .times(1)
            .returning(|_| Ok(()));

        let campaign = send_campaign(
            &repo,
            &notifier,
            &site(),
            &client_user(),
            5,
            &RequestMeta::default(),
        )
        .unwrap();
        assert_eq!(campaign.status, CampaignStatus::Sending);
    }

    #[test]
    fn future_campaigns_are_only_scheduled() {
        let mut repo = MockRepository::new();
        repo.expect_get_campaign().returning(|_, _| {
            let mut campaign = sample_campaign(CampaignStatus::Draft);
            campaign.send_immediately = false;
            campaign.scheduled_at = Some(now() + Duration::days(2));
            Ok(Some(campaign))
        });
        repo.expect_get_email_config()
            .returning(|_, _| Ok(Some(sample_config(VerificationStatus::Verified))));
        repo.expect_count_recipients().returning(|_| Ok(10));
        repo.expect_enqueue_emails().times(0);
        repo.expect_save_campaign_status()
            .withf(|c| c.status == CampaignStatus::Scheduled && c.recipient_count == 10)
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_log_activity().returning(|_| Ok(()));
        let mut notifier = MockWorkerNotifier::new();
        notifier.expect_notify().times(0);

        let campaign = send_campaign(
            &repo,
            &notifier,
            &site(),
            &client_user(),
            5,
            &RequestMeta::default(),
        )
        .unwrap();
        assert_eq!(campaign.status, CampaignStatus::Scheduled);
    }

    #[test]
    fn unverified_domain_blocks_sending() {
        let mut repo = draft_repo();
        repo.expect_get_email_config()
            .returning(|_, _| Ok(Some(sample_config(VerificationStatus::Pending))));
        repo.expect_count_recipients().returning(|_| Ok(3));
        repo.expect_save_campaign_status().times(0);
        let notifier = MockWorkerNotifier::new();

        let err = send_campaign(
            &repo,
            &notifier,
            &site(),
            &client_user(),
            5,
            &RequestMeta::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Email domain is not verified");
    }

    #[test]
    fn monthly_campaign_limit_is_enforced() {
        let mut repo = MockRepository::new();
        repo.expect_count_campaigns_since()
            .returning(|_, _| Ok(i64::from(UserProfile::DEFAULT_MAX_CAMPAIGNS_PER_MONTH)));
        repo.expect_get_user_profile().returning(|_| Ok(None));
        repo.expect_create_campaign().times(0);
        let form = CampaignForm {
            name: "Launch".into(),
            ..CampaignForm::default()
        };

        let result = create_campaign(&repo, &client_user(), form, &RequestMeta::default());
        assert!(matches!(result, Err(ServiceError::LimitExceeded(_))));
    }

    #[test]
    fn super_admin_skips_campaign_limit() {
        let mut repo = MockRepository::new();
        repo.expect_count_campaigns_since().times(0);
        repo.expect_create_campaign()
            .returning(|_, _| Ok(sample_campaign(CampaignStatus::Draft)));
        repo.expect_count_recipients().returning(|_| Ok(0));
        repo.expect_save_campaign_status().returning(|_| Ok(()));
        repo.expect_log_activity()
            .withf(|a| a.activity_type == ActivityType::CampaignCreated)
            .times(1)
            .returning(|_| Ok(()));
        let form = CampaignForm {
            name: "Launch".into(),
            ..CampaignForm::default()
        };

        assert!(create_campaign(&repo, &admin_user(), form, &RequestMeta::default()).is_ok());
    }

    #[test]
    fn foreign_list_is_rejected_on_create() {
        let mut repo = MockRepository::new();
        repo.expect_count_campaigns_since().returning(|_, _| Ok(0));
        repo.expect_get_user_profile().returning(|_| Ok(None));
        repo.expect_get_contact_list().returning(|_, _| Ok(None));
        repo.expect_create_campaign().times(0);
        let form = CampaignForm {
            name: "Launch".into(),
            list_ids: vec![42],
            ..CampaignForm::default()
        };

        let result = create_campaign(&repo, &client_user(), form, &RequestMeta::default());
        assert!(matches!(result, Err(ServiceError::NotFound)));
    }

    #[test]
    fn sent_campaigns_cannot_be_deleted() {
        let mut repo = MockRepository::new();
        repo.expect_get_campaign()
            .returning(|_, _| Ok(Some(sample_campaign(CampaignStatus::Sent))));
        repo.expect_delete_campaign().times(0);

        assert!(matches!(
            delete_campaign(&repo, &client_user(), 5),
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[test]
    fn cancelling_drops_queued_rows() {
        let mut repo = MockRepository::new();
        repo.expect_get_campaign()
            .returning(|_, _| Ok(Some(sample_campaign(CampaignStatus::Paused))));
        repo.expect_cancel_queued_emails().times(1).returning(|_| Ok(4));
        repo.expect_save_campaign_status()
            .withf(|c| c.status == CampaignStatus::Cancelled)
            .times(1)
            .returning(|_| Ok(()));

        let campaign = cancel_campaign(&repo, &client_user(), 5).unwrap();
        assert_eq!(campaign.status, CampaignStatus::Cancelled);
    }

    #[test]
    fn pausing_a_draft_is_invalid() {
        let mut repo = draft_repo();
        repo.expect_save_campaign_status().times(0);

        let err = pause_campaign(&repo, &client_user(), 5).unwrap_err();
        assert_eq!(err.to_string(), "Only sending campaigns can be paused");
    }

    #[test]
    fn preview_falls_back_to_sample_recipient() {
        let mut repo = draft_repo();
        repo.expect_list_contacts().returning(|_| Ok((0, vec![])));

        let preview = preview_campaign(&repo, &site(), &client_user(), 5).unwrap();
        assert_eq!(preview.recipient, "john.doe@example.com");
        assert_eq!(preview.subject, "Hello John");
    }

    #[test]
    fn due_campaign_without_usable_domain_fails() {
        let mut repo = MockRepository::new();
        repo.expect_list_due_scheduled_campaigns()
            .returning(|_| Ok(vec![sample_campaign(CampaignStatus::Scheduled)]));
        repo.expect_find_email_config()
            .returning(|_| Ok(Some(sample_config(VerificationStatus::Failed))));
        repo.expect_enqueue_emails().times(0);
        repo.expect_save_campaign_status()
            .withf(|c| c.status == CampaignStatus::Failed)
            .times(1)
            .returning(|_| Ok(()));

        assert_eq!(start_due_campaigns(&repo, &site(), now()).unwrap(), 0);
    }
}
