//! Message rendering and the queue processor run by the worker.
//!
//! Rendering personalizes a campaign for one contact and adds the open pixel
//! and click redirects. Processing claims due queue rows, delivers them
//! through the sender's SMTP relay and books the outcome on the row, the
//! campaign, the contact and the sending domain.

use std::collections::HashMap;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{Duration, NaiveDateTime};
use regex::{Captures, Regex};
use thiserror::Error;

use crate::domain::campaign::{CampaignStatus, EmailCampaign};
use crate::domain::contact::Contact;
use crate::domain::email_config::EmailDomainConfig;
use crate::domain::queue::{
    BATCH_SIZE, DEFAULT_MAX_ATTEMPTS, FailureOutcome, NewQueuedEmail, QueueStatus, QueuedEmail,
    STALE_CLAIM_MINUTES,
};
use crate::domain::types::{CampaignId, ContactId, EmailConfigId};
use crate::mailer::{MailError, Mailer, OutgoingEmail, relay_for_config};
use crate::models::config::SmtpSettings;
use crate::models::zmq::PlatformEmail;
use crate::repository::{
    CampaignReader, CampaignWriter, EmailConfigReader, QueueReader, QueueWriter,
};
use crate::services::{ServiceResult, Site};

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s+href="([^"]+)"([^>]*)>(.*?)</a>"#).expect("valid link pattern")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackingTokenError {
    #[error("tracking token is not valid base64")]
    Encoding,

    #[error("tracking token is malformed")]
    Malformed,
}

/// Decoded `campaign:contact[:extra]` tracking payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingToken {
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    /// Timestamp for opens, target URL for clicks, empty for unsubscribes.
    pub extra: String,
}

impl TrackingToken {
    fn encode(payload: &str) -> String {
        URL_SAFE.encode(payload)
    }

    pub fn open(campaign_id: CampaignId, contact_id: ContactId, at: NaiveDateTime) -> String {
        Self::encode(&format!(
            "{campaign_id}:{contact_id}:{}",
            at.and_utc().timestamp()
        ))
    }

    pub fn click(campaign_id: CampaignId, contact_id: ContactId, url: &str) -> String {
        Self::encode(&format!("{campaign_id}:{contact_id}:{url}"))
    }

    pub fn unsubscribe(campaign_id: CampaignId, contact_id: ContactId) -> String {
        Self::encode(&format!("{campaign_id}:{contact_id}"))
    }

    pub fn decode(token: &str) -> Result<Self, TrackingTokenError> {
        let token = token.trim().trim_end_matches('/');
        let bytes = URL_SAFE
            .decode(token)
            .or_else(|_| URL_SAFE_NO_PAD.decode(token.trim_end_matches('=')))
            .map_err(|_| TrackingTokenError::Encoding)?;
        let payload = String::from_utf8(bytes).map_err(|_| TrackingTokenError::Encoding)?;

        let mut parts = payload.splitn(3, ':');
        let mut id = || -> Result<i32, TrackingTokenError> {
            parts
                .next()
                .and_then(|part| part.parse::<i32>().ok())
                .ok_or(TrackingTokenError::Malformed)
        };
        let campaign_id = CampaignId::new(id()?).map_err(|_| TrackingTokenError::Malformed)?;
        let contact_id = ContactId::new(id()?).map_err(|_| TrackingTokenError::Malformed)?;
        let extra = parts.next().unwrap_or_default().to_string();

        Ok(Self {
            campaign_id,
            contact_id,
            extra,
        })
    }
}

/// Replaces `{{placeholder}}` markers with the contact's data.
pub fn personalize(content: &str, contact: &Contact, unsubscribe_url: &str) -> String {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let first_name = contact
        .first_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| contact.short_name());

    let mut replacements: Vec<(String, String)> = vec![
        ("{{first_name}}".into(), first_name),
        ("{{last_name}}".into(), text(&contact.last_name)),
        ("{{full_name}}".into(), contact.full_name()),
        ("{{email}}".into(), contact.email.to_string()),
        ("{{company}}".into(), text(&contact.company)),
        ("{{city}}".into(), text(&contact.city)),
        ("{{country}}".into(), text(&contact.country)),
        ("{{unsubscribe_url}}".into(), unsubscribe_url.to_string()),
    ];
    replacements.extend(
        contact
            .custom_fields
            .iter()
            .map(|(key, value)| (format!("{{{{{key}}}}}"), value.clone())),
    );

    replacements
        .iter()
        .fold(content.to_string(), |acc, (placeholder, value)| {
            acc.replace(placeholder, value)
        })
}

/// Inserts the invisible open-tracking image before `</body>`, or appends it.
pub fn add_open_pixel(html: &str, pixel_url: &str) -> String {
    let pixel =
        format!(r#"<img src="{pixel_url}" width="1" height="1" style="display:none;" />"#);
    if html.contains("</body>") {
        html.replacen("</body>", &format!("{pixel}</body>"), 1)
    } else {
        format!("{html}{pixel}")
    }
}

/// Points every link except unsubscribe and tracking links at the click redirect.
pub fn add_click_tracking(
    html: &str,
    site: &Site,
    campaign_id: CampaignId,
    contact_id: ContactId,
) -> String {
    LINK_PATTERN
        .replace_all(html, |caps: &Captures| {
            let url = &caps[1];
            if url.to_lowercase().contains("unsubscribe") || url.contains("track/") {
                return caps[0].to_string();
            }
            let token = TrackingToken::click(campaign_id, contact_id, url);
            format!(
                r#"<a href="{}"{}>{}</a>"#,
                site.url(&format!("/track/click/{token}/")),
                &caps[2],
                &caps[3]
            )
        })
        .into_owned()
}

/// A campaign message rendered for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

pub fn render_for_contact(
    campaign: &EmailCampaign,
    contact: &Contact,
    site: &Site,
    now: NaiveDateTime,
) -> RenderedEmail {
    let unsubscribe_url = site.url(&format!(
        "/unsubscribe/{}/",
        TrackingToken::unsubscribe(campaign.id, contact.id)
    ));

    let mut html = personalize(&campaign.html_content, contact, &unsubscribe_url);
    if campaign.track_clicks {
        html = add_click_tracking(&html, site, campaign.id, contact.id);
    }
    if campaign.track_opens {
        let token = TrackingToken::open(campaign.id, contact.id, now);
        html = add_open_pixel(&html, &site.url(&format!("/track/open/{token}/")));
    }

    RenderedEmail {
        subject: personalize(&campaign.subject, contact, &unsubscribe_url),
        html,
        text: campaign
            .text_content
            .as_deref()
            .map(|text| personalize(text, contact, &unsubscribe_url)),
    }
}

/// One queue row per recipient, due immediately.
pub fn build_queue_rows(
    campaign: &EmailCampaign,
    recipients: &[Contact],
    site: &Site,
    now: NaiveDateTime,
) -> Vec<NewQueuedEmail> {
    recipients
        .iter()
        .map(|contact| {
            let rendered = render_for_contact(campaign, contact, site, now);
            NewQueuedEmail {
                campaign_id: campaign.id,
                contact_id: contact.id,
                recipient_email: contact.email.clone(),
                subject: rendered.subject,
                html_content: rendered.html,
                text_content: rendered.text,
                priority: campaign.priority.queue_priority(),
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                scheduled_at: now,
            }
        })
        .collect()
}

fn outgoing(campaign: &EmailCampaign, config: &EmailDomainConfig, row: &QueuedEmail) -> OutgoingEmail {
    let from_email = if campaign.from_email.trim().is_empty() {
        config.from_email.to_string()
    } else {
        campaign.from_email.clone()
    };
    let from_name = if campaign.from_name.trim().is_empty() {
        config.from_name.clone()
    } else {
        campaign.from_name.clone()
    };
    let from = if from_name.trim().is_empty() {
        from_email
    } else {
        format!("{from_name} <{from_email}>")
    };

    OutgoingEmail {
        from,
        reply_to: campaign
            .reply_to
            .clone()
            .or_else(|| config.reply_to.as_ref().map(ToString::to_string)),
        to: row.recipient_email.to_string(),
        subject: row.subject.clone(),
        html: row.html_content.clone(),
        text: row.text_content.clone(),
    }
}

/// Outcome of one queue pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueRunReport {
    /// Stale claims handed back before claiming.
    pub released: usize,
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    /// Rows whose bookkeeping failed and went back to the queue.
    pub errors: usize,
    pub completed_campaigns: usize,
}

struct BatchContext {
    campaigns: HashMap<CampaignId, Option<EmailCampaign>>,
    configs: HashMap<EmailConfigId, Option<EmailDomainConfig>>,
}

impl BatchContext {
    fn campaign<R>(&mut self, repo: &R, id: CampaignId) -> ServiceResult<Option<EmailCampaign>>
    where
        R: CampaignReader + ?Sized,
    {
        if let Some(cached) = self.campaigns.get(&id) {
            return Ok(cached.clone());
        }
        let campaign = repo.find_campaign(id)?;
        self.campaigns.insert(id, campaign.clone());
        Ok(campaign)
    }

    fn config<R>(&mut self, repo: &R, id: EmailConfigId) -> ServiceResult<Option<EmailDomainConfig>>
    where
        R: EmailConfigReader + ?Sized,
    {
        if let Some(cached) = self.configs.get(&id) {
            return Ok(cached.clone());
        }
        let config = repo.find_email_config(id)?;
        self.configs.insert(id, config.clone());
        Ok(config)
    }

    /// Keeps the cached quota in step with what was just sent.
    fn count_send(&mut self, id: EmailConfigId) {
        if let Some(Some(config)) = self.configs.get_mut(&id) {
            config.emails_sent_today += 1;
            config.emails_sent_this_month += 1;
        }
    }
}

/// What one claimed row ended up as.
enum Delivery {
    Sent,
    Retrying,
    GaveUp,
}

/// Sends one claimed row and books the outcome.
fn deliver<R, M>(
    repo: &R,
    mailer: &M,
    context: &mut BatchContext,
    mut row: QueuedEmail,
    now: NaiveDateTime,
) -> ServiceResult<Delivery>
where
    R: CampaignReader + EmailConfigReader + QueueWriter + ?Sized,
    M: Mailer + ?Sized,
{
    let campaign = context.campaign(repo, row.campaign_id)?;
    let config = match campaign.as_ref().and_then(|c| c.email_config_id) {
        Some(id) => context.config(repo, id)?,
        None => None,
    };

    let result = match (&campaign, &config) {
        (Some(campaign), Some(config)) if config.can_send() => mailer
            .send(&relay_for_config(config), &outgoing(campaign, config, &row))
            .map(|()| config.id),
        (Some(_), Some(_)) => Err(MailError::Smtp(
            "Email configuration has reached sending limits".into(),
        )),
        _ => Err(MailError::Build("Campaign or email configuration missing".into())),
    };

    match result {
        Ok(config_id) => {
            row.mark_sent(now);
            repo.complete_delivery(&row, config_id, now)?;
            context.count_send(config_id);
            Ok(Delivery::Sent)
        }
        Err(err) => {
            log::warn!("Delivery to {} failed: {err}", row.recipient_email);
            match row.mark_failed(err.to_string(), now) {
                FailureOutcome::Retry { at } => {
                    repo.update_queued_email(&row, now)?;
                    log::info!("Queued email {} will be retried at {at}", row.id);
                    Ok(Delivery::Retrying)
                }
                FailureOutcome::GaveUp => {
                    repo.give_up_delivery(&row, now)?;
                    Ok(Delivery::GaveUp)
                }
            }
        }
    }
}

/// Hands a claimed row back to the queue after its bookkeeping failed.
fn release_claim<R>(repo: &R, mut row: QueuedEmail, now: NaiveDateTime)
where
    R: QueueWriter + ?Sized,
{
    row.status = QueueStatus::Retrying;
    if let Err(err) = repo.update_queued_email(&row, now) {
        log::error!("Failed to release queued email {}: {err}", row.id);
    }
}

/// Delivers one batch of due queue rows and completes drained campaigns.
///
/// A row whose bookkeeping fails goes back to `RETRYING` and the batch moves
/// on. Rows left in `SENDING` by an interrupted pass are released once they
/// are older than [`STALE_CLAIM_MINUTES`].
pub fn process_queue<R, M>(repo: &R, mailer: &M, now: NaiveDateTime) -> ServiceResult<QueueRunReport>
where
    R: CampaignReader
        + CampaignWriter
        + EmailConfigReader
        + QueueReader
        + QueueWriter
        + ?Sized,
    M: Mailer + ?Sized,
{
    let released = repo
        .release_stale_claims(now - Duration::minutes(STALE_CLAIM_MINUTES), now)
        .map_err(|err| {
            log::error!("Failed to release stale queue claims: {err}");
            err
        })?;
    if released > 0 {
        log::warn!("Released {released} stale queue claims");
    }

    let rows = repo.claim_due_emails(now, BATCH_SIZE as i64).map_err(|err| {
        log::error!("Failed to claim queued emails: {err}");
        err
    })?;
    let mut report = QueueRunReport {
        released,
        claimed: rows.len(),
        ..QueueRunReport::default()
    };
    let mut context = BatchContext {
        campaigns: HashMap::new(),
        configs: HashMap::new(),
    };

    for row in rows {
        let claimed = row.clone();
        match deliver(repo, mailer, &mut context, row, now) {
            Ok(Delivery::Sent) => report.sent += 1,
            Ok(Delivery::Retrying) => report.retried += 1,
            Ok(Delivery::GaveUp) => report.failed += 1,
            Err(err) => {
                log::error!("Queued email {} returned to the queue: {err}", claimed.id);
                release_claim(repo, claimed, now);
                report.errors += 1;
            }
        }
    }

    report.completed_campaigns = complete_finished_campaigns(repo, now)?;
    if report.claimed > 0 {
        log::info!(
            "Queue pass: {} claimed, {} sent, {} retrying, {} failed, {} errors",
            report.claimed,
            report.sent,
            report.retried,
            report.failed,
            report.errors
        );
    }
    Ok(report)
}

/// Marks sending campaigns without outstanding rows as sent.
pub fn complete_finished_campaigns<R>(repo: &R, now: NaiveDateTime) -> ServiceResult<usize>
where
    R: CampaignReader + CampaignWriter + QueueReader + ?Sized,
{
    let mut completed = 0;
    for mut campaign in repo.list_campaigns_by_status(CampaignStatus::Sending)? {
        if repo.count_outstanding(campaign.id)? > 0 {
            continue;
        }
        campaign.status = CampaignStatus::Sent;
        campaign.completed_at = Some(now);
        repo.save_campaign_status(&campaign)?;
        log::info!("Campaign {} completed", campaign.id);
        completed += 1;
    }
    Ok(completed)
}

/// Sends a transactional platform message through the configured relay.
pub fn send_platform_email<M>(
    mailer: &M,
    relay: &SmtpSettings,
    from: &str,
    email: &PlatformEmail,
) -> Result<(), MailError>
where
    M: Mailer + ?Sized,
{
    mailer.send(
        relay,
        &OutgoingEmail {
            from: from.to_string(),
            reply_to: None,
            to: email.to.clone(),
            subject: email.subject.clone(),
            html: email.html.clone(),
            text: Some(email.text.clone()),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::campaign::tests::sample_campaign;
    use crate::domain::contact::tests::{now, sample_contact};

    fn site() -> Site {
        Site {
            base_url: "https://app.afrimailpro.com".into(),
            platform_name: "AfriMail Pro".into(),
        }
    }

    #[test]
    fn placeholders_fall_back_to_short_name() {
        let mut contact = sample_contact(7, "john.doe@example.com");
        contact.company = Some("Orange".into());
        contact.custom_fields.insert("plan".into(), "gold".into());

        let text = personalize(
            "Hi {{first_name}} {{last_name}} from {{company}} ({{plan}}) {{unsubscribe_url}}",
            &contact,
            "https://u",
        );
        assert_eq!(text, "Hi John.Doe  from Orange (gold) https://u");
    }

    #[test]
    fn pixel_goes_before_closing_body() {
        assert_eq!(
            add_open_pixel("<body><p>x</p></body>", "https://t/p"),
            r#"<body><p>x</p><img src="https://t/p" width="1" height="1" style="display:none;" /></body>"#
        );
        assert!(add_open_pixel("<p>x</p>", "https://t/p").starts_with("<p>x</p><img"));
    }

    #[test]
    fn links_are_rewritten_except_unsubscribe() {
        let html = r#"<A HREF="https://shop.cm/deal" class="btn">Shop
now</A> <a href="https://app/unsubscribe/x/">Unsubscribe</a>"#;
        let campaign_id = CampaignId::new(5).unwrap();
        let contact_id = ContactId::new(7).unwrap();

        let tracked = add_click_tracking(html, &site(), campaign_id, contact_id);
        let token = TrackingToken::click(campaign_id, contact_id, "https://shop.cm/deal");

        assert!(tracked.contains(&format!(
            r#"<a href="https://app.afrimailpro.com/track/click/{token}/" class="btn">Shop
now</a>"#
        )));
        assert!(tracked.contains(r#"<a href="https://app/unsubscribe/x/">Unsubscribe</a>"#));
    }

    #[test]
    fn click_tokens_keep_urls_with_colons() {
        let token = TrackingToken::click(
            CampaignId::new(5).unwrap(),
            ContactId::new(7).unwrap(),
            "https://shop.cm:8443/a?b=c",
        );
        let decoded = TrackingToken::decode(&token).unwrap();
        assert_eq!(decoded.campaign_id.get(), 5);
        assert_eq!(decoded.contact_id.get(), 7);
        assert_eq!(decoded.extra, "https://shop.cm:8443/a?b=c");
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert_eq!(TrackingToken::decode("%%%"), Err(TrackingTokenError::Encoding));
        let not_ids = URL_SAFE.encode("a:b");
        assert_eq!(TrackingToken::decode(&not_ids), Err(TrackingTokenError::Malformed));
        let zero = URL_SAFE.encode("0:4");
        assert_eq!(TrackingToken::decode(&zero), Err(TrackingTokenError::Malformed));
    }

    #[test]
    fn rendering_applies_personalization_then_tracking() {
        let mut campaign = sample_campaign(CampaignStatus::Draft);
        campaign.html_content =
            r#"<html><body><a href="https://x.cm/{{first_name}}">Go</a></body></html>"#.into();
        campaign.text_content = Some("Hi {{first_name}}".into());
        let mut contact = sample_contact(7, "awa@example.com");
        contact.first_name = Some("Awa".into());

        let rendered = render_for_contact(&campaign, &contact, &site(), now());
        let click = TrackingToken::click(campaign.id, contact.id, "https://x.cm/Awa");

        assert_eq!(rendered.subject, "Hello Awa");
        assert_eq!(rendered.text.as_deref(), Some("Hi Awa"));
        assert!(rendered.html.contains(&format!("/track/click/{click}/")));
        assert!(rendered.html.contains("/track/open/"));
    }

    #[test]
    fn queue_rows_use_campaign_priority() {
        let mut campaign = sample_campaign(CampaignStatus::Draft);
        campaign.priority = crate::domain::campaign::CampaignPriority::High;
        let rows = build_queue_rows(
            &campaign,
            &[sample_contact(1, "a@example.com"), sample_contact(2, "b@example.com")],
            &site(),
            now(),
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].priority, 1);
        assert_eq!(rows[1].recipient_email.as_str(), "b@example.com");
        assert_eq!(rows[0].max_attempts, DEFAULT_MAX_ATTEMPTS);
    }
}

#[cfg(all(test, feature = "test-mocks"))]
mod service_tests {
    use super::*;
    use crate::domain::campaign::tests::sample_campaign;
    use crate::domain::contact::tests::now;
    use crate::domain::email_config::VerificationStatus;
    use crate::domain::email_config::tests::sample_config;
    use crate::domain::types::{EmailAddress, QueuedEmailId};
    use crate::mailer::MockMailer;
    use crate::repository::errors::RepositoryError;
    use crate::repository::mock::MockRepository;

    fn queued(id: i32, attempts: i32) -> QueuedEmail {
        QueuedEmail {
            id: QueuedEmailId::new(id).unwrap(),
            campaign_id: CampaignId::new(5).unwrap(),
            contact_id: ContactId::new(7).unwrap(),
            recipient_email: EmailAddress::new("awa@example.com").unwrap(),
            subject: "Hello Awa".into(),
            html_content: "<p>Hi</p>".into(),
            text_content: None,
            status: QueueStatus::Sending,
            priority: 5,
            attempts,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            error_message: None,
            scheduled_at: now(),
            sent_at: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn base_repo(rows: Vec<QueuedEmail>) -> MockRepository {
        let mut repo = MockRepository::new();
        repo.expect_release_stale_claims()
            .withf(|before, at| *at - *before == Duration::minutes(STALE_CLAIM_MINUTES))
            .times(1)
            .returning(|_, _| Ok(0));
        repo.expect_claim_due_emails()
            .times(1)
            .return_once(move |_, _| Ok(rows));
        repo.expect_find_campaign()
            .returning(|_| Ok(Some(sample_campaign(CampaignStatus::Sending))));
        repo.expect_find_email_config()
            .times(1)
            .returning(|_| Ok(Some(sample_config(VerificationStatus::Verified))));
        repo.expect_list_campaigns_by_status().returning(|_| Ok(vec![]));
        repo
    }

    #[test]
    fn successful_delivery_is_booked_in_one_call() {
        let mut repo = base_repo(vec![queued(1, 0)]);
        repo.expect_complete_delivery()
            .withf(|row, config_id, _| {
                row.status == QueueStatus::Sent && row.sent_at.is_some() && config_id.get() == 3
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        repo.expect_update_queued_email().times(0);
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|_, email| {
                email.to == "awa@example.com" && email.from == "TechStartup <news@techstartup.cm>"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let report = process_queue(&repo, &mailer, now()).unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn failures_retry_then_give_up() {
        let mut repo = base_repo(vec![queued(1, 0), queued(2, 2)]);
        repo.expect_update_queued_email()
            .withf(|row, _| row.status == QueueStatus::Retrying && row.attempts == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        repo.expect_give_up_delivery()
            .withf(|row, _| row.status == QueueStatus::Failed && row.error_message.is_some())
            .times(1)
            .returning(|_, _| Ok(()));
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(2)
            .returning(|_, _| Err(MailError::Smtp("451 try later".into())));

        let report = process_queue(&repo, &mailer, now()).unwrap();
        assert_eq!(report.retried, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 0);
    }

    #[test]
    fn bookkeeping_errors_release_the_row_and_continue() {
        let mut repo = base_repo(vec![queued(1, 0), queued(2, 0)]);
        let mut calls = 0;
        repo.expect_complete_delivery()
            .times(2)
            .returning(move |_, _, _| {
                calls += 1;
                if calls == 1 {
                    Err(RepositoryError::DatabaseError("database is locked".into()))
                } else {
                    Ok(())
                }
            });
        repo.expect_update_queued_email()
            .withf(|row, _| {
                row.id.get() == 1 && row.status == QueueStatus::Retrying && row.sent_at.is_none()
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(2).returning(|_, _| Ok(()));

        let report = process_queue(&repo, &mailer, now()).unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.sent, 1);
    }

    #[test]
    fn drained_campaigns_are_completed() {
        let mut repo = MockRepository::new();
        repo.expect_list_campaigns_by_status()
            .withf(|status| *status == CampaignStatus::Sending)
            .returning(|_| Ok(vec![sample_campaign(CampaignStatus::Sending)]));
        repo.expect_count_outstanding().returning(|_| Ok(0));
        repo.expect_save_campaign_status()
            .withf(|c| c.status == CampaignStatus::Sent && c.completed_at.is_some())
            .times(1)
            .returning(|_| Ok(()));

        assert_eq!(complete_finished_campaigns(&repo, now()).unwrap(), 1);
    }
}
