//! Recording of opens, clicks, unsubscribes and provider-reported delivery
//! outcomes.
//!
//! Tracking tokens are unsigned, so every token is checked against the
//! campaign and contact it names before anything is written.

use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::campaign::{CampaignCounterDelta, EmailCampaign};
use crate::domain::contact::{Contact, StatusChange};
use crate::domain::event::{BounceType, DeliveryStatistics, EventType, NewEmailEvent};
use crate::domain::types::{CampaignId, ContactId};
use crate::domain::user::RequestMeta;
use crate::repository::{
    CampaignReader, CampaignWriter, ContactReader, ContactWriter, EventReader, EventWriter,
};
use crate::services::delivery::TrackingToken;
use crate::services::{ServiceError, ServiceResult, owner_id};

pub const DEFAULT_STATISTICS_DAYS: i64 = 30;

/// Transparent 1x1 GIF returned for open tracking.
pub const TRACKING_PIXEL: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

fn decode(token: &str) -> ServiceResult<TrackingToken> {
    TrackingToken::decode(token).map_err(|err| {
        log::warn!("Rejected tracking token: {err}");
        ServiceError::NotFound
    })
}

/// Loads the campaign and contact and checks they belong to the same user.
fn resolve<R>(
    repo: &R,
    campaign_id: CampaignId,
    contact_id: ContactId,
) -> ServiceResult<(EmailCampaign, Contact)>
where
    R: CampaignReader + ContactReader + ?Sized,
{
    let campaign = repo
        .find_campaign(campaign_id)?
        .ok_or(ServiceError::NotFound)?;
    let contact = repo
        .find_contact(contact_id)?
        .filter(|contact| contact.user_id == campaign.user_id)
        .ok_or_else(|| {
            log::warn!("Tracking token pairs campaign {campaign_id} with a foreign contact");
            ServiceError::NotFound
        })?;
    Ok((campaign, contact))
}

fn client_event(
    campaign_id: CampaignId,
    contact_id: ContactId,
    event_type: EventType,
    meta: &RequestMeta,
) -> NewEmailEvent {
    NewEmailEvent::new(campaign_id, contact_id, event_type)
        .with_client(meta.ip_address.clone(), meta.user_agent.clone())
}

pub fn record_open<R>(repo: &R, token: &str, meta: &RequestMeta, now: NaiveDateTime) -> ServiceResult<()>
where
    R: CampaignReader + ContactReader + EventWriter + ?Sized,
{
    let token = decode(token)?;
    let (campaign, contact) = resolve(repo, token.campaign_id, token.contact_id)?;
    let event = client_event(campaign.id, contact.id, EventType::Opened, meta);
    if repo.record_engagement(&event, now)? {
        log::debug!("First open of campaign {} by contact {}", campaign.id, contact.id);
    }
    Ok(())
}

/// Records the click and returns the URL to redirect to.
pub fn record_click<R>(
    repo: &R,
    token: &str,
    meta: &RequestMeta,
    now: NaiveDateTime,
) -> ServiceResult<String>
where
    R: CampaignReader + ContactReader + EventWriter + ?Sized,
{
    let token = decode(token)?;
    let target = token.extra.trim().to_string();
    let lowered = target.to_lowercase();
    if !(lowered.starts_with("http://") || lowered.starts_with("https://")) {
        log::warn!("Refusing click redirect to {target}");
        return Err(ServiceError::Form("Invalid redirect target".to_string()));
    }

    let (campaign, contact) = resolve(repo, token.campaign_id, token.contact_id)?;
    let mut event = client_event(campaign.id, contact.id, EventType::Clicked, meta);
    event.clicked_url = Some(target.clone());
    repo.record_engagement(&event, now)?;
    Ok(target)
}

/// Unsubscribes the contact named by the token. Repeated requests are no-ops.
pub fn unsubscribe<R>(
    repo: &R,
    token: &str,
    reason: Option<String>,
    meta: &RequestMeta,
    now: NaiveDateTime,
) -> ServiceResult<Contact>
where
    R: CampaignReader + CampaignWriter + ContactReader + ContactWriter + EventWriter + ?Sized,
{
    let token = decode(token)?;
    let (campaign, contact) = resolve(repo, token.campaign_id, token.contact_id)?;
    let change = StatusChange::Unsubscribe {
        reason: reason.clone(),
    };
    let Some(contact) = repo.change_contact_status(contact.id, &change, now)? else {
        // Already opted out, or concurrently changed; report the stored state.
        return repo.find_contact(contact.id)?.ok_or(ServiceError::NotFound);
    };

    let mut event = client_event(campaign.id, contact.id, EventType::Unsubscribed, meta);
    event.data = serde_json::json!({ "reason": reason });
    repo.record_event(&event, now)?;
    repo.increment_campaign_counters(
        campaign.id,
        CampaignCounterDelta {
            unsubscribes: 1,
            ..CampaignCounterDelta::default()
        },
    )?;
    log::info!("Contact {} unsubscribed via campaign {}", contact.id, campaign.id);
    Ok(contact)
}

/// Outcome reported by a mail provider for one message.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeliveryReport {
    Delivered,
    Bounced {
        bounce_type: BounceType,
        #[serde(default)]
        reason: Option<String>,
    },
    Complained,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryReportRequest {
    pub campaign_id: i32,
    pub contact_id: i32,
    #[serde(flatten)]
    pub report: DeliveryReport,
}

/// Books a provider-reported delivery outcome on one of the user's campaigns.
pub fn record_delivery_report<R>(
    repo: &R,
    user: &AuthenticatedUser,
    request: DeliveryReportRequest,
    now: NaiveDateTime,
) -> ServiceResult<()>
where
    R: CampaignReader + CampaignWriter + ContactReader + ContactWriter + EventWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let campaign_id = CampaignId::new(request.campaign_id)?;
    let contact_id = ContactId::new(request.contact_id)?;
    let (campaign, contact) = resolve(repo, campaign_id, contact_id)?;
    if campaign.user_id != user_id {
        return Err(ServiceError::NotFound);
    }

    let mut event = NewEmailEvent::new(campaign.id, contact.id, EventType::Delivered);
    let mut delta = CampaignCounterDelta::default();
    match request.report {
        DeliveryReport::Delivered => delta.delivered = 1,
        DeliveryReport::Bounced {
            bounce_type,
            reason,
        } => {
            event.event_type = EventType::Bounced;
            event.bounce_type = Some(bounce_type);
            event.bounce_reason = reason;
            delta.bounced = 1;
            if bounce_type == BounceType::Hard {
                repo.change_contact_status(contact.id, &StatusChange::Bounce, now)?;
            }
        }
        DeliveryReport::Complained => {
            event.event_type = EventType::Complained;
            delta.complaints = 1;
            repo.change_contact_status(contact.id, &StatusChange::Complain, now)?;
        }
    }

    repo.record_event(&event, now)?;
    repo.increment_campaign_counters(campaign.id, delta)?;
    Ok(())
}

/// Event counts and rates of the user's campaigns over the last `days` days.
pub fn delivery_statistics<R>(
    repo: &R,
    user: &AuthenticatedUser,
    days: Option<i64>,
    now: NaiveDateTime,
) -> ServiceResult<DeliveryStatistics>
where
    R: EventReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let days = days.filter(|d| *d > 0).unwrap_or(DEFAULT_STATISTICS_DAYS);
    let counts = repo.count_events_by_type(Some(user_id), now - Duration::days(days))?;
    Ok(DeliveryStatistics::from_counts(days, &counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_reports_parse_from_json() {
        let request: DeliveryReportRequest = serde_json::from_str(
            r#"{"campaign_id":5,"contact_id":7,"event":"bounced","bounce_type":"HARD","reason":"550"}"#,
        )
        .unwrap();
        assert_eq!(
            request.report,
            DeliveryReport::Bounced {
                bounce_type: BounceType::Hard,
                reason: Some("550".into())
            }
        );
    }

    #[test]
    fn pixel_is_a_gif() {
        assert_eq!(&TRACKING_PIXEL[..6], b"GIF89a");
        assert_eq!(TRACKING_PIXEL.last(), Some(&0x3b));
    }
}

#[cfg(all(test, feature = "test-mocks"))]
mod service_tests {
    use super::*;
    use crate::domain::campaign::CampaignStatus;
    use crate::domain::contact::ContactStatus;
    use crate::domain::campaign::tests::sample_campaign;
    use crate::domain::contact::tests::{now, sample_contact};
    use crate::domain::event::EmailEvent;
    use crate::domain::types::{EventId, UserId};
    use crate::repository::mock::MockRepository;
    use crate::services::test_support::client_user;

    fn stored(event: &NewEmailEvent, at: NaiveDateTime) -> EmailEvent {
        EmailEvent {
            id: EventId::new(1).unwrap(),
            campaign_id: event.campaign_id,
            contact_id: event.contact_id,
            event_type: event.event_type,
            ip_address: event.ip_address.clone(),
            user_agent: event.user_agent.clone(),
            clicked_url: event.clicked_url.clone(),
            bounce_type: event.bounce_type,
            bounce_reason: event.bounce_reason.clone(),
            data: event.data.clone(),
            created_at: at,
        }
    }

    fn token() -> String {
        TrackingToken::click(
            CampaignId::new(5).unwrap(),
            ContactId::new(7).unwrap(),
            "https://shop.cm/deal",
        )
    }

    fn tracked_repo() -> MockRepository {
        let mut repo = MockRepository::new();
        repo.expect_find_campaign()
            .returning(|_| Ok(Some(sample_campaign(CampaignStatus::Sent))));
        repo.expect_find_contact()
            .returning(|id| Ok(Some(sample_contact(id.get(), "awa@example.com"))));
        repo
    }

    #[test]
    fn opens_are_booked_with_client_details() {
        let mut repo = tracked_repo();
        repo.expect_record_engagement()
            .withf(|event, _| {
                event.event_type == EventType::Opened
                    && event.ip_address.as_deref() == Some("41.202.219.10")
            })
            .times(1)
            .returning(|_, _| Ok(true));
        repo.expect_record_event().times(0);
        let token = TrackingToken::open(CampaignId::new(5).unwrap(), ContactId::new(7).unwrap(), now());
        let meta = RequestMeta {
            ip_address: Some("41.202.219.10".into()),
            user_agent: None,
        };

        record_open(&repo, &token, &meta, now()).unwrap();
    }

    #[test]
    fn clicks_carry_the_target_url() {
        let mut repo = tracked_repo();
        repo.expect_record_engagement()
            .withf(|event, _| {
                event.event_type == EventType::Clicked
                    && event.clicked_url.as_deref() == Some("https://shop.cm/deal")
            })
            .times(1)
            .returning(|_, _| Ok(false));

        let url = record_click(&repo, &token(), &RequestMeta::default(), now()).unwrap();
        assert_eq!(url, "https://shop.cm/deal");
    }

    #[test]
    fn non_http_click_targets_are_refused() {
        let repo = MockRepository::new();
        let token = TrackingToken::click(
            CampaignId::new(5).unwrap(),
            ContactId::new(7).unwrap(),
            "javascript:alert(1)",
        );

        assert!(matches!(
            record_click(&repo, &token, &RequestMeta::default(), now()),
            Err(ServiceError::Form(_))
        ));
    }

    #[test]
    fn tokens_pairing_foreign_contacts_are_rejected() {
        let mut repo = MockRepository::new();
        repo.expect_find_campaign()
            .returning(|_| Ok(Some(sample_campaign(CampaignStatus::Sent))));
        repo.expect_find_contact().returning(|id| {
            let mut contact = sample_contact(id.get(), "other@example.com");
            contact.user_id = UserId::new(2).unwrap();
            Ok(Some(contact))
        });
        repo.expect_record_event().times(0);

        assert!(matches!(
            record_click(&repo, &token(), &RequestMeta::default(), now()),
            Err(ServiceError::NotFound)
        ));
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let mut repo = MockRepository::new();
        repo.expect_find_campaign()
            .returning(|_| Ok(Some(sample_campaign(CampaignStatus::Sent))));
        repo.expect_find_contact().returning(|id| {
            let mut contact = sample_contact(id.get(), "awa@example.com");
            contact.status = ContactStatus::Unsubscribed;
            contact.is_active = false;
            Ok(Some(contact))
        });
        repo.expect_change_contact_status()
            .returning(|_, _, _| Ok(None));
        repo.expect_record_event().times(0);
        repo.expect_increment_campaign_counters().times(0);
        let token = TrackingToken::unsubscribe(CampaignId::new(5).unwrap(), ContactId::new(7).unwrap());

        let contact = unsubscribe(&repo, &token, None, &RequestMeta::default(), now()).unwrap();
        assert_eq!(contact.status, ContactStatus::Unsubscribed);
    }

    #[test]
    fn unsubscribe_books_event_and_counter_once() {
        let mut repo = tracked_repo();
        repo.expect_change_contact_status()
            .withf(|_, change, _| {
                *change
                    == StatusChange::Unsubscribe {
                        reason: Some("too many emails".into()),
                    }
            })
            .times(1)
            .returning(|id, _, _| {
                let mut contact = sample_contact(id.get(), "awa@example.com");
                contact.status = ContactStatus::Unsubscribed;
                contact.is_active = false;
                Ok(Some(contact))
            });
        repo.expect_record_event()
            .withf(|event, _| event.event_type == EventType::Unsubscribed)
            .times(1)
            .returning(|event, at| Ok(stored(event, at)));
        repo.expect_increment_campaign_counters()
            .withf(|_, delta| delta.unsubscribes == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        let token = TrackingToken::unsubscribe(CampaignId::new(5).unwrap(), ContactId::new(7).unwrap());

        let contact = unsubscribe(
            &repo,
            &token,
            Some("too many emails".into()),
            &RequestMeta::default(),
            now(),
        )
        .unwrap();
        assert!(!contact.is_mailable());
    }

    #[test]
    fn hard_bounce_marks_contact() {
        let mut repo = tracked_repo();
        repo.expect_change_contact_status()
            .withf(|_, change, _| *change == StatusChange::Bounce)
            .times(1)
            .returning(|_, _, _| Ok(None));
        repo.expect_record_event()
            .withf(|event, _| event.event_type == EventType::Bounced)
            .returning(|event, at| Ok(stored(event, at)));
        repo.expect_increment_campaign_counters()
            .withf(|_, delta| delta.bounced == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        record_delivery_report(
            &repo,
            &client_user(),
            DeliveryReportRequest {
                campaign_id: 5,
                contact_id: 7,
                report: DeliveryReport::Bounced {
                    bounce_type: BounceType::Hard,
                    reason: None,
                },
            },
            now(),
        )
        .unwrap();
    }
}
