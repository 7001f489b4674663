use chrono::{Duration, NaiveDate, Utc};

use afrimail::domain::campaign::{CampaignPriority, CampaignStatus, CampaignType, NewEmailCampaign};
use afrimail::domain::contact::{ContactSource, ContactStatus, NewContact};
use afrimail::domain::contact_list::{ListType, NewContactList};
use afrimail::domain::event::{EventType, NewEmailEvent};
use afrimail::domain::queue::{NewQueuedEmail, QueueStatus};
use afrimail::domain::types::{CampaignName, EmailAddress, ListName, UserId};
use afrimail::domain::user::{NewUser, UserRole};
use afrimail::repository::errors::RepositoryError;
use afrimail::repository::{
    CampaignReader, CampaignWriter, ContactListQuery, ContactListReader, ContactListWriter,
    ContactReader, ContactWriter, DieselRepository, EventReader, EventWriter, MaintenanceWriter,
    QueueReader, QueueWriter, UserReader, UserWriter,
};

mod common;

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: EmailAddress::new(email).unwrap(),
        password_hash: "hash".into(),
        first_name: "Kofi".into(),
        last_name: "Mensah".into(),
        phone: None,
        company: "Accra Textiles".into(),
        company_website: None,
        industry: Some("Retail".into()),
        company_size: None,
        country: "GH".into(),
        city: Some("Accra".into()),
        role: UserRole::Client,
        is_active: true,
        is_email_verified: true,
        email_verification_token: None,
        email_verification_sent_at: None,
    }
}

fn contact(user_id: UserId, email: &str, company: &str) -> NewContact {
    let mut contact = NewContact::new(user_id, EmailAddress::new(email).unwrap(), ContactSource::Manual);
    contact.company = Some(company.into());
    contact.country = Some("GH".into());
    contact
}

fn campaign(user_id: UserId) -> NewEmailCampaign {
    NewEmailCampaign {
        user_id,
        name: CampaignName::new("Harmattan sale").unwrap(),
        description: None,
        campaign_type: CampaignType::Regular,
        priority: CampaignPriority::High,
        email_config_id: None,
        template_id: None,
        subject: "Hello {{first_name}}".into(),
        preheader: None,
        from_name: "Accra Textiles".into(),
        from_email: "news@accratextiles.com".into(),
        reply_to: None,
        html_content: "<p>Hi</p>".into(),
        text_content: None,
        scheduled_at: None,
        send_immediately: true,
        track_opens: true,
        track_clicks: true,
        track_unsubscribes: true,
    }
}

#[test]
fn test_user_repository_crud() {
    let test_db = common::TestDb::new("test_user_repository_crud.db");
    let repo = DieselRepository::new(test_db.pool());

    let user = repo.create_user(&new_user("kofi@accratextiles.com")).unwrap();
    assert_eq!(user.email.as_str(), "kofi@accratextiles.com");
    assert!(repo.get_user_profile(user.id).unwrap().is_some());

    let found = repo
        .get_user_by_email(&EmailAddress::new("KOFI@accratextiles.com").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);

    assert!(matches!(
        repo.create_user(&new_user("kofi@accratextiles.com")),
        Err(RepositoryError::ConstraintViolation(_))
    ));

    repo.set_user_active(user.id, false).unwrap();
    assert!(!repo.get_user_by_id(user.id).unwrap().unwrap().is_active);
}

#[test]
fn test_contacts_are_scoped_to_their_owner() {
    let test_db = common::TestDb::new("test_contact_scoping.db");
    let repo = DieselRepository::new(test_db.pool());
    let owner = repo.create_user(&new_user("owner@accratextiles.com")).unwrap();
    let other = repo.create_user(&new_user("other@lagosmarket.ng")).unwrap();

    let ama = repo
        .create_contact(&contact(owner.id, "ama@example.com", "Kente Co"))
        .unwrap();
    repo.create_contact(&contact(owner.id, "yaw@example.com", "Cocoa Ltd"))
        .unwrap();
    repo.create_contact(&contact(other.id, "ama@example.com", "Kente Co"))
        .unwrap();

    assert!(repo.create_contact(&contact(owner.id, "AMA@example.com", "Dup")).is_err());
    assert!(repo.get_contact_by_id(ama.id, other.id).unwrap().is_none());

    let (total, items) = repo
        .list_contacts(ContactListQuery::new(owner.id).search("cocoa"))
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].email.as_str(), "yaw@example.com");
    assert_eq!(repo.count_contacts(owner.id).unwrap(), 2);
}

#[test]
fn test_list_membership_and_unsubscribe() {
    let test_db = common::TestDb::new("test_list_membership.db");
    let repo = DieselRepository::new(test_db.pool());
    let owner = repo.create_user(&new_user("owner@accratextiles.com")).unwrap();

    let list = repo
        .create_contact_list(&NewContactList::new(
            owner.id,
            ListName::new("Customers").unwrap(),
            ListType::Manual,
        ))
        .unwrap();
    let a = repo
        .create_contact(&contact(owner.id, "a@example.com", "A"))
        .unwrap();
    let b = repo
        .create_contact(&contact(owner.id, "b@example.com", "B"))
        .unwrap();

    assert_eq!(repo.add_contacts_to_list(list.id, &[a.id, b.id]).unwrap(), 2);
    let (in_list, _) = repo
        .list_contacts(ContactListQuery::new(owner.id).list(list.id))
        .unwrap();
    assert_eq!(in_list, 2);

    let now = Utc::now().naive_utc();
    assert_eq!(repo.unsubscribe_contacts(owner.id, &[a.id], now).unwrap(), 1);
    assert_eq!(repo.unsubscribe_contacts(owner.id, &[a.id], now).unwrap(), 0);
    let a = repo.get_contact_by_id(a.id, owner.id).unwrap().unwrap();
    assert_eq!(a.status, ContactStatus::Unsubscribed);

    let (unsubscribed, _) = repo
        .list_contacts(ContactListQuery::new(owner.id).status(ContactStatus::Unsubscribed))
        .unwrap();
    assert_eq!(unsubscribed, 1);

    assert!(
        repo.create_contact_list(&NewContactList::new(
            owner.id,
            ListName::new("Customers").unwrap(),
            ListType::Manual,
        ))
        .is_err()
    );
    assert_eq!(repo.list_contact_lists(owner.id).unwrap().len(), 1);
}

#[test]
fn test_campaign_recipients_and_queue_claiming() {
    let test_db = common::TestDb::new("test_campaign_queue.db");
    let repo = DieselRepository::new(test_db.pool());
    let owner = repo.create_user(&new_user("owner@accratextiles.com")).unwrap();

    let customers = repo
        .create_contact_list(&NewContactList::new(
            owner.id,
            ListName::new("Customers").unwrap(),
            ListType::Manual,
        ))
        .unwrap();
    let vip = repo
        .create_contact_list(&NewContactList::new(
            owner.id,
            ListName::new("VIP").unwrap(),
            ListType::Manual,
        ))
        .unwrap();
    let a = repo
        .create_contact(&contact(owner.id, "a@example.com", "A"))
        .unwrap();
    let b = repo
        .create_contact(&contact(owner.id, "b@example.com", "B"))
        .unwrap();
    let gone = repo
        .create_contact(&contact(owner.id, "gone@example.com", "C"))
        .unwrap();
    repo.add_contacts_to_list(customers.id, &[a.id, b.id, gone.id])
        .unwrap();
    repo.add_contacts_to_list(vip.id, &[a.id]).unwrap();
    let now = Utc::now().naive_utc();
    repo.unsubscribe_contacts(owner.id, &[gone.id], now).unwrap();

    let mut created = repo
        .create_campaign(&campaign(owner.id), &[customers.id, vip.id])
        .unwrap();
    assert_eq!(created.status, CampaignStatus::Draft);
    assert_eq!(repo.get_campaign_list_ids(created.id).unwrap().len(), 2);

    let recipients = repo.list_recipients(created.id).unwrap();
    assert_eq!(
        recipients.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![a.id, b.id]
    );
    assert_eq!(repo.count_recipients(created.id).unwrap(), 2);

    let rows: Vec<NewQueuedEmail> = recipients
        .iter()
        .map(|c| NewQueuedEmail {
            campaign_id: created.id,
            contact_id: c.id,
            recipient_email: c.email.clone(),
            subject: "Hello".into(),
            html_content: "<p>Hi</p>".into(),
            text_content: None,
            priority: CampaignPriority::High.queue_priority(),
            max_attempts: 3,
            scheduled_at: now - Duration::minutes(1),
        })
        .collect();
    assert_eq!(repo.enqueue_emails(&rows).unwrap(), 2);

    // Drafts are never delivered.
    assert!(repo.claim_due_emails(now, 10).unwrap().is_empty());

    created.status = CampaignStatus::Sending;
    created.recipient_count = 2;
    created.started_at = Some(now);
    repo.save_campaign_status(&created).unwrap();

    let claimed = repo.claim_due_emails(now, 1).unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, QueueStatus::Sending);
    assert_eq!(repo.count_outstanding(created.id).unwrap(), 2);

    assert_eq!(repo.cancel_queued_emails(created.id).unwrap(), 1);
    let stats = repo.get_queue_statistics().unwrap();
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.sending, 1);
}

#[test]
fn test_cleanup_dry_run_counts_without_deleting() {
    let test_db = common::TestDb::new("test_cleanup.db");
    let repo = DieselRepository::new(test_db.pool());
    let owner = repo.create_user(&new_user("owner@accratextiles.com")).unwrap();
    let a = repo
        .create_contact(&contact(owner.id, "a@example.com", "A"))
        .unwrap();
    let created = repo.create_campaign(&campaign(owner.id), &[]).unwrap();

    let old = NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let recent = Utc::now().naive_utc();
    repo.record_event(&NewEmailEvent::new(created.id, a.id, EventType::Sent), old)
        .unwrap();
    repo.record_event(&NewEmailEvent::new(created.id, a.id, EventType::Opened), recent)
        .unwrap();

    let cutoff = recent - Duration::days(365);
    let report = repo.cleanup_before(cutoff, true).unwrap();
    assert_eq!(report.events, 1);
    assert_eq!(repo.list_campaign_events(created.id).unwrap().len(), 2);

    let report = repo.cleanup_before(cutoff, false).unwrap();
    assert_eq!(report.events, 1);
    let events = repo.list_campaign_events(created.id).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Opened);
    assert!(repo.has_event(created.id, a.id, EventType::Opened).unwrap());
    assert!(!repo.has_event(created.id, a.id, EventType::Sent).unwrap());
}

#[test]
fn test_daily_campaign_counts_count_distinct_contacts() {
    let test_db = common::TestDb::new("test_daily_counts.db");
    let repo = DieselRepository::new(test_db.pool());
    let owner = repo.create_user(&new_user("owner@accratextiles.com")).unwrap();
    let a = repo
        .create_contact(&contact(owner.id, "a@example.com", "A"))
        .unwrap();
    let b = repo
        .create_contact(&contact(owner.id, "b@example.com", "B"))
        .unwrap();
    let created = repo.create_campaign(&campaign(owner.id), &[]).unwrap();

    let day = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
    let at = day.and_hms_opt(9, 30, 0).unwrap();
    for (contact_id, event_type) in [
        (a.id, EventType::Opened),
        (a.id, EventType::Opened),
        (a.id, EventType::Opened),
        (b.id, EventType::Opened),
        (a.id, EventType::Clicked),
        (a.id, EventType::Clicked),
    ] {
        repo.record_event(&NewEmailEvent::new(created.id, contact_id, event_type), at)
            .unwrap();
    }
    // Outside the day.
    repo.record_event(
        &NewEmailEvent::new(created.id, b.id, EventType::Clicked),
        at + Duration::days(1),
    )
    .unwrap();

    let counts = repo.get_daily_campaign_counts(day).unwrap();
    assert_eq!(counts.len(), 1);
    let (campaign_id, counts) = &counts[0];
    assert_eq!(*campaign_id, created.id);
    assert_eq!(counts.opened, 4);
    assert_eq!(counts.unique_opens, 2);
    assert_eq!(counts.clicked, 2);
    assert_eq!(counts.unique_clicks, 1);
}
