//! Sending domain configuration: CRUD, DNS verification and test sends.

use serde::Serialize;

use crate::dns::DomainVerifier;
use crate::domain::auth::AuthenticatedUser;
use crate::domain::email_config::{DnsRecord, EmailDomainConfig, SmtpProvider, VerificationStatus};
use crate::domain::types::EmailConfigId;
use crate::domain::user::{ActivityType, NewUserActivity, RequestMeta};
use crate::forms::email_configs::EmailConfigForm;
use crate::mailer::{Mailer, OutgoingEmail, relay_for_config};
use crate::repository::{EmailConfigReader, EmailConfigWriter, UserWriter};
use crate::services::{ServiceError, ServiceResult, Site, now, owner_id};

#[derive(Debug, Serialize)]
pub struct EmailConfigDetail {
    pub config: EmailDomainConfig,
    pub dns_records: Vec<DnsRecord>,
}

/// Relay defaults offered when picking a provider.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderPreset {
    pub provider: SmtpProvider,
    pub host: &'static str,
    pub port: i32,
}

pub fn provider_presets() -> Vec<ProviderPreset> {
    SmtpProvider::ALL
        .iter()
        .filter_map(|provider| {
            provider.preset().map(|(host, port)| ProviderPreset {
                provider: *provider,
                host,
                port,
            })
        })
        .collect()
}

fn owned_config<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<EmailDomainConfig>
where
    R: EmailConfigReader + ?Sized,
{
    let user_id = owner_id(user)?;
    repo.get_email_config(EmailConfigId::new(id)?, user_id)?
        .ok_or(ServiceError::NotFound)
}

pub fn list_email_configs<R>(
    repo: &R,
    user: &AuthenticatedUser,
) -> ServiceResult<Vec<EmailDomainConfig>>
where
    R: EmailConfigReader + ?Sized,
{
    let user_id = owner_id(user)?;
    Ok(repo.list_email_configs(user_id)?)
}

pub fn get_email_config<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
) -> ServiceResult<EmailConfigDetail>
where
    R: EmailConfigReader + ?Sized,
{
    let config = owned_config(repo, user, id)?;
    Ok(EmailConfigDetail {
        dns_records: config.dns_records(),
        config,
    })
}

pub fn create_email_config<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: EmailConfigForm,
    meta: &RequestMeta,
) -> ServiceResult<EmailDomainConfig>
where
    R: EmailConfigWriter + UserWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let token = uuid::Uuid::new_v4().simple().to_string();
    let new_config = form.to_new_config(user_id, token)?;

    let config = repo.create_email_config(&new_config).map_err(|err| {
        log::error!("Failed to create email configuration: {err}");
        err
    })?;

    let activity = NewUserActivity::new(
        user_id,
        ActivityType::EmailConfigAdded,
        format!("Added sending domain {}", config.domain_name),
        meta,
    )
    .with_metadata(serde_json::json!({ "email_config_id": config.id.get() }));
    if let Err(err) = repo.log_activity(&activity) {
        log::error!("Failed to log email configuration: {err}");
    }

    Ok(config)
}

pub fn update_email_config<R>(
    repo: &R,
    user: &AuthenticatedUser,
    id: i32,
    form: EmailConfigForm,
) -> ServiceResult<EmailDomainConfig>
where
    R: EmailConfigReader + EmailConfigWriter + ?Sized,
{
    let config = owned_config(repo, user, id)?;
    let updates = form.to_update()?;
    Ok(repo.update_email_config(config.id, config.user_id, &updates)?)
}

pub fn delete_email_config<R>(repo: &R, user: &AuthenticatedUser, id: i32) -> ServiceResult<()>
where
    R: EmailConfigReader + EmailConfigWriter + ?Sized,
{
    let config = owned_config(repo, user, id)?;
    repo.delete_email_config(config.id)?;
    Ok(())
}

/// Looks up the ownership TXT record and stores the outcome.
///
/// Resolver errors count as a failed attempt.
pub fn verify_domain<R, V>(
    repo: &R,
    verifier: &V,
    user: &AuthenticatedUser,
    id: i32,
    meta: &RequestMeta,
) -> ServiceResult<EmailDomainConfig>
where
    R: EmailConfigReader + EmailConfigWriter + UserWriter + ?Sized,
    V: DomainVerifier + ?Sized,
{
    let config = owned_config(repo, user, id)?;
    let name = config.verification_record_name();
    let expected = config.verification_record_value();

    let found = verifier.has_txt_record(&name, &expected).unwrap_or_else(|err| {
        log::warn!("DNS lookup for {name} failed: {err}");
        false
    });
    let status = if found {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Failed
    };
    let updated = repo.record_verification(config.id, status, now())?;

    if found {
        log::info!("Domain {} verified", updated.domain_name);
        let activity = NewUserActivity::new(
            updated.user_id,
            ActivityType::DomainVerified,
            format!("Verified sending domain {}", updated.domain_name),
            meta,
        )
        .with_metadata(serde_json::json!({ "email_config_id": updated.id.get() }));
        if let Err(err) = repo.log_activity(&activity) {
            log::error!("Failed to log domain verification: {err}");
        }
    }

    Ok(updated)
}

/// Sends a test message through the configuration's own relay.
pub fn send_test_email<R, M>(
    repo: &R,
    mailer: &M,
    site: &Site,
    user: &AuthenticatedUser,
    id: i32,
    recipient: Option<String>,
) -> ServiceResult<()>
where
    R: EmailConfigReader + ?Sized,
    M: Mailer + ?Sized,
{
    let config = owned_config(repo, user, id)?;
    let to = recipient
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| user.email.clone());

    let email = OutgoingEmail {
        from: config.sender(),
        reply_to: config.reply_to.as_ref().map(ToString::to_string),
        to,
        subject: format!("Test Email from {}", site.platform_name),
        html: format!(
            "<p>This is a test email sent through <strong>{}</strong> using {}.</p>\
             <p>If you received it, your configuration works.</p>",
            config.domain_name, site.platform_name
        ),
        text: Some(format!(
            "This is a test email sent through {} using {}.",
            config.domain_name, site.platform_name
        )),
    };

    mailer
        .send(&relay_for_config(&config), &email)
        .map_err(|err| {
            log::warn!("Test email via {} failed: {err}", config.domain_name);
            ServiceError::InvalidState(format!("Test email failed: {err}"))
        })
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use super::*;
    use crate::dns::{DnsError, MockDomainVerifier};
    use crate::domain::email_config::tests::sample_config;
    use crate::mailer::{MailError, MockMailer};
    use crate::repository::mock::MockRepository;
    use crate::services::test_support::{client_user, site};

    #[test]
    fn presets_cover_hosted_providers_only() {
        let presets = provider_presets();
        assert!(presets.iter().any(|p| p.provider == SmtpProvider::Gmail && p.host == "smtp.gmail.com"));
        assert!(presets.iter().all(|p| p.provider != SmtpProvider::Custom));
    }

    #[test]
    fn verified_record_marks_domain_and_logs() {
        let mut repo = MockRepository::new();
        repo.expect_get_email_config()
            .returning(|_, _| Ok(Some(sample_config(VerificationStatus::Pending))));
        repo.expect_record_verification()
            .withf(|_, status, _| *status == VerificationStatus::Verified)
            .times(1)
            .returning(|_, status, _| Ok(sample_config(status)));
        repo.expect_log_activity()
            .withf(|a| a.activity_type == ActivityType::DomainVerified)
            .times(1)
            .returning(|_| Ok(()));
        let mut verifier = MockDomainVerifier::new();
        verifier
            .expect_has_txt_record()
            .withf(|name, expected| {
                name == "_afrimail-verification.techstartup.cm"
                    && expected == "afrimail-verification=abc123"
            })
            .returning(|_, _| Ok(true));

        let config =
            verify_domain(&repo, &verifier, &client_user(), 3, &RequestMeta::default()).unwrap();
        assert!(config.is_verified());
    }

    #[test]
    fn resolver_error_counts_as_failed_attempt() {
        let mut repo = MockRepository::new();
        repo.expect_get_email_config()
            .returning(|_, _| Ok(Some(sample_config(VerificationStatus::Pending))));
        repo.expect_record_verification()
            .withf(|_, status, _| *status == VerificationStatus::Failed)
            .times(1)
            .returning(|_, status, _| Ok(sample_config(status)));
        repo.expect_log_activity().times(0);
        let mut verifier = MockDomainVerifier::new();
        verifier
            .expect_has_txt_record()
            .returning(|_, _| Err(DnsError::Request("timeout".into())));

        let config =
            verify_domain(&repo, &verifier, &client_user(), 3, &RequestMeta::default()).unwrap();
        assert!(!config.is_verified());
    }

    #[test]
    fn test_send_uses_config_relay() {
        let mut repo = MockRepository::new();
        repo.expect_get_email_config()
            .returning(|_, _| Ok(Some(sample_config(VerificationStatus::Verified))));
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|relay, email| {
                relay.host == "smtp.gmail.com"
                    && relay.password == "secret"
                    && email.subject == "Test Email from AfriMail Pro"
                    && email.to == "marie@techstartup.cm"
                    && email.from == "TechStartup <news@techstartup.cm>"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        send_test_email(&repo, &mailer, &site(), &client_user(), 3, None).unwrap();
    }

    #[test]
    fn failed_test_send_is_reported() {
        let mut repo = MockRepository::new();
        repo.expect_get_email_config()
            .returning(|_, _| Ok(Some(sample_config(VerificationStatus::Verified))));
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .returning(|_, _| Err(MailError::Smtp("535 auth failed".into())));

        let result = send_test_email(
            &repo,
            &mailer,
            &site(),
            &client_user(),
            3,
            Some("ops@example.com".into()),
        );
        assert!(matches!(result, Err(ServiceError::InvalidState(_))));
    }
}
