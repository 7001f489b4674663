//! Outbound SMTP delivery on top of `lettre`.
//!
//! Campaign mail goes through the sender's own relay (built from its
//! [`EmailDomainConfig`]); platform mail such as verification links uses the
//! relay from the server configuration.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;

use crate::domain::email_config::{EmailDomainConfig, reveal_password};
use crate::models::config::SmtpSettings;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// A fully rendered message ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// `Name <address>` or a bare address.
    pub from: String,
    pub reply_to: Option<String>,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

#[cfg_attr(feature = "test-mocks", mockall::automock)]
pub trait Mailer: Send + Sync {
    fn send(&self, relay: &SmtpSettings, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// SMTP relay settings of a sending domain, with the password decoded.
pub fn relay_for_config(config: &EmailDomainConfig) -> SmtpSettings {
    SmtpSettings {
        host: config.smtp_host.clone(),
        port: u16::try_from(config.smtp_port).unwrap_or(587),
        username: config.smtp_username.clone(),
        password: reveal_password(&config.smtp_password),
        use_tls: config.use_tls,
        use_ssl: config.use_ssl,
    }
}

fn mailbox(raw: &str) -> Result<Mailbox, MailError> {
    raw.parse::<Mailbox>()
        .map_err(|e| MailError::InvalidAddress(format!("{raw}: {e}")))
}

pub fn build_message(email: &OutgoingEmail) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(mailbox(&email.from)?)
        .to(mailbox(&email.to)?)
        .subject(email.subject.clone());
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(mailbox(reply_to)?);
    }

    let message = match &email.text {
        Some(text) => builder.multipart(MultiPart::alternative_plain_html(
            text.clone(),
            email.html.clone(),
        )),
        None => builder.singlepart(SinglePart::html(email.html.clone())),
    };
    message.map_err(|e| MailError::Build(e.to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct RelayKey {
    host: String,
    port: u16,
    username: String,
    use_tls: bool,
    use_ssl: bool,
}

impl From<&SmtpSettings> for RelayKey {
    fn from(relay: &SmtpSettings) -> Self {
        Self {
            host: relay.host.clone(),
            port: relay.port,
            username: relay.username.clone(),
            use_tls: relay.use_tls,
            use_ssl: relay.use_ssl,
        }
    }
}

/// Blocking SMTP mailer keeping one pooled transport per relay.
#[derive(Default)]
pub struct SmtpMailer {
    transports: Mutex<HashMap<RelayKey, SmtpTransport>>,
}

impl SmtpMailer {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_transport(relay: &SmtpSettings) -> Result<SmtpTransport, MailError> {
        let builder = if relay.use_ssl {
            SmtpTransport::relay(&relay.host)
        } else if relay.use_tls {
            SmtpTransport::starttls_relay(&relay.host)
        } else {
            Ok(SmtpTransport::builder_dangerous(&relay.host))
        }
        .map_err(|e| MailError::Smtp(e.to_string()))?;

        let mut builder = builder.port(relay.port).timeout(Some(SMTP_TIMEOUT));
        if !relay.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                relay.username.clone(),
                relay.password.clone(),
            ));
        }
        Ok(builder.build())
    }

    fn transport(&self, relay: &SmtpSettings) -> Result<SmtpTransport, MailError> {
        let mut transports = self
            .transports
            .lock()
            .map_err(|_| MailError::Smtp("transport cache poisoned".into()))?;
        let key = RelayKey::from(relay);
        if let Some(transport) = transports.get(&key) {
            return Ok(transport.clone());
        }
        let transport = Self::build_transport(relay)?;
        transports.insert(key, transport.clone());
        Ok(transport)
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, relay: &SmtpSettings, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = build_message(email)?;
        let transport = self.transport(relay)?;
        transport
            .send(&message)
            .map(|_| ())
            .map_err(|e| MailError::Smtp(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::email_config::VerificationStatus;
    use crate::domain::email_config::tests::sample_config;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            from: "TechStartup <news@techstartup.cm>".into(),
            reply_to: Some("support@techstartup.cm".into()),
            to: "amina@example.com".into(),
            subject: "Hello".into(),
            html: "<p>Hello</p>".into(),
            text: Some("Hello".into()),
        }
    }

    #[test]
    fn message_carries_headers() {
        let message = build_message(&email()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("Reply-To: support@techstartup.cm"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[test]
    fn invalid_recipient_is_reported() {
        let mut bad = email();
        bad.to = "not an address".into();
        assert!(matches!(
            build_message(&bad),
            Err(MailError::InvalidAddress(_))
        ));
    }

    #[test]
    fn relay_uses_decoded_password() {
        let relay = relay_for_config(&sample_config(VerificationStatus::Verified));
        assert_eq!(relay.host, "smtp.gmail.com");
        assert_eq!(relay.port, 587);
        assert_eq!(relay.password, "secret");
        assert!(relay.use_tls);
    }
}
