//! Sending domains: SMTP credentials, DNS verification state and quotas.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{DomainName, EmailAddress, EmailConfigId, UserId, code_enum};

pub const DEFAULT_SMTP_PORT: i32 = 587;
pub const DEFAULT_DAILY_LIMIT: i32 = 1000;
pub const DEFAULT_MONTHLY_LIMIT: i32 = 10_000;
pub const DEFAULT_SPF_RECORD: &str = "v=spf1 include:_spf.google.com ~all";
/// Prefix of the TXT record proving domain ownership.
pub const VERIFICATION_RECORD_PREFIX: &str = "_afrimail-verification";

code_enum! {
    SmtpProvider {
        Gmail => "GMAIL",
        Outlook => "OUTLOOK",
        Sendgrid => "SENDGRID",
        Mailgun => "MAILGUN",
        AmazonSes => "AMAZON_SES",
        Yagmail => "YAGMAIL",
        Custom => "CUSTOM",
        Platform => "PLATFORM",
    }
}

impl SmtpProvider {
    /// Well-known relay host and port for hosted providers.
    pub fn preset(self) -> Option<(&'static str, i32)> {
        match self {
            SmtpProvider::Gmail | SmtpProvider::Yagmail => Some(("smtp.gmail.com", 587)),
            SmtpProvider::Outlook => Some(("smtp.office365.com", 587)),
            SmtpProvider::Sendgrid => Some(("smtp.sendgrid.net", 587)),
            SmtpProvider::Mailgun => Some(("smtp.mailgun.org", 587)),
            SmtpProvider::AmazonSes => Some(("email-smtp.us-east-1.amazonaws.com", 587)),
            SmtpProvider::Custom | SmtpProvider::Platform => None,
        }
    }
}

code_enum! {
    VerificationStatus {
        Pending => "PENDING",
        Verified => "VERIFIED",
        Failed => "FAILED",
        Expired => "EXPIRED",
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmailDomainConfig {
    pub id: EmailConfigId,
    pub user_id: UserId,
    pub domain_name: DomainName,
    pub from_email: EmailAddress,
    pub from_name: String,
    pub reply_to: Option<EmailAddress>,
    pub smtp_provider: SmtpProvider,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_username: String,
    /// Obfuscated password; see [`reveal_password`].
    #[serde(skip_serializing)]
    pub smtp_password: String,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub verification_status: VerificationStatus,
    pub verification_token: String,
    pub verification_attempts: i32,
    pub last_verification_attempt: Option<NaiveDateTime>,
    pub verified_at: Option<NaiveDateTime>,
    pub spf_record: String,
    pub dkim_record: Option<String>,
    pub dmarc_record: String,
    pub is_default: bool,
    pub is_active: bool,
    pub daily_limit: i32,
    pub monthly_limit: i32,
    pub emails_sent_today: i32,
    pub emails_sent_this_month: i32,
    pub last_used_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// DNS records the user must publish for the sending domain.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DnsRecord {
    pub record_type: &'static str,
    pub name: String,
    pub value: String,
}

impl EmailDomainConfig {
    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    /// Active, verified and under both sending limits.
    pub fn can_send(&self) -> bool {
        self.is_active
            && self.is_verified()
            && self.emails_sent_today < self.daily_limit
            && self.emails_sent_this_month < self.monthly_limit
    }

    pub fn verification_record_name(&self) -> String {
        format!("{VERIFICATION_RECORD_PREFIX}.{}", self.domain_name)
    }

    pub fn verification_record_value(&self) -> String {
        format!("afrimail-verification={}", self.verification_token)
    }

    pub fn dns_records(&self) -> Vec<DnsRecord> {
        let mut records = vec![
            DnsRecord {
                record_type: "TXT",
                name: self.verification_record_name(),
                value: self.verification_record_value(),
            },
            DnsRecord {
                record_type: "TXT",
                name: self.domain_name.to_string(),
                value: self.spf_record.clone(),
            },
            DnsRecord {
                record_type: "TXT",
                name: format!("_dmarc.{}", self.domain_name),
                value: self.dmarc_record.clone(),
            },
        ];
        if let Some(dkim) = &self.dkim_record {
            records.push(DnsRecord {
                record_type: "TXT",
                name: format!("afrimail._domainkey.{}", self.domain_name),
                value: dkim.clone(),
            });
        }
        records
    }

    /// `Name <address>` form used in the `From` header.
    pub fn sender(&self) -> String {
        if self.from_name.trim().is_empty() {
            self.from_email.to_string()
        } else {
            format!("{} <{}>", self.from_name, self.from_email)
        }
    }
}

/// Encodes an SMTP password for storage.
pub fn obfuscate_password(plain: &str) -> String {
    STANDARD.encode(plain)
}

/// Decodes a stored SMTP password, returning the input when it is not encoded.
pub fn reveal_password(stored: &str) -> String {
    STANDARD
        .decode(stored)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| stored.to_string())
}

pub fn default_dmarc_record(domain: &DomainName) -> String {
    format!("v=DMARC1; p=none; rua=mailto:dmarc@{domain}")
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewEmailDomainConfig {
    pub user_id: UserId,
    pub domain_name: DomainName,
    pub from_email: EmailAddress,
    pub from_name: String,
    pub reply_to: Option<EmailAddress>,
    pub smtp_provider: SmtpProvider,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_username: String,
    pub smtp_password: String,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub verification_token: String,
    pub spf_record: String,
    pub dmarc_record: String,
    pub is_default: bool,
    pub daily_limit: i32,
    pub monthly_limit: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateEmailDomainConfig {
    pub from_email: EmailAddress,
    pub from_name: String,
    pub reply_to: Option<EmailAddress>,
    pub smtp_provider: SmtpProvider,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_username: String,
    /// `None` keeps the stored password.
    pub smtp_password: Option<String>,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub is_default: bool,
    pub is_active: bool,
    pub daily_limit: i32,
    pub monthly_limit: i32,
}

/// Daily deliverability health of a sending domain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DomainReputation {
    pub email_config_id: EmailConfigId,
    pub date: chrono::NaiveDate,
    pub emails_sent: i32,
    pub bounces: i32,
    pub complaints: i32,
    pub is_blacklisted: bool,
    pub reputation_score: f64,
}

/// Reputation out of 100 penalising high bounce/complaint rates and blacklisting.
pub fn reputation_score(sent: i32, bounces: i32, complaints: i32, blacklisted: bool) -> f64 {
    if sent <= 0 {
        return 100.0;
    }
    let bounce_rate = f64::from(bounces) / f64::from(sent) * 100.0;
    let complaint_rate = f64::from(complaints) / f64::from(sent) * 100.0;
    let mut score = 100.0;
    if bounce_rate > 10.0 {
        score -= (bounce_rate - 10.0) * 2.0;
    }
    if complaint_rate > 0.1 {
        score -= (complaint_rate - 0.1) * 10.0;
    }
    if blacklisted {
        score -= 50.0;
    }
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::*;

    pub(crate) fn sample_config(status: VerificationStatus) -> EmailDomainConfig {
        let now = NaiveDate::from_ymd_opt(2025, 5, 20)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let domain = DomainName::new("techstartup.cm").unwrap();
        EmailDomainConfig {
            id: EmailConfigId::new(3).unwrap(),
            user_id: UserId::new(1).unwrap(),
            dmarc_record: default_dmarc_record(&domain),
            domain_name: domain,
            from_email: EmailAddress::new("news@techstartup.cm").unwrap(),
            from_name: "TechStartup".into(),
            reply_to: None,
            smtp_provider: SmtpProvider::Gmail,
            smtp_host: "smtp.gmail.com".into(),
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_username: "news@techstartup.cm".into(),
            smtp_password: "c2VjcmV0".into(),
            use_tls: true,
            use_ssl: false,
            verification_status: status,
            verification_token: "abc123".into(),
            verification_attempts: 0,
            last_verification_attempt: None,
            verified_at: None,
            spf_record: DEFAULT_SPF_RECORD.into(),
            dkim_record: None,
            is_default: true,
            is_active: true,
            daily_limit: DEFAULT_DAILY_LIMIT,
            monthly_limit: DEFAULT_MONTHLY_LIMIT,
            emails_sent_today: 0,
            emails_sent_this_month: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn can_send_requires_verification_and_quota() {
        let mut config = sample_config(VerificationStatus::Verified);
        assert!(config.can_send());

        config.emails_sent_today = config.daily_limit;
        assert!(!config.can_send());

        config.emails_sent_today = 0;
        config.emails_sent_this_month = config.monthly_limit;
        assert!(!config.can_send());

        let pending = sample_config(VerificationStatus::Pending);
        assert!(!pending.can_send());

        let mut inactive = sample_config(VerificationStatus::Verified);
        inactive.is_active = false;
        assert!(!inactive.can_send());
    }

    #[test]
    fn dns_records_include_verification_spf_and_dmarc() {
        let config = sample_config(VerificationStatus::Pending);
        let records = config.dns_records();
        assert_eq!(records[0].name, "_afrimail-verification.techstartup.cm");
        assert_eq!(records[0].value, "afrimail-verification=abc123");
        assert_eq!(records[1].value, DEFAULT_SPF_RECORD);
        assert_eq!(
            records[2].value,
            "v=DMARC1; p=none; rua=mailto:dmarc@techstartup.cm"
        );
        assert_eq!(config.sender(), "TechStartup <news@techstartup.cm>");
    }

    #[test]
    fn passwords_are_obfuscated_reversibly() {
        let stored = obfuscate_password("secret");
        assert_eq!(stored, "c2VjcmV0");
        assert_eq!(reveal_password(&stored), "secret");
        assert_eq!(reveal_password("not base64!"), "not base64!");
    }

    #[test]
    fn reputation_penalises_bounces_complaints_and_blacklists() {
        assert_eq!(reputation_score(0, 0, 0, true), 100.0);
        assert_eq!(reputation_score(100, 5, 0, false), 100.0);
        // 20% bounces -> 100 - (20 - 10) * 2
        assert_eq!(reputation_score(100, 20, 0, false), 80.0);
        // 1% complaints -> 100 - (1 - 0.1) * 10
        assert!((reputation_score(100, 0, 1, false) - 91.0).abs() < 1e-9);
        assert_eq!(reputation_score(100, 90, 0, true), 0.0);
    }
}
