use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

use crate::domain::email_config::{
    DomainReputation as DomainDomainReputation, EmailDomainConfig as DomainEmailDomainConfig,
    NewEmailDomainConfig as DomainNewEmailDomainConfig,
    UpdateEmailDomainConfig as DomainUpdateEmailDomainConfig,
};
use crate::domain::types::{DomainName, EmailAddress, EmailConfigId, TypeConstraintError, UserId};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::email_domain_configs)]
pub struct EmailDomainConfig {
    pub id: i32,
    pub user_id: i32,
    pub domain_name: String,
    pub from_email: String,
    pub from_name: String,
    pub reply_to: Option<String>,
    pub smtp_provider: String,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_username: String,
    pub smtp_password: String,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub verification_status: String,
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

#[derive(Insertable)]
#[diesel(table_name = crate::schema::email_domain_configs)]
pub struct NewEmailDomainConfig<'a> {
    pub user_id: i32,
    pub domain_name: &'a str,
    pub from_email: &'a str,
    pub from_name: &'a str,
    pub reply_to: Option<&'a str>,
    pub smtp_provider: &'a str,
    pub smtp_host: &'a str,
    pub smtp_port: i32,
    pub smtp_username: &'a str,
    pub smtp_password: &'a str,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub verification_token: &'a str,
    pub spf_record: &'a str,
    pub dmarc_record: &'a str,
    pub is_default: bool,
    pub daily_limit: i32,
    pub monthly_limit: i32,
}

/// `smtp_password` is skipped when `None`, keeping the stored value.
#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::email_domain_configs)]
pub struct UpdateEmailDomainConfig<'a> {
    pub from_email: &'a str,
    pub from_name: &'a str,
    pub reply_to: Option<Option<&'a str>>,
    pub smtp_provider: &'a str,
    pub smtp_host: &'a str,
    pub smtp_port: i32,
    pub smtp_username: &'a str,
    pub smtp_password: Option<&'a str>,
    pub use_tls: bool,
    pub use_ssl: bool,
    pub is_default: bool,
    pub is_active: bool,
    pub daily_limit: i32,
    pub monthly_limit: i32,
    pub updated_at: NaiveDateTime,
}

/// Verification bookkeeping after a DNS check.
#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::email_domain_configs)]
pub struct VerificationChange<'a> {
    pub verification_status: &'a str,
    pub verification_attempts: i32,
    pub last_verification_attempt: Option<NaiveDateTime>,
    pub verified_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<EmailDomainConfig> for DomainEmailDomainConfig {
    type Error = TypeConstraintError;

    fn try_from(config: EmailDomainConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EmailConfigId::new(config.id)?,
            user_id: UserId::new(config.user_id)?,
            domain_name: DomainName::new(config.domain_name)?,
            from_email: EmailAddress::new(config.from_email)?,
            from_name: config.from_name,
            reply_to: config.reply_to.map(EmailAddress::new).transpose()?,
            smtp_provider: config.smtp_provider.parse()?,
            smtp_host: config.smtp_host,
            smtp_port: config.smtp_port,
            smtp_username: config.smtp_username,
            smtp_password: config.smtp_password,
            use_tls: config.use_tls,
            use_ssl: config.use_ssl,
            verification_status: config.verification_status.parse()?,
            verification_token: config.verification_token,
            verification_attempts: config.verification_attempts,
            last_verification_attempt: config.last_verification_attempt,
            verified_at: config.verified_at,
            spf_record: config.spf_record,
            dkim_record: config.dkim_record,
            dmarc_record: config.dmarc_record,
            is_default: config.is_default,
            is_active: config.is_active,
            daily_limit: config.daily_limit,
            monthly_limit: config.monthly_limit,
            emails_sent_today: config.emails_sent_today,
            emails_sent_this_month: config.emails_sent_this_month,
            last_used_at: config.last_used_at,
            created_at: config.created_at,
            updated_at: config.updated_at,
        })
    }
}

impl<'a> From<&'a DomainNewEmailDomainConfig> for NewEmailDomainConfig<'a> {
    fn from(config: &'a DomainNewEmailDomainConfig) -> Self {
        Self {
            user_id: config.user_id.get(),
            domain_name: config.domain_name.as_str(),
            from_email: config.from_email.as_str(),
            from_name: &config.from_name,
            reply_to: config.reply_to.as_ref().map(EmailAddress::as_str),
            smtp_provider: config.smtp_provider.as_str(),
            smtp_host: &config.smtp_host,
            smtp_port: config.smtp_port,
            smtp_username: &config.smtp_username,
            smtp_password: &config.smtp_password,
            use_tls: config.use_tls,
            use_ssl: config.use_ssl,
            verification_token: &config.verification_token,
            spf_record: &config.spf_record,
            dmarc_record: &config.dmarc_record,
            is_default: config.is_default,
            daily_limit: config.daily_limit,
            monthly_limit: config.monthly_limit,
        }
    }
}

impl<'a> UpdateEmailDomainConfig<'a> {
    pub fn new(update: &'a DomainUpdateEmailDomainConfig, now: NaiveDateTime) -> Self {
        Self {
            from_email: update.from_email.as_str(),
            from_name: &update.from_name,
            reply_to: Some(update.reply_to.as_ref().map(EmailAddress::as_str)),
            smtp_provider: update.smtp_provider.as_str(),
            smtp_host: &update.smtp_host,
            smtp_port: update.smtp_port,
            smtp_username: &update.smtp_username,
            smtp_password: update.smtp_password.as_deref(),
            use_tls: update.use_tls,
            use_ssl: update.use_ssl,
            is_default: update.is_default,
            is_active: update.is_active,
            daily_limit: update.daily_limit,
            monthly_limit: update.monthly_limit,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::domain_reputations)]
pub struct DomainReputation {
    pub id: i32,
    pub email_config_id: i32,
    pub date: NaiveDate,
    pub emails_sent: i32,
    pub bounces: i32,
    pub complaints: i32,
    pub is_blacklisted: bool,
    pub reputation_score: f64,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::domain_reputations)]
pub struct NewDomainReputation {
    pub email_config_id: i32,
    pub date: NaiveDate,
    pub emails_sent: i32,
    pub bounces: i32,
    pub complaints: i32,
    pub is_blacklisted: bool,
    pub reputation_score: f64,
}

impl TryFrom<DomainReputation> for DomainDomainReputation {
    type Error = TypeConstraintError;

    fn try_from(row: DomainReputation) -> Result<Self, Self::Error> {
        Ok(Self {
            email_config_id: EmailConfigId::new(row.email_config_id)?,
            date: row.date,
            emails_sent: row.emails_sent,
            bounces: row.bounces,
            complaints: row.complaints,
            is_blacklisted: row.is_blacklisted,
            reputation_score: row.reputation_score,
        })
    }
}

impl From<&DomainDomainReputation> for NewDomainReputation {
    fn from(row: &DomainDomainReputation) -> Self {
        Self {
            email_config_id: row.email_config_id.get(),
            date: row.date,
            emails_sent: row.emails_sent,
            bounces: row.bounces,
            complaints: row.complaints,
            is_blacklisted: row.is_blacklisted,
            reputation_score: row.reputation_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::email_config::tests::sample_config;
    use crate::domain::email_config::{SmtpProvider, VerificationStatus};

    #[test]
    fn update_without_password_leaves_it_untouched() {
        let config = sample_config(VerificationStatus::Verified);
        let update = DomainUpdateEmailDomainConfig {
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
            reply_to: None,
            smtp_provider: SmtpProvider::Custom,
            smtp_host: "mail.techstartup.cm".into(),
            smtp_port: 465,
            smtp_username: config.smtp_username.clone(),
            smtp_password: None,
            use_tls: false,
            use_ssl: true,
            is_default: true,
            is_active: true,
            daily_limit: 500,
            monthly_limit: 5000,
        };
        let changes = UpdateEmailDomainConfig::new(&update, config.updated_at);
        assert_eq!(changes.smtp_password, None);
        assert_eq!(changes.reply_to, Some(None));
        assert_eq!(changes.smtp_provider, "CUSTOM");
    }

    #[test]
    fn config_row_converts_into_domain() {
        let domain = sample_config(VerificationStatus::Pending);
        let row = EmailDomainConfig {
            id: domain.id.get(),
            user_id: domain.user_id.get(),
            domain_name: domain.domain_name.to_string(),
            from_email: domain.from_email.to_string(),
            from_name: domain.from_name.clone(),
            reply_to: Some("support@techstartup.cm".into()),
            smtp_provider: "GMAIL".into(),
            smtp_host: domain.smtp_host.clone(),
            smtp_port: domain.smtp_port,
            smtp_username: domain.smtp_username.clone(),
            smtp_password: domain.smtp_password.clone(),
            use_tls: true,
            use_ssl: false,
            verification_status: "VERIFIED".into(),
            verification_token: domain.verification_token.clone(),
            verification_attempts: 1,
            last_verification_attempt: None,
            verified_at: None,
            spf_record: domain.spf_record.clone(),
            dkim_record: None,
            dmarc_record: domain.dmarc_record.clone(),
            is_default: true,
            is_active: true,
            daily_limit: 1000,
            monthly_limit: 10000,
            emails_sent_today: 0,
            emails_sent_this_month: 0,
            last_used_at: None,
            created_at: domain.created_at,
            updated_at: domain.updated_at,
        };
        let config: DomainEmailDomainConfig = row.try_into().unwrap();
        assert!(config.is_verified());
        assert_eq!(
            config.reply_to.as_ref().map(EmailAddress::as_str),
            Some("support@techstartup.cm")
        );
    }
}
