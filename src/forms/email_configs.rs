use serde::Deserialize;
use validator::Validate;

use crate::domain::email_config::{
    DEFAULT_DAILY_LIMIT, DEFAULT_MONTHLY_LIMIT, DEFAULT_SMTP_PORT, DEFAULT_SPF_RECORD,
    NewEmailDomainConfig, SmtpProvider, UpdateEmailDomainConfig, default_dmarc_record,
    obfuscate_password,
};
use crate::domain::types::{DomainName, EmailAddress, UserId};
use crate::forms::{FormError, checkbox, optional_number, trimmed};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct EmailConfigForm {
    #[serde(default)]
    pub domain_name: String,
    #[validate(length(min = 1, max = 254))]
    pub from_email: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub smtp_provider: Option<String>,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[validate(range(min = 1, max = 65535))]
    #[serde(default, deserialize_with = "optional_number")]
    pub smtp_port: Option<i32>,
    #[serde(default)]
    pub smtp_username: String,
    /// Blank on edit keeps the stored password.
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default, deserialize_with = "checkbox")]
    pub use_tls: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub use_ssl: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_default: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_active: bool,
    #[validate(range(min = 1))]
    #[serde(default, deserialize_with = "optional_number")]
    pub daily_limit: Option<i32>,
    #[validate(range(min = 1))]
    #[serde(default, deserialize_with = "optional_number")]
    pub monthly_limit: Option<i32>,
}

/// SMTP settings after validation and provider presets.
struct Relay {
    provider: SmtpProvider,
    host: String,
    port: i32,
}

impl EmailConfigForm {
    fn relay(&self) -> Result<Relay, FormError> {
        let provider = match trimmed(self.smtp_provider.clone()) {
            Some(code) => code.parse::<SmtpProvider>()?,
            None => SmtpProvider::Custom,
        };
        let preset = provider.preset();
        let host = trimmed(self.smtp_host.clone())
            .or_else(|| preset.map(|(host, _)| host.to_string()))
            .ok_or_else(|| FormError::InvalidValue("SMTP host is required".into()))?;
        let port = self
            .smtp_port
            .or_else(|| preset.map(|(_, port)| port))
            .unwrap_or(DEFAULT_SMTP_PORT);
        Ok(Relay {
            provider,
            host,
            port,
        })
    }

    fn reply_to(&self) -> Result<Option<EmailAddress>, FormError> {
        Ok(trimmed(self.reply_to.clone())
            .map(EmailAddress::new)
            .transpose()?)
    }

    pub fn to_new_config(
        &self,
        user_id: UserId,
        verification_token: String,
    ) -> Result<NewEmailDomainConfig, FormError> {
        self.validate()?;
        let from_email = EmailAddress::new(&self.from_email)?;
        let domain_name = match trimmed(Some(self.domain_name.clone())) {
            Some(domain) => DomainName::new(domain)?,
            None => DomainName::new(from_email.domain())?,
        };
        let relay = self.relay()?;
        let password = trimmed(self.smtp_password.clone()).unwrap_or_default();

        Ok(NewEmailDomainConfig {
            user_id,
            dmarc_record: default_dmarc_record(&domain_name),
            domain_name,
            from_name: ammonia::clean(self.from_name.trim()),
            reply_to: self.reply_to()?,
            smtp_provider: relay.provider,
            smtp_host: relay.host,
            smtp_port: relay.port,
            smtp_username: self.smtp_username.trim().to_string(),
            smtp_password: obfuscate_password(&password),
            use_tls: self.use_tls,
            use_ssl: self.use_ssl,
            verification_token,
            spf_record: DEFAULT_SPF_RECORD.to_string(),
            is_default: self.is_default,
            daily_limit: self.daily_limit.unwrap_or(DEFAULT_DAILY_LIMIT),
            monthly_limit: self.monthly_limit.unwrap_or(DEFAULT_MONTHLY_LIMIT),
            from_email,
        })
    }

    pub fn to_update(&self) -> Result<UpdateEmailDomainConfig, FormError> {
        self.validate()?;
        let relay = self.relay()?;
        Ok(UpdateEmailDomainConfig {
            from_email: EmailAddress::new(&self.from_email)?,
            from_name: ammonia::clean(self.from_name.trim()),
            reply_to: self.reply_to()?,
            smtp_provider: relay.provider,
            smtp_host: relay.host,
            smtp_port: relay.port,
            smtp_username: self.smtp_username.trim().to_string(),
            smtp_password: trimmed(self.smtp_password.clone()).map(|p| obfuscate_password(&p)),
            use_tls: self.use_tls,
            use_ssl: self.use_ssl,
            is_default: self.is_default,
            is_active: self.is_active,
            daily_limit: self.daily_limit.unwrap_or(DEFAULT_DAILY_LIMIT),
            monthly_limit: self.monthly_limit.unwrap_or(DEFAULT_MONTHLY_LIMIT),
        })
    }
}
