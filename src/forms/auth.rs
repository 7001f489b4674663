//! Account forms: registration, login, password management and profile.

use serde::Deserialize;
use validator::Validate;

use crate::domain::types::{EmailAddress, PersonName, PhoneNumber, WebsiteUrl};
use crate::domain::user::{UpdateUser, validate_password_strength};
use crate::forms::{FormError, checkbox, clean_text, trimmed};

const DEFAULT_COUNTRY: &str = "CM";

/// Checks the password policy, then the confirmation.
pub fn check_new_password(password: &str, confirmation: &str) -> Result<(), FormError> {
    validate_password_strength(password)?;
    if password != confirmation {
        return Err(FormError::PasswordMismatch);
    }
    Ok(())
}

fn optional_phone(value: Option<String>) -> Result<Option<String>, FormError> {
    trimmed(value)
        .map(|phone| PhoneNumber::new(phone).map(PhoneNumber::into_inner))
        .transpose()
        .map_err(FormError::from)
}

fn optional_website(value: Option<String>) -> Result<Option<String>, FormError> {
    trimmed(value)
        .map(|url| WebsiteUrl::new(url).map(WebsiteUrl::into_inner))
        .transpose()
        .map_err(FormError::from)
}

fn country_code(value: Option<String>) -> String {
    trimmed(value)
        .map(|c| c.to_uppercase())
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_string())
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 150))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150))]
    pub last_name: String,
    pub password: String,
    pub password_confirm: String,
    #[validate(length(min = 1, max = 200))]
    pub company: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company_website: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub company_size: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Registration data after validation; the password is still plain text.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: EmailAddress,
    pub password: String,
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub company: String,
    pub phone: Option<String>,
    pub company_website: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub country: String,
    pub city: Option<String>,
}

impl TryFrom<RegisterForm> for Registration {
    type Error = FormError;

    fn try_from(form: RegisterForm) -> Result<Self, Self::Error> {
        form.validate()?;
        let email = EmailAddress::new(&form.email)?;
        check_new_password(&form.password, &form.password_confirm)?;

        Ok(Self {
            email,
            first_name: PersonName::new(ammonia::clean(&form.first_name))?,
            last_name: PersonName::new(ammonia::clean(&form.last_name))?,
            company: ammonia::clean(form.company.trim()),
            phone: optional_phone(form.phone)?,
            company_website: optional_website(form.company_website)?,
            industry: clean_text(form.industry),
            company_size: clean_text(form.company_size),
            country: country_code(form.country),
            city: clean_text(form.city),
            password: form.password,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailOnlyForm {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileForm {
    #[validate(length(min = 1, max = 150))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150))]
    pub last_name: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company_website: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub company_size: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "checkbox")]
    pub receive_notifications: bool,
}

impl TryFrom<ProfileForm> for UpdateUser {
    type Error = FormError;

    fn try_from(form: ProfileForm) -> Result<Self, Self::Error> {
        form.validate()?;
        Ok(Self {
            first_name: PersonName::new(ammonia::clean(&form.first_name))?.into_inner(),
            last_name: PersonName::new(ammonia::clean(&form.last_name))?.into_inner(),
            company: ammonia::clean(form.company.trim()),
            phone: optional_phone(form.phone)?,
            company_website: optional_website(form.company_website)?,
            industry: clean_text(form.industry),
            company_size: clean_text(form.company_size),
            country: country_code(form.country),
            city: clean_text(form.city),
            preferred_language: trimmed(form.preferred_language).unwrap_or_else(|| "en".into()),
            timezone: trimmed(form.timezone).unwrap_or_else(|| "Africa/Douala".into()),
            receive_notifications: form.receive_notifications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::PasswordStrengthError;

    fn register_form() -> RegisterForm {
        RegisterForm {
            email: " Marie@TechStartup.cm ".into(),
            first_name: "Marie".into(),
            last_name: "Kouam".into(),
            password: "Douala2025!".into(),
            password_confirm: "Douala2025!".into(),
            company: "TechStartup".into(),
            phone: Some("+237 691 234 567".into()),
            company_website: None,
            industry: None,
            company_size: None,
            country: None,
            city: Some("Douala".into()),
        }
    }

    #[test]
    fn registration_normalizes_fields() {
        let registration = Registration::try_from(register_form()).unwrap();
        assert_eq!(registration.email.as_str(), "marie@techstartup.cm");
        assert_eq!(registration.phone.as_deref(), Some("+237691234567"));
        assert_eq!(registration.country, "CM");
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let mut form = register_form();
        form.password_confirm = "Douala2026!".into();
        assert!(matches!(
            Registration::try_from(form),
            Err(FormError::PasswordMismatch)
        ));
    }

    #[test]
    fn weak_passwords_are_rejected() {
        assert!(matches!(
            check_new_password("short", "short"),
            Err(FormError::WeakPassword(PasswordStrengthError::TooShort))
        ));
        assert!(check_new_password("Str0ng!Pass", "Str0ng!Pass").is_ok());
    }
}
