//! Platform users, their sending quotas and the audit trail of their actions.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::types::{ActivityId, EmailAddress, UserId, code_enum};

/// How long an email verification link stays valid.
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;
/// How long a password reset link stays valid.
pub const PASSWORD_RESET_TTL_HOURS: i64 = 24;
/// Minimum delay between two verification emails.
pub const VERIFICATION_RESEND_MINUTES: i64 = 5;

const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";
const COMMON_PASSWORDS: [&str; 10] = [
    "password",
    "123456",
    "123456789",
    "qwerty",
    "abc123",
    "password123",
    "admin",
    "letmein",
    "welcome",
    "monkey",
];

code_enum! {
    /// Account role; super admins operate the platform itself.
    UserRole {
        SuperAdmin => "SUPER_ADMIN",
        Client => "CLIENT",
    }
}

/// Reasons a password is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordStrengthError {
    #[error("Password must be at least 8 characters long")]
    TooShort,
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("Password must contain at least one number")]
    MissingDigit,
    #[error("Password must contain at least one special character")]
    MissingSpecial,
    #[error("Password is too common")]
    TooCommon,
}

/// Checks the password policy, reporting the first rule that fails.
pub fn validate_password_strength(password: &str) -> Result<(), PasswordStrengthError> {
    if password.chars().count() < 8 {
        return Err(PasswordStrengthError::TooShort);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(PasswordStrengthError::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(PasswordStrengthError::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordStrengthError::MissingDigit);
    }
    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err(PasswordStrengthError::MissingSpecial);
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err(PasswordStrengthError::TooCommon);
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub company: String,
    pub company_website: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub country: String,
    pub city: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    pub email_verification_sent_at: Option<NaiveDateTime>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    pub password_reset_sent_at: Option<NaiveDateTime>,
    pub login_count: i32,
    pub last_login_at: Option<NaiveDateTime>,
    pub last_login_ip: Option<String>,
    pub preferred_language: String,
    pub timezone: String,
    pub receive_notifications: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn short_name(&self) -> &str {
        if self.first_name.is_empty() {
            self.email.local_part()
        } else {
            &self.first_name
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == UserRole::SuperAdmin
    }

    pub fn can_access_admin_panel(&self) -> bool {
        self.is_super_admin()
    }

    /// Whether `token` matches the pending verification token and is not expired.
    pub fn verification_token_valid(&self, token: &str, now: NaiveDateTime) -> bool {
        match (&self.email_verification_token, self.email_verification_sent_at) {
            (Some(expected), Some(sent_at)) => {
                expected == token && now - sent_at <= Duration::hours(VERIFICATION_TOKEN_TTL_HOURS)
            }
            _ => false,
        }
    }

    /// Whether a new verification email may be sent right now.
    pub fn can_resend_verification(&self, now: NaiveDateTime) -> bool {
        match self.email_verification_sent_at {
            Some(sent_at) => now - sent_at >= Duration::minutes(VERIFICATION_RESEND_MINUTES),
            None => true,
        }
    }

    pub fn password_reset_valid(&self, now: NaiveDateTime) -> bool {
        self.password_reset_sent_at
            .is_some_and(|sent_at| now - sent_at <= Duration::hours(PASSWORD_RESET_TTL_HOURS))
    }
}

/// Account data persisted on registration.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: EmailAddress,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub company: String,
    pub company_website: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub country: String,
    pub city: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub email_verification_token: Option<String>,
    pub email_verification_sent_at: Option<NaiveDateTime>,
}

/// Editable profile fields.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateUser {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub company: String,
    pub company_website: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub country: String,
    pub city: Option<String>,
    pub preferred_language: String,
    pub timezone: String,
    pub receive_notifications: bool,
}

/// Per-user quotas and display preferences.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub max_contacts: i32,
    pub max_campaigns_per_month: i32,
    pub max_emails_per_month: i32,
    pub items_per_page: i32,
    pub default_from_name: Option<String>,
    pub default_reply_to: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl UserProfile {
    pub const DEFAULT_MAX_CONTACTS: i32 = 10_000;
    pub const DEFAULT_MAX_CAMPAIGNS_PER_MONTH: i32 = 100;
    pub const DEFAULT_MAX_EMAILS_PER_MONTH: i32 = 50_000;
    pub const DEFAULT_ITEMS_PER_PAGE: i32 = 20;

    pub fn can_create_contact(&self, current_contacts: i64) -> bool {
        current_contacts < i64::from(self.max_contacts)
    }

    pub fn can_create_campaign(&self, campaigns_this_month: i64) -> bool {
        campaigns_this_month < i64::from(self.max_campaigns_per_month)
    }

    pub fn per_page(&self) -> usize {
        usize::try_from(self.items_per_page.max(1)).unwrap_or(20)
    }
}

/// First instant of the month containing `now`.
pub fn start_of_month(now: NaiveDateTime) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(now)
}

/// Aggregate usage numbers shown on the profile page.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct UsageStats {
    pub total_contacts: i64,
    pub total_campaigns: i64,
    pub campaigns_this_month: i64,
    pub total_emails_sent: i64,
}

code_enum! {
    ActivityType {
        Registration => "REGISTRATION",
        Login => "LOGIN",
        Logout => "LOGOUT",
        PasswordChange => "PASSWORD_CHANGE",
        PasswordResetRequested => "PASSWORD_RESET_REQUESTED",
        EmailVerified => "EMAIL_VERIFIED",
        ProfileUpdated => "PROFILE_UPDATED",
        ContactCreated => "CONTACT_CREATED",
        ContactImported => "CONTACT_IMPORTED",
        CampaignCreated => "CAMPAIGN_CREATED",
        CampaignSent => "CAMPAIGN_SENT",
        EmailConfigAdded => "EMAIL_CONFIG_ADDED",
        DomainVerified => "DOMAIN_VERIFIED",
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserActivity {
    pub id: ActivityId,
    pub user_id: UserId,
    pub activity_type: ActivityType,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Value,
    pub created_at: NaiveDateTime,
}

/// Request details captured alongside an activity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewUserActivity {
    pub user_id: UserId,
    pub activity_type: ActivityType,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Value,
}

impl NewUserActivity {
    pub fn new(
        user_id: UserId,
        activity_type: ActivityType,
        description: impl Into<String>,
        meta: &RequestMeta,
    ) -> Self {
        Self {
            user_id,
            activity_type,
            description: description.into(),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::*;

    pub(crate) fn sample_user(role: UserRole) -> User {
        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        User {
            id: UserId::new(1).unwrap(),
            email: EmailAddress::new("marie@techstartup.cm").unwrap(),
            password_hash: String::new(),
            first_name: "Marie".into(),
            last_name: "Kouam".into(),
            phone: None,
            company: "TechStartup".into(),
            company_website: None,
            industry: None,
            company_size: None,
            country: "CM".into(),
            city: Some("Douala".into()),
            role,
            is_active: true,
            is_email_verified: true,
            email_verification_token: None,
            email_verification_sent_at: None,
            password_reset_token: None,
            password_reset_sent_at: None,
            login_count: 0,
            last_login_at: None,
            last_login_ip: None,
            preferred_language: "en".into(),
            timezone: "Africa/Douala".into(),
            receive_notifications: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_policy_reports_first_failure() {
        assert_eq!(
            validate_password_strength("Ab1!"),
            Err(PasswordStrengthError::TooShort)
        );
        assert_eq!(
            validate_password_strength("abcdefg1!"),
            Err(PasswordStrengthError::MissingUppercase)
        );
        assert_eq!(
            validate_password_strength("ABCDEFG1!"),
            Err(PasswordStrengthError::MissingLowercase)
        );
        assert_eq!(
            validate_password_strength("Abcdefgh!"),
            Err(PasswordStrengthError::MissingDigit)
        );
        assert_eq!(
            validate_password_strength("Abcdefgh1"),
            Err(PasswordStrengthError::MissingSpecial)
        );
        assert!(validate_password_strength("SuperAdmin123!").is_ok());
    }

    #[test]
    fn quotas_are_exclusive_upper_bounds() {
        let now = sample_user(UserRole::Client).created_at;
        let profile = UserProfile {
            user_id: UserId::new(1).unwrap(),
            max_contacts: 2,
            max_campaigns_per_month: 1,
            max_emails_per_month: UserProfile::DEFAULT_MAX_EMAILS_PER_MONTH,
            items_per_page: 0,
            default_from_name: None,
            default_reply_to: None,
            created_at: now,
            updated_at: now,
        };
        assert!(profile.can_create_contact(1));
        assert!(!profile.can_create_contact(2));
        assert!(profile.can_create_campaign(0));
        assert!(!profile.can_create_campaign(1));
        assert_eq!(profile.per_page(), 1);
    }

    #[test]
    fn only_super_admins_reach_admin_panel() {
        assert!(sample_user(UserRole::SuperAdmin).can_access_admin_panel());
        assert!(!sample_user(UserRole::Client).can_access_admin_panel());
    }

    #[test]
    fn verification_token_expires_after_a_day() {
        let mut user = sample_user(UserRole::Client);
        let sent = user.created_at;
        user.email_verification_token = Some("tok".into());
        user.email_verification_sent_at = Some(sent);

        assert!(user.verification_token_valid("tok", sent + Duration::hours(23)));
        assert!(!user.verification_token_valid("other", sent));
        assert!(!user.verification_token_valid("tok", sent + Duration::hours(25)));
    }

    #[test]
    fn verification_resend_is_throttled() {
        let mut user = sample_user(UserRole::Client);
        let sent = user.created_at;
        user.email_verification_sent_at = Some(sent);

        assert!(!user.can_resend_verification(sent + Duration::minutes(4)));
        assert!(user.can_resend_verification(sent + Duration::minutes(5)));
    }

    #[test]
    fn start_of_month_truncates_to_first_day() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(start_of_month(now), expected);
    }

    #[test]
    fn role_codes_round_trip_through_strings() {
        assert_eq!("super_admin".parse::<UserRole>(), Ok(UserRole::SuperAdmin));
        assert_eq!(UserRole::Client.as_str(), "CLIENT");
        assert!("owner".parse::<UserRole>().is_err());
    }
}
