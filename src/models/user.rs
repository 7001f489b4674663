use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::types::{ActivityId, EmailAddress, TypeConstraintError, UserId};
use crate::domain::user::{
    NewUser as DomainNewUser, NewUserActivity as DomainNewUserActivity, UpdateUser as DomainUpdateUser,
    User as DomainUser, UserActivity as DomainUserActivity, UserProfile as DomainUserProfile,
};
use crate::models::{parse_json, to_json};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
/// Diesel model for [`crate::domain::user::User`].
pub struct User {
    pub id: i32,
    pub email: String,
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
    pub role: String,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub email_verification_token: Option<String>,
    pub email_verification_sent_at: Option<NaiveDateTime>,
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

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<&'a str>,
    pub company: &'a str,
    pub company_website: Option<&'a str>,
    pub industry: Option<&'a str>,
    pub company_size: Option<&'a str>,
    pub country: &'a str,
    pub city: Option<&'a str>,
    pub role: &'a str,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub email_verification_token: Option<&'a str>,
    pub email_verification_sent_at: Option<NaiveDateTime>,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::users)]
#[diesel(treat_none_as_null = true)]
pub struct UpdateUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<&'a str>,
    pub company: &'a str,
    pub company_website: Option<&'a str>,
    pub industry: Option<&'a str>,
    pub company_size: Option<&'a str>,
    pub country: &'a str,
    pub city: Option<&'a str>,
    pub preferred_language: &'a str,
    pub timezone: &'a str,
    pub receive_notifications: bool,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<User> for DomainUser {
    type Error = TypeConstraintError;

    fn try_from(user: User) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(user.id)?,
            email: EmailAddress::new(user.email)?,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            company: user.company,
            company_website: user.company_website,
            industry: user.industry,
            company_size: user.company_size,
            country: user.country,
            city: user.city,
            role: user.role.parse()?,
            is_active: user.is_active,
            is_email_verified: user.is_email_verified,
            email_verification_token: user.email_verification_token,
            email_verification_sent_at: user.email_verification_sent_at,
            password_reset_token: user.password_reset_token,
            password_reset_sent_at: user.password_reset_sent_at,
            login_count: user.login_count,
            last_login_at: user.last_login_at,
            last_login_ip: user.last_login_ip,
            preferred_language: user.preferred_language,
            timezone: user.timezone,
            receive_notifications: user.receive_notifications,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }
}

impl<'a> From<&'a DomainNewUser> for NewUser<'a> {
    fn from(user: &'a DomainNewUser) -> Self {
        Self {
            email: user.email.as_str(),
            password_hash: &user.password_hash,
            first_name: &user.first_name,
            last_name: &user.last_name,
            phone: user.phone.as_deref(),
            company: &user.company,
            company_website: user.company_website.as_deref(),
            industry: user.industry.as_deref(),
            company_size: user.company_size.as_deref(),
            country: &user.country,
            city: user.city.as_deref(),
            role: user.role.as_str(),
            is_active: user.is_active,
            is_email_verified: user.is_email_verified,
            email_verification_token: user.email_verification_token.as_deref(),
            email_verification_sent_at: user.email_verification_sent_at,
        }
    }
}

impl<'a> UpdateUser<'a> {
    pub fn new(update: &'a DomainUpdateUser, now: NaiveDateTime) -> Self {
        Self {
            first_name: &update.first_name,
            last_name: &update.last_name,
            phone: update.phone.as_deref(),
            company: &update.company,
            company_website: update.company_website.as_deref(),
            industry: update.industry.as_deref(),
            company_size: update.company_size.as_deref(),
            country: &update.country,
            city: update.city.as_deref(),
            preferred_language: &update.preferred_language,
            timezone: &update.timezone,
            receive_notifications: update.receive_notifications,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::user_profiles)]
pub struct UserProfile {
    pub user_id: i32,
    pub max_contacts: i32,
    pub max_campaigns_per_month: i32,
    pub max_emails_per_month: i32,
    pub items_per_page: i32,
    pub default_from_name: Option<String>,
    pub default_reply_to: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<UserProfile> for DomainUserProfile {
    type Error = TypeConstraintError;

    fn try_from(profile: UserProfile) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::new(profile.user_id)?,
            max_contacts: profile.max_contacts,
            max_campaigns_per_month: profile.max_campaigns_per_month,
            max_emails_per_month: profile.max_emails_per_month,
            items_per_page: profile.items_per_page,
            default_from_name: profile.default_from_name,
            default_reply_to: profile.default_reply_to,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        })
    }
}

impl From<&DomainUserProfile> for UserProfile {
    fn from(profile: &DomainUserProfile) -> Self {
        Self {
            user_id: profile.user_id.get(),
            max_contacts: profile.max_contacts,
            max_campaigns_per_month: profile.max_campaigns_per_month,
            max_emails_per_month: profile.max_emails_per_month,
            items_per_page: profile.items_per_page,
            default_from_name: profile.default_from_name.clone(),
            default_reply_to: profile.default_reply_to.clone(),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::user_activities)]
pub struct UserActivity {
    pub id: i32,
    pub user_id: i32,
    pub activity_type: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::user_activities)]
pub struct NewUserActivity<'a> {
    pub user_id: i32,
    pub activity_type: &'a str,
    pub description: &'a str,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub metadata: String,
}

impl TryFrom<UserActivity> for DomainUserActivity {
    type Error = TypeConstraintError;

    fn try_from(activity: UserActivity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ActivityId::new(activity.id)?,
            user_id: UserId::new(activity.user_id)?,
            activity_type: activity.activity_type.parse()?,
            description: activity.description,
            ip_address: activity.ip_address,
            user_agent: activity.user_agent,
            metadata: parse_json(&activity.metadata, "metadata")?,
            created_at: activity.created_at,
        })
    }
}

impl<'a> From<&'a DomainNewUserActivity> for NewUserActivity<'a> {
    fn from(activity: &'a DomainNewUserActivity) -> Self {
        Self {
            user_id: activity.user_id.get(),
            activity_type: activity.activity_type.as_str(),
            description: &activity.description,
            ip_address: activity.ip_address.as_deref(),
            user_agent: activity.user_agent.as_deref(),
            metadata: to_json(&activity.metadata),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::domain::user::{ActivityType, RequestMeta, UserRole};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn db_user(role: &str) -> User {
        User {
            id: 4,
            email: "Amadou@Example.com".into(),
            password_hash: "hash".into(),
            first_name: "Amadou".into(),
            last_name: "Diallo".into(),
            phone: None,
            company: "Dakar Digital".into(),
            company_website: None,
            industry: None,
            company_size: None,
            country: "SN".into(),
            city: None,
            role: role.into(),
            is_active: true,
            is_email_verified: true,
            email_verification_token: None,
            email_verification_sent_at: None,
            password_reset_token: None,
            password_reset_sent_at: None,
            login_count: 3,
            last_login_at: None,
            last_login_ip: None,
            preferred_language: "fr".into(),
            timezone: "Africa/Dakar".into(),
            receive_notifications: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn user_row_converts_into_domain() {
        let user: DomainUser = db_user("CLIENT").try_into().unwrap();
        assert_eq!(user.id.get(), 4);
        assert_eq!(user.email.as_str(), "amadou@example.com");
        assert_eq!(user.role, UserRole::Client);
        assert_eq!(user.login_count, 3);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result: Result<DomainUser, _> = db_user("OWNER").try_into();
        assert!(result.is_err());
    }

    #[test]
    fn activity_metadata_is_serialized_as_json_text() {
        let meta = RequestMeta {
            ip_address: Some("10.0.0.1".into()),
            user_agent: None,
        };
        let domain = DomainNewUserActivity::new(
            UserId::new(4).unwrap(),
            ActivityType::Login,
            "User logged in",
            &meta,
        )
        .with_metadata(json!({"remember": true}));
        let row: NewUserActivity = (&domain).into();
        assert_eq!(row.activity_type, "LOGIN");
        assert_eq!(row.ip_address, Some("10.0.0.1"));
        assert_eq!(row.metadata, r#"{"remember":true}"#);

        let stored = UserActivity {
            id: 1,
            user_id: 4,
            activity_type: "LOGIN".into(),
            description: "User logged in".into(),
            ip_address: None,
            user_agent: None,
            metadata: row.metadata.clone(),
            created_at: now(),
        };
        let activity: DomainUserActivity = stored.try_into().unwrap();
        assert_eq!(activity.metadata, json!({"remember": true}));
    }
}
