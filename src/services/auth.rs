//! Account lifecycle: registration, email verification, sign-in and passwords.

use uuid::Uuid;
use validator::Validate;

use crate::domain::auth::AuthenticatedUser;
use crate::domain::types::EmailAddress;
use crate::domain::user::{
    ActivityType, NewUser, NewUserActivity, RequestMeta, UpdateUser, User, UserRole,
    start_of_month,
};
use crate::dto::auth::ProfilePageData;
use crate::forms::auth::{
    ChangePasswordForm, LoginForm, ProfileForm, RegisterForm, Registration, ResetPasswordForm,
    check_new_password,
};
use crate::models::zmq::{PlatformEmail, WorkerMessage};
use crate::repository::{UserReader, UserWriter};
use crate::services::{ServiceError, ServiceResult, Site, notify_worker, now, owner_id};
use crate::zmq::WorkerNotifier;

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const EMAIL_NOT_VERIFIED: &str = "Please verify your email before logging in";
const RECENT_ACTIVITY_LIMIT: i64 = 10;

pub fn hash_password(password: &str) -> ServiceResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|err| {
        log::error!("Failed to hash password: {err}");
        ServiceError::Internal
    })
}

fn password_matches(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn verification_email(site: &Site, user: &User, token: &str) -> PlatformEmail {
    let link = site.url(&format!("/auth/verify-email/{token}/"));
    PlatformEmail {
        to: user.email.to_string(),
        subject: format!("Verify your {} account", site.platform_name),
        html: format!(
            "<p>Hello {name},</p><p>Confirm your email address to activate your {platform} \
             account:</p><p><a href=\"{link}\">{link}</a></p><p>The link expires in 24 hours.</p>",
            name = user.short_name(),
            platform = site.platform_name,
        ),
        text: format!(
            "Hello {},\n\nConfirm your email address: {link}\n\nThe link expires in 24 hours.",
            user.short_name()
        ),
    }
}

fn password_reset_email(site: &Site, user: &User, token: &str) -> PlatformEmail {
    let link = site.url(&format!("/auth/password-reset/{token}/"));
    PlatformEmail {
        to: user.email.to_string(),
        subject: format!("Reset your {} password", site.platform_name),
        html: format!(
            "<p>Hello {name},</p><p>Use the link below to choose a new password:</p>\
             <p><a href=\"{link}\">{link}</a></p><p>If you did not ask for this, ignore this \
             email.</p>",
            name = user.short_name(),
        ),
        text: format!(
            "Hello {},\n\nChoose a new password: {link}\n\nIf you did not ask for this, ignore \
             this email.",
            user.short_name()
        ),
    }
}

fn log_activity<R>(repo: &R, activity: NewUserActivity)
where
    R: UserWriter + ?Sized,
{
    if let Err(err) = repo.log_activity(&activity) {
        log::error!("Failed to log {} activity: {err}", activity.activity_type);
    }
}

/// Creates an inactive client account and sends the verification link.
pub fn register<R, N>(
    repo: &R,
    notifier: &N,
    site: &Site,
    form: RegisterForm,
    meta: &RequestMeta,
) -> ServiceResult<User>
where
    R: UserReader + UserWriter + ?Sized,
    N: WorkerNotifier + ?Sized,
{
    let registration = Registration::try_from(form)?;

    if repo.get_user_by_email(&registration.email)?.is_some() {
        return Err(ServiceError::Form("Email already registered".to_string()));
    }

    let token = new_token();
    let new_user = NewUser {
        password_hash: hash_password(&registration.password)?,
        first_name: registration.first_name.into_inner(),
        last_name: registration.last_name.into_inner(),
        phone: registration.phone,
        company: registration.company,
        company_website: registration.company_website,
        industry: registration.industry,
        company_size: registration.company_size,
        country: registration.country,
        city: registration.city,
        role: UserRole::Client,
        is_active: false,
        is_email_verified: false,
        email_verification_token: Some(token.clone()),
        email_verification_sent_at: Some(now()),
        email: registration.email,
    };

    let user = repo.create_user(&new_user).map_err(|err| {
        log::error!("Failed to create user: {err}");
        err
    })?;

    notify_worker(
        notifier,
        &WorkerMessage::SendEmail(verification_email(site, &user, &token)),
    );
    log_activity(
        repo,
        NewUserActivity::new(user.id, ActivityType::Registration, "User registered", meta),
    );

    Ok(user)
}

pub fn verify_email<R>(repo: &R, token: &str) -> ServiceResult<User>
where
    R: UserReader + UserWriter + ?Sized,
{
    let user = repo
        .get_user_by_verification_token(token)?
        .ok_or_else(|| ServiceError::Form("Invalid verification token".to_string()))?;

    let at = now();
    if !user.verification_token_valid(token, at) {
        return Err(ServiceError::Form(
            "Verification token has expired".to_string(),
        ));
    }

    let user = repo.mark_email_verified(user.id, at)?;
    log_activity(
        repo,
        NewUserActivity::new(
            user.id,
            ActivityType::EmailVerified,
            "Email verified successfully",
            &RequestMeta::default(),
        ),
    );
    Ok(user)
}

/// Issues a fresh verification token, at most once every five minutes.
pub fn resend_verification<R, N>(
    repo: &R,
    notifier: &N,
    site: &Site,
    email: &str,
) -> ServiceResult<()>
where
    R: UserReader + UserWriter + ?Sized,
    N: WorkerNotifier + ?Sized,
{
    let not_found =
        || ServiceError::Form("User not found or email already verified".to_string());
    let email = EmailAddress::new(email).map_err(|_| not_found())?;
    let user = repo
        .get_user_by_email(&email)?
        .filter(|user| !user.is_email_verified)
        .ok_or_else(not_found)?;

    let at = now();
    if !user.can_resend_verification(at) {
        return Err(ServiceError::LimitExceeded(
            "Please wait 5 minutes before requesting another verification email".to_string(),
        ));
    }

    let token = new_token();
    repo.set_verification_token(user.id, &token, at)?;
    notify_worker(
        notifier,
        &WorkerMessage::SendEmail(verification_email(site, &user, &token)),
    );
    Ok(())
}

/// Checks the credentials and records the sign-in.
pub fn login<R>(repo: &R, form: LoginForm, meta: &RequestMeta) -> ServiceResult<User>
where
    R: UserReader + UserWriter + ?Sized,
{
    let invalid = || ServiceError::Form(INVALID_CREDENTIALS.to_string());
    form.validate().map_err(|_| invalid())?;
    let email = EmailAddress::new(&form.email).map_err(|_| invalid())?;

    let user = repo.get_user_by_email(&email)?.ok_or_else(invalid)?;
    if !password_matches(&form.password, &user.password_hash) {
        return Err(invalid());
    }
    if !user.is_email_verified {
        return Err(ServiceError::InvalidState(EMAIL_NOT_VERIFIED.to_string()));
    }
    if !user.is_active {
        return Err(invalid());
    }

    repo.record_login(user.id, meta.ip_address.as_deref(), now())
        .map_err(|err| {
            log::error!("Failed to record login: {err}");
            err
        })?;
    log_activity(
        repo,
        NewUserActivity::new(user.id, ActivityType::Login, "User logged in", meta),
    );
    Ok(user)
}

pub fn logout<R>(repo: &R, user: &AuthenticatedUser, meta: &RequestMeta) -> ServiceResult<()>
where
    R: UserWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    log_activity(
        repo,
        NewUserActivity::new(user_id, ActivityType::Logout, "User logged out", meta),
    );
    Ok(())
}

/// Sends a reset link when the account exists; the outcome is never revealed.
pub fn request_password_reset<R, N>(
    repo: &R,
    notifier: &N,
    site: &Site,
    email: &str,
    meta: &RequestMeta,
) -> ServiceResult<()>
where
    R: UserReader + UserWriter + ?Sized,
    N: WorkerNotifier + ?Sized,
{
    let Ok(email) = EmailAddress::new(email) else {
        return Ok(());
    };
    let Some(user) = repo.get_user_by_email(&email)?.filter(|u| u.is_active) else {
        return Ok(());
    };

    let token = new_token();
    repo.set_password_reset_token(user.id, &token, now())?;
    notify_worker(
        notifier,
        &WorkerMessage::SendEmail(password_reset_email(site, &user, &token)),
    );
    log_activity(
        repo,
        NewUserActivity::new(
            user.id,
            ActivityType::PasswordResetRequested,
            "Password reset requested",
            meta,
        ),
    );
    Ok(())
}

/// Whether the reset link is still usable; used to render the reset page.
pub fn check_reset_token<R>(repo: &R, token: &str) -> ServiceResult<User>
where
    R: UserReader + ?Sized,
{
    let user = repo
        .get_user_by_reset_token(token)?
        .ok_or_else(|| ServiceError::Form("Invalid reset token".to_string()))?;
    if !user.password_reset_valid(now()) {
        return Err(ServiceError::Form("Reset token has expired".to_string()));
    }
    Ok(user)
}

pub fn reset_password<R>(repo: &R, token: &str, form: ResetPasswordForm) -> ServiceResult<()>
where
    R: UserReader + UserWriter + ?Sized,
{
    let user = check_reset_token(repo, token)?;
    check_new_password(&form.password, &form.password_confirm)?;

    repo.update_password(user.id, &hash_password(&form.password)?, now())?;
    log_activity(
        repo,
        NewUserActivity::new(
            user.id,
            ActivityType::PasswordChange,
            "Password reset completed",
            &RequestMeta::default(),
        ),
    );
    Ok(())
}

pub fn change_password<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: ChangePasswordForm,
    meta: &RequestMeta,
) -> ServiceResult<()>
where
    R: UserReader + UserWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let account = repo.get_user_by_id(user_id)?.ok_or(ServiceError::NotFound)?;

    if !password_matches(&form.old_password, &account.password_hash) {
        return Err(ServiceError::Form(
            "Current password is incorrect".to_string(),
        ));
    }
    check_new_password(&form.new_password, &form.new_password_confirm)?;

    repo.update_password(user_id, &hash_password(&form.new_password)?, now())?;
    log_activity(
        repo,
        NewUserActivity::new(
            user_id,
            ActivityType::PasswordChange,
            "Password changed by user",
            meta,
        ),
    );
    Ok(())
}

pub fn load_profile<R>(repo: &R, user: &AuthenticatedUser) -> ServiceResult<ProfilePageData>
where
    R: UserReader + ?Sized,
{
    let user_id = owner_id(user)?;
    let account = repo.get_user_by_id(user_id)?.ok_or(ServiceError::NotFound)?;
    let profile = repo.get_user_profile(user_id)?;
    let usage = repo
        .get_usage_stats(user_id, start_of_month(now()))
        .map_err(|err| {
            log::error!("Failed to load usage stats: {err}");
            err
        })?;
    let recent_activity = repo.list_user_activities(user_id, RECENT_ACTIVITY_LIMIT)?;

    Ok(ProfilePageData {
        user: account,
        profile,
        usage,
        recent_activity,
    })
}

pub fn update_profile<R>(
    repo: &R,
    user: &AuthenticatedUser,
    form: ProfileForm,
    meta: &RequestMeta,
) -> ServiceResult<User>
where
    R: UserWriter + ?Sized,
{
    let user_id = owner_id(user)?;
    let updates = UpdateUser::try_from(form)?;

    let updated = repo.update_user(user_id, &updates).map_err(|err| {
        log::error!("Failed to update profile: {err}");
        err
    })?;
    log_activity(
        repo,
        NewUserActivity::new(user_id, ActivityType::ProfileUpdated, "Profile updated", meta),
    );
    Ok(updated)
}
