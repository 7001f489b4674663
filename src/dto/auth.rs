use serde::Serialize;

use crate::domain::user::{UsageStats, User, UserActivity, UserProfile};

/// Data required to render the profile page.
#[derive(Debug, Serialize)]
pub struct ProfilePageData {
    pub user: User,
    pub profile: Option<UserProfile>,
    pub usage: UsageStats,
    pub recent_activity: Vec<UserActivity>,
}
