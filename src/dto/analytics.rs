use serde::{Deserialize, Serialize};

use crate::domain::analytics::{Dashboard, PlatformAnalytics, SystemStatistics};
use crate::domain::campaign::CampaignSummary;
use crate::domain::event::{DeliveryStatistics, EmailEvent};
use crate::domain::queue::QueueStatistics;
use crate::domain::user::User;
use crate::pagination::Paginated;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<i64>,
}

/// Payload of the analytics page and `GET /api/analytics/overview`.
#[derive(Debug, Serialize)]
pub struct AnalyticsOverview {
    pub dashboard: Dashboard,
    pub delivery: DeliveryStatistics,
    pub campaigns: CampaignSummary,
}

#[derive(Debug, Serialize)]
pub struct SystemStatsPage {
    pub statistics: SystemStatistics,
    pub queue: QueueStatistics,
    pub delivery: DeliveryStatistics,
    pub history: Vec<PlatformAnalytics>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
}

#[derive(Serialize)]
pub struct UsersPageData {
    pub users: Paginated<User>,
    pub total: usize,
    pub search_query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmailLogsPage {
    pub events: Vec<EmailEvent>,
}
