use serde::{Deserialize, Serialize};

use crate::domain::analytics::CampaignAnalytics;
use crate::domain::campaign::{CampaignStatistics, EmailCampaign, TimelineEntry};
use crate::domain::contact_list::ContactList;
use crate::domain::email_config::EmailDomainConfig;
use crate::domain::template::EmailTemplate;
use crate::pagination::Paginated;

#[derive(Debug, Default, Deserialize)]
pub struct CampaignsQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<usize>,
}

#[derive(Serialize)]
pub struct CampaignsPageData {
    pub campaigns: Paginated<EmailCampaign>,
    pub total: usize,
    pub search_query: Option<String>,
    pub status: Option<String>,
}

/// Choices offered by the campaign editor.
#[derive(Debug, Serialize)]
pub struct CampaignFormData {
    pub lists: Vec<ContactList>,
    pub email_configs: Vec<EmailDomainConfig>,
    pub templates: Vec<EmailTemplate>,
}

#[derive(Debug, Serialize)]
pub struct CampaignDetail {
    pub campaign: EmailCampaign,
    pub lists: Vec<ContactList>,
    pub email_config: Option<EmailDomainConfig>,
    pub statistics: CampaignStatistics,
}

/// Campaign content rendered for one sample recipient.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CampaignPreview {
    pub recipient: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CampaignAnalyticsPage {
    pub campaign: EmailCampaign,
    pub statistics: CampaignStatistics,
    pub timeline: Vec<TimelineEntry>,
    pub daily: Vec<CampaignAnalytics>,
}
