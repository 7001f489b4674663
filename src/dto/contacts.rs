use serde::{Deserialize, Serialize};

use crate::domain::contact::{Contact, ContactStatistics};
use crate::domain::contact_list::{ContactList, ContactTag};
use crate::domain::import::ContactImport;
use crate::pagination::Paginated;

/// Filters accepted by the contact list page.
#[derive(Debug, Default, Deserialize)]
pub struct ContactsQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub list_id: Option<i32>,
    pub tag_id: Option<i32>,
    pub page: Option<usize>,
}

#[derive(Serialize)]
pub struct ContactsPageData {
    pub contacts: Paginated<Contact>,
    pub total: usize,
    pub search_query: Option<String>,
    pub status: Option<String>,
    pub list_id: Option<i32>,
    pub tag_id: Option<i32>,
    pub lists: Vec<ContactList>,
    pub tags: Vec<ContactTag>,
}

/// Contact with the lists and tags it belongs to.
#[derive(Debug, Serialize)]
pub struct ContactDetail {
    pub contact: Contact,
    pub lists: Vec<ContactList>,
    pub tags: Vec<ContactTag>,
    pub open_rate: f64,
    pub click_rate: f64,
}

/// Offset-based page returned by `GET /api/contacts`.
#[derive(Debug, Deserialize)]
pub struct ApiContactsQuery {
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ApiContactsPage {
    pub contacts: Vec<Contact>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_next: bool,
}

#[derive(Debug, Serialize)]
pub struct ContactStatisticsPage {
    pub statistics: ContactStatistics,
    pub recent_imports: Vec<ContactImport>,
}
