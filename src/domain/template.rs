use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{TemplateId, TemplateName, UserId, code_enum};

code_enum! {
    TemplateType {
        Newsletter => "NEWSLETTER",
        Promotional => "PROMOTIONAL",
        Transactional => "TRANSACTIONAL",
        Welcome => "WELCOME",
        Announcement => "ANNOUNCEMENT",
        Custom => "CUSTOM",
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmailTemplate {
    pub id: TemplateId,
    pub user_id: UserId,
    pub name: TemplateName,
    pub template_type: TemplateType,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub is_active: bool,
    /// Shared templates are visible to every user.
    pub is_shared: bool,
    pub usage_count: i32,
    pub last_used_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl EmailTemplate {
    pub fn is_visible_to(&self, user_id: UserId) -> bool {
        self.user_id == user_id || (self.is_shared && self.is_active)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewEmailTemplate {
    pub user_id: UserId,
    pub name: TemplateName,
    pub template_type: TemplateType,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub is_shared: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateEmailTemplate {
    pub name: TemplateName,
    pub template_type: TemplateType,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub is_active: bool,
    pub is_shared: bool,
}
