use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::template::{
    EmailTemplate as DomainEmailTemplate, NewEmailTemplate as DomainNewEmailTemplate,
    UpdateEmailTemplate as DomainUpdateEmailTemplate,
};
use crate::domain::types::{TemplateId, TemplateName, TypeConstraintError, UserId};

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(table_name = crate::schema::email_templates)]
pub struct EmailTemplate {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub template_type: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub is_active: bool,
    pub is_shared: bool,
    pub usage_count: i32,
    pub last_used_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::email_templates)]
pub struct NewEmailTemplate<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub template_type: &'a str,
    pub subject: &'a str,
    pub html_content: &'a str,
    pub text_content: Option<&'a str>,
    pub is_shared: bool,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::email_templates)]
#[diesel(treat_none_as_null = true)]
pub struct UpdateEmailTemplate<'a> {
    pub name: &'a str,
    pub template_type: &'a str,
    pub subject: &'a str,
    pub html_content: &'a str,
    pub text_content: Option<&'a str>,
    pub is_active: bool,
    pub is_shared: bool,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<EmailTemplate> for DomainEmailTemplate {
    type Error = TypeConstraintError;

    fn try_from(template: EmailTemplate) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TemplateId::new(template.id)?,
            user_id: UserId::new(template.user_id)?,
            name: TemplateName::new(template.name)?,
            template_type: template.template_type.parse()?,
            subject: template.subject,
            html_content: template.html_content,
            text_content: template.text_content,
            is_active: template.is_active,
            is_shared: template.is_shared,
            usage_count: template.usage_count,
            last_used_at: template.last_used_at,
            created_at: template.created_at,
            updated_at: template.updated_at,
        })
    }
}

impl<'a> From<&'a DomainNewEmailTemplate> for NewEmailTemplate<'a> {
    fn from(template: &'a DomainNewEmailTemplate) -> Self {
        Self {
            user_id: template.user_id.get(),
            name: template.name.as_str(),
            template_type: template.template_type.as_str(),
            subject: &template.subject,
            html_content: &template.html_content,
            text_content: template.text_content.as_deref(),
            is_shared: template.is_shared,
        }
    }
}

impl<'a> UpdateEmailTemplate<'a> {
    pub fn new(update: &'a DomainUpdateEmailTemplate, now: NaiveDateTime) -> Self {
        Self {
            name: update.name.as_str(),
            template_type: update.template_type.as_str(),
            subject: &update.subject,
            html_content: &update.html_content,
            text_content: update.text_content.as_deref(),
            is_active: update.is_active,
            is_shared: update.is_shared,
            updated_at: now,
        }
    }
}
