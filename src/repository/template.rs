use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::template::{EmailTemplate, NewEmailTemplate, UpdateEmailTemplate};
use crate::domain::types::{TemplateId, UserId};
use crate::repository::errors::RepositoryResult;
use crate::repository::{DieselRepository, TemplateReader, TemplateWriter};

impl TemplateReader for DieselRepository {
    fn get_template(
        &self,
        id: TemplateId,
        user_id: UserId,
    ) -> RepositoryResult<Option<EmailTemplate>> {
        use crate::models::template::EmailTemplate as DbTemplate;
        use crate::schema::email_templates;

        let mut conn = self.conn()?;
        let template = email_templates::table
            .filter(email_templates::id.eq(id.get()))
            .filter(
                email_templates::user_id.eq(user_id.get()).or(email_templates::is_shared
                    .eq(true)
                    .and(email_templates::is_active.eq(true))),
            )
            .select(DbTemplate::as_select())
            .first::<DbTemplate>(&mut conn)
            .optional()?;

        Ok(template.map(TryInto::try_into).transpose()?)
    }

    fn list_templates(&self, user_id: UserId) -> RepositoryResult<Vec<EmailTemplate>> {
        use crate::models::template::EmailTemplate as DbTemplate;
        use crate::schema::email_templates;

        let mut conn = self.conn()?;
        let templates = email_templates::table
            .filter(
                email_templates::user_id.eq(user_id.get()).or(email_templates::is_shared
                    .eq(true)
                    .and(email_templates::is_active.eq(true))),
            )
            .order((email_templates::updated_at.desc(), email_templates::id.desc()))
            .select(DbTemplate::as_select())
            .load::<DbTemplate>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<EmailTemplate>, _>>()?;

        Ok(templates)
    }
}

impl TemplateWriter for DieselRepository {
    fn create_template(&self, template: &NewEmailTemplate) -> RepositoryResult<EmailTemplate> {
        use crate::models::template::{
            EmailTemplate as DbTemplate, NewEmailTemplate as DbNewTemplate,
        };
        use crate::schema::email_templates;

        let mut conn = self.conn()?;
        let insertable: DbNewTemplate = template.into();
        let created = diesel::insert_into(email_templates::table)
            .values(&insertable)
            .returning(DbTemplate::as_returning())
            .get_result::<DbTemplate>(&mut conn)?;

        Ok(created.try_into()?)
    }

    fn update_template(
        &self,
        id: TemplateId,
        updates: &UpdateEmailTemplate,
    ) -> RepositoryResult<EmailTemplate> {
        use crate::models::template::{
            EmailTemplate as DbTemplate, UpdateEmailTemplate as DbUpdateTemplate,
        };
        use crate::schema::email_templates;

        let mut conn = self.conn()?;
        let changes = DbUpdateTemplate::new(updates, chrono::Utc::now().naive_utc());
        let updated = diesel::update(email_templates::table.find(id.get()))
            .set(&changes)
            .returning(DbTemplate::as_returning())
            .get_result::<DbTemplate>(&mut conn)?;

        Ok(updated.try_into()?)
    }

    fn delete_template(&self, id: TemplateId) -> RepositoryResult<()> {
        use crate::schema::email_templates;

        let mut conn = self.conn()?;
        diesel::delete(email_templates::table.find(id.get())).execute(&mut conn)?;
        Ok(())
    }

    fn mark_template_used(&self, id: TemplateId, at: NaiveDateTime) -> RepositoryResult<()> {
        use crate::schema::email_templates;

        let mut conn = self.conn()?;
        diesel::update(email_templates::table.find(id.get()))
            .set((
                email_templates::usage_count.eq(email_templates::usage_count + 1),
                email_templates::last_used_at.eq(Some(at)),
            ))
            .execute(&mut conn)?;
        Ok(())
    }
}
