use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::import::{ContactImport, ImportStatus, ImportSummary, NewContactImport};
use crate::domain::types::{ImportId, UserId};
use crate::repository::errors::RepositoryResult;
use crate::repository::{DieselRepository, ImportReader, ImportWriter};

impl ImportReader for DieselRepository {
    fn get_import(&self, id: ImportId, user_id: UserId) -> RepositoryResult<Option<ContactImport>> {
        use crate::models::import::ContactImport as DbContactImport;
        use crate::schema::contact_imports;

        let mut conn = self.conn()?;
        let import = contact_imports::table
            .filter(contact_imports::id.eq(id.get()))
            .filter(contact_imports::user_id.eq(user_id.get()))
            .select(DbContactImport::as_select())
            .first::<DbContactImport>(&mut conn)
            .optional()?;

        Ok(import.map(TryInto::try_into).transpose()?)
    }

    fn list_imports(&self, user_id: UserId, limit: i64) -> RepositoryResult<Vec<ContactImport>> {
        use crate::models::import::ContactImport as DbContactImport;
        use crate::schema::contact_imports;

        let mut conn = self.conn()?;
        let imports = contact_imports::table
            .filter(contact_imports::user_id.eq(user_id.get()))
            .order((contact_imports::created_at.desc(), contact_imports::id.desc()))
            .limit(limit)
            .select(DbContactImport::as_select())
            .load::<DbContactImport>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<ContactImport>, _>>()?;

        Ok(imports)
    }
}

impl ImportWriter for DieselRepository {
    fn start_import(
        &self,
        import: &NewContactImport,
        at: NaiveDateTime,
    ) -> RepositoryResult<ContactImport> {
        use crate::models::import::{ContactImport as DbContactImport, NewContactImport as DbNew};
        use crate::schema::contact_imports;

        let mut conn = self.conn()?;
        let insertable = DbNew::new(import, ImportStatus::Processing.as_str(), at);
        let created = diesel::insert_into(contact_imports::table)
            .values(&insertable)
            .returning(DbContactImport::as_returning())
            .get_result::<DbContactImport>(&mut conn)?;

        Ok(created.try_into()?)
    }

    fn finish_import(
        &self,
        id: ImportId,
        status: ImportStatus,
        summary: &ImportSummary,
        at: NaiveDateTime,
    ) -> RepositoryResult<ContactImport> {
        use crate::models::import::{ContactImport as DbContactImport, FinishContactImport};
        use crate::schema::contact_imports;

        let mut conn = self.conn()?;
        let changes = FinishContactImport::new(status.as_str(), summary, at);
        let updated = diesel::update(contact_imports::table.find(id.get()))
            .set(&changes)
            .returning(DbContactImport::as_returning())
            .get_result::<DbContactImport>(&mut conn)?;

        Ok(updated.try_into()?)
    }
}
