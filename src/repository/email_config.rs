use chrono::NaiveDateTime;
use diesel::SqliteConnection;
use diesel::prelude::*;

use crate::domain::email_config::{
    DomainReputation, EmailDomainConfig, NewEmailDomainConfig, UpdateEmailDomainConfig,
    VerificationStatus,
};
use crate::domain::types::{EmailConfigId, UserId};
use crate::repository::errors::RepositoryResult;
use crate::repository::{DieselRepository, EmailConfigReader, EmailConfigWriter};

/// Counts one message against the config's daily and monthly quotas.
pub(crate) fn increment_usage(
    conn: &mut SqliteConnection,
    id: EmailConfigId,
    at: NaiveDateTime,
) -> QueryResult<usize> {
    use crate::schema::email_domain_configs;

    diesel::update(email_domain_configs::table.find(id.get()))
        .set((
            email_domain_configs::emails_sent_today.eq(email_domain_configs::emails_sent_today + 1),
            email_domain_configs::emails_sent_this_month
                .eq(email_domain_configs::emails_sent_this_month + 1),
            email_domain_configs::last_used_at.eq(Some(at)),
        ))
        .execute(conn)
}

impl EmailConfigReader for DieselRepository {
    fn get_email_config(
        &self,
        id: EmailConfigId,
        user_id: UserId,
    ) -> RepositoryResult<Option<EmailDomainConfig>> {
        use crate::models::email_config::EmailDomainConfig as DbConfig;
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;
        let config = email_domain_configs::table
            .filter(email_domain_configs::id.eq(id.get()))
            .filter(email_domain_configs::user_id.eq(user_id.get()))
            .select(DbConfig::as_select())
            .first::<DbConfig>(&mut conn)
            .optional()?;

        Ok(config.map(TryInto::try_into).transpose()?)
    }

    fn find_email_config(&self, id: EmailConfigId) -> RepositoryResult<Option<EmailDomainConfig>> {
        use crate::models::email_config::EmailDomainConfig as DbConfig;
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;
        let config = email_domain_configs::table
            .find(id.get())
            .select(DbConfig::as_select())
            .first::<DbConfig>(&mut conn)
            .optional()?;

        Ok(config.map(TryInto::try_into).transpose()?)
    }

    fn list_email_configs(&self, user_id: UserId) -> RepositoryResult<Vec<EmailDomainConfig>> {
        use crate::models::email_config::EmailDomainConfig as DbConfig;
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;
        let configs = email_domain_configs::table
            .filter(email_domain_configs::user_id.eq(user_id.get()))
            .order((
                email_domain_configs::is_default.desc(),
                email_domain_configs::domain_name.asc(),
            ))
            .select(DbConfig::as_select())
            .load::<DbConfig>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<EmailDomainConfig>, _>>()?;

        Ok(configs)
    }

    fn get_default_email_config(
        &self,
        user_id: UserId,
    ) -> RepositoryResult<Option<EmailDomainConfig>> {
        use crate::models::email_config::EmailDomainConfig as DbConfig;
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;
        let config = email_domain_configs::table
            .filter(email_domain_configs::user_id.eq(user_id.get()))
            .filter(email_domain_configs::is_default.eq(true))
            .select(DbConfig::as_select())
            .first::<DbConfig>(&mut conn)
            .optional()?;

        Ok(config.map(TryInto::try_into).transpose()?)
    }

    fn list_active_email_configs(&self) -> RepositoryResult<Vec<EmailDomainConfig>> {
        use crate::models::email_config::EmailDomainConfig as DbConfig;
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;
        let configs = email_domain_configs::table
            .filter(email_domain_configs::is_active.eq(true))
            .order(email_domain_configs::id.asc())
            .select(DbConfig::as_select())
            .load::<DbConfig>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<EmailDomainConfig>, _>>()?;

        Ok(configs)
    }
}

impl EmailConfigWriter for DieselRepository {
    fn create_email_config(
        &self,
        config: &NewEmailDomainConfig,
    ) -> RepositoryResult<EmailDomainConfig> {
        use crate::models::email_config::{
            EmailDomainConfig as DbConfig, NewEmailDomainConfig as DbNewConfig,
        };
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;
        let insertable: DbNewConfig = config.into();

        let created = conn.transaction::<DbConfig, diesel::result::Error, _>(|conn| {
            if config.is_default {
                diesel::update(
                    email_domain_configs::table
                        .filter(email_domain_configs::user_id.eq(config.user_id.get())),
                )
                .set(email_domain_configs::is_default.eq(false))
                .execute(conn)?;
            }
            diesel::insert_into(email_domain_configs::table)
                .values(&insertable)
                .returning(DbConfig::as_returning())
                .get_result::<DbConfig>(conn)
        })?;

        Ok(created.try_into()?)
    }

    fn update_email_config(
        &self,
        id: EmailConfigId,
        user_id: UserId,
        updates: &UpdateEmailDomainConfig,
    ) -> RepositoryResult<EmailDomainConfig> {
        use crate::models::email_config::{
            EmailDomainConfig as DbConfig, UpdateEmailDomainConfig as DbUpdateConfig,
        };
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;
        let changes = DbUpdateConfig::new(updates, chrono::Utc::now().naive_utc());

        let updated = conn.transaction::<DbConfig, diesel::result::Error, _>(|conn| {
            if updates.is_default {
                diesel::update(
                    email_domain_configs::table
                        .filter(email_domain_configs::user_id.eq(user_id.get()))
                        .filter(email_domain_configs::id.ne(id.get())),
                )
                .set(email_domain_configs::is_default.eq(false))
                .execute(conn)?;
            }
            diesel::update(
                email_domain_configs::table
                    .filter(email_domain_configs::id.eq(id.get()))
                    .filter(email_domain_configs::user_id.eq(user_id.get())),
            )
            .set(&changes)
            .returning(DbConfig::as_returning())
            .get_result::<DbConfig>(conn)
        })?;

        Ok(updated.try_into()?)
    }

    fn delete_email_config(&self, id: EmailConfigId) -> RepositoryResult<()> {
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;
        diesel::delete(email_domain_configs::table.find(id.get())).execute(&mut conn)?;
        Ok(())
    }

    fn record_verification(
        &self,
        id: EmailConfigId,
        status: VerificationStatus,
        at: NaiveDateTime,
    ) -> RepositoryResult<EmailDomainConfig> {
        use crate::models::email_config::{EmailDomainConfig as DbConfig, VerificationChange};
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;

        let updated = conn.transaction::<DbConfig, diesel::result::Error, _>(|conn| {
            let current = email_domain_configs::table
                .find(id.get())
                .select(DbConfig::as_select())
                .first::<DbConfig>(conn)?;

            let verified = status == VerificationStatus::Verified;
            let change = VerificationChange {
                verification_status: status.as_str(),
                verification_attempts: if verified {
                    current.verification_attempts
                } else {
                    current.verification_attempts + 1
                },
                last_verification_attempt: Some(at),
                verified_at: if verified { Some(at) } else { current.verified_at },
                updated_at: at,
            };

            diesel::update(email_domain_configs::table.find(id.get()))
                .set(&change)
                .returning(DbConfig::as_returning())
                .get_result::<DbConfig>(conn)
        })?;

        Ok(updated.try_into()?)
    }

    fn reset_daily_usage(&self) -> RepositoryResult<usize> {
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;
        let reset = diesel::update(email_domain_configs::table)
            .set(email_domain_configs::emails_sent_today.eq(0))
            .execute(&mut conn)?;
        Ok(reset)
    }

    fn reset_monthly_usage(&self) -> RepositoryResult<usize> {
        use crate::schema::email_domain_configs;

        let mut conn = self.conn()?;
        let reset = diesel::update(email_domain_configs::table)
            .set(email_domain_configs::emails_sent_this_month.eq(0))
            .execute(&mut conn)?;
        Ok(reset)
    }

    fn save_domain_reputation(&self, reputation: &DomainReputation) -> RepositoryResult<()> {
        use crate::models::email_config::NewDomainReputation;
        use crate::schema::domain_reputations;

        let mut conn = self.conn()?;
        let row: NewDomainReputation = reputation.into();
        diesel::insert_into(domain_reputations::table)
            .values(&row)
            .on_conflict((domain_reputations::email_config_id, domain_reputations::date))
            .do_update()
            .set(&row)
            .execute(&mut conn)?;
        Ok(())
    }
}
