use chrono::NaiveDateTime;
use diesel::dsl::sum;
use diesel::prelude::*;

use crate::domain::types::{EmailAddress, UserId};
use crate::domain::user::{
    NewUser, NewUserActivity, UpdateUser, UsageStats, User, UserActivity, UserProfile,
};
use crate::repository::errors::RepositoryResult;
use crate::repository::{DieselRepository, UserListQuery, UserReader, UserWriter};

impl UserReader for DieselRepository {
    fn get_user_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        use crate::models::user::User as DbUser;
        use crate::schema::users;

        let mut conn = self.conn()?;
        let user = users::table
            .find(id.get())
            .select(DbUser::as_select())
            .first::<DbUser>(&mut conn)
            .optional()?;

        Ok(user.map(TryInto::try_into).transpose()?)
    }

    fn get_user_by_email(&self, email: &EmailAddress) -> RepositoryResult<Option<User>> {
        use crate::models::user::User as DbUser;
        use crate::schema::users;

        let mut conn = self.conn()?;
        let user = users::table
            .filter(users::email.eq(email.as_str()))
            .select(DbUser::as_select())
            .first::<DbUser>(&mut conn)
            .optional()?;

        Ok(user.map(TryInto::try_into).transpose()?)
    }

    fn get_user_by_verification_token(&self, token: &str) -> RepositoryResult<Option<User>> {
        use crate::models::user::User as DbUser;
        use crate::schema::users;

        let mut conn = self.conn()?;
        let user = users::table
            .filter(users::email_verification_token.eq(token))
            .select(DbUser::as_select())
            .first::<DbUser>(&mut conn)
            .optional()?;

        Ok(user.map(TryInto::try_into).transpose()?)
    }

    fn get_user_by_reset_token(&self, token: &str) -> RepositoryResult<Option<User>> {
        use crate::models::user::User as DbUser;
        use crate::schema::users;

        let mut conn = self.conn()?;
        let user = users::table
            .filter(users::password_reset_token.eq(token))
            .select(DbUser::as_select())
            .first::<DbUser>(&mut conn)
            .optional()?;

        Ok(user.map(TryInto::try_into).transpose()?)
    }

    fn get_user_profile(&self, user_id: UserId) -> RepositoryResult<Option<UserProfile>> {
        use crate::models::user::UserProfile as DbUserProfile;
        use crate::schema::user_profiles;

        let mut conn = self.conn()?;
        let profile = user_profiles::table
            .find(user_id.get())
            .select(DbUserProfile::as_select())
            .first::<DbUserProfile>(&mut conn)
            .optional()?;

        Ok(profile.map(TryInto::try_into).transpose()?)
    }

    fn list_users(&self, query: UserListQuery) -> RepositoryResult<(usize, Vec<User>)> {
        use crate::models::user::User as DbUser;
        use crate::schema::users;

        let mut conn = self.conn()?;

        let query_builder = || {
            let mut items = users::table.into_boxed::<diesel::sqlite::Sqlite>();
            if let Some(term) = query.search.as_ref().filter(|t| !t.trim().is_empty()) {
                let pattern = format!("%{}%", term.trim());
                items = items.filter(
                    users::email
                        .like(pattern.clone())
                        .or(users::first_name.like(pattern.clone()))
                        .or(users::last_name.like(pattern.clone()))
                        .or(users::company.like(pattern)),
                );
            }
            items
        };

        let total = query_builder().count().get_result::<i64>(&mut conn)? as usize;

        let mut items = query_builder().order(users::created_at.desc());
        if let Some(pagination) = &query.pagination {
            items = items.limit(pagination.limit()).offset(pagination.offset());
        }

        let users = items
            .select(DbUser::as_select())
            .load::<DbUser>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<User>, _>>()?;

        Ok((total, users))
    }

    fn get_usage_stats(
        &self,
        user_id: UserId,
        month_start: NaiveDateTime,
    ) -> RepositoryResult<UsageStats> {
        use crate::schema::{contacts, email_campaigns};

        let mut conn = self.conn()?;

        let total_contacts = contacts::table
            .filter(contacts::user_id.eq(user_id.get()))
            .count()
            .get_result::<i64>(&mut conn)?;
        let total_campaigns = email_campaigns::table
            .filter(email_campaigns::user_id.eq(user_id.get()))
            .count()
            .get_result::<i64>(&mut conn)?;
        let campaigns_this_month = email_campaigns::table
            .filter(email_campaigns::user_id.eq(user_id.get()))
            .filter(email_campaigns::created_at.ge(month_start))
            .count()
            .get_result::<i64>(&mut conn)?;
        let total_emails_sent = email_campaigns::table
            .filter(email_campaigns::user_id.eq(user_id.get()))
            .select(sum(email_campaigns::emails_sent))
            .first::<Option<i64>>(&mut conn)?
            .unwrap_or(0);

        Ok(UsageStats {
            total_contacts,
            total_campaigns,
            campaigns_this_month,
            total_emails_sent,
        })
    }

    fn list_user_activities(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> RepositoryResult<Vec<UserActivity>> {
        use crate::models::user::UserActivity as DbUserActivity;
        use crate::schema::user_activities;

        let mut conn = self.conn()?;
        let activities = user_activities::table
            .filter(user_activities::user_id.eq(user_id.get()))
            .order((user_activities::created_at.desc(), user_activities::id.desc()))
            .limit(limit)
            .select(DbUserActivity::as_select())
            .load::<DbUserActivity>(&mut conn)?
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<UserActivity>, _>>()?;

        Ok(activities)
    }
}

impl UserWriter for DieselRepository {
    fn create_user(&self, new_user: &NewUser) -> RepositoryResult<User> {
        use crate::models::user::{NewUser as DbNewUser, User as DbUser, UserProfile as DbProfile};
        use crate::schema::{user_profiles, users};

        let mut conn = self.conn()?;
        let insertable: DbNewUser = new_user.into();

        let created = conn.transaction::<DbUser, diesel::result::Error, _>(|conn| {
            let user = diesel::insert_into(users::table)
                .values(&insertable)
                .returning(DbUser::as_returning())
                .get_result::<DbUser>(conn)?;

            let profile = DbProfile {
                user_id: user.id,
                max_contacts: UserProfile::DEFAULT_MAX_CONTACTS,
                max_campaigns_per_month: UserProfile::DEFAULT_MAX_CAMPAIGNS_PER_MONTH,
                max_emails_per_month: UserProfile::DEFAULT_MAX_EMAILS_PER_MONTH,
                items_per_page: UserProfile::DEFAULT_ITEMS_PER_PAGE,
                default_from_name: None,
                default_reply_to: None,
                created_at: user.created_at,
                updated_at: user.created_at,
            };
            diesel::insert_into(user_profiles::table)
                .values(&profile)
                .execute(conn)?;

            Ok(user)
        })?;

        Ok(created.try_into()?)
    }

    fn update_user(&self, id: UserId, updates: &UpdateUser) -> RepositoryResult<User> {
        use crate::models::user::{UpdateUser as DbUpdateUser, User as DbUser};
        use crate::schema::users;

        let mut conn = self.conn()?;
        let changes = DbUpdateUser::new(updates, chrono::Utc::now().naive_utc());
        let updated = diesel::update(users::table.find(id.get()))
            .set(&changes)
            .returning(DbUser::as_returning())
            .get_result::<DbUser>(&mut conn)?;

        Ok(updated.try_into()?)
    }

    fn record_login(
        &self,
        id: UserId,
        ip_address: Option<&str>,
        at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        use crate::schema::users;

        let mut conn = self.conn()?;
        diesel::update(users::table.find(id.get()))
            .set((
                users::login_count.eq(users::login_count + 1),
                users::last_login_at.eq(Some(at)),
                users::last_login_ip.eq(ip_address),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn set_verification_token(
        &self,
        id: UserId,
        token: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        use crate::schema::users;

        let mut conn = self.conn()?;
        diesel::update(users::table.find(id.get()))
            .set((
                users::email_verification_token.eq(Some(token)),
                users::email_verification_sent_at.eq(Some(at)),
                users::updated_at.eq(at),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn mark_email_verified(&self, id: UserId, at: NaiveDateTime) -> RepositoryResult<User> {
        use crate::models::user::User as DbUser;
        use crate::schema::users;

        let mut conn = self.conn()?;
        let updated = diesel::update(users::table.find(id.get()))
            .set((
                users::is_email_verified.eq(true),
                users::is_active.eq(true),
                users::email_verification_token.eq(None::<String>),
                users::updated_at.eq(at),
            ))
            .returning(DbUser::as_returning())
            .get_result::<DbUser>(&mut conn)?;

        Ok(updated.try_into()?)
    }

    fn set_password_reset_token(
        &self,
        id: UserId,
        token: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        use crate::schema::users;

        let mut conn = self.conn()?;
        diesel::update(users::table.find(id.get()))
            .set((
                users::password_reset_token.eq(Some(token)),
                users::password_reset_sent_at.eq(Some(at)),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        use crate::schema::users;

        let mut conn = self.conn()?;
        diesel::update(users::table.find(id.get()))
            .set((
                users::password_hash.eq(password_hash),
                users::password_reset_token.eq(None::<String>),
                users::password_reset_sent_at.eq(None::<NaiveDateTime>),
                users::updated_at.eq(at),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    fn set_user_active(&self, id: UserId, active: bool) -> RepositoryResult<()> {
        use crate::schema::users;

        let mut conn = self.conn()?;
        diesel::update(users::table.find(id.get()))
            .set(users::is_active.eq(active))
            .execute(&mut conn)?;
        Ok(())
    }

    fn log_activity(&self, activity: &NewUserActivity) -> RepositoryResult<()> {
        use crate::models::user::NewUserActivity as DbNewUserActivity;
        use crate::schema::user_activities;

        let mut conn = self.conn()?;
        let insertable: DbNewUserActivity = activity.into();
        diesel::insert_into(user_activities::table)
            .values(&insertable)
            .execute(&mut conn)?;
        Ok(())
    }
}
