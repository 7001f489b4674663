use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::domain::import::ImportStatus;
use crate::domain::queue::QueueStatus;
use crate::repository::errors::RepositoryResult;
use crate::repository::{CleanupReport, DieselRepository, MaintenanceWriter};

impl MaintenanceWriter for DieselRepository {
    fn cleanup_before(
        &self,
        cutoff: NaiveDateTime,
        dry_run: bool,
    ) -> RepositoryResult<CleanupReport> {
        use crate::schema::{api_usage, contact_imports, email_events, email_queue, user_activities};

        let mut conn = self.conn()?;
        let finished_imports = [ImportStatus::Completed.as_str(), ImportStatus::Failed.as_str()];
        let finished_queue = [
            QueueStatus::Sent.as_str(),
            QueueStatus::Failed.as_str(),
            QueueStatus::Cancelled.as_str(),
        ];

        let report = conn.transaction::<CleanupReport, diesel::result::Error, _>(|conn| {
            let events = email_events::table.filter(email_events::created_at.lt(cutoff));
            let activities = user_activities::table.filter(user_activities::created_at.lt(cutoff));
            let usage = api_usage::table.filter(api_usage::created_at.lt(cutoff));
            let imports = contact_imports::table
                .filter(contact_imports::created_at.lt(cutoff))
                .filter(contact_imports::status.eq_any(finished_imports));
            let queue_rows = email_queue::table
                .filter(email_queue::updated_at.lt(cutoff))
                .filter(email_queue::status.eq_any(finished_queue));

            if dry_run {
                return Ok(CleanupReport {
                    events: events.count().get_result::<i64>(conn)? as usize,
                    activities: activities.count().get_result::<i64>(conn)? as usize,
                    api_usage: usage.count().get_result::<i64>(conn)? as usize,
                    imports: imports.count().get_result::<i64>(conn)? as usize,
                    queue_rows: queue_rows.count().get_result::<i64>(conn)? as usize,
                });
            }

            Ok(CleanupReport {
                events: diesel::delete(events).execute(conn)?,
                activities: diesel::delete(activities).execute(conn)?,
                api_usage: diesel::delete(usage).execute(conn)?,
                imports: diesel::delete(imports).execute(conn)?,
                queue_rows: diesel::delete(queue_rows).execute(conn)?,
            })
        })?;

        log::info!(
            "Cleanup before {cutoff} (dry run: {dry_run}): {} events, {} activities, {} api usage rows, {} imports, {} queue rows",
            report.events,
            report.activities,
            report.api_usage,
            report.imports,
            report.queue_rows
        );
        Ok(report)
    }
}
