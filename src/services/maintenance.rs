//! Retention cleanup and sending-counter resets run by the worker and the CLI.

use chrono::{Datelike, Duration, NaiveDateTime};

use crate::repository::{CleanupReport, EmailConfigWriter, MaintenanceWriter};
use crate::services::ServiceResult;

pub const DEFAULT_RETENTION_DAYS: i64 = 365;

/// Removes events, activities, API usage, finished imports and finished queue
/// rows older than `days`. With `dry_run` nothing is deleted and the counts
/// are what would have gone.
pub fn cleanup_old_data<R>(
    repo: &R,
    days: i64,
    dry_run: bool,
    now: NaiveDateTime,
) -> ServiceResult<CleanupReport>
where
    R: MaintenanceWriter + ?Sized,
{
    let cutoff = now - Duration::days(days.max(1));
    let report = repo.cleanup_before(cutoff, dry_run).map_err(|err| {
        log::error!("Cleanup before {cutoff} failed: {err}");
        err
    })?;

    log::info!(
        "{} data older than {cutoff}: {} events, {} activities, {} api calls, {} imports, {} queue rows",
        if dry_run { "Would delete" } else { "Deleted" },
        report.events,
        report.activities,
        report.api_usage,
        report.imports,
        report.queue_rows
    );
    Ok(report)
}

pub fn reset_daily_counters<R>(repo: &R) -> ServiceResult<usize>
where
    R: EmailConfigWriter + ?Sized,
{
    let reset = repo.reset_daily_usage()?;
    log::info!("Reset daily sending counters on {reset} email configs");
    Ok(reset)
}

/// Resets monthly counters when `now` falls on the first day of a month.
pub fn reset_monthly_counters<R>(repo: &R, now: NaiveDateTime) -> ServiceResult<Option<usize>>
where
    R: EmailConfigWriter + ?Sized,
{
    if now.day() != 1 {
        return Ok(None);
    }
    let reset = repo.reset_monthly_usage()?;
    log::info!("Reset monthly sending counters on {reset} email configs");
    Ok(Some(reset))
}

#[cfg(all(test, feature = "test-mocks"))]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::repository::mock::MockRepository;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, day)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap()
    }

    #[test]
    fn cleanup_uses_retention_cutoff() {
        let mut repo = MockRepository::new();
        repo.expect_cleanup_before()
            .withf(|cutoff, dry_run| *cutoff == at(11) - Duration::days(30) && *dry_run)
            .times(1)
            .returning(|_, _| {
                Ok(CleanupReport {
                    events: 12,
                    queue_rows: 3,
                    ..CleanupReport::default()
                })
            });

        let report = cleanup_old_data(&repo, 30, true, at(11)).unwrap();
        assert_eq!(report.events, 12);
        assert_eq!(report.queue_rows, 3);
    }

    #[test]
    fn monthly_reset_only_runs_on_the_first() {
        let mut repo = MockRepository::new();
        repo.expect_reset_monthly_usage().times(1).returning(|| Ok(2));

        assert_eq!(reset_monthly_counters(&repo, at(15)).unwrap(), None);
        assert_eq!(reset_monthly_counters(&repo, at(1)).unwrap(), Some(2));
    }
}
