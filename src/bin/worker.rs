//! Background worker: delivers queued campaign email, starts scheduled
//! campaigns and runs the periodic analytics and maintenance jobs.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use dotenvy::dotenv;

use afrimail::db::{establish_connection_pool, run_migrations};
use afrimail::mailer::SmtpMailer;
use afrimail::models::config::ServerConfig;
use afrimail::models::zmq::WorkerMessage;
use afrimail::repository::DieselRepository;
use afrimail::services::analytics::{
    DEFAULT_ENGAGEMENT_BATCH, generate_daily_analytics, update_engagement_scores,
};
use afrimail::services::campaigns::start_due_campaigns;
use afrimail::services::delivery::{process_queue, send_platform_email};
use afrimail::services::maintenance::{
    DEFAULT_RETENTION_DAYS, cleanup_old_data, reset_daily_counters, reset_monthly_counters,
};
use afrimail::services::{Site, now};
use afrimail::zmq::ZmqReceiver;

const QUEUE_INTERVAL: Duration = Duration::from_secs(10);
const SCHEDULED_INTERVAL: Duration = Duration::from_secs(60);
const HOURLY_INTERVAL: Duration = Duration::from_secs(60 * 60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Periodic jobs due on one scheduler tick.
#[derive(Debug, Default, PartialEq, Eq)]
struct DueJobs {
    scheduled_campaigns: bool,
    hourly: bool,
    daily: bool,
    cleanup: bool,
}

/// Tracks when each periodic job last ran.
struct Schedule {
    scheduled_campaigns: Option<Instant>,
    hourly: Option<Instant>,
    cleanup: Instant,
    day: NaiveDate,
}

fn elapsed(last: &mut Option<Instant>, at: Instant, interval: Duration) -> bool {
    let due = last.is_none_or(|last| at.duration_since(last) >= interval);
    if due {
        *last = Some(at);
    }
    due
}

impl Schedule {
    /// Scheduled campaigns and hourly jobs fire on the first tick; daily
    /// resets wait for the date to change.
    fn new(started: Instant, today: NaiveDate) -> Self {
        Self {
            scheduled_campaigns: None,
            hourly: None,
            cleanup: started,
            day: today,
        }
    }

    fn due(&mut self, at: Instant, today: NaiveDate) -> DueJobs {
        let mut jobs = DueJobs {
            scheduled_campaigns: elapsed(&mut self.scheduled_campaigns, at, SCHEDULED_INTERVAL),
            hourly: elapsed(&mut self.hourly, at, HOURLY_INTERVAL),
            ..DueJobs::default()
        };
        if today != self.day {
            self.day = today;
            jobs.daily = true;
        }
        if at.duration_since(self.cleanup) >= CLEANUP_INTERVAL {
            self.cleanup = at;
            jobs.cleanup = true;
        }
        jobs
    }
}

fn listen(receiver: ZmqReceiver, wake: Sender<()>, mailer: Arc<SmtpMailer>, config: ServerConfig) {
    loop {
        match receiver.recv() {
            Ok(WorkerMessage::ProcessQueue) => {
                if wake.send(()).is_err() {
                    log::error!("Scheduler stopped; listener exiting");
                    return;
                }
            }
            Ok(WorkerMessage::SendEmail(email)) => {
                match send_platform_email(
                    mailer.as_ref(),
                    &config.smtp,
                    &config.platform_email,
                    &email,
                ) {
                    Ok(()) => log::info!("Sent platform email to {}", email.to),
                    Err(e) => log::error!("Failed to send platform email to {}: {e}", email.to),
                }
            }
            Err(e) => log::error!("Error receiving worker message: {e}"),
        }
    }
}

fn run_jobs(repo: &DieselRepository, site: &Site, jobs: &DueJobs) {
    let at = now();
    let today = at.date();

    if jobs.scheduled_campaigns {
        match start_due_campaigns(repo, site, at) {
            Ok(0) => {}
            Ok(started) => log::info!("Started {started} scheduled campaign(s)"),
            Err(e) => log::error!("Error starting scheduled campaigns: {e}"),
        }
    }
    if jobs.hourly {
        if let Err(e) = update_engagement_scores(repo, None, DEFAULT_ENGAGEMENT_BATCH, at) {
            log::error!("Error updating engagement scores: {e}");
        }
        if let Err(e) = generate_daily_analytics(repo, today) {
            log::error!("Error generating analytics for {today}: {e}");
        }
    }
    if jobs.daily {
        if let Some(yesterday) = today.checked_sub_days(Days::new(1)) {
            match generate_daily_analytics(repo, yesterday) {
                Ok(run) => log::info!(
                    "Analytics for {yesterday}: {} campaigns, {} contacts, {} domains",
                    run.campaigns,
                    run.contacts,
                    run.domains
                ),
                Err(e) => log::error!("Error generating analytics for {yesterday}: {e}"),
            }
        }
        if let Err(e) = reset_daily_counters(repo) {
            log::error!("Error resetting daily counters: {e}");
        }
        if let Err(e) = reset_monthly_counters(repo, at) {
            log::error!("Error resetting monthly counters: {e}");
        }
    }
    if jobs.cleanup
        && let Err(e) = cleanup_old_data(repo, DEFAULT_RETENTION_DAYS, false, at)
    {
        log::error!("Error cleaning up old data: {e}");
    }
}

fn schedule_loop(repo: DieselRepository, mailer: Arc<SmtpMailer>, site: Site, wake: Receiver<()>) {
    let mut schedule = Schedule::new(Instant::now(), now().date());
    loop {
        match wake.recv_timeout(QUEUE_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::error!("Listener stopped; scheduler exiting");
                return;
            }
        }
        // Collapse a burst of notifications into one pass.
        while wake.try_recv().is_ok() {}

        let jobs = schedule.due(Instant::now(), now().date());
        run_jobs(&repo, &site, &jobs);

        if let Err(e) = process_queue(&repo, mailer.as_ref(), now()) {
            log::error!("Error processing email queue: {e}");
        }
    }
}

fn main() {
    dotenv().ok(); // Load .env file
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let server_config = match ServerConfig::load() {
        Ok(server_config) => server_config,
        Err(err) => {
            log::error!("Error loading server config: {err}");
            std::process::exit(1);
        }
    };

    let pool = match establish_connection_pool(&server_config.database_url) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = run_migrations(&pool) {
        log::error!("Failed to run migrations: {e}");
        std::process::exit(1);
    }

    let receiver = match ZmqReceiver::bind(&server_config.zmq_worker) {
        Ok(receiver) => receiver,
        Err(e) => {
            log::error!("Cannot bind worker socket {}: {e}", server_config.zmq_worker);
            std::process::exit(1);
        }
    };

    let repo = DieselRepository::new(pool);
    let mailer = Arc::new(SmtpMailer::new());
    let site = Site::from(&server_config);
    let (wake_tx, wake_rx) = mpsc::channel();

    log::info!("Starting delivery worker on {}", server_config.zmq_worker);

    let listener_mailer = mailer.clone();
    std::thread::spawn(move || listen(receiver, wake_tx, listener_mailer, server_config));

    schedule_loop(repo, mailer, site, wake_rx);
}
