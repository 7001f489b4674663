//! Management commands: platform setup, account provisioning, test mail,
//! maintenance and analytics backfills.

use std::io::{self, BufRead, Write};

use chrono::Days;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use afrimail::db::{establish_connection_pool, run_migrations};
use afrimail::domain::types::{EmailAddress, UserId};
use afrimail::domain::user::UserRole;
use afrimail::mailer::SmtpMailer;
use afrimail::models::config::ServerConfig;
use afrimail::models::zmq::PlatformEmail;
use afrimail::repository::{DieselRepository, UserReader};
use afrimail::services::admin::{AccountSpec, provision_account, seed_sample_data};
use afrimail::services::analytics::{
    DEFAULT_ENGAGEMENT_BATCH, generate_analytics_range, update_engagement_scores,
};
use afrimail::services::delivery::send_platform_email;
use afrimail::services::maintenance::{DEFAULT_RETENTION_DAYS, cleanup_old_data};
use afrimail::services::{ServiceError, now};

const TECH_ADMIN: (&str, &str) = ("tech@afrimailpro.com", "TechAdmin123!");
const CLIENT_PASSWORD: &str = "ClientUser123!";
const DEMO_CLIENTS: [&str; 3] = [
    "marketing@techstartup.cm",
    "contact@ngoeducation.org",
    "sales@retailcompany.com",
];

/// AfriMail Pro management commands.
#[derive(Parser)]
#[command(name = "afrimail-admin", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
#[command(rename_all = "snake_case")]
enum Command {
    /// Create the platform admins, demo client accounts and sample data.
    SetupAfrimail {
        #[arg(long)]
        skip_users: bool,
        #[arg(long)]
        skip_data: bool,
        #[arg(long, default_value = "admin@afrimailpro.com")]
        admin_email: String,
        #[arg(long, default_value = "SuperAdmin123!")]
        admin_password: String,
    },
    /// Create a verified super admin.
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long, default_value = "AfriMail Pro")]
        company: String,
        #[arg(long)]
        password: Option<String>,
        /// Fail instead of prompting for a missing password.
        #[arg(long)]
        no_input: bool,
    },
    /// Send a message through the platform SMTP relay.
    SendTestEmail {
        email: String,
        #[arg(long)]
        from_email: Option<String>,
        #[arg(long, default_value = "Test Email from AfriMail Pro")]
        subject: String,
    },
    /// Delete tracking and housekeeping rows older than the retention window.
    CleanupData {
        #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
        days: i64,
        #[arg(long)]
        dry_run: bool,
    },
    /// Recompute contact engagement scores.
    UpdateEngagementScores {
        #[arg(long)]
        user_id: Option<i32>,
        #[arg(long, default_value_t = DEFAULT_ENGAGEMENT_BATCH)]
        batch_size: i64,
    },
    /// Rebuild daily analytics for the last N days.
    GenerateAnalytics {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Invalid(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

fn client_spec(email: &str, first: &str, last: &str, company: &str, city: &str) -> AccountSpec {
    AccountSpec {
        email: email.to_string(),
        password: CLIENT_PASSWORD.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        company: company.to_string(),
        phone: None,
        country: "CM".to_string(),
        city: Some(city.to_string()),
        role: UserRole::Client,
    }
}

fn admin_spec(email: &str, password: &str, first: &str, last: &str, company: &str) -> AccountSpec {
    AccountSpec {
        email: email.to_string(),
        password: password.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        company: company.to_string(),
        phone: None,
        country: "CM".to_string(),
        city: Some("Douala".to_string()),
        role: UserRole::SuperAdmin,
    }
}

fn setup(
    repo: &DieselRepository,
    skip_users: bool,
    skip_data: bool,
    admin_email: &str,
    admin_password: &str,
) -> Result<(), CommandError> {
    if !skip_users {
        let accounts = [
            admin_spec(admin_email, admin_password, "Platform", "Admin", "AfriMail Pro"),
            admin_spec(TECH_ADMIN.0, TECH_ADMIN.1, "Tech", "Support", "AfriMail Pro"),
            client_spec(DEMO_CLIENTS[0], "Marie", "Nguema", "TechStartup CM", "Douala"),
            client_spec(DEMO_CLIENTS[1], "Paul", "Mbarga", "NGO Education", "Yaoundé"),
            client_spec(DEMO_CLIENTS[2], "Aïcha", "Bello", "Retail Company", "Garoua"),
        ];
        for spec in accounts {
            let email = spec.email.clone();
            match provision_account(repo, spec)? {
                Some(_) => println!("Created {email}"),
                None => println!("{email} already exists, skipping"),
            }
        }
    }

    if !skip_data {
        for email in DEMO_CLIENTS {
            let address = EmailAddress::new(email).map_err(ServiceError::from)?;
            let Some(user) = repo.get_user_by_email(&address).map_err(ServiceError::from)? else {
                println!("{email} does not exist, skipping sample data");
                continue;
            };
            let created = seed_sample_data(repo, user.id)?;
            println!("Seeded {created} sample lists and tags for {email}");
        }
    }

    println!("AfriMail Pro setup complete");
    Ok(())
}

fn prompt_password() -> Result<String, CommandError> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim().to_string();
    if password.is_empty() {
        return Err(CommandError::Invalid("Password cannot be empty".into()));
    }
    Ok(password)
}

fn send_test_email(
    config: &ServerConfig,
    to: String,
    from_email: Option<String>,
    subject: String,
) -> Result<(), CommandError> {
    let from = from_email.unwrap_or_else(|| config.platform_email.clone());
    let message = PlatformEmail {
        to,
        subject,
        html: format!(
            "<p>This is a test email from {}.</p><p>Your SMTP settings work.</p>",
            config.platform_name
        ),
        text: format!("This is a test email from {}.", config.platform_name),
    };
    send_platform_email(&SmtpMailer::new(), &config.smtp, &from, &message)
        .map_err(|e| CommandError::Invalid(format!("Failed to send test email: {e}")))?;
    println!("Test email sent to {}", message.to);
    Ok(())
}

fn open_repo(config: &ServerConfig) -> Result<DieselRepository, CommandError> {
    let pool = establish_connection_pool(&config.database_url)
        .map_err(|e| CommandError::Invalid(format!("Database connection failed: {e}")))?;
    run_migrations(&pool).map_err(CommandError::Invalid)?;
    Ok(DieselRepository::new(pool))
}

fn execute(command: Command, config: &ServerConfig) -> Result<(), CommandError> {
    match command {
        Command::SetupAfrimail {
            skip_users,
            skip_data,
            admin_email,
            admin_password,
        } => setup(
            &open_repo(config)?,
            skip_users,
            skip_data,
            &admin_email,
            &admin_password,
        ),
        Command::CreateSuperuser {
            email,
            first_name,
            last_name,
            company,
            password,
            no_input,
        } => {
            let password = match (password, no_input) {
                (Some(password), _) => password,
                (None, true) => {
                    return Err(CommandError::Invalid(
                        "--password is required with --no-input".into(),
                    ));
                }
                (None, false) => prompt_password()?,
            };
            let spec = admin_spec(&email, &password, &first_name, &last_name, &company);
            match provision_account(&open_repo(config)?, spec)? {
                Some(user) => println!("Superuser {} created", user.email),
                None => return Err(CommandError::Invalid(format!("{email} already exists"))),
            }
            Ok(())
        }
        Command::SendTestEmail {
            email,
            from_email,
            subject,
        } => send_test_email(config, email, from_email, subject),
        Command::CleanupData { days, dry_run } => {
            let report = cleanup_old_data(&open_repo(config)?, days, dry_run, now())?;
            let verb = if dry_run { "Would delete" } else { "Deleted" };
            println!(
                "{verb} {} events, {} activities, {} API calls, {} imports, {} queue rows",
                report.events, report.activities, report.api_usage, report.imports, report.queue_rows
            );
            Ok(())
        }
        Command::UpdateEngagementScores {
            user_id,
            batch_size,
        } => {
            let user_id = user_id
                .map(UserId::new)
                .transpose()
                .map_err(|e| CommandError::Invalid(e.to_string()))?;
            let updated = update_engagement_scores(&open_repo(config)?, user_id, batch_size, now())?;
            println!("Updated engagement scores for {updated} contacts");
            Ok(())
        }
        Command::GenerateAnalytics { days } => {
            let today = now().date();
            let generated = generate_analytics_range(&open_repo(config)?, today, days)?;
            let first = today
                .checked_sub_days(Days::new(u64::try_from(days.max(1) - 1).unwrap_or_default()))
                .unwrap_or(today);
            println!("Generated analytics for {generated} day(s), {first} to {today}");
            Ok(())
        }
    }
}

fn main() {
    dotenv().ok(); // Load .env file
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();

    let server_config = match ServerConfig::load() {
        Ok(server_config) => server_config,
        Err(err) => {
            log::error!("Error loading server config: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = execute(cli.command, &server_config) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommands_use_snake_case_names() {
        let cli = Cli::try_parse_from(["afrimail-admin", "cleanup_data", "--days", "30", "--dry-run"])
            .unwrap();
        match cli.command {
            Command::CleanupData { days, dry_run } => {
                assert_eq!(days, 30);
                assert!(dry_run);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn setup_defaults_to_the_platform_admin() {
        let cli = Cli::try_parse_from(["afrimail-admin", "setup_afrimail", "--skip-data"]).unwrap();
        match cli.command {
            Command::SetupAfrimail {
                skip_users,
                skip_data,
                admin_email,
                admin_password,
            } => {
                assert!(!skip_users);
                assert!(skip_data);
                assert_eq!(admin_email, "admin@afrimailpro.com");
                assert_eq!(admin_password, "SuperAdmin123!");
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
