//! Configuration model loaded from external sources.

use serde::Deserialize;

/// SMTP relay used for platform mail (verification, password reset, admin tests).
#[derive(Clone, Debug, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    #[serde(default)]
    pub use_ssl: bool,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_true() -> bool {
    true
}

fn default_session_hours() -> i64 {
    24 * 14
}

#[derive(Clone, Debug, Deserialize)]
/// Settings shared by the server, worker and admin binaries.
pub struct ServerConfig {
    pub domain: String,
    pub address: String,
    pub port: u16,
    pub database_url: String,
    pub templates_dir: String,
    pub secret: String,
    /// Public URL used in tracking links and emails.
    pub base_url: String,
    pub platform_name: String,
    pub platform_email: String,
    /// Endpoint the worker binds its PULL socket to and the server pushes to.
    pub zmq_worker: String,
    /// DNS-over-HTTPS resolver used for domain verification.
    pub dns_resolver_url: String,
    pub smtp: SmtpSettings,
    #[serde(default = "default_session_hours")]
    pub session_hours: i64,
}

impl ServerConfig {
    /// Layers `config/default.yaml`, the `APP_ENV` profile (default `local`)
    /// and `APP_*` environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "local".into());

        config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{app_env}")).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Absolute URL for a site path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slash() {
        let config = ServerConfig {
            domain: "localhost".into(),
            address: "127.0.0.1".into(),
            port: 8080,
            database_url: "app.db".into(),
            templates_dir: "templates/**/*".into(),
            secret: "s".into(),
            base_url: "http://localhost:8080/".into(),
            platform_name: "AfriMail Pro".into(),
            platform_email: "noreply@afrimailpro.com".into(),
            zmq_worker: "tcp://127.0.0.1:5560".into(),
            dns_resolver_url: "https://cloudflare-dns.com/dns-query".into(),
            smtp: SmtpSettings {
                host: "localhost".into(),
                port: 1025,
                username: String::new(),
                password: String::new(),
                use_tls: false,
                use_ssl: false,
            },
            session_hours: 1,
        };
        assert_eq!(config.url("/auth/login"), "http://localhost:8080/auth/login");
    }
}
