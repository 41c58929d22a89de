use airtix_core::BookingRules;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub admin: Option<AdminConfig>,
    #[serde(default)]
    pub booking: BookingRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

/// Admin account created (or reset) at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres URL, or `memory://` for the in-process store.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.url.starts_with("memory:")
    }
}

/// Secrets that only ever appear in checked-in development config.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-only-secret", "change-me-in-production", "secret"];
const PLACEHOLDER_PASSWORDS: &[&str] = &["admin", "password"];

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `AIRTIX__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("AIRTIX").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.check_deployable(&run_mode)?;
        Ok(config)
    }

    /// Refuses development credentials outside the `development` run mode.
    pub fn check_deployable(&self, run_mode: &str) -> Result<(), config::ConfigError> {
        if run_mode == "development" {
            return Ok(());
        }

        let secret = self.auth.jwt_secret.trim();
        if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret) {
            return Err(config::ConfigError::Message(format!(
                "auth.jwt_secret is unset or a placeholder in run mode '{}'",
                run_mode
            )));
        }

        if let Some(admin) = &self.admin {
            let password = admin.password.trim();
            if password.is_empty()
                || password == admin.username
                || PLACEHOLDER_PASSWORDS.contains(&password)
            {
                return Err(config::ConfigError::Message(format!(
                    "admin.password is a placeholder in run mode '{}'",
                    run_mode
                )));
            }
        }
        Ok(())
    }
}
