use std::env;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveTime;

use crate::models::OperatingWindow;

pub const DEFAULT_SECRET_KEY: &str = "changeme";
/// Role claim the identity provider issues to administrators.
pub const DEFAULT_ADMIN_ROLE: &str = "Administrador";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Signing secret shared with the identity provider and every other service.
    pub secret_key: String,
    pub admin_role: String,
    pub courts_service_url: String,
    pub roles_service_url: String,
    pub service_timeout: Duration,
    pub operating_window: OperatingWindow,
    pub max_availability_days: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let opening = parse_time_var("OPENING_TIME", "08:00")?;
        let closing = parse_time_var("CLOSING_TIME", "22:00")?;
        let slot_minutes: u32 = parse_var("SLOT_MINUTES", 60)?;
        let min_slot_minutes: u32 = parse_var("MIN_SLOT_MINUTES", 30)?;
        let operating_window =
            OperatingWindow::new(opening, closing, slot_minutes, min_slot_minutes)?;

        Ok(Self {
            port: parse_var("PORT", 3000)?,
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "courtbook.db".to_string()),
            secret_key: env::var("SECRET_KEY").unwrap_or_else(|_| DEFAULT_SECRET_KEY.to_string()),
            admin_role: env::var("ADMIN_ROLE").unwrap_or_else(|_| DEFAULT_ADMIN_ROLE.to_string()),
            courts_service_url: env::var("COURTS_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:5002".to_string()),
            roles_service_url: env::var("ROLES_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:5001".to_string()),
            service_timeout: Duration::from_millis(parse_var("SERVICE_TIMEOUT_MS", 3000)?),
            operating_window,
            max_availability_days: parse_var("MAX_AVAILABILITY_DAYS", 366)?,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw}")),
        Err(_) => Ok(default),
    }
}

fn parse_time_var(name: &str, default: &str) -> anyhow::Result<NaiveTime> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("{name} must be HH:MM, got {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names; the process environment is shared.

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let port: u16 = parse_var("COURTBOOK_TEST_UNSET_PORT", 3000).unwrap();
        assert_eq!(port, 3000);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("COURTBOOK_TEST_BAD_TIMEOUT", "soon");
        let parsed: anyhow::Result<u64> = parse_var("COURTBOOK_TEST_BAD_TIMEOUT", 3000);
        assert!(parsed.is_err());

        env::set_var("COURTBOOK_TEST_GOOD_TIMEOUT", " 1500 ");
        let parsed: u64 = parse_var("COURTBOOK_TEST_GOOD_TIMEOUT", 3000).unwrap();
        assert_eq!(parsed, 1500);
    }

    #[test]
    fn test_parse_time_var() {
        let opening = parse_time_var("COURTBOOK_TEST_UNSET_OPENING", "08:00").unwrap();
        assert_eq!(opening, NaiveTime::from_hms_opt(8, 0, 0).unwrap());

        env::set_var("COURTBOOK_TEST_BAD_CLOSING", "10pm");
        assert!(parse_time_var("COURTBOOK_TEST_BAD_CLOSING", "22:00").is_err());
    }
}
