use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::env;

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_tls: bool,
    pub port: u16,
    pub jwt_secret: String,
    pub cors_allowed_origins: Option<String>,
    pub calendar: CalendarSyncConfig,
}

/// Settings for the Google Calendar transport.
#[derive(Debug, Clone)]
pub struct CalendarSyncConfig {
    pub google_client_id: String,
    pub google_client_secret: String,
    pub token_url: String,
    pub api_base: String,
    /// Calendar on each staff account that receives appointment events.
    pub calendar_id: String,
    pub time_zone: Tz,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_tls: env::var("DATABASE_TLS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            calendar: CalendarSyncConfig::from_env()?,
        })
    }
}

impl CalendarSyncConfig {
    pub fn from_env() -> Result<Self> {
        let time_zone = env::var("CALENDAR_TIME_ZONE").unwrap_or_else(|_| "UTC".to_string());

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .context("GOOGLE_CLIENT_ID must be set")?,
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .context("GOOGLE_CLIENT_SECRET must be set")?,
            token_url: env::var("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string()),
            api_base: env::var("GOOGLE_CALENDAR_API_BASE")
                .unwrap_or_else(|_| DEFAULT_CALENDAR_API_BASE.to_string()),
            calendar_id: env::var("GOOGLE_CALENDAR_ID").unwrap_or_else(|_| "primary".to_string()),
            time_zone: parse_time_zone(&time_zone)?,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_time_zone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("CALENDAR_TIME_ZONE '{}' is not a valid IANA zone", name))
}
