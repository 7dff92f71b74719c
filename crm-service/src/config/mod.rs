use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub storage: StorageBackend,
    pub mongodb: MongoConfig,
    pub smtp: SmtpConfig,
    pub whatsapp: WhatsAppConfig,
    pub reminder: ReminderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppConfig {
    pub api_base: String,
    pub phone_number_id: String,
    pub access_token: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    /// Run the periodic sweep at all.
    pub enabled: bool,
    pub interval_secs: u64,
    /// Added to the current UTC instant before the window-start comparison.
    pub display_offset_minutes: i64,
    /// How long before the due instant reminders start.
    pub lead_time_hours: i64,
    pub live_channel_capacity: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            display_offset_minutes: 330,
            lead_time_hours: 24,
            live_channel_capacity: 256,
        }
    }
}

/// Display offsets beyond a day either side are rejected.
pub const MAX_DISPLAY_OFFSET_MINUTES: i64 = 24 * 60;
/// Reminders open at most a leap year ahead of the due instant.
pub const MAX_LEAD_TIME_HOURS: i64 = 366 * 24;

impl ReminderConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn display_offset(&self) -> chrono::Duration {
        chrono::Duration::minutes(
            self.display_offset_minutes
                .clamp(-MAX_DISPLAY_OFFSET_MINUTES, MAX_DISPLAY_OFFSET_MINUTES),
        )
    }

    pub fn lead_time(&self) -> chrono::Duration {
        chrono::Duration::hours(self.lead_time_hours.clamp(0, MAX_LEAD_TIME_HOURS))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.display_offset_minutes.abs() > MAX_DISPLAY_OFFSET_MINUTES {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REMINDER_DISPLAY_OFFSET_MINUTES must be within ±{}, got {}",
                MAX_DISPLAY_OFFSET_MINUTES,
                self.display_offset_minutes
            )));
        }
        if !(0..=MAX_LEAD_TIME_HOURS).contains(&self.lead_time_hours) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REMINDER_LEAD_TIME_HOURS must be within 0..={}, got {}",
                MAX_LEAD_TIME_HOURS,
                self.lead_time_hours
            )));
        }
        Ok(())
    }
}

impl CrmConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let storage = match env_or("CRM_STORAGE", "mongo").as_str() {
            "memory" => StorageBackend::Memory,
            "mongo" => StorageBackend::Mongo,
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "CRM_STORAGE must be 'mongo' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let mongo_uri = match storage {
            StorageBackend::Mongo => get_env("MONGODB_URI", None, is_prod)?,
            StorageBackend::Memory => env_or("MONGODB_URI", ""),
        };

        let defaults = ReminderConfig::default();
        let reminder = ReminderConfig {
            enabled: parse_env("REMINDER_ENABLED", defaults.enabled),
            interval_secs: parse_env("REMINDER_INTERVAL_SECS", defaults.interval_secs),
            display_offset_minutes: parse_env(
                "REMINDER_DISPLAY_OFFSET_MINUTES",
                defaults.display_offset_minutes,
            ),
            lead_time_hours: parse_env("REMINDER_LEAD_TIME_HOURS", defaults.lead_time_hours),
            live_channel_capacity: parse_env(
                "LIVE_CHANNEL_CAPACITY",
                defaults.live_channel_capacity,
            ),
        };
        reminder.validate()?;

        Ok(CrmConfig {
            common: common_config,
            storage,
            mongodb: MongoConfig {
                uri: mongo_uri,
                database: get_env("MONGODB_DATABASE", Some("crm_db"), is_prod)?,
            },
            smtp: SmtpConfig {
                host: env_or("SMTP_HOST", "smtp.gmail.com"),
                port: parse_env("SMTP_PORT", 587),
                user: env_or("SMTP_USER", ""),
                password: env_or("SMTP_PASSWORD", ""),
                from_email: env_or("SMTP_FROM_EMAIL", "noreply@example.com"),
                from_name: env_or("SMTP_FROM_NAME", "CRM Reminders"),
                enabled: parse_env("SMTP_ENABLED", false),
            },
            whatsapp: WhatsAppConfig {
                api_base: env_or("WHATSAPP_API_BASE", "https://graph.facebook.com/v19.0"),
                phone_number_id: env_or("WHATSAPP_PHONE_NUMBER_ID", ""),
                access_token: env_or("WHATSAPP_ACCESS_TOKEN", ""),
                enabled: parse_env("WHATSAPP_ENABLED", false),
            },
            reminder,
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(
                key = %key,
                value = %raw,
                default = %default,
                "Unparsable value, using default"
            );
            default
        }),
        Err(_) => default,
    }
}
