use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use time::UtcOffset;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl CollaboratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Fallback goals used whenever a user's own value is missing or unusable.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GoalDefaults {
    pub daily_calories: f64,
    pub daily_protein: f64,
    pub daily_carbs: f64,
    pub daily_fat: f64,
}

impl Default for GoalDefaults {
    fn default() -> Self {
        Self {
            daily_calories: 2000.0,
            daily_protein: 120.0,
            daily_carbs: 250.0,
            daily_fat: 65.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub collaborator: CollaboratorConfig,
    pub goal_defaults: GoalDefaults,
    pub utc_offset_minutes: i32,
    pub calendar_default_days: u32,
    /// Chat sessions untouched for this long are discarded.
    pub session_idle_minutes: u32,
}

pub const MAX_CALENDAR_DAYS: u32 = 366;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "nutrilog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "nutrilog-users".into()),
        };
        let collaborator = CollaboratorConfig {
            base_url: std::env::var("NUTRITION_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".into()),
            timeout_ms: env_or("NUTRITION_SERVICE_TIMEOUT_MS", 15_000),
        };
        let fallback = GoalDefaults::default();
        let goal_defaults = GoalDefaults {
            daily_calories: env_or("GOAL_DEFAULT_CALORIES", fallback.daily_calories),
            daily_protein: env_or("GOAL_DEFAULT_PROTEIN", fallback.daily_protein),
            daily_carbs: env_or("GOAL_DEFAULT_CARBS", fallback.daily_carbs),
            daily_fat: env_or("GOAL_DEFAULT_FAT", fallback.daily_fat),
        };

        let config = Self {
            database_url,
            jwt,
            collaborator,
            goal_defaults,
            utc_offset_minutes: env_or("APP_UTC_OFFSET_MINUTES", 0),
            calendar_default_days: env_or("CALENDAR_DEFAULT_DAYS", 30u32)
                .clamp(1, MAX_CALENDAR_DAYS),
            session_idle_minutes: env_or("CHAT_SESSION_IDLE_MINUTES", 60u32).max(1),
        };
        config.utc_offset()?;
        Ok(config)
    }

    pub fn session_idle_ttl(&self) -> time::Duration {
        time::Duration::minutes(i64::from(self.session_idle_minutes))
    }

    pub fn utc_offset(&self) -> anyhow::Result<UtcOffset> {
        UtcOffset::from_whole_seconds(self.utc_offset_minutes * 60)
            .with_context(|| format!("invalid APP_UTC_OFFSET_MINUTES: {}", self.utc_offset_minutes))
    }
}
