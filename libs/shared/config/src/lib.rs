use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub default_timezone: String,
    pub buffer_minutes: i64,
    pub min_break_minutes: i64,
    pub session_minutes: i64,
    pub workday_start_hour: u32,
    pub workday_end_hour: u32,
    pub search_horizon_days: i64,
    pub max_suggestions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            default_timezone: "UTC".to_string(),
            buffer_minutes: 5,
            min_break_minutes: 10,
            session_minutes: 50,
            workday_start_hour: 8,
            workday_end_hour: 20,
            search_horizon_days: 7,
            max_suggestions: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            server_port: parse_var("SERVER_PORT", defaults.server_port),
            default_timezone: env::var("SCHEDULING_DEFAULT_TIMEZONE")
                .unwrap_or_else(|_| {
                    warn!("SCHEDULING_DEFAULT_TIMEZONE not set, using {}", defaults.default_timezone);
                    defaults.default_timezone.clone()
                }),
            buffer_minutes: parse_var("SCHEDULING_BUFFER_MINUTES", defaults.buffer_minutes),
            min_break_minutes: parse_var("SCHEDULING_MIN_BREAK_MINUTES", defaults.min_break_minutes),
            session_minutes: parse_var("SCHEDULING_SESSION_MINUTES", defaults.session_minutes),
            workday_start_hour: parse_var("SCHEDULING_WORKDAY_START_HOUR", defaults.workday_start_hour),
            workday_end_hour: parse_var("SCHEDULING_WORKDAY_END_HOUR", defaults.workday_end_hour),
            search_horizon_days: parse_var("SCHEDULING_SEARCH_HORIZON_DAYS", defaults.search_horizon_days),
            max_suggestions: parse_var("SCHEDULING_MAX_SUGGESTIONS", defaults.max_suggestions),
        };

        if !config.is_consistent() {
            warn!("Scheduling configuration is inconsistent - check workday hours and session length");
        }

        config
    }

    /// Workday must be non-empty and long enough to hold at least one session.
    pub fn is_consistent(&self) -> bool {
        self.workday_start_hour < self.workday_end_hour
            && self.workday_end_hour <= 24
            && self.session_minutes > 0
            && self.buffer_minutes >= 0
            && self.min_break_minutes >= 0
            && i64::from(self.workday_end_hour - self.workday_start_hour) * 60
                >= self.session_minutes + self.min_break_minutes
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", name, raw, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default {}", name, default);
            default
        }
    }
}
