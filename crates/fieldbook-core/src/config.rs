//! Application configuration
//!
//! Centralized configuration management using the `config` crate.
//! Values come from built-in defaults, optional config files and
//! `FIELDBOOK__*` environment variables, in that order of precedence.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub booking: BookingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply embedded migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_run_migrations() -> bool {
    true
}

/// Booking and settlement rules
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BookingConfig {
    /// Minimum time between "now" and a booking's start
    #[serde(default = "default_min_lead_time")]
    pub min_lead_time_hours: i64,

    /// Settlement sweep cadence
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Maximum expired bookings processed per sweep tick
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch_size: i64,

    /// Upcoming bookings check cadence
    #[serde(default = "default_upcoming_interval")]
    pub upcoming_check_interval_secs: u64,

    /// Look-ahead window of the upcoming bookings check
    #[serde(default = "default_upcoming_window")]
    pub upcoming_window_minutes: i64,

    /// Longest note accepted on a booking
    #[serde(default = "default_max_note_length")]
    pub max_note_length: usize,
}

fn default_min_lead_time() -> i64 {
    24
}

fn default_sweep_interval() -> u64 {
    120
}

fn default_sweep_batch() -> i64 {
    500
}

fn default_upcoming_interval() -> u64 {
    3600
}

fn default_upcoming_window() -> i64 {
    60
}

fn default_max_note_length() -> usize {
    500
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            min_lead_time_hours: default_min_lead_time(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_batch_size: default_sweep_batch(),
            upcoming_check_interval_secs: default_upcoming_interval(),
            upcoming_window_minutes: default_upcoming_window(),
            max_note_length: default_max_note_length(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.run_migrations", true)?
            .set_default("booking.min_lead_time_hours", 24)?
            .set_default("booking.sweep_interval_secs", 120)?
            .set_default("booking.sweep_batch_size", 500)?
            .set_default("booking.upcoming_check_interval_secs", 3600)?
            .set_default("booking.upcoming_window_minutes", 60)?
            .set_default("booking.max_note_length", 500)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("FIELDBOOK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("FIELDBOOK").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_booking_config() {
        let config = BookingConfig::default();
        assert_eq!(config.min_lead_time_hours, 24);
        assert_eq!(config.sweep_interval_secs, 120);
        assert_eq!(config.upcoming_window_minutes, 60);
    }

    #[test]
    fn test_booking_section_is_optional() {
        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")
            .unwrap()
            .set_default("server.port", 9000)
            .unwrap()
            .set_default("server.workers", 2)
            .unwrap()
            .set_default("database.url", "postgresql://localhost/fieldbook")
            .unwrap()
            .build()
            .unwrap();

        let app: AppConfig = config.try_deserialize().unwrap();
        assert_eq!(app.booking, BookingConfig::default());
        assert_eq!(app.server_addr(), "127.0.0.1:9000");
        assert!(app.database.run_migrations);
    }
}
