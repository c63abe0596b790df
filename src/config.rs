use std::env;

use chrono::Duration;

use crate::error::AppError;

/// Longest expiry or retention window accepted from configuration.
const MAX_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;
/// Longest retry delay accepted from configuration.
const MAX_BACKOFF_MS: u64 = 24 * 60 * 60 * 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub matching: MatchingConfig,
    pub delivery: DeliveryConfig,
}

/// Constants used by matching, ETA estimation and request expiry.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub search_radius_km: f64,
    pub average_speed_kmh: f64,
    pub retry_limit: u32,
    pub request_expiry_secs: i64,
    pub expiry_sweep_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub poll_interval_ms: u64,
    /// How long delivered or permanently failed events stay in the log.
    pub retention_secs: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            search_radius_km: 10.0,
            average_speed_kmh: 30.0,
            retry_limit: 3,
            request_expiry_secs: 300,
            expiry_sweep_interval_ms: 5_000,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            poll_interval_ms: 200,
            retention_secs: 86_400,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            matching: MatchingConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let matching_defaults = MatchingConfig::default();
        let delivery_defaults = DeliveryConfig::default();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") | Err(_) => LogFormat::Compact,
            Ok(other) => {
                return Err(AppError::InvalidConfiguration(format!(
                    "unknown LOG_FORMAT: {other}, expected compact/json"
                )));
            }
        };

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            matching: MatchingConfig {
                search_radius_km: parse_or_default(
                    "SEARCH_RADIUS_KM",
                    matching_defaults.search_radius_km,
                )?,
                average_speed_kmh: parse_or_default(
                    "AVERAGE_SPEED_KMH",
                    matching_defaults.average_speed_kmh,
                )?,
                retry_limit: parse_or_default("MATCH_RETRY_LIMIT", matching_defaults.retry_limit)?,
                request_expiry_secs: parse_or_default(
                    "REQUEST_EXPIRY_SECS",
                    matching_defaults.request_expiry_secs,
                )?,
                expiry_sweep_interval_ms: parse_or_default(
                    "EXPIRY_SWEEP_INTERVAL_MS",
                    matching_defaults.expiry_sweep_interval_ms,
                )?,
            },
            delivery: DeliveryConfig {
                max_attempts: parse_or_default(
                    "NOTIFICATION_MAX_ATTEMPTS",
                    delivery_defaults.max_attempts,
                )?,
                backoff_base_ms: parse_or_default(
                    "NOTIFICATION_BACKOFF_BASE_MS",
                    delivery_defaults.backoff_base_ms,
                )?,
                backoff_max_ms: parse_or_default(
                    "NOTIFICATION_BACKOFF_MAX_MS",
                    delivery_defaults.backoff_max_ms,
                )?,
                poll_interval_ms: parse_or_default(
                    "DELIVERY_POLL_INTERVAL_MS",
                    delivery_defaults.poll_interval_ms,
                )?,
                retention_secs: parse_or_default(
                    "NOTIFICATION_RETENTION_SECS",
                    delivery_defaults.retention_secs,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.matching.validate()?;
        self.delivery.validate()?;

        if self.event_buffer_size == 0 {
            return Err(AppError::InvalidConfiguration(
                "EVENT_BUFFER_SIZE must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl MatchingConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.search_radius_km.is_finite() || self.search_radius_km <= 0.0 {
            return Err(AppError::InvalidConfiguration(format!(
                "search radius must be a positive number of km, got {}",
                self.search_radius_km
            )));
        }

        if !self.average_speed_kmh.is_finite() || self.average_speed_kmh <= 0.0 {
            return Err(AppError::InvalidConfiguration(format!(
                "average speed must be > 0 km/h, got {}",
                self.average_speed_kmh
            )));
        }

        validate_window("request expiry window", self.request_expiry_secs)?;

        if self.expiry_sweep_interval_ms == 0 {
            return Err(AppError::InvalidConfiguration(
                "expiry sweep interval must be > 0 ms".to_string(),
            ));
        }

        Ok(())
    }
}

impl DeliveryConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_attempts == 0 {
            return Err(AppError::InvalidConfiguration(
                "notification max attempts must be >= 1".to_string(),
            ));
        }

        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(AppError::InvalidConfiguration(format!(
                "backoff base ({} ms) exceeds backoff cap ({} ms)",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }

        if self.backoff_max_ms > MAX_BACKOFF_MS {
            return Err(AppError::InvalidConfiguration(format!(
                "backoff cap must be <= {MAX_BACKOFF_MS} ms, got {}",
                self.backoff_max_ms
            )));
        }

        if self.poll_interval_ms == 0 {
            return Err(AppError::InvalidConfiguration(
                "delivery poll interval must be > 0 ms".to_string(),
            ));
        }

        validate_window("notification retention", self.retention_secs)
    }
}

fn validate_window(name: &str, secs: i64) -> Result<(), AppError> {
    if secs <= 0 || secs > MAX_WINDOW_SECS || Duration::try_seconds(secs).is_none() {
        return Err(AppError::InvalidConfiguration(format!(
            "{name} must be between 1 and {MAX_WINDOW_SECS} seconds, got {secs}"
        )));
    }
    Ok(())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::InvalidConfiguration(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
