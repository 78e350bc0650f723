use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use crate::models::PaymentConfig;

const UPI_ID_ENV: &str = "CLINIC_UPI_ID";
const PAYEE_NAME_ENV: &str = "CLINIC_PAYEE_NAME";
const DEFAULT_FEE_ENV: &str = "CLINIC_DEFAULT_FEE";
const BOOKING_WINDOW_ENV: &str = "CLINIC_BOOKING_WINDOW_DAYS";
const LINK_DELAY_ENV: &str = "CLINIC_LINK_DELAY_MS";
const RESEND_DELAY_ENV: &str = "CLINIC_RESEND_DELAY_MS";
const LOOKUP_DELAY_ENV: &str = "CLINIC_LOOKUP_DELAY_MS";

/// Longest forward booking window accepted from the environment.
pub const MAX_BOOKING_WINDOW_DAYS: i64 = 365;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub default_fee: u32,
    pub booking_window_days: i64,
    pub link_delay: Duration,
    pub resend_delay: Duration,
    pub lookup_delay: Duration,
}
fn default_fee() -> u32 { 500 }
fn default_booking_window_days() -> i64 { 30 }
fn default_link_delay() -> Duration { Duration::from_millis(2000) }
fn default_resend_delay() -> Duration { Duration::from_millis(1500) }
fn default_lookup_delay() -> Duration { Duration::from_millis(1000) }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_fee: default_fee(),
            booking_window_days: default_booking_window_days(),
            link_delay: default_link_delay(),
            resend_delay: default_resend_delay(),
            lookup_delay: default_lookup_delay(),
        }
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn env_millis(name: &str, default: Duration) -> Result<Duration> {
    env_or(name, default.as_millis() as u64).map(Duration::from_millis)
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            default_fee: env_or(DEFAULT_FEE_ENV, default_fee())?,
            booking_window_days: env_or(BOOKING_WINDOW_ENV, default_booking_window_days())?,
            link_delay: env_millis(LINK_DELAY_ENV, default_link_delay())?,
            resend_delay: env_millis(RESEND_DELAY_ENV, default_resend_delay())?,
            lookup_delay: env_millis(LOOKUP_DELAY_ENV, default_lookup_delay())?,
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        anyhow::ensure!(
            (0..=MAX_BOOKING_WINDOW_DAYS).contains(&self.booking_window_days),
            "{} must be between 0 and {}, got {}",
            BOOKING_WINDOW_ENV,
            MAX_BOOKING_WINDOW_DAYS,
            self.booking_window_days
        );
        Ok(())
    }
}

impl PaymentConfig {
    pub fn from_env() -> Self {
        let defaults = PaymentConfig::default();
        Self {
            upi_id: env::var(UPI_ID_ENV).unwrap_or(defaults.upi_id),
            payee_name: env::var(PAYEE_NAME_ENV).unwrap_or(defaults.payee_name),
            currency: defaults.currency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(env_or("CLINIC_TEST_UNSET_VARIABLE", 42u32).unwrap(), 42);
        let config = AppConfig::default();
        assert_eq!(config.default_fee, 500);
        assert_eq!(config.booking_window_days, 30);
        assert_eq!(config.link_delay, Duration::from_millis(2000));
        assert_eq!(config.resend_delay, Duration::from_millis(1500));
        assert_eq!(config.lookup_delay, Duration::from_millis(1000));
    }

    #[test]
    fn booking_window_is_bounded() {
        let mut config = AppConfig::default();
        assert!(config.check().is_ok());

        config.booking_window_days = MAX_BOOKING_WINDOW_DAYS;
        assert!(config.check().is_ok());

        config.booking_window_days = 1_000_000_000;
        let err = config.check().unwrap_err();
        assert!(err.to_string().contains(BOOKING_WINDOW_ENV));

        config.booking_window_days = -1;
        assert!(config.check().is_err());
    }

    #[test]
    fn malformed_value_is_an_error() {
        env::set_var("CLINIC_TEST_BAD_FEE", "five hundred");
        let err = env_or("CLINIC_TEST_BAD_FEE", 500u32).unwrap_err();
        assert!(err.to_string().contains("CLINIC_TEST_BAD_FEE"));
        env::remove_var("CLINIC_TEST_BAD_FEE");
    }
}
