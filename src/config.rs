// src/config.rs

use std::env;
use std::time::Duration;

/// Simulated-latency and currency settings. Everything has a default so the
/// demo runs without any environment at all; per-module latency can be
/// overridden individually.
#[derive(Clone, Debug)]
pub struct Config {
    pub clinical_latency: Duration,
    pub billing_latency: Duration,
    pub engagement_latency: Duration,
    pub records_latency: Duration,
    pub default_currency: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let base = read_ms("SIM_LATENCY_MS").unwrap_or(400);

        Ok(Self {
            clinical_latency: Duration::from_millis(
                read_ms("CLINICAL_LATENCY_MS").unwrap_or(base),
            ),
            billing_latency: Duration::from_millis(read_ms("BILLING_LATENCY_MS").unwrap_or(base)),
            engagement_latency: Duration::from_millis(
                read_ms("ENGAGEMENT_LATENCY_MS").unwrap_or(base),
            ),
            records_latency: Duration::from_millis(read_ms("RECORDS_LATENCY_MS").unwrap_or(base)),
            default_currency: env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
        })
    }

    /// Zero-latency settings for tests, so command flows settle immediately.
    pub fn instant() -> Self {
        Self {
            clinical_latency: Duration::ZERO,
            billing_latency: Duration::ZERO,
            engagement_latency: Duration::ZERO,
            records_latency: Duration::ZERO,
            default_currency: "USD".to_string(),
        }
    }
}

fn read_ms(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|s| s.parse::<u64>().ok())
}
