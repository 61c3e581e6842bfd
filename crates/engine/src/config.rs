//! Engine tuning loaded from environment variables.

use std::time::Duration;

use domain::IntakeLimits;

/// Engine configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `ORDER_CURRENCY` (default: `"INR"`)
/// - `MAX_LINE_QUANTITY` (default: `100`)
/// - `RESERVATION_ATTEMPTS` (default: `3`)
/// - `RESERVATION_BACKOFF_MS` (default: `25`)
/// - `STATUS_UPDATE_ATTEMPTS` (default: `3`)
/// - `NOTIFICATION_TIMEOUT_MS` (default: `2000`)
/// - `PAYMENT_TIMEOUT_MS` (default: `5000`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// ISO currency code sent to the payment provider.
    pub currency: String,
    /// Upper bound on a single cart line's quantity.
    pub max_line_quantity: u32,
    /// Placement attempts when the ledger reports contention or stale stock.
    pub reservation_attempts: u32,
    /// Base delay between placement attempts; grows linearly.
    pub reservation_backoff: Duration,
    /// Attempts for engine-driven status updates that lose a version race.
    pub status_update_attempts: u32,
    /// How long a notification may take before it is reported as failed.
    pub notification_timeout: Duration,
    /// How long the payment provider may take to create an intent.
    pub payment_timeout: Duration,
}

impl EngineConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };
        let count = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };

        Self {
            currency: lookup("ORDER_CURRENCY").unwrap_or(defaults.currency),
            max_line_quantity: count("MAX_LINE_QUANTITY", defaults.max_line_quantity),
            reservation_attempts: count("RESERVATION_ATTEMPTS", defaults.reservation_attempts),
            reservation_backoff: Duration::from_millis(number("RESERVATION_BACKOFF_MS", 25)),
            status_update_attempts: count(
                "STATUS_UPDATE_ATTEMPTS",
                defaults.status_update_attempts,
            ),
            notification_timeout: Duration::from_millis(number("NOTIFICATION_TIMEOUT_MS", 2000)),
            payment_timeout: Duration::from_millis(number("PAYMENT_TIMEOUT_MS", 5000)),
        }
    }

    /// Limits handed to cart validation.
    pub fn intake_limits(&self) -> IntakeLimits {
        IntakeLimits {
            max_line_quantity: self.max_line_quantity,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            max_line_quantity: IntakeLimits::default().max_line_quantity,
            reservation_attempts: 3,
            reservation_backoff: Duration::from_millis(25),
            status_update_attempts: 3,
            notification_timeout: Duration::from_millis(2000),
            payment_timeout: Duration::from_millis(5000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.currency, "INR");
        assert_eq!(config.max_line_quantity, 100);
        assert_eq!(config.reservation_attempts, 3);
        assert_eq!(config.reservation_backoff, Duration::from_millis(25));
        assert_eq!(config.status_update_attempts, 3);
        assert_eq!(config.notification_timeout, Duration::from_secs(2));
        assert_eq!(config.payment_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ORDER_CURRENCY", "USD"),
            ("MAX_LINE_QUANTITY", "10"),
            ("RESERVATION_BACKOFF_MS", "5"),
            ("PAYMENT_TIMEOUT_MS", "750"),
        ]
        .into();
        let config = EngineConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.currency, "USD");
        assert_eq!(config.intake_limits().max_line_quantity, 10);
        assert_eq!(config.reservation_backoff, Duration::from_millis(5));
        assert_eq!(config.payment_timeout, Duration::from_millis(750));
        assert_eq!(config.reservation_attempts, 3);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let vars: HashMap<&str, &str> =
            [("RESERVATION_ATTEMPTS", "0"), ("STATUS_UPDATE_ATTEMPTS", "many")].into();
        let config = EngineConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.reservation_attempts, 3);
        assert_eq!(config.status_update_attempts, 3);
    }
}
