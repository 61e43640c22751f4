//! Engine configuration, read from `MKT_*` environment variables.
//!
//! Missing or malformed values are logged and replaced with defaults, so a misconfigured deployment still starts
//! (in sandbox mode, unless told otherwise).
use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use marketplace_common::{
    helpers::{parse_boolean_flag, parse_env_var},
    Cents,
    Rate,
    Secret,
};

use crate::calculator::ProcessorFeeModel;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/marketplace.db";
const DEFAULT_TAX_RATE_BPS: i64 = 109;
const DEFAULT_PROCESSOR_FEE_BPS: i64 = 25;
const DEFAULT_PROCESSOR_FLAT_FEE_CENTS: i64 = 25;
const DEFAULT_CARRIER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PROCESSOR_TIMEOUT_SECS: u64 = 30;

/// Selects sandbox or production endpoints for the external services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub fn carrier_base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://wwwcie.ups.com/api",
            Self::Production => "https://onlinetools.ups.com/api",
        }
    }

    pub fn payment_base_url(&self) -> &'static str {
        "https://api.stripe.com/v1"
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" | "development" | "test" => Ok(Self::Sandbox),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!("'{s}' is not a known environment")),
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database_url: String,
    pub environment: Environment,
    /// Sales tax, applied to the item subtotal only
    pub tax_rate: Rate,
    /// What the payment processor charges to move money to a seller
    pub processor_fees: ProcessorFeeModel,
    pub carrier_timeout: Duration,
    pub processor_timeout: Duration,
    pub payment_api_key: Secret<String>,
    pub carrier_api_key: Secret<String>,
    /// If true, a carrier label is voided again when the shipment could not be saved locally.
    pub compensate_failed_shipments: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            environment: Environment::default(),
            tax_rate: Rate::from_bps(DEFAULT_TAX_RATE_BPS).unwrap_or_default(),
            processor_fees: ProcessorFeeModel::new(
                Rate::from_bps(DEFAULT_PROCESSOR_FEE_BPS).unwrap_or_default(),
                Cents::from(DEFAULT_PROCESSOR_FLAT_FEE_CENTS),
            ),
            carrier_timeout: Duration::from_secs(DEFAULT_CARRIER_TIMEOUT_SECS),
            processor_timeout: Duration::from_secs(DEFAULT_PROCESSOR_TIMEOUT_SECS),
            payment_api_key: Secret::default(),
            carrier_api_key: Secret::default(),
            compensate_failed_shipments: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let database_url = env::var("MKT_DATABASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ MKT_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let environment = env_or("MKT_ENVIRONMENT", defaults.environment);
        let tax_rate = rate_or("MKT_TAX_RATE_BPS", defaults.tax_rate);
        let fee_rate = rate_or("MKT_PROCESSOR_FEE_BPS", defaults.processor_fees.percent);
        let flat_fee = env_or("MKT_PROCESSOR_FLAT_FEE_CENTS", defaults.processor_fees.flat.value());
        let flat_fee = if flat_fee < 0 {
            error!("🪛️ MKT_PROCESSOR_FLAT_FEE_CENTS cannot be negative. Using {}", defaults.processor_fees.flat);
            defaults.processor_fees.flat
        } else {
            Cents::from(flat_fee)
        };
        let carrier_timeout = Duration::from_secs(env_or("MKT_CARRIER_TIMEOUT_SECS", DEFAULT_CARRIER_TIMEOUT_SECS));
        let processor_timeout =
            Duration::from_secs(env_or("MKT_PROCESSOR_TIMEOUT_SECS", DEFAULT_PROCESSOR_TIMEOUT_SECS));
        let payment_api_key = secret_from_env("MKT_PAYMENT_API_KEY");
        let carrier_api_key = secret_from_env("MKT_CARRIER_API_KEY");
        let compensate_failed_shipments =
            parse_boolean_flag(env::var("MKT_COMPENSATE_FAILED_SHIPMENTS").ok(), defaults.compensate_failed_shipments);
        info!("🪛️ Marketplace engine configured for the {environment} environment");
        Self {
            database_url,
            environment,
            tax_rate,
            processor_fees: ProcessorFeeModel::new(fee_rate, flat_fee),
            carrier_timeout,
            processor_timeout,
            payment_api_key,
            carrier_api_key,
            compensate_failed_shipments,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match parse_env_var::<T>(key) {
        Ok(Some(v)) => v,
        Ok(None) => {
            debug!("🪛️ {key} is not set. Using the default, {default}");
            default
        },
        Err(e) => {
            error!("🪛️ {e} Using the default, {default}, instead.");
            default
        },
    }
}

fn rate_or(key: &str, default: Rate) -> Rate {
    let bps = env_or(key, default.bps());
    Rate::from_bps(bps).unwrap_or_else(|e| {
        error!("🪛️ {key}: {e}. Using the default, {default}, instead.");
        default
    })
}

fn secret_from_env(key: &str) -> Secret<String> {
    let value = env::var(key).unwrap_or_else(|_| {
        warn!("🪛️ {key} is not set. Calls to the external service will not be authenticated.");
        String::default()
    });
    Secret::new(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn environments() {
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("sandbox".parse::<Environment>().unwrap(), Environment::Sandbox);
        assert!("staging".parse::<Environment>().is_err());
        assert_ne!(Environment::Sandbox.carrier_base_url(), Environment::Production.carrier_base_url());
    }

    // All env manipulation lives in one test so parallel tests can't interfere with each other.
    #[test]
    fn config_from_env() {
        let _ = env_logger::try_init();
        for key in [
            "MKT_TAX_RATE_BPS",
            "MKT_PROCESSOR_FEE_BPS",
            "MKT_CARRIER_TIMEOUT_SECS",
            "MKT_ENVIRONMENT",
            "MKT_PAYMENT_API_KEY",
            "MKT_CARRIER_API_KEY",
        ] {
            env::remove_var(key);
        }
        let config = EngineConfig::from_env_or_default();
        assert_eq!(config.tax_rate.bps(), 109);
        assert_eq!(config.processor_fees.percent.bps(), 25);
        assert_eq!(config.carrier_timeout, Duration::from_secs(30));
        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.environment.carrier_base_url(), "https://wwwcie.ups.com/api");
        assert!(config.payment_api_key.is_empty());
        assert!(config.carrier_api_key.is_empty());

        env::set_var("MKT_TAX_RATE_BPS", "825");
        env::set_var("MKT_PROCESSOR_FEE_BPS", "20000");
        env::set_var("MKT_CARRIER_TIMEOUT_SECS", "five");
        env::set_var("MKT_ENVIRONMENT", "production");
        env::set_var("MKT_PAYMENT_API_KEY", "sk_live_abc123");
        env::set_var("MKT_CARRIER_API_KEY", "ups_key_789");
        let config = EngineConfig::from_env_or_default();
        assert_eq!(config.tax_rate.bps(), 825);
        // out of range, so the default is kept
        assert_eq!(config.processor_fees.percent.bps(), 25);
        assert_eq!(config.carrier_timeout, Duration::from_secs(30));
        assert!(config.environment.is_production());
        assert_eq!(config.environment.carrier_base_url(), "https://onlinetools.ups.com/api");
        assert_eq!(config.environment.payment_base_url(), "https://api.stripe.com/v1");
        assert_eq!(config.payment_api_key.reveal(), "sk_live_abc123");
        assert_eq!(config.carrier_api_key.reveal(), "ups_key_789");
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk_live_abc123"));
        assert!(!printed.contains("ups_key_789"));
        for key in [
            "MKT_TAX_RATE_BPS",
            "MKT_PROCESSOR_FEE_BPS",
            "MKT_CARRIER_TIMEOUT_SECS",
            "MKT_ENVIRONMENT",
            "MKT_PAYMENT_API_KEY",
            "MKT_CARRIER_API_KEY",
        ] {
            env::remove_var(key);
        }
    }
}
