//! # Checkout Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     STOREFRONT__TAX_RATE_BPS=750                                        │
//! │     STOREFRONT__JWT_SECRET=...                                          │
//! │                                                                         │
//! │  2. ./storefront.toml (working directory)                               │
//! │                                                                         │
//! │  3. User config file                                                    │
//! │     ~/.config/storefront/storefront.toml (Linux)                        │
//! │                                                                         │
//! │  4. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! database_path = "./data/storefront.db"
//! bind_address = "0.0.0.0:8080"
//! tax_rate_bps = 750
//! gateway_public_key = "pk_live_..."
//! gateway_timeout_secs = 600
//!
//! # zones merge with the built-in table by index
//! [shipping]
//! default_fee = 2500
//! zones = [
//!     { region = "Lagos", fee = 1500 },
//!     { region = "Abuja", fee = 3500 },
//! ]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use storefront_core::validation::validate_tax_rate_bps;
use storefront_core::{Money, PricingEngine, Rate, ShippingRateTable, ShippingZone};
use storefront_db::DbConfig;

/// Environment variable prefix; nested keys use `__`.
pub const ENV_PREFIX: &str = "STOREFRONT";

const CONFIG_FILE_NAME: &str = "storefront.toml";

/// Built-in signing secret. Anyone holding it can mint session tokens.
pub const DEV_JWT_SECRET: &str = "storefront-dev-secret-change-in-production";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// =============================================================================
// Shipping Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSettings {
    pub region: String,
    pub fee: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSettings {
    pub zones: Vec<ZoneSettings>,
    pub default_fee: Money,
}

impl Default for ShippingSettings {
    fn default() -> Self {
        ShippingSettings::from(&ShippingRateTable::standard())
    }
}

impl From<&ShippingRateTable> for ShippingSettings {
    fn from(table: &ShippingRateTable) -> Self {
        ShippingSettings {
            zones: table
                .zones
                .iter()
                .map(|zone| ZoneSettings {
                    region: zone.region.clone(),
                    fee: zone.fee,
                })
                .collect(),
            default_fee: table.default_fee,
        }
    }
}

impl ShippingSettings {
    pub fn to_table(&self) -> ShippingRateTable {
        ShippingRateTable::new(
            self.zones
                .iter()
                .map(|zone| ShippingZone::new(zone.region.clone(), zone.fee))
                .collect(),
            self.default_fee,
        )
    }
}

// =============================================================================
// Checkout Config
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// SQLite database file.
    pub database_path: String,

    /// HTTP listen address for the API.
    pub bind_address: String,

    /// Tax rate in basis points (750 = 7.5%).
    pub tax_rate_bps: u32,

    pub shipping: ShippingSettings,

    /// HMAC secret for session tokens.
    pub jwt_secret: String,

    /// Session token lifetime in seconds.
    pub session_lifetime_secs: i64,

    /// Public key handed to the payment widget.
    pub gateway_public_key: String,

    /// How long to wait for the payment widget to report back.
    pub gateway_timeout_secs: u64,

    /// Queue order confirmation notifications after commit.
    pub notifications_enabled: bool,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            database_path: "./storefront.db".to_string(),
            bind_address: "127.0.0.1:8080".to_string(),
            tax_rate_bps: storefront_core::pricing::DEFAULT_TAX_RATE_BPS,
            shipping: ShippingSettings::default(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            session_lifetime_secs: 3600,
            gateway_public_key: "pk_test_storefront".to_string(),
            gateway_timeout_secs: 600,
            notifications_enabled: true,
        }
    }
}

impl CheckoutConfig {
    /// Loads defaults, the user and working-directory config files, then
    /// `STOREFRONT__*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut files = Vec::new();
        if let Some(path) = Self::default_config_path() {
            files.push(path);
        }
        files.push(PathBuf::from(CONFIG_FILE_NAME));
        Self::load_layers(&files, true)
    }

    /// Loads defaults plus a single optional file, ignoring the environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_layers(&[path.to_path_buf()], false)
    }

    fn load_layers(files: &[PathBuf], with_env: bool) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&CheckoutConfig::default())?);

        for path in files {
            debug!(path = %path.display(), "Checking config file");
            builder = builder.add_source(
                File::new(&path.to_string_lossy(), FileFormat::Toml).required(false),
            );
        }

        if with_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: CheckoutConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        if config.uses_dev_secret() {
            warn!("jwt_secret is the built-in development value; set STOREFRONT__JWT_SECRET before serving real traffic");
        }
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_tax_rate_bps(self.tax_rate_bps).map_err(|e| ConfigError::InvalidValue {
            key: "tax_rate_bps",
            reason: e.to_string(),
        })?;

        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "jwt_secret",
                reason: "must not be empty".into(),
            });
        }

        if self.session_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "session_lifetime_secs",
                reason: "must be greater than 0".into(),
            });
        }

        if self.gateway_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "gateway_timeout_secs",
                reason: "must be greater than 0".into(),
            });
        }

        if self.shipping.default_fee.is_negative()
            || self.shipping.zones.iter().any(|zone| zone.fee.is_negative())
        {
            return Err(ConfigError::InvalidValue {
                key: "shipping",
                reason: "fees must not be negative".into(),
            });
        }

        Ok(())
    }

    /// True while session tokens are signed with [`DEV_JWT_SECRET`].
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("ng", "storefront", "storefront")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn tax_rate(&self) -> Rate {
        Rate::from_bps(self.tax_rate_bps)
    }

    pub fn pricing_engine(&self) -> PricingEngine {
        PricingEngine::new(self.tax_rate(), self.shipping.to_table())
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
    }
}
