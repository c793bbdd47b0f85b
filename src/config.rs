use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use validator::Validate;

use crate::catalog::ShippingPolicy;

const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// JWT verification secret shared with the identity provider
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Subtotal at or above which shipping is free
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Decimal,

    /// Flat shipping fee below the free-shipping threshold
    #[serde(default = "default_flat_shipping_fee")]
    pub flat_shipping_fee: Decimal,

    /// Catalog page size for product listings
    #[serde(default = "default_catalog_page_size")]
    pub catalog_page_size: u64,

    /// Fallback image when a product has neither gallery nor own image
    #[serde(default = "default_placeholder_image_url")]
    pub placeholder_image_url: String,

    /// Directory where uploaded media is stored
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// Public URL prefix under which stored media is served
    #[serde(default = "default_media_base_url")]
    pub media_base_url: String,

    /// CORS: comma-separated list of allowed origins; empty = permissive
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_free_shipping_threshold() -> Decimal {
    dec!(100)
}
fn default_flat_shipping_fee() -> Decimal {
    dec!(10)
}
fn default_catalog_page_size() -> u64 {
    12
}
fn default_placeholder_image_url() -> String {
    "/media/placeholder.png".to_string()
}
fn default_media_root() -> String {
    "media".to_string()
}
fn default_media_base_url() -> String {
    "/media".to_string()
}

impl AppConfig {
    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy {
            free_threshold: self.free_shipping_threshold,
            flat_fee: self.flat_shipping_fee,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
    #[error("invalid configuration: {0}")]
    Inconsistent(String),
}

/// Loads configuration from `config/default.toml`, an environment-specific
/// overlay (`config/{APP_ENVIRONMENT}.toml`) and `APP_*` environment
/// variables, in that order of precedence.
pub fn load_config() -> Result<AppConfig, ConfigLoadError> {
    let environment =
        std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder();
    let default_file = Path::new(CONFIG_DIR).join("default.toml");
    let env_file = Path::new(CONFIG_DIR).join(format!("{}.toml", environment));
    builder = builder
        .add_source(File::from(default_file).required(false))
        .add_source(File::from(env_file).required(false))
        .add_source(Environment::with_prefix("APP"));

    let config: AppConfig = builder.build()?.try_deserialize()?;
    config.validate()?;

    if config.flat_shipping_fee < Decimal::ZERO || config.free_shipping_threshold < Decimal::ZERO {
        return Err(ConfigLoadError::Inconsistent(
            "shipping amounts must not be negative".to_string(),
        ));
    }
    if config.catalog_page_size == 0 {
        return Err(ConfigLoadError::Inconsistent(
            "catalog_page_size must be at least 1".to_string(),
        ));
    }

    Ok(config)
}

/// Initializes the global tracing subscriber. `RUST_LOG` takes precedence
/// over the configured level when set.
pub fn init_tracing(log_level: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
