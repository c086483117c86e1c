pub mod app_config;
pub mod config;
pub mod staging;

use thiserror::Error;

pub use app_config::AppConfig;
pub use config::load_app_config;
pub use staging::{FlatStockRow, RawPayloadMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
