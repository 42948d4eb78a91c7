//! Core types for pgbridge.
//!
//! This module provides foundational types used throughout the system:
//! - **Errors**: Application error types and wire-level error kinds
//! - **Config**: Configuration structures and the startup loader

mod config;
mod errors;

pub use config::{
    load_config, load_config_from, Config, DatabaseConfig, GoogleConfig, ObservabilityConfig,
    ServerConfig, CONFIG_FILE_NAME, CONFIG_PATH_ENV, DATABASE_URL_ENV,
};
pub use errors::{Error, ErrorKind, Result};
