//! Core banking types, the error taxonomy, tax-ID validation, and
//! client configuration.
//!
//! Nothing in this module performs I/O; it is shared by the session,
//! gateway, directory, and aggregator layers.

pub mod config;
mod error;
pub mod tax_id;
mod types;

pub use config::{ClientConfig, ConfigError};
pub use error::*;
pub use tax_id::{
    TaxIdKind, classify_tax_id, is_valid_tax_id_primary, is_valid_tax_id_secondary,
    normalize_tax_id,
};
pub use types::*;
