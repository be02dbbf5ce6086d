//! # cardwise
//!
//! Data-synchronization core of a digital-banking client: the card
//! directory with its selected account, concurrent balance aggregation,
//! session handling, and the gateway that serves all of them from either
//! deterministic fixtures or a real HTTP backend.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use cardwise::core::*;
//!
//! assert!(is_valid_tax_id_primary("529.982.247-25"));
//! assert!(is_valid_tax_id_secondary("11.222.333/0001-81"));
//! assert!(!is_valid_tax_id_primary("111.111.111-11"));
//! ```
//!
//! ```ignore
//! use cardwise::{aggregate::BalanceAggregator, directory::InstrumentDirectory};
//! use cardwise::{gateway::Gateway, session::SessionHolder, core::ClientConfig};
//! use std::sync::Arc;
//!
//! let session = SessionHolder::new();
//! let gateway = Arc::new(Gateway::fixtures(&ClientConfig::default(), session.clone()));
//! let directory = InstrumentDirectory::new(gateway.clone());
//! directory.load_for_holder("52998224725").await;
//!
//! let aggregator = BalanceAggregator::new(gateway);
//! let outcome = aggregator.run(&directory.snapshot().instruments).await;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Data model, error taxonomy, tax-ID validation, config |
//! | `sync` (default) | Session holder, gateway, instrument directory, balance aggregator |
//! | `http` | `reqwest`-backed HTTP transport for the gateway |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "sync")]
pub mod session;

#[cfg(feature = "sync")]
pub mod gateway;

#[cfg(feature = "sync")]
pub mod directory;

#[cfg(feature = "sync")]
pub mod aggregate;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
