//! Real-world asset registry, pricing ledger and exchange.
//!
//! - [`registry`] -- canonical asset records and single-delegate ownership.
//! - [`pricing`] -- role-gated price submissions with a bounded audit trail.
//! - [`exchange`] -- listings and atomic, fee-splitting sales.
//! - [`market`] -- serialized facade wiring the three together.

pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod exchange;
pub mod history;
pub mod ledger;
pub mod market;
pub mod pricing;
pub mod registry;
pub mod types;
