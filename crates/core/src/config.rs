//! Wiring parameters for a [`Market`](crate::market::Market).

use crate::types::Identity;

/// Default exchange fee (2.5%).
pub const DEFAULT_FEE_BPS: u16 = 250;

/// Default minimum confidence for price submissions.
pub const DEFAULT_MIN_CONFIDENCE: u8 = 70;

#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Registry controller, pricing admin/configurator and exchange owner.
    pub controller: Identity,
    pub registry_address: Identity,
    pub pricing_address: Identity,
    pub exchange_address: Identity,
    pub fee_collector: Identity,
    pub fee_bps: u16,
    pub min_confidence: u8,
    /// Identities granted the submitter role at startup.
    pub submitters: Vec<Identity>,
}

impl MarketConfig {
    /// Defaults with every role held by `controller`.
    pub fn with_controller(controller: Identity) -> Self {
        Self {
            fee_collector: controller.clone(),
            controller,
            registry_address: Identity::known("registry"),
            pricing_address: Identity::known("pricing-agent"),
            exchange_address: Identity::known("exchange"),
            fee_bps: DEFAULT_FEE_BPS,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            submitters: Vec::new(),
        }
    }
}
