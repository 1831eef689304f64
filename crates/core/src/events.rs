//! Domain notifications emitted by successful operations.
//!
//! Components push events into an [`Outbox`] while an operation runs. The
//! [`Market`](crate::market::Market) only hands the outbox to callers once
//! the operation has committed, so a failed operation never leaks events.

use serde::Serialize;

use crate::access::Role;
use crate::types::{Amount, AssetId, Identity, Timestamp};

/// Which component a role or control change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Registry,
    Pricing,
    Exchange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    // -- Registry --
    AssetCreated {
        asset_id: AssetId,
        uri: String,
        price: Amount,
        owner: Identity,
    },
    PriceAuthorityChanged {
        old: Option<Identity>,
        new: Identity,
    },
    AssetPriceChanged {
        asset_id: AssetId,
        old_price: Amount,
        new_price: Amount,
    },
    Transfer {
        asset_id: AssetId,
        from: Option<Identity>,
        to: Identity,
    },
    Approval {
        asset_id: AssetId,
        owner: Identity,
        approved: Option<Identity>,
    },
    ApprovalForAll {
        owner: Identity,
        operator: Identity,
        approved: bool,
    },

    // -- Pricing --
    PriceUpdated {
        asset_id: AssetId,
        old_price: Amount,
        new_price: Amount,
        timestamp: Timestamp,
        source: String,
        confidence_score: u8,
    },
    PricingRegistryChanged {
        old: Identity,
        new: Identity,
    },
    MinConfidenceChanged {
        old: u8,
        new: u8,
    },

    // -- Exchange --
    Listed {
        asset_id: AssetId,
        seller: Identity,
        price: Amount,
        timestamp: Timestamp,
    },
    Delisted {
        asset_id: AssetId,
        seller: Identity,
        timestamp: Timestamp,
    },
    Sold {
        asset_id: AssetId,
        seller: Identity,
        buyer: Identity,
        price: Amount,
        timestamp: Timestamp,
    },
    FeeChanged {
        old_bps: u16,
        new_bps: u16,
    },
    FeeCollectorChanged {
        old: Identity,
        new: Identity,
    },
    ExchangeRegistryChanged {
        old: Identity,
        new: Identity,
    },

    // -- Access / funds --
    RoleGranted {
        component: Component,
        role: Role,
        account: Identity,
        sender: Identity,
    },
    RoleRevoked {
        component: Component,
        role: Role,
        account: Identity,
        sender: Identity,
    },
    ControlTransferred {
        component: Component,
        old: Identity,
        new: Identity,
    },
    Withdrawal {
        account: Identity,
        amount: Amount,
    },
}

impl MarketEvent {
    /// Dot-separated event name, e.g. `"exchange.sold"`.
    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::AssetCreated { .. } => "registry.asset_created",
            MarketEvent::PriceAuthorityChanged { .. } => "registry.price_authority_changed",
            MarketEvent::AssetPriceChanged { .. } => "registry.price_changed",
            MarketEvent::Transfer { .. } => "registry.transfer",
            MarketEvent::Approval { .. } => "registry.approval",
            MarketEvent::ApprovalForAll { .. } => "registry.approval_for_all",
            MarketEvent::PriceUpdated { .. } => "pricing.price_updated",
            MarketEvent::PricingRegistryChanged { .. } => "pricing.registry_changed",
            MarketEvent::MinConfidenceChanged { .. } => "pricing.min_confidence_changed",
            MarketEvent::Listed { .. } => "exchange.listed",
            MarketEvent::Delisted { .. } => "exchange.delisted",
            MarketEvent::Sold { .. } => "exchange.sold",
            MarketEvent::FeeChanged { .. } => "exchange.fee_changed",
            MarketEvent::FeeCollectorChanged { .. } => "exchange.fee_collector_changed",
            MarketEvent::ExchangeRegistryChanged { .. } => "exchange.registry_changed",
            MarketEvent::RoleGranted { .. } => "access.role_granted",
            MarketEvent::RoleRevoked { .. } => "access.role_revoked",
            MarketEvent::ControlTransferred { .. } => "access.control_transferred",
            MarketEvent::Withdrawal { .. } => "ledger.withdrawal",
        }
    }
}

/// Events collected during a single operation.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<MarketEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: MarketEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<MarketEvent> {
        self.events
    }
}
