//! Serialized facade over the registry directory, pricing agent, exchange
//! and ledger.
//!
//! Every mutating call runs as one unit: events are collected in an
//! [`Outbox`] and only returned once the call has succeeded. Components
//! validate before they write, and `buy` undoes its own legs, so a failed
//! call leaves no trace.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::access::Role;
use crate::clock::{Clock, SystemClock};
use crate::config::MarketConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{MarketEvent, Outbox};
use crate::exchange::{Exchange, Listing, SaleQuote, SaleReceipt};
use crate::ledger::Ledger;
use crate::pricing::{PriceSubmission, PriceUpdateEntry, PricingAgent};
use crate::registry::{AssetMetadata, AssetRecord, AssetRegistry};
use crate::types::{Amount, AssetId, Identity};

/// Result of a committed operation together with the events it emitted.
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    pub events: Vec<MarketEvent>,
}

/// Input for minting an asset.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub owner: Identity,
    pub uri: String,
    pub initial_price: Amount,
    pub metadata: AssetMetadata,
}

pub struct Market {
    /// Registries keyed by address. `primary` is the default target of
    /// registry operations.
    registries: BTreeMap<Identity, AssetRegistry>,
    primary: Identity,
    pricing: PricingAgent,
    exchange: Exchange,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
}

impl Market {
    pub fn new(config: MarketConfig) -> CoreResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Wire a registry, pricing agent and exchange from `config`. The pricing
    /// agent becomes the registry's price authority.
    pub fn with_clock(config: MarketConfig, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        let mut bootstrap = Outbox::new();

        let mut registry =
            AssetRegistry::new(config.registry_address.clone(), config.controller.clone());
        registry.set_price_authority(
            &config.controller,
            config.pricing_address.clone(),
            &mut bootstrap,
        )?;

        let mut pricing = PricingAgent::new(
            config.pricing_address,
            config.registry_address.clone(),
            &config.controller,
            config.min_confidence,
        )?;
        for submitter in config.submitters {
            pricing.grant_role(&config.controller, Role::Submitter, submitter, &mut bootstrap)?;
        }

        let exchange = Exchange::new(
            config.exchange_address,
            config.registry_address.clone(),
            &config.controller,
            config.fee_bps,
            config.fee_collector,
        )?;

        tracing::info!(
            registry = %config.registry_address,
            pricing = %pricing.address(),
            exchange = %exchange.address(),
            fee_bps = exchange.fee_basis_points(),
            min_confidence = pricing.minimum_confidence(),
            "Market initialized"
        );

        let primary = config.registry_address;
        let mut registries = BTreeMap::new();
        registries.insert(primary.clone(), registry);
        Ok(Self {
            registries,
            primary,
            pricing,
            exchange,
            ledger: Ledger::new(),
            clock,
        })
    }

    fn run<T>(
        &mut self,
        operation: &'static str,
        op: impl FnOnce(&mut Self, &mut Outbox) -> CoreResult<T>,
    ) -> CoreResult<Committed<T>> {
        let mut out = Outbox::new();
        match op(self, &mut out) {
            Ok(value) => Ok(Committed {
                value,
                events: out.into_events(),
            }),
            Err(err) => {
                tracing::debug!(operation, error = %err, "Operation rejected");
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Registry directory
    // -----------------------------------------------------------------------

    /// Add another registry at `address`.
    pub fn deploy_registry(&mut self, address: Identity, controller: Identity) -> CoreResult<()> {
        if self.registries.contains_key(&address) {
            return Err(CoreError::Conflict(format!(
                "a registry already exists at {address}"
            )));
        }
        tracing::info!(address = %address, controller = %controller, "Registry deployed");
        self.registries
            .insert(address.clone(), AssetRegistry::new(address, controller));
        Ok(())
    }

    pub fn registry_at(&self, address: &Identity) -> CoreResult<&AssetRegistry> {
        self.registries
            .get(address)
            .ok_or_else(|| CoreError::not_found("Registry", address))
    }

    pub fn primary_address(&self) -> &Identity {
        &self.primary
    }

    pub fn primary_registry(&self) -> &AssetRegistry {
        // The primary registry is inserted at construction and never removed.
        &self.registries[&self.primary]
    }

    pub fn pricing(&self) -> &PricingAgent {
        &self.pricing
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // -----------------------------------------------------------------------
    // Registry
    //
    // Each operation has an `_in` form addressed by registry. The plain form
    // acts on the primary registry.
    // -----------------------------------------------------------------------

    pub fn create_asset(
        &mut self,
        caller: &Identity,
        asset: NewAsset,
    ) -> CoreResult<Committed<AssetId>> {
        let primary = self.primary.clone();
        self.create_asset_in(&primary, caller, asset)
    }

    pub fn create_asset_in(
        &mut self,
        registry: &Identity,
        caller: &Identity,
        asset: NewAsset,
    ) -> CoreResult<Committed<AssetId>> {
        self.run("create_asset", |m, out| {
            let NewAsset {
                owner,
                uri,
                initial_price,
                metadata,
            } = asset;
            lookup_mut(&mut m.registries, registry)?
                .create(caller, owner, uri, initial_price, metadata, out)
        })
    }

    pub fn set_price_authority(
        &mut self,
        caller: &Identity,
        authority: Identity,
    ) -> CoreResult<Committed<()>> {
        let primary = self.primary.clone();
        self.set_price_authority_in(&primary, caller, authority)
    }

    pub fn set_price_authority_in(
        &mut self,
        registry: &Identity,
        caller: &Identity,
        authority: Identity,
    ) -> CoreResult<Committed<()>> {
        self.run("set_price_authority", |m, out| {
            lookup_mut(&mut m.registries, registry)?.set_price_authority(caller, authority, out)
        })
    }

    pub fn transfer_registry_control(
        &mut self,
        caller: &Identity,
        new_controller: Identity,
    ) -> CoreResult<Committed<()>> {
        let primary = self.primary.clone();
        self.transfer_registry_control_in(&primary, caller, new_controller)
    }

    pub fn transfer_registry_control_in(
        &mut self,
        registry: &Identity,
        caller: &Identity,
        new_controller: Identity,
    ) -> CoreResult<Committed<()>> {
        self.run("transfer_registry_control", |m, out| {
            lookup_mut(&mut m.registries, registry)?.transfer_control(caller, new_controller, out)
        })
    }

    pub fn approve(
        &mut self,
        caller: &Identity,
        asset_id: AssetId,
        to: Option<Identity>,
    ) -> CoreResult<Committed<()>> {
        let primary = self.primary.clone();
        self.approve_in(&primary, caller, asset_id, to)
    }

    pub fn approve_in(
        &mut self,
        registry: &Identity,
        caller: &Identity,
        asset_id: AssetId,
        to: Option<Identity>,
    ) -> CoreResult<Committed<()>> {
        self.run("approve", |m, out| {
            lookup_mut(&mut m.registries, registry)?.approve(caller, asset_id, to, out)
        })
    }

    pub fn set_approval_for_all(
        &mut self,
        caller: &Identity,
        operator: Identity,
        approved: bool,
    ) -> CoreResult<Committed<()>> {
        let primary = self.primary.clone();
        self.set_approval_for_all_in(&primary, caller, operator, approved)
    }

    pub fn set_approval_for_all_in(
        &mut self,
        registry: &Identity,
        caller: &Identity,
        operator: Identity,
        approved: bool,
    ) -> CoreResult<Committed<()>> {
        self.run("set_approval_for_all", |m, out| {
            lookup_mut(&mut m.registries, registry)?
                .set_approval_for_all(caller, operator, approved, out)
        })
    }

    pub fn transfer_asset(
        &mut self,
        caller: &Identity,
        from: &Identity,
        to: Identity,
        asset_id: AssetId,
    ) -> CoreResult<Committed<()>> {
        let primary = self.primary.clone();
        self.transfer_asset_in(&primary, caller, from, to, asset_id)
    }

    pub fn transfer_asset_in(
        &mut self,
        registry: &Identity,
        caller: &Identity,
        from: &Identity,
        to: Identity,
        asset_id: AssetId,
    ) -> CoreResult<Committed<()>> {
        self.run("transfer_asset", |m, out| {
            lookup_mut(&mut m.registries, registry)?.transfer_from(caller, from, to, asset_id, out)
        })
    }

    pub fn asset(&self, asset_id: AssetId) -> CoreResult<&AssetRecord> {
        self.primary_registry().get_record(asset_id)
    }

    pub fn asset_in(&self, registry: &Identity, asset_id: AssetId) -> CoreResult<&AssetRecord> {
        self.registry_at(registry)?.get_record(asset_id)
    }

    // -----------------------------------------------------------------------
    // Pricing
    // -----------------------------------------------------------------------

    pub fn submit_price(
        &mut self,
        caller: &Identity,
        submission: PriceSubmission,
    ) -> CoreResult<Committed<PriceUpdateEntry>> {
        self.run("submit_price", |m, out| {
            let now = m.clock.now();
            let registry = lookup_mut(&mut m.registries, m.pricing.registry())?;
            m.pricing.update_price(caller, registry, submission, now, out)
        })
    }

    pub fn latest_price_update(&self, asset_id: AssetId) -> CoreResult<&PriceUpdateEntry> {
        self.pricing.get_latest_price_update(asset_id)
    }

    pub fn price_history(
        &self,
        asset_id: AssetId,
        offset: usize,
        limit: usize,
    ) -> Vec<PriceUpdateEntry> {
        self.pricing.get_price_update_history(asset_id, offset, limit)
    }

    pub fn set_pricing_registry(
        &mut self,
        caller: &Identity,
        registry: Identity,
    ) -> CoreResult<Committed<()>> {
        self.run("set_pricing_registry", |m, out| {
            m.pricing.set_registry(caller, registry, out)
        })
    }

    pub fn set_minimum_confidence(
        &mut self,
        caller: &Identity,
        score: u32,
    ) -> CoreResult<Committed<()>> {
        self.run("set_minimum_confidence", |m, out| {
            m.pricing.set_minimum_confidence(caller, score, out)
        })
    }

    pub fn grant_pricing_role(
        &mut self,
        caller: &Identity,
        role: Role,
        account: Identity,
    ) -> CoreResult<Committed<()>> {
        self.run("grant_pricing_role", |m, out| {
            m.pricing.grant_role(caller, role, account, out)
        })
    }

    pub fn revoke_pricing_role(
        &mut self,
        caller: &Identity,
        role: Role,
        account: &Identity,
    ) -> CoreResult<Committed<()>> {
        self.run("revoke_pricing_role", |m, out| {
            m.pricing.revoke_role(caller, role, account, out)
        })
    }

    // -----------------------------------------------------------------------
    // Exchange
    // -----------------------------------------------------------------------

    pub fn list(
        &mut self,
        caller: &Identity,
        asset_id: AssetId,
        price: Amount,
    ) -> CoreResult<Committed<()>> {
        self.run("list", |m, out| {
            let now = m.clock.now();
            let registry = lookup(&m.registries, m.exchange.registry())?;
            m.exchange.list(caller, registry, asset_id, price, now, out)
        })
    }

    pub fn delist(&mut self, caller: &Identity, asset_id: AssetId) -> CoreResult<Committed<()>> {
        self.run("delist", |m, out| {
            let now = m.clock.now();
            m.exchange.delist(caller, asset_id, now, out)
        })
    }

    pub fn buy(
        &mut self,
        caller: &Identity,
        asset_id: AssetId,
        payment: Amount,
    ) -> CoreResult<Committed<SaleReceipt>> {
        self.run("buy", |m, out| {
            let now = m.clock.now();
            let registry = lookup_mut(&mut m.registries, m.exchange.registry())?;
            m.exchange
                .buy(caller, registry, &mut m.ledger, asset_id, payment, now, out)
        })
    }

    pub fn quote(&self, asset_id: AssetId, payment: Amount) -> CoreResult<SaleQuote> {
        self.exchange.quote(asset_id, payment)
    }

    pub fn listing(&self, asset_id: AssetId) -> CoreResult<&Listing> {
        self.exchange.get_listing(asset_id)
    }

    pub fn active_listings(&self) -> Vec<Listing> {
        self.exchange.get_active_listings()
    }

    pub fn update_fee(&mut self, caller: &Identity, bps: u16) -> CoreResult<Committed<()>> {
        self.run("update_fee", |m, out| m.exchange.update_fee(caller, bps, out))
    }

    pub fn update_fee_collector(
        &mut self,
        caller: &Identity,
        collector: Identity,
    ) -> CoreResult<Committed<()>> {
        self.run("update_fee_collector", |m, out| {
            m.exchange.update_fee_collector(caller, collector, out)
        })
    }

    pub fn update_exchange_registry(
        &mut self,
        caller: &Identity,
        registry: Identity,
    ) -> CoreResult<Committed<()>> {
        self.run("update_exchange_registry", |m, out| {
            m.exchange.update_registry(caller, registry, out)
        })
    }

    pub fn transfer_exchange_ownership(
        &mut self,
        caller: &Identity,
        new_owner: Identity,
    ) -> CoreResult<Committed<()>> {
        self.run("transfer_exchange_ownership", |m, out| {
            m.exchange.transfer_ownership(caller, new_owner, out)
        })
    }

    // -----------------------------------------------------------------------
    // Ledger
    // -----------------------------------------------------------------------

    pub fn balance_of(&self, who: &Identity) -> Amount {
        self.ledger.balance_of(who)
    }

    /// Let `caller` opt in or out of receiving funds.
    pub fn set_accepts_funds(&mut self, caller: &Identity, accepts: bool) {
        tracing::info!(account = %caller, accepts, "Funds acceptance changed");
        self.ledger.set_accepts_funds(caller.clone(), accepts);
    }

    pub fn withdraw(&mut self, caller: &Identity, amount: Amount) -> CoreResult<Committed<()>> {
        self.run("withdraw", |m, out| m.ledger.withdraw(caller, amount, out))
    }

}

fn lookup<'a>(
    registries: &'a BTreeMap<Identity, AssetRegistry>,
    address: &Identity,
) -> CoreResult<&'a AssetRegistry> {
    registries
        .get(address)
        .ok_or_else(|| CoreError::not_found("Registry", address))
}

fn lookup_mut<'a>(
    registries: &'a mut BTreeMap<Identity, AssetRegistry>,
    address: &Identity,
) -> CoreResult<&'a mut AssetRegistry> {
    registries
        .get_mut(address)
        .ok_or_else(|| CoreError::not_found("Registry", address))
}
