//! Fixed-price listings and atomic sale settlement.
//!
//! An owner lists an asset after approving the exchange as its transfer
//! delegate (or blanket operator). `buy` finalizes the listing before any
//! ownership or fund movement, then settles every leg; if any leg fails all
//! prior legs and the listing change are undone.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::access::{ensure_role, AccessControl, Role, RoleSet};
use crate::error::{CoreError, CoreResult, TransferLeg};
use crate::events::{Component, MarketEvent, Outbox};
use crate::ledger::Ledger;
use crate::registry::AssetRegistry;
use crate::types::{Amount, AssetId, Identity, Timestamp, BPS_DENOMINATOR};

/// Upper bound on the exchange fee (10%).
pub const MAX_FEE_BPS: u16 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub asset_id: AssetId,
    /// Registry the asset was listed from.
    pub registry: Identity,
    pub seller: Identity,
    pub price: Amount,
    pub active: bool,
    pub listed_at: Timestamp,
}

/// How a payment against a listing would be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaleQuote {
    pub price: Amount,
    pub fee: Amount,
    pub seller_proceeds: Amount,
    pub refund: Amount,
}

impl SaleQuote {
    /// `fee = floor(price * fee_bps / 10000)`. Rates above [`MAX_FEE_BPS`]
    /// are rejected.
    pub fn compute(price: Amount, fee_bps: u16, payment: Amount) -> CoreResult<Self> {
        validate_fee(fee_bps)?;
        if payment < price {
            return Err(CoreError::Validation(format!(
                "insufficient funds: {payment} paid, {price} required"
            )));
        }
        let fee = (u128::from(price) * u128::from(fee_bps) / u128::from(BPS_DENOMINATOR)) as Amount;
        Ok(Self {
            price,
            fee,
            seller_proceeds: price - fee,
            refund: payment - price,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleReceipt {
    pub asset_id: AssetId,
    pub seller: Identity,
    pub buyer: Identity,
    pub quote: SaleQuote,
    pub sold_at: Timestamp,
}

/// Effects applied during settlement, replayed backwards on failure.
enum Applied {
    Ownership {
        seller: Identity,
        approved: Option<Identity>,
    },
    Credit {
        to: Identity,
        amount: Amount,
    },
}

#[derive(Debug, Clone)]
pub struct Exchange {
    address: Identity,
    registry: Identity,
    roles: RoleSet,
    fee_bps: u16,
    fee_collector: Identity,
    listings: BTreeMap<AssetId, Listing>,
    /// Ids whose listing is active, in no particular order.
    active: Vec<AssetId>,
    /// Position of each active id within `active`.
    positions: BTreeMap<AssetId, usize>,
}

impl Exchange {
    pub fn new(
        address: Identity,
        registry: Identity,
        owner: &Identity,
        fee_bps: u16,
        fee_collector: Identity,
    ) -> CoreResult<Self> {
        validate_fee(fee_bps)?;
        Ok(Self {
            address,
            registry,
            roles: RoleSet::with_holder(owner, &[Role::Owner]),
            fee_bps,
            fee_collector,
            listings: BTreeMap::new(),
            active: Vec::new(),
            positions: BTreeMap::new(),
        })
    }

    pub fn address(&self) -> &Identity {
        &self.address
    }

    pub fn registry(&self) -> &Identity {
        &self.registry
    }

    pub fn fee_basis_points(&self) -> u16 {
        self.fee_bps
    }

    pub fn fee_collector(&self) -> &Identity {
        &self.fee_collector
    }

    pub fn is_owner(&self, who: &Identity) -> bool {
        self.roles.has_role(Role::Owner, who)
    }

    // -----------------------------------------------------------------------
    // Listing lifecycle
    // -----------------------------------------------------------------------

    pub fn list(
        &mut self,
        caller: &Identity,
        registry: &AssetRegistry,
        asset_id: AssetId,
        price: Amount,
        now: Timestamp,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        self.ensure_registry(registry)?;
        let owner = registry.owner_of(asset_id)?;
        if owner != caller {
            return Err(CoreError::Unauthorized(format!(
                "{caller} does not own asset {asset_id}"
            )));
        }
        if price == 0 {
            return Err(CoreError::Validation("listing price must be positive".into()));
        }
        if let Ok(existing) = self.active_listing(asset_id) {
            return Err(CoreError::Conflict(if existing.registry == self.registry {
                format!("asset {asset_id} is already listed")
            } else {
                format!(
                    "asset id {asset_id} still has an active listing from registry {}",
                    existing.registry
                )
            }));
        }
        if !self.is_delegate(registry, asset_id)? {
            return Err(CoreError::Conflict(format!(
                "exchange not approved for asset {asset_id}"
            )));
        }

        self.listings.insert(
            asset_id,
            Listing {
                asset_id,
                registry: self.registry.clone(),
                seller: caller.clone(),
                price,
                active: true,
                listed_at: now,
            },
        );
        self.positions.insert(asset_id, self.active.len());
        self.active.push(asset_id);

        tracing::info!(asset_id, seller = %caller, price, "Asset listed");
        out.emit(MarketEvent::Listed {
            asset_id,
            seller: caller.clone(),
            price,
            timestamp: now,
        });
        Ok(())
    }

    pub fn delist(
        &mut self,
        caller: &Identity,
        asset_id: AssetId,
        now: Timestamp,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        let listing = self.active_listing(asset_id)?;
        if &listing.seller != caller {
            return Err(CoreError::Unauthorized(format!(
                "{caller} is not the seller of asset {asset_id}"
            )));
        }
        let seller = listing.seller.clone();
        self.deactivate(asset_id)?;

        tracing::info!(asset_id, seller = %seller, "Asset delisted");
        out.emit(MarketEvent::Delisted {
            asset_id,
            seller,
            timestamp: now,
        });
        Ok(())
    }

    /// Purchase a listed asset with `payment` attached.
    ///
    /// The listing is deactivated and removed from the active set before
    /// ownership or funds move. On any leg failure every applied leg is
    /// reversed, the listing is restored at its original position, and
    /// [`CoreError::TransferFailed`] names the failing leg.
    #[allow(clippy::too_many_arguments)]
    pub fn buy(
        &mut self,
        caller: &Identity,
        registry: &mut AssetRegistry,
        ledger: &mut Ledger,
        asset_id: AssetId,
        payment: Amount,
        now: Timestamp,
        out: &mut Outbox,
    ) -> CoreResult<SaleReceipt> {
        let listing = self.current_listing(asset_id)?.clone();
        self.ensure_registry(registry)?;
        if registry.owner_of(asset_id)? != &listing.seller {
            return Err(CoreError::Conflict(format!(
                "seller no longer owns asset {asset_id}"
            )));
        }
        if !self.is_delegate(registry, asset_id)? {
            return Err(CoreError::Conflict(format!(
                "exchange no longer approved for asset {asset_id}"
            )));
        }
        let quote = SaleQuote::compute(listing.price, self.fee_bps, payment)?;

        // Commit the listing change first.
        let position = self.deactivate(asset_id)?;

        let mut legs = Outbox::new();
        let mut applied = Vec::with_capacity(4);
        if let Err(err) = self.settle(caller, registry, ledger, &listing, &quote, &mut applied, &mut legs) {
            tracing::warn!(asset_id, buyer = %caller, error = %err, "Sale rolled back");
            self.rollback(registry, ledger, asset_id, position, applied)?;
            return Err(err);
        }

        for event in legs.into_events() {
            out.emit(event);
        }
        tracing::info!(
            asset_id,
            seller = %listing.seller,
            buyer = %caller,
            price = quote.price,
            fee = quote.fee,
            "Asset sold"
        );
        out.emit(MarketEvent::Sold {
            asset_id,
            seller: listing.seller.clone(),
            buyer: caller.clone(),
            price: quote.price,
            timestamp: now,
        });
        Ok(SaleReceipt {
            asset_id,
            seller: listing.seller,
            buyer: caller.clone(),
            quote,
            sold_at: now,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn settle(
        &self,
        buyer: &Identity,
        registry: &mut AssetRegistry,
        ledger: &mut Ledger,
        listing: &Listing,
        quote: &SaleQuote,
        applied: &mut Vec<Applied>,
        legs: &mut Outbox,
    ) -> CoreResult<()> {
        let asset_id = listing.asset_id;
        let approved = registry.get_approved(asset_id)?.cloned();
        registry
            .transfer_from(&self.address, &listing.seller, buyer.clone(), asset_id, legs)
            .map_err(|e| CoreError::TransferFailed {
                leg: TransferLeg::Ownership,
                reason: e.to_string(),
            })?;
        applied.push(Applied::Ownership {
            seller: listing.seller.clone(),
            approved,
        });

        let mut pay = |leg: TransferLeg, to: &Identity, amount: Amount| -> CoreResult<()> {
            ledger
                .credit(to, amount)
                .map_err(|reason| CoreError::TransferFailed { leg, reason })?;
            applied.push(Applied::Credit {
                to: to.clone(),
                amount,
            });
            Ok(())
        };

        pay(TransferLeg::SellerProceeds, &listing.seller, quote.seller_proceeds)?;
        if quote.fee > 0 {
            pay(TransferLeg::Fee, &self.fee_collector, quote.fee)?;
        }
        if quote.refund > 0 {
            pay(TransferLeg::Refund, buyer, quote.refund)?;
        }
        Ok(())
    }

    fn rollback(
        &mut self,
        registry: &mut AssetRegistry,
        ledger: &mut Ledger,
        asset_id: AssetId,
        position: usize,
        applied: Vec<Applied>,
    ) -> CoreResult<()> {
        for effect in applied.into_iter().rev() {
            match effect {
                Applied::Credit { to, amount } => ledger.reverse_credit(&to, amount),
                Applied::Ownership { seller, approved } => {
                    registry.restore_custody(asset_id, seller, approved)?
                }
            }
        }
        self.reactivate(asset_id, position)
    }

    // -----------------------------------------------------------------------
    // Owner configuration
    // -----------------------------------------------------------------------

    pub fn update_fee(&mut self, caller: &Identity, bps: u16, out: &mut Outbox) -> CoreResult<()> {
        ensure_role(&self.roles, Role::Owner, caller)?;
        validate_fee(bps)?;
        let old_bps = std::mem::replace(&mut self.fee_bps, bps);
        tracing::info!(old_bps, new_bps = bps, "Exchange fee changed");
        out.emit(MarketEvent::FeeChanged {
            old_bps,
            new_bps: bps,
        });
        Ok(())
    }

    pub fn update_fee_collector(
        &mut self,
        caller: &Identity,
        collector: Identity,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        ensure_role(&self.roles, Role::Owner, caller)?;
        let old = std::mem::replace(&mut self.fee_collector, collector.clone());
        tracing::info!(old = %old, new = %collector, "Fee collector changed");
        out.emit(MarketEvent::FeeCollectorChanged {
            old,
            new: collector,
        });
        Ok(())
    }

    pub fn update_registry(
        &mut self,
        caller: &Identity,
        registry: Identity,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        ensure_role(&self.roles, Role::Owner, caller)?;
        let old = std::mem::replace(&mut self.registry, registry.clone());
        tracing::info!(old = %old, new = %registry, "Exchange registry changed");
        out.emit(MarketEvent::ExchangeRegistryChanged { old, new: registry });
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Identity,
        new_owner: Identity,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        ensure_role(&self.roles, Role::Owner, caller)?;
        self.roles.revoke(Role::Owner, caller);
        self.roles.grant(Role::Owner, new_owner.clone());
        out.emit(MarketEvent::ControlTransferred {
            component: Component::Exchange,
            old: caller.clone(),
            new: new_owner,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The stored listing for `asset_id`, active or not.
    pub fn get_listing(&self, asset_id: AssetId) -> CoreResult<&Listing> {
        self.listings
            .get(&asset_id)
            .ok_or_else(|| CoreError::not_found("Listing", asset_id))
    }

    /// Every active listing, in active-set order.
    pub fn get_active_listings(&self) -> Vec<Listing> {
        self.active
            .iter()
            .filter_map(|id| self.listings.get(id))
            .cloned()
            .collect()
    }

    pub fn active_listing_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_listed(&self, asset_id: AssetId) -> bool {
        self.listings.get(&asset_id).is_some_and(|l| l.active)
    }

    /// Preview the split of `payment` against the current listing.
    pub fn quote(&self, asset_id: AssetId, payment: Amount) -> CoreResult<SaleQuote> {
        let listing = self.current_listing(asset_id)?;
        SaleQuote::compute(listing.price, self.fee_bps, payment)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn active_listing(&self, asset_id: AssetId) -> CoreResult<&Listing> {
        self.listings
            .get(&asset_id)
            .filter(|l| l.active)
            .ok_or_else(|| CoreError::Conflict(format!("asset {asset_id} is not listed")))
    }

    /// An active listing made against the registry the exchange is bound to
    /// now. Listings left over from a previous registry can only be delisted.
    fn current_listing(&self, asset_id: AssetId) -> CoreResult<&Listing> {
        let listing = self.active_listing(asset_id)?;
        if listing.registry != self.registry {
            return Err(CoreError::Conflict(format!(
                "asset {asset_id} was listed from registry {}, exchange now uses {}",
                listing.registry, self.registry
            )));
        }
        Ok(listing)
    }

    fn ensure_registry(&self, registry: &AssetRegistry) -> CoreResult<()> {
        if registry.address() != &self.registry {
            return Err(CoreError::Conflict(format!(
                "exchange is bound to registry {}, not {}",
                self.registry,
                registry.address()
            )));
        }
        Ok(())
    }

    fn is_delegate(&self, registry: &AssetRegistry, asset_id: AssetId) -> CoreResult<bool> {
        let owner = registry.owner_of(asset_id)?;
        Ok(registry.get_approved(asset_id)? == Some(&self.address)
            || registry.is_approved_for_all(owner, &self.address))
    }

    /// Clear the active flag and swap-remove the id from the active set.
    /// Returns the position the id occupied.
    fn deactivate(&mut self, asset_id: AssetId) -> CoreResult<usize> {
        let position = self
            .positions
            .remove(&asset_id)
            .ok_or_else(|| CoreError::Internal(format!("active set missing asset {asset_id}")))?;
        self.active.swap_remove(position);
        if let Some(moved) = self.active.get(position) {
            self.positions.insert(*moved, position);
        }
        if let Some(listing) = self.listings.get_mut(&asset_id) {
            listing.active = false;
        }
        Ok(position)
    }

    /// Inverse of [`deactivate`](Self::deactivate): restores the exact prior order.
    fn reactivate(&mut self, asset_id: AssetId, position: usize) -> CoreResult<()> {
        let listing = self
            .listings
            .get_mut(&asset_id)
            .ok_or_else(|| CoreError::Internal(format!("listing missing for asset {asset_id}")))?;
        listing.active = true;

        let last = self.active.len();
        self.active.push(asset_id);
        self.active.swap(position, last);
        self.positions.insert(asset_id, position);
        let displaced = self.active[last];
        self.positions.insert(displaced, last);
        Ok(())
    }
}

fn validate_fee(bps: u16) -> CoreResult<()> {
    if bps > MAX_FEE_BPS {
        return Err(CoreError::Validation(format!(
            "fee {bps} bps exceeds the {MAX_FEE_BPS} bps cap"
        )));
    }
    Ok(())
}
