//! Canonical asset records and unique ownership.
//!
//! The registry is a leaf component: it knows nothing about pricing history
//! or listings. It mints records, lets a single configured price authority
//! revise `current_price`, and implements single-delegate ownership transfer
//! (one approved identity per asset, plus per-owner blanket operators).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::access::{ensure_role, AccessControl, Role, RoleSet};
use crate::error::{CoreError, CoreResult};
use crate::events::{Component, MarketEvent, Outbox};
use crate::types::{Amount, AssetId, Identity, Timestamp};

/// Descriptive data attached to an asset at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AssetMetadata {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub asset_type: String,
    #[validate(length(max = 256))]
    pub location: String,
    pub acquisition_timestamp: Timestamp,
    #[validate(length(max = 2048))]
    pub description: String,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRecord {
    pub id: AssetId,
    pub owner: Identity,
    pub current_price: Amount,
    /// Set once at creation, never modified.
    pub initial_price: Amount,
    pub metadata: AssetMetadata,
    pub uri: String,
    /// Single delegate allowed to transfer this asset. Cleared on transfer.
    pub approved: Option<Identity>,
}

#[derive(Debug, Clone)]
pub struct AssetRegistry {
    address: Identity,
    roles: RoleSet,
    records: BTreeMap<AssetId, AssetRecord>,
    next_id: AssetId,
    price_authority: Option<Identity>,
    /// owner -> identities allowed to move every asset of that owner.
    operators: BTreeMap<Identity, BTreeSet<Identity>>,
}

impl AssetRegistry {
    pub fn new(address: Identity, controller: Identity) -> Self {
        Self {
            address,
            roles: RoleSet::with_holder(&controller, &[Role::Controller]),
            records: BTreeMap::new(),
            next_id: 1,
            price_authority: None,
            operators: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> &Identity {
        &self.address
    }

    pub fn is_controller(&self, who: &Identity) -> bool {
        self.roles.has_role(Role::Controller, who)
    }

    pub fn price_authority(&self) -> Option<&Identity> {
        self.price_authority.as_ref()
    }

    pub fn total_supply(&self) -> usize {
        self.records.len()
    }

    // -----------------------------------------------------------------------
    // Controller operations
    // -----------------------------------------------------------------------

    /// Mint a new asset record and return its id.
    pub fn create(
        &mut self,
        caller: &Identity,
        owner: Identity,
        uri: String,
        initial_price: Amount,
        metadata: AssetMetadata,
        out: &mut Outbox,
    ) -> CoreResult<AssetId> {
        ensure_role(&self.roles, Role::Controller, caller)?;
        if uri.trim().is_empty() {
            return Err(CoreError::Validation("uri must not be empty".into()));
        }
        metadata
            .validate()
            .map_err(|e| CoreError::Validation(format!("invalid metadata: {e}")))?;

        let id = self.next_id;
        self.next_id += 1;

        self.records.insert(
            id,
            AssetRecord {
                id,
                owner: owner.clone(),
                current_price: initial_price,
                initial_price,
                metadata,
                uri: uri.clone(),
                approved: None,
            },
        );

        tracing::info!(asset_id = id, owner = %owner, price = initial_price, "Asset created");
        out.emit(MarketEvent::Transfer {
            asset_id: id,
            from: None,
            to: owner.clone(),
        });
        out.emit(MarketEvent::AssetCreated {
            asset_id: id,
            uri,
            price: initial_price,
            owner,
        });
        Ok(id)
    }

    /// Replace the single identity allowed to call [`update_price`](Self::update_price).
    pub fn set_price_authority(
        &mut self,
        caller: &Identity,
        authority: Identity,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        ensure_role(&self.roles, Role::Controller, caller)?;
        let old = self.price_authority.replace(authority.clone());
        tracing::info!(new = %authority, "Price authority changed");
        out.emit(MarketEvent::PriceAuthorityChanged {
            old,
            new: authority,
        });
        Ok(())
    }

    /// Hand the controller capability to another identity.
    pub fn transfer_control(
        &mut self,
        caller: &Identity,
        new_controller: Identity,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        ensure_role(&self.roles, Role::Controller, caller)?;
        self.roles.revoke(Role::Controller, caller);
        self.roles.grant(Role::Controller, new_controller.clone());
        out.emit(MarketEvent::ControlTransferred {
            component: Component::Registry,
            old: caller.clone(),
            new: new_controller,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Price authority
    // -----------------------------------------------------------------------

    /// Set `current_price`, returning the previous value.
    pub fn update_price(
        &mut self,
        caller: &Identity,
        id: AssetId,
        new_price: Amount,
        out: &mut Outbox,
    ) -> CoreResult<Amount> {
        if self.price_authority.as_ref() != Some(caller) {
            return Err(CoreError::Unauthorized(format!(
                "{caller} is not the price authority"
            )));
        }
        let record = self.record_mut(id)?;
        let old_price = std::mem::replace(&mut record.current_price, new_price);

        tracing::info!(asset_id = id, old_price, new_price, "Asset price changed");
        out.emit(MarketEvent::AssetPriceChanged {
            asset_id: id,
            old_price,
            new_price,
        });
        Ok(old_price)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get_record(&self, id: AssetId) -> CoreResult<&AssetRecord> {
        self.records
            .get(&id)
            .ok_or_else(|| CoreError::not_found("Asset", id))
    }

    pub fn get_price(&self, id: AssetId) -> CoreResult<Amount> {
        Ok(self.get_record(id)?.current_price)
    }

    pub fn get_initial_price(&self, id: AssetId) -> CoreResult<Amount> {
        Ok(self.get_record(id)?.initial_price)
    }

    pub fn get_metadata(&self, id: AssetId) -> CoreResult<&AssetMetadata> {
        Ok(&self.get_record(id)?.metadata)
    }

    pub fn token_uri(&self, id: AssetId) -> CoreResult<&str> {
        Ok(&self.get_record(id)?.uri)
    }

    pub fn owner_of(&self, id: AssetId) -> CoreResult<&Identity> {
        Ok(&self.get_record(id)?.owner)
    }

    pub fn balance_of(&self, owner: &Identity) -> usize {
        self.records.values().filter(|r| &r.owner == owner).count()
    }

    // -----------------------------------------------------------------------
    // Ownership and delegation
    // -----------------------------------------------------------------------

    /// Set (or clear with `None`) the single approved delegate for `id`.
    /// Callable by the owner or one of the owner's operators.
    pub fn approve(
        &mut self,
        caller: &Identity,
        id: AssetId,
        to: Option<Identity>,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        let owner = self.owner_of(id)?.clone();
        if caller != &owner && !self.is_approved_for_all(&owner, caller) {
            return Err(CoreError::Unauthorized(format!(
                "{caller} may not approve asset {id}"
            )));
        }
        if to.as_ref() == Some(&owner) {
            return Err(CoreError::Validation("cannot approve the current owner".into()));
        }
        self.record_mut(id)?.approved = to.clone();
        out.emit(MarketEvent::Approval {
            asset_id: id,
            owner,
            approved: to,
        });
        Ok(())
    }

    pub fn get_approved(&self, id: AssetId) -> CoreResult<Option<&Identity>> {
        Ok(self.get_record(id)?.approved.as_ref())
    }

    /// Grant or withdraw blanket transfer rights over all of the caller's assets.
    pub fn set_approval_for_all(
        &mut self,
        caller: &Identity,
        operator: Identity,
        approved: bool,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        if &operator == caller {
            return Err(CoreError::Validation("cannot make self an operator".into()));
        }
        if approved {
            self.operators
                .entry(caller.clone())
                .or_default()
                .insert(operator.clone());
        } else if let Some(ops) = self.operators.get_mut(caller) {
            ops.remove(&operator);
            if ops.is_empty() {
                self.operators.remove(caller);
            }
        }
        out.emit(MarketEvent::ApprovalForAll {
            owner: caller.clone(),
            operator,
            approved,
        });
        Ok(())
    }

    pub fn is_approved_for_all(&self, owner: &Identity, operator: &Identity) -> bool {
        self.operators
            .get(owner)
            .is_some_and(|ops| ops.contains(operator))
    }

    /// Whether `spender` may move `id`: owner, approved delegate, or operator.
    pub fn is_approved_or_owner(&self, spender: &Identity, id: AssetId) -> CoreResult<bool> {
        let record = self.get_record(id)?;
        Ok(&record.owner == spender
            || record.approved.as_ref() == Some(spender)
            || self.is_approved_for_all(&record.owner, spender))
    }

    /// Move `id` from `from` to `to`, clearing any delegate.
    pub fn transfer_from(
        &mut self,
        caller: &Identity,
        from: &Identity,
        to: Identity,
        id: AssetId,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        if !self.is_approved_or_owner(caller, id)? {
            return Err(CoreError::Unauthorized(format!(
                "{caller} is neither owner nor approved for asset {id}"
            )));
        }
        let record = self.record_mut(id)?;
        if &record.owner != from {
            return Err(CoreError::Conflict(format!(
                "asset {id} is not owned by {from}"
            )));
        }
        record.owner = to.clone();
        record.approved = None;

        tracing::info!(asset_id = id, from = %from, to = %to, "Asset transferred");
        out.emit(MarketEvent::Transfer {
            asset_id: id,
            from: Some(from.clone()),
            to,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rollback support
    // -----------------------------------------------------------------------

    /// Put back owner and delegate captured before a failed operation.
    pub(crate) fn restore_custody(
        &mut self,
        id: AssetId,
        owner: Identity,
        approved: Option<Identity>,
    ) -> CoreResult<()> {
        let record = self.record_mut(id)?;
        record.owner = owner;
        record.approved = approved;
        Ok(())
    }

    fn record_mut(&mut self, id: AssetId) -> CoreResult<&mut AssetRecord> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("Asset", id))
    }
}
