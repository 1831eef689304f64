//! Price submissions and the bounded per-asset audit trail.
//!
//! The pricing agent is the registry's price authority. Submitters call
//! [`PricingAgent::update_price`]; the agent validates the confidence score,
//! writes the new price into the registry under its own identity, then
//! records a [`PriceUpdateEntry`] in a fixed-capacity history.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::access::{ensure_role, revoke_guarded, AccessControl, Role, RoleSet};
use crate::error::{CoreError, CoreResult};
use crate::events::{Component, MarketEvent, Outbox};
use crate::history::{BoundedHistory, PRICE_HISTORY_CAPACITY};
use crate::registry::AssetRegistry;
use crate::types::{Amount, AssetId, Identity, Timestamp};

/// Highest valid confidence score.
pub const MAX_CONFIDENCE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceUpdateEntry {
    pub asset_id: AssetId,
    pub old_price: Amount,
    pub new_price: Amount,
    pub timestamp: Timestamp,
    pub source: String,
    pub confidence_score: u8,
}

/// A price submission as received from a submitter.
#[derive(Debug, Clone)]
pub struct PriceSubmission {
    pub asset_id: AssetId,
    pub new_price: Amount,
    pub source: String,
    pub confidence_score: u32,
}

#[derive(Debug, Clone)]
pub struct PricingAgent {
    address: Identity,
    registry: Identity,
    roles: RoleSet,
    min_confidence: u8,
    /// Keyed by registry address, then asset id. Ids are only unique within
    /// one registry.
    histories: BTreeMap<Identity, BTreeMap<AssetId, BoundedHistory<PriceUpdateEntry>>>,
}

impl PricingAgent {
    /// Create an agent bound to `registry`. `admin` receives the admin and
    /// configurator roles.
    pub fn new(
        address: Identity,
        registry: Identity,
        admin: &Identity,
        min_confidence: u8,
    ) -> CoreResult<Self> {
        validate_min_confidence(u32::from(min_confidence))?;
        Ok(Self {
            address,
            registry,
            roles: RoleSet::with_holder(admin, &[Role::Admin, Role::Configurator]),
            min_confidence,
            histories: BTreeMap::new(),
        })
    }

    pub fn address(&self) -> &Identity {
        &self.address
    }

    pub fn registry(&self) -> &Identity {
        &self.registry
    }

    pub fn minimum_confidence(&self) -> u8 {
        self.min_confidence
    }

    pub fn has_role(&self, role: Role, who: &Identity) -> bool {
        self.roles.has_role(role, who)
    }

    // -----------------------------------------------------------------------
    // Submissions
    // -----------------------------------------------------------------------

    /// Validate and apply a price submission.
    ///
    /// The below-minimum check runs before the upper-bound check. Nothing is
    /// written unless every check passes.
    pub fn update_price(
        &mut self,
        caller: &Identity,
        registry: &mut AssetRegistry,
        submission: PriceSubmission,
        now: Timestamp,
        out: &mut Outbox,
    ) -> CoreResult<PriceUpdateEntry> {
        ensure_role(&self.roles, Role::Submitter, caller)?;

        let PriceSubmission {
            asset_id,
            new_price,
            source,
            confidence_score,
        } = submission;

        if confidence_score < u32::from(self.min_confidence) {
            tracing::debug!(asset_id, confidence_score, min = self.min_confidence, "Confidence below minimum");
            return Err(CoreError::Validation(format!(
                "confidence score {confidence_score} below minimum {}",
                self.min_confidence
            )));
        }
        if confidence_score > MAX_CONFIDENCE {
            return Err(CoreError::Validation(format!(
                "confidence score {confidence_score} out of range"
            )));
        }
        let confidence_score = confidence_score as u8;
        if source.trim().is_empty() {
            return Err(CoreError::Validation("price source must not be empty".into()));
        }
        if registry.address() != &self.registry {
            return Err(CoreError::Conflict(format!(
                "pricing agent is bound to registry {}, not {}",
                self.registry,
                registry.address()
            )));
        }

        let old_price = registry.update_price(&self.address, asset_id, new_price, out)?;

        let entry = PriceUpdateEntry {
            asset_id,
            old_price,
            new_price,
            timestamp: now,
            source,
            confidence_score,
        };
        self.histories
            .entry(self.registry.clone())
            .or_default()
            .entry(asset_id)
            .or_insert_with(|| BoundedHistory::with_capacity(PRICE_HISTORY_CAPACITY))
            .push(entry.clone());

        tracing::info!(
            asset_id,
            old_price,
            new_price,
            source = %entry.source,
            confidence_score,
            submitter = %caller,
            "Price updated"
        );
        out.emit(MarketEvent::PriceUpdated {
            asset_id,
            old_price,
            new_price,
            timestamp: now,
            source: entry.source.clone(),
            confidence_score,
        });
        Ok(entry)
    }

    // -----------------------------------------------------------------------
    // History reads
    // -----------------------------------------------------------------------

    pub fn get_latest_price_update(&self, asset_id: AssetId) -> CoreResult<&PriceUpdateEntry> {
        self.history(asset_id)
            .and_then(BoundedHistory::latest)
            .ok_or_else(|| CoreError::not_found("PriceHistory", asset_id))
    }

    /// Up to `limit` entries from `offset`, oldest first within the retained
    /// window. Empty for unknown assets or an offset past the end.
    pub fn get_price_update_history(
        &self,
        asset_id: AssetId,
        offset: usize,
        limit: usize,
    ) -> Vec<PriceUpdateEntry> {
        self.history(asset_id)
            .map(|history| history.page(offset, limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn history_len(&self, asset_id: AssetId) -> usize {
        self.history(asset_id).map_or(0, BoundedHistory::len)
    }

    /// History of `asset_id` in the registry the agent is currently bound to.
    fn history(&self, asset_id: AssetId) -> Option<&BoundedHistory<PriceUpdateEntry>> {
        self.histories
            .get(&self.registry)
            .and_then(|assets| assets.get(&asset_id))
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    pub fn set_registry(
        &mut self,
        caller: &Identity,
        registry: Identity,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        ensure_role(&self.roles, Role::Configurator, caller)?;
        let old = std::mem::replace(&mut self.registry, registry.clone());
        tracing::info!(old = %old, new = %registry, "Pricing registry changed");
        out.emit(MarketEvent::PricingRegistryChanged { old, new: registry });
        Ok(())
    }

    pub fn set_minimum_confidence(
        &mut self,
        caller: &Identity,
        score: u32,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        ensure_role(&self.roles, Role::Configurator, caller)?;
        let new = validate_min_confidence(score)?;
        let old = std::mem::replace(&mut self.min_confidence, new);
        tracing::info!(old, new, "Minimum confidence changed");
        out.emit(MarketEvent::MinConfidenceChanged { old, new });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    pub fn grant_role(
        &mut self,
        caller: &Identity,
        role: Role,
        account: Identity,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        ensure_role(&self.roles, Role::Admin, caller)?;
        ensure_pricing_role(role)?;
        if self.roles.grant(role, account.clone()) {
            tracing::info!(role = %role, account = %account, "Pricing role granted");
            out.emit(MarketEvent::RoleGranted {
                component: Component::Pricing,
                role,
                account,
                sender: caller.clone(),
            });
        }
        Ok(())
    }

    pub fn revoke_role(
        &mut self,
        caller: &Identity,
        role: Role,
        account: &Identity,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        ensure_role(&self.roles, Role::Admin, caller)?;
        ensure_pricing_role(role)?;
        if revoke_guarded(&mut self.roles, role, account, Role::Admin)? {
            tracing::info!(role = %role, account = %account, "Pricing role revoked");
            out.emit(MarketEvent::RoleRevoked {
                component: Component::Pricing,
                role,
                account: account.clone(),
                sender: caller.clone(),
            });
        }
        Ok(())
    }
}

fn validate_min_confidence(score: u32) -> CoreResult<u8> {
    if score > MAX_CONFIDENCE {
        return Err(CoreError::Validation(format!(
            "minimum confidence {score} exceeds {MAX_CONFIDENCE}"
        )));
    }
    Ok(score as u8)
}

fn ensure_pricing_role(role: Role) -> CoreResult<()> {
    match role {
        Role::Admin | Role::Submitter | Role::Configurator => Ok(()),
        other => Err(CoreError::Validation(format!(
            "role {other} does not apply to the pricing agent"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::registry::tests::metadata;
    use crate::types::{id, UNIT};

    struct Fixture {
        registry: AssetRegistry,
        agent: PricingAgent,
        asset: AssetId,
    }

    fn fixture(initial: Amount) -> Fixture {
        let mut registry = AssetRegistry::new(id("registry"), id("controller"));
        let mut out = Outbox::new();
        let asset = registry
            .create(
                &id("controller"),
                id("alice"),
                "ipfs://a".into(),
                initial,
                metadata("Gold bar"),
                &mut out,
            )
            .unwrap();
        registry
            .set_price_authority(&id("controller"), id("agent"), &mut out)
            .unwrap();

        let mut agent = PricingAgent::new(id("agent"), id("registry"), &id("admin"), 70).unwrap();
        agent
            .grant_role(&id("admin"), Role::Submitter, id("feed"), &mut out)
            .unwrap();
        Fixture {
            registry,
            agent,
            asset,
        }
    }

    fn submission(asset_id: AssetId, price: Amount, score: u32) -> PriceSubmission {
        PriceSubmission {
            asset_id,
            new_price: price,
            source: "appraisal".to_string(),
            confidence_score: score,
        }
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_update_writes_registry_and_history() {
        let mut f = fixture(10 * UNIT);
        let mut out = Outbox::new();
        let entry = f
            .agent
            .update_price(&id("feed"), &mut f.registry, submission(f.asset, 15 * UNIT, 85), t0(), &mut out)
            .unwrap();

        assert_eq!(entry.old_price, 10 * UNIT);
        assert_eq!(entry.new_price, 15 * UNIT);
        assert_eq!(f.registry.get_price(f.asset).unwrap(), 15 * UNIT);
        assert_eq!(f.agent.history_len(f.asset), 1);
        assert_eq!(f.agent.get_latest_price_update(f.asset).unwrap(), &entry);
        assert_matches!(
            out.events(),
            [MarketEvent::AssetPriceChanged { .. }, MarketEvent::PriceUpdated { confidence_score: 85, .. }]
        );
    }

    #[test]
    fn test_requires_submitter_role() {
        let mut f = fixture(UNIT);
        let result = f.agent.update_price(
            &id("admin"),
            &mut f.registry,
            submission(f.asset, 2 * UNIT, 90),
            t0(),
            &mut Outbox::new(),
        );
        assert_matches!(result, Err(CoreError::Unauthorized(_)));
        assert_eq!(f.agent.history_len(f.asset), 0);
    }

    #[test]
    fn test_confidence_bounds() {
        let mut f = fixture(UNIT);
        let mut out = Outbox::new();

        let below = f.agent.update_price(&id("feed"), &mut f.registry, submission(f.asset, 2 * UNIT, 69), t0(), &mut out);
        assert_matches!(below, Err(CoreError::Validation(msg)) if msg.contains("below minimum"));

        let above = f.agent.update_price(&id("feed"), &mut f.registry, submission(f.asset, 2 * UNIT, 101), t0(), &mut out);
        assert_matches!(above, Err(CoreError::Validation(msg)) if msg.contains("out of range"));

        assert_eq!(f.registry.get_price(f.asset).unwrap(), UNIT);
        assert_eq!(f.agent.history_len(f.asset), 0);
        assert!(out.events().is_empty());

        f.agent
            .update_price(&id("feed"), &mut f.registry, submission(f.asset, 2 * UNIT, 100), t0(), &mut out)
            .unwrap();
        f.agent
            .update_price(&id("feed"), &mut f.registry, submission(f.asset, 3 * UNIT, 70), t0(), &mut out)
            .unwrap();
        assert_eq!(f.agent.history_len(f.asset), 2);
    }

    #[test]
    fn test_below_minimum_checked_before_upper_bound() {
        let mut f = fixture(UNIT);
        f.agent
            .set_minimum_confidence(&id("admin"), 100, &mut Outbox::new())
            .unwrap();
        let result = f.agent.update_price(
            &id("feed"),
            &mut f.registry,
            submission(f.asset, 2 * UNIT, 99),
            t0(),
            &mut Outbox::new(),
        );
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("below minimum"));
    }

    #[test]
    fn test_unknown_asset_leaves_history_empty() {
        let mut f = fixture(UNIT);
        let result = f.agent.update_price(
            &id("feed"),
            &mut f.registry,
            submission(99, UNIT, 90),
            t0(),
            &mut Outbox::new(),
        );
        assert_matches!(result, Err(CoreError::NotFound { entity: "Asset", .. }));
        assert_eq!(f.agent.history_len(99), 0);
        assert_matches!(
            f.agent.get_latest_price_update(99),
            Err(CoreError::NotFound { entity: "PriceHistory", .. })
        );
    }

    #[test]
    fn test_history_evicts_oldest_after_capacity() {
        let mut f = fixture(0);
        let mut now = t0();
        for price in 1..=(PRICE_HISTORY_CAPACITY as Amount + 1) {
            f.agent
                .update_price(&id("feed"), &mut f.registry, submission(f.asset, price, 80), now, &mut Outbox::new())
                .unwrap();
            now += Duration::seconds(1);
        }

        assert_eq!(f.agent.history_len(f.asset), PRICE_HISTORY_CAPACITY);
        let all = f.agent.get_price_update_history(f.asset, 0, 1_000);
        assert_eq!(all.len(), PRICE_HISTORY_CAPACITY);
        // The first submission (price 1, at t0) is gone.
        assert_eq!(all[0].new_price, 2);
        assert_eq!(all[0].timestamp, t0() + Duration::seconds(1));
        assert!(all.iter().all(|e| e.timestamp > t0()));
        assert_eq!(all.last().unwrap().new_price, PRICE_HISTORY_CAPACITY as Amount + 1);
        // Chain: each old price is the previous entry's new price.
        for pair in all.windows(2) {
            assert_eq!(pair[1].old_price, pair[0].new_price);
        }
    }

    #[test]
    fn test_history_paging() {
        let mut f = fixture(0);
        for price in 1..=5 {
            f.agent
                .update_price(&id("feed"), &mut f.registry, submission(f.asset, price, 80), t0(), &mut Outbox::new())
                .unwrap();
        }

        let page = f.agent.get_price_update_history(f.asset, 1, 2);
        assert_eq!(page.iter().map(|e| e.new_price).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(f.agent.get_price_update_history(f.asset, 3, 10).len(), 2);
        assert!(f.agent.get_price_update_history(f.asset, 5, 10).is_empty());
        assert!(f.agent.get_price_update_history(77, 0, 10).is_empty());
    }

    #[test]
    fn test_configuration_is_gated() {
        let mut f = fixture(UNIT);
        let mut out = Outbox::new();

        assert_matches!(
            f.agent.set_minimum_confidence(&id("feed"), 50, &mut out),
            Err(CoreError::Unauthorized(_))
        );
        assert_matches!(
            f.agent.set_minimum_confidence(&id("admin"), 101, &mut out),
            Err(CoreError::Validation(_))
        );
        f.agent.set_minimum_confidence(&id("admin"), 50, &mut out).unwrap();
        assert_eq!(f.agent.minimum_confidence(), 50);

        assert_matches!(
            f.agent.set_registry(&id("feed"), id("other"), &mut out),
            Err(CoreError::Unauthorized(_))
        );
        f.agent.set_registry(&id("admin"), id("other"), &mut out).unwrap();
        assert_eq!(f.agent.registry(), &id("other"));
        assert_matches!(
            out.events(),
            [MarketEvent::MinConfidenceChanged { old: 70, new: 50 }, MarketEvent::PricingRegistryChanged { .. }]
        );
    }

    #[test]
    fn test_mismatched_registry_rejected() {
        let mut f = fixture(UNIT);
        f.agent.set_registry(&id("admin"), id("elsewhere"), &mut Outbox::new()).unwrap();
        let result = f.agent.update_price(
            &id("feed"),
            &mut f.registry,
            submission(f.asset, 2 * UNIT, 90),
            t0(),
            &mut Outbox::new(),
        );
        assert_matches!(result, Err(CoreError::Conflict(_)));
        assert_eq!(f.registry.get_price(f.asset).unwrap(), UNIT);
    }

    #[test]
    fn test_role_management() {
        let mut f = fixture(UNIT);
        let mut out = Outbox::new();

        f.agent.grant_role(&id("admin"), Role::Configurator, id("ops"), &mut out).unwrap();
        assert!(f.agent.has_role(Role::Configurator, &id("ops")));
        assert!(f.agent.has_role(Role::Configurator, &id("admin")));

        assert_matches!(
            f.agent.grant_role(&id("ops"), Role::Submitter, id("ops"), &mut out),
            Err(CoreError::Unauthorized(_))
        );
        assert_matches!(
            f.agent.grant_role(&id("admin"), Role::Owner, id("ops"), &mut out),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            f.agent.revoke_role(&id("admin"), Role::Admin, &id("admin"), &mut out),
            Err(CoreError::Conflict(_))
        );

        f.agent.revoke_role(&id("admin"), Role::Submitter, &id("feed"), &mut out).unwrap();
        assert!(!f.agent.has_role(Role::Submitter, &id("feed")));
    }

    #[test]
    fn test_constructor_rejects_out_of_range_minimum() {
        assert_matches!(
            PricingAgent::new(id("agent"), id("registry"), &id("admin"), 101),
            Err(CoreError::Validation(_))
        );
    }
}
