//! Role-based authorization consumed by every component.
//!
//! Components never inherit access rules; each operation checks its caller
//! against an [`AccessControl`] implementation at the very start, before any
//! state is read for mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Identity;

/// Capabilities that gate privileged operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May grant and revoke other roles on the pricing agent.
    Admin,
    /// Controls the asset registry (minting, price authority).
    Controller,
    /// May submit price updates.
    Submitter,
    /// May change pricing configuration.
    Configurator,
    /// Owns the exchange (fees, collector, registry).
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Controller => "controller",
            Role::Submitter => "submitter",
            Role::Configurator => "configurator",
            Role::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers whether an identity holds a role.
pub trait AccessControl {
    fn has_role(&self, role: Role, who: &Identity) -> bool;
}

/// Fail with [`CoreError::Unauthorized`] unless `who` holds `role`.
pub fn ensure_role(access: &impl AccessControl, role: Role, who: &Identity) -> CoreResult<()> {
    if access.has_role(role, who) {
        Ok(())
    } else {
        tracing::debug!(caller = %who, role = %role, "Missing role");
        Err(CoreError::Unauthorized(format!("{who} lacks the {role} role")))
    }
}

/// In-memory role membership. Any number of identities may hold a role.
#[derive(Debug, Clone, Default)]
pub struct RoleSet {
    members: BTreeMap<Role, BTreeSet<Identity>>,
}

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `who` holding every role in `roles`.
    pub fn with_holder(who: &Identity, roles: &[Role]) -> Self {
        let mut set = Self::new();
        for role in roles {
            set.grant(*role, who.clone());
        }
        set
    }

    /// Returns `true` if the identity did not already hold the role.
    pub fn grant(&mut self, role: Role, who: Identity) -> bool {
        self.members.entry(role).or_default().insert(who)
    }

    /// Returns `true` if the identity held the role.
    pub fn revoke(&mut self, role: Role, who: &Identity) -> bool {
        match self.members.get_mut(&role) {
            Some(holders) => holders.remove(who),
            None => false,
        }
    }

    pub fn holder_count(&self, role: Role) -> usize {
        self.members.get(&role).map_or(0, BTreeSet::len)
    }
}

impl AccessControl for RoleSet {
    fn has_role(&self, role: Role, who: &Identity) -> bool {
        self.members
            .get(&role)
            .is_some_and(|holders| holders.contains(who))
    }
}

/// Revoke `role` from `who`, refusing to remove the last holder of a
/// controlling role (which would lock the component permanently).
pub(crate) fn revoke_guarded(
    roles: &mut RoleSet,
    role: Role,
    who: &Identity,
    guarded: Role,
) -> CoreResult<bool> {
    if role == guarded && roles.has_role(role, who) && roles.holder_count(role) == 1 {
        return Err(CoreError::Conflict(format!(
            "cannot revoke the last {role} holder"
        )));
    }
    Ok(roles.revoke(role, who))
}
