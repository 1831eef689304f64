//! Balances credited to sale participants.
//!
//! The exchange never holds custody beyond a single `buy`: the attached
//! payment is split into credits on this ledger. Recipients can be marked as
//! refusing funds, in which case a credit to them fails and the enclosing
//! operation rolls back.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, CoreResult};
use crate::events::{MarketEvent, Outbox};
use crate::types::{Amount, Identity};

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: BTreeMap<Identity, Amount>,
    refusing: BTreeSet<Identity>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, who: &Identity) -> Amount {
        self.balances.get(who).copied().unwrap_or(0)
    }

    /// Mark whether `who` accepts incoming funds.
    pub fn set_accepts_funds(&mut self, who: Identity, accepts: bool) {
        if accepts {
            self.refusing.remove(&who);
        } else {
            self.refusing.insert(who);
        }
    }

    pub fn accepts_funds(&self, who: &Identity) -> bool {
        !self.refusing.contains(who)
    }

    /// Credit `amount` to `to`. Fails without side effects if the recipient
    /// refuses funds or the balance would overflow.
    pub fn credit(&mut self, to: &Identity, amount: Amount) -> Result<(), String> {
        if !self.accepts_funds(to) {
            return Err(format!("{to} rejected the payment"));
        }
        let balance = self.balances.entry(to.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| format!("balance overflow for {to}"))?;
        Ok(())
    }

    /// Reverse a credit made earlier in the same operation.
    pub(crate) fn reverse_credit(&mut self, to: &Identity, amount: Amount) {
        if let Some(balance) = self.balances.get_mut(to) {
            *balance = balance.saturating_sub(amount);
            if *balance == 0 {
                self.balances.remove(to);
            }
        }
    }

    /// Pay out part of the caller's credited balance.
    pub fn withdraw(&mut self, caller: &Identity, amount: Amount, out: &mut Outbox) -> CoreResult<()> {
        if amount == 0 {
            return Err(CoreError::Validation("withdrawal amount must be positive".into()));
        }
        let balance = self.balance_of(caller);
        if balance < amount {
            return Err(CoreError::Validation(format!(
                "insufficient balance: {balance} available, {amount} requested"
            )));
        }
        self.reverse_credit(caller, amount);
        tracing::info!(account = %caller, amount, "Withdrawal");
        out.emit(MarketEvent::Withdrawal {
            account: caller.clone(),
            amount,
        });
        Ok(())
    }
}
