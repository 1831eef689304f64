pub mod events;
pub mod exchange;
pub mod ledger;
pub mod pricing;
pub mod registry;
