//! Market notification infrastructure.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`Notification`] -- a committed [`MarketEvent`](rwa_core::events::MarketEvent)
//!   with sequence number, actor and time.
//! - [`EventRecorder`] -- background subscriber that keeps a bounded journal
//!   of recent notifications.

pub mod bus;
pub mod recorder;

pub use bus::{EventBus, Notification};
pub use recorder::EventRecorder;
