use std::sync::{Arc, Mutex, MutexGuard};

use rwa_core::error::CoreResult;
use rwa_core::market::{Committed, Market};
use rwa_core::types::Identity;
use rwa_events::{EventBus, EventRecorder};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// The market. Every operation runs to completion under this lock.
    pub market: Arc<Mutex<Market>>,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// Centralized event bus for publishing committed market events.
    pub event_bus: Arc<EventBus>,
    /// Journal of recent notifications served by `/events`.
    pub recorder: EventRecorder,
}

impl AppState {
    pub fn new(
        market: Market,
        config: ServerConfig,
        event_bus: Arc<EventBus>,
        recorder: EventRecorder,
    ) -> Self {
        Self {
            market: Arc::new(Mutex::new(market)),
            config: Arc::new(config),
            event_bus,
            recorder,
        }
    }

    /// Run a mutating market operation and publish its events.
    ///
    /// Events are published while the lock is held so notification sequence
    /// numbers follow commit order.
    pub fn commit<T>(
        &self,
        actor: &Identity,
        op: impl FnOnce(&mut Market) -> CoreResult<Committed<T>>,
    ) -> AppResult<T> {
        let mut market = self.lock_market()?;
        let Committed { value, events } = op(&mut market)?;
        self.event_bus.publish_all(actor, events);
        Ok(value)
    }

    /// Run a read-only query against the market.
    pub fn read<T>(&self, query: impl FnOnce(&Market) -> CoreResult<T>) -> AppResult<T> {
        let market = self.lock_market()?;
        Ok(query(&market)?)
    }

    pub fn lock_market(&self) -> AppResult<MutexGuard<'_, Market>> {
        self.market
            .lock()
            .map_err(|_| AppError::InternalError("market lock poisoned".into()))
    }
}
