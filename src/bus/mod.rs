//! Intra-process message hubs.
//!
//! Two buses: a synchronous typed pub/sub `SystemBus`
//! for control-plane events, and a single-handler `MarketBus` for the hot
//! path (`ServerOrder`, `ServerOrderStatus`, `TickerPrice`).

pub mod events;
pub mod market;
pub mod system;

pub use market::MarketBus;
pub use system::SystemBus;

use std::sync::Arc;

/// Bundles both buses behind shared ownership so components that need
/// to post on one and subscribe on the other (the session manager, the
/// coordinator) can clone a single handle at construction.
#[derive(Clone)]
pub struct Bus {
    pub system: Arc<SystemBus>,
    pub market: Arc<MarketBus>,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            system: Arc::new(SystemBus::new()),
            market: Arc::new(MarketBus::new()),
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
