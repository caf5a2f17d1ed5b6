//! Core domain types: the primitives, orders, statuses and sessions that
//! flow through the venue. See `original_source/server/src/server_types.hpp`
//! and `server/src/ticker_data.hpp` for the shapes this mirrors.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// 64-bit monotonically assigned order identifier.
pub type OrderId = u64;

/// 32-bit client identifier, stable per credential.
pub type ClientId = u32;

/// Opaque per-connection handle.
pub type ConnectionId = u64;

/// Nanoseconds since a monotonic epoch.
pub type Timestamp = u64;

/// Resting/incoming order quantity.
pub type Quantity = u32;

/// Server-issued opaque session credential.
pub type Token = u64;

/// Single-precision price. Flagged as an open question in the design
/// notes — exact float comparisons in heap ordering are fragile; see
/// DESIGN.md for the resolution taken.
pub type Price = f32;

/// Fixed 5-byte ASCII instrument identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticker(pub [u8; 5]);

impl Ticker {
    pub fn new(s: &str) -> Self {
        let mut bytes = [0u8; 5];
        let src = s.as_bytes();
        let n = src.len().min(5);
        bytes[..n].copy_from_slice(&src[..n]);
        Self(bytes)
    }

    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(5);
        std::str::from_utf8(&self.0[..end]).unwrap_or("?????")
    }
}

impl fmt::Debug for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticker({})", self.as_str())
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Buy or sell side of an incoming order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    Buy,
    Sell,
}

/// Execution state of an `OrderStatus` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Partial,
    Full,
}

/// An order as submitted by a client, before the server attaches
/// `client_id`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub timestamp: Timestamp,
    pub ticker: Ticker,
    pub quantity: Quantity,
    pub price: Price,
    pub action: OrderAction,
}

impl Order {
    /// Deducts `qty` from the resting quantity. Monotonically decreasing;
    /// never goes below zero.
    pub fn partial_fill(&mut self, qty: Quantity) {
        self.quantity = self.quantity.saturating_sub(qty);
    }
}

/// Server-side augmentation of `Order` with the submitting client.
#[derive(Debug, Clone, Copy)]
pub struct ServerOrder {
    pub client_id: ClientId,
    pub order: Order,
}

/// An execution report for one side of a match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderStatus {
    pub id: OrderId,
    pub timestamp: Timestamp,
    pub quantity: Quantity,
    pub fill_price: Price,
    pub state: OrderState,
}

/// Server-side augmentation of `OrderStatus` with the owning client, used
/// to route the report back on the market bus.
#[derive(Debug, Clone, Copy)]
pub struct ServerOrderStatus {
    pub client_id: ClientId,
    pub status: OrderStatus,
}

/// Last-trade-or-synthetic price, broadcast periodically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TickerPrice {
    pub ticker: Ticker,
    pub price: Price,
}

/// Index of the worker thread currently owning a ticker's order book.
pub type ThreadId = usize;

/// Per-instrument state: the order book plus the atomics read across
/// threads (`price` by any reader, `thread_id` by the coordinator and
/// workers). `order_book` itself is mutated only by its owning worker.
pub struct TickerData {
    thread_id: AtomicU32,
    price: AtomicU32, // bit-pattern of an f32, see price()/set_price()
    pub order_book: parking_lot::Mutex<crate::market::order_book::OrderBook>,
}

impl TickerData {
    pub fn new(thread_id: ThreadId, initial_price: Price) -> Self {
        Self {
            thread_id: AtomicU32::new(thread_id as u32),
            price: AtomicU32::new(initial_price.to_bits()),
            order_book: parking_lot::Mutex::new(crate::market::order_book::OrderBook::new()),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id.load(Ordering::Acquire) as ThreadId
    }

    pub fn set_thread_id(&self, id: ThreadId) {
        self.thread_id.store(id as u32, Ordering::Release);
    }

    pub fn price(&self) -> Price {
        f32::from_bits(self.price.load(Ordering::Acquire))
    }

    pub fn set_price(&self, price: Price) {
        self.price.store(price.to_bits(), Ordering::Release);
    }
}

/// Monotonic order id generator, shared by whichever component augments
/// client-submitted orders (the session channel, on decode).
#[derive(Default)]
pub struct OrderIdGenerator(AtomicU64);

impl OrderIdGenerator {
    pub fn next(&self) -> OrderId {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

static CLOCK: std::sync::OnceLock<quanta::Clock> = std::sync::OnceLock::new();

/// Returns nanoseconds since an arbitrary monotonic epoch, suitable for
/// `Order`/`OrderStatus` timestamps. Not wall-clock time: order arrival
/// order is established by channel/queue order, never by comparing these
/// timestamps, so only their deltas are meaningful (latency observability).
/// Uses `quanta::Clock::raw()` directly as a nanosecond count, the same
/// TSC-passthrough approximation `HftClock::now_ns` in
/// `examples/cooprefr-bettersys/rust-backend/src/performance/tui/hft_metrics.rs`
/// makes.
pub fn monotonic_now_nanos() -> Timestamp {
    CLOCK.get_or_init(quanta::Clock::new).raw() as Timestamp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_roundtrip() {
        let t = Ticker::new("AAA");
        assert_eq!(t.as_str(), "AAA");
        let t2 = Ticker::new("ABCDE");
        assert_eq!(t2.as_str(), "ABCDE");
    }

    #[test]
    fn ticker_data_atomics() {
        let data = TickerData::new(3, 10.5);
        assert_eq!(data.thread_id(), 3);
        assert_eq!(data.price(), 10.5);
        data.set_thread_id(7);
        data.set_price(11.25);
        assert_eq!(data.thread_id(), 7);
        assert_eq!(data.price(), 11.25);
    }

    #[test]
    fn order_id_generator_monotonic() {
        let gen = OrderIdGenerator::default();
        let a = gen.next();
        let b = gen.next();
        assert!(b > a);
    }
}
