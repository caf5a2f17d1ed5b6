//! Per-instrument limit order book.
//!
//! Two binary heaps (bids max-heap by price, asks min-heap by price) plus
//! `last_added`, the most-recent insertion id used to suppress duplicate
//! reports when both sides of a self-trade are the same test client.
//! Grounded on `examples/original_source/server/src/order_book.hpp`.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::{
    monotonic_now_nanos, OrderAction, OrderId, OrderState, OrderStatus, Price, Quantity,
    ServerOrder, ServerOrderStatus,
};

/// Pre-reserved capacity per side, matching `ORDER_BOOK_LIMIT` in the
/// original.
pub const ORDER_BOOK_LIMIT: usize = 4096;

/// A resting order, ordered by price for its side's heap. Insertion order
/// (FIFO among equal prices) is not strictly enforced by `BinaryHeap` —
/// see the design notes' Open Question on heap tie-breaking.
#[derive(Debug, Clone, Copy)]
struct RestingOrder {
    order: ServerOrder,
}

impl RestingOrder {
    fn price(&self) -> Price {
        self.order.order.price
    }
    fn id(&self) -> OrderId {
        self.order.order.id
    }
}

/// Bids compare by price directly: `BinaryHeap` is a max-heap, so the
/// highest bid naturally sorts to the top.
impl PartialEq for RestingOrder {
    fn eq(&self, other: &Self) -> bool {
        self.price() == other.price()
    }
}
impl Eq for RestingOrder {}
impl PartialOrd for RestingOrder {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for RestingOrder {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.price()
            .partial_cmp(&other.price())
            .unwrap_or(CmpOrdering::Equal)
    }
}

/// Wraps a `RestingOrder` so that the ask side's `BinaryHeap` surfaces the
/// *lowest* price at its top (a max-heap over `Reverse<price>`).
#[derive(Debug, Clone, Copy)]
struct AskOrder(RestingOrder);

impl PartialEq for AskOrder {
    fn eq(&self, other: &Self) -> bool {
        self.0.price() == other.0.price()
    }
}
impl Eq for AskOrder {}
impl PartialOrd for AskOrder {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for AskOrder {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: the best (lowest) ask price should be the heap max.
        other
            .0
            .price()
            .partial_cmp(&self.0.price())
            .unwrap_or(CmpOrdering::Equal)
    }
}

/// The two-sided priority queue and match loop for one instrument.
pub struct OrderBook {
    bids: BinaryHeap<RestingOrder>,
    asks: BinaryHeap<AskOrder>,
    last_added: OrderId,
    opened_orders: AtomicU64,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: BinaryHeap::with_capacity(ORDER_BOOK_LIMIT),
            asks: BinaryHeap::with_capacity(ORDER_BOOK_LIMIT),
            last_added: 0,
            opened_orders: AtomicU64::new(0),
        }
    }

    /// Number of resting orders across both sides. Observability only.
    pub fn opened_orders(&self) -> u64 {
        self.opened_orders.load(Ordering::Relaxed)
    }

    /// Pushes `order` into the appropriate side and marks it as the
    /// aggressor candidate for the next `match` call.
    pub fn add(&mut self, order: ServerOrder) {
        match order.order.action {
            OrderAction::Buy => self.bids.push(RestingOrder { order }),
            OrderAction::Sell => self.asks.push(AskOrder(RestingOrder { order })),
        }
        self.last_added = order.order.id;
        self.refresh_opened_orders();
    }

    /// Drains all crossing bid/ask pairs, invoking `consumer` with a
    /// `ServerOrderStatus` for each side whose order id equals the most
    /// recently added order (self-trade suppression, see order_book.hpp).
    ///
    /// Match price is always the resting ask's price: the aggressor
    /// receives no price improvement beyond what is already resting.
    pub fn matching<F: FnMut(ServerOrderStatus)>(&mut self, mut consumer: F) {
        loop {
            let (Some(best_bid), Some(best_ask)) = (self.bids.peek(), self.asks.peek()) else {
                break;
            };
            if best_bid.price() < best_ask.0.price() {
                break;
            }

            let quantity = best_bid.order.order.quantity.min(best_ask.0.order.order.quantity);
            let fill_price = best_ask.0.price();

            // Mutate the tops in place.
            let mut bid = self.bids.pop().unwrap();
            let mut ask = self.asks.pop().unwrap();
            bid.order.order.partial_fill(quantity);
            ask.0.order.order.partial_fill(quantity);

            if self.last_added == bid.id() {
                consumer(Self::report(&bid.order, quantity, fill_price));
            }
            if self.last_added == ask.0.id() {
                consumer(Self::report(&ask.0.order, quantity, fill_price));
            }

            if bid.order.order.quantity > 0 {
                self.bids.push(bid);
            }
            if ask.0.order.order.quantity > 0 {
                self.asks.push(ask);
            }
        }
        self.last_added = 0;
        self.refresh_opened_orders();
    }

    fn report(order: &ServerOrder, quantity: Quantity, fill_price: Price) -> ServerOrderStatus {
        let state = if order.order.quantity == 0 {
            OrderState::Full
        } else {
            OrderState::Partial
        };
        ServerOrderStatus {
            client_id: order.client_id,
            status: OrderStatus {
                id: order.order.id,
                timestamp: monotonic_now_nanos(),
                quantity,
                fill_price,
                state,
            },
        }
    }

    fn refresh_opened_orders(&self) {
        self.opened_orders
            .store((self.bids.len() + self.asks.len()) as u64, Ordering::Relaxed);
    }

    /// `true` if the book is crossed (should never happen after `matching`
    /// returns); used by tests exercising self-trade suppression.
    pub fn is_crossed(&self) -> bool {
        match (self.bids.peek(), self.asks.peek()) {
            (Some(b), Some(a)) => b.price() >= a.0.price(),
            _ => false,
        }
    }
}
