//! Typed handler registry for hot-path messages. Exactly one handler per
//! type is registered (the coordinator for `ServerOrder`, the session
//! manager for `ServerOrderStatus`, the broadcast channel for
//! `TickerPrice`). Posting is a direct invocation — no buffering;
//! producers may post concurrently, so handlers must themselves funnel to
//! their target worker or channel.

use parking_lot::RwLock;

use crate::domain::{ServerOrder, ServerOrderStatus, TickerPrice};

type Handler<T> = Box<dyn Fn(T) + Send + Sync>;

#[derive(Default)]
struct Slot<T> {
    handler: RwLock<Option<Handler<T>>>,
}

impl<T> Slot<T> {
    fn set(&self, handler: Handler<T>) {
        *self.handler.write() = Some(handler);
    }

    fn post(&self, msg: T) {
        if let Some(handler) = self.handler.read().as_ref() {
            handler(msg);
        }
    }
}

#[derive(Default)]
pub struct MarketBus {
    orders: Slot<ServerOrder>,
    statuses: Slot<ServerOrderStatus>,
    prices: Slot<TickerPrice>,
}

impl MarketBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_order_handler<F>(&self, handler: F)
    where
        F: Fn(ServerOrder) + Send + Sync + 'static,
    {
        self.orders.set(Box::new(handler));
    }

    pub fn post_order(&self, order: ServerOrder) {
        self.orders.post(order);
    }

    pub fn set_status_handler<F>(&self, handler: F)
    where
        F: Fn(ServerOrderStatus) + Send + Sync + 'static,
    {
        self.statuses.set(Box::new(handler));
    }

    pub fn post_status(&self, status: ServerOrderStatus) {
        self.statuses.post(status);
    }

    pub fn set_price_handler<F>(&self, handler: F)
    where
        F: Fn(TickerPrice) + Send + Sync + 'static,
    {
        self.prices.set(Box::new(handler));
    }

    pub fn post_price(&self, price: TickerPrice) {
        self.prices.post(price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Order, OrderAction, Ticker};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn single_handler_receives_direct_invocation() {
        let bus = MarketBus::new();
        let seen = Arc::new(AtomicU64::new(0));
        let seen2 = seen.clone();
        bus.set_order_handler(move |order: ServerOrder| {
            seen2.store(order.order.id, Ordering::SeqCst);
        });

        bus.post_order(ServerOrder {
            client_id: 1,
            order: Order {
                id: 42,
                timestamp: 0,
                ticker: Ticker::new("AAA"),
                quantity: 10,
                price: 1.0,
                action: OrderAction::Buy,
            },
        });

        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }
}
