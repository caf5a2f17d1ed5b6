//! Routes inbound orders to the worker that owns their instrument, and
//! reports a periodic orders/second rate.
//!
//! Grounded on `examples/original_source/server/src/coordinator.hpp`:
//! `processOrder` posts onto the owning worker's context, runs the match,
//! and re-posts resulting statuses onto the market bus; `scheduleStatsTimer`
//! becomes a `tokio::time::interval` loop here instead of a re-arming
//! `boost::asio::steady_timer`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::bus::market::MarketBus;
use crate::domain::ServerOrder;
use crate::market::MarketData;
use crate::worker::WorkerPool;

pub struct Coordinator {
    data: Arc<MarketData>,
    bus: Arc<MarketBus>,
    pool: Arc<WorkerPool>,
    orders_total: Arc<AtomicU64>,
    stats_rate: Duration,
}

impl Coordinator {
    pub fn new(
        data: Arc<MarketData>,
        bus: Arc<MarketBus>,
        pool: Arc<WorkerPool>,
        stats_rate: Duration,
    ) -> Self {
        Self {
            data,
            bus,
            pool,
            orders_total: Arc::new(AtomicU64::new(0)),
            stats_rate,
        }
    }

    /// Subscribes to the market bus's order slot. Call once at startup,
    /// after the pool and market data are built.
    pub fn install(self: &Arc<Self>) {
        let this = self.clone();
        self.bus.set_order_handler(move |order| this.process_order(order));
    }

    fn process_order(&self, order: ServerOrder) {
        self.orders_total.fetch_add(1, Ordering::Relaxed);
        let Some(ticker_data) = self.data.get(&order.order.ticker) else {
            return;
        };
        let worker_id = ticker_data.thread_id();
        let data = self.data.clone();
        let bus = self.bus.clone();
        let ticker = order.order.ticker;
        self.pool.post_to(worker_id, move || {
            let Some(ticker_data) = data.get(&ticker) else {
                return;
            };
            let mut book = ticker_data.order_book.lock();
            book.add(order);
            book.matching(|status| bus.post_status(status));
        });
    }

    /// Runs the orders/sec reporting loop until the returned future is
    /// dropped or cancelled. Intended to be spawned as a tokio task.
    pub async fn run_stats_loop(self: Arc<Self>) {
        let mut last_total = 0u64;
        let mut ticker = tokio::time::interval(self.stats_rate);
        loop {
            ticker.tick().await;
            let current = self.orders_total.load(Ordering::Relaxed);
            let rps = (current - last_total) / self.stats_rate.as_secs().max(1);
            if rps != 0 {
                let opened = self.data.total_opened_orders();
                info!(opened, total = current, rps, "order throughput");
            }
            last_total = current;
        }
    }

    pub fn orders_total(&self) -> u64 {
        self.orders_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::market::MarketBus;
    use crate::domain::{Order, OrderAction, Ticker};
    use std::time::Duration;

    #[tokio::test]
    async fn routed_order_matches_and_reports_status() {
        let catalog = vec![(Ticker::new("AAAAA"), 10.0)];
        let data = Arc::new(MarketData::build(&catalog, 1));
        let bus = Arc::new(MarketBus::new());
        let pool = Arc::new(WorkerPool::new(&[]));
        let coordinator = Arc::new(Coordinator::new(
            data.clone(),
            bus.clone(),
            pool.clone(),
            Duration::from_secs(1),
        ));
        coordinator.install();

        let (tx, rx) = std::sync::mpsc::channel();
        bus.set_status_handler(move |status| {
            let _ = tx.send(status);
        });

        let ticker = Ticker::new("AAAAA");
        let sell = ServerOrder {
            client_id: 1,
            order: Order {
                id: 1,
                timestamp: 0,
                ticker,
                quantity: 10,
                price: 9.0,
                action: OrderAction::Sell,
            },
        };
        let buy = ServerOrder {
            client_id: 2,
            order: Order {
                id: 2,
                timestamp: 0,
                ticker,
                quantity: 10,
                price: 9.0,
                action: OrderAction::Buy,
            },
        };
        bus.post_order(sell);
        bus.post_order(buy);

        std::thread::sleep(Duration::from_millis(50));
        // Only the most-recently-added side (the buy) is reported: the
        // book's self-trade suppression keys off `last_added`.
        let status = rx.recv_timeout(Duration::from_millis(500)).unwrap();
        assert_eq!(status.status.quantity, 10);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(coordinator.orders_total(), 2);
    }
}
