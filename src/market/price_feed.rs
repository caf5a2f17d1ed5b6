//! Periodic price mutation and broadcast.
//!
//! On each tick the feed advances a cursor through `MarketData`, applies a
//! bounded random delta to one instrument's price, writes it back
//! (release) and hands a `TickerPrice` to the market bus. Grounded on
//! `original_source/server/src/market/price_feed.hpp` and the
//! `PriceFeedStart`/`PriceFeedStop` commands.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

use crate::domain::TickerPrice;
use crate::market::MarketData;

/// Maximum absolute price delta applied per tick.
const MAX_PRICE_DELTA: f32 = 0.05;

/// Drives the periodic price mutation loop. Owns no threads of its own;
/// `start`/`stop` spawn and cancel a tokio task on the caller's runtime.
pub struct PriceFeed {
    data: Arc<MarketData>,
    rate: Duration,
    running: Arc<AtomicBool>,
    cursor: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl PriceFeed {
    pub fn new(data: Arc<MarketData>, rate: Duration) -> Self {
        Self {
            data,
            rate,
            running: Arc::new(AtomicBool::new(false)),
            cursor: Arc::new(AtomicUsize::new(0)),
            handle: None,
        }
    }

    /// `PriceFeedStart`: schedules the periodic timer if not already
    /// running. `on_tick` receives each `TickerPrice` to post on the
    /// market bus.
    pub fn start<F>(&mut self, mut on_tick: F)
    where
        F: FnMut(TickerPrice) + Send + 'static,
    {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let data = self.data.clone();
        let running = self.running.clone();
        let cursor = self.cursor.clone();
        let rate = self.rate;

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(rate);
            while running.load(Ordering::Acquire) {
                ticker.tick().await;
                if let Some(price) = tick_once(&data, &cursor) {
                    on_tick(price);
                }
            }
        }));
    }

    /// `PriceFeedStop`: cancels the timer.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Mutates the price of one instrument (round robin via `cursor`) and
/// returns the new `TickerPrice`, or `None` if the catalog is empty.
fn tick_once(data: &MarketData, cursor: &AtomicUsize) -> Option<TickerPrice> {
    if data.is_empty() {
        return None;
    }
    let idx = cursor.fetch_add(1, Ordering::Relaxed) % data.len();
    let (ticker, ticker_data) = data.iter().nth(idx)?;

    let delta: f32 = rand::thread_rng().gen_range(-MAX_PRICE_DELTA..=MAX_PRICE_DELTA);
    let current = ticker_data.price();
    let updated = (current + delta).max(0.01);
    ticker_data.set_price(updated);

    Some(TickerPrice {
        ticker: *ticker,
        price: updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Ticker;

    #[test]
    fn tick_mutates_one_instrument() {
        let catalog = vec![(Ticker::new("AAA"), 10.0), (Ticker::new("BBB"), 20.0)];
        let data = Arc::new(MarketData::build(&catalog, 1));
        let cursor = AtomicUsize::new(0);

        let before_a = data.get(&Ticker::new("AAA")).unwrap().price();
        let before_b = data.get(&Ticker::new("BBB")).unwrap().price();

        let result = tick_once(&data, &cursor).unwrap();
        assert!(result.price > 0.0);

        let after_a = data.get(&Ticker::new("AAA")).unwrap().price();
        let after_b = data.get(&Ticker::new("BBB")).unwrap().price();
        // Exactly one of the two should have changed.
        assert!((before_a != after_a) ^ (before_b != after_b));
    }

    #[tokio::test]
    async fn start_stop_toggles_running() {
        let catalog = vec![(Ticker::new("AAA"), 10.0)];
        let data = Arc::new(MarketData::build(&catalog, 1));
        let mut feed = PriceFeed::new(data, Duration::from_millis(5));
        assert!(!feed.is_running());
        feed.start(|_| {});
        assert!(feed.is_running());
        feed.stop();
        assert!(!feed.is_running());
    }
}
