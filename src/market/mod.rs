//! Market data: the order book, the per-instrument ticker catalog, and the
//! periodic price feed.

pub mod order_book;
pub mod price_feed;

use std::collections::HashMap;

use crate::domain::{Price, Ticker, TickerData};

/// Ticker catalog built once at startup from `read_tickers()` and never
/// resized. Grounded on `original_source/server/src/ticker_data.hpp`'s
/// `MarketData` alias.
pub struct MarketData {
    tickers: HashMap<Ticker, TickerData>,
}

impl MarketData {
    /// Builds the catalog, assigning worker threads round-robin across
    /// `worker_count` as the coordinator does at startup.
    pub fn build(catalog: &[(Ticker, Price)], worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let mut tickers = HashMap::with_capacity(catalog.len());
        for (i, (ticker, price)) in catalog.iter().enumerate() {
            tickers.insert(*ticker, TickerData::new(i % worker_count, *price));
        }
        Self { tickers }
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&TickerData> {
        self.tickers.get(ticker)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ticker, &TickerData)> {
        self.tickers.iter()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Sum of resting orders across every book. Observability only.
    pub fn total_opened_orders(&self) -> u64 {
        self.tickers
            .values()
            .map(|t| t.order_book.lock().opened_orders())
            .sum()
    }
}
