pub mod listing;
pub mod predictions;

/// Both dashboard views read at most this many ranked stocks.
pub const RANKED_STOCK_LIMIT: usize = 100;

#[cfg(test)]
pub(crate) mod testing {
    use crate::domain::stock::{PredictionPoint, PricePoint, StockSummary};
    use crate::storage::StockStore;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store with switchable failures.
    #[derive(Default)]
    pub struct FakeStore {
        pub stocks: Vec<StockSummary>,
        pub prices: HashMap<String, f64>,
        pub predictions: HashMap<String, f64>,
        pub failing_tickers: HashSet<String>,
        pub fail_listing: bool,
        pub details_calls: AtomicUsize,
        pub listing_limits: std::sync::Mutex<Vec<usize>>,
    }

    impl FakeStore {
        pub fn with_stock(mut self, ticker: &str, price: Option<f64>, prediction: Option<f64>) -> Self {
            let rank = self.stocks.len() as i32 + 1;
            self.stocks.push(StockSummary {
                ticker: ticker.to_string(),
                name: Some(format!("{ticker} Corp")),
                sentiment: Some(json!({"score": 0.1, "investment_score": 55.0})),
                news_count: Some(3),
                rank: Some(rank),
                investment_score: Some(55.0),
            });
            if let Some(p) = price {
                self.prices.insert(ticker.to_string(), p);
            }
            if let Some(p) = prediction {
                self.predictions.insert(ticker.to_string(), p);
            }
            self
        }

        pub fn failing(mut self, ticker: &str) -> Self {
            self.failing_tickers.insert(ticker.to_string());
            self
        }

        fn check(&self, ticker: &str) -> anyhow::Result<()> {
            if self.failing_tickers.contains(ticker) {
                anyhow::bail!("simulated store failure for {ticker}");
            }
            Ok(())
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    #[async_trait::async_trait]
    impl StockStore for FakeStore {
        fn backend_name(&self) -> &'static str {
            "fake"
        }

        async fn ranked_stocks(&self, limit: usize) -> anyhow::Result<Vec<StockSummary>> {
            self.listing_limits.lock().unwrap().push(limit);
            if self.fail_listing {
                anyhow::bail!("simulated listing failure");
            }
            Ok(self.stocks.iter().take(limit).cloned().collect())
        }

        async fn latest_price(&self, ticker: &str) -> anyhow::Result<Option<PricePoint>> {
            self.check(ticker)?;
            Ok(self.prices.get(ticker).map(|&price| PricePoint {
                ticker: ticker.to_string(),
                date: date(2),
                price,
            }))
        }

        async fn latest_prediction(&self, ticker: &str) -> anyhow::Result<Option<PredictionPoint>> {
            self.check(ticker)?;
            Ok(self.predictions.get(ticker).map(|&price| PredictionPoint {
                ticker: ticker.to_string(),
                date: date(30),
                price,
                upper_bound: None,
                lower_bound: None,
            }))
        }

        async fn stock_details(&self, ticker: &str) -> anyhow::Result<Value> {
            self.details_calls.fetch_add(1, Ordering::SeqCst);
            self.check(ticker)?;
            Ok(json!([{"ticker": ticker, "details": {"sector": "Technology"}}]))
        }
    }
}
