use crate::dashboard::RANKED_STOCK_LIMIT;
use crate::domain::stock::StockSummary;
use crate::storage::StockStore;
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StockListing {
    /// Result of the stock-details procedure, passed through untouched.
    Details(Value),
    Ranked(Vec<StockSummary>),
}

/// With a ticker, delegates to the details procedure; otherwise lists the top ranked stocks.
/// Blank tickers count as absent.
pub async fn fetch_stock_listing(
    store: &dyn StockStore,
    ticker: Option<&str>,
) -> anyhow::Result<StockListing> {
    match ticker.map(str::trim).filter(|t| !t.is_empty()) {
        Some(ticker) => {
            let details = store
                .stock_details(ticker)
                .await
                .with_context(|| format!("stock details lookup failed (ticker={ticker})"))?;
            Ok(StockListing::Details(details))
        }
        None => {
            let stocks = store
                .ranked_stocks(RANKED_STOCK_LIMIT)
                .await
                .context("ranked stock listing failed")?;
            tracing::debug!(
                backend = store.backend_name(),
                count = stocks.len(),
                "fetched ranked stocks"
            );
            Ok(StockListing::Ranked(stocks))
        }
    }
}
