use crate::dashboard::RANKED_STOCK_LIMIT;
use crate::domain::prediction::{rank_shocking, PredictionResult, ShockingPredictions};
use crate::domain::stock::StockSummary;
use crate::storage::StockStore;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinSet;

pub const DEFAULT_TOP_N: usize = 5;

/// Compares each ranked stock's latest prediction to its latest price and returns the biggest
/// movers. Only the initial listing can fail the request; per-stock failures drop that stock.
pub async fn fetch_shocking_predictions(
    store: Arc<dyn StockStore>,
    top_n: usize,
    now: DateTime<Utc>,
) -> anyhow::Result<ShockingPredictions> {
    let stocks = store
        .ranked_stocks(RANKED_STOCK_LIMIT)
        .await
        .context("ranked stock listing failed")?;

    if stocks.is_empty() {
        return Ok(ShockingPredictions::default());
    }

    let total = stocks.len();
    let mut tasks = JoinSet::new();
    for (slot, stock) in stocks.into_iter().enumerate() {
        let store = Arc::clone(&store);
        tasks.spawn(async move { (slot, evaluate_stock(store.as_ref(), &stock, now).await) });
    }

    // Each task owns one slot, so the rank order survives out-of-order completion.
    let mut slots: Vec<Option<PredictionResult>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, result)) => slots[slot] = result,
            Err(err) => tracing::warn!(error = %err, "prediction task failed; skipping stock"),
        }
    }

    let results: Vec<PredictionResult> = slots.into_iter().flatten().collect();
    tracing::debug!(
        backend = store.backend_name(),
        stocks = total,
        evaluated = results.len(),
        top_n,
        "ranked shocking predictions"
    );

    Ok(rank_shocking(results, top_n))
}

async fn evaluate_stock(
    store: &dyn StockStore,
    stock: &StockSummary,
    now: DateTime<Utc>,
) -> Option<PredictionResult> {
    let ticker = stock.ticker.as_str();

    let prediction = match store.latest_prediction(ticker).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            tracing::debug!(%ticker, "no prediction rows; skipping");
            return None;
        }
        Err(err) => {
            tracing::warn!(%ticker, error = %format!("{err:#}"), "latest prediction fetch failed; skipping");
            return None;
        }
    };

    let price = match store.latest_price(ticker).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            tracing::debug!(%ticker, "no price rows; skipping");
            return None;
        }
        Err(err) => {
            tracing::warn!(%ticker, error = %format!("{err:#}"), "latest price fetch failed; skipping");
            return None;
        }
    };

    let result = PredictionResult::from_latest(stock, &price, &prediction, now);
    if result.is_none() {
        tracing::debug!(
            %ticker,
            current_price = price.price,
            predicted_price = prediction.price,
            "percent change undefined; skipping"
        );
    }
    result
}
