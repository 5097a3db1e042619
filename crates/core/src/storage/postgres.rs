use crate::config::{is_sql_identifier, Settings};
use crate::domain::stock::{PredictionPoint, PricePoint, StockSummary};
use crate::storage::StockStore;
use anyhow::Context;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

type StockSummaryRow = (
    String,
    Option<String>,
    Option<Value>,
    Option<i32>,
    Option<i32>,
    Option<f64>,
);

/// Store reading the same tables over a direct Postgres connection.
#[derive(Debug, Clone)]
pub struct PgStockStore {
    pool: sqlx::PgPool,
    rpc_name: String,
    rpc_param: String,
    // Resolved from pg_proc on first use.
    details_sql: Arc<OnceCell<String>>,
}

impl PgStockStore {
    pub fn new(pool: sqlx::PgPool, settings: &Settings) -> Self {
        Self {
            pool,
            rpc_name: settings.stock_details_rpc.clone(),
            rpc_param: settings.stock_details_rpc_param.clone(),
            details_sql: Arc::new(OnceCell::new()),
        }
    }

    async fn details_sql(&self) -> anyhow::Result<&str> {
        let sql = self
            .details_sql
            .get_or_try_init(|| async {
                let returns_set: Option<bool> = sqlx::query_scalar(
                    "SELECT bool_or(proretset) FROM pg_proc WHERE proname = $1",
                )
                .persistent(false)
                .bind(&self.rpc_name)
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("lookup of procedure {} failed", self.rpc_name))?;

                let returns_set = returns_set
                    .with_context(|| format!("procedure {} does not exist", self.rpc_name))?;
                tracing::debug!(procedure = %self.rpc_name, returns_set, "resolved stock details procedure");
                anyhow::Ok(details_sql(&self.rpc_name, &self.rpc_param, returns_set))
            })
            .await?;
        Ok(sql.as_str())
    }
}

/// Mirrors PostgREST `/rpc`: set-returning procedures come back as a JSON array of rows,
/// anything else as the single value it returns.
fn details_sql(rpc_name: &str, rpc_param: &str, returns_set: bool) -> String {
    // Identifiers are validated when settings load; this guards direct callers.
    debug_assert!(is_sql_identifier(rpc_name) && is_sql_identifier(rpc_param));
    if returns_set {
        format!(
            "SELECT COALESCE(jsonb_agg(to_jsonb(t)), '[]'::jsonb) \
             FROM {rpc_name}({rpc_param} => $1) AS t"
        )
    } else {
        format!("SELECT to_jsonb({rpc_name}({rpc_param} => $1))")
    }
}

#[async_trait::async_trait]
impl StockStore for PgStockStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ranked_stocks(&self, limit: usize) -> anyhow::Result<Vec<StockSummary>> {
        let rows = sqlx::query_as::<_, StockSummaryRow>(
            "SELECT ticker, name, sentiment, news_count, rank, investment_score \
             FROM stocks \
             ORDER BY rank ASC NULLS LAST, ticker ASC \
             LIMIT $1",
        )
        .persistent(false)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("select stocks failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(ticker, name, sentiment, news_count, rank, investment_score)| StockSummary {
                    ticker,
                    name,
                    sentiment,
                    news_count,
                    rank,
                    investment_score,
                },
            )
            .collect())
    }

    async fn latest_price(&self, ticker: &str) -> anyhow::Result<Option<PricePoint>> {
        let row = sqlx::query_as::<_, (String, NaiveDate, f64)>(
            "SELECT ticker, date, price \
             FROM stock_prices \
             WHERE ticker = $1 AND price IS NOT NULL \
             ORDER BY date DESC \
             LIMIT 1",
        )
        .persistent(false)
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select latest stock_prices failed (ticker={ticker})"))?;

        Ok(row.map(|(ticker, date, price)| PricePoint {
            ticker,
            date,
            price,
        }))
    }

    async fn latest_prediction(&self, ticker: &str) -> anyhow::Result<Option<PredictionPoint>> {
        let row = sqlx::query_as::<_, (String, NaiveDate, f64, Option<f64>, Option<f64>)>(
            "SELECT ticker, date, price, upper_bound, lower_bound \
             FROM stock_predictions \
             WHERE ticker = $1 AND price IS NOT NULL \
             ORDER BY date DESC \
             LIMIT 1",
        )
        .persistent(false)
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select latest stock_predictions failed (ticker={ticker})"))?;

        Ok(
            row.map(|(ticker, date, price, upper_bound, lower_bound)| PredictionPoint {
                ticker,
                date,
                price,
                upper_bound,
                lower_bound,
            }),
        )
    }

    async fn stock_details(&self, ticker: &str) -> anyhow::Result<Value> {
        let sql = self.details_sql().await?;
        let (details,): (Option<Value>,) = sqlx::query_as(sql)
            .persistent(false)
            .bind(ticker)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("stock details procedure failed (ticker={ticker})"))?;
        Ok(details.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_returning_procedure_is_aggregated_into_an_array() {
        assert_eq!(
            details_sql("get_stock_details", "ticker_param", true),
            "SELECT COALESCE(jsonb_agg(to_jsonb(t)), '[]'::jsonb) \
             FROM get_stock_details(ticker_param => $1) AS t"
        );
    }

    #[test]
    fn scalar_procedure_result_is_selected_unwrapped() {
        let sql = details_sql("get_stock_details", "ticker_param", false);
        assert_eq!(sql, "SELECT to_jsonb(get_stock_details(ticker_param => $1))");
        assert!(!sql.contains("jsonb_agg"));
    }
}
