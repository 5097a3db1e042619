use crate::domain::stock::{PredictionPoint, PricePoint};
use anyhow::{ensure, Context};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

// Keeps each INSERT well under the Postgres bind-parameter limit.
const INSERT_CHUNK_ROWS: usize = 1000;

/// Everything the analysis pipeline produced for one stock.
#[derive(Debug, Clone, PartialEq)]
pub struct StockAnalysisRecord {
    pub ticker: String,
    pub name: String,
    pub sentiment_score: f64,
    pub sentiment_category: String,
    pub investment_score: f64,
    pub news_count: i32,
    pub rank: i32,
    pub prices: Vec<PricePoint>,
    pub predictions: Vec<PredictionPoint>,
}

impl StockAnalysisRecord {
    /// Shape of the `sentiment` column read back by the dashboard.
    pub fn sentiment_json(&self) -> Value {
        json!({
            "score": self.sentiment_score,
            "category": self.sentiment_category,
            "investment_score": self.investment_score,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.ticker.trim().is_empty(), "ticker must be non-empty");
        ensure!(
            self.sentiment_score.is_finite() && self.investment_score.is_finite(),
            "scores must be finite (ticker={})",
            self.ticker
        );
        for p in &self.prices {
            ensure!(
                p.ticker == self.ticker,
                "price row ticker mismatch: expected {}, got {}",
                self.ticker,
                p.ticker
            );
            ensure!(
                p.price.is_finite(),
                "price must be finite (ticker={}, date={})",
                self.ticker,
                p.date
            );
        }
        for p in &self.predictions {
            ensure!(
                p.ticker == self.ticker,
                "prediction row ticker mismatch: expected {}, got {}",
                self.ticker,
                p.ticker
            );
            ensure!(
                p.price.is_finite(),
                "predicted price must be finite (ticker={}, date={})",
                self.ticker,
                p.date
            );
        }
        Ok(())
    }
}

/// Writes one stock atomically: the `stocks` row is upserted and, when present, its price
/// history and predictions replace whatever was stored for the ticker.
pub async fn persist_stock_analysis(
    pool: &sqlx::PgPool,
    record: &StockAnalysisRecord,
    updated_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    record.validate()?;

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query(
        "INSERT INTO stocks (ticker, name, sentiment_score, sentiment_category, sentiment, news_count, rank, investment_score, last_updated) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (ticker) DO UPDATE \
         SET name = EXCLUDED.name, sentiment_score = EXCLUDED.sentiment_score, \
             sentiment_category = EXCLUDED.sentiment_category, sentiment = EXCLUDED.sentiment, \
             news_count = EXCLUDED.news_count, rank = EXCLUDED.rank, \
             investment_score = EXCLUDED.investment_score, last_updated = EXCLUDED.last_updated",
    )
    .persistent(false)
    .bind(&record.ticker)
    .bind(&record.name)
    .bind(record.sentiment_score)
    .bind(&record.sentiment_category)
    .bind(record.sentiment_json())
    .bind(record.news_count)
    .bind(record.rank)
    .bind(record.investment_score)
    .bind(updated_at)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("upsert stocks failed (ticker={})", record.ticker))?;

    if !record.prices.is_empty() {
        sqlx::query("DELETE FROM stock_prices WHERE ticker = $1")
            .persistent(false)
            .bind(&record.ticker)
            .execute(&mut *tx)
            .await
            .context("delete stock_prices failed")?;

        for chunk in record.prices.chunks(INSERT_CHUNK_ROWS) {
            let mut qb = sqlx::QueryBuilder::new("INSERT INTO stock_prices (ticker, date, price) ");
            qb.push_values(chunk, |mut b, p| {
                b.push_bind(&record.ticker)
                    .push_bind(p.date)
                    .push_bind(p.price);
            });
            qb.build()
                .persistent(false)
                .execute(&mut *tx)
                .await
                .context("insert stock_prices failed")?;
        }
    }

    if !record.predictions.is_empty() {
        sqlx::query("DELETE FROM stock_predictions WHERE ticker = $1")
            .persistent(false)
            .bind(&record.ticker)
            .execute(&mut *tx)
            .await
            .context("delete stock_predictions failed")?;

        for chunk in record.predictions.chunks(INSERT_CHUNK_ROWS) {
            let mut qb = sqlx::QueryBuilder::new(
                "INSERT INTO stock_predictions (ticker, date, price, upper_bound, lower_bound) ",
            );
            qb.push_values(chunk, |mut b, p| {
                b.push_bind(&record.ticker)
                    .push_bind(p.date)
                    .push_bind(p.price)
                    .push_bind(p.upper_bound)
                    .push_bind(p.lower_bound);
            });
            qb.build()
                .persistent(false)
                .execute(&mut *tx)
                .await
                .context("insert stock_predictions failed")?;
        }
    }

    tx.commit().await.context("commit transaction failed")?;

    tracing::debug!(
        ticker = %record.ticker,
        rank = record.rank,
        prices = record.prices.len(),
        predictions = record.predictions.len(),
        "persisted stock analysis"
    );
    Ok(())
}
