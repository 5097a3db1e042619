pub mod analysis;
pub mod postgres;
pub mod postgrest;

use crate::config::{Settings, StoreBackend};
use crate::domain::stock::{PredictionPoint, PricePoint, StockSummary};
use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;

pub use postgres::PgStockStore;
pub use postgrest::PostgrestStore;

/// Read-only view over the hosted stock tables.
#[async_trait::async_trait]
pub trait StockStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Stocks ordered by `rank` ascending, at most `limit` rows.
    async fn ranked_stocks(&self, limit: usize) -> anyhow::Result<Vec<StockSummary>>;

    async fn latest_price(&self, ticker: &str) -> anyhow::Result<Option<PricePoint>>;

    async fn latest_prediction(&self, ticker: &str) -> anyhow::Result<Option<PredictionPoint>>;

    /// Invokes the stock-details procedure and hands back whatever it returns.
    async fn stock_details(&self, ticker: &str) -> anyhow::Result<Value>;
}

pub async fn connect(settings: &Settings) -> anyhow::Result<Arc<dyn StockStore>> {
    match settings.store_backend {
        StoreBackend::Postgrest => Ok(Arc::new(PostgrestStore::from_settings(settings)?)),
        StoreBackend::Postgres => {
            let pool = connect_pool(settings.require_database_url()?).await?;
            Ok(Arc::new(PgStockStore::new(pool, settings)))
        }
    }
}

pub async fn connect_pool(db_url: &str) -> anyhow::Result<sqlx::PgPool> {
    let max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
