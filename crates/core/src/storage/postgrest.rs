use crate::config::Settings;
use crate::domain::stock::{PredictionPoint, PricePoint, StockSummary};
use crate::storage::StockStore;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const REST_PATH: &str = "/rest/v1";

const STOCK_SUMMARY_COLUMNS: &str = "ticker,name,sentiment,news_count,rank,investment_score";
const PRICE_COLUMNS: &str = "ticker,date,price";
const PREDICTION_COLUMNS: &str = "ticker,date,price,upper_bound,lower_bound";

/// Store backed by the Supabase REST (PostgREST) endpoint.
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    rpc_name: String,
    rpc_param: String,
}

impl PostgrestStore {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout_secs = std::env::var("STORE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(
            settings.require_supabase_url()?,
            settings.require_supabase_key()?,
            &settings.stock_details_rpc,
            &settings.stock_details_rpc_param,
            Duration::from_secs(timeout_secs),
        )
    }

    pub fn new(
        base_url: &str,
        api_key: &str,
        rpc_name: &str,
        rpc_param: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build PostgREST http client")?;

        // Accept both the project URL and the REST root.
        let base_url = base_url.trim().trim_end_matches('/');
        let base_url = base_url.strip_suffix(REST_PATH).unwrap_or(base_url).to_string();

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            rpc_name: rpc_name.to_string(),
            rpc_param: rpc_param.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            REST_PATH,
            path.trim_start_matches('/')
        )
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        Ok(headers)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let res = self
            .http
            .get(self.url(table))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .with_context(|| format!("PostgREST select on {table} failed"))?;

        let raw = read_json(res, table).await?;
        serde_json::from_value::<Vec<T>>(raw)
            .with_context(|| format!("failed to parse {table} rows"))
    }

    async fn latest_row<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        ticker: &str,
    ) -> Result<Option<T>> {
        let rows = self
            .select::<T>(
                table,
                &[
                    ("select", columns.to_string()),
                    ("ticker", format!("eq.{ticker}")),
                    ("price", "not.is.null".to_string()),
                    ("order", "date.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait::async_trait]
impl StockStore for PostgrestStore {
    fn backend_name(&self) -> &'static str {
        "postgrest"
    }

    async fn ranked_stocks(&self, limit: usize) -> Result<Vec<StockSummary>> {
        self.select(
            "stocks",
            &[
                ("select", STOCK_SUMMARY_COLUMNS.to_string()),
                ("order", "rank.asc,ticker.asc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn latest_price(&self, ticker: &str) -> Result<Option<PricePoint>> {
        self.latest_row("stock_prices", PRICE_COLUMNS, ticker).await
    }

    async fn latest_prediction(&self, ticker: &str) -> Result<Option<PredictionPoint>> {
        self.latest_row("stock_predictions", PREDICTION_COLUMNS, ticker)
            .await
    }

    async fn stock_details(&self, ticker: &str) -> Result<Value> {
        let mut body = serde_json::Map::new();
        body.insert(self.rpc_param.clone(), Value::String(ticker.to_string()));

        let path = format!("rpc/{}", self.rpc_name);
        let res = self
            .http
            .post(self.url(&path))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("PostgREST call to {} failed", self.rpc_name))?;

        read_json(res, &path).await
    }
}

async fn read_json(res: reqwest::Response, what: &str) -> Result<Value> {
    let status = res.status();
    let text = res
        .text()
        .await
        .with_context(|| format!("failed to read PostgREST {what} response"))?;

    if !status.is_success() {
        anyhow::bail!("PostgREST {what} HTTP {status}: {text}");
    }

    // Void procedures answer with an empty body.
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str::<Value>(&text)
        .with_context(|| format!("PostgREST {what} response is not valid JSON: {text}"))
}
