use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;
use stockdash_core::domain::stock::{PredictionPoint, PricePoint};
use stockdash_core::storage::analysis::StockAnalysisRecord;

/// One stock as emitted by the analysis pipeline, in rank order.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzedStock {
    pub ticker: String,
    pub name: String,
    #[serde(default, alias = "avg_sentiment")]
    pub sentiment_score: f64,
    #[serde(default = "neutral_category")]
    pub sentiment_category: String,
    #[serde(default)]
    pub investment_score: f64,
    #[serde(default, deserialize_with = "whole_number")]
    pub news_count: i32,
    #[serde(default)]
    pub historical_data: Vec<DatedPrice>,
    #[serde(default)]
    pub prediction: ForecastSeries,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatedPrice {
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastSeries {
    #[serde(default)]
    pub data: Vec<DatedPrice>,
    #[serde(default)]
    pub upper_bound: Vec<DatedPrice>,
    #[serde(default)]
    pub lower_bound: Vec<DatedPrice>,
}

fn neutral_category() -> String {
    "Neutral".to_string()
}

/// Counts often arrive as floats (`22.0`) from the dataframe export; accept them when whole.
fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let n = f64::deserialize(deserializer)?;
    if n.fract() != 0.0 || n < i32::MIN as f64 || n > i32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "expected a whole number, got {n}"
        )));
    }
    Ok(n as i32)
}

impl AnalyzedStock {
    /// `rank` is 1-based. Bounds are paired with forecast points by position.
    pub fn into_record(self, rank: i32) -> anyhow::Result<StockAnalysisRecord> {
        let ticker = self.ticker.trim().to_string();
        anyhow::ensure!(!ticker.is_empty(), "ticker must be non-empty (rank {rank})");

        let prices = self
            .historical_data
            .into_iter()
            .map(|p| PricePoint {
                ticker: ticker.clone(),
                date: p.date,
                price: p.price,
            })
            .collect();

        let ForecastSeries {
            data,
            upper_bound,
            lower_bound,
        } = self.prediction;
        let predictions = data
            .into_iter()
            .enumerate()
            .map(|(i, p)| PredictionPoint {
                ticker: ticker.clone(),
                date: p.date,
                price: p.price,
                upper_bound: upper_bound.get(i).map(|b| b.price),
                lower_bound: lower_bound.get(i).map(|b| b.price),
            })
            .collect();

        let record = StockAnalysisRecord {
            ticker,
            name: self.name.trim().to_string(),
            sentiment_score: self.sentiment_score,
            sentiment_category: self.sentiment_category,
            investment_score: self.investment_score,
            news_count: self.news_count,
            rank,
            prices,
            predictions,
        };
        record.validate()?;
        Ok(record)
    }
}

/// A stock entry that could not be turned into a record.
#[derive(Debug)]
pub struct RejectedStock {
    pub rank: i32,
    pub ticker: Option<String>,
    pub error: anyhow::Error,
}

pub fn load_analysis(path: &Path) -> anyhow::Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read analysis file {}", path.display()))?;
    parse_analysis(&text).with_context(|| format!("invalid analysis file {}", path.display()))
}

/// Only the outer array is checked here; entries are decoded one by one in [`build_records`].
pub fn parse_analysis(text: &str) -> anyhow::Result<Vec<Value>> {
    serde_json::from_str(text).context("analysis must be a JSON array of stocks")
}

/// Decodes and validates each entry independently. Rank is the 1-based position in the file,
/// including entries that get rejected.
pub fn build_records(entries: Vec<Value>) -> (Vec<StockAnalysisRecord>, Vec<RejectedStock>) {
    let mut records = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();

    for (idx, entry) in entries.into_iter().enumerate() {
        let rank = idx as i32 + 1;
        let ticker = entry
            .get("ticker")
            .and_then(Value::as_str)
            .map(str::to_string);

        let result = serde_json::from_value::<AnalyzedStock>(entry)
            .context("malformed stock entry")
            .and_then(|stock| stock.into_record(rank));
        match result {
            Ok(record) => records.push(record),
            Err(error) => rejected.push(RejectedStock {
                rank,
                ticker,
                error,
            }),
        }
    }

    (records, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_pipeline_output_with_defaults() {
        let text = json!([
            {
                "ticker": "AAPL",
                "name": "Apple Inc.",
                "avg_sentiment": 0.31,
                "sentiment_category": "Positive",
                "investment_score": 68.5,
                "news_count": 22,
                "historical_data": [
                    {"date": "2026-02-26", "price": 98.0},
                    {"date": "2026-02-27", "price": 100.0}
                ],
                "prediction": {
                    "data": [{"date": "2026-03-27", "price": 115.0}],
                    "upper_bound": [{"date": "2026-03-27", "price": 121.0}],
                    "lower_bound": [{"date": "2026-03-27", "price": 108.0}]
                }
            },
            {"ticker": "XYZ", "name": "XYZ Corp"}
        ])
        .to_string();

        let (records, rejected) = build_records(parse_analysis(&text).unwrap());
        assert!(rejected.is_empty());
        assert_eq!(records.len(), 2);

        let record = &records[0];
        assert_eq!(record.rank, 1);
        assert_eq!(record.sentiment_score, 0.31);
        assert_eq!(record.news_count, 22);
        assert_eq!(record.prices.len(), 2);
        assert_eq!(record.predictions[0].price, 115.0);
        assert_eq!(record.predictions[0].upper_bound, Some(121.0));
        assert_eq!(record.predictions[0].lower_bound, Some(108.0));

        assert_eq!(records[1].rank, 2);
        assert_eq!(records[1].sentiment_category, "Neutral");
        assert_eq!(records[1].news_count, 0);
        assert!(records[1].predictions.is_empty());
    }

    #[test]
    fn missing_bounds_become_none() {
        let stock: AnalyzedStock = serde_json::from_value(json!({
            "ticker": " MSFT ",
            "name": "Microsoft",
            "prediction": {"data": [
                {"date": "2026-03-27", "price": 410.0},
                {"date": "2026-03-28", "price": 412.0}
            ], "upper_bound": [{"date": "2026-03-27", "price": 420.0}]}
        }))
        .unwrap();

        let record = stock.into_record(3).unwrap();
        assert_eq!(record.ticker, "MSFT");
        assert_eq!(record.predictions[0].upper_bound, Some(420.0));
        assert_eq!(record.predictions[1].upper_bound, None);
        assert!(record.predictions.iter().all(|p| p.lower_bound.is_none()));
        assert!(record.predictions.iter().all(|p| p.ticker == "MSFT"));
    }

    #[test]
    fn blank_ticker_is_rejected() {
        let stock: AnalyzedStock =
            serde_json::from_value(json!({"ticker": "", "name": "Nothing"})).unwrap();
        assert!(stock.into_record(1).is_err());
    }

    #[test]
    fn float_counts_are_accepted_when_whole() {
        let stock: AnalyzedStock =
            serde_json::from_value(json!({"ticker": "MSFT", "name": "Microsoft", "news_count": 22.0}))
                .unwrap();
        assert_eq!(stock.news_count, 22);

        let res = serde_json::from_value::<AnalyzedStock>(
            json!({"ticker": "MSFT", "name": "Microsoft", "news_count": 22.5}),
        );
        assert!(res.is_err());
    }

    #[test]
    fn bad_entries_are_skipped_without_losing_the_rest() {
        let entries = parse_analysis(
            &json!([
                {"ticker": "AAPL", "name": "Apple Inc.", "news_count": 9},
                {"ticker": "MSFT", "name": null, "news_count": 22.0},
                {"ticker": "NVDA", "name": "Nvidia", "historical_data": [{"date": "2026-02-27T16:00:00", "price": 1.0}]},
                {"ticker": "XYZ", "name": "XYZ Corp", "news_count": 4.0},
                {"ticker": "", "name": "Blank"}
            ])
            .to_string(),
        )
        .unwrap();

        let (records, rejected) = build_records(entries);

        let written: Vec<(&str, i32)> = records.iter().map(|r| (r.ticker.as_str(), r.rank)).collect();
        assert_eq!(written, [("AAPL", 1), ("XYZ", 4)]);

        let skipped: Vec<(Option<&str>, i32)> = rejected
            .iter()
            .map(|r| (r.ticker.as_deref(), r.rank))
            .collect();
        assert_eq!(skipped, [(Some("MSFT"), 2), (Some("NVDA"), 3), (Some(""), 5)]);
    }

    #[test]
    fn non_array_input_is_rejected() {
        assert!(parse_analysis(r#"{"ticker": "AAPL"}"#).is_err());
    }
}
