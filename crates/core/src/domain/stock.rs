use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_SENTIMENT_SCORE: f64 = 0.0;
pub const DEFAULT_INVESTMENT_SCORE: f64 = 50.0;

/// One row of the `stocks` table as shown on the dashboard listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSummary {
    pub ticker: String,
    pub name: Option<String>,
    pub sentiment: Option<Value>,
    pub news_count: Option<i32>,
    pub rank: Option<i32>,
    pub investment_score: Option<f64>,
}

impl StockSummary {
    /// Display name, falling back to the ticker when the row has none.
    pub fn company(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.ticker)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub ticker: String,
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub ticker: String,
    pub date: NaiveDate,
    pub price: f64,
    #[serde(default)]
    pub upper_bound: Option<f64>,
    #[serde(default)]
    pub lower_bound: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScores {
    pub sentiment_score: f64,
    pub investment_score: f64,
}

impl SentimentScores {
    /// Reads the scores out of a structured `sentiment` column.
    ///
    /// The writer stores `{"score", "category", "investment_score"}`; older rows may use
    /// `sentiment_score` instead of `score`. Anything that is not an object yields defaults.
    pub fn from_sentiment(sentiment: Option<&Value>) -> Self {
        let Some(Value::Object(obj)) = sentiment else {
            return Self::default();
        };

        let sentiment_score = obj
            .get("score")
            .or_else(|| obj.get("sentiment_score"))
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_SENTIMENT_SCORE);
        let investment_score = obj
            .get("investment_score")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_INVESTMENT_SCORE);

        Self {
            sentiment_score,
            investment_score,
        }
    }
}

impl Default for SentimentScores {
    fn default() -> Self {
        Self {
            sentiment_score: DEFAULT_SENTIMENT_SCORE,
            investment_score: DEFAULT_INVESTMENT_SCORE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_scores_from_structured_sentiment() {
        let v = json!({"score": 0.42, "category": "Positive", "investment_score": 71.5});
        let s = SentimentScores::from_sentiment(Some(&v));
        assert_eq!(s.sentiment_score, 0.42);
        assert_eq!(s.investment_score, 71.5);
    }

    #[test]
    fn accepts_sentiment_score_alias() {
        let v = json!({"sentiment_score": -0.3});
        let s = SentimentScores::from_sentiment(Some(&v));
        assert_eq!(s.sentiment_score, -0.3);
        assert_eq!(s.investment_score, DEFAULT_INVESTMENT_SCORE);
    }

    #[test]
    fn defaults_when_sentiment_is_not_an_object() {
        for v in [json!(0.7), json!("Positive"), json!(null), json!([1, 2])] {
            assert_eq!(SentimentScores::from_sentiment(Some(&v)), SentimentScores::default());
        }
        assert_eq!(SentimentScores::from_sentiment(None), SentimentScores::default());
    }

    #[test]
    fn non_numeric_sub_fields_fall_back_independently() {
        let v = json!({"score": "high", "investment_score": 12});
        let s = SentimentScores::from_sentiment(Some(&v));
        assert_eq!(s.sentiment_score, DEFAULT_SENTIMENT_SCORE);
        assert_eq!(s.investment_score, 12.0);
    }

    #[test]
    fn company_falls_back_to_ticker() {
        let mut stock = StockSummary {
            ticker: "AAPL".to_string(),
            name: Some("  ".to_string()),
            sentiment: None,
            news_count: None,
            rank: Some(1),
            investment_score: None,
        };
        assert_eq!(stock.company(), "AAPL");
        stock.name = Some("Apple Inc.".to_string());
        assert_eq!(stock.company(), "Apple Inc.");
    }
}
