use crate::domain::stock::{PredictionPoint, PricePoint, SentimentScores, StockSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    /// Zero change counts as an increase.
    pub fn from_percent_change(percent_change: f64) -> Self {
        if percent_change >= 0.0 {
            Self::Increase
        } else {
            Self::Decrease
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "7 days")]
    SevenDays,
    #[serde(rename = "14 days")]
    FourteenDays,
    #[serde(rename = "30 days")]
    ThirtyDays,
}

impl Timeframe {
    /// Bucket by absolute percent change. Exactly 10 and exactly 20 fall into the lower bucket.
    pub fn from_magnitude(magnitude: f64) -> Self {
        let magnitude = magnitude.abs();
        if magnitude > 20.0 {
            Self::ThirtyDays
        } else if magnitude > 10.0 {
            Self::FourteenDays
        } else {
            Self::SevenDays
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub symbol: String,
    pub company: String,
    /// Absolute percent change, never negative.
    pub prediction: f64,
    pub direction: Direction,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub current_price: f64,
    pub predicted_price: f64,
    pub sentiment_score: f64,
    pub investment_score: f64,
}

impl PredictionResult {
    /// Returns `None` when no percent change can be computed (zero or non-finite prices).
    pub fn from_latest(
        stock: &StockSummary,
        latest_price: &PricePoint,
        latest_prediction: &PredictionPoint,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let current_price = latest_price.price;
        let predicted_price = latest_prediction.price;
        let change = percent_change(current_price, predicted_price)?;
        let scores = SentimentScores::from_sentiment(stock.sentiment.as_ref());

        Some(Self {
            symbol: stock.ticker.clone(),
            company: stock.company().to_string(),
            prediction: change.abs(),
            direction: Direction::from_percent_change(change),
            timeframe: Timeframe::from_magnitude(change),
            timestamp,
            current_price,
            predicted_price,
            sentiment_score: scores.sentiment_score,
            investment_score: scores.investment_score,
        })
    }
}

/// Percent change from `current` to `predicted`.
///
/// Multiplies before dividing so whole-number prices land exactly on bucket boundaries.
pub fn percent_change(current: f64, predicted: f64) -> Option<f64> {
    if !current.is_finite() || !predicted.is_finite() || current == 0.0 {
        return None;
    }
    let change = (predicted - current) * 100.0 / current;
    change.is_finite().then_some(change)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShockingPredictions {
    pub top_increases: Vec<PredictionResult>,
    pub top_decreases: Vec<PredictionResult>,
    pub all_shocking: Vec<PredictionResult>,
}

/// Sorts by magnitude (descending) and slices out the three dashboard lists.
///
/// The sort is stable: results with equal magnitude keep their input order, which is the
/// stock rank order when fed by the prediction handler.
pub fn rank_shocking(mut results: Vec<PredictionResult>, top_n: usize) -> ShockingPredictions {
    results.sort_by(|a, b| b.prediction.total_cmp(&a.prediction));

    let top_increases = results
        .iter()
        .filter(|r| r.direction == Direction::Increase)
        .take(top_n)
        .cloned()
        .collect();
    let top_decreases = results
        .iter()
        .filter(|r| r.direction == Direction::Decrease)
        .take(top_n)
        .cloned()
        .collect();

    results.truncate(top_n.saturating_mul(2));

    ShockingPredictions {
        top_increases,
        top_decreases,
        all_shocking: results,
    }
}
