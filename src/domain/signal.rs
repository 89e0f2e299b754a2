//! Incoming trade signal as produced by the signal generators.

use crate::domain::{Asset, Decimal, Direction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Confidence assumed when a signal does not carry one.
pub const DEFAULT_CONFIDENCE: f64 = 50.0;

/// A trade idea. Every numeric field is optional on the wire; use
/// [`Signal::levels`] to validate before acting on it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Signal {
    pub asset: Asset,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub entry: Option<Decimal>,
    #[serde(default)]
    pub target: Option<Decimal>,
    #[serde(default)]
    pub stop: Option<Decimal>,
    /// 0-100.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Pre-combined score in [0, 1].
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub ai_score: Option<f64>,
    #[serde(default)]
    pub technical_score: Option<f64>,
}

/// Validated entry/target/stop triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry: Decimal,
    pub target: Decimal,
    pub stop: Decimal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidSignal {
    #[error("signal has no asset")]
    MissingAsset,
    #[error("{asset}: missing or non-positive {field}")]
    BadPrice { asset: Asset, field: &'static str },
    #[error("{asset}: entry equals stop, risk per unit is zero")]
    ZeroRisk { asset: Asset },
}

impl Signal {
    pub fn new(asset: &str, direction: Direction, entry: Decimal, target: Decimal, stop: Decimal) -> Self {
        Signal {
            asset: Asset::new(asset),
            direction,
            entry: Some(entry),
            target: Some(target),
            stop: Some(stop),
            ..Default::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_model_scores(mut self, ai_score: f64, technical_score: f64) -> Self {
        self.ai_score = Some(ai_score);
        self.technical_score = Some(technical_score);
        self
    }

    /// Entry/target/stop, all present and strictly positive.
    pub fn levels(&self) -> Result<TradeLevels, InvalidSignal> {
        if self.asset.is_empty() {
            return Err(InvalidSignal::MissingAsset);
        }
        let entry = self.price("entry", self.entry)?;
        let target = self.price("target", self.target)?;
        let stop = self.price("stop", self.stop)?;
        if entry == stop {
            return Err(InvalidSignal::ZeroRisk {
                asset: self.asset.clone(),
            });
        }
        Ok(TradeLevels {
            entry,
            target,
            stop,
        })
    }

    fn price(&self, field: &'static str, value: Option<Decimal>) -> Result<Decimal, InvalidSignal> {
        match value {
            Some(v) if v.is_positive() => Ok(v),
            _ => Err(InvalidSignal::BadPrice {
                asset: self.asset.clone(),
                field,
            }),
        }
    }

    /// Whether levels follow the intended ordering (`target > entry > stop`
    /// for longs, mirrored for shorts). Not enforced, only reported.
    pub fn has_ordered_levels(&self, levels: &TradeLevels) -> bool {
        match self.direction {
            Direction::Long => levels.target > levels.entry && levels.entry > levels.stop,
            Direction::Short => levels.target < levels.entry && levels.entry < levels.stop,
        }
    }

    /// Confidence clamped to 0-100, defaulting to 50.
    pub fn confidence_pct(&self) -> u8 {
        let raw = self.confidence.unwrap_or(DEFAULT_CONFIDENCE);
        if raw.is_nan() {
            return DEFAULT_CONFIDENCE as u8;
        }
        raw.round().clamp(0.0, 100.0) as u8
    }

    /// `score` when supplied, otherwise the mean of the model scores present.
    pub fn combined_score(&self) -> Option<f64> {
        if let Some(score) = self.score {
            return Some(score);
        }
        let parts: Vec<f64> = [self.ai_score, self.technical_score]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.iter().sum::<f64>() / parts.len() as f64)
        }
    }
}
