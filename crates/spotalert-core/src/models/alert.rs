//! Alert decision model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price::PriceSample;

/// Outcome of comparing one sample against the threshold
///
/// Decisions carry no history. A price that stays above the threshold yields
/// `Exceeded` on every poll, so every poll alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AlertDecision {
    /// Price is at or below the threshold
    Normal {
        /// Evaluated sample
        sample: PriceSample,
        /// Threshold it was compared with
        threshold: Decimal,
    },
    /// Price is strictly above the threshold
    Exceeded {
        /// Evaluated sample
        sample: PriceSample,
        /// Threshold it was compared with
        threshold: Decimal,
    },
}

impl AlertDecision {
    /// Whether this decision is an alert condition
    pub fn is_exceeded(&self) -> bool {
        matches!(self, Self::Exceeded { .. })
    }

    /// The sample that was evaluated
    pub fn sample(&self) -> &PriceSample {
        match self {
            Self::Normal { sample, .. } | Self::Exceeded { sample, .. } => sample,
        }
    }

    /// The threshold the sample was compared against
    pub fn threshold(&self) -> Decimal {
        match self {
            Self::Normal { threshold, .. } | Self::Exceeded { threshold, .. } => *threshold,
        }
    }
}
