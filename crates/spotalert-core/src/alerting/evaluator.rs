//! Threshold evaluation

use rust_decimal::Decimal;

use crate::models::{AlertDecision, PriceSample};

/// Compare a sample against the threshold
///
/// Strictly greater is an alert; a price equal to the threshold is normal.
pub fn evaluate(sample: PriceSample, threshold: Decimal) -> AlertDecision {
    if sample.value > threshold {
        AlertDecision::Exceeded { sample, threshold }
    } else {
        AlertDecision::Normal { sample, threshold }
    }
}

/// Evaluator bound to a fixed threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdEvaluator {
    threshold: Decimal,
}

impl ThresholdEvaluator {
    /// Create an evaluator for the given threshold
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }

    /// The configured threshold
    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Evaluate one sample
    pub fn evaluate(&self, sample: PriceSample) -> AlertDecision {
        evaluate(sample, self.threshold)
    }
}
