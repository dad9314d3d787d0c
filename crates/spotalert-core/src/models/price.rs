//! Price samples and poll outcomes

use chrono::{DateTime, Local, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp layout used by status lines and alert messages
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

/// One observed spot price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Price per instance-hour, never negative
    pub value: Decimal,
    /// When the price was observed
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    /// Create a sample observed now
    pub fn now(value: Decimal) -> Self {
        Self {
            value,
            observed_at: Utc::now(),
        }
    }

    /// Observation time rendered in local time
    pub fn local_timestamp(&self) -> String {
        format_timestamp(&self.observed_at.with_timezone(&Local))
    }
}

/// Why a poll produced no price
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnavailableReason {
    /// The price history came back without entries
    #[error("price history is empty")]
    EmptyHistory,

    /// The newest entry carried no price field
    #[error("price field missing from history entry")]
    MissingPrice,

    /// The price field could not be read as a non-negative decimal
    #[error("price string is invalid: {0:?}")]
    InvalidPrice(String),

    /// The request never got a response
    #[error("transport failure: {0}")]
    Transport(String),

    /// The provider refused our credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The provider answered with an error
    #[error("upstream returned {status} {code}: {message}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Error code from the response body
        code: String,
        /// Error message from the response body
        message: String,
    },
}

/// Result of one fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A price was observed
    Observed(PriceSample),
    /// No usable price this cycle
    Unavailable(UnavailableReason),
}

impl PollOutcome {
    /// The sample, if one was observed
    pub fn sample(&self) -> Option<&PriceSample> {
        match self {
            Self::Observed(sample) => Some(sample),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<Result<PriceSample, UnavailableReason>> for PollOutcome {
    fn from(result: Result<PriceSample, UnavailableReason>) -> Self {
        match result {
            Ok(sample) => Self::Observed(sample),
            Err(reason) => Self::Unavailable(reason),
        }
    }
}

/// Format a timestamp as `YYYY-MM-DD hh:mm:ss AM/PM`
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Render a price in its shortest form, keeping at least one decimal place
///
/// `3.00` becomes `3.0`, `0.925400` becomes `0.9254`.
pub fn format_price(value: Decimal) -> String {
    let normalized = value.normalize();
    if normalized.scale() == 0 {
        format!("{normalized:.1}")
    } else {
        normalized.to_string()
    }
}
