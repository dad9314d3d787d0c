//! Price sources
//!
//! A price source answers one question per cycle: what does the monitored
//! resource cost right now. Failures come back as
//! [`PollOutcome::Unavailable`]; nothing here retries.

mod ec2;
pub mod sigv4;

pub use ec2::{parse_spot_price_history, Ec2SpotPriceSource};
pub use sigv4::AwsCredentials;

use async_trait::async_trait;

use crate::models::{PollOutcome, ResourceId};

/// Remote provider of the current price for one resource
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the newest price
    async fn fetch_current_price(&self, resource: &ResourceId) -> PollOutcome;
}
