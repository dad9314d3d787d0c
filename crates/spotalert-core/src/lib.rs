//! # SpotAlert
//!
//! Spot price monitor for a single EC2 resource.
//!
//! SpotAlert polls the newest spot price for one instance type, zone and
//! product, compares it with a threshold and raises an alert through one
//! notification channel whenever the price is above it.
//!
//! ## Architecture
//!
//! - **Source**: EC2 `DescribeSpotPriceHistory` client with SigV4 signing
//! - **Alerting**: threshold evaluation, SMS and webhook delivery
//! - **Monitor**: the poll-evaluate-notify loop and its status lines
//!
//! ## Quick Start
//!
//! ```bash
//! # Print the current price once
//! spotalert
//!
//! # Poll every 5 minutes, text when above $2.80
//! spotalert --loop --alert --threshold 2.80
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

pub mod alerting;
pub mod app;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod monitor;
pub mod source;

pub use config::{Config, PollSettings};
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{evaluate, AlertSink, SinkError, ThresholdEvaluator};
    pub use crate::config::{Config, PollSettings};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::monitor::{PollLoop, RunSummary};
    pub use crate::source::PriceSource;
}
