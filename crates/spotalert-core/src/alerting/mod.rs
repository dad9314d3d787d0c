//! Alerting for SpotAlert
//!
//! Threshold evaluation and delivery of alert messages to one notification channel.

mod evaluator;
mod notifier;

pub use evaluator::{evaluate, ThresholdEvaluator};
pub use notifier::{
    AlertSink, SinkError, TwilioCredentials, TwilioSmsSink, WebhookSink, TWILIO_API_BASE,
};
