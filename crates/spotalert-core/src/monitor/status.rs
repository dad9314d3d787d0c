//! Status and alert line formatting

use chrono::{DateTime, Local};

use crate::models::{format_price, format_timestamp, AlertDecision, ResourceId, UnavailableReason};

/// Alert text handed to the notification channel
pub fn alert_message(resource: &ResourceId, decision: &AlertDecision) -> String {
    let sample = decision.sample();
    format!(
        "Alert! {} price: ${} > ${} @ {}",
        resource,
        format_price(sample.value),
        format_price(decision.threshold()),
        sample.local_timestamp()
    )
}

/// Status line for an evaluated sample
pub fn decision_line(resource: &ResourceId, decision: &AlertDecision) -> String {
    let sample = decision.sample();
    let at = sample.local_timestamp();
    let price = format_price(sample.value);

    if decision.is_exceeded() {
        format!(
            "{at} Alert! {resource} price: ${price} > ${}",
            format_price(decision.threshold())
        )
    } else {
        format!("{at} {resource} price: ${price}")
    }
}

/// Status line announcing a delivery
pub fn sending_line(message: &str, at: &DateTime<Local>) -> String {
    format!("{} Sending alert: '{message}'", format_timestamp(at))
}

/// Status line for a cycle without a price
pub fn unavailable_line(reason: &UnavailableReason, at: &DateTime<Local>) -> String {
    format!("{} Price not available: {reason}", format_timestamp(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::evaluate;
    use crate::models::PriceSample;
    use rust_decimal_macros::dec;

    #[test]
    fn test_alert_message_contains_prices() {
        let resource = ResourceId::default();
        let decision = evaluate(PriceSample::now(dec!(3.00)), dec!(2.80));

        let message = alert_message(&resource, &decision);

        assert!(message.starts_with("Alert! r3.8xlarge (us-west-2b, Linux/UNIX) price: $3.0 > $2.8 @ "));
        assert!(message.ends_with("AM") || message.ends_with("PM"));
    }

    #[test]
    fn test_decision_lines() {
        let resource = ResourceId::default();

        let normal = decision_line(&resource, &evaluate(PriceSample::now(dec!(0.9254)), dec!(2.8)));
        assert!(normal.ends_with(" r3.8xlarge (us-west-2b, Linux/UNIX) price: $0.9254"));

        let exceeded = decision_line(&resource, &evaluate(PriceSample::now(dec!(3.1)), dec!(2.8)));
        assert!(exceeded.ends_with(" Alert! r3.8xlarge (us-west-2b, Linux/UNIX) price: $3.1 > $2.8"));
    }

    #[test]
    fn test_unavailable_line() {
        let line = unavailable_line(&UnavailableReason::EmptyHistory, &Local::now());
        assert!(line.ends_with(" Price not available: price history is empty"));
    }
}
