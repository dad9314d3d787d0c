//! Wiring of collaborators from configuration

use std::sync::Arc;
use tracing::info;

use crate::alerting::{AlertSink, TwilioSmsSink, WebhookSink};
use crate::config::{Channel, Config, PollSettings};
use crate::credentials::{self, process_env};
use crate::error::{Error, Result};
use crate::models::format_price;
use crate::source::{Ec2SpotPriceSource, PriceSource};

/// Build the EC2 price source with credentials from the environment or `~/.aws`
pub fn build_price_source(config: &Config) -> Result<Arc<dyn PriceSource>> {
    let credentials_file = match process_env("AWS_SHARED_CREDENTIALS_FILE") {
        Some(path) => path.into(),
        None => credentials::default_aws_credentials_path()?,
    };
    let aws = credentials::load_aws_credentials(
        &credentials_file,
        config.resource.profile.as_deref(),
        process_env,
    )?;
    let region = config.region()?;

    let source = match config.resource.endpoint.as_deref() {
        Some(endpoint) => Ec2SpotPriceSource::with_endpoint(aws, &region, endpoint)?,
        None => Ec2SpotPriceSource::new(aws, &region)?,
    };

    info!(region = %region, "EC2 price source ready");
    Ok(Arc::new(source))
}

/// Build the notification channel, or `None` when alerting is disabled
pub fn build_alert_sink(config: &Config) -> Result<Option<Arc<dyn AlertSink>>> {
    if !config.monitor.alert_enabled {
        return Ok(None);
    }

    let sink: Arc<dyn AlertSink> = match config.notify.channel {
        Channel::Sms => {
            let path = match &config.notify.twilio_config {
                Some(path) => path.clone(),
                None => credentials::default_twilio_config_path()?,
            };
            let twilio = credentials::load_twilio_credentials(&path, process_env)?;
            Arc::new(TwilioSmsSink::new(twilio)?)
        }
        Channel::Webhook => {
            let url = config
                .notify
                .webhook_url
                .as_deref()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    Error::config("webhook channel selected but notify.webhook_url is not set")
                })?;
            Arc::new(WebhookSink::new(url, config.notify.webhook_headers.clone())?)
        }
    };

    info!(channel = sink.channel(), "Notification channel ready");
    Ok(Some(sink))
}

/// Lines printed once before the first poll
pub fn startup_banner(settings: &PollSettings, sink: Option<&dyn AlertSink>) -> Vec<String> {
    let mut lines = vec![format!("Alert enabled: {}", settings.alert_enabled())];

    if let Some(sink) = sink.filter(|_| settings.alert_enabled()) {
        lines.push(format!("Alert destination ({}): {}", sink.channel(), sink.destination()));
    }

    lines.push(format!("Alert threshold: ${}", format_price(settings.threshold())));
    lines.push(format!("Loop: {}", settings.loop_enabled()));
    lines.push(format!(
        "Loop delay: {}",
        humantime::format_duration(settings.poll_interval())
    ));
    lines.push(format!("Resource: {}", settings.resource()));
    lines.push(String::new());
    lines
}
