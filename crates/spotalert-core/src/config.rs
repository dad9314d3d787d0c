//! Configuration management for SpotAlert

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::ResourceId;

/// Shortest allowed pause between polls
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Prefix for environment overrides (`SPOTALERT_MONITOR__THRESHOLD=3.1`)
pub const ENV_PREFIX: &str = "SPOTALERT";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Monitored resource
    pub resource: ResourceConfig,

    /// Polling and threshold settings
    pub monitor: MonitorConfig,

    /// Notification channel
    pub notify: NotifyConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Resource configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// EC2 instance type
    pub instance_type: String,
    /// Availability zone
    pub availability_zone: String,
    /// Product description
    pub product_description: String,
    /// EC2 region; derived from the zone when unset
    pub region: Option<String>,
    /// EC2 endpoint override
    pub endpoint: Option<String>,
    /// Shared credentials profile
    pub profile: Option<String>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        let resource = ResourceId::default();
        Self {
            instance_type: resource.instance_type,
            availability_zone: resource.availability_zone,
            product_description: resource.product_description,
            region: None,
            endpoint: None,
            profile: None,
        }
    }
}

/// Monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Alert when the price is strictly above this
    pub threshold: Decimal,
    /// Seconds between polls, raised to at least 60
    pub poll_interval_secs: f64,
    /// Keep polling until interrupted
    pub loop_enabled: bool,
    /// Send alerts through the notification channel
    pub alert_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: Decimal::new(280, 2),
            poll_interval_secs: 300.0,
            loop_enabled: false,
            alert_enabled: false,
        }
    }
}

/// Notification channel kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Twilio SMS
    #[default]
    Sms,
    /// Generic JSON webhook
    Webhook,
}

/// Notification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Which channel delivers alerts
    pub channel: Channel,
    /// Twilio credentials file; `~/.twilio/twilio_config.yaml` when unset
    pub twilio_config: Option<PathBuf>,
    /// Webhook destination
    pub webhook_url: Option<String>,
    /// Extra headers sent with every webhook call
    pub webhook_headers: HashMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load defaults, then an optional file, then `SPOTALERT_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::config(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// The monitored resource
    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(
            &self.resource.instance_type,
            &self.resource.availability_zone,
            &self.resource.product_description,
        )
    }

    /// EC2 region, explicit or derived from the availability zone
    pub fn region(&self) -> Result<String> {
        if let Some(region) = self.resource.region.as_deref().filter(|r| !r.is_empty()) {
            return Ok(region.to_string());
        }

        self.resource_id()
            .region()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::config(format!(
                    "cannot derive a region from availability zone {:?}; set resource.region",
                    self.resource.availability_zone
                ))
            })
    }

    /// Validated, immutable settings for the poll loop
    pub fn poll_settings(&self) -> Result<PollSettings> {
        let interval = Duration::try_from_secs_f64(self.monitor.poll_interval_secs.max(0.0))
            .map_err(|e| {
                Error::validation(format!(
                    "poll interval {} is not a valid duration: {e}",
                    self.monitor.poll_interval_secs
                ))
            })?;

        PollSettings::new(
            self.resource_id(),
            self.monitor.threshold,
            interval,
            self.monitor.loop_enabled,
            self.monitor.alert_enabled,
        )
    }
}

/// Settings the poll loop runs with; fixed for the life of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    resource: ResourceId,
    threshold: Decimal,
    poll_interval: Duration,
    loop_enabled: bool,
    alert_enabled: bool,
}

impl PollSettings {
    /// Validate the threshold and clamp the interval to [`MIN_POLL_INTERVAL`]
    pub fn new(
        resource: ResourceId,
        threshold: Decimal,
        poll_interval: Duration,
        loop_enabled: bool,
        alert_enabled: bool,
    ) -> Result<Self> {
        if threshold <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "threshold must be positive, got {threshold}"
            )));
        }
        if resource.instance_type.is_empty()
            || resource.availability_zone.is_empty()
            || resource.product_description.is_empty()
        {
            return Err(Error::validation(format!(
                "resource is incomplete: {resource}"
            )));
        }

        Ok(Self {
            resource,
            threshold,
            poll_interval: clamp_poll_interval(poll_interval),
            loop_enabled,
            alert_enabled,
        })
    }

    /// Monitored resource
    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    /// Alert threshold
    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Effective interval, never below [`MIN_POLL_INTERVAL`]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Keep polling after the first cycle
    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    /// Send alerts through the sink
    pub fn alert_enabled(&self) -> bool {
        self.alert_enabled
    }
}

/// Raise an interval to the minimum
pub fn clamp_poll_interval(interval: Duration) -> Duration {
    interval.max(MIN_POLL_INTERVAL)
}
