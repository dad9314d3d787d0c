//! Alert delivery

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Twilio REST API base
pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Destination for alert messages
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Short channel name for logs and the startup banner
    fn channel(&self) -> &str;

    /// Human-readable destination (phone number, URL)
    fn destination(&self) -> String;

    /// Deliver one alert line
    async fn send(&self, message: &str) -> std::result::Result<(), SinkError>;
}

/// Delivery errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The request never got a response
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with a non-success status
    #[error("{channel} rejected the message with {status}: {body}")]
    Rejected {
        /// Service name
        channel: String,
        /// HTTP status code
        status: u16,
        /// Response body, for the log
        body: String,
    },
}

/// Credentials and numbers for the Twilio SMS channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioCredentials {
    /// Account SID (`AC...`)
    pub account_sid: String,
    /// Auth token paired with the SID
    pub auth_token: String,
    /// Twilio number the SMS is sent from
    pub from_number: String,
    /// Number that receives alerts
    pub to_number: String,
}

/// Sends alerts as SMS through Twilio
pub struct TwilioSmsSink {
    client: Client,
    credentials: TwilioCredentials,
    base_url: String,
}

impl TwilioSmsSink {
    /// Create a sink against the public Twilio API
    pub fn new(credentials: TwilioCredentials) -> Result<Self> {
        Self::with_base_url(credentials, TWILIO_API_BASE)
    }

    /// Create a sink against a custom API base
    pub fn with_base_url(credentials: TwilioCredentials, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self {
            client,
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.credentials.account_sid
        )
    }
}

#[async_trait]
impl AlertSink for TwilioSmsSink {
    fn channel(&self) -> &str {
        "sms"
    }

    fn destination(&self) -> String {
        self.credentials.to_number.clone()
    }

    async fn send(&self, message: &str) -> std::result::Result<(), SinkError> {
        let form = [
            ("To", self.credentials.to_number.as_str()),
            ("From", self.credentials.from_number.as_str()),
            ("Body", message),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.credentials.account_sid,
                Some(&self.credentials.auth_token),
            )
            .form(&form)
            .send()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                channel: "Twilio".to_string(),
                status,
                body,
            });
        }

        info!(to = %self.credentials.to_number, "SMS alert sent");
        Ok(())
    }
}

/// Posts alerts to a generic (Slack-compatible) webhook
pub struct WebhookSink {
    client: Client,
    url: Url,
    headers: HashMap<String, String>,
}

impl WebhookSink {
    /// Create a webhook sink
    ///
    /// The URL must be an absolute `http` or `https` URL.
    pub fn new(url: &str, headers: HashMap<String, String>) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::config(format!("invalid webhook URL '{url}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "webhook URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self {
            client,
            url,
            headers,
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn channel(&self) -> &str {
        "webhook"
    }

    fn destination(&self) -> String {
        self.url.to_string()
    }

    async fn send(&self, message: &str) -> std::result::Result<(), SinkError> {
        let payload = WebhookPayload {
            text: message,
            source: "spotalert",
        };

        let mut request = self.client.post(self.url.clone()).json(&payload);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                channel: "Webhook".to_string(),
                status,
                body,
            });
        }

        debug!(url = %self.url, "Webhook alert sent");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
    source: &'a str,
}
