//! EC2 spot price history client

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{PollOutcome, PriceSample, ResourceId, UnavailableReason};

use super::sigv4::{self, AwsCredentials, GetRequest};
use super::PriceSource;

const API_VERSION: &str = "2016-11-15";
const SERVICE: &str = "ec2";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Error codes EC2 uses for credential problems
const AUTH_ERROR_CODES: &[&str] = &[
    "AuthFailure",
    "UnauthorizedOperation",
    "SignatureDoesNotMatch",
    "InvalidClientTokenId",
    "OptInRequired",
];

static HISTORY_SET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<spotPriceHistorySet>(.*?)</spotPriceHistorySet>").expect("valid regex")
});
static ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<item>(.*?)</item>").expect("valid regex"));
static SPOT_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<spotPrice>(.*?)</spotPrice>").expect("valid regex"));
static TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<timestamp>([^<]*)</timestamp>").expect("valid regex"));
static ERROR_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<Code>([^<]*)</Code>").expect("valid regex"));
static ERROR_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<Message>(.*?)</Message>").expect("valid regex"));

/// Reads the newest spot price through `DescribeSpotPriceHistory`
pub struct Ec2SpotPriceSource {
    client: Client,
    credentials: AwsCredentials,
    region: String,
    endpoint: Url,
}

impl Ec2SpotPriceSource {
    /// Create a client for the regional EC2 endpoint
    pub fn new(credentials: AwsCredentials, region: impl Into<String>) -> Result<Self> {
        let region = region.into();
        let endpoint = format!("https://ec2.{region}.amazonaws.com/");
        Self::with_endpoint(credentials, region, &endpoint)
    }

    /// Create a client against an explicit endpoint
    pub fn with_endpoint(
        credentials: AwsCredentials,
        region: impl Into<String>,
        endpoint: &str,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("invalid EC2 endpoint {endpoint:?}: {e}")))?;
        if endpoint.host_str().is_none() {
            return Err(Error::config(format!("EC2 endpoint {endpoint} has no host")));
        }

        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self {
            client,
            credentials,
            region: region.into(),
            endpoint,
        })
    }

    /// Region requests are signed for
    pub fn region(&self) -> &str {
        &self.region
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    async fn describe_spot_price_history(
        &self,
        resource: &ResourceId,
    ) -> std::result::Result<String, UnavailableReason> {
        let now = Utc::now();
        let query = history_query(resource, now);
        let host = self.host();

        let signed = sigv4::sign_get(
            &self.credentials,
            &GetRequest {
                host: &host,
                path: self.endpoint.path(),
                query: &query,
                region: &self.region,
                service: SERVICE,
            },
            now,
        );

        let mut url = self.endpoint.clone();
        url.set_query(Some(&query));

        let mut request = self
            .client
            .get(url)
            .header("x-amz-date", &signed.amz_date)
            .header("authorization", &signed.authorization);
        if let Some(token) = &signed.security_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UnavailableReason::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UnavailableReason::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        Ok(body)
    }
}

#[async_trait]
impl PriceSource for Ec2SpotPriceSource {
    async fn fetch_current_price(&self, resource: &ResourceId) -> PollOutcome {
        let result = match self.describe_spot_price_history(resource).await {
            Ok(body) => parse_spot_price_history(&body).map(PriceSample::now),
            Err(reason) => Err(reason),
        };

        if let Err(reason) = &result {
            warn!(resource = %resource, reason = %reason, "Spot price not available");
        }

        result.into()
    }
}

/// Query parameters for the single newest price of one resource
///
/// Equal start and end times return only the most recent entry.
fn history_query(resource: &ResourceId, now: chrono::DateTime<Utc>) -> String {
    let instant = now.to_rfc3339_opts(SecondsFormat::Secs, true);

    sigv4::canonical_query(&[
        ("Action", "DescribeSpotPriceHistory".to_string()),
        ("Version", API_VERSION.to_string()),
        ("InstanceType.1", resource.instance_type.clone()),
        ("AvailabilityZone", resource.availability_zone.clone()),
        ("ProductDescription.1", resource.product_description.clone()),
        ("MaxResults", "1".to_string()),
        ("StartTime", instant.clone()),
        ("EndTime", instant),
    ])
}

/// Extract the newest price from a `DescribeSpotPriceHistory` response body
pub fn parse_spot_price_history(body: &str) -> std::result::Result<Decimal, UnavailableReason> {
    let item = HISTORY_SET
        .captures(body)
        .and_then(|set| ITEM.captures(set.get(1).map_or("", |m| m.as_str())))
        .and_then(|item| item.get(1))
        .map(|m| m.as_str())
        .ok_or(UnavailableReason::EmptyHistory)?;

    let raw = SPOT_PRICE
        .captures(item)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .ok_or(UnavailableReason::MissingPrice)?;

    if let Some(ts) = TIMESTAMP.captures(item).and_then(|c| c.get(1)) {
        debug!(spot_price = raw, effective_at = ts.as_str(), "Newest spot price entry");
    }

    match Decimal::from_str(raw) {
        Ok(price) if !price.is_sign_negative() => Ok(price),
        _ => Err(UnavailableReason::InvalidPrice(raw.to_string())),
    }
}

fn classify_error(status: StatusCode, body: &str) -> UnavailableReason {
    let code = ERROR_CODE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let message = ERROR_MESSAGE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    let is_auth = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || AUTH_ERROR_CODES.contains(&code.as_str());

    if is_auth {
        let detail = if code.is_empty() {
            message
        } else {
            format!("{code}: {message}")
        };
        UnavailableReason::Auth(detail)
    } else {
        UnavailableReason::Upstream {
            status: status.as_u16(),
            code,
            message,
        }
    }
}
