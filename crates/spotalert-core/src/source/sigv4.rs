//! AWS Signature Version 4 request signing
//!
//! Only what the EC2 Query API needs: bodiless GET requests whose parameters
//! travel in the query string.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// AWS access key pair, optionally with a session token
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    /// Access key id (`AKIA...`)
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token for temporary credentials
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Headers to attach to a signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `Authorization` header value
    pub authorization: String,
    /// `X-Amz-Date` header value
    pub amz_date: String,
    /// `X-Amz-Security-Token` header value, when signing with a session token
    pub security_token: Option<String>,
}

/// A GET request about to be signed
#[derive(Debug, Clone)]
pub struct GetRequest<'a> {
    /// Host header value, including a non-default port
    pub host: &'a str,
    /// Absolute path, already URI-encoded
    pub path: &'a str,
    /// Already canonical query string (see [`canonical_query`])
    pub query: &'a str,
    /// Region in the credential scope
    pub region: &'a str,
    /// Service name in the credential scope (`ec2`)
    pub service: &'a str,
}

/// Build a canonical query string: RFC 3986 encoded and sorted by key
pub fn canonical_query(params: &[(&str, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    encoded.sort();

    encoded
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Derive the per-day signing key
pub fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Sign a GET request at the given instant
pub fn sign_get(credentials: &AwsCredentials, request: &GetRequest<'_>, at: DateTime<Utc>) -> SignedHeaders {
    let amz_date = at.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = at.format("%Y%m%d").to_string();

    let (canonical, signed_headers) =
        canonical_request(request, &amz_date, credentials.session_token.as_deref());

    let scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, request.region, request.service
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );

    let key = signing_key(
        &credentials.secret_access_key,
        &date_stamp,
        request.region,
        request.service,
    );
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
        amz_date,
        security_token: credentials.session_token.clone(),
    }
}

/// Canonical request text and the matching `SignedHeaders` list
fn canonical_request(
    request: &GetRequest<'_>,
    amz_date: &str,
    session_token: Option<&str>,
) -> (String, String) {
    let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", request.host, amz_date);
    let mut signed_headers = String::from("host;x-amz-date");
    if let Some(token) = session_token {
        canonical_headers.push_str(&format!("x-amz-security-token:{token}\n"));
        signed_headers.push_str(";x-amz-security-token");
    }

    let payload_hash = hex::encode(Sha256::digest(b""));
    let canonical = format!(
        "GET\n{}\n{}\n{}\n{}\n{}",
        request.path, request.query, canonical_headers, signed_headers, payload_hash
    );
    (canonical, signed_headers)
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
