//! Credential loading for the price source and the SMS channel

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::alerting::TwilioCredentials;
use crate::error::{Error, Result};
use crate::source::AwsCredentials;

/// Read credentials from the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn home_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or_else(|| Error::config("cannot determine the home directory"))
}

/// Default location of the Twilio credentials file
pub fn default_twilio_config_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".twilio").join("twilio_config.yaml"))
}

/// Default location of the shared AWS credentials file
pub fn default_aws_credentials_path() -> Result<PathBuf> {
    Ok(home_dir()?.join(".aws").join("credentials"))
}

#[derive(Debug, Default, Deserialize)]
struct TwilioFile {
    #[serde(default, alias = "TwilioAccount", alias = "twilioaccount")]
    account: String,
    #[serde(default, alias = "TwilioAuthToken", alias = "twilioauthtoken")]
    auth_token: String,
    #[serde(default, alias = "FromNumber", alias = "fromnumber")]
    from_number: String,
    #[serde(default, alias = "ToNumber", alias = "tonumber")]
    to_number: String,
}

/// Load Twilio credentials from a YAML file, with `TWILIO_*` environment overrides
///
/// Every value is required; the error names the first one missing.
pub fn load_twilio_credentials(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<TwilioCredentials> {
    let file = if path.exists() {
        config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .build()?
            .try_deserialize::<TwilioFile>()?
    } else {
        debug!(path = %path.display(), "Twilio config file not found, using environment only");
        TwilioFile::default()
    };

    let require = |key: &str, env_key: &str, from_file: String| -> Result<String> {
        env(env_key)
            .or_else(|| Some(from_file).filter(|v| !v.trim().is_empty()))
            .map(|v| v.trim().to_string())
            .ok_or_else(|| {
                Error::config(format!(
                    "{key} value not found in {} (or {env_key})",
                    path.display()
                ))
            })
    };

    Ok(TwilioCredentials {
        account_sid: require("TwilioAccount", "TWILIO_ACCOUNT_SID", file.account)?,
        auth_token: require("TwilioAuthToken", "TWILIO_AUTH_TOKEN", file.auth_token)?,
        from_number: require("FromNumber", "TWILIO_FROM_NUMBER", file.from_number)?,
        to_number: require("ToNumber", "TWILIO_TO_NUMBER", file.to_number)?,
    })
}

#[derive(Debug, Default, Deserialize)]
struct AwsProfile {
    aws_access_key_id: Option<String>,
    aws_secret_access_key: Option<String>,
    aws_session_token: Option<String>,
}

/// Resolve AWS credentials: environment first, then the shared credentials file
pub fn load_aws_credentials(
    credentials_file: &Path,
    profile: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AwsCredentials> {
    if let (Some(access_key_id), Some(secret_access_key)) =
        (env("AWS_ACCESS_KEY_ID"), env("AWS_SECRET_ACCESS_KEY"))
    {
        debug!("Using AWS credentials from the environment");
        return Ok(AwsCredentials {
            access_key_id,
            secret_access_key,
            session_token: env("AWS_SESSION_TOKEN"),
        });
    }

    let profile_name = profile
        .map(str::to_string)
        .or_else(|| env("AWS_PROFILE"))
        .unwrap_or_else(|| "default".to_string());

    if !credentials_file.exists() {
        return Err(Error::config(format!(
            "no AWS credentials in the environment and {} does not exist",
            credentials_file.display()
        )));
    }

    let mut profiles = config::Config::builder()
        .add_source(config::File::from(credentials_file).format(config::FileFormat::Ini))
        .build()?
        .try_deserialize::<HashMap<String, AwsProfile>>()?;

    let entry = profiles.remove(&profile_name).ok_or_else(|| {
        Error::config(format!(
            "profile [{profile_name}] not found in {}",
            credentials_file.display()
        ))
    })?;

    match (entry.aws_access_key_id, entry.aws_secret_access_key) {
        (Some(access_key_id), Some(secret_access_key))
            if !access_key_id.is_empty() && !secret_access_key.is_empty() =>
        {
            debug!(profile = %profile_name, "Using AWS credentials from shared credentials file");
            Ok(AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token: entry.aws_session_token.filter(|t| !t.is_empty()),
            })
        }
        _ => Err(Error::config(format!(
            "profile [{profile_name}] in {} lacks aws_access_key_id or aws_secret_access_key",
            credentials_file.display()
        ))),
    }
}
