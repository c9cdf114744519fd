//! Process settings read once at startup from the environment.
//!
//! Every required variable must be present and non-blank; a run never starts
//! with partial configuration.

use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::result::ErrorPolicy;

pub const BASE_URL: &str = "BASE_URL";
pub const S3_BUCKET_NAME: &str = "S3_BUCKET_NAME";
pub const OUTPUT_FOLDER: &str = "OUTPUT_FOLDER";
pub const FROM_EMAIL: &str = "FROM_EMAIL";
pub const TO_EMAILS_LIST: &str = "TO_EMAILS_LIST";
pub const SES_CONFIG_SET_NAME: &str = "SES_CONFIG_SET_NAME";
pub const REPORT_TITLE: &str = "REPORT_TITLE";
pub const ERROR_POLICY: &str = "ERROR_POLICY";

pub const DEFAULT_REPORT_TITLE: &str = "Weekly CMS Provider Data Download Results";

/// Startup configuration is missing or unusable. Fatal: the run never starts.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {0} is set but empty")]
    Empty(&'static str),

    #[error("TO_EMAILS_LIST does not contain any recipient address")]
    NoRecipients,

    #[error("BASE_URL {value:?} is not an absolute URL: {source}")]
    InvalidBaseUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("ERROR_POLICY: {0}")]
    InvalidErrorPolicy(String),
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub bucket: String,
    pub staging_root: PathBuf,
    pub sender: String,
    pub recipients: Vec<String>,
    pub ses_configuration_set: String,
    pub report_title: String,
    pub error_policy: ErrorPolicy,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key/value source. Used by [`Settings::from_env`] and by tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigurationError> {
            let value = lookup(key).ok_or(ConfigurationError::Missing(key))?;
            let value = value.trim().to_string();
            if value.is_empty() {
                return Err(ConfigurationError::Empty(key));
            }
            Ok(value)
        };

        let base_url = required(BASE_URL)?;
        url::Url::parse(&base_url).map_err(|source| ConfigurationError::InvalidBaseUrl {
            value: base_url.clone(),
            source,
        })?;

        let recipients = parse_recipients(&required(TO_EMAILS_LIST)?);
        if recipients.is_empty() {
            return Err(ConfigurationError::NoRecipients);
        }

        let report_title = lookup(REPORT_TITLE)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_REPORT_TITLE.to_string());

        let error_policy = match lookup(ERROR_POLICY).filter(|p| !p.trim().is_empty()) {
            Some(raw) => raw
                .parse::<ErrorPolicy>()
                .map_err(ConfigurationError::InvalidErrorPolicy)?,
            None => ErrorPolicy::default(),
        };

        let settings = Settings {
            base_url,
            bucket: required(S3_BUCKET_NAME)?,
            staging_root: PathBuf::from(required(OUTPUT_FOLDER)?),
            sender: required(FROM_EMAIL)?,
            recipients,
            ses_configuration_set: required(SES_CONFIG_SET_NAME)?,
            report_title,
            error_policy,
        };
        settings.trace_loaded();
        Ok(settings)
    }

    pub fn trace_loaded(&self) {
        info!(
            bucket = %self.bucket,
            staging_root = %self.staging_root.display(),
            recipients = self.recipients.len(),
            error_policy = ?self.error_policy,
            "Loaded settings"
        );
        debug!(settings = ?self, "Settings loaded (full debug)");
    }
}

/// Split a comma-separated address list, trimming blanks and dropping empty entries.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}
