//! Service configuration.
//!
//! Loaded by the binary; every struct here deserializes from any format the `config`
//! crate understands.

use crate::calendar::TradeDatePolicy;
use crate::delivery::UploadMethod;
use crate::error::{Result, UploadError};
use chrono::NaiveDate;
use log::Level;
use pricing::Environment;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploaderSettings {
    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,
    #[serde(default)]
    pub uploader: UploadSettings,
    #[serde(default)]
    pub sources: Vec<SourceSettings>,
    #[serde(default)]
    pub destinations: Vec<DestinationSettings>,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

fn default_polling_interval_secs() -> u64 {
    60
}

impl UploaderSettings {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    /// Rejects configurations the service must not start with.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(UploadError::Config(
                "Please configure at least one input source".to_string(),
            ));
        }
        if let Some(source) = self
            .sources
            .iter()
            .find(|s| s.kind.reads_files() && s.input_directory.as_os_str().is_empty())
        {
            return Err(UploadError::Config(format!(
                "Please specify an input directory for the {:?} source",
                source.kind
            )));
        }
        validate_destinations(&self.destinations)
    }
}

/// Checks the destination set: at least one, distinct environments, exactly one
/// primary, usable chunk sizes.
pub fn validate_destinations(destinations: &[DestinationSettings]) -> Result<()> {
    if destinations.is_empty() {
        return Err(UploadError::Config(
            "Please specify at least one pricing endpoint to connect to".to_string(),
        ));
    }

    let distinct: HashSet<Environment> = destinations.iter().map(|d| d.environment).collect();
    if distinct.len() != destinations.len() {
        let all: Vec<String> = destinations
            .iter()
            .map(|d| d.environment.to_string())
            .collect();
        return Err(UploadError::Config(format!(
            "Duplicate pricing endpoint environments in config: {}",
            all.join(",")
        )));
    }

    let primaries = destinations.iter().filter(|d| d.is_primary).count();
    if primaries != 1 {
        return Err(UploadError::Config(
            "Please mark exactly one pricing endpoint as is_primary=true".to_string(),
        ));
    }

    if let Some(d) = destinations.iter().find(|d| d.chunk_size == 0) {
        return Err(UploadError::Config(format!(
            "Chunk size for {} must be at least 1",
            d.environment
        )));
    }
    Ok(())
}

/// Knobs shared by every source and destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_pricing_group")]
    pub default_pricing_group: String,
    #[serde(default = "default_trade_date_policy")]
    pub trade_date_policy: TradeDatePolicy,
    #[serde(default)]
    pub force_upload_old_trade_dates: bool,
    #[serde(default = "default_true")]
    pub mark_processed_once_uploaded: bool,
    /// 0 disables.
    #[serde(default)]
    pub records_to_skip: usize,
    /// 0 disables.
    #[serde(default)]
    pub max_records: usize,
    /// 0 disables.
    #[serde(default)]
    pub wait_between_batches_ms: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            default_pricing_group: default_pricing_group(),
            trade_date_policy: default_trade_date_policy(),
            force_upload_old_trade_dates: false,
            mark_processed_once_uploaded: true,
            records_to_skip: 0,
            max_records: 0,
            wait_between_batches_ms: 0,
        }
    }
}

impl UploadSettings {
    pub fn wait_between_batches(&self) -> Duration {
        Duration::from_millis(self.wait_between_batches_ms)
    }
}

fn default_pricing_group() -> String {
    "Settlement".to_string()
}

fn default_trade_date_policy() -> TradeDatePolicy {
    TradeDatePolicy::AsInFile
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    IceDatFile,
    NymexOptionFile,
    /// Fixed in-memory prices, no input directory needed.
    Demo,
}

impl SourceKind {
    pub fn reads_files(self) -> bool {
        !matches!(self, SourceKind::Demo)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub kind: SourceKind,
    #[serde(default)]
    pub input_directory: PathBuf,
    #[serde(default = "default_file_read_retry_attempts")]
    pub file_read_retry_attempts: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    /// Overrides the feed's own file pattern.
    #[serde(default)]
    pub file_pattern: Option<String>,
}

impl SourceSettings {
    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }
}

fn default_file_read_retry_attempts() -> u32 {
    5
}

fn default_initial_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationSettings {
    pub environment: Environment,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub upload_method: UploadMethod,
    #[serde(default = "default_connection_failure_retry_count")]
    pub connection_failure_retry_count: u32,
    #[serde(default = "default_transient_retry_delay_ms")]
    pub transient_retry_delay_ms: u64,
    #[serde(default = "default_unavailable_retry_delay_ms")]
    pub unavailable_retry_delay_ms: u64,
    /// Case-insensitive message fragments meaning the endpoint is down for a while.
    #[serde(default = "default_unavailable_errors")]
    pub unavailable_errors: Vec<String>,
    /// Case-insensitive message fragments meaning a rejected price can be dropped quietly.
    #[serde(default = "default_ignorable_errors")]
    pub ignorable_errors: Vec<String>,
    /// Messages logged for this destination are never more severe than this.
    #[serde(
        default = "default_max_log_level",
        deserialize_with = "deserialize_level"
    )]
    pub max_log_level: Level,
    #[serde(default)]
    pub endpoint: EndpointSettings,
}

impl DestinationSettings {
    pub fn new(environment: Environment, is_primary: bool) -> Self {
        Self {
            environment,
            is_primary,
            chunk_size: default_chunk_size(),
            upload_method: UploadMethod::default(),
            connection_failure_retry_count: default_connection_failure_retry_count(),
            transient_retry_delay_ms: default_transient_retry_delay_ms(),
            unavailable_retry_delay_ms: default_unavailable_retry_delay_ms(),
            unavailable_errors: default_unavailable_errors(),
            ignorable_errors: default_ignorable_errors(),
            max_log_level: default_max_log_level(),
            endpoint: EndpointSettings::default(),
        }
    }

    pub fn transient_retry_delay(&self) -> Duration {
        Duration::from_millis(self.transient_retry_delay_ms)
    }

    pub fn unavailable_retry_delay(&self) -> Duration {
        Duration::from_millis(self.unavailable_retry_delay_ms)
    }
}

fn default_chunk_size() -> usize {
    100
}

fn default_connection_failure_retry_count() -> u32 {
    3
}

fn default_transient_retry_delay_ms() -> u64 {
    5_000
}

fn default_unavailable_retry_delay_ms() -> u64 {
    300_000
}

fn default_unavailable_errors() -> Vec<String> {
    vec![
        "aspect is currently loading and optimizing its internal structures, please wait for a moment and try again".to_string(),
        "the request failed with http status 404: not found".to_string(),
        "the remote name could not be resolved".to_string(),
    ]
}

fn default_ignorable_errors() -> Vec<String> {
    vec![
        "Cannot upload option price after contract expiration".to_string(),
        "Cannot upload prices for days after option expiration".to_string(),
    ]
}

fn default_max_log_level() -> Level {
    Level::Trace
}

/// Accepts any casing ("warn", "Warn", "WARN").
fn deserialize_level<'de, D>(deserializer: D) -> std::result::Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Level::from_str(&name).map_err(|_| {
        de::Error::custom(format!(
            "unknown log level {:?}, expected one of trace, debug, info, warn, error",
            name
        ))
    })
}

/// The paper endpoint behind a destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// JSON array of instruments served as the catalog.
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Write summary messages to the log.
    #[serde(default = "default_true")]
    pub log: bool,
    /// Only report deliveries to the primary destination.
    #[serde(default)]
    pub primary_only: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            log: true,
            primary_only: false,
        }
    }
}
