use std::{fmt, str::FromStr, time::Duration};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::error::{ConnectorError, Result};

pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_PARALLELISM: usize = 16;
pub const MAX_BLOCK_SIZE: usize = 4000 * 1024 * 1024;
pub const MAX_PARALLELISM: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Upload,
    List,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Upload => "upload",
            Method::List => "list",
        }
    }
}

impl FromStr for Method {
    type Err = ConnectorError;

    /// Matching is case-sensitive.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upload" => Ok(Method::Upload),
            "list" => Ok(Method::List),
            other => Err(ConnectorError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Block size and fan-out used when streaming a file into a block blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTuning {
    block_size: usize,
    parallelism: usize,
}

impl UploadTuning {
    pub fn new(block_size: usize, parallelism: usize) -> Result<Self> {
        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(ConnectorError::InvalidConfig(format!(
                "block_size must be between 1 and {} bytes, got {}",
                MAX_BLOCK_SIZE, block_size
            )));
        }

        if parallelism == 0 || parallelism > MAX_PARALLELISM {
            return Err(ConnectorError::InvalidConfig(format!(
                "parallelism must be between 1 and {}, got {}",
                MAX_PARALLELISM, parallelism
            )));
        }

        Ok(Self {
            block_size,
            parallelism,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }
}

impl Default for UploadTuning {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Page size hint sent with every segment request. `None` leaves it to
    /// the service.
    pub max_results: Option<u32>,
}

impl ListOptions {
    /// The service rejects a zero page size, so it is refused here.
    pub fn new(max_results: Option<u32>) -> Result<Self> {
        if max_results == Some(0) {
            return Err(ConnectorError::InvalidConfig(
                "max_results must be at least 1".to_string(),
            ));
        }

        Ok(Self { max_results })
    }
}

/// Settings as the host declares them. Keys match the host's metadata names.
#[derive(Deserialize)]
struct RawSettings {
    azure_storage_account: String,
    azure_storage_access_key: String,
    method: String,
    container_name: String,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    block_size: Option<usize>,
    #[serde(default)]
    parallelism: Option<usize>,
    #[serde(default)]
    max_results: Option<u32>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Everything a connector instance needs, fixed at construction.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub account: String,
    pub access_key: String,
    pub container_name: String,
    pub method: Method,
    /// Overrides `https://{account}.blob.core.windows.net`, e.g. for an emulator.
    pub endpoint: Option<String>,
    pub tuning: UploadTuning,
    pub list: ListOptions,
    /// Per-invocation deadline. `None` means calls may block indefinitely.
    pub timeout: Option<Duration>,
}

impl ConnectionSettings {
    pub fn new(account: &str, access_key: &str, container_name: &str, method: &str) -> Result<Self> {
        let method = method.parse::<Method>()?;

        if container_name.is_empty() {
            return Err(ConnectorError::InvalidConfig(
                "container_name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            account: account.to_string(),
            access_key: access_key.to_string(),
            container_name: container_name.to_string(),
            method,
            endpoint: None,
            tuning: UploadTuning::default(),
            list: ListOptions::default(),
            timeout: None,
        })
    }

    /// Builds settings from the host's generic key/value map.
    pub fn from_map(values: &Map<String, Value>) -> Result<Self> {
        let raw: RawSettings = serde_json::from_value(Value::Object(values.clone()))
            .map_err(|err| ConnectorError::InvalidConfig(err.to_string()))?;

        let tuning = UploadTuning::new(
            raw.block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
            raw.parallelism.unwrap_or(DEFAULT_PARALLELISM),
        )?;

        let mut settings = Self::new(
            &raw.azure_storage_account,
            &raw.azure_storage_access_key,
            &raw.container_name,
            &raw.method,
        )?
        .with_tuning(tuning)
        .with_list_options(ListOptions::new(raw.max_results)?);

        if let Some(endpoint) = raw.endpoint.filter(|e| !e.is_empty()) {
            settings = settings.with_endpoint(&endpoint);
        }

        if let Some(secs) = raw.timeout_secs {
            settings = settings.with_timeout(Duration::from_secs(secs));
        }

        Ok(settings)
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_tuning(mut self, tuning: UploadTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_list_options(mut self, list: ListOptions) -> Self {
        self.list = list;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("account", &self.account)
            .field("access_key", &"<redacted>")
            .field("container_name", &self.container_name)
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("tuning", &self.tuning)
            .field("list", &self.list)
            .field("timeout", &self.timeout)
            .finish()
    }
}
