use crate::error::{Result, TapError};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment-variable configuration (`TAP_SPARKTHINK_API_ENDPOINT`, ...).
pub const ENV_PREFIX: &str = "TAP_SPARKTHINK_";

/// Complete tap configuration
#[derive(Clone, Deserialize)]
pub struct TapConfig {
    /// Auth endpoint prefix; the service account id is appended to it
    pub auth_endpoint: String,
    /// GraphQL endpoint URL
    pub api_endpoint: String,
    pub service_account_id: String,
    pub client_secret: String,
    /// Projects to extract, one partition each
    pub project_ids: ProjectIds,
    /// Page size passed to paginated queries
    #[serde(default = "default_response_batch_size")]
    pub response_batch_size: u32,
    /// Optional User-Agent header for GraphQL requests
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub auth_timeout_secs: u64,
    /// Per-page timeout for GraphQL requests
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Hard ceiling on pages fetched per partition
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub on_partition_error: FailurePolicy,
    #[serde(default)]
    pub auth_retry: RetryPolicy,
}

fn default_response_batch_size() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_pages() -> usize {
    10_000
}

/// What to do when one partition's extraction fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole run with the partition's error.
    #[default]
    Abort,
    /// Log a warning and continue with the next partition.
    Skip,
}

impl std::str::FromStr for FailurePolicy {
    type Err = TapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "skip" => Ok(FailurePolicy::Skip),
            other => Err(TapError::Config(format!(
                "on_partition_error must be 'abort' or 'skip', got '{}'",
                other
            ))),
        }
    }
}

/// Project ids, either as a delimited string (`"[id1, id2]"`, `"id1,id2"`) or a JSON array.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProjectIds {
    List(Vec<String>),
    Delimited(String),
}

impl ProjectIds {
    /// Returns the ids in configuration order, trimmed, with empty entries dropped.
    pub fn ids(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            ProjectIds::List(items) => items.iter().map(String::as_str).collect(),
            ProjectIds::Delimited(s) => s
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .collect(),
        };
        raw.into_iter()
            .map(|id| id.trim().trim_matches(|c| c == '"' || c == '\'').trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl TapConfig {
    /// Full auth URL: `<auth_endpoint><service_account_id>`.
    pub fn auth_url(&self) -> String {
        format!("{}{}", self.auth_endpoint, self.service_account_id)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks required values that serde alone cannot enforce.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("auth_endpoint", &self.auth_endpoint),
            ("api_endpoint", &self.api_endpoint),
            ("service_account_id", &self.service_account_id),
            ("client_secret", &self.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(TapError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.response_batch_size == 0 {
            return Err(TapError::Config(
                "response_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(TapError::Config(
                "max_pages must be greater than zero".to_string(),
            ));
        }
        if self.auth_retry.max_attempts == 0 {
            return Err(TapError::Config(
                "auth_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load config from `TAP_SPARKTHINK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            std::env::var(format!("{}{}", ENV_PREFIX, key))
                .map_err(|_| TapError::Config(format!("{}{} not set", ENV_PREFIX, key)))
        };
        let optional = |key: &str| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok();
        let parsed = |key: &str, default: u64| -> Result<u64> {
            match optional(key) {
                Some(v) => v.trim().parse().map_err(|_| {
                    TapError::Config(format!("{}{} must be an integer", ENV_PREFIX, key))
                }),
                None => Ok(default),
            }
        };

        let config = TapConfig {
            auth_endpoint: required("AUTH_ENDPOINT")?,
            api_endpoint: required("API_ENDPOINT")?,
            service_account_id: required("SERVICE_ACCOUNT_ID")?,
            client_secret: required("CLIENT_SECRET")?,
            project_ids: ProjectIds::Delimited(required("PROJECT_IDS")?),
            response_batch_size: narrow(
                "RESPONSE_BATCH_SIZE",
                parsed("RESPONSE_BATCH_SIZE", u64::from(default_response_batch_size()))?,
            )?,
            user_agent: optional("USER_AGENT"),
            auth_timeout_secs: parsed("AUTH_TIMEOUT_SECS", default_timeout_secs())?,
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", default_timeout_secs())?,
            max_pages: narrow("MAX_PAGES", parsed("MAX_PAGES", default_max_pages() as u64)?)?,
            on_partition_error: match optional("ON_PARTITION_ERROR") {
                Some(v) => v.parse()?,
                None => FailurePolicy::default(),
            },
            auth_retry: RetryPolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Converts a parsed env integer to the field's type, rejecting values that do not fit.
fn narrow<T: TryFrom<u64>>(key: &str, value: u64) -> Result<T> {
    T::try_from(value).map_err(|_| {
        TapError::Config(format!("{}{} is out of range: {}", ENV_PREFIX, key, value))
    })
}

// client_secret stays out of logs.
impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("auth_endpoint", &self.auth_endpoint)
            .field("api_endpoint", &self.api_endpoint)
            .field("service_account_id", &self.service_account_id)
            .field("client_secret", &"<redacted>")
            .field("project_ids", &self.project_ids)
            .field("response_batch_size", &self.response_batch_size)
            .field("user_agent", &self.user_agent)
            .field("auth_timeout_secs", &self.auth_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_pages", &self.max_pages)
            .field("on_partition_error", &self.on_partition_error)
            .field("auth_retry", &self.auth_retry)
            .finish()
    }
}

/// Load configuration from a JSON file, or TOML when the extension is `.toml`.
pub fn load_config(path: &Path) -> Result<TapConfig> {
    let contents = std::fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let config: TapConfig = if is_toml {
        toml::from_str(&contents).map_err(|e| TapError::Config(e.to_string()))?
    } else {
        serde_json::from_str(&contents)?
    };
    config.validate()?;
    Ok(config)
}
