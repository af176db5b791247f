//! Configuration file for the client.

use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE;
use crate::forwarded::{ForwardedHeaders, HeaderSource};
use crate::report::DEFAULT_HEADER_BLACKLIST;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// API key (supports ${ENV_VAR} syntax).
    pub api_key: String,

    /// API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Reverse-proxy header overrides.
    #[serde(default)]
    pub forwarded_headers: ForwardedHeadersConfig,

    /// Headers left out of activity reports (case-insensitive).
    #[serde(default = "default_header_blacklist")]
    pub header_blacklist: Vec<String>,

    /// API request timeout in milliseconds. Unset means no client timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Bundled in-memory session cache.
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_header_blacklist() -> Vec<String> {
    DEFAULT_HEADER_BLACKLIST.iter().map(|h| h.to_string()).collect()
}

/// Named forwarded-header presets.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ForwardedPreset {
    /// Not behind a proxy.
    #[default]
    None,
    /// `x-forwarded-host`, `x-forwarded-proto`, first `x-forwarded-for` entry.
    Standard,
}

/// Reverse-proxy header overrides. Header names given here replace the
/// preset's source for that field.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ForwardedHeadersConfig {
    #[serde(default)]
    pub preset: ForwardedPreset,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub scheme: Option<String>,

    #[serde(default)]
    pub address: Option<String>,
}

impl ForwardedHeadersConfig {
    pub fn build(&self) -> ForwardedHeaders {
        let mut headers = match self.preset {
            ForwardedPreset::None => ForwardedHeaders::none(),
            ForwardedPreset::Standard => ForwardedHeaders::standard(),
        };

        if let Some(ref name) = self.host {
            headers.host = Some(HeaderSource::header(name.clone()));
        }
        if let Some(ref name) = self.scheme {
            headers.scheme = Some(HeaderSource::header(name.clone()));
        }
        if let Some(ref name) = self.address {
            headers.address = Some(HeaderSource::header(name.clone()));
        }

        headers
    }
}

/// In-memory cache sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// How long a session stays cached.
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,

    /// Upper bound on cached sessions.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_max_entries() -> usize {
    10000
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML, expanding `${VAR}` references first.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(content);
        Ok(serde_yaml::from_str(&expanded)?)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!("api_key is empty");
        }

        if let Err(e) = reqwest::Url::parse(&self.api_base) {
            anyhow::bail!("Invalid api_base '{}': {}", self.api_base, e);
        }

        if self.timeout_ms == Some(0) {
            anyhow::bail!("timeout_ms must be greater than zero");
        }

        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be greater than zero");
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# Access Watch client configuration

api_key: "${ACCESS_WATCH_API_KEY}"   # Use environment variable
api_base: "https://access.watch/api/1.0"

# Set when running behind a reverse proxy
forwarded_headers:
  preset: standard             # none or standard
  # host: "x-forwarded-host"   # Header names override the preset
  # scheme: "x-forwarded-proto"
  # address: "x-real-ip"

# Headers never sent in activity reports (case-insensitive)
header_blacklist:
  - "cookie"
  - "authorization"

# timeout_ms: 2000             # API timeout, unset waits indefinitely

cache:
  ttl_seconds: 3600            # Keep sessions for 1 hour
  max_entries: 10000
"#
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    // The pattern is a literal, so compiling it cannot fail.
    let re = match regex::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return content.to_string(),
    };

    re.replace_all(content, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .into_owned()
}
