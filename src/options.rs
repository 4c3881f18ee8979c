//! Configuration options for the client stream.

use crate::connection::ExponentialBackoff;
use crate::error::{Result, StreamError};
use crate::transports::TransportOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RETRY_BASE_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_RETRY_EXPONENT: f64 = 2.2;
const DEFAULT_RETRY_MAX_TIMEOUT_MS: u64 = 5 * 60 * 1_000;
const DEFAULT_RETRY_MIN_TIMEOUT_MS: u64 = 10;
const DEFAULT_RETRY_MIN_COUNT: u32 = 2;
const DEFAULT_RETRY_FUZZ: f64 = 0.5;

/// Process-wide runtime configuration of the embedding site.
///
/// Supplied once at construction and read-only afterwards. It replaces any
/// ambient global lookup of the site root or the server build identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Origin used for site-relative endpoints, e.g. `https://app.example.com`
    #[serde(default)]
    pub origin: Option<String>,

    /// Path prefix the application is mounted under, e.g. `/app`
    #[serde(default)]
    pub root_url_path_prefix: String,

    /// Server identity the client was built against
    #[serde(default)]
    pub server_id: Option<String>,
}

impl SiteConfig {
    /// Resolve a root-relative link (`/path`) against the site root.
    ///
    /// Anything that does not start with `/` is returned unchanged.
    pub fn relative_to_site_root(&self, link: &str) -> String {
        if !link.starts_with('/') {
            return link.to_string();
        }

        let origin = self
            .origin
            .as_deref()
            .map(|o| o.trim_end_matches('/'))
            .unwrap_or("");

        format!("{}{}{}", origin, self.root_url_path_prefix, link)
    }
}

/// Configuration options for creating a client stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Time without traffic before the link is declared dead (default: 60000)
    #[serde(default)]
    pub heartbeat_timeout_ms: Option<u64>,

    /// Time allowed for a connection attempt to deliver its handshake (default: 10000)
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,

    /// Base delay of the exponential reconnect backoff (default: 1000)
    #[serde(default)]
    pub retry_base_timeout_ms: Option<u64>,

    /// Growth factor of the reconnect backoff (default: 2.2)
    #[serde(default)]
    pub retry_exponent: Option<f64>,

    /// Upper bound of the reconnect backoff (default: 300000)
    #[serde(default)]
    pub retry_max_timeout_ms: Option<u64>,

    /// Delay used for the first few retries (default: 10)
    #[serde(default)]
    pub retry_min_timeout_ms: Option<u64>,

    /// Number of retries that use the minimum delay (default: 2)
    #[serde(default)]
    pub retry_min_count: Option<u32>,

    /// Relative jitter applied to the backoff, between 0 and 1 (default: 0.5)
    #[serde(default)]
    pub retry_fuzz: Option<f64>,

    /// Whether the environment can use websockets (default: true)
    #[serde(default)]
    pub websockets_supported: Option<bool>,

    /// Enable transport debug output
    #[serde(default)]
    pub debug: Option<bool>,

    /// Site runtime configuration
    #[serde(default)]
    pub site: SiteConfig,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: Some(DEFAULT_HEARTBEAT_TIMEOUT_MS),
            connect_timeout_ms: Some(DEFAULT_CONNECT_TIMEOUT_MS),
            retry_base_timeout_ms: Some(DEFAULT_RETRY_BASE_TIMEOUT_MS),
            retry_exponent: Some(DEFAULT_RETRY_EXPONENT),
            retry_max_timeout_ms: Some(DEFAULT_RETRY_MAX_TIMEOUT_MS),
            retry_min_timeout_ms: Some(DEFAULT_RETRY_MIN_TIMEOUT_MS),
            retry_min_count: Some(DEFAULT_RETRY_MIN_COUNT),
            retry_fuzz: Some(DEFAULT_RETRY_FUZZ),
            websockets_supported: Some(true),
            debug: Some(false),
            site: SiteConfig::default(),
        }
    }
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set heartbeat timeout
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Builder pattern: set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Builder pattern: set site origin
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.site.origin = Some(origin.into());
        self
    }

    /// Builder pattern: set site root path prefix
    pub fn root_url_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.site.root_url_path_prefix = prefix.into();
        self
    }

    /// Builder pattern: set the known server identity
    pub fn server_id(mut self, server_id: impl Into<String>) -> Self {
        self.site.server_id = Some(server_id.into());
        self
    }

    /// Builder pattern: declare websocket capability of the environment
    pub fn websockets_supported(mut self, supported: bool) -> Self {
        self.websockets_supported = Some(supported);
        self
    }

    /// Builder pattern: enable debug mode
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = Some(enabled);
        self
    }

    /// Get heartbeat timeout duration
    pub fn get_heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(
            self.heartbeat_timeout_ms
                .unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT_MS),
        )
    }

    /// Get connect timeout duration
    pub fn get_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS))
    }

    /// Check if debug mode is enabled
    pub fn is_debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }
}

/// Internal configuration derived from StreamOptions
#[derive(Debug, Clone)]
pub struct Config {
    pub heartbeat_timeout: Duration,
    pub connect_timeout: Duration,
    pub backoff: ExponentialBackoff,
    pub websockets_supported: bool,
    pub debug: bool,
    pub site: SiteConfig,
}

impl Config {
    /// Options handed to every transport socket
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions::for_capabilities(self.websockets_supported, self.debug)
    }
}

impl TryFrom<StreamOptions> for Config {
    type Error = StreamError;

    fn try_from(opts: StreamOptions) -> Result<Self> {
        let heartbeat_timeout = opts.get_heartbeat_timeout();
        if heartbeat_timeout.is_zero() {
            return Err(StreamError::config("heartbeat timeout must be positive"));
        }

        let connect_timeout = opts.get_connect_timeout();
        if connect_timeout.is_zero() {
            return Err(StreamError::config("connect timeout must be positive"));
        }

        let exponent = opts.retry_exponent.unwrap_or(DEFAULT_RETRY_EXPONENT);
        if !exponent.is_finite() || exponent < 1.0 {
            return Err(StreamError::config(format!(
                "retry exponent must be at least 1.0, got {}",
                exponent
            )));
        }

        let fuzz = opts.retry_fuzz.unwrap_or(DEFAULT_RETRY_FUZZ);
        if !(0.0..=1.0).contains(&fuzz) {
            return Err(StreamError::config(format!(
                "retry fuzz must be within 0..=1, got {}",
                fuzz
            )));
        }

        let backoff = ExponentialBackoff {
            base: Duration::from_millis(
                opts.retry_base_timeout_ms
                    .unwrap_or(DEFAULT_RETRY_BASE_TIMEOUT_MS),
            ),
            exponent,
            max: Duration::from_millis(
                opts.retry_max_timeout_ms
                    .unwrap_or(DEFAULT_RETRY_MAX_TIMEOUT_MS),
            ),
            min: Duration::from_millis(
                opts.retry_min_timeout_ms
                    .unwrap_or(DEFAULT_RETRY_MIN_TIMEOUT_MS),
            ),
            min_count: opts.retry_min_count.unwrap_or(DEFAULT_RETRY_MIN_COUNT),
            fuzz,
        };

        Ok(Self {
            heartbeat_timeout,
            connect_timeout,
            backoff,
            websockets_supported: opts.websockets_supported.unwrap_or(true),
            debug: opts.is_debug(),
            site: opts.site,
        })
    }
}
