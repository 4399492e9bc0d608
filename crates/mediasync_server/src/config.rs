//! Gateway configuration.
//!
//! Configuration is provided out-of-band through environment variables:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `API_KEY` | write secret | none |
//! | `READ_KEY` | read secret | none (write secret also reads) |
//! | `ALLOWED_ORIGIN` | CORS origin | `*` |
//! | `MAX_BODY` | max request body bytes | 10 MiB |
//! | `MAX_ITEMS` | max records per list per write | 100000 |
//! | `ALLOWED_PREFIXES` | comma-separated key prefixes | [`DEFAULT_PREFIXES`] |
//! | `BIND_ADDR` | listen address | `127.0.0.1:8787` |

use crate::error::{GatewayError, GatewayResult};
use mediasync_protocol::{KeyPolicy, DEFAULT_PREFIXES};
use std::fmt;
use std::net::SocketAddr;

/// Default maximum request body size (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Default maximum number of records kept per list on write.
pub const DEFAULT_MAX_ITEMS: usize = 100_000;

/// Default CORS origin.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "*";

/// A shared secret. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value. Blank values are rejected.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Returns the raw secret bytes for comparison.
    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Configuration for the sync gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Secret required for writes (and reads when no read secret is set).
    pub api_key: Option<Secret>,
    /// Optional secret accepted for reads only.
    pub read_key: Option<Secret>,
    /// Value of `Access-Control-Allow-Origin`.
    pub allowed_origin: String,
    /// Maximum raw body size in bytes.
    pub max_body_bytes: usize,
    /// Maximum records considered per list on write.
    pub max_items: usize,
    /// Key prefix allow-list.
    pub key_policy: KeyPolicy,
}

impl GatewayConfig {
    /// Creates a configuration with defaults and no secrets.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            api_key: None,
            read_key: None,
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_items: DEFAULT_MAX_ITEMS,
            key_policy: KeyPolicy::default(),
        }
    }

    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `BIND_ADDR` is set but is not a socket address.
    pub fn from_env() -> GatewayResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// Numeric settings that are missing, unparseable or not positive fall
    /// back to their defaults. An empty prefix list falls back to
    /// [`DEFAULT_PREFIXES`].
    ///
    /// # Errors
    ///
    /// Returns an error if `BIND_ADDR` is set but is not a socket address.
    pub fn from_lookup<F>(lookup: F) -> GatewayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("BIND_ADDR").filter(|v| !v.trim().is_empty()) {
            config.bind_addr = addr.trim().parse().map_err(|e| {
                GatewayError::InvalidConfig(format!("BIND_ADDR {addr:?}: {e}"))
            })?;
        }

        config.api_key = lookup("API_KEY").and_then(Secret::new);
        config.read_key = lookup("READ_KEY").and_then(Secret::new);

        if let Some(origin) = lookup("ALLOWED_ORIGIN").filter(|v| !v.is_empty()) {
            config.allowed_origin = origin;
        }
        if let Some(max) = lookup("MAX_BODY").and_then(|v| parse_leading_int(&v)) {
            config.max_body_bytes = max;
        }
        if let Some(max) = lookup("MAX_ITEMS").and_then(|v| parse_leading_int(&v)) {
            config.max_items = max;
        }

        let prefixes = lookup("ALLOWED_PREFIXES")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_PREFIXES.to_string());
        config.key_policy = KeyPolicy::parse(&prefixes);

        Ok(config)
    }

    /// Sets the write secret.
    pub fn with_api_key(mut self, secret: impl Into<String>) -> Self {
        self.api_key = Secret::new(secret);
        self
    }

    /// Sets the read-only secret.
    pub fn with_read_key(mut self, secret: impl Into<String>) -> Self {
        self.read_key = Secret::new(secret);
        self
    }

    /// Sets the CORS origin.
    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = origin.into();
        self
    }

    /// Sets the maximum body size.
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Sets the maximum records per list.
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = max;
        self
    }

    /// Replaces the prefix allow-list with a comma-separated list.
    pub fn with_prefixes(mut self, prefixes: &str) -> Self {
        self.key_policy = KeyPolicy::parse(prefixes);
        self
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8787)))
    }
}

/// Parses a leading decimal integer, ignoring trailing garbage
/// (`"10mb"` is 10). Returns `None` for missing or non-positive values.
fn parse_leading_int(raw: &str) -> Option<usize> {
    let digits: String = raw
        .trim_start()
        .trim_start_matches('+')
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<usize>().ok().filter(|v| *v > 0)
}
