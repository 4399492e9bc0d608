//! Key namespace policy.
//!
//! Tenants sharing one store are isolated only by key prefix. A key is
//! allowed iff it is non-empty and starts with one configured prefix.

/// Prefixes allowed when no list is configured.
pub const DEFAULT_PREFIXES: &str =
    "filmin_,filmtwist_,kocowa_,viki_,netflix_,disney_,sky_,max_,appletv_,prime_,opto_,rtp_,tvi_";

/// Maximum number of keys a single read or delete-by-url request touches.
pub const MAX_KEYS_PER_REQUEST: usize = 25;

/// Prefix allow-list for store keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPolicy {
    prefixes: Vec<String>,
}

impl KeyPolicy {
    /// Creates a policy from explicit prefixes. Blank entries are dropped.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { prefixes }
    }

    /// Parses a comma-separated prefix list.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Returns the configured prefixes.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Returns true if the gateway may operate on `key`.
    pub fn is_allowed(&self, key: &str) -> bool {
        !key.is_empty() && self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// Trims candidate keys, drops blank and disallowed ones, and keeps
    /// at most `limit` of them in request order.
    pub fn select_keys<I, S>(&self, candidates: I, limit: usize) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| self.is_allowed(k))
            .take(limit)
            .collect()
    }
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self::parse(DEFAULT_PREFIXES)
    }
}

/// Splits the `keys` query parameter into raw key names.
pub fn parse_key_list(param: &str) -> impl Iterator<Item = &str> {
    param.split(',').map(str::trim)
}
