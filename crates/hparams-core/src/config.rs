//! Engine configuration.
//!
//! Defaults suit an interactive UI polling a single experiment. Every field
//! can be overridden from the environment via [`EngineConfig::from_env`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest slice a single request may ask for.
pub const DEFAULT_MAX_SLICE_SIZE: usize = 10_000;

/// Number of aggregated snapshots kept by the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

pub const ENV_MAX_SLICE_SIZE: &str = "HPARAMS_MAX_SLICE_SIZE";
pub const ENV_CACHE_CAPACITY: &str = "HPARAMS_CACHE_CAPACITY";
pub const ENV_QUERY_DEADLINE_MS: &str = "HPARAMS_QUERY_DEADLINE_MS";

/// Tunables for [`crate::QueryEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Requests with a larger `slice_size` are rejected.
    pub max_slice_size: usize,

    /// Aggregation cache entries; 0 disables caching.
    pub cache_capacity: usize,

    /// Deadline applied to queries whose caller supplied none.
    #[serde(with = "opt_millis")]
    pub default_deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_slice_size: DEFAULT_MAX_SLICE_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            default_deadline: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `HPARAMS_*` environment variables.
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = parse_var::<usize, _>(&lookup, ENV_MAX_SLICE_SIZE) {
            config.max_slice_size = v;
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, ENV_CACHE_CAPACITY) {
            config.cache_capacity = v;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_QUERY_DEADLINE_MS) {
            config.default_deadline = (ms > 0).then(|| Duration::from_millis(ms));
        }
        config
    }

    pub fn with_max_slice_size(mut self, max: usize) -> Self {
        self.max_slice_size = max;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = Some(deadline);
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(event = "config.invalid_value", key = %key, value = %raw);
            None
        }
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
