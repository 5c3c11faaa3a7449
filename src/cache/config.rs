//! Cache layer configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the edge cache middleware is active at all.
    pub enabled: bool,
    /// Maximum entries held by the in-process backend.
    pub capacity: NonZeroUsize,
    /// Per-operation timeout; expiry fails open to uncached.
    #[serde(with = "duration_ms")]
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: NonZeroUsize::new(4096).unwrap_or(NonZeroUsize::MIN),
            op_timeout: Duration::from_millis(250),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
