// ── Store runtime configuration ──
//
// These types describe *how* a store schedules work and fans out snapshots.
// They never touch disk; `stator-config` loads them from TOML/env and the
// caller hands the result to `Store::builder`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::StoreError;

/// Default per-subscriber buffer size for [`OverflowPolicy::SuspendPublisher`].
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 16;

/// How queued jobs are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SchedulingMode {
    /// One spawned worker task drains an unbounded FIFO queue.
    #[default]
    Concurrent,
    /// Jobs run inline on the caller's thread. Intended for tests:
    /// `get` observes every prior `set` before it returns.
    Deterministic,
}

/// What a subscriber's cursor does when it falls behind the commit rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum OverflowPolicy {
    /// Keep only the latest pending snapshot. Slow subscribers may skip
    /// intermediate commits but always end on the newest one.
    #[default]
    Conflate,
    /// Queue every commit per subscriber. Memory grows with subscriber lag.
    BufferUnbounded,
    /// Bounded per-subscriber buffers; the worker waits for space.
    /// Only valid in [`SchedulingMode::Concurrent`].
    SuspendPublisher,
}

/// Configuration for a single store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StoreConfig {
    pub mode: SchedulingMode,
    pub overflow: OverflowPolicy,
    /// Buffer size per subscriber under [`OverflowPolicy::SuspendPublisher`].
    pub subscriber_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: SchedulingMode::default(),
            overflow: OverflowPolicy::default(),
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Inline scheduling with conflated subscribers, for tests.
    pub fn deterministic() -> Self {
        Self {
            mode: SchedulingMode::Deterministic,
            ..Self::default()
        }
    }

    pub fn is_deterministic(&self) -> bool {
        self.mode == SchedulingMode::Deterministic
    }

    /// Reject combinations the store cannot honor.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.subscriber_capacity == 0 {
            return Err(StoreError::Config {
                message: "subscriber-capacity must be greater than zero".into(),
            });
        }
        if self.overflow == OverflowPolicy::SuspendPublisher && self.is_deterministic() {
            return Err(StoreError::Config {
                message: "suspend-publisher overflow requires concurrent scheduling".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn default_is_concurrent_and_conflated() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.mode, SchedulingMode::Concurrent);
        assert_eq!(cfg.overflow, OverflowPolicy::Conflate);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn suspend_publisher_rejected_in_deterministic_mode() {
        let cfg = StoreConfig {
            overflow: OverflowPolicy::SuspendPublisher,
            ..StoreConfig::deterministic()
        };
        assert!(matches!(cfg.validate(), Err(StoreError::Config { .. })));
    }

    #[test]
    fn zero_capacity_rejected() {
        let cfg = StoreConfig {
            subscriber_capacity: 0,
            ..StoreConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn enums_parse_kebab_case() {
        assert_eq!(
            OverflowPolicy::from_str("buffer-unbounded").unwrap(),
            OverflowPolicy::BufferUnbounded
        );
        assert_eq!(
            SchedulingMode::from_str("Deterministic").unwrap(),
            SchedulingMode::Deterministic
        );
        assert_eq!(OverflowPolicy::SuspendPublisher.to_string(), "suspend-publisher");
    }

    #[test]
    fn serde_uses_kebab_case_and_defaults() {
        let cfg: StoreConfig = serde_json::from_str(r#"{"overflow":"buffer-unbounded"}"#).unwrap();
        assert_eq!(cfg.overflow, OverflowPolicy::BufferUnbounded);
        assert_eq!(cfg.mode, SchedulingMode::Concurrent);
        assert_eq!(cfg.subscriber_capacity, DEFAULT_SUBSCRIBER_CAPACITY);
    }
}
