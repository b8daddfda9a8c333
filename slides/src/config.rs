//! Run configuration
//!
//! A [`RunConfig`] is built once at process start (usually from CLI flags) and
//! handed to the [`Runner`](crate::Runner). Actions read it through the
//! [`ExecutionContext`](crate::ExecutionContext); nothing reads global state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(15_000);
pub const DEFAULT_MIN_SCORE: f64 = 0.7;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CANVAS_DURATION: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Default maximum time to wait for a target to appear
    #[serde(with = "millis")]
    pub max_wait: Duration,
    /// 0 is the primary monitor
    pub screen_id: u32,
    /// Default image match tolerance; 1.0 is an exact match
    pub min_score: f64,
    /// How often target-seeking actions probe the screen
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Interval between attempts of presence checks built by the interpreter
    #[serde(with = "millis")]
    pub retry_interval: Duration,
    /// Draw a short highlight around each found target
    pub highlight_targets: bool,
    #[serde(with = "millis")]
    pub canvas_duration: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            screen_id: 0,
            min_score: DEFAULT_MIN_SCORE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            highlight_targets: true,
            canvas_duration: DEFAULT_CANVAS_DURATION,
        }
    }
}

impl RunConfig {
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_screen_id(mut self, screen_id: u32) -> Self {
        self.screen_id = screen_id;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score.clamp(0.0, 1.0);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_target_highlight(mut self, enabled: bool) -> Self {
        self.highlight_targets = enabled;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.max_wait, Duration::from_millis(15000));
        assert_eq!(config.screen_id, 0);
        assert!((config.min_score - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder_clamps_score() {
        let config = RunConfig::default().with_min_score(1.4).with_screen_id(1);
        assert_eq!(config.min_score, 1.0);
        assert_eq!(config.screen_id, 1);
    }

    #[test]
    fn test_serializes_durations_as_millis() {
        let config = RunConfig::default().with_max_wait(Duration::from_secs(2));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["max_wait"], 2000);
        let back: RunConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
