use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload keys that get rewritten with the emission time, in priority order.
pub const TIMESTAMP_KEYS: [&str; 2] = ["ts", "timestamp"];

/// Longest accepted period, bounded by the `INTEGER` column that stores it.
pub const MAX_FREQUENCY_SECONDS: u64 = i32::MAX as u64;

/// A stored description of what to publish, where, and how often.
///
/// `frequency_seconds == 0` means the definition is emitted once per
/// scheduler load; anything greater repeats on that period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDefinition {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "frequency", alias = "frequency_seconds", default)]
    pub frequency_seconds: u64,
}

impl MessageDefinition {
    pub fn new(topic: impl Into<String>, payload: Value, frequency_seconds: u64) -> Self {
        Self {
            topic: topic.into(),
            payload,
            frequency_seconds,
        }
    }

    pub fn is_one_shot(&self) -> bool {
        self.frequency_seconds == 0
    }

    /// Emission period, or `None` for one-shot definitions.
    pub fn period(&self) -> Option<Duration> {
        (self.frequency_seconds > 0).then(|| Duration::from_secs(self.frequency_seconds))
    }

    /// Copy of the payload with its timestamp key (if any) set to `now`.
    pub fn stamped_payload(&self, now: i64) -> Value {
        let mut payload = self.payload.clone();
        stamp_timestamp(&mut payload, now);
        payload
    }
}

/// Replace the first of `ts` / `timestamp` found in an object payload with `now`.
///
/// Arrays, scalars and objects without either key are left untouched.
/// Returns the key that was rewritten.
pub fn stamp_timestamp(payload: &mut Value, now: i64) -> Option<&'static str> {
    let map = payload.as_object_mut()?;
    let key = TIMESTAMP_KEYS.into_iter().find(|k| map.contains_key(*k))?;
    map.insert(key.to_string(), Value::from(now));
    Some(key)
}

/// Current Unix time in whole seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
