//! Runtime configuration for the arrival engine and stop index.

use std::time::Duration;

use chrono_tz::Tz;

/// Tunables for reconciliation and stop lookup
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Zone the schedule offsets are expressed in
    #[cfg_attr(feature = "serde", serde(with = "tz_name"))]
    pub timezone: Tz,

    /// The live feed is only consulted for instants in `[now, now + live_horizon)`
    pub live_horizon: Duration,

    /// Keep the first scheduled slot only if the first prediction is no later
    /// than this past it
    pub late_tolerance: Duration,

    pub live_timeout: Duration,

    /// Deadline for a whole multi-stop request
    pub request_deadline: Duration,

    pub max_concurrent_stops: usize,

    pub stop_lookup_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Los_Angeles,
            live_horizon: Duration::from_secs(30 * 60),
            late_tolerance: Duration::from_secs(50 * 60),
            live_timeout: Duration::from_secs(5),
            request_deadline: Duration::from_secs(10),
            max_concurrent_stops: 16,
            stop_lookup_concurrency: 16,
        }
    }
}

impl EngineConfig {
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }
}

#[cfg(feature = "serde")]
mod tz_name {
    use chrono_tz::Tz;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tz, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse::<Tz>().map_err(serde::de::Error::custom)
    }
}
