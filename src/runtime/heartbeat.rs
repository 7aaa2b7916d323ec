//! Heartbeat setting: an optional recurring null-event tick.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Shortest interval that keeps the heartbeat enabled.
pub const MIN_HEARTBEAT: Duration = Duration::from_millis(1);

/// How often the machine ticks on its own.
///
/// In JSON a heartbeat is `false`/`null` (disabled), `true` (use the
/// configured default interval) or a number of milliseconds. Numbers below
/// one disable it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Heartbeat {
    #[default]
    Disabled,
    Default,
    Every(Duration),
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Invalid heartbeat interval: {0}")]
pub struct InvalidHeartbeat(pub String);

impl Heartbeat {
    /// Collapse sub-millisecond intervals to `Disabled`.
    pub fn normalized(self) -> Self {
        match self {
            Self::Every(interval) if interval < MIN_HEARTBEAT => Self::Disabled,
            other => other,
        }
    }

    pub fn is_enabled(self) -> bool {
        self.normalized() != Self::Disabled
    }

    /// Effective interval, substituting `default` for `Heartbeat::Default`.
    pub fn interval(self, default: Duration) -> Option<Duration> {
        match self.normalized() {
            Self::Disabled => None,
            Self::Default if default < MIN_HEARTBEAT => None,
            Self::Default => Some(default),
            Self::Every(interval) => Some(interval),
        }
    }
}

impl From<bool> for Heartbeat {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Default
        } else {
            Self::Disabled
        }
    }
}

impl From<Duration> for Heartbeat {
    fn from(interval: Duration) -> Self {
        Self::Every(interval).normalized()
    }
}

/// Milliseconds.
impl From<u64> for Heartbeat {
    fn from(millis: u64) -> Self {
        Duration::from_millis(millis).into()
    }
}

impl TryFrom<&Value> for Heartbeat {
    type Error = InvalidHeartbeat;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::Disabled),
            Value::Bool(enabled) => Ok((*enabled).into()),
            Value::Number(number) => {
                if let Some(millis) = number.as_u64() {
                    return Ok(millis.into());
                }
                let millis = number
                    .as_f64()
                    .ok_or_else(|| InvalidHeartbeat(number.to_string()))?;
                if !millis.is_finite() || millis < 1.0 {
                    return Ok(Self::Disabled);
                }
                Duration::try_from_secs_f64(millis / 1000.0)
                    .map(Self::from)
                    .map_err(|_| InvalidHeartbeat(number.to_string()))
            }
            other => Err(InvalidHeartbeat(other.to_string())),
        }
    }
}

impl Serialize for Heartbeat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.normalized() {
            Self::Disabled => serializer.serialize_bool(false),
            Self::Default => serializer.serialize_bool(true),
            Self::Every(interval) => {
                serializer.serialize_u64(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX))
            }
        }
    }
}

impl<'de> Deserialize<'de> for Heartbeat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Heartbeat::try_from(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn out_of_range_interval_is_rejected() {
        assert!(Heartbeat::try_from(&json!(1e300)).is_err());
        assert_eq!(
            Heartbeat::try_from(&json!(1500.0)).unwrap(),
            Heartbeat::Every(Duration::from_millis(1500))
        );
    }

    #[test]
    fn small_values_disable_heartbeat() {
        assert_eq!(Heartbeat::from(0u64), Heartbeat::Disabled);
        assert_eq!(
            Heartbeat::from(Duration::from_micros(400)),
            Heartbeat::Disabled
        );
        assert_eq!(Heartbeat::try_from(&json!(-5)), Ok(Heartbeat::Disabled));
        assert_eq!(Heartbeat::try_from(&json!(0.5)), Ok(Heartbeat::Disabled));
    }

    #[test]
    fn booleans_map_to_disabled_and_default() {
        assert_eq!(Heartbeat::from(false), Heartbeat::Disabled);
        assert_eq!(Heartbeat::from(true), Heartbeat::Default);
        assert_eq!(Heartbeat::try_from(&Value::Null), Ok(Heartbeat::Disabled));
    }

    #[test]
    fn interval_substitutes_default() {
        let default = Duration::from_millis(500);
        assert_eq!(Heartbeat::Default.interval(default), Some(default));
        assert_eq!(
            Heartbeat::from(100u64).interval(default),
            Some(Duration::from_millis(100))
        );
        assert_eq!(Heartbeat::Disabled.interval(default), None);
        assert_eq!(Heartbeat::Default.interval(Duration::ZERO), None);
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        assert!(Heartbeat::try_from(&json!("fast")).is_err());
        assert!(serde_json::from_str::<Heartbeat>(r#"{"every": 10}"#).is_err());
    }

    #[test]
    fn json_forms_deserialize() {
        assert_eq!(
            serde_json::from_str::<Heartbeat>("250").unwrap(),
            Heartbeat::Every(Duration::from_millis(250))
        );
        assert_eq!(
            serde_json::from_str::<Heartbeat>("true").unwrap(),
            Heartbeat::Default
        );
        assert_eq!(serde_json::to_string(&Heartbeat::from(40u64)).unwrap(), "40");
    }
}
