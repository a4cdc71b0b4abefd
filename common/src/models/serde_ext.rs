// Serde helpers for durations
//
// Durations are persisted as (possibly fractional) seconds. Integers and
// floats are both accepted on input.

use crate::time::{duration_from_nanos, duration_to_nanos};
use chrono::Duration;

fn to_seconds(d: Duration) -> f64 {
    duration_to_nanos(d) as f64 / 1e9
}

fn from_seconds<E: serde::de::Error>(secs: f64) -> Result<Duration, E> {
    if !secs.is_finite() {
        return Err(E::custom(format!("invalid duration: {}", secs)));
    }
    duration_from_nanos((secs * 1e9).round() as i128)
        .ok_or_else(|| E::custom(format!("duration out of range: {}", secs)))
}

/// A single `Duration` as seconds
pub mod duration_secs {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(to_seconds(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        from_seconds(secs)
    }
}

/// A `BoundedInterval<Duration>` as `[lower_secs, upper_secs]`
pub mod duration_range {
    use super::*;
    use crate::models::BoundedInterval;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        range: &BoundedInterval<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        (to_seconds(range.lower()), to_seconds(range.upper())).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BoundedInterval<Duration>, D::Error> {
        let (lower, upper) = <(f64, f64)>::deserialize(deserializer)?;
        BoundedInterval::new(from_seconds(lower)?, from_seconds(upper)?)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use crate::models::BoundedInterval;
    use chrono::Duration;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::duration_secs")]
        length: Duration,
        #[serde(with = "super::duration_range")]
        range: BoundedInterval<Duration>,
    }

    #[test]
    fn test_durations_as_seconds() {
        let holder = Holder {
            length: Duration::days(1),
            range: BoundedInterval::new(Duration::minutes(90), Duration::hours(2)).unwrap(),
        };
        let json = serde_json::to_value(&holder).unwrap();
        assert_eq!(json["length"], 86400.0);
        assert_eq!(json["range"][0], 5400.0);
        let back: Holder = serde_json::from_value(json).unwrap();
        assert_eq!(back, holder);
    }

    #[test]
    fn test_accepts_integers_and_fractions() {
        let holder: Holder =
            serde_json::from_str(r#"{"length": 60, "range": [0.5, 1]}"#).unwrap();
        assert_eq!(holder.length, Duration::minutes(1));
        assert_eq!(holder.range.lower(), Duration::milliseconds(500));
    }

    #[test]
    fn test_rejects_inverted_range() {
        assert!(serde_json::from_str::<Holder>(r#"{"length": 60, "range": [2, 1]}"#).is_err());
    }
}
