use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Serializes Duration as seconds
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_secs_f64().serialize(serializer)
}

/// Deserializes Duration from seconds
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(serde::de::Error::custom(format!("invalid duration {}", secs)));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Optional Duration as seconds, `null` when absent
pub mod opt_duration {
    use super::*;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_secs_f64()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) if secs.is_finite() && secs >= 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
            Some(secs) => Err(serde::de::Error::custom(format!("invalid duration {}", secs))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json;

    #[derive(Serialize, Deserialize)]
    struct Test {
        #[serde(serialize_with = "serialize_duration")]
        #[serde(deserialize_with = "deserialize_duration")]
        interval: Duration,
        #[serde(default, with = "opt_duration")]
        poll: Option<Duration>,
    }

    #[test]
    fn test_duration_serialization() {
        let original = Test {
            interval: Duration::from_millis(1500),
            poll: None,
        };

        let serialized = serde_json::to_string(&original).unwrap();
        assert_eq!(serialized, r#"{"interval":1.5,"poll":null}"#);
        let deserialized: Test = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.interval, original.interval);
        assert_eq!(deserialized.poll, None);
    }

    #[test]
    fn test_negative_duration_rejected() {
        assert!(serde_json::from_str::<Test>(r#"{"interval":-1.0}"#).is_err());
        assert!(serde_json::from_str::<Test>(r#"{"interval":1.0,"poll":-2}"#).is_err());
    }

    #[test]
    fn test_optional_duration_present() {
        let t: Test = serde_json::from_str(r#"{"interval":0,"poll":5}"#).unwrap();
        assert_eq!(t.poll, Some(Duration::from_secs(5)));
    }
}
