//! Serde helpers that carry `Duration` fields as integer milliseconds.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Settings {
//!     #[serde(with = "common::serde_duration")]
//!     timeout: Duration,
//!     #[serde(default, with = "common::serde_duration::option")]
//!     window: Option<Duration>,
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// Same encoding for `Option<Duration>`; `None` maps to `null`.
pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Settings {
        #[serde(with = "super")]
        timeout: Duration,
        #[serde(default, with = "super::option")]
        window: Option<Duration>,
    }

    #[test]
    fn encodes_millis() {
        let settings = Settings {
            timeout: Duration::from_millis(1500),
            window: None,
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"timeout":1500,"window":null}"#);
    }

    #[test]
    fn missing_optional_field_defaults_to_none() {
        let settings: Settings = serde_json::from_str(r#"{"timeout":250}"#).unwrap();
        assert_eq!(settings.timeout, Duration::from_millis(250));
        assert_eq!(settings.window, None);
    }
}
