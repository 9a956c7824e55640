//! Target presentation duration in `mm:ss` form.
//!
//! The remote worker receives the target duration inside the chunk metadata
//! as `{"target_time": "mm:ss"}`. Minutes are unbounded, seconds must be
//! two digits below 60.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Target time parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetTimeError {
    #[error("target time is empty")]
    Empty,

    #[error("target time must be mm:ss, got '{0}'")]
    InvalidFormat(String),

    #[error("invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("seconds must be below 60, got {0}")]
    SecondsOutOfRange(u32),
}

/// Validated `mm:ss` duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetTime {
    minutes: u32,
    seconds: u32,
}

impl TargetTime {
    pub fn new(minutes: u32, seconds: u32) -> Result<Self, TargetTimeError> {
        if seconds >= 60 {
            return Err(TargetTimeError::SecondsOutOfRange(seconds));
        }
        Ok(Self { minutes, seconds })
    }

    pub fn from_secs(total: u32) -> Self {
        Self {
            minutes: total / 60,
            seconds: total % 60,
        }
    }

    pub fn as_secs(&self) -> u32 {
        self.minutes * 60 + self.seconds
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }
}

impl fmt::Display for TargetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

impl FromStr for TargetTime {
    type Err = TargetTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TargetTimeError::Empty);
        }

        let (mins, secs) = s
            .split_once(':')
            .ok_or_else(|| TargetTimeError::InvalidFormat(s.to_string()))?;

        if mins.is_empty() || secs.len() != 2 {
            return Err(TargetTimeError::InvalidFormat(s.to_string()));
        }
        if !mins.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TargetTimeError::InvalidValue("minutes", mins.to_string()));
        }
        if !secs.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TargetTimeError::InvalidValue("seconds", secs.to_string()));
        }

        let minutes: u32 = mins
            .parse()
            .map_err(|_| TargetTimeError::InvalidValue("minutes", mins.to_string()))?;
        let seconds: u32 = secs
            .parse()
            .map_err(|_| TargetTimeError::InvalidValue("seconds", secs.to_string()))?;

        Self::new(minutes, seconds)
    }
}

impl Serialize for TargetTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TargetTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let t: TargetTime = "05:30".parse().unwrap();
        assert_eq!(t.minutes(), 5);
        assert_eq!(t.seconds(), 30);
        assert_eq!(t.as_secs(), 330);

        let long: TargetTime = "120:00".parse().unwrap();
        assert_eq!(long.as_secs(), 7200);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!("".parse::<TargetTime>(), Err(TargetTimeError::Empty));
        assert!(matches!(
            "530".parse::<TargetTime>(),
            Err(TargetTimeError::InvalidFormat(_))
        ));
        assert!(matches!(
            "5:3".parse::<TargetTime>(),
            Err(TargetTimeError::InvalidFormat(_))
        ));
        assert!(matches!(
            "-5:30".parse::<TargetTime>(),
            Err(TargetTimeError::InvalidValue("minutes", _))
        ));
        assert_eq!(
            "05:75".parse::<TargetTime>(),
            Err(TargetTimeError::SecondsOutOfRange(75))
        );
    }

    #[test]
    fn test_display_pads() {
        assert_eq!(TargetTime::from_secs(65).to_string(), "01:05");
        assert_eq!(TargetTime::from_secs(0).to_string(), "00:00");
    }

    #[test]
    fn test_serde_as_string() {
        let t = TargetTime::new(7, 0).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"07:00\"");
        let back: TargetTime = serde_json::from_str("\"07:00\"").unwrap();
        assert_eq!(back, t);
        assert!(serde_json::from_str::<TargetTime>("\"7\"").is_err());
    }
}
