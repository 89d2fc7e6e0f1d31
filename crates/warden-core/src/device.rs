//! # Device Classes
//!
//! The client category announced by the `Device-Type` request header selects
//! the lifetime of the tokens issued to it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client category used to choose a token lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    Web,
    Desktop,
    Mobile,
    ChromeExtension,
    Api,
    /// Absent or unrecognized `Device-Type`.
    Default,
}

impl DeviceClass {
    /// Classify a raw `Device-Type` header value.
    ///
    /// Matching ignores surrounding whitespace and ASCII case. Anything
    /// unrecognized, including an explicit `"default"`, is [`DeviceClass::Default`].
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Default;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "web" => Self::Web,
            "desktop" => Self::Desktop,
            "mobile" => Self::Mobile,
            "chrome-extension" => Self::ChromeExtension,
            "api" => Self::Api,
            _ => Self::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::ChromeExtension => "chrome-extension",
            Self::Api => "api",
            Self::Default => "default",
        }
    }
}

/// Token lifetime per device class.
///
/// Serialized as whole seconds so that configuration files stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenLifetimes {
    #[serde(with = "secs")]
    pub web: Duration,
    #[serde(with = "secs")]
    pub desktop: Duration,
    #[serde(with = "secs")]
    pub mobile: Duration,
    #[serde(with = "secs")]
    pub chrome_extension: Duration,
    #[serde(with = "secs")]
    pub api: Duration,
    #[serde(with = "secs")]
    pub default: Duration,
}

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            web: Duration::from_secs(DAY),
            desktop: Duration::from_secs(15 * DAY),
            mobile: Duration::from_secs(15 * DAY),
            chrome_extension: Duration::from_secs(30 * DAY),
            api: Duration::from_secs(2 * DAY),
            default: Duration::from_secs(DAY),
        }
    }
}

impl TokenLifetimes {
    /// Lifetime for a device class.
    pub fn get(&self, device: DeviceClass) -> Duration {
        match device {
            DeviceClass::Web => self.web,
            DeviceClass::Desktop => self.desktop,
            DeviceClass::Mobile => self.mobile,
            DeviceClass::ChromeExtension => self.chrome_extension,
            DeviceClass::Api => self.api,
            DeviceClass::Default => self.default,
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_header_values() {
        assert_eq!(DeviceClass::from_header(Some("web")), DeviceClass::Web);
        assert_eq!(DeviceClass::from_header(Some("desktop")), DeviceClass::Desktop);
        assert_eq!(DeviceClass::from_header(Some("mobile")), DeviceClass::Mobile);
        assert_eq!(
            DeviceClass::from_header(Some("chrome-extension")),
            DeviceClass::ChromeExtension
        );
        assert_eq!(DeviceClass::from_header(Some(" API ")), DeviceClass::Api);
    }

    #[test]
    fn unknown_or_absent_is_default() {
        assert_eq!(DeviceClass::from_header(None), DeviceClass::Default);
        assert_eq!(DeviceClass::from_header(Some("")), DeviceClass::Default);
        assert_eq!(DeviceClass::from_header(Some("tv")), DeviceClass::Default);
    }

    #[test]
    fn lifetime_lookup() {
        let lifetimes = TokenLifetimes::default();
        assert_eq!(lifetimes.get(DeviceClass::Web), Duration::from_secs(DAY));
        assert_eq!(lifetimes.get(DeviceClass::ChromeExtension), Duration::from_secs(30 * DAY));
        assert_eq!(lifetimes.get(DeviceClass::Default), lifetimes.default);
    }

    #[test]
    fn lifetimes_deserialize_from_seconds() {
        let lifetimes: TokenLifetimes =
            serde_json::from_str(r#"{"web": 60, "api": 120}"#).unwrap();
        assert_eq!(lifetimes.web, Duration::from_secs(60));
        assert_eq!(lifetimes.api, Duration::from_secs(120));
        assert_eq!(lifetimes.mobile, Duration::from_secs(15 * DAY));
    }
}
