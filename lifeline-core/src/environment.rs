//! Environment capture for session metadata.
//!
//! Device class and browser family are inferred from a user-agent string.

use crate::types::{DeviceType, SessionMetadata};

/// Supplies the metadata snapshot stored on new sessions.
pub trait EnvironmentProbe: Send + Sync {
    fn capture(&self) -> SessionMetadata;
}

/// Fixed environment description.
#[derive(Debug, Clone)]
pub struct StaticEnvironment {
    pub user_agent: String,
    pub timezone: String,
    pub language: String,
}

impl StaticEnvironment {
    pub fn new(
        user_agent: impl Into<String>,
        timezone: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            timezone: timezone.into(),
            language: language.into(),
        }
    }

    /// Describe the current process: `TZ` and `LANG` from the environment,
    /// the crate name as agent string.
    pub fn from_process() -> Self {
        let timezone = std::env::var("TZ")
            .ok()
            .filter(|tz| !tz.is_empty())
            .unwrap_or_else(|| "UTC".to_string());
        let language = std::env::var("LANG")
            .ok()
            .and_then(|lang| parse_language(&lang))
            .unwrap_or_else(|| "en".to_string());

        Self {
            user_agent: format!("lifeline/{}", env!("CARGO_PKG_VERSION")),
            timezone,
            language,
        }
    }
}

impl Default for StaticEnvironment {
    fn default() -> Self {
        Self::from_process()
    }
}

impl EnvironmentProbe for StaticEnvironment {
    fn capture(&self) -> SessionMetadata {
        SessionMetadata {
            device_type: detect_device_type(&self.user_agent),
            browser: detect_browser(&self.user_agent).to_string(),
            user_agent: self.user_agent.clone(),
            timezone: self.timezone.clone(),
            language: self.language.clone(),
        }
    }
}

/// Classify a user agent as desktop, tablet or mobile.
pub fn detect_device_type(user_agent: &str) -> DeviceType {
    let ua = user_agent.to_ascii_lowercase();

    if ua.contains("ipad")
        || ua.contains("tablet")
        || ua.contains("kindle")
        || (ua.contains("android") && !ua.contains("mobile"))
    {
        DeviceType::Tablet
    } else if ua.contains("mobi")
        || ua.contains("iphone")
        || ua.contains("ipod")
        || ua.contains("android")
        || ua.contains("blackberry")
        || ua.contains("opera mini")
    {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    }
}

/// Browser family from a user agent. Order matters: Edge and Opera
/// advertise Chrome, Chrome advertises Safari.
pub fn detect_browser(user_agent: &str) -> &'static str {
    if user_agent.contains("Edg/") || user_agent.contains("Edge/") {
        "Edge"
    } else if user_agent.contains("OPR/") || user_agent.contains("Opera") {
        "Opera"
    } else if user_agent.contains("Firefox/") {
        "Firefox"
    } else if user_agent.contains("Chrome/") || user_agent.contains("CriOS/") {
        "Chrome"
    } else if user_agent.contains("Safari/") {
        "Safari"
    } else {
        "Unknown"
    }
}

/// `en_US.UTF-8` -> `en-US`
fn parse_language(lang: &str) -> Option<String> {
    let tag = lang.split('.').next()?.replace('_', "-");
    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        None
    } else {
        Some(tag)
    }
}
