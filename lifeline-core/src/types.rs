//! Shared types for lifeline-core.
//!
//! These types are the session data model and are serialized verbatim into
//! backups and exports (camelCase keys, RFC 3339 timestamps).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form JSON value used for custom settings and pattern payloads.
pub type JsonValue = serde_json::Value;

/// Personalization section: key to setting value.
pub type SettingsMap = BTreeMap<String, SettingValue>;

// ─────────────────────────────────────────────────────────────────────────────
// Preferences
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

impl Theme {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStyle {
    #[default]
    Casual,
    Formal,
    Technical,
    Concise,
}

impl ConversationStyle {
    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "casual" => Some(Self::Casual),
            "formal" => Some(Self::Formal),
            "technical" => Some(Self::Technical),
            "concise" => Some(Self::Concise),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Formal => "formal",
            Self::Technical => "technical",
            Self::Concise => "concise",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilitySettings {
    pub high_contrast: bool,
    pub reduced_motion: bool,
    pub screen_reader: bool,
    pub font_size: FontSize,
}

/// User-configurable settings carried by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub theme: Theme,
    pub language: String,
    pub accessibility: AccessibilitySettings,
    pub conversation_style: ConversationStyle,
    #[serde(default)]
    pub custom_settings: BTreeMap<String, JsonValue>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::Auto,
            language: "en".to_string(),
            accessibility: AccessibilitySettings::default(),
            conversation_style: ConversationStyle::Casual,
            custom_settings: BTreeMap::new(),
        }
    }
}

impl Preferences {
    /// Overlay a partial update; set fields win, custom settings merge by key.
    pub fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(theme) = update.theme {
            self.theme = theme;
        }
        if let Some(language) = update.language {
            self.language = language;
        }
        if let Some(accessibility) = update.accessibility {
            self.accessibility = accessibility;
        }
        if let Some(style) = update.conversation_style {
            self.conversation_style = style;
        }
        self.custom_settings.extend(update.custom_settings);
    }
}

/// Partial preferences; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferencesUpdate {
    pub theme: Option<Theme>,
    pub language: Option<String>,
    pub accessibility: Option<AccessibilitySettings>,
    pub conversation_style: Option<ConversationStyle>,
    pub custom_settings: BTreeMap<String, JsonValue>,
}

impl PreferencesUpdate {
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_conversation_style(mut self, style: ConversationStyle) -> Self {
        self.conversation_style = Some(style);
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.custom_settings.insert(key.into(), value.into());
        self
    }
}

impl From<Preferences> for PreferencesUpdate {
    fn from(prefs: Preferences) -> Self {
        Self {
            theme: Some(prefs.theme),
            language: Some(prefs.language),
            accessibility: Some(prefs.accessibility),
            conversation_style: Some(prefs.conversation_style),
            custom_settings: prefs.custom_settings,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation Context & Behavior Patterns
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseLevel {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// Analysis of one conversation touched during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub topics: Vec<String>,
    pub intent: String,
    pub expertise_level: ExpertiseLevel,
    pub sentiment: Sentiment,
    pub last_analyzed: DateTime<Utc>,
}

/// Observed behavior, deduplicated per `pattern_type` within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorPattern {
    #[serde(rename = "type")]
    pub pattern_type: String,
    #[serde(default)]
    pub frequency: u32,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub data: JsonValue,
    pub last_updated: DateTime<Utc>,
}

impl BehaviorPattern {
    pub fn new(pattern_type: impl Into<String>, last_updated: DateTime<Utc>) -> Self {
        Self {
            pattern_type: pattern_type.into(),
            frequency: 1,
            confidence: 0.5,
            data: JsonValue::Null,
            last_updated,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Personalizations
// ─────────────────────────────────────────────────────────────────────────────

/// Leaf value of a personalization setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A personalization value: either a scalar or a one-level nested map.
///
/// Merging a `Nested` value into an existing `Nested` value merges the inner
/// maps key by key; every other combination overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Scalar(Scalar),
    Nested(BTreeMap<String, JsonValue>),
}

impl SettingValue {
    pub fn scalar(value: impl Into<Scalar>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn nested<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<JsonValue>,
    {
        Self::Nested(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Nested(_))
    }
}

/// Merge `incoming` into `target` key by key.
pub fn merge_settings(target: &mut SettingsMap, incoming: &SettingsMap) {
    for (key, value) in incoming {
        match (target.get_mut(key), value) {
            (Some(SettingValue::Nested(existing)), SettingValue::Nested(update)) => {
                existing.extend(update.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Personalizations {
    pub theme: SettingsMap,
    pub adaptive_settings: SettingsMap,
    pub learned_preferences: SettingsMap,
}

impl Personalizations {
    /// Merge every section of `incoming` into `self`.
    pub fn merge(&mut self, incoming: &Personalizations) {
        merge_settings(&mut self.theme, &incoming.theme);
        merge_settings(&mut self.adaptive_settings, &incoming.adaptive_settings);
        merge_settings(&mut self.learned_preferences, &incoming.learned_preferences);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Metadata
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[default]
    Desktop,
    Tablet,
    Mobile,
}

impl DeviceType {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Tablet => "tablet",
            Self::Mobile => "mobile",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Environment snapshot captured once at session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub device_type: DeviceType,
    pub browser: String,
    pub user_agent: String,
    pub timezone: String,
    pub language: String,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Desktop,
            browser: "Unknown".to_string(),
            user_agent: String::new(),
            timezone: "UTC".to_string(),
            language: "en".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Milliseconds between start and last activity (or end once ended).
    pub session_duration: u64,
    pub is_active: bool,
    pub interaction_count: u64,
    pub preferences: Preferences,
    #[serde(default)]
    pub conversation_contexts: BTreeMap<String, ConversationContext>,
    #[serde(default)]
    pub behavior_patterns: BTreeMap<String, BehaviorPattern>,
    #[serde(default)]
    pub personalizations: Personalizations,
    pub metadata: SessionMetadata,
}

impl Session {
    /// Recompute `session_duration` from the current timestamps.
    pub fn refresh_duration(&mut self) {
        let until = self.end_time.unwrap_or(self.last_activity);
        self.session_duration = (until - self.start_time).num_milliseconds().max(0) as u64;
    }

    /// Close the session at `ended_at` (clamped to not precede its start).
    pub fn finalize(&mut self, ended_at: DateTime<Utc>) {
        self.end_time = Some(ended_at.max(self.start_time));
        self.is_active = false;
        self.refresh_duration();
    }

    /// Instant the session stopped being used: end time, or last activity.
    pub fn closed_at(&self) -> DateTime<Utc> {
        self.end_time.unwrap_or(self.last_activity)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Activity & Events
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of interaction recorded against a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActivityKind {
    #[default]
    Message,
    PreferenceChange,
    ContextUpdate,
    Behavior,
    Personalization,
    Merge,
    Custom(String),
}

impl ActivityKind {
    /// Convert from string; unknown names become `Custom`
    pub fn parse(s: &str) -> Self {
        match s {
            "message" => Self::Message,
            "preference_change" => Self::PreferenceChange,
            "context_update" => Self::ContextUpdate,
            "behavior" => Self::Behavior,
            "personalization" => Self::Personalization,
            "merge" => Self::Merge,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::PreferenceChange => "preference_change",
            Self::ContextUpdate => "context_update",
            Self::Behavior => "behavior",
            Self::Personalization => "personalization",
            Self::Merge => "merge",
            Self::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a session left the active map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Explicit end requested by the caller.
    Explicit,
    /// A new session was started for the same user.
    Replaced,
    /// Idle past the timeout (sweep or lazy read).
    Expired,
    /// Process teardown.
    Shutdown,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Replaced => "replaced",
            Self::Expired => "expired",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Change notification emitted by the session store.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub user_id: String,
    pub session_id: String,
    pub kind: SessionEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    Started,
    Updated,
    Ended(EndReason),
    Deleted,
}

// ─────────────────────────────────────────────────────────────────────────────
// Metrics & Export
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Enumeration order, also the tie-break order.
    pub const ALL: [TimeOfDay; 4] = [Self::Morning, Self::Afternoon, Self::Evening, Self::Night];

    /// Bucket an hour of day (0-23).
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            18..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    /// Mean session duration in milliseconds.
    pub average_session_duration: f64,
    pub total_sessions: usize,
    pub active_sessions_count: usize,
    pub most_active_time_of_day: Option<TimeOfDay>,
    pub frequent_device_type: Option<DeviceType>,
    pub session_consistency: f64,
}

/// Deep copy of everything held for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub user_id: String,
    pub active_session: Option<Session>,
    pub history: Vec<Session>,
    pub exported_at: DateTime<Utc>,
}

/// Aggregate counts across the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub users: usize,
    pub active_sessions: usize,
    pub archived_sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_preferences_apply_partial_update() {
        let mut prefs = Preferences::default();
        prefs.apply(
            PreferencesUpdate::default()
                .with_theme(Theme::Dark)
                .with_custom("density", "compact"),
        );

        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.language, "en");
        assert_eq!(prefs.custom_settings["density"], JsonValue::from("compact"));

        prefs.apply(PreferencesUpdate::default().with_custom("sidebar", true));
        assert_eq!(prefs.custom_settings.len(), 2);
    }

    #[test]
    fn test_merge_settings_nested_and_scalar() {
        let mut target = SettingsMap::new();
        target.insert("layout".into(), SettingValue::nested([("cols", 2), ("rows", 3)]));
        target.insert("accent".into(), SettingValue::scalar("blue"));

        let mut incoming = SettingsMap::new();
        incoming.insert("layout".into(), SettingValue::nested([("cols", 4)]));
        incoming.insert("accent".into(), SettingValue::scalar("green"));

        merge_settings(&mut target, &incoming);

        let SettingValue::Nested(layout) = &target["layout"] else {
            panic!("layout should stay nested");
        };
        assert_eq!(layout["cols"], JsonValue::from(4));
        assert_eq!(layout["rows"], JsonValue::from(3));
        assert_eq!(target["accent"], SettingValue::scalar("green"));
    }

    #[test]
    fn test_scalar_overwrites_nested() {
        let mut target = SettingsMap::new();
        target.insert("mode".into(), SettingValue::nested([("a", 1)]));

        let mut incoming = SettingsMap::new();
        incoming.insert("mode".into(), SettingValue::scalar(false));
        merge_settings(&mut target, &incoming);

        assert_eq!(target["mode"], SettingValue::scalar(false));
    }

    #[test]
    fn test_setting_value_untagged_serde() {
        let map: SettingsMap =
            serde_json::from_str(r#"{"a": 1, "b": 1.5, "c": "x", "d": {"k": [1, 2]}}"#).unwrap();
        assert_eq!(map["a"], SettingValue::Scalar(Scalar::Int(1)));
        assert_eq!(map["b"], SettingValue::Scalar(Scalar::Float(1.5)));
        assert_eq!(map["c"], SettingValue::scalar("x"));
        assert!(map["d"].is_nested());
    }

    #[test]
    fn test_session_finalize_duration() {
        let mut session = Session {
            id: "s1".into(),
            user_id: "u1".into(),
            start_time: ts(1_000),
            last_activity: ts(1_060),
            end_time: None,
            session_duration: 0,
            is_active: true,
            interaction_count: 0,
            preferences: Preferences::default(),
            conversation_contexts: BTreeMap::new(),
            behavior_patterns: BTreeMap::new(),
            personalizations: Personalizations::default(),
            metadata: SessionMetadata::default(),
        };

        session.refresh_duration();
        assert_eq!(session.session_duration, 60_000);

        session.finalize(ts(1_120));
        assert!(!session.is_active);
        assert_eq!(session.session_duration, 120_000);

        // An end before the start never yields a negative duration
        session.finalize(ts(900));
        assert_eq!(session.session_duration, 0);
    }

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(22), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(3), TimeOfDay::Night);
    }

    #[test]
    fn test_activity_kind_parse() {
        assert_eq!(ActivityKind::parse("message"), ActivityKind::Message);
        assert_eq!(
            ActivityKind::parse("scrolled"),
            ActivityKind::Custom("scrolled".into())
        );
        assert_eq!(ActivityKind::Merge.to_string(), "merge");
    }
}
