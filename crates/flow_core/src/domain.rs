//! crates/flow_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs carry serde derives because they cross the wire unchanged
//! (REST bodies and the editor WebSocket protocol both use them).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The result of scoring a passage: an engagement rating in [-1, 1] and a
/// short explanation of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibeAnalysis {
    pub score: f64,
    pub reason: String,
}

/// One entry in a draft's vibe history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibeRecord {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub reason: String,
}

/// A single saved snapshot of a draft, listed in version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub title: String,
}

/// Marker stamped on a draft after a version restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredFrom {
    pub version_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub restored_at: DateTime<Utc>,
}

/// Everything about a draft except its content body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftMetadata {
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_vibe: Option<f64>,
    #[serde(default)]
    pub vibe_history: Vec<VibeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_from: Option<RestoredFrom>,
}

impl DraftMetadata {
    /// Fresh metadata for a draft that has never been saved.
    pub fn untitled(now: DateTime<Utc>) -> Self {
        Self {
            title: "Untitled Draft".to_string(),
            created_at: now,
            updated_at: now,
            last_vibe: None,
            vibe_history: Vec::new(),
            restored_from: None,
        }
    }
}

/// A user-owned persisted document with content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub metadata: DraftMetadata,
}

/// A listing entry: metadata plus the draft's id, no content body, so the
/// home screen can poll the list cheaply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSummary {
    pub id: Uuid,
    #[serde(flatten)]
    pub metadata: DraftMetadata,
}

/// The two editing modes the app offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritingMode {
    Writer,
    Vibe,
}

/// Formats a draft can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Md,
    Txt,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Md => "md",
            ExportFormat::Txt => "txt",
        }
    }
}

/// Focus mode configuration. Mutated via partial merges only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSettings {
    pub enabled: bool,
    pub typewriter_mode: bool,
    pub hide_ui: bool,
    pub ambient_mode: bool,
    pub line_highlight: bool,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            typewriter_mode: false,
            hide_ui: false,
            ambient_mode: false,
            line_highlight: true,
        }
    }
}

/// Partial update for [`FocusSettings`]; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSettingsPatch {
    pub enabled: Option<bool>,
    pub typewriter_mode: Option<bool>,
    pub hide_ui: Option<bool>,
    pub ambient_mode: Option<bool>,
    pub line_highlight: Option<bool>,
}

impl FocusSettings {
    pub fn merge(&mut self, patch: FocusSettingsPatch) {
        if let Some(v) = patch.enabled {
            self.enabled = v;
        }
        if let Some(v) = patch.typewriter_mode {
            self.typewriter_mode = v;
        }
        if let Some(v) = patch.hide_ui {
            self.hide_ui = v;
        }
        if let Some(v) = patch.ambient_mode {
            self.ambient_mode = v;
        }
        if let Some(v) = patch.line_highlight {
            self.line_highlight = v;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    Serif,
    SansSerif,
    Mono,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    Medium,
    Large,
    Xlarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineHeight {
    Tight,
    Normal,
    Relaxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxWidth {
    Narrow,
    Medium,
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Sepia,
}

/// Reading mode configuration. Mutated via partial merges only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingModeSettings {
    pub enabled: bool,
    pub font_family: FontFamily,
    pub font_size: FontSize,
    pub line_height: LineHeight,
    pub max_width: MaxWidth,
    pub theme: Theme,
}

impl Default for ReadingModeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            font_family: FontFamily::Serif,
            font_size: FontSize::Large,
            line_height: LineHeight::Relaxed,
            max_width: MaxWidth::Narrow,
            theme: Theme::Light,
        }
    }
}

/// Partial update for [`ReadingModeSettings`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingModeSettingsPatch {
    pub enabled: Option<bool>,
    pub font_family: Option<FontFamily>,
    pub font_size: Option<FontSize>,
    pub line_height: Option<LineHeight>,
    pub max_width: Option<MaxWidth>,
    pub theme: Option<Theme>,
}

impl ReadingModeSettings {
    pub fn merge(&mut self, patch: ReadingModeSettingsPatch) {
        if let Some(v) = patch.enabled {
            self.enabled = v;
        }
        if let Some(v) = patch.font_family {
            self.font_family = v;
        }
        if let Some(v) = patch.font_size {
            self.font_size = v;
        }
        if let Some(v) = patch.line_height {
            self.line_height = v;
        }
        if let Some(v) = patch.max_width {
            self.max_width = v;
        }
        if let Some(v) = patch.theme {
            self.theme = v;
        }
    }
}

/// One sampled point of the session's vibe progression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibePoint {
    pub time: DateTime<Utc>,
    pub score: f64,
}

/// Per-session writing statistics. Created when the editing session opens,
/// finalized (end_time set) when it closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Words written during the session (delta vs. `initial_word_count`,
    /// negative when the writer deletes more than they add).
    pub word_count: i64,
    pub initial_word_count: usize,
    pub vibe_progression: Vec<VibePoint>,
    /// Minutes spent in flow state (vibe score > 0.2).
    pub flow_duration: f64,
    pub average_vibe: f64,
}

impl SessionStats {
    pub fn begin(initial_word_count: usize, now: DateTime<Utc>) -> Self {
        Self {
            start_time: now,
            end_time: None,
            word_count: 0,
            initial_word_count,
            vibe_progression: Vec::new(),
            flow_duration: 0.0,
            average_vibe: 0.0,
        }
    }
}

// Represents a user - used throughout the app.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A user's consecutive-day writing streak.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakState {
    pub current_streak: u32,
    pub last_written: Option<NaiveDate>,
}
