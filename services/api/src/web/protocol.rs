//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for the writing editor application.

use chrono::{DateTime, Utc};
use flow_core::domain::{
    DraftMetadata, ExportFormat, FocusSettingsPatch, ReadingModeSettingsPatch, SessionStats,
    VersionInfo, VibeAnalysis, WritingMode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens an editing session. This must be the first message sent on the
    /// connection. A missing `draft_id` starts a fresh untitled draft.
    Init { draft_id: Option<Uuid> },

    /// The editor content changed. The server debounces these before
    /// re-analyzing the current passage.
    TextChanged { content: String },

    /// The user's text selection changed. An empty string clears the
    /// selection verdict.
    SelectionChanged { text: String },

    /// Renames the draft being edited.
    SetTitle { title: String },

    /// Switches between writer mode and vibe mode.
    SetWritingMode { mode: WritingMode },

    /// Partially updates the focus mode settings.
    SetFocusSettings { patch: FocusSettingsPatch },

    /// Partially updates the reading mode settings.
    SetReadingModeSettings { patch: ReadingModeSettingsPatch },

    /// An explicit save request. Autosave also runs server-side.
    Save,

    /// Exports the draft to a file in the requested format.
    Export { format: ExportFormat },

    /// Requests the draft's version history.
    ListVersions,

    /// Replaces the draft's content with the named version's snapshot.
    RestoreVersion { version_id: Uuid },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session is open and carries the loaded draft state.
    SessionReady {
        draft_id: Option<Uuid>,
        content: String,
        metadata: DraftMetadata,
    },

    /// A document analysis completed and the vibe meter should update.
    VibeUpdated { vibe: VibeAnalysis },

    /// A selection analysis completed.
    SelectionVibe { vibe: VibeAnalysis },

    /// The selection was cleared; the UI should drop the selection verdict.
    SelectionCleared,

    /// A save (manual or autosave) succeeded.
    Saved {
        draft_id: Uuid,
        saved_at: DateTime<Utc>,
    },

    /// An export finished; `path` is where the file landed server-side.
    Exported { path: String },

    /// The draft's version history, newest first.
    Versions { versions: Vec<VersionInfo> },

    /// A version restore completed and the editor should replace its content.
    VersionRestored {
        content: String,
        metadata: DraftMetadata,
    },

    /// Sent once as the connection closes, carrying the session's statistics.
    SessionEnded { stats: SessionStats },

    /// Reports an error to the client, which should display an error banner.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_message_accepts_a_missing_draft_id() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "init"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Init { draft_id: None }));

        let id = Uuid::new_v4();
        let json = format!(r#"{{"type": "init", "draft_id": "{id}"}}"#);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(msg, ClientMessage::Init { draft_id: Some(parsed) } if parsed == id));
    }

    #[test]
    fn text_changed_round_trips() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "text_changed", "content": "<p>hi</p>"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::TextChanged { content } if content == "<p>hi</p>"));
    }

    #[test]
    fn settings_patches_accept_partial_objects() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type": "set_focus_settings", "patch": {"typewriterMode": true}}"#,
        )
        .unwrap();
        let ClientMessage::SetFocusSettings { patch } = msg else {
            panic!("wrong variant");
        };
        assert_eq!(patch.typewriter_mode, Some(true));
        assert_eq!(patch.enabled, None);
    }

    #[test]
    fn server_messages_are_tagged_snake_case() {
        let msg = ServerMessage::VibeUpdated {
            vibe: VibeAnalysis {
                score: 0.4,
                reason: "Nice momentum.".to_string(),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "vibe_updated");
        assert_eq!(json["vibe"]["score"], 0.4);
    }

    #[test]
    fn export_format_is_lowercase_on_the_wire() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "export", "format": "md"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Export {
                format: ExportFormat::Md
            }
        ));
    }
}
