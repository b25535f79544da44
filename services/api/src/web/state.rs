//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::config::Config;
use chrono::Utc;
use flow_core::ports::{DraftExporter, DraftStore, PortResult, VibeAnalyzer};
use flow_core::session::EditorSession;
use flow_core::VibeAnalysis;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DraftStore>,
    pub analyzer: Arc<dyn VibeAnalyzer>,
    pub exporter: Arc<dyn DraftExporter>,
    pub config: Arc<Config>,
}

//=========================================================================================
// WsSession (Specific to One WebSocket Connection)
//=========================================================================================

/// An enum representing the editor's current mode. Transient modes always
/// return to `Ready` when their operation completes, success or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Loading,
    Ready,
    Saving,
    Analyzing,
    ExportingVersion,
}

/// The state for a single, active WebSocket connection.
pub struct WsSession {
    pub user_id: Uuid,
    pub editor: EditorSession,
    pub mode: EditorMode,
    /// The passage text of the last analysis that ran, so an unchanged
    /// passage is never re-analyzed.
    pub last_analyzed: Option<String>,
    /// The verdict for the current selection, if one is highlighted.
    pub selection_vibe: Option<VibeAnalysis>,
    /// Bumped when a new document analysis starts; a completed analysis whose
    /// generation no longer matches is stale and gets dropped.
    pub document_generation: u64,
    /// Same stale-drop scheme for selection analyses.
    pub selection_generation: u64,
    /// A token that tears down this connection's background tasks.
    pub shutdown: CancellationToken,
}

//=========================================================================================
// WsSession Implementation (Constructor)
//=========================================================================================

impl WsSession {
    /// Creates a new `WsSession`, loading the named draft from the store when
    /// a draft id was given.
    pub async fn new(
        app_state: Arc<AppState>,
        user_id: Uuid,
        draft_id: Option<Uuid>,
    ) -> PortResult<Self> {
        let now = Utc::now();
        let editor = match draft_id {
            Some(id) => {
                let draft = app_state.store.load_draft(user_id, id).await?;
                EditorSession::from_draft(draft, now)
            }
            None => EditorSession::new(now),
        };

        Ok(Self {
            user_id,
            editor,
            mode: EditorMode::Loading,
            last_analyzed: None,
            selection_vibe: None,
            document_generation: 0,
            selection_generation: 0,
            shutdown: CancellationToken::new(),
        })
    }
}
