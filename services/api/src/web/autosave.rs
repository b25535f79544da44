//! services/api/src/web/autosave.rs
//!
//! This module contains the save worker and the periodic autosave loop for
//! one editing session.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, EditorMode, WsSession},
};
use chrono::Utc;
use flow_core::passage::normalize_content;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// How often the autosave loop checks for unsaved changes.
const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(10);

/// Persists the session's current content, creating the draft on first save.
///
/// The saved baseline moves only after the store confirms the write, so a
/// failed save leaves the session reporting unsaved changes and the next
/// autosave pass retries. There is nothing to roll back on failure.
pub async fn save_draft(
    app_state: Arc<AppState>,
    session_lock: Arc<Mutex<WsSession>>,
    outbound: UnboundedSender<ServerMessage>,
) {
    let (content, draft_id, metadata, user_id) = {
        let mut session = session_lock.lock().await;
        if session.mode != EditorMode::Ready {
            info!("Skipping save while the editor is {:?}.", session.mode);
            return;
        }
        session.mode = EditorMode::Saving;
        (
            normalize_content(session.editor.content()),
            session.editor.current_draft_id(),
            session.editor.metadata().clone(),
            session.user_id,
        )
    };

    let result = match draft_id {
        Some(id) => app_state
            .store
            .update_draft(user_id, id, &content, &metadata)
            .await
            .map(|_| id),
        None => app_state.store.create_draft(user_id, &content, &metadata).await,
    };

    let mut session = session_lock.lock().await;
    session.mode = EditorMode::Ready;

    match result {
        Ok(id) => {
            let now = Utc::now();
            session.editor.set_draft_id(id);
            session.editor.mark_saved(&content, now);
            let _ = outbound.send(ServerMessage::Saved {
                draft_id: id,
                saved_at: now,
            });
            tokio::spawn(record_writing_day(app_state.clone(), user_id));
        }
        Err(e) => {
            error!("Failed to save draft: {:?}", e);
            let _ = outbound.send(ServerMessage::Error {
                message: "Failed to save draft. Your changes are kept in the editor.".to_string(),
            });
        }
    }
}

/// The periodic autosave task for one connection. Runs until the session's
/// shutdown token fires; a pass that finds no unsaved changes does nothing.
pub async fn autosave_loop(
    app_state: Arc<AppState>,
    session_lock: Arc<Mutex<WsSession>>,
    outbound: UnboundedSender<ServerMessage>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(AUTOSAVE_INTERVAL);
    // The first tick fires immediately; skip it so saves start one full
    // interval after the session opens.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let dirty = session_lock.lock().await.editor.has_unsaved_changes();
                if dirty {
                    save_draft(app_state.clone(), session_lock.clone(), outbound.clone()).await;
                }
            }
        }
    }
}

/// A "fire-and-forget" background task advancing the user's writing streak.
/// Failures are logged and never surface to the save that triggered them.
async fn record_writing_day(app_state: Arc<AppState>, user_id: Uuid) {
    let today = Utc::now().date_naive();
    let mut streak = match app_state.store.load_streak(user_id).await {
        Ok(streak) => streak,
        Err(e) => {
            error!("Failed to load streak for user {}: {:?}", user_id, e);
            return;
        }
    };
    streak.record_writing_day(today);
    if let Err(e) = app_state.store.store_streak(user_id, &streak).await {
        error!("Failed to store streak for user {}: {:?}", user_id, e);
    }
}
