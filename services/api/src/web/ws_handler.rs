//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for an editing WebSocket
//! connection. It manages the session's state machine and delegates tasks.

use crate::web::{
    analysis::{analyze_document, analyze_selection},
    autosave::{autosave_loop, save_draft},
    debounce::Debouncer,
    protocol::{ClientMessage, ServerMessage},
    state::{AppState, EditorMode, WsSession},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use chrono::Utc;
use flow_core::domain::Draft;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Quiet period before an edited passage is re-analyzed.
const ANALYSIS_DEBOUNCE: Duration = Duration::from_millis(300);
/// Delay before the first analysis pass after the session opens.
const INITIAL_ANALYSIS_DELAY: Duration = Duration::from_millis(500);

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!("New editor connection established for user: {}", user_id);

    let (mut sender, mut receiver) = socket.split();

    // All outbound traffic funnels through one channel so the worker tasks
    // never contend for the socket directly.
    let (outbound, mut outbound_rx) = unbounded_channel::<ServerMessage>();
    let forwarder = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let json = serde_json::to_string(&msg).unwrap();
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // --- 1. Initialization Phase ---
    let session_lock: Arc<Mutex<WsSession>>;
    if let Some(Ok(Message::Text(init_json))) = receiver.next().await {
        match serde_json::from_str::<ClientMessage>(&init_json) {
            Ok(ClientMessage::Init { draft_id }) => {
                let state = match WsSession::new(app_state.clone(), user_id, draft_id).await {
                    Ok(state) => state,
                    Err(e) => {
                        // A draft that fails to load falls back to a fresh
                        // untitled one rather than a dead connection.
                        error!("Failed to load draft {:?}: {:?}", draft_id, e);
                        let _ = outbound.send(ServerMessage::Error {
                            message: "Failed to load draft. Starting a new one.".to_string(),
                        });
                        match WsSession::new(app_state.clone(), user_id, None).await {
                            Ok(state) => state,
                            Err(e) => {
                                error!("Failed to open a fresh session: {:?}", e);
                                return;
                            }
                        }
                    }
                };
                session_lock = Arc::new(Mutex::new(state));

                let mut session = session_lock.lock().await;
                session.mode = EditorMode::Ready;
                session.editor.start_session(Utc::now());
                let _ = outbound.send(ServerMessage::SessionReady {
                    draft_id: session.editor.current_draft_id(),
                    content: session.editor.content().to_string(),
                    metadata: session.editor.metadata().clone(),
                });
            }
            _ => {
                error!("First message was not a valid Init message.");
                return;
            }
        }
    } else {
        error!("Client disconnected before sending Init message.");
        return;
    }

    let shutdown = session_lock.lock().await.shutdown.clone();

    // --- 2. Background Tasks ---
    tokio::spawn(autosave_loop(
        app_state.clone(),
        session_lock.clone(),
        outbound.clone(),
        shutdown.clone(),
    ));

    // One analysis pass shortly after opening, so a loaded draft gets a
    // verdict without waiting for the first edit.
    {
        let app_state = app_state.clone();
        let session_lock = session_lock.clone();
        let outbound = outbound.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(INITIAL_ANALYSIS_DELAY) => {
                    analyze_document(app_state, session_lock, outbound).await;
                }
            }
        });
    }

    // --- 3. Main Message Loop ---
    let mut document_debouncer = Debouncer::new(ANALYSIS_DEBOUNCE);
    let mut selection_debouncer = Debouncer::new(ANALYSIS_DEBOUNCE);

    loop {
        if let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text_message(
                        text.to_string(),
                        &app_state,
                        &session_lock,
                        &outbound,
                        &mut document_debouncer,
                        &mut selection_debouncer,
                    )
                    .await;
                }
                Message::Close(_) => {
                    info!("Client sent close message.");
                    break;
                }
                _ => {}
            }
        } else {
            info!("Client disconnected.");
            break;
        }
    }

    // --- 4. Cleanup ---
    document_debouncer.cancel();
    selection_debouncer.cancel();
    shutdown.cancel();

    let dirty = session_lock.lock().await.editor.has_unsaved_changes();
    if dirty {
        save_draft(app_state.clone(), session_lock.clone(), outbound.clone()).await;
    }

    if let Some(stats) = session_lock.lock().await.editor.end_session(Utc::now()) {
        let _ = outbound.send(ServerMessage::SessionEnded { stats });
    }

    drop(outbound);
    let _ = forwarder.await;
    info!("Editor connection closed for user: {}", user_id);
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: String,
    app_state: &Arc<AppState>,
    session_lock: &Arc<Mutex<WsSession>>,
    outbound: &UnboundedSender<ServerMessage>,
    document_debouncer: &mut Debouncer,
    selection_debouncer: &mut Debouncer,
) {
    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(client_msg) => match client_msg {
            ClientMessage::TextChanged { content } => {
                session_lock.lock().await.editor.set_content(content);
                let app_state = app_state.clone();
                let session_lock = session_lock.clone();
                let outbound = outbound.clone();
                document_debouncer.call(move || {
                    analyze_document(app_state, session_lock, outbound)
                });
            }
            ClientMessage::SelectionChanged { text } => {
                if text.trim().is_empty() {
                    // Clearing the selection is immediate; only fresh
                    // selections wait out the quiet period.
                    selection_debouncer.cancel();
                    tokio::spawn(analyze_selection(
                        app_state.clone(),
                        session_lock.clone(),
                        outbound.clone(),
                        text,
                    ));
                } else {
                    let app_state = app_state.clone();
                    let session_lock = session_lock.clone();
                    let outbound = outbound.clone();
                    selection_debouncer.call(move || {
                        analyze_selection(app_state, session_lock, outbound, text)
                    });
                }
            }
            ClientMessage::SetTitle { title } => {
                session_lock.lock().await.editor.set_title(title, Utc::now());
            }
            ClientMessage::SetWritingMode { mode } => {
                session_lock.lock().await.editor.set_writing_mode(mode);
            }
            ClientMessage::SetFocusSettings { patch } => {
                session_lock.lock().await.editor.merge_focus_settings(patch);
            }
            ClientMessage::SetReadingModeSettings { patch } => {
                session_lock
                    .lock()
                    .await
                    .editor
                    .merge_reading_mode_settings(patch);
            }
            ClientMessage::Save => {
                save_draft(app_state.clone(), session_lock.clone(), outbound.clone()).await;
            }
            ClientMessage::Export { format } => {
                let draft = {
                    let mut session = session_lock.lock().await;
                    if session.mode != EditorMode::Ready {
                        info!("Skipping export while the editor is {:?}.", session.mode);
                        return;
                    }
                    session.mode = EditorMode::ExportingVersion;
                    Draft {
                        id: session.editor.current_draft_id().unwrap_or_else(Uuid::new_v4),
                        user_id: session.user_id,
                        content: session.editor.content().to_string(),
                        metadata: session.editor.metadata().clone(),
                    }
                };

                let result = app_state.exporter.export(&draft, format).await;

                let mut session = session_lock.lock().await;
                session.mode = EditorMode::Ready;
                match result {
                    Ok(path) => {
                        let _ = outbound.send(ServerMessage::Exported {
                            path: path.display().to_string(),
                        });
                    }
                    Err(e) => {
                        error!("Export failed: {:?}", e);
                        let _ = outbound.send(ServerMessage::Error {
                            message: "Failed to export the draft.".to_string(),
                        });
                    }
                }
            }
            ClientMessage::ListVersions => {
                let (user_id, draft_id) = {
                    let session = session_lock.lock().await;
                    (session.user_id, session.editor.current_draft_id())
                };
                let Some(draft_id) = draft_id else {
                    // An unsaved draft has no history yet.
                    let _ = outbound.send(ServerMessage::Versions { versions: Vec::new() });
                    return;
                };
                match app_state.store.list_versions(user_id, draft_id).await {
                    Ok(versions) => {
                        let _ = outbound.send(ServerMessage::Versions { versions });
                    }
                    Err(e) => {
                        error!("Failed to list versions: {:?}", e);
                        let _ = outbound.send(ServerMessage::Error {
                            message: "Failed to load version history.".to_string(),
                        });
                    }
                }
            }
            ClientMessage::RestoreVersion { version_id } => {
                let (user_id, draft_id) = {
                    let session = session_lock.lock().await;
                    (session.user_id, session.editor.current_draft_id())
                };
                let Some(draft_id) = draft_id else {
                    let _ = outbound.send(ServerMessage::Error {
                        message: "Save the draft before restoring a version.".to_string(),
                    });
                    return;
                };
                match app_state
                    .store
                    .restore_version(user_id, draft_id, version_id)
                    .await
                {
                    Ok(draft) => {
                        let mut session = session_lock.lock().await;
                        session.editor.restore_version(draft, Utc::now());
                        // The content changed out from under the analyzer.
                        session.last_analyzed = None;
                        let _ = outbound.send(ServerMessage::VersionRestored {
                            content: session.editor.content().to_string(),
                            metadata: session.editor.metadata().clone(),
                        });
                    }
                    Err(e) => {
                        error!("Failed to restore version {}: {:?}", version_id, e);
                        let _ = outbound.send(ServerMessage::Error {
                            message: "Failed to restore the version.".to_string(),
                        });
                    }
                }
            }
            ClientMessage::Init { .. } => {
                warn!("Received subsequent Init message, which is ignored.");
            }
        },
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}
