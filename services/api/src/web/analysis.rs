//! services/api/src/web/analysis.rs
//!
//! This module contains the asynchronous "worker" functions responsible for
//! running a single vibe analysis pass, either over the document's current
//! passage or over a highlighted selection.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, EditorMode, WsSession},
};
use chrono::Utc;
use flow_core::domain::{VibeAnalysis, VibeRecord};
use flow_core::passage::{current_passage, strip_tags, word_count};
use flow_core::vibe::{document_fallback_reason, needs_fallback_reason, selection_fallback_reason};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

/// The main asynchronous task for analyzing the document's current passage.
///
/// The session lock is released while the provider call is in flight. A
/// generation counter snapshot taken before the call detects whether a newer
/// analysis started in the meantime; if so this one's result is stale and is
/// dropped without touching the session.
pub async fn analyze_document(
    app_state: Arc<AppState>,
    session_lock: Arc<Mutex<WsSession>>,
    outbound: UnboundedSender<ServerMessage>,
) {
    let (passage, user_id, draft_id, generation) = {
        let mut session = session_lock.lock().await;

        let plain = strip_tags(session.editor.content());
        session.editor.update_word_count(word_count(&plain));

        let passage = current_passage(&plain).to_string();
        if passage.is_empty() {
            let vibe = VibeAnalysis {
                score: 0.0,
                reason: "No text to analyze".to_string(),
            };
            session.editor.set_vibe(vibe.clone(), Utc::now());
            session.last_analyzed = None;
            let _ = outbound.send(ServerMessage::VibeUpdated { vibe });
            return;
        }

        // An unchanged passage never triggers a second provider call.
        if session.last_analyzed.as_deref() == Some(passage.as_str()) {
            return;
        }

        session.document_generation += 1;
        session.mode = EditorMode::Analyzing;
        (
            passage,
            session.user_id,
            session.editor.current_draft_id(),
            session.document_generation,
        )
    };

    info!("Analyzing passage ({} chars).", passage.len());
    let result = app_state.analyzer.analyze(&passage).await;

    let mut session = session_lock.lock().await;
    if session.document_generation != generation {
        info!("Dropping stale analysis result.");
        return;
    }
    session.mode = EditorMode::Ready;

    match result {
        Ok(outcome) => {
            let mut vibe = outcome.analysis;
            if needs_fallback_reason(&vibe.reason) {
                vibe.reason = document_fallback_reason(vibe.score).to_string();
            }

            let now = Utc::now();
            session.editor.set_vibe(vibe.clone(), now);
            session.last_analyzed = Some(passage);
            let _ = outbound.send(ServerMessage::VibeUpdated { vibe: vibe.clone() });

            if let Some(draft_id) = draft_id {
                let record = VibeRecord {
                    timestamp: now,
                    score: vibe.score,
                    reason: vibe.reason,
                };
                tokio::spawn(persist_analysis(
                    app_state.clone(),
                    user_id,
                    draft_id,
                    record,
                    outcome.tokens_used,
                ));
            }
        }
        Err(e) => {
            // The previous vibe stays on screen; a failed analysis is not an
            // editing error.
            error!("Vibe analysis failed: {:?}", e);
        }
    }
}

/// The asynchronous task for analyzing a highlighted selection.
///
/// Selections are scored as given, without passage extraction, and use their
/// own generation counter so a document analysis never invalidates one.
pub async fn analyze_selection(
    app_state: Arc<AppState>,
    session_lock: Arc<Mutex<WsSession>>,
    outbound: UnboundedSender<ServerMessage>,
    text: String,
) {
    let generation = {
        let mut session = session_lock.lock().await;

        if text.trim().is_empty() {
            session.selection_vibe = None;
            let _ = outbound.send(ServerMessage::SelectionCleared);
            return;
        }

        session.selection_generation += 1;
        session.selection_generation
    };

    let result = app_state.analyzer.analyze(&text).await;

    let mut session = session_lock.lock().await;
    if session.selection_generation != generation {
        info!("Dropping stale selection result.");
        return;
    }

    match result {
        Ok(outcome) => {
            let mut vibe = outcome.analysis;
            if needs_fallback_reason(&vibe.reason) {
                vibe.reason = selection_fallback_reason(vibe.score).to_string();
            }
            session.selection_vibe = Some(vibe.clone());
            let _ = outbound.send(ServerMessage::SelectionVibe { vibe });
        }
        Err(e) => {
            error!("Selection analysis failed: {:?}", e);
        }
    }
}

/// A "fire-and-forget" background task persisting the analysis record and the
/// token spend. Failures here are logged and never surface to the editor.
async fn persist_analysis(
    app_state: Arc<AppState>,
    user_id: Uuid,
    draft_id: Uuid,
    record: VibeRecord,
    tokens_used: i64,
) {
    if let Err(e) = app_state.store.append_vibe_record(draft_id, &record).await {
        error!("Failed to persist vibe record for draft {}: {:?}", draft_id, e);
    }
    if let Err(e) = app_state
        .store
        .record_usage(user_id, "analyze", tokens_used, 0)
        .await
    {
        error!("Failed to record usage for user {}: {:?}", user_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::testing::{test_app_state, test_session, ScriptedAnalyzer};
    use flow_core::ports::PortError;
    use tokio::sync::mpsc::unbounded_channel;

    async fn session_behind_lock(app_state: &Arc<AppState>) -> Arc<Mutex<WsSession>> {
        Arc::new(Mutex::new(test_session(app_state).await))
    }

    #[tokio::test]
    async fn empty_content_yields_the_no_text_verdict_without_a_provider_call() {
        let analyzer = ScriptedAnalyzer::default();
        let app_state = test_app_state(analyzer.clone());
        let session = session_behind_lock(&app_state).await;
        let (tx, mut rx) = unbounded_channel();

        analyze_document(app_state, session.clone(), tx).await;

        let msg = rx.try_recv().unwrap();
        let ServerMessage::VibeUpdated { vibe } = msg else {
            panic!("expected VibeUpdated");
        };
        assert_eq!(vibe.score, 0.0);
        assert_eq!(vibe.reason, "No text to analyze");
        assert_eq!(analyzer.calls(), 0);
    }

    #[tokio::test]
    async fn an_unchanged_passage_is_not_reanalyzed() {
        let analyzer = ScriptedAnalyzer::scoring(0.5, "Good rhythm.");
        let app_state = test_app_state(analyzer.clone());
        let session = session_behind_lock(&app_state).await;
        session
            .lock()
            .await
            .editor
            .set_content("<p>A finished sentence. And a tail".to_string());
        let (tx, mut rx) = unbounded_channel();

        analyze_document(app_state.clone(), session.clone(), tx.clone()).await;
        analyze_document(app_state, session.clone(), tx).await;

        assert_eq!(analyzer.calls(), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn editing_the_passage_triggers_a_fresh_analysis() {
        let analyzer = ScriptedAnalyzer::scoring(0.5, "Good rhythm.");
        let app_state = test_app_state(analyzer.clone());
        let session = session_behind_lock(&app_state).await;
        let (tx, _rx) = unbounded_channel();

        session
            .lock()
            .await
            .editor
            .set_content("<p>A finished sentence. Tail one".to_string());
        analyze_document(app_state.clone(), session.clone(), tx.clone()).await;

        session
            .lock()
            .await
            .editor
            .set_content("<p>A finished sentence. A second one landed. tail".to_string());
        analyze_document(app_state, session.clone(), tx).await;

        assert_eq!(analyzer.calls(), 2);
    }

    #[tokio::test]
    async fn provider_failure_retains_the_previous_vibe() {
        let analyzer = ScriptedAnalyzer::failing(PortError::RateLimited);
        let app_state = test_app_state(analyzer.clone());
        let session = session_behind_lock(&app_state).await;
        {
            let mut s = session.lock().await;
            s.editor.set_content("<p>Something worth scoring.".to_string());
            s.editor.set_vibe(
                VibeAnalysis {
                    score: 0.7,
                    reason: "Earlier verdict.".to_string(),
                },
                Utc::now(),
            );
        }
        let (tx, mut rx) = unbounded_channel();

        analyze_document(app_state, session.clone(), tx).await;

        assert!(rx.try_recv().is_err());
        let s = session.lock().await;
        assert_eq!(s.editor.vibe().unwrap().score, 0.7);
        assert_eq!(s.mode, EditorMode::Ready);
    }

    #[tokio::test]
    async fn a_result_from_a_superseded_analysis_is_dropped() {
        let (analyzer, gate) = ScriptedAnalyzer::scoring(0.9, "Late verdict.").gated();
        let app_state = test_app_state(analyzer.clone());
        let session = session_behind_lock(&app_state).await;
        session
            .lock()
            .await
            .editor
            .set_content("<p>The original passage.".to_string());
        let (tx, mut rx) = unbounded_channel();

        let worker = tokio::spawn(analyze_document(app_state, session.clone(), tx));
        while analyzer.calls() == 0 {
            tokio::task::yield_now().await;
        }

        // A newer analysis starts while the first is still in flight.
        session.lock().await.document_generation += 1;
        gate.add_permits(1);
        worker.await.unwrap();

        assert!(rx.try_recv().is_err());
        assert!(session.lock().await.editor.vibe().is_none());
    }

    #[tokio::test]
    async fn blank_reasons_fall_back_to_the_score_bucket() {
        let analyzer = ScriptedAnalyzer::scoring(0.8, "");
        let app_state = test_app_state(analyzer.clone());
        let session = session_behind_lock(&app_state).await;
        session
            .lock()
            .await
            .editor
            .set_content("<p>Blazing prose everywhere.".to_string());
        let (tx, mut rx) = unbounded_channel();

        analyze_document(app_state, session, tx).await;

        let ServerMessage::VibeUpdated { vibe } = rx.try_recv().unwrap() else {
            panic!("expected VibeUpdated");
        };
        assert_eq!(vibe.reason, document_fallback_reason(0.8));
    }

    #[tokio::test]
    async fn an_empty_selection_clears_the_verdict() {
        let analyzer = ScriptedAnalyzer::default();
        let app_state = test_app_state(analyzer.clone());
        let session = session_behind_lock(&app_state).await;
        session.lock().await.selection_vibe = Some(VibeAnalysis {
            score: 0.2,
            reason: "old".to_string(),
        });
        let (tx, mut rx) = unbounded_channel();

        analyze_selection(app_state, session.clone(), tx, "   ".to_string()).await;

        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::SelectionCleared
        ));
        assert!(session.lock().await.selection_vibe.is_none());
        assert_eq!(analyzer.calls(), 0);
    }

    #[tokio::test]
    async fn a_selection_is_scored_as_given() {
        let analyzer = ScriptedAnalyzer::scoring(-0.3, "");
        let app_state = test_app_state(analyzer.clone());
        let session = session_behind_lock(&app_state).await;
        let (tx, mut rx) = unbounded_channel();

        analyze_selection(
            app_state,
            session.clone(),
            tx,
            "a fragment without a terminator".to_string(),
        )
        .await;

        let ServerMessage::SelectionVibe { vibe } = rx.try_recv().unwrap() else {
            panic!("expected SelectionVibe");
        };
        assert_eq!(vibe.score, -0.3);
        assert_eq!(vibe.reason, selection_fallback_reason(-0.3));
        assert_eq!(analyzer.calls(), 1);
    }
}
