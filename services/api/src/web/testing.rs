//! services/api/src/web/testing.rs
//!
//! In-memory port implementations shared by the web-layer unit tests.

use crate::config::Config;
use crate::web::state::{AppState, WsSession};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flow_core::domain::{
    Draft, DraftMetadata, DraftSummary, ExportFormat, StreakState, User, UserCredentials,
    VersionInfo, VibeAnalysis, VibeRecord,
};
use flow_core::ports::{
    AnalysisOutcome, DraftExporter, DraftStore, PortError, PortResult, VibeAnalyzer,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use uuid::Uuid;

//=========================================================================================
// Scripted Analyzer
//=========================================================================================

type Respond = dyn Fn() -> PortResult<AnalysisOutcome> + Send + Sync;

/// A `VibeAnalyzer` that replays a scripted verdict and counts its calls.
/// When gated, each call blocks until the test releases a permit, which lets
/// tests interleave session mutations with an in-flight analysis.
#[derive(Clone)]
pub struct ScriptedAnalyzer {
    calls: Arc<AtomicUsize>,
    respond: Arc<Respond>,
    gate: Arc<Semaphore>,
    gated: bool,
}

impl Default for ScriptedAnalyzer {
    fn default() -> Self {
        Self::scoring(0.0, "scripted")
    }
}

impl ScriptedAnalyzer {
    pub fn scoring(score: f64, reason: &str) -> Self {
        let reason = reason.to_string();
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            respond: Arc::new(move || {
                Ok(AnalysisOutcome {
                    analysis: VibeAnalysis {
                        score,
                        reason: reason.clone(),
                    },
                    tokens_used: 42,
                })
            }),
            gate: Arc::new(Semaphore::new(0)),
            gated: false,
        }
    }

    pub fn failing(error: PortError) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            respond: Arc::new(move || Err(clone_port_error(&error))),
            gate: Arc::new(Semaphore::new(0)),
            gated: false,
        }
    }

    /// Returns a gated copy plus the semaphore that releases its calls.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        self.gated = true;
        let gate = self.gate.clone();
        (self, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn clone_port_error(e: &PortError) -> PortError {
    match e {
        PortError::NotFound(s) => PortError::NotFound(s.clone()),
        PortError::Unauthorized => PortError::Unauthorized,
        PortError::RateLimited => PortError::RateLimited,
        PortError::ProviderMisconfigured => PortError::ProviderMisconfigured,
        PortError::Unexpected(s) => PortError::Unexpected(s.clone()),
    }
}

#[async_trait]
impl VibeAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, _text: &str) -> PortResult<AnalysisOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.gate.acquire().await.unwrap().forget();
        }
        (self.respond)()
    }
}

//=========================================================================================
// In-Memory Draft Store
//=========================================================================================

#[derive(Clone)]
struct VersionSnapshot {
    info: VersionInfo,
    content: String,
    metadata: DraftMetadata,
}

/// A `DraftStore` backed by hash maps, enough for the web-layer tests.
#[derive(Default)]
pub struct MemStore {
    drafts: Mutex<HashMap<Uuid, Draft>>,
    versions: Mutex<HashMap<Uuid, Vec<VersionSnapshot>>>,
    streaks: Mutex<HashMap<Uuid, StreakState>>,
    saves: AtomicUsize,
}

impl MemStore {
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn seed_draft(&self, draft: Draft) {
        self.drafts.lock().unwrap().insert(draft.id, draft);
    }

    pub fn draft(&self, id: Uuid) -> Option<Draft> {
        self.drafts.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl DraftStore for MemStore {
    async fn create_user_with_email(
        &self,
        _email: &str,
        _hashed_password: &str,
    ) -> PortResult<User> {
        Err(PortError::Unexpected("not wired in tests".to_string()))
    }

    async fn get_user_by_email(&self, _email: &str) -> PortResult<UserCredentials> {
        Err(PortError::Unexpected("not wired in tests".to_string()))
    }

    async fn create_auth_session(
        &self,
        _session_id: &str,
        _user_id: Uuid,
        _expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        Ok(())
    }

    async fn validate_auth_session(&self, _session_id: &str) -> PortResult<Uuid> {
        Err(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, _session_id: &str) -> PortResult<()> {
        Ok(())
    }

    async fn list_drafts(&self, user_id: Uuid) -> PortResult<Vec<DraftSummary>> {
        Ok(self
            .drafts
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.user_id == user_id)
            .map(|d| DraftSummary {
                id: d.id,
                metadata: d.metadata.clone(),
            })
            .collect())
    }

    async fn create_draft(
        &self,
        user_id: Uuid,
        content: &str,
        metadata: &DraftMetadata,
    ) -> PortResult<Uuid> {
        let id = Uuid::new_v4();
        self.drafts.lock().unwrap().insert(
            id,
            Draft {
                id,
                user_id,
                content: content.to_string(),
                metadata: metadata.clone(),
            },
        );
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update_draft(
        &self,
        user_id: Uuid,
        draft_id: Uuid,
        content: &str,
        metadata: &DraftMetadata,
    ) -> PortResult<()> {
        let mut drafts = self.drafts.lock().unwrap();
        let draft = drafts
            .get_mut(&draft_id)
            .filter(|d| d.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("draft {draft_id}")))?;

        self.versions
            .lock()
            .unwrap()
            .entry(draft_id)
            .or_default()
            .insert(
                0,
                VersionSnapshot {
                    info: VersionInfo {
                        id: Uuid::new_v4(),
                        timestamp: draft.metadata.updated_at,
                        title: draft.metadata.title.clone(),
                    },
                    content: draft.content.clone(),
                    metadata: draft.metadata.clone(),
                },
            );

        draft.content = content.to_string();
        draft.metadata = metadata.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_draft(&self, user_id: Uuid, draft_id: Uuid) -> PortResult<Draft> {
        self.drafts
            .lock()
            .unwrap()
            .get(&draft_id)
            .filter(|d| d.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("draft {draft_id}")))
    }

    async fn delete_draft(&self, user_id: Uuid, draft_id: Uuid) -> PortResult<()> {
        let mut drafts = self.drafts.lock().unwrap();
        match drafts.get(&draft_id) {
            Some(d) if d.user_id == user_id => {
                drafts.remove(&draft_id);
                Ok(())
            }
            _ => Err(PortError::NotFound(format!("draft {draft_id}"))),
        }
    }

    async fn list_versions(&self, _user_id: Uuid, draft_id: Uuid) -> PortResult<Vec<VersionInfo>> {
        Ok(self
            .versions
            .lock()
            .unwrap()
            .get(&draft_id)
            .map(|v| v.iter().map(|s| s.info.clone()).collect())
            .unwrap_or_default())
    }

    async fn restore_version(
        &self,
        user_id: Uuid,
        draft_id: Uuid,
        version_id: Uuid,
    ) -> PortResult<Draft> {
        let snapshot = self
            .versions
            .lock()
            .unwrap()
            .get(&draft_id)
            .and_then(|v| v.iter().find(|s| s.info.id == version_id).cloned())
            .ok_or_else(|| PortError::NotFound(format!("version {version_id}")))?;

        let mut drafts = self.drafts.lock().unwrap();
        let draft = drafts
            .get_mut(&draft_id)
            .filter(|d| d.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("draft {draft_id}")))?;
        draft.content = snapshot.content;
        draft.metadata = snapshot.metadata;
        Ok(draft.clone())
    }

    async fn append_vibe_record(&self, _draft_id: Uuid, _record: &VibeRecord) -> PortResult<()> {
        Ok(())
    }

    async fn record_usage(
        &self,
        _user_id: Uuid,
        _endpoint: &str,
        _tokens_used: i64,
        _word_count: i64,
    ) -> PortResult<()> {
        Ok(())
    }

    async fn load_streak(&self, user_id: Uuid) -> PortResult<StreakState> {
        Ok(self
            .streaks
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn store_streak(&self, user_id: Uuid, streak: &StreakState) -> PortResult<()> {
        self.streaks.lock().unwrap().insert(user_id, streak.clone());
        Ok(())
    }
}

//=========================================================================================
// Stub Exporter and Fixtures
//=========================================================================================

pub struct StubExporter;

#[async_trait]
impl DraftExporter for StubExporter {
    async fn export(&self, _draft: &Draft, format: ExportFormat) -> PortResult<PathBuf> {
        Ok(PathBuf::from(format!("/tmp/export.{}", format.extension())))
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        openai_api_key: None,
        vibe_model: "test-model".to_string(),
        export_dir: std::env::temp_dir(),
        cors_origin: "http://localhost:3000".to_string(),
    }
}

pub fn test_app_state(analyzer: ScriptedAnalyzer) -> Arc<AppState> {
    test_app_state_with(Arc::new(MemStore::default()), analyzer)
}

pub fn test_app_state_with(store: Arc<MemStore>, analyzer: ScriptedAnalyzer) -> Arc<AppState> {
    Arc::new(AppState {
        store,
        analyzer: Arc::new(analyzer),
        exporter: Arc::new(StubExporter),
        config: Arc::new(test_config()),
    })
}

/// A fresh session for an anonymous new draft.
pub async fn test_session(app_state: &Arc<AppState>) -> WsSession {
    WsSession::new(app_state.clone(), Uuid::new_v4(), None)
        .await
        .unwrap()
}
