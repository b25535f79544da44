//! crates/flow_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use uuid::Uuid;

use crate::domain::{
    Draft, DraftMetadata, DraftSummary, ExportFormat, StreakState, User, UserCredentials,
    VersionInfo, VibeAnalysis, VibeRecord,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The upstream analysis provider rejected the call for quota reasons.
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    /// The upstream analysis provider rejected our credentials.
    #[error("API configuration error. Please contact support.")]
    ProviderMisconfigured,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for drafts, their version history, and everything around them.
#[async_trait]
pub trait DraftStore: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Draft Management ---
    async fn list_drafts(&self, user_id: Uuid) -> PortResult<Vec<DraftSummary>>;

    /// First save of a new draft. Returns the id the store assigned.
    async fn create_draft(
        &self,
        user_id: Uuid,
        content: &str,
        metadata: &DraftMetadata,
    ) -> PortResult<Uuid>;

    /// Overwrites an existing draft and snapshots the previous state into
    /// the version history.
    async fn update_draft(
        &self,
        user_id: Uuid,
        draft_id: Uuid,
        content: &str,
        metadata: &DraftMetadata,
    ) -> PortResult<()>;

    async fn load_draft(&self, user_id: Uuid, draft_id: Uuid) -> PortResult<Draft>;

    async fn delete_draft(&self, user_id: Uuid, draft_id: Uuid) -> PortResult<()>;

    // --- Version History ---
    async fn list_versions(&self, user_id: Uuid, draft_id: Uuid) -> PortResult<Vec<VersionInfo>>;

    /// Overwrites the draft with the named version's snapshot and stamps the
    /// restore marker. Returns the draft as it now stands; the restore counts
    /// as a save having happened server-side.
    async fn restore_version(
        &self,
        user_id: Uuid,
        draft_id: Uuid,
        version_id: Uuid,
    ) -> PortResult<Draft>;

    // --- Non-essential Side Effects ---
    // Callers swallow failures from these after logging; they must never fail
    // the primary save/analyze operation.
    async fn append_vibe_record(&self, draft_id: Uuid, record: &VibeRecord) -> PortResult<()>;

    async fn record_usage(
        &self,
        user_id: Uuid,
        endpoint: &str,
        tokens_used: i64,
        word_count: i64,
    ) -> PortResult<()>;

    // --- Writing Streaks ---
    async fn load_streak(&self, user_id: Uuid) -> PortResult<StreakState>;

    async fn store_streak(&self, user_id: Uuid, streak: &StreakState) -> PortResult<()>;
}

/// The analyzer's verdict plus the upstream token spend, for usage tracking.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: VibeAnalysis,
    pub tokens_used: i64,
}

/// Scores a passage for engagement.
#[async_trait]
pub trait VibeAnalyzer: Send + Sync {
    /// Sends the text to the scoring model and returns a normalized verdict.
    /// The returned score is already clamped into [-1, 1].
    async fn analyze(&self, text: &str) -> PortResult<AnalysisOutcome>;
}

/// Writes a draft out to a file in the requested format.
#[async_trait]
pub trait DraftExporter: Send + Sync {
    async fn export(&self, draft: &Draft, format: ExportFormat) -> PortResult<PathBuf>;
}
