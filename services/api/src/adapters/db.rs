//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DraftStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Queries use the runtime `query_as` API (not the compile-time macros) so the
//! workspace builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use flow_core::domain::{
    Draft, DraftMetadata, DraftSummary, RestoredFrom, StreakState, User, UserCredentials,
    VersionInfo, VibeRecord,
};
use flow_core::ports::{DraftStore, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Vibe history rows fetched per draft; matches the in-session cap.
const VIBE_HISTORY_LIMIT: i64 = 10;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DraftStore` port.
#[derive(Clone)]
pub struct PgDraftStore {
    pool: PgPool,
}

impl PgDraftStore {
    /// Creates a new `PgDraftStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(())
    }

    async fn fetch_vibe_history(&self, draft_id: Uuid) -> PortResult<Vec<VibeRecord>> {
        let records = sqlx::query_as::<_, VibeHistoryRecord>(
            "SELECT score, reason, created_at FROM vibe_history \
             WHERE draft_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(draft_id)
        .bind(VIBE_HISTORY_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct DraftRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_vibe: Option<f64>,
    restored_from_version: Option<Uuid>,
    restored_from_timestamp: Option<DateTime<Utc>>,
    restored_at: Option<DateTime<Utc>>,
}
impl DraftRecord {
    fn to_domain(self, vibe_history: Vec<VibeRecord>) -> Draft {
        let restored_from = match (
            self.restored_from_version,
            self.restored_from_timestamp,
            self.restored_at,
        ) {
            (Some(version_id), Some(timestamp), Some(restored_at)) => Some(RestoredFrom {
                version_id,
                timestamp,
                restored_at,
            }),
            _ => None,
        };
        Draft {
            id: self.id,
            user_id: self.user_id,
            content: self.content,
            metadata: DraftMetadata {
                title: self.title,
                created_at: self.created_at,
                updated_at: self.updated_at,
                last_vibe: self.last_vibe,
                vibe_history,
                restored_from,
            },
        }
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_vibe: Option<f64>,
}
impl SummaryRecord {
    // Listing entries are polled by the home screen, so they stay cheap:
    // metadata columns only, no content and no history rows.
    fn to_domain(self) -> DraftSummary {
        DraftSummary {
            id: self.id,
            metadata: DraftMetadata {
                title: self.title,
                created_at: self.created_at,
                updated_at: self.updated_at,
                last_vibe: self.last_vibe,
                vibe_history: Vec::new(),
                restored_from: None,
            },
        }
    }
}

#[derive(FromRow)]
struct VersionRecord {
    id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
}
impl VersionRecord {
    fn to_domain(self) -> VersionInfo {
        VersionInfo {
            id: self.id,
            timestamp: self.created_at,
            title: self.title,
        }
    }
}

#[derive(FromRow)]
struct VibeHistoryRecord {
    score: f64,
    reason: String,
    created_at: DateTime<Utc>,
}
impl VibeHistoryRecord {
    fn to_domain(self) -> VibeRecord {
        VibeRecord {
            timestamp: self.created_at,
            score: self.score,
            reason: self.reason,
        }
    }
}

#[derive(FromRow)]
struct StreakRecord {
    current_streak: i32,
    last_written: Option<NaiveDate>,
}
impl StreakRecord {
    fn to_domain(self) -> StreakState {
        StreakState {
            current_streak: self.current_streak.max(0) as u32,
            last_written: self.last_written,
        }
    }
}

//=========================================================================================
// `DraftStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DraftStore for PgDraftStore {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })?;
        Ok(user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_drafts(&self, user_id: Uuid) -> PortResult<Vec<DraftSummary>> {
        let records = sqlx::query_as::<_, SummaryRecord>(
            "SELECT id, title, created_at, updated_at, last_vibe FROM drafts \
             WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_draft(
        &self,
        user_id: Uuid,
        content: &str,
        metadata: &DraftMetadata,
    ) -> PortResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO drafts (id, user_id, title, content, created_at, updated_at, last_vibe) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(user_id)
        .bind(&metadata.title)
        .bind(content)
        .bind(metadata.created_at)
        .bind(metadata.updated_at)
        .bind(metadata.last_vibe)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn update_draft(
        &self,
        user_id: Uuid,
        draft_id: Uuid,
        content: &str,
        metadata: &DraftMetadata,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Snapshot the previous state into the version history before
        // overwriting it, so restore can bring it back.
        let previous = sqlx::query_as::<_, DraftRecord>(
            "SELECT id, user_id, title, content, created_at, updated_at, last_vibe, \
                    restored_from_version, restored_from_timestamp, restored_at \
             FROM drafts WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(draft_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Draft {} not found", draft_id))
            }
            _ => unexpected(e),
        })?;

        sqlx::query(
            "INSERT INTO draft_versions (id, draft_id, title, content, last_vibe, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(draft_id)
        .bind(&previous.title)
        .bind(&previous.content)
        .bind(previous.last_vibe)
        .bind(previous.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query(
            "UPDATE drafts SET title = $1, content = $2, updated_at = $3, last_vibe = $4 \
             WHERE id = $5 AND user_id = $6",
        )
        .bind(&metadata.title)
        .bind(content)
        .bind(metadata.updated_at)
        .bind(metadata.last_vibe)
        .bind(draft_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn load_draft(&self, user_id: Uuid, draft_id: Uuid) -> PortResult<Draft> {
        let record = sqlx::query_as::<_, DraftRecord>(
            "SELECT id, user_id, title, content, created_at, updated_at, last_vibe, \
                    restored_from_version, restored_from_timestamp, restored_at \
             FROM drafts WHERE id = $1 AND user_id = $2",
        )
        .bind(draft_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Draft {} not found", draft_id))
            }
            _ => unexpected(e),
        })?;

        let history = self.fetch_vibe_history(draft_id).await?;
        Ok(record.to_domain(history))
    }

    async fn delete_draft(&self, user_id: Uuid, draft_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM drafts WHERE id = $1 AND user_id = $2")
            .bind(draft_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Draft {} not found", draft_id)));
        }
        Ok(())
    }

    async fn list_versions(&self, user_id: Uuid, draft_id: Uuid) -> PortResult<Vec<VersionInfo>> {
        let records = sqlx::query_as::<_, VersionRecord>(
            "SELECT v.id, v.title, v.created_at FROM draft_versions v \
             JOIN drafts d ON d.id = v.draft_id \
             WHERE v.draft_id = $1 AND d.user_id = $2 \
             ORDER BY v.created_at DESC",
        )
        .bind(draft_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn restore_version(
        &self,
        user_id: Uuid,
        draft_id: Uuid,
        version_id: Uuid,
    ) -> PortResult<Draft> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let current = sqlx::query_as::<_, DraftRecord>(
            "SELECT id, user_id, title, content, created_at, updated_at, last_vibe, \
                    restored_from_version, restored_from_timestamp, restored_at \
             FROM drafts WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(draft_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Draft {} not found", draft_id))
            }
            _ => unexpected(e),
        })?;

        #[derive(FromRow)]
        struct SnapshotRecord {
            title: String,
            content: String,
            last_vibe: Option<f64>,
            created_at: DateTime<Utc>,
        }
        let snapshot = sqlx::query_as::<_, SnapshotRecord>(
            "SELECT title, content, last_vibe, created_at FROM draft_versions \
             WHERE id = $1 AND draft_id = $2",
        )
        .bind(version_id)
        .bind(draft_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Version {} not found", version_id))
            }
            _ => unexpected(e),
        })?;

        // The state being replaced becomes a version of its own, so the
        // restore is undoable.
        sqlx::query(
            "INSERT INTO draft_versions (id, draft_id, title, content, last_vibe, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(draft_id)
        .bind(&current.title)
        .bind(&current.content)
        .bind(current.last_vibe)
        .bind(current.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let now = Utc::now();
        let restored = sqlx::query_as::<_, DraftRecord>(
            "UPDATE drafts SET title = $1, content = $2, last_vibe = $3, updated_at = $4, \
                    restored_from_version = $5, restored_from_timestamp = $6, restored_at = $4 \
             WHERE id = $7 AND user_id = $8 \
             RETURNING id, user_id, title, content, created_at, updated_at, last_vibe, \
                       restored_from_version, restored_from_timestamp, restored_at",
        )
        .bind(&snapshot.title)
        .bind(&snapshot.content)
        .bind(snapshot.last_vibe)
        .bind(now)
        .bind(version_id)
        .bind(snapshot.created_at)
        .bind(draft_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;

        let history = self.fetch_vibe_history(draft_id).await?;
        Ok(restored.to_domain(history))
    }

    async fn append_vibe_record(&self, draft_id: Uuid, record: &VibeRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO vibe_history (id, draft_id, score, reason, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(draft_id)
        .bind(record.score)
        .bind(&record.reason)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        sqlx::query("UPDATE drafts SET last_vibe = $1, updated_at = $2 WHERE id = $3")
            .bind(record.score)
            .bind(record.timestamp)
            .bind(draft_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn record_usage(
        &self,
        user_id: Uuid,
        endpoint: &str,
        tokens_used: i64,
        word_count: i64,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO api_usage (id, user_id, endpoint, tokens_used, word_count) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(endpoint)
        .bind(tokens_used)
        .bind(word_count)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn load_streak(&self, user_id: Uuid) -> PortResult<StreakState> {
        let record = sqlx::query_as::<_, StreakRecord>(
            "SELECT current_streak, last_written FROM writing_streaks WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()).unwrap_or_default())
    }

    async fn store_streak(&self, user_id: Uuid, streak: &StreakState) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO writing_streaks (user_id, current_streak, last_written) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE \
             SET current_streak = EXCLUDED.current_streak, last_written = EXCLUDED.last_written",
        )
        .bind(user_id)
        .bind(streak.current_streak as i32)
        .bind(streak.last_written)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
