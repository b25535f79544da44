//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::Utc;
use flow_core::domain::{Draft, DraftMetadata, DraftSummary, ExportFormat, VersionInfo, VibeRecord};
use flow_core::passage::{normalize_content, strip_tags, word_count};
use flow_core::ports::PortError;
use flow_core::vibe::{document_fallback_reason, needs_fallback_reason};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        analyze_handler,
        list_drafts_handler,
        create_draft_handler,
        get_draft_handler,
        update_draft_handler,
        delete_draft_handler,
        export_draft_handler,
        list_versions_handler,
        restore_version_handler,
    ),
    components(
        schemas(
            AnalyzeRequest,
            AnalyzeResponse,
            ListDraftsResponse,
            CreateDraftRequest,
            CreateDraftResponse,
            GetDraftResponse,
            UpdateDraftRequest,
            OkResponse,
            ExportRequest,
            ExportResponse,
            ListVersionsResponse,
            RestoreVersionResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "Flow API", description = "API endpoints for the vibe-scored writing editor.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request/Response Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    pub text: String,
    /// When given, the verdict is also appended to this draft's vibe history.
    pub draft_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub score: f64,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct ListDraftsResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub drafts: Vec<DraftSummary>,
    /// The user's current writing streak in days.
    pub streak: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateDraftRequest {
    pub content: String,
    pub title: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CreateDraftResponse {
    pub success: bool,
    pub id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct GetDraftResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub draft: Draft,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateDraftRequest {
    pub content: String,
    pub title: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct OkResponse {
    pub success: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct ExportRequest {
    #[schema(value_type = String)]
    pub format: ExportFormat,
}

#[derive(Serialize, ToSchema)]
pub struct ExportResponse {
    pub success: bool,
    pub path: String,
}

#[derive(Serialize, ToSchema)]
pub struct ListVersionsResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub versions: Vec<VersionInfo>,
}

#[derive(Serialize, ToSchema)]
pub struct RestoreVersionResponse {
    pub success: bool,
    pub content: String,
    #[schema(value_type = Object)]
    pub metadata: DraftMetadata,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

type ApiFailure = (StatusCode, Json<ErrorBody>);

fn failure(status: StatusCode, message: impl Into<String>) -> ApiFailure {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.into(),
        }),
    )
}

/// Maps a port error onto an HTTP status, keeping the distinct user-facing
/// messages for rate limiting and provider misconfiguration.
fn port_failure(e: PortError) -> ApiFailure {
    let status = match &e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        PortError::ProviderMisconfigured => StatusCode::INTERNAL_SERVER_ERROR,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    failure(status, e.to_string())
}

//=========================================================================================
// Analysis
//=========================================================================================

/// Analyze a passage of text and return its vibe verdict.
#[utoipa::path(
    post,
    path = "/api/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis completed", body = AnalyzeResponse),
        (status = 400, description = "No text provided", body = ErrorBody),
        (status = 429, description = "Provider rate limit hit", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn analyze_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiFailure> {
    if req.text.trim().is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "No text provided"));
    }

    let outcome = app_state
        .analyzer
        .analyze(&req.text)
        .await
        .map_err(port_failure)?;

    let mut vibe = outcome.analysis;
    if needs_fallback_reason(&vibe.reason) {
        vibe.reason = document_fallback_reason(vibe.score).to_string();
    }

    // History and usage tracking run in the background; their failures never
    // fail the analysis itself.
    let words = word_count(&strip_tags(&req.text)) as i64;
    let record = VibeRecord {
        timestamp: Utc::now(),
        score: vibe.score,
        reason: vibe.reason.clone(),
    };
    let store = app_state.store.clone();
    let tokens = outcome.tokens_used;
    let draft_id = req.draft_id;
    tokio::spawn(async move {
        if let Some(draft_id) = draft_id {
            if let Err(e) = store.append_vibe_record(draft_id, &record).await {
                error!("Failed to persist vibe record for draft {}: {:?}", draft_id, e);
            }
        }
        if let Err(e) = store.record_usage(user_id, "analyze", tokens, words).await {
            error!("Failed to record usage for user {}: {:?}", user_id, e);
        }
    });

    Ok(Json(AnalyzeResponse {
        success: true,
        score: vibe.score,
        reason: vibe.reason,
    }))
}

//=========================================================================================
// Drafts
//=========================================================================================

/// List the caller's drafts together with their writing streak.
#[utoipa::path(
    get,
    path = "/api/drafts",
    responses(
        (status = 200, description = "Drafts listed", body = ListDraftsResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_drafts_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<ListDraftsResponse>, ApiFailure> {
    let drafts = app_state
        .store
        .list_drafts(user_id)
        .await
        .map_err(port_failure)?;

    // A streak that cannot be loaded reads as zero rather than failing the
    // listing.
    let streak = match app_state.store.load_streak(user_id).await {
        Ok(streak) => streak.effective(Utc::now().date_naive()),
        Err(e) => {
            error!("Failed to load streak for user {}: {:?}", user_id, e);
            0
        }
    };

    Ok(Json(ListDraftsResponse {
        success: true,
        drafts,
        streak,
    }))
}

/// Create a new draft.
#[utoipa::path(
    post,
    path = "/api/drafts",
    request_body = CreateDraftRequest,
    responses(
        (status = 201, description = "Draft created", body = CreateDraftResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn create_draft_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateDraftRequest>,
) -> Result<(StatusCode, Json<CreateDraftResponse>), ApiFailure> {
    let now = Utc::now();
    let mut metadata = DraftMetadata::untitled(now);
    if let Some(title) = req.title {
        metadata.title = title;
    }
    let content = normalize_content(&req.content);

    let id = app_state
        .store
        .create_draft(user_id, &content, &metadata)
        .await
        .map_err(port_failure)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateDraftResponse { success: true, id }),
    ))
}

/// Fetch a single draft with its metadata and vibe history.
#[utoipa::path(
    get,
    path = "/api/drafts/{id}",
    params(("id" = Uuid, Path, description = "The draft id")),
    responses(
        (status = 200, description = "Draft found", body = GetDraftResponse),
        (status = 404, description = "No such draft", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn get_draft_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<Json<GetDraftResponse>, ApiFailure> {
    let draft = app_state
        .store
        .load_draft(user_id, id)
        .await
        .map_err(port_failure)?;

    Ok(Json(GetDraftResponse {
        success: true,
        draft,
    }))
}

/// Overwrite a draft's content, snapshotting the previous state as a version.
#[utoipa::path(
    put,
    path = "/api/drafts/{id}",
    params(("id" = Uuid, Path, description = "The draft id")),
    request_body = UpdateDraftRequest,
    responses(
        (status = 200, description = "Draft updated", body = OkResponse),
        (status = 404, description = "No such draft", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn update_draft_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDraftRequest>,
) -> Result<Json<OkResponse>, ApiFailure> {
    let draft = app_state
        .store
        .load_draft(user_id, id)
        .await
        .map_err(port_failure)?;

    let mut metadata = draft.metadata;
    if let Some(title) = req.title {
        metadata.title = title;
    }
    metadata.updated_at = Utc::now();
    let content = normalize_content(&req.content);

    app_state
        .store
        .update_draft(user_id, id, &content, &metadata)
        .await
        .map_err(port_failure)?;

    Ok(Json(OkResponse { success: true }))
}

/// Delete a draft and everything attached to it.
#[utoipa::path(
    delete,
    path = "/api/drafts/{id}",
    params(("id" = Uuid, Path, description = "The draft id")),
    responses(
        (status = 200, description = "Draft deleted", body = OkResponse),
        (status = 404, description = "No such draft", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn delete_draft_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiFailure> {
    app_state
        .store
        .delete_draft(user_id, id)
        .await
        .map_err(port_failure)?;

    Ok(Json(OkResponse { success: true }))
}

//=========================================================================================
// Export and Version History
//=========================================================================================

/// Export a draft to a file in the requested format.
#[utoipa::path(
    post,
    path = "/api/drafts/{id}/export",
    params(("id" = Uuid, Path, description = "The draft id")),
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Draft exported", body = ExportResponse),
        (status = 404, description = "No such draft", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn export_draft_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, ApiFailure> {
    let draft = app_state
        .store
        .load_draft(user_id, id)
        .await
        .map_err(port_failure)?;

    let path = app_state
        .exporter
        .export(&draft, req.format)
        .await
        .map_err(port_failure)?;

    Ok(Json(ExportResponse {
        success: true,
        path: path.display().to_string(),
    }))
}

/// List a draft's saved versions, newest first.
#[utoipa::path(
    get,
    path = "/api/drafts/{id}/versions",
    params(("id" = Uuid, Path, description = "The draft id")),
    responses(
        (status = 200, description = "Versions listed", body = ListVersionsResponse),
        (status = 404, description = "No such draft", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn list_versions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<Json<ListVersionsResponse>, ApiFailure> {
    let versions = app_state
        .store
        .list_versions(user_id, id)
        .await
        .map_err(port_failure)?;

    Ok(Json(ListVersionsResponse {
        success: true,
        versions,
    }))
}

/// Restore a draft to one of its saved versions.
///
/// The current state is snapshotted as a new version before being
/// overwritten, so a restore is never destructive.
#[utoipa::path(
    post,
    path = "/api/drafts/{id}/versions/{version_id}/restore",
    params(
        ("id" = Uuid, Path, description = "The draft id"),
        ("version_id" = Uuid, Path, description = "The version to restore")
    ),
    responses(
        (status = 200, description = "Version restored", body = RestoreVersionResponse),
        (status = 404, description = "No such draft or version", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn restore_version_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((id, version_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RestoreVersionResponse>, ApiFailure> {
    let draft = app_state
        .store
        .restore_version(user_id, id, version_id)
        .await
        .map_err(port_failure)?;

    Ok(Json(RestoreVersionResponse {
        success: true,
        content: draft.content,
        metadata: draft.metadata,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::testing::{test_app_state, test_app_state_with, MemStore, ScriptedAnalyzer};

    #[tokio::test]
    async fn analyze_rejects_empty_text() {
        let app_state = test_app_state(ScriptedAnalyzer::default());
        let result = analyze_handler(
            State(app_state),
            Extension(Uuid::new_v4()),
            Json(AnalyzeRequest {
                text: "   ".to_string(),
                draft_id: None,
            }),
        )
        .await;

        let (status, body) = result.err().unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "No text provided");
    }

    #[tokio::test]
    async fn analyze_maps_rate_limiting_to_429() {
        let app_state = test_app_state(ScriptedAnalyzer::failing(PortError::RateLimited));
        let result = analyze_handler(
            State(app_state),
            Extension(Uuid::new_v4()),
            Json(AnalyzeRequest {
                text: "Some vivid writing.".to_string(),
                draft_id: None,
            }),
        )
        .await;

        let (status, body) = result.err().unwrap();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.error, "Rate limit exceeded. Please try again later.");
    }

    #[tokio::test]
    async fn analyze_maps_misconfiguration_to_500_with_its_own_message() {
        let app_state = test_app_state(ScriptedAnalyzer::failing(PortError::ProviderMisconfigured));
        let result = analyze_handler(
            State(app_state),
            Extension(Uuid::new_v4()),
            Json(AnalyzeRequest {
                text: "Some vivid writing.".to_string(),
                draft_id: None,
            }),
        )
        .await;

        let (status, body) = result.err().unwrap();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "API configuration error. Please contact support.");
    }

    #[tokio::test]
    async fn create_then_get_round_trips_a_draft() {
        let store = Arc::new(MemStore::default());
        let app_state = test_app_state_with(store, ScriptedAnalyzer::default());
        let user_id = Uuid::new_v4();

        let created = create_draft_handler(
            State(app_state.clone()),
            Extension(user_id),
            Json(CreateDraftRequest {
                content: "<p>hello</p><p></p>".to_string(),
                title: Some("Morning Pages".to_string()),
            }),
        )
        .await
        .ok()
        .unwrap();
        let (_, Json(created)) = created;

        let fetched = get_draft_handler(
            State(app_state),
            Extension(user_id),
            Path(created.id),
        )
        .await
        .ok()
        .unwrap();
        let Json(fetched) = fetched;
        assert_eq!(fetched.draft.content, "<p>hello</p>");
        assert_eq!(fetched.draft.metadata.title, "Morning Pages");
    }

    #[tokio::test]
    async fn fetching_a_missing_draft_is_404() {
        let app_state = test_app_state(ScriptedAnalyzer::default());
        let result = get_draft_handler(
            State(app_state),
            Extension(Uuid::new_v4()),
            Path(Uuid::new_v4()),
        )
        .await;

        let (status, _) = result.err().unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
