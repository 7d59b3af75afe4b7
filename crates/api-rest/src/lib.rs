//! # API REST
//!
//! REST facade over a [`QueueController`].
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status mapping)
//!
//! The controller is built and polled by the binary; this crate only translates between
//! HTTP and controller calls.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use queue_core::{
    AdvanceOutcome, EntryId, QueueController, QueueError, QueueRow, RefreshOutcome, StoreError,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// Application state for the REST API server
///
/// Every handler talks to the same controller, which owns the session's queue view.
#[derive(Clone)]
pub struct AppState {
    controller: QueueController,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_queue,
        current_entry,
        advance_queue,
        refresh_queue,
        remove_entry,
        emergency_insert,
    ),
    components(schemas(
        HealthRes,
        VitalsRes,
        QueueRowRes,
        QueueRes,
        CurrentRes,
        AdvanceRes,
        RefreshRes,
        RemoveRes,
        EmergencyReq,
        EmergencyRes,
        ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router for `controller`, including Swagger UI and permissive CORS.
pub fn router(controller: QueueController) -> Router {
    let state = AppState { controller };

    Router::new()
        .route("/health", get(health))
        .route("/queue", get(list_queue))
        .route("/queue/current", get(current_entry))
        .route("/queue/next", post(advance_queue))
        .route("/queue/refresh", post(refresh_queue))
        .route("/queue/emergency", post(emergency_insert))
        .route("/queue/:id", delete(remove_entry))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Request/response bodies
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Vitals rendered for display. Absent values are `—`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VitalsRes {
    pub height: String,
    pub weight: String,
    pub heart_rate: String,
    pub blood_pressure: String,
    pub temperature: String,
    pub oxygen_saturation: String,
    pub bmi: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueRowRes {
    /// Zero-padded position in the current ordering, e.g. `001`.
    pub number: String,
    pub id: u64,
    pub serving: bool,
    pub patient_identifier: String,
    pub name: String,
    pub priority: String,
    /// CRITICAL and HIGH entries.
    pub urgent: bool,
    pub entered_at: Option<String>,
    pub vitals: VitalsRes,
}

impl From<QueueRow> for QueueRowRes {
    fn from(row: QueueRow) -> Self {
        let vitals = row.vitals();
        let entry = row.entry;
        let priority = entry.effective_priority();
        Self {
            number: row.number.to_string(),
            id: entry.id.get(),
            serving: row.serving,
            patient_identifier: entry.patient_identifier().to_string(),
            name: entry.display_name(),
            priority: priority.to_string(),
            urgent: priority.is_urgent(),
            entered_at: entry.entered_at.map(|ts| ts.to_rfc3339()),
            vitals: VitalsRes {
                height: vitals.height,
                weight: vitals.weight,
                heart_rate: vitals.heart_rate,
                blood_pressure: vitals.blood_pressure,
                temperature: vitals.temperature,
                oxygen_saturation: vitals.oxygen_saturation,
                bmi: vitals.bmi,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueRes {
    pub rows: Vec<QueueRowRes>,
    /// Entries in the queue, before filtering.
    pub total: usize,
    pub serving_id: Option<u64>,
    pub refreshed_at: Option<String>,
    /// True when the last refresh failed and the order shown may be out of date.
    pub stale: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CurrentRes {
    pub current: Option<QueueRowRes>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdvanceRes {
    /// False when the queue was empty.
    pub advanced: bool,
    pub completed: Option<QueueRowRes>,
    pub now_serving: Option<QueueRowRes>,
    pub refreshed: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshRes {
    /// `applied`, `skipped` or `superseded`.
    pub outcome: String,
    pub entries: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RemoveRes {
    pub removed: u64,
    pub was_serving: bool,
    pub now_serving: Option<QueueRowRes>,
    pub refreshed: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmergencyReq {
    pub patient_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmergencyRes {
    pub patient_identifier: String,
    pub name: String,
    pub priority: String,
    pub entry: Option<QueueRowRes>,
    pub refreshed: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueueQuery {
    /// Case-insensitive search over number, identifier, name and blood pressure.
    pub q: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorRes>);

/// Map a controller error onto an HTTP status.
fn api_error(e: QueueError) -> ApiError {
    let status = match &e {
        QueueError::InvalidInput(_) | QueueError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
        QueueError::PatientNotFound(_)
        | QueueError::CommandFailed {
            source: StoreError::NotFound(_),
            ..
        } => StatusCode::NOT_FOUND,
        QueueError::Fetch(_) | QueueError::CommandFailed { .. } => StatusCode::BAD_GATEWAY,
        QueueError::ShutDown => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        tracing::error!("Queue request error: {:?}", e);
    }
    (
        status,
        Json(ErrorRes {
            error: e.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Reports whether the controller is still accepting work.
#[axum::debug_handler]
async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    let ok = !state.controller.is_shut_down();
    Json(HealthRes {
        ok,
        message: if ok {
            "Clinic queue REST API is alive".into()
        } else {
            "Clinic queue REST API is shutting down".into()
        },
    })
}

#[utoipa::path(
    get,
    path = "/queue",
    params(QueueQuery),
    responses(
        (status = 200, description = "Queue in priority order", body = QueueRes)
    )
)]
/// List the queue, optionally filtered by `q`
///
/// Reads the controller's last reconciled view; it does not fetch. Display numbers are
/// positions in the full ordering even when filtered.
#[axum::debug_handler]
async fn list_queue(
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
) -> Json<QueueRes> {
    let snapshot = state.controller.snapshot().await;
    let rows = snapshot.filter(query.q.as_deref().unwrap_or_default());
    Json(QueueRes {
        rows: rows.into_iter().map(QueueRowRes::from).collect(),
        total: snapshot.len(),
        serving_id: snapshot.view.serving_id().map(EntryId::get),
        refreshed_at: snapshot.refreshed_at.map(|ts| ts.to_rfc3339()),
        stale: snapshot.stale,
    })
}

#[utoipa::path(
    get,
    path = "/queue/current",
    responses(
        (status = 200, description = "Entry being served, if any", body = CurrentRes)
    )
)]
#[axum::debug_handler]
async fn current_entry(State(state): State<AppState>) -> Json<CurrentRes> {
    Json(CurrentRes {
        current: state.controller.current().await.map(QueueRowRes::from),
    })
}

#[utoipa::path(
    post,
    path = "/queue/next",
    responses(
        (status = 200, description = "Serving entry completed, or queue was empty", body = AdvanceRes),
        (status = 502, description = "Completion not confirmed upstream", body = ErrorRes),
        (status = 503, description = "Controller shut down", body = ErrorRes)
    )
)]
/// Complete the serving entry and move to the next
///
/// # Errors
/// Returns `502 Bad Gateway` if the store did not confirm completion. The queue is unchanged.
#[axum::debug_handler]
async fn advance_queue(State(state): State<AppState>) -> Result<Json<AdvanceRes>, ApiError> {
    let res = match state.controller.advance().await.map_err(api_error)? {
        AdvanceOutcome::NothingToAdvance => AdvanceRes {
            advanced: false,
            completed: None,
            now_serving: None,
            refreshed: false,
        },
        AdvanceOutcome::Advanced {
            completed,
            now_serving,
            refreshed,
        } => AdvanceRes {
            advanced: true,
            completed: Some(completed.into()),
            now_serving: now_serving.map(QueueRowRes::from),
            refreshed,
        },
    };
    Ok(Json(res))
}

#[utoipa::path(
    post,
    path = "/queue/refresh",
    responses(
        (status = 200, description = "Refresh result", body = RefreshRes),
        (status = 502, description = "Queue could not be fetched", body = ErrorRes),
        (status = 503, description = "Controller shut down", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn refresh_queue(State(state): State<AppState>) -> Result<Json<RefreshRes>, ApiError> {
    let res = match state.controller.refresh().await.map_err(api_error)? {
        RefreshOutcome::Applied { entries, .. } => RefreshRes {
            outcome: "applied".into(),
            entries: Some(entries),
        },
        RefreshOutcome::Skipped => RefreshRes {
            outcome: "skipped".into(),
            entries: None,
        },
        RefreshOutcome::Superseded => RefreshRes {
            outcome: "superseded".into(),
            entries: None,
        },
    };
    Ok(Json(res))
}

#[utoipa::path(
    delete,
    path = "/queue/{id}",
    params(("id" = u64, Path, description = "Queue entry id")),
    responses(
        (status = 200, description = "Entry removed", body = RemoveRes),
        (status = 404, description = "No such entry upstream", body = ErrorRes),
        (status = 502, description = "Removal not confirmed upstream", body = ErrorRes)
    )
)]
/// Remove an entry without serving it
///
/// # Errors
/// Returns `404 Not Found` if the store has no such entry and `502 Bad Gateway` if
/// removal was not confirmed.
#[axum::debug_handler]
async fn remove_entry(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Json<RemoveRes>, ApiError> {
    let outcome = state
        .controller
        .remove(EntryId::new(id))
        .await
        .map_err(api_error)?;
    Ok(Json(RemoveRes {
        removed: outcome.removed.get(),
        was_serving: outcome.was_serving,
        now_serving: outcome.now_serving.map(QueueRowRes::from),
        refreshed: outcome.refreshed,
    }))
}

#[utoipa::path(
    post,
    path = "/queue/emergency",
    request_body = EmergencyReq,
    responses(
        (status = 200, description = "Patient escalated", body = EmergencyRes),
        (status = 400, description = "Malformed patient identifier", body = ErrorRes),
        (status = 404, description = "Patient not registered", body = ErrorRes),
        (status = 502, description = "Escalation not confirmed upstream", body = ErrorRes)
    )
)]
/// Escalate a registered patient as an emergency
///
/// The classifier decides the band; the patient then surfaces through normal ordering.
#[axum::debug_handler]
async fn emergency_insert(
    State(state): State<AppState>,
    Json(req): Json<EmergencyReq>,
) -> Result<Json<EmergencyRes>, ApiError> {
    let outcome = state
        .controller
        .emergency_insert(&req.patient_id)
        .await
        .map_err(api_error)?;
    Ok(Json(EmergencyRes {
        patient_identifier: outcome.patient.identifier.clone(),
        name: outcome.patient.display_name(),
        priority: outcome.priority.to_string(),
        entry: outcome.entry.map(QueueRowRes::from),
        refreshed: outcome.refreshed,
    }))
}
