//! # API REST
//!
//! REST API implementation for the stack generation pipeline.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, API-key checks)
//!
//! Uses `api-shared` for wire types and `stack-core` for everything else.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{
    validate_api_key, DocumentRes, GenerateRes, HealthRes, HealthService, StackRes, ValidateReq,
    ValidateRes, API_KEY_HEADER,
};
use stack_core::{
    validate, CoreConfig, GenerationResult, SqliteStore, StackError, StackService, StoredStack,
};

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    service: Arc<StackService>,
    api_key: Option<String>,
}

impl AppState {
    /// `api_key`, when set, is required in the `x-api-key` header of generation requests.
    pub fn new(service: Arc<StackService>, api_key: Option<String>) -> Self {
        Self {
            service,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Build the production state from a resolved configuration.
    pub fn from_config(cfg: &CoreConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteStore::open(cfg.database_path())?);
        let service = StackService::from_config(cfg, store)?;
        Ok(Self::new(Arc::new(service), api_key))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, generate_stack, get_stack, get_document, validate_document),
    components(schemas(
        HealthRes,
        GenerateRes,
        StackRes,
        DocumentRes,
        ValidateReq,
        ValidateRes,
        api_shared::StackItem,
        api_shared::TokenUsage,
    ))
)]
pub struct ApiDoc;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stacks/:submission_id/generate", post(generate_stack))
        .route("/stacks/:submission_id", get(get_stack))
        .route("/stacks/:submission_id/document", get(get_document))
        .route("/validate", post(validate_document))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve the REST API until the server stops.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Stack REST API listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/stacks/{submission_id}/generate",
    params(("submission_id" = String, Path, description = "Intake submission id")),
    responses(
        (status = 200, description = "Stack generated", body = GenerateRes),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Submission not found"),
        (status = 503, description = "Generation backend not configured"),
        (status = 500, description = "Internal server error")
    )
)]
/// Generate (or regenerate) the stack for a submission
///
/// Runs the whole pipeline and replaces any previously stored stack. A response with
/// `saved: false` still carries the generated document.
///
/// # Errors
/// Returns `401` without a valid API key, `404` for an unknown submission and `503` when the
/// backend credential is missing.
#[axum::debug_handler]
async fn generate_stack(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(submission_id): AxumPath<String>,
) -> Result<Json<GenerateRes>, (StatusCode, &'static str)> {
    authorize(&state, &headers)?;
    match state.service.generate(&submission_id).await {
        Ok(result) => Ok(Json(generate_res(result))),
        Err(e) => Err(error_response("Generate stack", e)),
    }
}

#[utoipa::path(
    get,
    path = "/stacks/{submission_id}",
    params(("submission_id" = String, Path, description = "Intake submission id")),
    responses(
        (status = 200, description = "Stored stack", body = StackRes),
        (status = 404, description = "No stack stored for this submission"),
        (status = 500, description = "Internal server error")
    )
)]
/// Read the stored stack and its items.
#[axum::debug_handler]
async fn get_stack(
    State(state): State<AppState>,
    AxumPath(submission_id): AxumPath<String>,
) -> Result<Json<StackRes>, (StatusCode, &'static str)> {
    match state.service.stack_for(&submission_id) {
        Ok(Some(stored)) => Ok(Json(stack_res(stored))),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Stack not found")),
        Err(e) => Err(error_response("Read stack", e)),
    }
}

#[utoipa::path(
    get,
    path = "/stacks/{submission_id}/document",
    params(("submission_id" = String, Path, description = "Intake submission id")),
    responses(
        (status = 200, description = "Stored narrative document", body = DocumentRes),
        (status = 404, description = "No stack stored for this submission"),
        (status = 500, description = "Internal server error")
    )
)]
/// Read the stored narrative. Export collaborators only ever read this.
#[axum::debug_handler]
async fn get_document(
    State(state): State<AppState>,
    AxumPath(submission_id): AxumPath<String>,
) -> Result<Json<DocumentRes>, (StatusCode, &'static str)> {
    match state.service.stack_for(&submission_id) {
        Ok(Some(stored)) => Ok(Json(DocumentRes {
            submission_id: stored.record.submission_id,
            document: stored.record.narrative,
        })),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Stack not found")),
        Err(e) => Err(error_response("Read document", e)),
    }
}

#[utoipa::path(
    post,
    path = "/validate",
    request_body = ValidateReq,
    responses(
        (status = 200, description = "Structural validation report", body = ValidateRes)
    )
)]
/// Run the structural validator over posted markdown with the deployment's policy.
#[axum::debug_handler]
async fn validate_document(
    State(state): State<AppState>,
    Json(req): Json<ValidateReq>,
) -> Json<ValidateRes> {
    let report = validate(&req.text, state.service.policy());
    let failures = report.failures();
    Json(ValidateRes {
        passed: report.passed,
        word_count: report.word_count,
        table_rows: report.table_rows,
        citation_count: report.citation_count,
        missing_headings: report.missing_headings,
        thin_sections: report.thin_sections,
        failures,
    })
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, &'static str)> {
    let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    validate_api_key(provided, state.api_key.as_deref()).map_err(|e| {
        tracing::warn!("Rejected request: {}", e);
        (StatusCode::UNAUTHORIZED, "Unauthorized")
    })
}

fn error_response(context: &str, e: StackError) -> (StatusCode, &'static str) {
    match e {
        StackError::SubmissionNotFound(_) => (StatusCode::NOT_FOUND, "Submission not found"),
        StackError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid input"),
        StackError::MissingConfig(_) => {
            tracing::error!("{} error: {:?}", context, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Generation backend not configured",
            )
        }
        _ => {
            tracing::error!("{} error: {:?}", context, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

fn item_res(item: stack_core::StackItem) -> api_shared::StackItem {
    api_shared::StackItem {
        timing: item.timing.map(|t| t.to_string()),
        name: item.name,
        dose: item.dose,
        rationale: item.rationale,
        caution: item.caution,
        citations: item.citations,
        cost_estimate: item.cost_estimate,
        primary_marketplace: item.chosen_links.primary_marketplace,
        specialty_pharmacy: item.chosen_links.specialty_pharmacy,
        other: item.chosen_links.other,
    }
}

fn usage_res(usage: stack_core::TokenUsage) -> api_shared::TokenUsage {
    api_shared::TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}

fn generate_res(result: GenerationResult) -> GenerateRes {
    GenerateRes {
        submission_id: result.submission_id,
        stack_id: result.stack_id,
        generation_id: result.generation_id.to_string(),
        safety_status: result.safety_status.to_string(),
        validated: result.validated,
        model_used: result.model_used,
        usage: usage_res(result.usage),
        monthly_cost: result.monthly_cost,
        saved: result.saved,
        items_inserted: result.items_inserted,
        items: result.items.into_iter().map(item_res).collect(),
        document: result.document,
    }
}

fn stack_res(stored: StoredStack) -> StackRes {
    StackRes {
        stack_id: stored.stack_id,
        submission_id: stored.record.submission_id,
        generation_id: stored.record.generation_id.to_string(),
        safety_status: stored.record.safety_status.to_string(),
        validated: stored.record.validated,
        model_used: stored.record.model_used,
        usage: usage_res(stored.record.usage),
        monthly_cost: stored.record.monthly_cost,
        created_at: stored.created_at.to_rfc3339(),
        updated_at: stored.updated_at.to_rfc3339(),
        items: stored.items.into_iter().map(item_res).collect(),
    }
}
