use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use server_api::ApiContext;
use shared::{
    domain::{CollaboratorId, GlobalCollaborator, Project, ProjectCollaborator, ProjectId},
    error::{ApiError, ErrorCode},
    protocol::{
        AddProjectCollaborator, CollaboratorUpdate, NewGlobalCollaborator, NewProject,
        ProjectUpdate, SpreadsheetReceipt, UpdateProjectCollaborator, SPREADSHEET_FIELD,
    },
};
use storage::Storage;
use tracing::{error, info, warn};

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

type HttpResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = settings.database_url.clone();
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        max_upload_bytes: settings.max_upload_bytes,
    };

    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, max_upload_bytes = settings.max_upload_bytes, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = state
        .api
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/projects", get(http_list_projects).post(http_create_project))
        .route(
            "/projects/:project_id",
            patch(http_update_project).delete(http_delete_project),
        )
        .route(
            "/projects/:project_id/collaborators",
            get(http_list_project_collaborators).post(http_add_project_collaborator),
        )
        .route(
            "/projects/:project_id/collaborators/:collaborator_id",
            patch(http_update_project_collaborator).delete(http_delete_project_collaborator),
        )
        .route(
            "/collaborators",
            get(http_list_collaborators).post(http_create_collaborator),
        )
        .route(
            "/collaborators/:collaborator_id",
            patch(http_update_collaborator).delete(http_delete_collaborator),
        )
        .route(
            "/:project_id/processar",
            post(http_upload_spreadsheet).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(err.code);
    if status.is_server_error() {
        error!(error = %err, "request failed");
    } else {
        warn!(code = ?err.code, message = %err.message, "request rejected");
    }
    (status, Json(err))
}

fn multipart_rejection(err: MultipartError) -> (StatusCode, Json<ApiError>) {
    let code = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ErrorCode::PayloadTooLarge
    } else {
        ErrorCode::Validation
    };
    reject(ApiError::new(code, err.body_text()))
}

async fn healthz(State(state): State<Arc<AppState>>) -> HttpResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        reject(ApiError::new(
            ErrorCode::Internal,
            format!("storage unavailable: {e}"),
        ))
    })?;
    Ok("ok")
}

async fn http_list_projects(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<Project>>> {
    let projects = server_api::list_projects(&state.api).await.map_err(reject)?;
    Ok(Json(projects))
}

async fn http_create_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewProject>,
) -> HttpResult<(StatusCode, Json<Project>)> {
    let project = server_api::create_project(&state.api, req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn http_update_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Json(req): Json<ProjectUpdate>,
) -> HttpResult<Json<Project>> {
    let project = server_api::update_project(&state.api, &ProjectId(project_id), req)
        .await
        .map_err(reject)?;
    Ok(Json(project))
}

async fn http_delete_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> HttpResult<StatusCode> {
    server_api::delete_project(&state.api, &ProjectId(project_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_project_collaborators(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> HttpResult<Json<Vec<ProjectCollaborator>>> {
    let members = server_api::list_project_collaborators(&state.api, &ProjectId(project_id))
        .await
        .map_err(reject)?;
    Ok(Json(members))
}

async fn http_add_project_collaborator(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Json(req): Json<AddProjectCollaborator>,
) -> HttpResult<StatusCode> {
    server_api::add_project_collaborator(&state.api, &ProjectId(project_id), req)
        .await
        .map_err(reject)?;
    Ok(StatusCode::CREATED)
}

async fn http_update_project_collaborator(
    State(state): State<Arc<AppState>>,
    Path((project_id, collaborator_id)): Path<(String, String)>,
    Json(req): Json<UpdateProjectCollaborator>,
) -> HttpResult<StatusCode> {
    server_api::update_project_collaborator(
        &state.api,
        &ProjectId(project_id),
        &CollaboratorId(collaborator_id),
        req,
    )
    .await
    .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_delete_project_collaborator(
    State(state): State<Arc<AppState>>,
    Path((project_id, collaborator_id)): Path<(String, String)>,
) -> HttpResult<StatusCode> {
    server_api::delete_project_collaborator(
        &state.api,
        &ProjectId(project_id),
        &CollaboratorId(collaborator_id),
    )
    .await
    .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_collaborators(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<GlobalCollaborator>>> {
    let roster = server_api::list_global_collaborators(&state.api)
        .await
        .map_err(reject)?;
    Ok(Json(roster))
}

async fn http_create_collaborator(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewGlobalCollaborator>,
) -> HttpResult<(StatusCode, Json<GlobalCollaborator>)> {
    let collaborator = server_api::create_global_collaborator(&state.api, req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(collaborator)))
}

async fn http_update_collaborator(
    State(state): State<Arc<AppState>>,
    Path(collaborator_id): Path<String>,
    Json(req): Json<CollaboratorUpdate>,
) -> HttpResult<Json<GlobalCollaborator>> {
    let collaborator =
        server_api::update_global_collaborator(&state.api, &CollaboratorId(collaborator_id), req)
            .await
            .map_err(reject)?;
    Ok(Json(collaborator))
}

async fn http_delete_collaborator(
    State(state): State<Arc<AppState>>,
    Path(collaborator_id): Path<String>,
) -> HttpResult<StatusCode> {
    server_api::delete_global_collaborator(&state.api, &CollaboratorId(collaborator_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_upload_spreadsheet(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    mut multipart: Multipart,
) -> HttpResult<Json<SpreadsheetReceipt>> {
    let project_id = ProjectId(project_id);
    while let Some(field) = multipart.next_field().await.map_err(multipart_rejection)? {
        if field.name() != Some(SPREADSHEET_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let contents = field.bytes().await.map_err(multipart_rejection)?;
        let receipt =
            server_api::receive_spreadsheet(&state.api, &project_id, &filename, &contents)
                .await
                .map_err(reject)?;
        return Ok(Json(receipt));
    }

    Err(reject(ApiError::new(
        ErrorCode::Validation,
        format!("multipart field '{SPREADSHEET_FIELD}' is missing"),
    )))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
