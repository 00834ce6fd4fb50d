use super::*;
use axum::{body, body::Body, http::Request, response::Response};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

const BOUNDARY: &str = "avalia-test-boundary";

async fn test_app(max_upload_bytes: usize) -> (Router, Storage) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext {
        storage: storage.clone(),
        max_upload_bytes,
    };
    (build_router(Arc::new(AppState { api })), storage)
}

fn json_request(method: &str, uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .expect("request")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn multipart_request(uri: &str, field: &str, filename: &str, contents: &[u8]) -> Request<Body> {
    let mut payload = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    payload.extend_from_slice(contents);
    payload.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(payload))
        .expect("request")
}

async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&body).expect("json")
}

async fn seeded(app: &Router) -> (Project, GlobalCollaborator) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/projects",
            serde_json::json!({ "name": "Janeiro", "month": "2024-01" }),
        ))
        .await
        .expect("create project");
    assert_eq!(response.status(), StatusCode::CREATED);
    let project: Project = read_json(response).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/collaborators",
            serde_json::json!({ "nome": "Ana Souza", "cpf": "111", "idCallRote": "r-1" }),
        ))
        .await
        .expect("create collaborator");
    assert_eq!(response.status(), StatusCode::CREATED);
    let collaborator: GlobalCollaborator = read_json(response).await;

    (project, collaborator)
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage) = test_app(1024).await;
    let response = app
        .oneshot(empty_request("GET", "/healthz"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn project_routes_create_list_update_and_delete() {
    let (app, _storage) = test_app(1024).await;
    let (project, _) = seeded(&app).await;
    assert!(project.parameters.is_empty());
    assert!(!project.id.as_str().is_empty());

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/projects/{}", project.id),
            serde_json::json!({ "parameters": { "TARM_removidos": 7.0 } }),
        ))
        .await
        .expect("update");
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Project = read_json(response).await;
    assert_eq!(updated.parameters.get("TARM_removidos"), Some(&7.0));

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/projects"))
        .await
        .expect("list");
    let projects: Vec<Project> = read_json(response).await;
    assert_eq!(projects, vec![updated]);

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/projects/{}", project.id)))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(empty_request("DELETE", &format!("/projects/{}", project.id)))
        .await
        .expect("delete again");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_project_name_returns_conflict_body() {
    let (app, _storage) = test_app(1024).await;
    seeded(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/projects",
            serde_json::json!({ "name": "janeiro", "month": "2024-02" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let err: ApiError = read_json(response).await;
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[tokio::test]
async fn membership_routes_enforce_uniqueness() {
    let (app, _storage) = test_app(1024).await;
    let (project, ana) = seeded(&app).await;
    let members_uri = format!("/projects/{}/collaborators", project.id);
    let add = serde_json::json!({ "id": ana.id, "role": "TARM" });

    let response = app
        .clone()
        .oneshot(json_request("POST", &members_uri, add.clone()))
        .await
        .expect("add");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request("POST", &members_uri, add))
        .await
        .expect("add again");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("{members_uri}/{}", ana.id),
            serde_json::json!({ "role": "FROTA" }),
        ))
        .await
        .expect("role");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(empty_request("GET", &members_uri))
        .await
        .expect("list");
    let members: Vec<ProjectCollaborator> = read_json(response).await;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, "FROTA");

    let response = app
        .oneshot(empty_request(
            "DELETE",
            &format!("{members_uri}/{}", ana.id),
        ))
        .await
        .expect("remove");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn adding_unknown_collaborator_is_not_found() {
    let (app, _storage) = test_app(1024).await;
    let (project, _) = seeded(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/projects/{}/collaborators", project.id),
            serde_json::json!({ "id": "ghost", "role": "TARM" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn roster_routes_patch_and_delete() {
    let (app, storage) = test_app(1024).await;
    let (_, ana) = seeded(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/collaborators/{}", ana.id),
            serde_json::json!({ "pontuacao": 42 }),
        ))
        .await
        .expect("patch");
    assert_eq!(response.status(), StatusCode::OK);
    let updated: GlobalCollaborator = read_json(response).await;
    assert_eq!(updated.pontuacao, Some(42));
    assert_eq!(updated.nome, "Ana Souza");

    let response = app
        .oneshot(empty_request("DELETE", &format!("/collaborators/{}", ana.id)))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(storage
        .list_collaborators()
        .await
        .expect("roster")
        .is_empty());
}

#[tokio::test]
async fn spreadsheet_upload_is_stored() {
    let (app, storage) = test_app(1024).await;
    let (project, _) = seeded(&app).await;

    let response = app
        .oneshot(multipart_request(
            &format!("/{}/processar", project.id),
            SPREADSHEET_FIELD,
            "janeiro.xlsx",
            b"sheet-bytes",
        ))
        .await
        .expect("upload");
    assert_eq!(response.status(), StatusCode::OK);
    let receipt: SpreadsheetReceipt = read_json(response).await;
    assert_eq!(receipt.filename, "janeiro.xlsx");
    assert_eq!(receipt.size_bytes, 11);

    let uploads = storage.list_uploads(&project.id).await.expect("uploads");
    assert_eq!(uploads.len(), 1);
}

#[tokio::test]
async fn spreadsheet_over_limit_is_rejected() {
    let (app, _storage) = test_app(8).await;
    let (project, _) = seeded(&app).await;

    let response = app
        .oneshot(multipart_request(
            &format!("/{}/processar", project.id),
            SPREADSHEET_FIELD,
            "janeiro.xlsx",
            b"more than eight bytes",
        ))
        .await
        .expect("upload");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn upload_without_expected_field_is_bad_request() {
    let (app, _storage) = test_app(1024).await;
    let (project, _) = seeded(&app).await;

    let response = app
        .oneshot(multipart_request(
            &format!("/{}/processar", project.id),
            "file",
            "janeiro.xlsx",
            b"sheet",
        ))
        .await
        .expect("upload");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn every_error_code_maps_to_its_status() {
    assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(status_for(ErrorCode::Validation), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(ErrorCode::Conflict), StatusCode::CONFLICT);
    assert_eq!(
        status_for(ErrorCode::PayloadTooLarge),
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(
        status_for(ErrorCode::Internal),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
