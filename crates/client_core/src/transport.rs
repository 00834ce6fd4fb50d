use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{CollaboratorId, GlobalCollaborator, Project, ProjectCollaborator, ProjectId},
    error::ApiError,
    protocol::{
        AddProjectCollaborator, CollaboratorUpdate, NewGlobalCollaborator, NewProject,
        ProjectUpdate, UpdateProjectCollaborator, SPREADSHEET_FIELD,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    error::RemoteError,
    gateway::{RemoteGateway, RemoteResult},
};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIME: &str = "application/vnd.ms-excel";

#[derive(Debug, thiserror::Error)]
pub enum GatewayUrlError {
    #[error("invalid server url '{url}': {source}")]
    Parse {
        url: String,
        source: url::ParseError,
    },
    #[error("server url must use http:// or https://, got '{0}'")]
    Scheme(String),
}

/// `RemoteGateway` over the HTTP/JSON contract.
#[derive(Clone)]
pub struct HttpGateway {
    http: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(server_url: &str) -> Result<Self, GatewayUrlError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, GatewayUrlError> {
        let base_url = Url::parse(server_url.trim()).map_err(|source| GatewayUrlError::Parse {
            url: server_url.to_string(),
            source,
        })?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(GatewayUrlError::Scheme(server_url.to_string()));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn json<T: DeserializeOwned>(&self, url: Url, response: Response) -> RemoteResult<T> {
        let response = check_status(&url, response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(url: &Url, response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let endpoint = url.path().to_string();
    let body = response.bytes().await?;
    match serde_json::from_slice::<ApiError>(&body) {
        Ok(api_error) => Err(RemoteError::from_api_error(endpoint, status, api_error)),
        Err(_) => Err(RemoteError::Status {
            endpoint,
            status,
            code: None,
            message: String::from_utf8_lossy(&body).into_owned(),
        }),
    }
}

fn spreadsheet_mime(filename: &str) -> &'static str {
    if filename.to_ascii_lowercase().ends_with(".xls") {
        XLS_MIME
    } else {
        XLSX_MIME
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_projects(&self) -> RemoteResult<Vec<Project>> {
        let url = self.endpoint(&["projects"]);
        debug!(%url, "gateway: list projects");
        let response = self.http.get(url.clone()).send().await?;
        self.json(url, response).await
    }

    async fn create_project(&self, project: &NewProject) -> RemoteResult<Project> {
        let url = self.endpoint(&["projects"]);
        debug!(%url, name = %project.name, "gateway: create project");
        let response = self.http.post(url.clone()).json(project).send().await?;
        self.json(url, response).await
    }

    async fn update_project(
        &self,
        id: &ProjectId,
        update: &ProjectUpdate,
    ) -> RemoteResult<Project> {
        let url = self.endpoint(&["projects", id.as_str()]);
        debug!(%url, "gateway: update project");
        let response = self.http.patch(url.clone()).json(update).send().await?;
        self.json(url, response).await
    }

    async fn delete_project(&self, id: &ProjectId) -> RemoteResult<()> {
        let url = self.endpoint(&["projects", id.as_str()]);
        debug!(%url, "gateway: delete project");
        let response = self.http.delete(url.clone()).send().await?;
        check_status(&url, response).await?;
        Ok(())
    }

    async fn list_project_collaborators(
        &self,
        project_id: &ProjectId,
    ) -> RemoteResult<Vec<ProjectCollaborator>> {
        let url = self.endpoint(&["projects", project_id.as_str(), "collaborators"]);
        debug!(%url, "gateway: list project collaborators");
        let response = self.http.get(url.clone()).send().await?;
        self.json(url, response).await
    }

    async fn add_project_collaborator(
        &self,
        project_id: &ProjectId,
        request: &AddProjectCollaborator,
    ) -> RemoteResult<()> {
        let url = self.endpoint(&["projects", project_id.as_str(), "collaborators"]);
        debug!(%url, collaborator = %request.id, "gateway: add project collaborator");
        let response = self.http.post(url.clone()).json(request).send().await?;
        check_status(&url, response).await?;
        Ok(())
    }

    async fn update_project_collaborator(
        &self,
        project_id: &ProjectId,
        collaborator_id: &CollaboratorId,
        request: &UpdateProjectCollaborator,
    ) -> RemoteResult<()> {
        let url = self.endpoint(&[
            "projects",
            project_id.as_str(),
            "collaborators",
            collaborator_id.as_str(),
        ]);
        debug!(%url, role = %request.role, "gateway: update project collaborator");
        let response = self.http.patch(url.clone()).json(request).send().await?;
        check_status(&url, response).await?;
        Ok(())
    }

    async fn delete_project_collaborator(
        &self,
        project_id: &ProjectId,
        collaborator_id: &CollaboratorId,
    ) -> RemoteResult<()> {
        let url = self.endpoint(&[
            "projects",
            project_id.as_str(),
            "collaborators",
            collaborator_id.as_str(),
        ]);
        debug!(%url, "gateway: delete project collaborator");
        let response = self.http.delete(url.clone()).send().await?;
        check_status(&url, response).await?;
        Ok(())
    }

    async fn list_global_collaborators(&self) -> RemoteResult<Vec<GlobalCollaborator>> {
        let url = self.endpoint(&["collaborators"]);
        debug!(%url, "gateway: list roster");
        let response = self.http.get(url.clone()).send().await?;
        self.json(url, response).await
    }

    async fn create_global_collaborator(
        &self,
        collaborator: &NewGlobalCollaborator,
    ) -> RemoteResult<GlobalCollaborator> {
        let url = self.endpoint(&["collaborators"]);
        debug!(%url, "gateway: create roster entry");
        let response = self.http.post(url.clone()).json(collaborator).send().await?;
        self.json(url, response).await
    }

    async fn update_global_collaborator(
        &self,
        id: &CollaboratorId,
        update: &CollaboratorUpdate,
    ) -> RemoteResult<GlobalCollaborator> {
        let url = self.endpoint(&["collaborators", id.as_str()]);
        debug!(%url, "gateway: update roster entry");
        let response = self.http.patch(url.clone()).json(update).send().await?;
        self.json(url, response).await
    }

    async fn delete_global_collaborator(&self, id: &CollaboratorId) -> RemoteResult<()> {
        let url = self.endpoint(&["collaborators", id.as_str()]);
        debug!(%url, "gateway: delete roster entry");
        let response = self.http.delete(url.clone()).send().await?;
        check_status(&url, response).await?;
        Ok(())
    }

    async fn upload_spreadsheet(
        &self,
        project_id: &ProjectId,
        filename: &str,
        contents: Vec<u8>,
    ) -> RemoteResult<()> {
        let url = self.endpoint(&[project_id.as_str(), "processar"]);
        debug!(%url, filename, size_bytes = contents.len(), "gateway: upload spreadsheet");
        let part = Part::bytes(contents)
            .file_name(filename.to_string())
            .mime_str(spreadsheet_mime(filename))?;
        let form = Form::new().part(SPREADSHEET_FIELD, part);
        let response = self.http.post(url.clone()).multipart(form).send().await?;
        check_status(&url, response).await?;
        Ok(())
    }
}
