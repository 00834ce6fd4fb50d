use async_trait::async_trait;
use shared::{
    domain::{CollaboratorId, GlobalCollaborator, Project, ProjectCollaborator, ProjectId},
    protocol::{
        AddProjectCollaborator, CollaboratorUpdate, NewGlobalCollaborator, NewProject,
        ProjectUpdate, UpdateProjectCollaborator,
    },
};

use crate::error::RemoteError;

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Network boundary for project, roster and membership records.
///
/// Implementations return raw records or fail; they never touch the store.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list_projects(&self) -> RemoteResult<Vec<Project>>;
    async fn create_project(&self, project: &NewProject) -> RemoteResult<Project>;
    async fn update_project(&self, id: &ProjectId, update: &ProjectUpdate)
        -> RemoteResult<Project>;
    async fn delete_project(&self, id: &ProjectId) -> RemoteResult<()>;

    async fn list_project_collaborators(
        &self,
        project_id: &ProjectId,
    ) -> RemoteResult<Vec<ProjectCollaborator>>;
    async fn add_project_collaborator(
        &self,
        project_id: &ProjectId,
        request: &AddProjectCollaborator,
    ) -> RemoteResult<()>;
    async fn update_project_collaborator(
        &self,
        project_id: &ProjectId,
        collaborator_id: &CollaboratorId,
        request: &UpdateProjectCollaborator,
    ) -> RemoteResult<()>;
    async fn delete_project_collaborator(
        &self,
        project_id: &ProjectId,
        collaborator_id: &CollaboratorId,
    ) -> RemoteResult<()>;

    async fn list_global_collaborators(&self) -> RemoteResult<Vec<GlobalCollaborator>>;
    async fn create_global_collaborator(
        &self,
        collaborator: &NewGlobalCollaborator,
    ) -> RemoteResult<GlobalCollaborator>;
    async fn update_global_collaborator(
        &self,
        id: &CollaboratorId,
        update: &CollaboratorUpdate,
    ) -> RemoteResult<GlobalCollaborator>;
    async fn delete_global_collaborator(&self, id: &CollaboratorId) -> RemoteResult<()>;

    async fn upload_spreadsheet(
        &self,
        project_id: &ProjectId,
        filename: &str,
        contents: Vec<u8>,
    ) -> RemoteResult<()>;
}

pub struct MissingRemoteGateway;

fn unavailable<T>(operation: &str) -> RemoteResult<T> {
    Err(RemoteError::Unavailable(format!(
        "no gateway configured for {operation}"
    )))
}

#[async_trait]
impl RemoteGateway for MissingRemoteGateway {
    async fn list_projects(&self) -> RemoteResult<Vec<Project>> {
        unavailable("list_projects")
    }

    async fn create_project(&self, _project: &NewProject) -> RemoteResult<Project> {
        unavailable("create_project")
    }

    async fn update_project(
        &self,
        _id: &ProjectId,
        _update: &ProjectUpdate,
    ) -> RemoteResult<Project> {
        unavailable("update_project")
    }

    async fn delete_project(&self, _id: &ProjectId) -> RemoteResult<()> {
        unavailable("delete_project")
    }

    async fn list_project_collaborators(
        &self,
        _project_id: &ProjectId,
    ) -> RemoteResult<Vec<ProjectCollaborator>> {
        unavailable("list_project_collaborators")
    }

    async fn add_project_collaborator(
        &self,
        _project_id: &ProjectId,
        _request: &AddProjectCollaborator,
    ) -> RemoteResult<()> {
        unavailable("add_project_collaborator")
    }

    async fn update_project_collaborator(
        &self,
        _project_id: &ProjectId,
        _collaborator_id: &CollaboratorId,
        _request: &UpdateProjectCollaborator,
    ) -> RemoteResult<()> {
        unavailable("update_project_collaborator")
    }

    async fn delete_project_collaborator(
        &self,
        _project_id: &ProjectId,
        _collaborator_id: &CollaboratorId,
    ) -> RemoteResult<()> {
        unavailable("delete_project_collaborator")
    }

    async fn list_global_collaborators(&self) -> RemoteResult<Vec<GlobalCollaborator>> {
        unavailable("list_global_collaborators")
    }

    async fn create_global_collaborator(
        &self,
        _collaborator: &NewGlobalCollaborator,
    ) -> RemoteResult<GlobalCollaborator> {
        unavailable("create_global_collaborator")
    }

    async fn update_global_collaborator(
        &self,
        _id: &CollaboratorId,
        _update: &CollaboratorUpdate,
    ) -> RemoteResult<GlobalCollaborator> {
        unavailable("update_global_collaborator")
    }

    async fn delete_global_collaborator(&self, _id: &CollaboratorId) -> RemoteResult<()> {
        unavailable("delete_global_collaborator")
    }

    async fn upload_spreadsheet(
        &self,
        _project_id: &ProjectId,
        _filename: &str,
        _contents: Vec<u8>,
    ) -> RemoteResult<()> {
        unavailable("upload_spreadsheet")
    }
}
