use std::{collections::BTreeMap, sync::Arc};

use shared::{
    domain::{
        CollaboratorId, GlobalCollaborator, ParameterMap, Project, ProjectCollaborator, ProjectId,
    },
    protocol::{
        AddProjectCollaborator, CollaboratorUpdate, NewGlobalCollaborator, NewProject,
        ProjectUpdate, UpdateProjectCollaborator,
    },
};
use tokio::{
    sync::{broadcast, watch, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod error;
pub mod gateway;
pub mod parameters;
pub mod store;
pub mod transport;
pub mod views;

pub use error::{RemoteError, StoreError, StoreResult};
pub use gateway::{MissingRemoteGateway, RemoteGateway};
pub use store::StoreSnapshot;
pub use transport::{GatewayUrlError, HttpGateway};

use parameters::{
    default_project_parameters, flatten_role_values, merge_parameters, parameter_fields,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const SPREADSHEET_EXTENSIONS: &[&str] = &[".xlsx", ".xls"];

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    ProjectsChanged,
    RosterChanged,
    MembershipRefreshed { project_id: ProjectId },
    SelectionChanged(Option<ProjectId>),
    Error(String),
}

/// Only writer to the entity store. The store is written after the remote call succeeds.
pub struct ProjectClient {
    gateway: Arc<dyn RemoteGateway>,
    inner: RwLock<StoreSnapshot>,
    selection: watch::Sender<Option<ProjectId>>,
    events: broadcast::Sender<StoreEvent>,
}

impl ProjectClient {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (selection, _) = watch::channel(None);
        Arc::new(Self {
            gateway,
            inner: RwLock::new(StoreSnapshot::default()),
            selection,
            events,
        })
    }

    pub fn disconnected() -> Arc<Self> {
        Self::new(Arc::new(MissingRemoteGateway))
    }

    pub fn connect(server_url: &str) -> Result<Arc<Self>, GatewayUrlError> {
        Ok(Self::new(Arc::new(HttpGateway::new(server_url)?)))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Option<ProjectId>> {
        self.selection.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    fn surface<E: std::fmt::Display>(&self, action: &str, err: E) -> E {
        warn!(action, error = %err, "store: action failed");
        self.emit(StoreEvent::Error(format!("{action}: {err}")));
        err
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.inner.read().await.clone()
    }

    pub async fn projects(&self) -> Vec<Project> {
        self.inner.read().await.projects.clone()
    }

    pub async fn global_collaborators(&self) -> Vec<GlobalCollaborator> {
        self.inner.read().await.global_collaborators.clone()
    }

    pub async fn project_collaborators(
        &self,
        project_id: &ProjectId,
    ) -> Option<Vec<ProjectCollaborator>> {
        self.inner
            .read()
            .await
            .project_collaborators
            .get(project_id)
            .cloned()
    }

    pub async fn selected_project(&self) -> Option<ProjectId> {
        self.inner.read().await.selected_project.clone()
    }

    /// Returns whether the selection actually changed.
    pub async fn set_selected_project(&self, project_id: Option<ProjectId>) -> bool {
        {
            let mut guard = self.inner.write().await;
            if guard.selected_project == project_id {
                return false;
            }
            guard.selected_project = project_id.clone();
            // Published under the guard so the watch value never lags the store.
            self.selection.send_replace(project_id.clone());
        }
        info!(project = ?project_id, "store: selection changed");
        self.emit(StoreEvent::SelectionChanged(project_id));
        true
    }

    pub fn spawn_selection_tracker(self: &Arc<Self>) -> JoinHandle<()> {
        let mut selection = self.selection.subscribe();
        if selection.borrow().is_some() {
            selection.mark_changed();
        }
        let client = Arc::clone(self);
        tokio::spawn(async move {
            while selection.changed().await.is_ok() {
                let current = selection.borrow_and_update().clone();
                let Some(project_id) = current else {
                    continue;
                };
                if let Err(err) = client.fetch_project_collaborators(&project_id).await {
                    warn!(project = %project_id, error = %err, "store: fetch on select failed");
                }
            }
        })
    }

    pub async fn load_projects(&self) -> StoreResult<Vec<Project>> {
        let projects = self
            .gateway
            .list_projects()
            .await
            .map_err(|err| self.surface("load_projects", err))?;

        let cleared_selection = {
            let mut guard = self.inner.write().await;
            guard.replace_projects(projects.clone());
            let stale = guard
                .selected_project
                .as_ref()
                .is_some_and(|id| guard.project(id).is_none());
            if stale {
                guard.selected_project = None;
                self.selection.send_replace(None);
            }
            stale
        };

        info!(count = projects.len(), "store: projects loaded");
        self.emit(StoreEvent::ProjectsChanged);
        if cleared_selection {
            self.emit(StoreEvent::SelectionChanged(None));
        }
        Ok(projects)
    }

    pub async fn create_project(
        &self,
        name: &str,
        month: &str,
        parameters: ParameterMap,
    ) -> StoreResult<Project> {
        let name = name.trim();
        let month = month.trim();
        if name.is_empty() || month.is_empty() {
            return Err(StoreError::Validation(
                "project name and month are required".to_string(),
            ));
        }
        if self.inner.read().await.has_project_named(name, None) {
            return Err(StoreError::duplicate_project_name(name));
        }

        let request = NewProject {
            name: name.to_string(),
            month: month.to_string(),
            parameters: merge_parameters(&default_project_parameters(), &parameters),
        };
        let project = self
            .gateway
            .create_project(&request)
            .await
            .map_err(|err| self.surface("create_project", err))?;

        self.inner.write().await.push_project(project.clone());
        info!(project = %project.id, name = %project.name, "store: project created");
        self.emit(StoreEvent::ProjectsChanged);
        Ok(project)
    }

    // Parameters are merged over the stored ones so other roles' keys survive.
    pub async fn update_project(
        &self,
        id: &ProjectId,
        mut update: ProjectUpdate,
    ) -> StoreResult<Project> {
        {
            let guard = self.inner.read().await;
            if let Some(name) = update.name.as_mut() {
                *name = name.trim().to_string();
                if name.is_empty() {
                    return Err(StoreError::Validation(
                        "project name must not be empty".to_string(),
                    ));
                }
                if guard.has_project_named(name, Some(id)) {
                    return Err(StoreError::duplicate_project_name(name));
                }
            }
            if let Some(incoming) = update.parameters.take() {
                let existing = guard
                    .project(id)
                    .ok_or_else(|| StoreError::project_not_found(id))?;
                update.parameters = Some(merge_parameters(&existing.parameters, &incoming));
            }
        }

        let project = self
            .gateway
            .update_project(id, &update)
            .await
            .map_err(|err| self.surface("update_project", err))?;

        self.inner.write().await.replace_project(project.clone());
        info!(project = %project.id, "store: project updated");
        self.emit(StoreEvent::ProjectsChanged);
        Ok(project)
    }

    pub async fn save_role_parameters(
        &self,
        id: &ProjectId,
        role: &str,
        values: &BTreeMap<String, f64>,
    ) -> StoreResult<Project> {
        let fields = parameter_fields(role);
        if fields.is_empty() {
            return Err(StoreError::Validation(format!(
                "role '{role}' has no configurable parameters"
            )));
        }
        if let Some(key) = values
            .keys()
            .find(|key| !fields.iter().any(|field| field.key == key.as_str()))
        {
            return Err(StoreError::Validation(format!(
                "'{key}' is not a parameter of role '{role}'"
            )));
        }
        self.update_project(
            id,
            ProjectUpdate::parameters(flatten_role_values(role, values)),
        )
        .await
    }

    pub async fn delete_project(&self, id: &ProjectId) -> StoreResult<()> {
        self.gateway
            .delete_project(id)
            .await
            .map_err(|err| self.surface("delete_project", err))?;

        let was_selected = {
            let mut guard = self.inner.write().await;
            guard.remove_project(id);
            let was_selected = guard.selected_project.as_ref() == Some(id);
            if was_selected {
                guard.selected_project = None;
                self.selection.send_replace(None);
            }
            was_selected
        };

        info!(project = %id, "store: project deleted");
        self.emit(StoreEvent::ProjectsChanged);
        if was_selected {
            self.emit(StoreEvent::SelectionChanged(None));
        }
        Ok(())
    }

    pub async fn fetch_project_collaborators(
        &self,
        project_id: &ProjectId,
    ) -> StoreResult<Vec<ProjectCollaborator>> {
        let membership = self
            .gateway
            .list_project_collaborators(project_id)
            .await
            .map_err(|err| self.surface("fetch_project_collaborators", err))?;

        let stored = self
            .inner
            .write()
            .await
            .replace_membership(project_id.clone(), membership.clone());
        if !stored {
            debug!(project = %project_id, "store: membership for deleted project dropped");
            return Ok(membership);
        }
        info!(project = %project_id, count = membership.len(), "store: membership refreshed");
        self.emit(StoreEvent::MembershipRefreshed {
            project_id: project_id.clone(),
        });
        Ok(membership)
    }

    pub async fn add_collaborator_to_project(
        &self,
        project_id: &ProjectId,
        collaborator_id: &CollaboratorId,
        role: &str,
    ) -> StoreResult<Vec<ProjectCollaborator>> {
        let role = required_role(role)?;
        let request = AddProjectCollaborator {
            id: collaborator_id.clone(),
            role,
        };
        self.gateway
            .add_project_collaborator(project_id, &request)
            .await
            .map_err(|err| self.surface("add_collaborator_to_project", err))?;
        info!(project = %project_id, collaborator = %collaborator_id, "store: collaborator added");
        self.fetch_project_collaborators(project_id).await
    }

    pub async fn update_project_collaborator(
        &self,
        project_id: &ProjectId,
        collaborator_id: &CollaboratorId,
        role: &str,
    ) -> StoreResult<Vec<ProjectCollaborator>> {
        let role = required_role(role)?;
        self.gateway
            .update_project_collaborator(
                project_id,
                collaborator_id,
                &UpdateProjectCollaborator { role },
            )
            .await
            .map_err(|err| self.surface("update_project_collaborator", err))?;
        info!(project = %project_id, collaborator = %collaborator_id, "store: membership role updated");
        self.fetch_project_collaborators(project_id).await
    }

    pub async fn delete_collaborator_from_project(
        &self,
        project_id: &ProjectId,
        collaborator_id: &CollaboratorId,
    ) -> StoreResult<Vec<ProjectCollaborator>> {
        self.gateway
            .delete_project_collaborator(project_id, collaborator_id)
            .await
            .map_err(|err| self.surface("delete_collaborator_from_project", err))?;
        info!(project = %project_id, collaborator = %collaborator_id, "store: collaborator removed");
        self.fetch_project_collaborators(project_id).await
    }

    pub async fn load_global_collaborators(&self) -> StoreResult<Vec<GlobalCollaborator>> {
        let roster = self
            .gateway
            .list_global_collaborators()
            .await
            .map_err(|err| self.surface("load_global_collaborators", err))?;

        self.inner.write().await.replace_roster(roster.clone());
        info!(count = roster.len(), "store: roster loaded");
        self.emit(StoreEvent::RosterChanged);
        Ok(roster)
    }

    pub async fn create_global_collaborator(
        &self,
        collaborator: NewGlobalCollaborator,
    ) -> StoreResult<GlobalCollaborator> {
        if collaborator.nome.trim().is_empty() {
            return Err(StoreError::Validation(
                "collaborator name is required".to_string(),
            ));
        }
        let created = self
            .gateway
            .create_global_collaborator(&collaborator)
            .await
            .map_err(|err| self.surface("create_global_collaborator", err))?;
        info!(collaborator = %created.id, "store: roster entry created");
        self.load_global_collaborators().await?;
        Ok(created)
    }

    pub async fn update_global_collaborator(
        &self,
        id: &CollaboratorId,
        update: CollaboratorUpdate,
    ) -> StoreResult<GlobalCollaborator> {
        let updated = self
            .gateway
            .update_global_collaborator(id, &update)
            .await
            .map_err(|err| self.surface("update_global_collaborator", err))?;
        info!(collaborator = %id, "store: roster entry updated");
        self.load_global_collaborators().await?;
        Ok(updated)
    }

    pub async fn delete_global_collaborator(&self, id: &CollaboratorId) -> StoreResult<()> {
        self.gateway
            .delete_global_collaborator(id)
            .await
            .map_err(|err| self.surface("delete_global_collaborator", err))?;
        info!(collaborator = %id, "store: roster entry deleted");
        self.load_global_collaborators().await?;
        Ok(())
    }

    pub async fn upload_spreadsheet(
        &self,
        project_id: &ProjectId,
        filename: &str,
        contents: Vec<u8>,
    ) -> StoreResult<()> {
        let lower = filename.to_ascii_lowercase();
        if !SPREADSHEET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return Err(StoreError::Validation(format!(
                "'{filename}' is not an .xlsx or .xls spreadsheet"
            )));
        }
        if contents.is_empty() {
            return Err(StoreError::Validation(format!("'{filename}' is empty")));
        }

        let size_bytes = contents.len();
        self.gateway
            .upload_spreadsheet(project_id, filename, contents)
            .await
            .map_err(|err| self.surface("upload_spreadsheet", err))?;
        info!(project = %project_id, filename, size_bytes, "store: spreadsheet processed");
        Ok(())
    }
}

fn required_role(role: &str) -> StoreResult<String> {
    let role = role.trim();
    if role.is_empty() {
        return Err(StoreError::Validation(
            "membership role is required".to_string(),
        ));
    }
    Ok(role.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod transport_tests;
