use std::collections::{HashMap, HashSet};

use shared::domain::{GlobalCollaborator, Project, ProjectCollaborator, ProjectId};

/// Authoritative in-memory state.
///
/// A project's membership entry is either absent (never fetched) or the
/// complete sequence from its last fetch. Slices are only ever replaced whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub projects: Vec<Project>,
    pub global_collaborators: Vec<GlobalCollaborator>,
    pub project_collaborators: HashMap<ProjectId, Vec<ProjectCollaborator>>,
    pub selected_project: Option<ProjectId>,
    /// Ids deleted through this store. Late fetch results for them are dropped.
    pub(crate) removed_projects: HashSet<ProjectId>,
}

impl StoreSnapshot {
    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.iter().find(|project| &project.id == id)
    }

    pub fn selected(&self) -> Option<&Project> {
        self.selected_project
            .as_ref()
            .and_then(|id| self.project(id))
    }

    /// Membership of `id`, or `None` if it has not been fetched yet.
    pub fn membership(&self, id: &ProjectId) -> Option<&[ProjectCollaborator]> {
        self.project_collaborators.get(id).map(Vec::as_slice)
    }

    pub fn selected_membership(&self) -> Option<&[ProjectCollaborator]> {
        self.selected_project
            .as_ref()
            .and_then(|id| self.membership(id))
    }

    /// Case-insensitive name clash with any project other than `except`.
    pub fn has_project_named(&self, name: &str, except: Option<&ProjectId>) -> bool {
        let wanted = name.trim().to_lowercase();
        self.projects
            .iter()
            .filter(|project| Some(&project.id) != except)
            .any(|project| project.name.trim().to_lowercase() == wanted)
    }

    pub(crate) fn push_project(&mut self, project: Project) {
        self.projects.retain(|existing| existing.id != project.id);
        self.projects.push(project);
    }

    pub(crate) fn replace_project(&mut self, project: Project) {
        match self
            .projects
            .iter_mut()
            .find(|existing| existing.id == project.id)
        {
            Some(slot) => *slot = project,
            None => self.projects.push(project),
        }
    }

    pub(crate) fn replace_projects(&mut self, mut projects: Vec<Project>) {
        projects.retain(|project| !self.removed_projects.contains(&project.id));
        let live: HashSet<&ProjectId> = projects.iter().map(|project| &project.id).collect();
        self.project_collaborators.retain(|id, _| live.contains(id));
        self.projects = projects;
    }

    pub(crate) fn remove_project(&mut self, id: &ProjectId) {
        self.projects.retain(|project| &project.id != id);
        self.project_collaborators.remove(id);
        self.removed_projects.insert(id.clone());
    }

    pub(crate) fn replace_roster(&mut self, roster: Vec<GlobalCollaborator>) {
        self.global_collaborators = roster;
    }

    /// Returns false when the project was deleted and the write was dropped.
    pub(crate) fn replace_membership(
        &mut self,
        project_id: ProjectId,
        membership: Vec<ProjectCollaborator>,
    ) -> bool {
        if self.removed_projects.contains(&project_id) {
            return false;
        }
        self.project_collaborators.insert(project_id, membership);
        true
    }
}
