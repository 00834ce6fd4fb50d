//! Pure derivations over a [`StoreSnapshot`]. Nothing here fails or mutates.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use shared::domain::{CollaboratorId, GlobalCollaborator, ProjectId};

use crate::{
    parameters::{namespaced_key, parameter_fields},
    store::StoreSnapshot,
};

pub const UNKNOWN_COLLABORATOR_NAME: &str = "Nome Desconhecido";

/// Membership record joined with its roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedCollaboratorRow {
    pub id: CollaboratorId,
    pub nome: String,
    pub cpf: String,
    pub id_call_rote: String,
    pub role: String,
    pub pontuacao: Option<i64>,
    pub is_global: bool,
    pub project_id: ProjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoleFilter {
    #[default]
    All,
    Role(String),
}

impl RoleFilter {
    /// `"all"` (any case) or an empty string selects every role.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Role(value.to_string())
        }
    }

    pub fn matches(&self, role: &str) -> bool {
        match self {
            Self::All => true,
            Self::Role(wanted) => wanted == role,
        }
    }
}

/// Rows for the selected project's membership, in membership order.
///
/// Role and score come from the membership record. A member missing from the
/// roster gets the unknown-name sentinel and empty identifiers.
pub fn combined_rows(store: &StoreSnapshot) -> Vec<CombinedCollaboratorRow> {
    let Some(project_id) = store.selected_project.as_ref() else {
        return Vec::new();
    };
    let Some(membership) = store.membership(project_id) else {
        return Vec::new();
    };

    let roster: HashMap<&CollaboratorId, &GlobalCollaborator> = store
        .global_collaborators
        .iter()
        .map(|collaborator| (&collaborator.id, collaborator))
        .collect();

    membership
        .iter()
        .map(|member| {
            let global = roster.get(&member.id);
            CombinedCollaboratorRow {
                id: member.id.clone(),
                nome: global
                    .map(|g| g.nome.clone())
                    .unwrap_or_else(|| UNKNOWN_COLLABORATOR_NAME.to_string()),
                cpf: global.map(|g| g.cpf.clone()).unwrap_or_default(),
                id_call_rote: global.map(|g| g.id_call_rote.clone()).unwrap_or_default(),
                role: member.role.clone(),
                pontuacao: member.pontuacao,
                is_global: global.map(|g| g.is_global).unwrap_or(false),
                project_id: project_id.clone(),
            }
        })
        .collect()
}

/// Rows whose name contains `search` (case-insensitive) and whose role passes `role`.
pub fn filter_rows(
    rows: &[CombinedCollaboratorRow],
    search: &str,
    role: &RoleFilter,
) -> Vec<CombinedCollaboratorRow> {
    let needle = search.to_lowercase();
    rows.iter()
        .filter(|row| row.nome.to_lowercase().contains(&needle) && role.matches(&row.role))
        .cloned()
        .collect()
}

/// Distinct roles among the selected project's members, sorted.
pub fn role_facets(store: &StoreSnapshot) -> Vec<String> {
    store
        .selected_membership()
        .unwrap_or_default()
        .iter()
        .map(|member| member.role.as_str())
        .filter(|role| !role.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Roster entries not yet in the selected project, in roster order.
pub fn available_collaborators(store: &StoreSnapshot) -> Vec<GlobalCollaborator> {
    if store.selected_project.is_none() {
        return Vec::new();
    }
    let members: HashSet<&CollaboratorId> = store
        .selected_membership()
        .unwrap_or_default()
        .iter()
        .map(|member| &member.id)
        .collect();

    store
        .global_collaborators
        .iter()
        .filter(|collaborator| !members.contains(&collaborator.id))
        .cloned()
        .collect()
}

/// Initial form values for `role` in `project_id`: one entry per configured
/// key, read from `{role}_{key}` and defaulting to `0`.
pub fn parameter_form(
    store: &StoreSnapshot,
    project_id: &ProjectId,
    role: &str,
) -> BTreeMap<String, f64> {
    let parameters = store.project(project_id).map(|project| &project.parameters);
    parameter_fields(role)
        .iter()
        .map(|field| {
            let value = parameters
                .and_then(|parameters| parameters.get(&namespaced_key(role, field.key)))
                .copied()
                .unwrap_or(0.0);
            (field.key.to_string(), value)
        })
        .collect()
}

/// `true` while the selected project's membership has not arrived yet.
pub fn is_membership_loading(store: &StoreSnapshot) -> bool {
    store
        .selected_project
        .as_ref()
        .is_some_and(|id| store.membership(id).is_none())
}
