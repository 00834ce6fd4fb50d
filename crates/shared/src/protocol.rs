use serde::{Deserialize, Serialize};

use crate::domain::{CollaboratorId, ParameterMap, ProjectId};

/// Multipart field carrying the spreadsheet in `POST /{projectId}/processar`.
pub const SPREADSHEET_FIELD: &str = "arquivo";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub month: String,
    #[serde(default)]
    pub parameters: ParameterMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterMap>,
}

impl ProjectUpdate {
    pub fn parameters(parameters: ParameterMap) -> Self {
        Self {
            parameters: Some(parameters),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.month.is_none() && self.parameters.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGlobalCollaborator {
    pub nome: String,
    #[serde(default)]
    pub cpf: String,
    #[serde(default)]
    pub id_call_rote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pontuacao: Option<i64>,
    #[serde(default = "default_is_global")]
    pub is_global: bool,
}

fn default_is_global() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_call_rote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pontuacao: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddProjectCollaborator {
    pub id: CollaboratorId,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProjectCollaborator {
    pub role: String,
}

/// Acknowledgement returned by the spreadsheet ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetReceipt {
    pub upload_id: i64,
    pub project_id: ProjectId,
    pub filename: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_wire_names_follow_roster_contract() {
        let body = NewGlobalCollaborator {
            nome: "Ana".into(),
            cpf: "123".into(),
            id_call_rote: "77".into(),
            role: None,
            pontuacao: None,
            is_global: true,
        };
        let json = serde_json::to_value(&body).expect("json");
        assert_eq!(json["idCallRote"], "77");
        assert_eq!(json["isGlobal"], true);
        assert!(json.get("role").is_none());
    }

    #[test]
    fn project_update_omits_unset_fields() {
        let mut parameters = ParameterMap::new();
        parameters.insert("TARM_removidos".into(), 5.0);
        let json = serde_json::to_value(ProjectUpdate::parameters(parameters)).expect("json");
        assert!(json.get("name").is_none());
        assert_eq!(json["parameters"]["TARM_removidos"], 5.0);
    }

    #[test]
    fn new_collaborator_defaults_to_global() {
        let body: NewGlobalCollaborator =
            serde_json::from_str(r#"{"nome":"Bia"}"#).expect("json");
        assert!(body.is_global);
        assert_eq!(body.cpf, "");
    }
}
