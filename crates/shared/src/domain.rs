use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(ProjectId);
id_newtype!(CollaboratorId);

/// Flat parameter mapping keyed by `{ROLE}_{paramKey}`.
pub type ParameterMap = BTreeMap<String, f64>;

/// One evaluation period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub month: String,
    #[serde(default)]
    pub parameters: ParameterMap,
}

/// A person in the organization-wide roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalCollaborator {
    pub id: CollaboratorId,
    pub nome: String,
    #[serde(default)]
    pub cpf: String,
    #[serde(default)]
    pub id_call_rote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pontuacao: Option<i64>,
    #[serde(default)]
    pub is_global: bool,
}

/// Membership of a roster entry in exactly one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCollaborator {
    pub id: CollaboratorId,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pontuacao: Option<i64>,
}
