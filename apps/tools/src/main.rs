use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    parameters::{configured_roles, parameter_fields},
    views::{available_collaborators, combined_rows, filter_rows, parameter_form, role_facets, RoleFilter},
    ProjectClient,
};
use shared::{
    domain::{CollaboratorId, ParameterMap, ProjectId},
    protocol::{CollaboratorUpdate, NewGlobalCollaborator, ProjectUpdate},
};

#[derive(Parser, Debug)]
#[command(about = "Manage evaluation projects and their collaborators")]
struct Cli {
    #[arg(long, env = "AVALIA_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    ListProjects,
    CreateProject {
        name: String,
        month: String,
    },
    RenameProject {
        project_id: String,
        name: String,
    },
    DeleteProject {
        project_id: String,
    },
    ListRoles,
    ShowParameters {
        project_id: String,
        role: String,
    },
    /// Values are `key=value` pairs for the role's configured keys.
    SetParameters {
        project_id: String,
        role: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    ListMembers {
        project_id: String,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "all")]
        role: String,
    },
    ListAvailable {
        project_id: String,
    },
    AddMember {
        project_id: String,
        collaborator_id: String,
        role: String,
    },
    SetMemberRole {
        project_id: String,
        collaborator_id: String,
        role: String,
    },
    RemoveMember {
        project_id: String,
        collaborator_id: String,
    },
    ListRoster,
    AddRosterEntry {
        nome: String,
        #[arg(long, default_value = "")]
        cpf: String,
        #[arg(long, default_value = "")]
        id_call_rote: String,
    },
    UpdateRosterEntry {
        collaborator_id: String,
        #[arg(long)]
        nome: Option<String>,
        #[arg(long)]
        cpf: Option<String>,
        #[arg(long)]
        id_call_rote: Option<String>,
        #[arg(long)]
        pontuacao: Option<i64>,
    },
    RemoveRosterEntry {
        collaborator_id: String,
    },
    Upload {
        project_id: String,
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let client = ProjectClient::connect(&cli.server_url)
        .with_context(|| format!("invalid server url '{}'", cli.server_url))?;

    match cli.command {
        Command::ListProjects => {
            for project in client.load_projects().await? {
                println!("{}\t{}\t{}", project.id, project.name, project.month);
            }
        }
        Command::CreateProject { name, month } => {
            client.load_projects().await?;
            let project = client
                .create_project(&name, &month, ParameterMap::new())
                .await?;
            println!("created project_id={}", project.id);
        }
        Command::RenameProject { project_id, name } => {
            client.load_projects().await?;
            let update = ProjectUpdate {
                name: Some(name),
                ..ProjectUpdate::default()
            };
            let project = client
                .update_project(&ProjectId(project_id), update)
                .await?;
            println!("renamed project_id={} to {}", project.id, project.name);
        }
        Command::DeleteProject { project_id } => {
            client.delete_project(&ProjectId(project_id)).await?;
            println!("deleted");
        }
        Command::ListRoles => {
            for role in configured_roles() {
                let keys: Vec<_> = parameter_fields(role).iter().map(|f| f.key).collect();
                println!("{role}\t{}", keys.join(", "));
            }
        }
        Command::ShowParameters { project_id, role } => {
            client.load_projects().await?;
            let snapshot = client.snapshot().await;
            let project_id = ProjectId(project_id);
            if snapshot.project(&project_id).is_none() {
                bail!("project {project_id} not found");
            }
            let labels: BTreeMap<_, _> = parameter_fields(&role)
                .iter()
                .map(|field| (field.key, field.label))
                .collect();
            for (key, value) in parameter_form(&snapshot, &project_id, &role) {
                let label = labels.get(key.as_str()).copied().unwrap_or_default();
                println!("{key}\t{value}\t{label}");
            }
        }
        Command::SetParameters {
            project_id,
            role,
            values,
        } => {
            let values = parse_values(&values)?;
            client.load_projects().await?;
            client
                .save_role_parameters(&ProjectId(project_id), &role, &values)
                .await?;
            println!("saved {} value(s) for {role}", values.len());
        }
        Command::ListMembers {
            project_id,
            search,
            role,
        } => {
            let snapshot = selected_snapshot(&client, ProjectId(project_id)).await?;
            let rows = filter_rows(&combined_rows(&snapshot), &search, &RoleFilter::parse(&role));
            for row in rows {
                let score = row.pontuacao.map(|p| p.to_string()).unwrap_or_default();
                println!("{}\t{}\t{}\t{}\t{score}", row.id, row.nome, row.cpf, row.role);
            }
            println!("roles: {}", role_facets(&snapshot).join(", "));
        }
        Command::ListAvailable { project_id } => {
            let snapshot = selected_snapshot(&client, ProjectId(project_id)).await?;
            for collaborator in available_collaborators(&snapshot) {
                println!("{}\t{}", collaborator.id, collaborator.nome);
            }
        }
        Command::AddMember {
            project_id,
            collaborator_id,
            role,
        } => {
            let members = client
                .add_collaborator_to_project(
                    &ProjectId(project_id),
                    &CollaboratorId(collaborator_id),
                    &role,
                )
                .await?;
            println!("project now has {} member(s)", members.len());
        }
        Command::SetMemberRole {
            project_id,
            collaborator_id,
            role,
        } => {
            client
                .update_project_collaborator(
                    &ProjectId(project_id),
                    &CollaboratorId(collaborator_id),
                    &role,
                )
                .await?;
            println!("role updated");
        }
        Command::RemoveMember {
            project_id,
            collaborator_id,
        } => {
            let members = client
                .delete_collaborator_from_project(
                    &ProjectId(project_id),
                    &CollaboratorId(collaborator_id),
                )
                .await?;
            println!("project now has {} member(s)", members.len());
        }
        Command::ListRoster => {
            for collaborator in client.load_global_collaborators().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    collaborator.id, collaborator.nome, collaborator.cpf, collaborator.id_call_rote
                );
            }
        }
        Command::AddRosterEntry {
            nome,
            cpf,
            id_call_rote,
        } => {
            let collaborator = client
                .create_global_collaborator(NewGlobalCollaborator {
                    nome,
                    cpf,
                    id_call_rote,
                    role: None,
                    pontuacao: None,
                    is_global: true,
                })
                .await?;
            println!("created collaborator_id={}", collaborator.id);
        }
        Command::UpdateRosterEntry {
            collaborator_id,
            nome,
            cpf,
            id_call_rote,
            pontuacao,
        } => {
            let update = CollaboratorUpdate {
                nome,
                cpf,
                id_call_rote,
                role: None,
                pontuacao,
            };
            let collaborator = client
                .update_global_collaborator(&CollaboratorId(collaborator_id), update)
                .await?;
            println!("updated collaborator_id={}", collaborator.id);
        }
        Command::RemoveRosterEntry { collaborator_id } => {
            client
                .delete_global_collaborator(&CollaboratorId(collaborator_id))
                .await?;
            println!("deleted");
        }
        Command::Upload { project_id, path } => {
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("'{}' has no usable file name", path.display()))?
                .to_string();
            let contents = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            client
                .upload_spreadsheet(&ProjectId(project_id), &filename, contents)
                .await?;
            println!("uploaded {filename}");
        }
    }

    Ok(())
}

/// Loads the roster and the project's membership with the project selected.
async fn selected_snapshot(
    client: &Arc<ProjectClient>,
    project_id: ProjectId,
) -> Result<client_core::StoreSnapshot> {
    client.load_global_collaborators().await?;
    client.set_selected_project(Some(project_id.clone())).await;
    client.fetch_project_collaborators(&project_id).await?;
    Ok(client.snapshot().await)
}

fn parse_values(raw: &[String]) -> Result<BTreeMap<String, f64>> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("expected key=value, got '{pair}'"))?;
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("'{value}' is not a number"))?;
            Ok((key.trim().to_string(), value))
        })
        .collect()
}
