use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use uuid::Uuid;

use shared::{
    domain::{
        CollaboratorId, GlobalCollaborator, ParameterMap, Project, ProjectCollaborator, ProjectId,
    },
    protocol::{CollaboratorUpdate, NewGlobalCollaborator},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub upload_id: i64,
    pub project_id: ProjectId,
    pub filename: String,
    pub size_bytes: u64,
    pub received_at: DateTime<Utc>,
}

/// Outcome of inserting a membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipInsert {
    Added,
    AlreadyMember,
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    let raw_parameters: String = row.try_get("parameters")?;
    let parameters: ParameterMap = serde_json::from_str(&raw_parameters)
        .with_context(|| format!("corrupt parameters column: {raw_parameters}"))?;
    Ok(Project {
        id: ProjectId(row.try_get("id")?),
        name: row.try_get("name")?,
        month: row.try_get("month")?,
        parameters,
    })
}

fn collaborator_from_row(row: &SqliteRow) -> Result<GlobalCollaborator> {
    Ok(GlobalCollaborator {
        id: CollaboratorId(row.try_get("id")?),
        nome: row.try_get("nome")?,
        cpf: row.try_get("cpf")?,
        id_call_rote: row.try_get("id_call_rote")?,
        role: row.try_get("role")?,
        pontuacao: row.try_get("pontuacao")?,
        is_global: row.try_get("is_global")?,
    })
}

fn member_from_row(row: &SqliteRow) -> Result<ProjectCollaborator> {
    Ok(ProjectCollaborator {
        id: CollaboratorId(row.try_get("collaborator_id")?),
        role: row.try_get("role")?,
        pontuacao: row.try_get("pontuacao")?,
    })
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT id, name, month, parameters FROM projects ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(project_from_row).collect()
    }

    pub async fn project(&self, id: &ProjectId) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT id, name, month, parameters FROM projects WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    /// Case-insensitive lookup, ignoring `except`.
    pub async fn project_name_taken(&self, name: &str, except: Option<&ProjectId>) -> Result<bool> {
        let taken: Option<String> =
            sqlx::query_scalar("SELECT id FROM projects WHERE name_key = ? AND id != ?")
                .bind(name_key(name))
                .bind(except.map(ProjectId::as_str).unwrap_or_default())
                .fetch_optional(&self.pool)
                .await?;
        Ok(taken.is_some())
    }

    pub async fn create_project(
        &self,
        name: &str,
        month: &str,
        parameters: &ParameterMap,
    ) -> Result<Project> {
        let id = ProjectId(Uuid::new_v4().to_string());
        sqlx::query(
            "INSERT INTO projects (id, name, name_key, month, parameters) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(name)
        .bind(name_key(name))
        .bind(month)
        .bind(serde_json::to_string(parameters)?)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert project '{name}'"))?;

        Ok(Project {
            id,
            name: name.to_string(),
            month: month.to_string(),
            parameters: parameters.clone(),
        })
    }

    /// Applies the given fields; `None` leaves a column unchanged. Parameters
    /// replace the stored map wholesale.
    pub async fn update_project(
        &self,
        id: &ProjectId,
        name: Option<&str>,
        month: Option<&str>,
        parameters: Option<&ParameterMap>,
    ) -> Result<Option<Project>> {
        let parameters = parameters.map(serde_json::to_string).transpose()?;
        let result = sqlx::query(
            "UPDATE projects SET
                name = COALESCE(?, name),
                name_key = COALESCE(?, name_key),
                month = COALESCE(?, month),
                parameters = COALESCE(?, parameters)
             WHERE id = ?",
        )
        .bind(name)
        .bind(name.map(name_key))
        .bind(month)
        .bind(parameters)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update project {id}"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.project(id).await
    }

    pub async fn delete_project(&self, id: &ProjectId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_collaborators(&self) -> Result<Vec<GlobalCollaborator>> {
        let rows = sqlx::query(
            "SELECT id, nome, cpf, id_call_rote, role, pontuacao, is_global
             FROM collaborators ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(collaborator_from_row).collect()
    }

    pub async fn collaborator(&self, id: &CollaboratorId) -> Result<Option<GlobalCollaborator>> {
        let row = sqlx::query(
            "SELECT id, nome, cpf, id_call_rote, role, pontuacao, is_global
             FROM collaborators WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(collaborator_from_row).transpose()
    }

    pub async fn create_collaborator(
        &self,
        collaborator: &NewGlobalCollaborator,
    ) -> Result<GlobalCollaborator> {
        let id = CollaboratorId(Uuid::new_v4().to_string());
        sqlx::query(
            "INSERT INTO collaborators (id, nome, cpf, id_call_rote, role, pontuacao, is_global)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(&collaborator.nome)
        .bind(&collaborator.cpf)
        .bind(&collaborator.id_call_rote)
        .bind(&collaborator.role)
        .bind(collaborator.pontuacao)
        .bind(collaborator.is_global)
        .execute(&self.pool)
        .await
        .context("failed to insert collaborator")?;

        Ok(GlobalCollaborator {
            id,
            nome: collaborator.nome.clone(),
            cpf: collaborator.cpf.clone(),
            id_call_rote: collaborator.id_call_rote.clone(),
            role: collaborator.role.clone(),
            pontuacao: collaborator.pontuacao,
            is_global: collaborator.is_global,
        })
    }

    pub async fn update_collaborator(
        &self,
        id: &CollaboratorId,
        update: &CollaboratorUpdate,
    ) -> Result<Option<GlobalCollaborator>> {
        let result = sqlx::query(
            "UPDATE collaborators SET
                nome = COALESCE(?, nome),
                cpf = COALESCE(?, cpf),
                id_call_rote = COALESCE(?, id_call_rote),
                role = COALESCE(?, role),
                pontuacao = COALESCE(?, pontuacao)
             WHERE id = ?",
        )
        .bind(&update.nome)
        .bind(&update.cpf)
        .bind(&update.id_call_rote)
        .bind(&update.role)
        .bind(update.pontuacao)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update collaborator {id}"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.collaborator(id).await
    }

    pub async fn delete_collaborator(&self, id: &CollaboratorId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM collaborators WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_members(&self, project_id: &ProjectId) -> Result<Vec<ProjectCollaborator>> {
        let rows = sqlx::query(
            "SELECT collaborator_id, role, pontuacao
             FROM project_collaborators WHERE project_id = ? ORDER BY rowid",
        )
        .bind(project_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(member_from_row).collect()
    }

    pub async fn add_member(
        &self,
        project_id: &ProjectId,
        collaborator_id: &CollaboratorId,
        role: &str,
    ) -> Result<MembershipInsert> {
        let result = sqlx::query(
            "INSERT INTO project_collaborators (project_id, collaborator_id, role)
             VALUES (?, ?, ?)
             ON CONFLICT(project_id, collaborator_id) DO NOTHING",
        )
        .bind(project_id.as_str())
        .bind(collaborator_id.as_str())
        .bind(role)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to add {collaborator_id} to project {project_id}"))?;

        Ok(if result.rows_affected() == 0 {
            MembershipInsert::AlreadyMember
        } else {
            MembershipInsert::Added
        })
    }

    pub async fn update_member_role(
        &self,
        project_id: &ProjectId,
        collaborator_id: &CollaboratorId,
        role: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE project_collaborators SET role = ? WHERE project_id = ? AND collaborator_id = ?",
        )
        .bind(role)
        .bind(project_id.as_str())
        .bind(collaborator_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_member(
        &self,
        project_id: &ProjectId,
        collaborator_id: &CollaboratorId,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM project_collaborators WHERE project_id = ? AND collaborator_id = ?",
        )
        .bind(project_id.as_str())
        .bind(collaborator_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn store_spreadsheet(
        &self,
        project_id: &ProjectId,
        filename: &str,
        contents: &[u8],
    ) -> Result<StoredUpload> {
        let received_at = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO spreadsheet_uploads (project_id, filename, size_bytes, contents, received_at)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(project_id.as_str())
        .bind(filename)
        .bind(contents.len() as i64)
        .bind(contents)
        .bind(received_at)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to store spreadsheet for project {project_id}"))?;

        Ok(StoredUpload {
            upload_id: rec.try_get("id")?,
            project_id: project_id.clone(),
            filename: filename.to_string(),
            size_bytes: contents.len() as u64,
            received_at,
        })
    }

    pub async fn list_uploads(&self, project_id: &ProjectId) -> Result<Vec<StoredUpload>> {
        let rows = sqlx::query(
            "SELECT id, filename, size_bytes, received_at
             FROM spreadsheet_uploads WHERE project_id = ? ORDER BY id",
        )
        .bind(project_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(StoredUpload {
                    upload_id: r.try_get("id")?,
                    project_id: project_id.clone(),
                    filename: r.try_get("filename")?,
                    size_bytes: r.try_get::<i64, _>("size_bytes")? as u64,
                    received_at: r.try_get("received_at")?,
                })
            })
            .collect()
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
