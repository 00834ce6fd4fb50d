use shared::{
    domain::{CollaboratorId, GlobalCollaborator, Project, ProjectCollaborator, ProjectId},
    error::{ApiError, ErrorCode},
    protocol::{
        AddProjectCollaborator, CollaboratorUpdate, NewGlobalCollaborator, NewProject,
        ProjectUpdate, SpreadsheetReceipt, UpdateProjectCollaborator,
    },
};
use storage::{MembershipInsert, Storage};
use tracing::info;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const SPREADSHEET_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub max_upload_bytes: usize,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

pub async fn list_projects(ctx: &ApiContext) -> Result<Vec<Project>, ApiError> {
    ctx.storage.list_projects().await.map_err(internal)
}

pub async fn create_project(ctx: &ApiContext, request: NewProject) -> Result<Project, ApiError> {
    let name = required_text("name", &request.name)?;
    let month = required_text("month", &request.month)?;
    ensure_name_available(ctx, name, None).await?;

    let project = ctx
        .storage
        .create_project(name, month, &request.parameters)
        .await
        .map_err(internal)?;
    info!(project_id = %project.id, name = %project.name, "project created");
    Ok(project)
}

pub async fn update_project(
    ctx: &ApiContext,
    project_id: &ProjectId,
    update: ProjectUpdate,
) -> Result<Project, ApiError> {
    if update.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "update has no fields"));
    }
    let name = update
        .name
        .as_deref()
        .map(|name| required_text("name", name))
        .transpose()?;
    let month = update
        .month
        .as_deref()
        .map(|month| required_text("month", month))
        .transpose()?;
    if let Some(name) = name {
        ensure_name_available(ctx, name, Some(project_id)).await?;
    }

    ctx.storage
        .update_project(project_id, name, month, update.parameters.as_ref())
        .await
        .map_err(internal)?
        .ok_or_else(|| project_not_found(project_id))
}

pub async fn delete_project(ctx: &ApiContext, project_id: &ProjectId) -> Result<(), ApiError> {
    if !ctx
        .storage
        .delete_project(project_id)
        .await
        .map_err(internal)?
    {
        return Err(project_not_found(project_id));
    }
    info!(project_id = %project_id, "project deleted");
    Ok(())
}

pub async fn list_project_collaborators(
    ctx: &ApiContext,
    project_id: &ProjectId,
) -> Result<Vec<ProjectCollaborator>, ApiError> {
    ensure_project(ctx, project_id).await?;
    ctx.storage
        .list_members(project_id)
        .await
        .map_err(internal)
}

pub async fn add_project_collaborator(
    ctx: &ApiContext,
    project_id: &ProjectId,
    request: AddProjectCollaborator,
) -> Result<(), ApiError> {
    let role = required_text("role", &request.role)?;
    ensure_project(ctx, project_id).await?;
    if ctx
        .storage
        .collaborator(&request.id)
        .await
        .map_err(internal)?
        .is_none()
    {
        return Err(collaborator_not_found(&request.id));
    }

    match ctx
        .storage
        .add_member(project_id, &request.id, role)
        .await
        .map_err(internal)?
    {
        MembershipInsert::Added => Ok(()),
        MembershipInsert::AlreadyMember => Err(ApiError::new(
            ErrorCode::Conflict,
            format!("collaborator {} already in project {project_id}", request.id),
        )),
    }
}

pub async fn update_project_collaborator(
    ctx: &ApiContext,
    project_id: &ProjectId,
    collaborator_id: &CollaboratorId,
    request: UpdateProjectCollaborator,
) -> Result<(), ApiError> {
    let role = required_text("role", &request.role)?;
    if !ctx
        .storage
        .update_member_role(project_id, collaborator_id, role)
        .await
        .map_err(internal)?
    {
        return Err(membership_not_found(project_id, collaborator_id));
    }
    Ok(())
}

pub async fn delete_project_collaborator(
    ctx: &ApiContext,
    project_id: &ProjectId,
    collaborator_id: &CollaboratorId,
) -> Result<(), ApiError> {
    if !ctx
        .storage
        .remove_member(project_id, collaborator_id)
        .await
        .map_err(internal)?
    {
        return Err(membership_not_found(project_id, collaborator_id));
    }
    Ok(())
}

pub async fn list_global_collaborators(
    ctx: &ApiContext,
) -> Result<Vec<GlobalCollaborator>, ApiError> {
    ctx.storage.list_collaborators().await.map_err(internal)
}

pub async fn create_global_collaborator(
    ctx: &ApiContext,
    request: NewGlobalCollaborator,
) -> Result<GlobalCollaborator, ApiError> {
    required_text("nome", &request.nome)?;
    ctx.storage
        .create_collaborator(&request)
        .await
        .map_err(internal)
}

pub async fn update_global_collaborator(
    ctx: &ApiContext,
    collaborator_id: &CollaboratorId,
    update: CollaboratorUpdate,
) -> Result<GlobalCollaborator, ApiError> {
    if let Some(nome) = update.nome.as_deref() {
        required_text("nome", nome)?;
    }
    ctx.storage
        .update_collaborator(collaborator_id, &update)
        .await
        .map_err(internal)?
        .ok_or_else(|| collaborator_not_found(collaborator_id))
}

/// Removes the roster entry only; memberships referencing it stay.
pub async fn delete_global_collaborator(
    ctx: &ApiContext,
    collaborator_id: &CollaboratorId,
) -> Result<(), ApiError> {
    if !ctx
        .storage
        .delete_collaborator(collaborator_id)
        .await
        .map_err(internal)?
    {
        return Err(collaborator_not_found(collaborator_id));
    }
    Ok(())
}

pub async fn receive_spreadsheet(
    ctx: &ApiContext,
    project_id: &ProjectId,
    filename: &str,
    contents: &[u8],
) -> Result<SpreadsheetReceipt, ApiError> {
    if !is_spreadsheet_filename(filename) {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("'{filename}' is not an .xlsx or .xls file"),
        ));
    }
    if contents.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "spreadsheet is empty"));
    }
    if contents.len() > ctx.max_upload_bytes {
        return Err(ApiError::new(
            ErrorCode::PayloadTooLarge,
            format!(
                "spreadsheet is {} bytes, limit is {}",
                contents.len(),
                ctx.max_upload_bytes
            ),
        ));
    }
    ensure_project(ctx, project_id).await?;

    let stored = ctx
        .storage
        .store_spreadsheet(project_id, filename, contents)
        .await
        .map_err(internal)?;
    info!(
        project_id = %project_id,
        upload_id = stored.upload_id,
        size_bytes = stored.size_bytes,
        "spreadsheet received"
    );
    Ok(SpreadsheetReceipt {
        upload_id: stored.upload_id,
        project_id: stored.project_id,
        filename: stored.filename,
        size_bytes: stored.size_bytes,
    })
}

pub fn is_spreadsheet_filename(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

fn required_text<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{field} must not be empty"),
        ));
    }
    Ok(trimmed)
}

async fn ensure_name_available(
    ctx: &ApiContext,
    name: &str,
    except: Option<&ProjectId>,
) -> Result<(), ApiError> {
    if ctx
        .storage
        .project_name_taken(name, except)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::new(
            ErrorCode::Conflict,
            format!("a project named '{name}' already exists"),
        ));
    }
    Ok(())
}

async fn ensure_project(ctx: &ApiContext, project_id: &ProjectId) -> Result<(), ApiError> {
    match ctx.storage.project(project_id).await.map_err(internal)? {
        Some(_) => Ok(()),
        None => Err(project_not_found(project_id)),
    }
}

fn project_not_found(project_id: &ProjectId) -> ApiError {
    ApiError::new(
        ErrorCode::NotFound,
        format!("project {project_id} not found"),
    )
}

fn collaborator_not_found(collaborator_id: &CollaboratorId) -> ApiError {
    ApiError::new(
        ErrorCode::NotFound,
        format!("collaborator {collaborator_id} not found"),
    )
}

fn membership_not_found(project_id: &ProjectId, collaborator_id: &CollaboratorId) -> ApiError {
    ApiError::new(
        ErrorCode::NotFound,
        format!("collaborator {collaborator_id} is not in project {project_id}"),
    )
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}
