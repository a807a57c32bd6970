use crate::app::AppState;
use crate::login::CurrentUser;
use crate::store;
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// A per-user container scoping tasks
///
/// Every account owns exactly one workspace, created at signup; every task
/// references the workspace it belongs to.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Workspace {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

const WORKSPACES_FILE: &str = "workspaces.json";
const DEFAULT_WORKSPACE_NAME: &str = "My Tasks";

/// Load the workspace map (workspace id -> workspace)
pub fn load_workspaces(root: &Path) -> Result<HashMap<String, Workspace>, String> {
    store::read_json(&root.join(WORKSPACES_FILE))
}

/// Save the workspace map to disk
pub fn save_workspaces(root: &Path, workspaces: &HashMap<String, Workspace>) -> Result<(), String> {
    store::write_json(&root.join(WORKSPACES_FILE), workspaces)
}

/// Find a user's workspace
pub fn find_by_owner(root: &Path, owner_id: &str) -> Result<Option<Workspace>, String> {
    let workspaces = load_workspaces(root)?;
    Ok(workspaces
        .values()
        .find(|ws| ws.owner_id == owner_id)
        .cloned())
}

/// Get a user's workspace, creating it if missing
///
/// Signup calls this, and task creation falls back to it for accounts whose
/// workspace record is absent from the store.
pub fn get_or_create(root: &Path, owner_id: &str) -> Result<Workspace, String> {
    if let Some(existing) = find_by_owner(root, owner_id)? {
        return Ok(existing);
    }

    let workspace = Workspace {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        name: DEFAULT_WORKSPACE_NAME.to_string(),
        created_at: Utc::now(),
    };

    let mut workspaces = load_workspaces(root)?;
    workspaces.insert(workspace.id.clone(), workspace.clone());
    save_workspaces(root, &workspaces)?;

    Ok(workspace)
}

/// Return the caller's workspace
pub async fn get_workspace(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    match get_or_create(&state.data_dir, &current.id) {
        Ok(workspace) => Json(workspace).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_workspace_per_owner() {
        let dir = tempfile::tempdir().unwrap();
        store::init_store(dir.path()).unwrap();

        let first = get_or_create(dir.path(), "owner-1").unwrap();
        assert_eq!(first.name, DEFAULT_WORKSPACE_NAME);

        let again = get_or_create(dir.path(), "owner-1").unwrap();
        assert_eq!(again.id, first.id);

        let other = get_or_create(dir.path(), "owner-2").unwrap();
        assert_ne!(other.id, first.id);

        assert_eq!(load_workspaces(dir.path()).unwrap().len(), 2);
    }
}
