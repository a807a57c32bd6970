use crate::app::AppState;
use crate::login::CurrentUser;
use crate::reminder;
use crate::store;
use crate::workspace;
use axum::{
    Extension, Json,
    extract::{Path as AxumPath, Query, State}, // Rename to avoid conflict
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Task urgency, as picked in the task form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Board column a task sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

/// A task in a user's workspace
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    /// Task id (UUID v4)
    pub id: String,

    /// Workspace this task belongs to
    pub workspace_id: String,

    /// Account that created the task
    pub creator_id: String,

    /// Short description shown everywhere
    pub title: String,

    /// Optional longer description
    #[serde(default)]
    pub description: Option<String>,

    /// Optional free-form category label
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: Status,

    /// List-view checkbox state; kept in lockstep with `status == done`
    #[serde(default)]
    pub is_completed: bool,

    /// When the task is due, if scheduled
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A checklist item under a task
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subtask {
    pub id: String,

    /// Parent task reference
    pub task_id: String,

    pub title: String,

    #[serde(default)]
    pub is_completed: bool,

    pub created_at: DateTime<Utc>,
}

/// Form data for task creation
#[derive(Debug, Deserialize)]
pub struct NewTaskRequest {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

/// Form data for the task edit dialog
///
/// A full replacement of the editable fields: omitted optional fields clear
/// the stored value.
#[derive(Debug, Deserialize)]
pub struct EditTaskRequest {
    pub title: String,

    pub priority: Priority,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

/// Form data for a board column move
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Status,
}

/// Form data for subtask creation
#[derive(Debug, Deserialize)]
pub struct NewSubtaskRequest {
    pub title: String,
}

/// One column of the board view
#[derive(Debug, Serialize)]
pub struct BoardColumn {
    pub status: Status,
    pub label: &'static str,
    pub count: usize,
    pub tasks: Vec<Task>,
}

/// The calendar view's data for one selected date
#[derive(Debug, Serialize)]
pub struct CalendarDay {
    /// Selected date (IST)
    pub date: NaiveDate,

    /// Tasks due on that date
    pub tasks: Vec<Task>,

    /// Every IST date that has at least one task due (the calendar markers)
    pub days_with_tasks: Vec<NaiveDate>,
}

fn tasks_file(root: &Path, user_id: &str) -> PathBuf {
    store::user_dir(root, user_id).join("tasks.json")
}

fn subtasks_file(root: &Path, user_id: &str) -> PathBuf {
    store::user_dir(root, user_id).join("subtasks.json")
}

/// Load a user's tasks
///
/// A missing file reads as an empty list; task files are created on first
/// write.
pub fn load_tasks(root: &Path, user_id: &str) -> Result<Vec<Task>, String> {
    store::read_json_or_default(&tasks_file(root, user_id))
}

/// Save a user's tasks
pub fn save_tasks(root: &Path, user_id: &str, tasks: &[Task]) -> Result<(), String> {
    store::write_json(&tasks_file(root, user_id), &tasks)
}

/// Load a user's subtasks
pub fn load_subtasks(root: &Path, user_id: &str) -> Result<Vec<Subtask>, String> {
    store::read_json_or_default(&subtasks_file(root, user_id))
}

/// Save a user's subtasks
pub fn save_subtasks(root: &Path, user_id: &str, subtasks: &[Subtask]) -> Result<(), String> {
    store::write_json(&subtasks_file(root, user_id), &subtasks)
}

/// Create a task in the given workspace
///
/// New tasks start in the `todo` column, not completed.
///
/// # Errors
/// * Returns an error when the title is empty or the store cannot be written
pub fn create_task(
    root: &Path,
    user_id: &str,
    workspace_id: &str,
    req: NewTaskRequest,
) -> Result<Task, String> {
    if req.title.trim().is_empty() {
        return Err("Title cannot be empty".to_string());
    }

    let now = Utc::now();
    let task = Task {
        id: Uuid::new_v4().to_string(),
        workspace_id: workspace_id.to_string(),
        creator_id: user_id.to_string(),
        title: req.title.trim().to_string(),
        description: req.description,
        category: req.category,
        priority: req.priority,
        status: Status::Todo,
        is_completed: false,
        due_date: req.due_date,
        created_at: now,
        updated_at: now,
    };

    let mut tasks = load_tasks(root, user_id)?;
    tasks.push(task.clone());
    save_tasks(root, user_id, &tasks)?;

    Ok(task)
}

/// List a user's tasks, newest first
pub fn list_tasks(root: &Path, user_id: &str) -> Result<Vec<Task>, String> {
    let mut tasks = load_tasks(root, user_id)?;
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(tasks)
}

/// Apply the edit dialog's fields to a task
///
/// # Returns
/// * `Ok(Some(task))` - the updated task
/// * `Ok(None)` - no task with that id
pub fn edit_task(
    root: &Path,
    user_id: &str,
    task_id: &str,
    req: EditTaskRequest,
) -> Result<Option<Task>, String> {
    if req.title.trim().is_empty() {
        return Err("Title cannot be empty".to_string());
    }

    let mut tasks = load_tasks(root, user_id)?;
    let task = match tasks.iter_mut().find(|t| t.id == task_id) {
        Some(task) => task,
        None => return Ok(None),
    };

    task.title = req.title.trim().to_string();
    task.priority = req.priority;
    task.description = req.description;
    task.category = req.category;
    task.due_date = req.due_date;
    task.updated_at = Utc::now();

    let updated = task.clone();
    save_tasks(root, user_id, &tasks)?;

    Ok(Some(updated))
}

/// Move a task to a board column
///
/// Moving into `done` marks the task completed; moving out clears the flag.
pub fn set_status(
    root: &Path,
    user_id: &str,
    task_id: &str,
    status: Status,
) -> Result<Option<Task>, String> {
    let mut tasks = load_tasks(root, user_id)?;
    let task = match tasks.iter_mut().find(|t| t.id == task_id) {
        Some(task) => task,
        None => return Ok(None),
    };

    task.status = status;
    task.is_completed = status == Status::Done;
    task.updated_at = Utc::now();

    let updated = task.clone();
    save_tasks(root, user_id, &tasks)?;

    Ok(Some(updated))
}

/// Flip the list-view checkbox
///
/// Completing sends the task to `done`; un-completing returns it to `todo`.
pub fn toggle_task(root: &Path, user_id: &str, task_id: &str) -> Result<Option<Task>, String> {
    let mut tasks = load_tasks(root, user_id)?;
    let task = match tasks.iter_mut().find(|t| t.id == task_id) {
        Some(task) => task,
        None => return Ok(None),
    };

    task.is_completed = !task.is_completed;
    task.status = if task.is_completed {
        Status::Done
    } else {
        Status::Todo
    };
    task.updated_at = Utc::now();

    let updated = task.clone();
    save_tasks(root, user_id, &tasks)?;

    Ok(Some(updated))
}

/// Delete a task and its subtasks
///
/// # Returns
/// * `Ok(true)` when a task was removed, `Ok(false)` when the id was unknown
pub fn delete_task(root: &Path, user_id: &str, task_id: &str) -> Result<bool, String> {
    let mut tasks = load_tasks(root, user_id)?;
    let before = tasks.len();
    tasks.retain(|t| t.id != task_id);

    if tasks.len() == before {
        return Ok(false);
    }

    save_tasks(root, user_id, &tasks)?;

    // Subtasks don't outlive their parent
    let mut subtasks = load_subtasks(root, user_id)?;
    let sub_before = subtasks.len();
    subtasks.retain(|s| s.task_id != task_id);
    if subtasks.len() != sub_before {
        save_subtasks(root, user_id, &subtasks)?;
    }

    Ok(true)
}

/// Group tasks into the three board columns
pub fn board_columns(tasks: &[Task]) -> Vec<BoardColumn> {
    [
        (Status::Todo, "To Do"),
        (Status::InProgress, "In Progress"),
        (Status::Done, "Done"),
    ]
    .iter()
    .map(|&(status, label)| {
        let column: Vec<Task> = tasks.iter().filter(|t| t.status == status).cloned().collect();
        BoardColumn {
            status,
            label,
            count: column.len(),
            tasks: column,
        }
    })
    .collect()
}

/// Tasks whose due date falls on the given IST date
pub fn tasks_on(tasks: &[Task], date: NaiveDate) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| {
            t.due_date
                .map(|d| d.with_timezone(&reminder::ist_offset()).date_naive() == date)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// The IST dates that have at least one task due, sorted
pub fn days_with_tasks(tasks: &[Task]) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = tasks
        .iter()
        .filter_map(|t| t.due_date)
        .map(|d| d.with_timezone(&reminder::ist_offset()).date_naive())
        .collect();
    days.sort();
    days.dedup();
    days
}

/// Add a subtask under a task
///
/// # Returns
/// * `Ok(None)` when the parent task doesn't exist
pub fn add_subtask(
    root: &Path,
    user_id: &str,
    task_id: &str,
    title: &str,
) -> Result<Option<Subtask>, String> {
    if title.trim().is_empty() {
        return Err("Title cannot be empty".to_string());
    }

    let tasks = load_tasks(root, user_id)?;
    if !tasks.iter().any(|t| t.id == task_id) {
        return Ok(None);
    }

    let subtask = Subtask {
        id: Uuid::new_v4().to_string(),
        task_id: task_id.to_string(),
        title: title.trim().to_string(),
        is_completed: false,
        created_at: Utc::now(),
    };

    let mut subtasks = load_subtasks(root, user_id)?;
    subtasks.push(subtask.clone());
    save_subtasks(root, user_id, &subtasks)?;

    Ok(Some(subtask))
}

/// List the subtasks of a task, oldest first
///
/// # Returns
/// * `Ok(None)` when the parent task doesn't exist
pub fn subtasks_for(
    root: &Path,
    user_id: &str,
    task_id: &str,
) -> Result<Option<Vec<Subtask>>, String> {
    let tasks = load_tasks(root, user_id)?;
    if !tasks.iter().any(|t| t.id == task_id) {
        return Ok(None);
    }

    let subtasks = load_subtasks(root, user_id)?;
    Ok(Some(
        subtasks.into_iter().filter(|s| s.task_id == task_id).collect(),
    ))
}

/// Flip a subtask's completion flag
pub fn toggle_subtask(
    root: &Path,
    user_id: &str,
    subtask_id: &str,
) -> Result<Option<Subtask>, String> {
    let mut subtasks = load_subtasks(root, user_id)?;
    let subtask = match subtasks.iter_mut().find(|s| s.id == subtask_id) {
        Some(subtask) => subtask,
        None => return Ok(None),
    };

    subtask.is_completed = !subtask.is_completed;

    let updated = subtask.clone();
    save_subtasks(root, user_id, &subtasks)?;

    Ok(Some(updated))
}

/// Delete a subtask
pub fn delete_subtask(root: &Path, user_id: &str, subtask_id: &str) -> Result<bool, String> {
    let mut subtasks = load_subtasks(root, user_id)?;
    let before = subtasks.len();
    subtasks.retain(|s| s.id != subtask_id);

    if subtasks.len() == before {
        return Ok(false);
    }

    save_subtasks(root, user_id, &subtasks)?;
    Ok(true)
}

// Web handler functions below

/// Query parameters for the calendar view
#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    /// Selected date (YYYY-MM-DD, IST); today when omitted
    pub date: Option<NaiveDate>,
}

/// List the caller's tasks, newest first
pub async fn handle_list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    match list_tasks(&state.data_dir, &current.id) {
        Ok(tasks) => Json(tasks).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Create a task in the caller's workspace
pub async fn handle_create_task(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<NewTaskRequest>,
) -> Response {
    let workspace = match workspace::get_or_create(&state.data_dir, &current.id) {
        Ok(workspace) => workspace,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    };

    match create_task(&state.data_dir, &current.id, &workspace.id, req) {
        Ok(task) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// Edit a task (the edit dialog's save)
pub async fn handle_edit_task(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    AxumPath(task_id): AxumPath<String>,
    Json(req): Json<EditTaskRequest>,
) -> Response {
    match edit_task(&state.data_dir, &current.id, &task_id, req) {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Task not found").into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// Move a task between board columns
pub async fn handle_set_status(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    AxumPath(task_id): AxumPath<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> Response {
    match set_status(&state.data_dir, &current.id, &task_id, req.status) {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Task not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Flip a task's completion checkbox
pub async fn handle_toggle_task(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    AxumPath(task_id): AxumPath<String>,
) -> Response {
    match toggle_task(&state.data_dir, &current.id, &task_id) {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Task not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Delete a task and its subtasks
pub async fn handle_delete_task(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    AxumPath(task_id): AxumPath<String>,
) -> Response {
    match delete_task(&state.data_dir, &current.id, &task_id) {
        Ok(true) => Json(serde_json::json!({ "success": true })).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Task not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// The board view's data: tasks grouped by status column
pub async fn handle_board(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    match list_tasks(&state.data_dir, &current.id) {
        Ok(tasks) => Json(board_columns(&tasks)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// The calendar view's data for one date
pub async fn handle_calendar(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<CalendarQuery>,
) -> Response {
    let date = query.date.unwrap_or_else(|| {
        Utc::now()
            .with_timezone(&reminder::ist_offset())
            .date_naive()
    });

    match load_tasks(&state.data_dir, &current.id) {
        Ok(tasks) => Json(CalendarDay {
            date,
            tasks: tasks_on(&tasks, date),
            days_with_tasks: days_with_tasks(&tasks),
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Add a subtask under a task
pub async fn handle_add_subtask(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    AxumPath(task_id): AxumPath<String>,
    Json(req): Json<NewSubtaskRequest>,
) -> Response {
    match add_subtask(&state.data_dir, &current.id, &task_id, &req.title) {
        Ok(Some(subtask)) => (StatusCode::CREATED, Json(subtask)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Task not found").into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// List a task's subtasks
pub async fn handle_list_subtasks(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    AxumPath(task_id): AxumPath<String>,
) -> Response {
    match subtasks_for(&state.data_dir, &current.id, &task_id) {
        Ok(Some(subtasks)) => Json(subtasks).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Task not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Flip a subtask's completion flag
pub async fn handle_toggle_subtask(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    AxumPath(subtask_id): AxumPath<String>,
) -> Response {
    match toggle_subtask(&state.data_dir, &current.id, &subtask_id) {
        Ok(Some(subtask)) => Json(subtask).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Subtask not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Delete a subtask
pub async fn handle_delete_subtask(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    AxumPath(subtask_id): AxumPath<String>,
) -> Response {
    match delete_subtask(&state.data_dir, &current.id, &subtask_id) {
        Ok(true) => Json(serde_json::json!({ "success": true })).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Subtask not found").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}
