use axum::{
    Json, Router,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::login;
use crate::reminder;
use crate::store;
use crate::task;
use crate::workspace;

/// Shared state handed to every handler
pub struct AppState {
    /// Root directory of the JSON file store
    pub data_dir: PathBuf,
}

/// Start the web service
///
/// Initializes the file store, builds the router, and serves until the
/// process is stopped. The listen address comes from `GOALGRID_ADDR` and the
/// data directory from `GOALGRID_DATA_DIR`.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = store::data_dir();
    store::init_store(&data_dir)?;

    let state = Arc::new(AppState { data_dir });
    let app = router(state);

    let addr =
        std::env::var("GOALGRID_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

    // Start server
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router
///
/// The `/api` surface (except reminder dispatch) sits behind the session
/// middleware; auth routes and the scheduled endpoint stay open.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/me", get(login::get_profile))
        .route("/api/me/profile", put(login::update_profile))
        .route("/api/me/password", put(login::change_password))
        .route("/api/workspace", get(workspace::get_workspace))
        .route(
            "/api/tasks",
            get(task::handle_list_tasks).post(task::handle_create_task),
        )
        .route("/api/tasks/board", get(task::handle_board))
        .route("/api/tasks/calendar", get(task::handle_calendar))
        .route(
            "/api/tasks/:task_id",
            put(task::handle_edit_task).delete(task::handle_delete_task),
        )
        .route("/api/tasks/:task_id/status", put(task::handle_set_status))
        .route("/api/tasks/:task_id/toggle", post(task::handle_toggle_task))
        .route(
            "/api/tasks/:task_id/subtasks",
            get(task::handle_list_subtasks).post(task::handle_add_subtask),
        )
        .route(
            "/api/subtasks/:subtask_id/toggle",
            post(task::handle_toggle_subtask),
        )
        .route(
            "/api/subtasks/:subtask_id",
            delete(task::handle_delete_subtask),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    Router::new()
        .route("/", get(serve_landing))
        .route("/auth/signup", post(login::handle_signup))
        .route("/auth/login", post(login::handle_login))
        .route("/auth/logout", post(login::handle_logout))
        .route("/auth/forgot-password", post(login::handle_forgot_password))
        .route("/auth/reset-password", post(login::handle_reset_password))
        .route("/api/send-reminders", get(reminder::handle_send_reminders))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Service banner
async fn serve_landing() -> impl IntoResponse {
    Json(json!({
        "name": "GoalGrid",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    fn test_app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        store::init_store(dir.path()).unwrap();
        let state = Arc::new(AppState {
            data_dir: dir.path().to_path_buf(),
        });
        let app = router(state);
        (dir, app)
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn landing_is_public() {
        let (_dir, app) = test_app();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_requires_a_session() {
        let (_dir, app) = test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/tasks")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signup_login_and_create_task() {
        let (_dir, app) = test_app();

        let response = app
            .clone()
            .oneshot(json_post(
                "/auth/signup",
                serde_json::json!({
                    "email": "flow@example.com",
                    "password": "longenough",
                    "display_name": "Flow",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(json_post(
                "/auth/login",
                serde_json::json!({
                    "email": "flow@example.com",
                    "password": "longenough",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let mut request = json_post(
            "/api/tasks",
            serde_json::json!({ "title": "first task", "priority": "high" }),
        );
        request
            .headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let request = Request::builder()
            .uri("/api/tasks")
            .header(header::COOKIE, cookie.clone())
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let tasks: Vec<task::Task> = serde_json::from_slice(&body).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "first task");
        assert_eq!(tasks[0].priority, task::Priority::High);
    }

    #[tokio::test]
    async fn bad_login_is_rejected() {
        let (_dir, app) = test_app();

        let response = app
            .clone()
            .oneshot(json_post(
                "/auth/signup",
                serde_json::json!({
                    "email": "locked@example.com",
                    "password": "longenough",
                    "display_name": "Locked",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(json_post(
                "/auth/login",
                serde_json::json!({
                    "email": "locked@example.com",
                    "password": "wrongpass",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
