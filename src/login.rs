use crate::app::AppState;
use crate::store;
use crate::workspace;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use rand_core::OsRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// User data structure representing a registered application user
///
/// Contains authentication details plus the account preferences that the
/// settings page edits and the reminder dispatcher reads.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Stable account id (UUID v4)
    pub id: String,

    /// Email address (unique login identifier, reminder destination)
    pub email: String,

    /// Name shown in the UI and in reminder greetings
    pub display_name: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    /// Preferred daily reminder hour in IST (0-23); `None` means the default
    #[serde(default)]
    pub reminder_hour: Option<u32>,

    /// Password reset code (if a reset has been requested)
    #[serde(default)]
    pub reset_code: Option<String>,

    /// Expiration time for the reset code
    #[serde(default)]
    pub reset_code_expires: Option<SystemTime>,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

/// The shape of a user returned over the API
///
/// Everything except the password hash and reset state, with the reminder
/// hour already resolved to its effective value.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub reminder_hour: u32,
}

impl PublicProfile {
    pub fn from_user(user: &User) -> Self {
        PublicProfile {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            reminder_hour: effective_reminder_hour(user),
        }
    }
}

/// Signup form data
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
}

/// Login form data
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Settings update for display name and reminder hour
///
/// Omitted fields are left unchanged.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub reminder_hour: Option<u32>,
}

/// Password reset request data
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    /// Email address to send the reset code to
    pub email: String,
}

/// Password reset confirmation data
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetConfirm {
    pub email: String,
    pub reset_code: String,
    pub new_password: String,
}

/// Password change request from an authenticated user
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordChangeRequest {
    /// Current password for verification
    pub old_password: String,

    /// New password to set
    pub new_password: String,

    /// Confirmation of the new password (must match new_password)
    pub confirm_password: String,
}

/// The authenticated caller, inserted into request extensions by
/// [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    /// Email of the authenticated user
    pub email: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Global sessions storage
///
/// Stores all active user sessions in a thread-safe map.
lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

// Constants
const USERS_FILE: &str = "users.json";
const SESSION_COOKIE: &str = "session";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds
const RESET_CODE_DURATION: u64 = 60 * 60; // 1 hour in seconds
const MIN_PASSWORD_LEN: usize = 6;

/// Reminder hour assumed when a user never picked one.
pub const DEFAULT_REMINDER_HOUR: u32 = 9;

/// The hour (IST) at which a user wants their daily reminder
pub fn effective_reminder_hour(user: &User) -> u32 {
    user.reminder_hour.unwrap_or(DEFAULT_REMINDER_HOUR)
}

/// Get all registered users
///
/// Reads the users file and returns a map of email address to user.
///
/// # Arguments
/// * `root` - Root directory of the file store
///
/// # Errors
/// * Returns an error if the users file cannot be opened, read, or parsed
pub fn load_users(root: &Path) -> Result<HashMap<String, User>, String> {
    store::read_json(&root.join(USERS_FILE))
}

/// Save the users map to disk
///
/// # Arguments
/// * `root` - Root directory of the file store
/// * `users` - The users map to save
pub fn save_users(root: &Path, users: &HashMap<String, User>) -> Result<(), String> {
    store::write_json(&root.join(USERS_FILE), users)
}

/// Register a new user
///
/// Creates a new user account with the provided email, display name, and
/// password. The password is hashed before storage and a directory for the
/// user's task files is created.
///
/// # Arguments
/// * `root` - Root directory of the file store
/// * `email` - Email address (unique login identifier)
/// * `display_name` - Name shown in the UI and reminder emails
/// * `password` - Plain text password (will be hashed)
///
/// # Errors
/// * Returns an error if the email is malformed or already registered
/// * Returns an error if any required fields are empty or the password is
///   shorter than six characters
pub fn register_user(
    root: &Path,
    email: &str,
    display_name: &str,
    password: &str,
) -> Result<User, String> {
    if email.is_empty() || password.is_empty() || display_name.is_empty() {
        return Err("Email, display name and password cannot be empty".to_string());
    }

    if !EMAIL_RE.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    if password.len() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 6 characters".to_string());
    }

    // Check if email is already in use
    let mut users = load_users(root)?;
    if users.contains_key(email) {
        return Err("Email address is already registered".to_string());
    }

    // Hash the password
    let password_hash = hash_password(password)?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        display_name: display_name.to_string(),
        password_hash,
        reminder_hour: None,
        reset_code: None,
        reset_code_expires: None,
        created_at: Utc::now(),
    };

    // Create the user's data directory
    let user_dir = store::user_dir(root, &user.id);
    if std::fs::create_dir_all(&user_dir).is_err() {
        return Err("Failed to create user directory".to_string());
    }

    users.insert(email.to_string(), user.clone());
    save_users(root, &users)?;

    Ok(user)
}

/// Verify user credentials
///
/// Checks whether the provided email and password match a registered user.
///
/// # Returns
/// * `Result<Option<User>, String>` - The user when the credentials are
///   valid, `None` when they are not, or an error
pub fn verify_user(root: &Path, email: &str, password: &str) -> Result<Option<User>, String> {
    let users = load_users(root)?;

    if let Some(user) = users.get(email) {
        if verify_password(password, &user.password_hash)? {
            return Ok(Some(user.clone()));
        }
    }

    Ok(None)
}

/// Hash a password using Argon2
///
/// Creates a cryptographically secure hash of a password using Argon2id.
///
/// # Errors
/// * Returns an error if the password hashing fails
fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

/// Verify a password against a stored hash
///
/// # Errors
/// * Returns an error if the hash is in an invalid format
fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Create a new user session
///
/// # Arguments
/// * `email` - The email of the authenticated user
///
/// # Returns
/// * `String` - A unique session ID
pub fn create_session(email: &str) -> String {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

    let session = Session {
        email: email.to_string(),
        expires_at,
    };

    let mut sessions = SESSIONS.write().unwrap();
    sessions.insert(session_id.clone(), session);

    session_id
}

/// Validate a session
///
/// Checks if a session is valid and not expired.
///
/// # Returns
/// * `Option<String>` - The email for the session if valid, None otherwise
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap();

    if let Some(session) = sessions.get(session_id) {
        if session.expires_at > SystemTime::now() {
            return Some(session.email.clone());
        }
    }

    None
}

/// Drop a session (logout)
pub fn remove_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap();
    sessions.remove(session_id);
}

/// Check a pending reset code against a user record
///
/// Verifies that a code was issued, has not expired at `now`, and matches
/// the submitted code.
pub fn verify_reset_code(user: &User, code: &str, now: SystemTime) -> Result<(), String> {
    let stored = match &user.reset_code {
        Some(stored) => stored,
        None => return Err("No reset code found".to_string()),
    };

    match user.reset_code_expires {
        Some(expires) if now <= expires => {}
        _ => return Err("Reset code expired".to_string()),
    }

    if stored != code {
        return Err("Invalid reset code".to_string());
    }

    Ok(())
}

// Web handler functions below

/// Authentication middleware
///
/// Resolves the session cookie to a user and stores it in the request
/// extensions, or rejects the request with 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        if let Some(email) = validate_session(session_cookie.value()) {
            match load_users(&state.data_dir) {
                Ok(users) => {
                    if let Some(user) = users.get(&email) {
                        request.extensions_mut().insert(CurrentUser {
                            id: user.id.clone(),
                            email: user.email.clone(),
                        });
                        return next.run(request).await;
                    }
                }
                Err(_) => {
                    return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response();
                }
            }
        }
    }

    (StatusCode::UNAUTHORIZED, "Authentication required").into_response()
}

/// Handle user registration
///
/// Creates the account and the user's workspace, then returns the public
/// profile.
pub async fn handle_signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Response {
    match register_user(&state.data_dir, &req.email, &req.display_name, &req.password) {
        Ok(user) => match workspace::get_or_create(&state.data_dir, &user.id) {
            Ok(_) => (StatusCode::CREATED, Json(PublicProfile::from_user(&user))).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
        },
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// Handle user login requests
///
/// Validates credentials and creates a session if valid.
#[axum::debug_handler(state = Arc<AppState>)]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Response {
    match verify_user(&state.data_dir, &req.email, &req.password) {
        Ok(Some(user)) => {
            let session_id = create_session(&user.email);
            let cookie = Cookie::new(SESSION_COOKIE, session_id);
            (jar.add(cookie), Json(PublicProfile::from_user(&user))).into_response()
        }
        Ok(None) => (StatusCode::UNAUTHORIZED, "Invalid email or password").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error").into_response(),
    }
}

/// Handle user logout
///
/// Drops the server-side session and clears the session cookie.
pub async fn handle_logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    if let Some(session_id) = session_id {
        remove_session(&session_id);
    }

    let cookie = Cookie::new(SESSION_COOKIE, "");
    (jar.add(cookie), Json(json!({ "success": true })))
}

/// Return the caller's profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    match load_users(&state.data_dir) {
        Ok(users) => match users.get(&current.email) {
            Some(user) => Json(PublicProfile::from_user(user)).into_response(),
            None => (StatusCode::NOT_FOUND, "User not found").into_response(),
        },
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Update display name and reminder hour
///
/// Omitted fields keep their stored value; the reminder hour must be a valid
/// hour of day.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ProfileUpdate>,
) -> Response {
    if let Some(hour) = req.reminder_hour {
        if hour > 23 {
            return (StatusCode::BAD_REQUEST, "Reminder hour must be 0-23").into_response();
        }
    }

    if let Some(name) = &req.display_name {
        if name.trim().is_empty() {
            return (StatusCode::BAD_REQUEST, "Display name cannot be empty").into_response();
        }
    }

    let mut users = match load_users(&state.data_dir) {
        Ok(users) => users,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    };

    let user = match users.get_mut(&current.email) {
        Some(user) => user,
        None => return (StatusCode::NOT_FOUND, "User not found").into_response(),
    };

    if let Some(name) = req.display_name {
        user.display_name = name;
    }
    if let Some(hour) = req.reminder_hour {
        user.reminder_hour = Some(hour);
    }

    let profile = PublicProfile::from_user(user);
    match save_users(&state.data_dir, &users) {
        Ok(_) => Json(profile).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}

/// Handle password change for authenticated users
///
/// Verifies the current password before re-hashing the new one.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<PasswordChangeRequest>,
) -> Response {
    if req.new_password != req.confirm_password {
        return (StatusCode::BAD_REQUEST, "New passwords don't match").into_response();
    }

    if req.new_password.len() < MIN_PASSWORD_LEN {
        return (StatusCode::BAD_REQUEST, "Password must be at least 6 characters").into_response();
    }

    let mut users = match load_users(&state.data_dir) {
        Ok(users) => users,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    };

    let user = match users.get_mut(&current.email) {
        Some(user) => user,
        None => return (StatusCode::NOT_FOUND, "User not found").into_response(),
    };

    match verify_password(&req.old_password, &user.password_hash) {
        Ok(true) => match hash_password(&req.new_password) {
            Ok(hash) => {
                user.password_hash = hash;
                if save_users(&state.data_dir, &users).is_err() {
                    return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save new password")
                        .into_response();
                }
                Json(json!({ "success": true })).into_response()
            }
            Err(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password").into_response()
            }
        },
        Ok(false) => (StatusCode::BAD_REQUEST, "Invalid old password").into_response(),
        Err(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Password verification failed").into_response()
        }
    }
}

/// Handle password reset requests
///
/// Stores a short-lived reset code on the account and emails it.
pub async fn handle_forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetRequest>,
) -> Response {
    let mut users = match load_users(&state.data_dir) {
        Ok(users) => users,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    };

    let user = match users.get_mut(&req.email) {
        Some(user) => user,
        None => return (StatusCode::NOT_FOUND, "Email not found").into_response(),
    };

    let reset_code = crate::mailer::generate_reset_code();
    let expires = SystemTime::now() + Duration::from_secs(RESET_CODE_DURATION);

    user.reset_code = Some(reset_code.clone());
    user.reset_code_expires = Some(expires);

    if save_users(&state.data_dir, &users).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate reset code")
            .into_response();
    }

    match crate::mailer::Mailer::from_env() {
        Ok(mailer) => {
            if mailer.send_password_reset(&req.email, &reset_code).is_err() {
                return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to send email").into_response();
            }
        }
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to initialize mailer")
                .into_response();
        }
    }

    Json(json!({ "success": true })).into_response()
}

/// Handle password reset confirmation
///
/// Checks the submitted reset code and updates the password if valid.
pub async fn handle_reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetConfirm>,
) -> Response {
    if req.new_password.len() < MIN_PASSWORD_LEN {
        return (StatusCode::BAD_REQUEST, "Password must be at least 6 characters").into_response();
    }

    let mut users = match load_users(&state.data_dir) {
        Ok(users) => users,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    };

    let user = match users.get_mut(&req.email) {
        Some(user) => user,
        None => return (StatusCode::NOT_FOUND, "Email not found").into_response(),
    };

    if let Err(e) = verify_reset_code(user, &req.reset_code, SystemTime::now()) {
        return (StatusCode::BAD_REQUEST, e).into_response();
    }

    match hash_password(&req.new_password) {
        Ok(hash) => {
            user.password_hash = hash;
            user.reset_code = None;
            user.reset_code_expires = None;

            if save_users(&state.data_dir, &users).is_err() {
                return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save new password")
                    .into_response();
            }

            Json(json!({ "success": true })).into_response()
        }
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        store::init_store(dir.path()).unwrap();
        dir
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn register_rejects_bad_input() {
        let dir = test_root();
        let root = dir.path();

        assert!(register_user(root, "", "Sam", "longenough").is_err());
        assert!(register_user(root, "not-an-email", "Sam", "longenough").is_err());
        assert!(register_user(root, "sam@example.com", "Sam", "short").is_err());
    }

    #[test]
    fn register_rejects_duplicate_email() {
        let dir = test_root();
        let root = dir.path();

        register_user(root, "sam@example.com", "Sam", "longenough").unwrap();
        let err = register_user(root, "sam@example.com", "Other", "longenough");
        assert!(err.is_err());
    }

    #[test]
    fn verify_user_matches_credentials() {
        let dir = test_root();
        let root = dir.path();

        let created = register_user(root, "ana@example.com", "Ana", "longenough").unwrap();
        assert!(created.reminder_hour.is_none());

        let ok = verify_user(root, "ana@example.com", "longenough").unwrap();
        assert_eq!(ok.unwrap().id, created.id);

        let bad = verify_user(root, "ana@example.com", "wrongpass").unwrap();
        assert!(bad.is_none());
    }

    #[test]
    fn sessions_validate_and_expire() {
        let session_id = create_session("kim@example.com");
        assert_eq!(validate_session(&session_id).as_deref(), Some("kim@example.com"));

        remove_session(&session_id);
        assert!(validate_session(&session_id).is_none());

        // An already-expired session is rejected
        let stale_id = Uuid::new_v4().to_string();
        SESSIONS.write().unwrap().insert(
            stale_id.clone(),
            Session {
                email: "old@example.com".to_string(),
                expires_at: SystemTime::now() - Duration::from_secs(1),
            },
        );
        assert!(validate_session(&stale_id).is_none());
    }

    #[test]
    fn reminder_hour_defaults_to_nine() {
        let dir = test_root();
        let user = register_user(dir.path(), "dee@example.com", "Dee", "longenough").unwrap();
        assert_eq!(effective_reminder_hour(&user), 9);

        let mut custom = user.clone();
        custom.reminder_hour = Some(18);
        assert_eq!(effective_reminder_hour(&custom), 18);
    }

    #[test]
    fn reset_codes_check_expiry_and_match() {
        let dir = test_root();
        let mut user = register_user(dir.path(), "rey@example.com", "Rey", "longenough").unwrap();

        let now = SystemTime::now();
        assert!(verify_reset_code(&user, "ABCD1234", now).is_err());

        user.reset_code = Some("ABCD1234".to_string());
        user.reset_code_expires = Some(now + Duration::from_secs(60));
        assert!(verify_reset_code(&user, "ABCD1234", now).is_ok());
        assert!(verify_reset_code(&user, "WRONG000", now).is_err());

        user.reset_code_expires = Some(now - Duration::from_secs(1));
        assert!(verify_reset_code(&user, "ABCD1234", now).is_err());
    }
}
