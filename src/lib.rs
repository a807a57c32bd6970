/*!
# GoalGrid

A personal task-management web service, built in Rust.

## Overview

GoalGrid lets a user sign up, collect tasks in a personal workspace, organise
them through list, board, and calendar views, tune their preferences (display
name, daily reminder hour), and receive a daily reminder email listing the
tasks due that day. The whole application is a single self-contained HTTP
service: accounts, sessions, storage, and mail dispatch all live here.

## Architecture

The service follows a conventional request/response layout:

### HTTP Layer
- **Technologies**: axum, tower-http (request tracing, CORS)
- **Key Components**:
  - JSON API routes for auth, tasks, subtasks, and settings
  - Cookie-based session middleware guarding the `/api` surface
  - An unauthenticated dispatch endpoint hit by an external scheduler

### Domain Layer
- **Core Components**:
  - Account management - Argon2 password hashing, signup/login, password
    reset codes delivered by email
  - Workspace - one per user, the container every task belongs to
  - Tasks and subtasks - CRUD plus the groupings behind the board and
    calendar views
  - Reminder dispatch - matches each user's preferred hour against the
    current hour in IST and mails the tasks due today

### Persistence Layer
- JSON files under a data directory: a users file, a workspaces file, and
  one directory per user holding their tasks and subtasks
- No external database; the file store is the source of truth

## Modules

- **login**: User accounts, sessions, authentication handlers
- **workspace**: Per-user workspace container
- **task**: Task and subtask storage, CRUD, board/calendar groupings
- **reminder**: IST time arithmetic and daily reminder dispatch
- **mailer**: SMTP transport and email rendering
- **store**: JSON file persistence helpers
- **app**: Routing, middleware, and server startup

## REST API Endpoints

- `POST /auth/signup`, `/auth/login`, `/auth/logout` - account lifecycle
- `POST /auth/forgot-password`, `/auth/reset-password` - emailed reset codes
- `GET /api/me`, `PUT /api/me/profile`, `PUT /api/me/password` - settings
- `GET /api/workspace` - the caller's workspace
- `GET|POST /api/tasks`, `PUT|DELETE /api/tasks/{id}` - task CRUD
- `PUT /api/tasks/{id}/status`, `POST /api/tasks/{id}/toggle` - board moves
  and the list-view checkbox
- `GET /api/tasks/board`, `GET /api/tasks/calendar` - view groupings
- `GET|POST /api/tasks/{id}/subtasks`, `POST /api/subtasks/{id}/toggle`,
  `DELETE /api/subtasks/{id}` - subtasks
- `GET /api/send-reminders` - scheduled reminder dispatch
*/

// Re-export all modules so they appear in the documentation
pub mod app;
pub mod login;
pub mod mailer;
pub mod reminder;
pub mod store;
pub mod task;
pub mod workspace;

/// Re-export everything from these modules to make it easier to use
pub use login::*;
pub use mailer::*;
pub use reminder::*;
pub use task::*;
pub use workspace::*;
