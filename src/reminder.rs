use crate::app::AppState;
use crate::login::{self, User};
use crate::mailer::{self, Mailer};
use crate::task::{self, Status, Task};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

/// India Standard Time, the fixed timezone reminder hours are compared in
pub fn ist_offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("IST is a valid offset")
}

/// The hour of day in IST at the given instant
pub fn current_ist_hour(now_utc: DateTime<Utc>) -> u32 {
    now_utc.with_timezone(&ist_offset()).hour()
}

/// The UTC bounds of "today" in IST: [today 00:00, tomorrow 00:00)
pub fn due_window_utc(now_utc: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let ist = ist_offset();
    let today = now_utc.with_timezone(&ist).date_naive();
    let tomorrow = today + Days::new(1);

    // A fixed offset has no DST gaps, so both midnights exist exactly once
    let start = ist
        .from_local_datetime(&today.and_time(NaiveTime::MIN))
        .single()
        .expect("fixed offset midnight is unambiguous")
        .with_timezone(&Utc);
    let end = ist
        .from_local_datetime(&tomorrow.and_time(NaiveTime::MIN))
        .single()
        .expect("fixed offset midnight is unambiguous")
        .with_timezone(&Utc);

    (start, end)
}

/// Unfinished tasks due today (IST)
///
/// A task qualifies when its due date falls inside the current IST day and
/// it has not reached the done column.
pub fn tasks_due_today(tasks: &[Task], now_utc: DateTime<Utc>) -> Vec<Task> {
    let (start, end) = due_window_utc(now_utc);

    tasks
        .iter()
        .filter(|t| t.status != Status::Done)
        .filter(|t| t.due_date.map(|d| d >= start && d < end).unwrap_or(false))
        .cloned()
        .collect()
}

/// Per-user outcome of one dispatch run
#[derive(Debug, Serialize)]
pub struct ReminderOutcome {
    /// Email address the reminder was addressed to
    pub user: String,

    /// "sent" or "failed"
    pub status: String,

    /// How many due tasks the email covered
    pub tasks_due: usize,
}

/// Run one reminder pass over all users
///
/// Scans every account, matches each user's preferred hour against the
/// current IST hour, selects their unfinished tasks due today, and calls
/// `send` once per user who has any. A send failure is recorded and the
/// batch continues; users whose hour doesn't match, or who have nothing
/// due, produce no outcome at all.
///
/// # Arguments
/// * `root` - Root directory of the file store
/// * `now_utc` - The instant the pass is evaluated at
/// * `send` - Delivers one email for a user's due tasks
pub fn dispatch<F>(
    root: &Path,
    now_utc: DateTime<Utc>,
    mut send: F,
) -> Result<Vec<ReminderOutcome>, String>
where
    F: FnMut(&User, &[Task]) -> Result<(), String>,
{
    let current_hour = current_ist_hour(now_utc);
    let users = login::load_users(root)?;

    let mut results = Vec::new();

    for user in users.values() {
        if login::effective_reminder_hour(user) != current_hour {
            continue;
        }

        let tasks = task::load_tasks(root, &user.id)?;
        let due = tasks_due_today(&tasks, now_utc);
        if due.is_empty() {
            continue;
        }

        log::info!("Processing user: {} ({} due)", user.email, due.len());

        match send(user, &due) {
            Ok(()) => results.push(ReminderOutcome {
                user: user.email.clone(),
                status: "sent".to_string(),
                tasks_due: due.len(),
            }),
            Err(e) => {
                log::error!("Failed to email {}: {}", user.email, e);
                results.push(ReminderOutcome {
                    user: user.email.clone(),
                    status: "failed".to_string(),
                    tasks_due: due.len(),
                });
            }
        }
    }

    Ok(results)
}

/// Scheduled reminder endpoint
///
/// Invoked by an external scheduler (expected once per hour). Builds the
/// SMTP transport, runs one dispatch pass, and reports the per-user
/// outcomes.
pub async fn handle_send_reminders(State(state): State<Arc<AppState>>) -> Response {
    let now = Utc::now();
    log::info!("Checking reminders for: {}:00 IST", current_ist_hour(now));

    let outcome = Mailer::from_env()
        .map_err(|e| e.to_string())
        .and_then(|mailer| {
            dispatch(&state.data_dir, now, |user, due| {
                let html = mailer::render_reminder_html(&user.display_name, due)?;
                mailer
                    .send_reminder(&user.email, &mailer::reminder_subject(due.len()), html)
                    .map_err(|e| e.to_string())
            })
        });

    match outcome {
        Ok(results) => Json(json!({
            "success": true,
            "current_time_ist": format!("{}:00", current_ist_hour(now)),
            "results": results,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;
    use crate::task::{NewTaskRequest, Priority};
    use chrono::TimeZone;

    fn test_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        store::init_store(dir.path()).unwrap();
        dir
    }

    fn register(root: &Path, email: &str, hour: Option<u32>) -> User {
        let user = login::register_user(root, email, "Test User", "longenough").unwrap();
        if hour.is_some() {
            let mut users = login::load_users(root).unwrap();
            users.get_mut(email).unwrap().reminder_hour = hour;
            login::save_users(root, &users).unwrap();
        }
        user
    }

    fn add_task(root: &Path, user: &User, title: &str, due: Option<DateTime<Utc>>) {
        let req = NewTaskRequest {
            title: title.to_string(),
            description: None,
            category: None,
            priority: Priority::default(),
            due_date: due,
        };
        task::create_task(root, &user.id, "ws", req).unwrap();
    }

    // 03:30 UTC is exactly 09:00 IST
    fn nine_am_ist() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 5, 3, 30, 0).unwrap()
    }

    #[test]
    fn ist_hour_conversion() {
        assert_eq!(current_ist_hour(nine_am_ist()), 9);
        // 20:00 UTC is 01:30 IST the next day
        let late = Utc.with_ymd_and_hms(2026, 3, 4, 20, 0, 0).unwrap();
        assert_eq!(current_ist_hour(late), 1);
    }

    #[test]
    fn due_window_covers_the_ist_day() {
        let now = nine_am_ist();
        let (start, end) = due_window_utc(now);

        // IST March 5th runs from 18:30 UTC March 4th to 18:30 UTC March 5th
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 4, 18, 30, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 5, 18, 30, 0).unwrap());
    }

    #[test]
    fn selection_filters_done_and_out_of_window() {
        let dir = test_root();
        let now = nine_am_ist();
        let user = register(dir.path(), "sel@example.com", None);

        // In window
        add_task(dir.path(), &user, "due today", Some(now));
        // Window start is inclusive, end is exclusive
        add_task(
            dir.path(),
            &user,
            "at midnight",
            Some(Utc.with_ymd_and_hms(2026, 3, 4, 18, 30, 0).unwrap()),
        );
        add_task(
            dir.path(),
            &user,
            "tomorrow",
            Some(Utc.with_ymd_and_hms(2026, 3, 5, 18, 30, 0).unwrap()),
        );
        // No due date
        add_task(dir.path(), &user, "unscheduled", None);

        let mut tasks = task::load_tasks(dir.path(), &user.id).unwrap();
        // Finish one of the in-window tasks
        let done_id = tasks
            .iter()
            .find(|t| t.title == "due today")
            .unwrap()
            .id
            .clone();
        task::set_status(dir.path(), &user.id, &done_id, Status::Done).unwrap();
        tasks = task::load_tasks(dir.path(), &user.id).unwrap();

        let due = tasks_due_today(&tasks, now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "at midnight");
    }

    #[test]
    fn matching_hour_with_due_task_sends_exactly_once() {
        let dir = test_root();
        let now = nine_am_ist();

        // Default hour is 9, which matches
        let user = register(dir.path(), "match@example.com", None);
        add_task(dir.path(), &user, "due today", Some(now));

        let mut calls = 0;
        let results = dispatch(dir.path(), now, |_, due| {
            calls += 1;
            assert_eq!(due.len(), 1);
            Ok(())
        })
        .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].user, "match@example.com");
        assert_eq!(results[0].status, "sent");
        assert_eq!(results[0].tasks_due, 1);
    }

    #[test]
    fn mismatched_hour_sends_nothing() {
        let dir = test_root();
        let now = nine_am_ist();

        let user = register(dir.path(), "later@example.com", Some(18));
        add_task(dir.path(), &user, "due today", Some(now));

        let mut calls = 0;
        let results = dispatch(dir.path(), now, |_, _| {
            calls += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(calls, 0);
        assert!(results.is_empty());
    }

    #[test]
    fn matching_hour_without_due_tasks_sends_nothing() {
        let dir = test_root();
        let now = nine_am_ist();

        let user = register(dir.path(), "idle@example.com", Some(9));
        // Due tomorrow, outside the window
        add_task(
            dir.path(),
            &user,
            "tomorrow",
            Some(Utc.with_ymd_and_hms(2026, 3, 6, 9, 0, 0).unwrap()),
        );

        let mut calls = 0;
        let results = dispatch(dir.path(), now, |_, _| {
            calls += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(calls, 0);
        assert!(results.is_empty());
    }

    #[test]
    fn send_failure_is_recorded_and_batch_continues() {
        let dir = test_root();
        let now = nine_am_ist();

        let flaky = register(dir.path(), "flaky@example.com", Some(9));
        add_task(dir.path(), &flaky, "due today", Some(now));

        let steady = register(dir.path(), "steady@example.com", Some(9));
        add_task(dir.path(), &steady, "also due", Some(now));

        let results = dispatch(dir.path(), now, |user, _| {
            if user.email == "flaky@example.com" {
                Err("mailbox on fire".to_string())
            } else {
                Ok(())
            }
        })
        .unwrap();

        assert_eq!(results.len(), 2);
        let failed = results.iter().find(|r| r.user == "flaky@example.com").unwrap();
        assert_eq!(failed.status, "failed");
        let sent = results.iter().find(|r| r.user == "steady@example.com").unwrap();
        assert_eq!(sent.status, "sent");
    }
}
