//! Users, saved plans and the expanded calendar.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, FixedOffset, Utc};

use super::auth::AuthUser;
use super::routes::AppState;
use super::types::{
    CreateUserRequest, EventsEnvelope, LoadDataRequest, LoadDataResponse, MessageResponse,
    ProgressResponse, SaveDataRequest, SaveDataResponse,
};
use crate::planner::{Milestone, Schedule};
use crate::schedule::{
    expand_between_limited, sort_chronologically, ScheduleError, Task, TaskId, TaskSchedule,
};
use crate::store::{GoalStore, NewMilestone, NewTask, NewUser};

fn store_error(e: anyhow::Error) -> (StatusCode, String) {
    tracing::error!("Store request failed: {:#}", e);
    (StatusCode::BAD_GATEWAY, e.to_string())
}

/// POST /create-user - Register a user unless one already holds the token.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    if state
        .store
        .find_user_by_token(&req.token)
        .await
        .map_err(store_error)?
        .is_some()
    {
        return Ok(Json(MessageResponse::new("User already exists")));
    }

    let user = state
        .store
        .create_user(&NewUser {
            user_id: req.user_id,
            email: req.email,
            token: Some(req.token),
        })
        .await
        .map_err(store_error)?;

    Ok(Json(MessageResponse {
        message: "User created successfully".to_string(),
        user_id: Some(user.user_id),
    }))
}

/// Turn one generated schedule into a task row, checking that the
/// expander accepts it.
fn schedule_to_task(
    index: usize,
    schedule: &Schedule,
    offset: FixedOffset,
) -> Result<NewTask, (StatusCode, String)> {
    let resolve = |field: &str, time: &crate::planner::CalendarTime| {
        time.resolve(offset).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!(
                    "schedule {} ({}): malformed {} `{}`",
                    index, schedule.summary, field, time.date_time
                ),
            )
        })
    };
    let start = resolve("start", &schedule.start)?;
    let end = resolve("end", &schedule.end)?;
    let recurrence = Some(schedule.recurrence.trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    let task = NewTask {
        name: schedule.summary.clone(),
        start_timestamptz: start.to_rfc3339(),
        end_timestamptz: end.to_rfc3339(),
        recurrence,
    };

    TaskSchedule::compile(&Task {
        id: index as TaskId,
        name: task.name.clone(),
        start: task.start_timestamptz.clone(),
        end: task.end_timestamptz.clone(),
        recurrence: task.recurrence.clone(),
    })
    .map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("schedule {} ({}): {}", index, schedule.summary, e),
        )
    })?;

    Ok(task)
}

/// Make sure the caller has a user row before writing plan data.
async fn ensure_user(store: &dyn GoalStore, user: &AuthUser) -> anyhow::Result<()> {
    if store.get_user(&user.user_id).await?.is_none() {
        store
            .create_user(&NewUser {
                user_id: user.user_id.clone(),
                email: user.email.clone(),
                token: None,
            })
            .await?;
    }
    Ok(())
}

/// POST /api/save-data - Store goal, status, milestones and schedules.
pub async fn save_data(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SaveDataRequest>,
) -> Result<Json<SaveDataResponse>, (StatusCode, String)> {
    let offset = state.config.default_utc_offset;
    let tasks = req
        .schedules
        .map(|s| s.into_vec())
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, schedule)| schedule_to_task(index, schedule, offset))
        .collect::<Result<Vec<_>, _>>()?;
    let milestones: Vec<NewMilestone> = req
        .milestones
        .map(|m| m.into_vec())
        .unwrap_or_default()
        .into_iter()
        .map(|m| NewMilestone {
            title: m.title,
            description: m.description,
        })
        .collect();

    let store = state.store.as_ref();
    ensure_user(store, &user).await.map_err(store_error)?;
    store
        .update_user_progress(&user.user_id, &req.goal, &req.status)
        .await
        .map_err(store_error)?;
    let milestones = store
        .replace_milestones(&user.user_id, &milestones)
        .await
        .map_err(store_error)?;
    let tasks = store
        .replace_tasks(&user.user_id, &tasks)
        .await
        .map_err(store_error)?;

    tracing::info!(
        user_id = %user.user_id,
        milestones = milestones.len(),
        tasks = tasks.len(),
        "Saved plan"
    );

    Ok(Json(SaveDataResponse {
        message: "Data saved successfully".to_string(),
        user_id: user.user_id,
        milestones: milestones.len(),
        tasks: tasks.len(),
    }))
}

/// POST /api/back-get-status - The caller's goal, status and milestones.
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProgressResponse>, (StatusCode, String)> {
    let row = state
        .store
        .get_user(&user.user_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "User not found".to_string()))?;
    let milestones = state
        .store
        .list_milestones(&user.user_id)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(|m| Milestone {
            title: m.title,
            description: m.description,
        })
        .collect();

    Ok(Json(ProgressResponse {
        user_id: row.user_id,
        goal: row.goal,
        status: row.status,
        milestones,
    }))
}

/// POST /api/load-data - Expand the caller's tasks into calendar events.
///
/// A window that would need more than `MAX_EXPANDED_OCCURRENCES` start
/// times is refused with 400.
pub async fn load_data(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Option<Json<LoadDataRequest>>,
) -> Result<Json<LoadDataResponse>, (StatusCode, String)> {
    let window = body.map(|Json(req)| req).unwrap_or_default();
    let offset = state.config.default_utc_offset;
    let from = window
        .from
        .unwrap_or_else(|| Utc::now().with_timezone(&offset));
    let to = match window.to {
        Some(to) => to,
        None => Duration::try_days(state.config.calendar_horizon_days)
            .and_then(|horizon| from.checked_add_signed(horizon))
            .ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    "`from` is too late for the default window".to_string(),
                )
            })?,
    };
    if to < from {
        return Err((
            StatusCode::BAD_REQUEST,
            "`to` must not be before `from`".to_string(),
        ));
    }

    let tasks: Vec<Task> = state
        .store
        .list_tasks(&user.user_id)
        .await
        .map_err(store_error)?
        .iter()
        .map(|row| row.to_task())
        .collect();

    let limit = state.config.max_expanded_occurrences;
    let mut data = expand_between_limited(&tasks, from, to, limit).map_err(|e| match e {
        ScheduleError::TooManyOccurrences { .. } => {
            tracing::warn!(user_id = %user.user_id, "Calendar window refused: {}", e);
            (
                StatusCode::BAD_REQUEST,
                format!("{}; request a shorter window", e),
            )
        }
        e => {
            tracing::error!(task_id = e.task_id(), "Stored task does not expand: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    })?;
    sort_chronologically(&mut data);

    Ok(Json(LoadDataResponse {
        user_id: user.user_id,
        events: EventsEnvelope { data },
    }))
}

/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<TaskId>,
) -> Result<StatusCode, (StatusCode, String)> {
    let removed = state
        .store
        .delete_task(&user.user_id, task_id)
        .await
        .map_err(store_error)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Task not found".to_string()))
    }
}
