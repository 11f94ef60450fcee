//! Planning endpoints backed by the language model.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use super::routes::AppState;
use super::types::{
    GoalRequest, GoalResponse, MilestonesRequest, MissionsRequest, SchedulesRequest,
    StatusRequest, StatusResponse,
};
use crate::planner::{MilestoneList, MissionList, PlannerError, ScheduleList};

fn planner_error(step: &str, err: PlannerError) -> (StatusCode, String) {
    tracing::error!("Failed to generate {}: {}", step, err);
    (
        StatusCode::BAD_GATEWAY,
        format!("Failed to generate {}: {}", step, err),
    )
}

fn require(field: &str, value: &str) -> Result<(), (StatusCode, String)> {
    if value.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, format!("{} is required", field)));
    }
    Ok(())
}

/// POST /api/generate-goal
pub async fn generate_goal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GoalRequest>,
) -> Result<Json<GoalResponse>, (StatusCode, String)> {
    require("goal", &req.goal)?;
    let goal = state
        .planner
        .generate_goal(&req.goal)
        .await
        .map_err(|e| planner_error("goal", e))?;
    Ok(Json(GoalResponse { goal }))
}

/// POST /api/generate-status
pub async fn generate_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    require("goal", &req.goal)?;
    let status = state
        .planner
        .generate_status(
            &req.goal,
            req.previous_status.as_deref(),
            req.user_description.as_deref(),
        )
        .await
        .map_err(|e| planner_error("status", e))?;
    Ok(Json(StatusResponse { status }))
}

/// POST /api/generate-milestones
pub async fn generate_milestones(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MilestonesRequest>,
) -> Result<Json<MilestoneList>, (StatusCode, String)> {
    require("goal", &req.goal)?;
    require("status", &req.status)?;
    let list = state
        .planner
        .generate_milestones(&req.goal, &req.status)
        .await
        .map_err(|e| planner_error("milestones", e))?;
    Ok(Json(list))
}

/// POST /api/generate-missions
pub async fn generate_missions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MissionsRequest>,
) -> Result<Json<MissionList>, (StatusCode, String)> {
    require("goal", &req.goal)?;
    require("status", &req.status)?;
    let milestones = req.milestones.into_vec();
    let list = state
        .planner
        .generate_missions(&req.goal, &req.status, &milestones)
        .await
        .map_err(|e| planner_error("missions", e))?;
    Ok(Json(list))
}

/// POST /api/generate-schedules
pub async fn generate_schedules(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SchedulesRequest>,
) -> Result<Json<ScheduleList>, (StatusCode, String)> {
    let missions = req.missions.into_vec();
    if missions.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "missions are required".to_string()));
    }
    let offset = state.config.default_utc_offset;
    let today = req
        .today
        .unwrap_or_else(|| Utc::now().with_timezone(&offset).date_naive());
    let list = state
        .planner
        .generate_schedules(&missions, today, offset)
        .await
        .map_err(|e| planner_error("schedules", e))?;
    Ok(Json(list))
}
