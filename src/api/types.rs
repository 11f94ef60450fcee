//! API request and response types.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::planner::{Milestone, MilestoneList, Mission, MissionList, Schedule, ScheduleList};
use crate::schedule::Occurrence;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub dev_mode: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user_id: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Planning
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    pub goal: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GoalResponse {
    pub goal: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub goal: String,
    #[serde(default)]
    pub previous_status: Option<String>,
    #[serde(default)]
    pub user_description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct MilestonesRequest {
    pub goal: String,
    pub status: String,
}

/// Milestones either wrapped as `{"milestones": [...]}` or as a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MilestonesInput {
    Wrapped(MilestoneList),
    Bare(Vec<Milestone>),
}

impl MilestonesInput {
    pub fn into_vec(self) -> Vec<Milestone> {
        match self {
            Self::Wrapped(list) => list.milestones,
            Self::Bare(milestones) => milestones,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MissionsRequest {
    pub goal: String,
    pub status: String,
    pub milestones: MilestonesInput,
}

/// Missions either wrapped as `{"missions": [...]}` or as a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MissionsInput {
    Wrapped(MissionList),
    Bare(Vec<Mission>),
}

impl MissionsInput {
    pub fn into_vec(self) -> Vec<Mission> {
        match self {
            Self::Wrapped(list) => list.missions,
            Self::Bare(missions) => missions,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SchedulesRequest {
    pub missions: MissionsInput,
    /// Defaults to the current date in the configured offset.
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Users and saved plans
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub token: String,
    pub email: String,
}

/// Schedules either wrapped as `{"events": [...]}` or as a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SchedulesInput {
    Wrapped(ScheduleList),
    Bare(Vec<Schedule>),
}

impl SchedulesInput {
    pub fn into_vec(self) -> Vec<Schedule> {
        match self {
            Self::Wrapped(list) => list.events,
            Self::Bare(events) => events,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveDataRequest {
    pub goal: String,
    pub status: String,
    #[serde(default)]
    pub milestones: Option<MilestonesInput>,
    #[serde(default)]
    pub schedules: Option<SchedulesInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveDataResponse {
    pub message: String,
    pub user_id: String,
    pub milestones: usize,
    pub tasks: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub user_id: String,
    pub goal: Option<String>,
    pub status: Option<String>,
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadDataRequest {
    #[serde(default)]
    pub from: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub to: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsEnvelope {
    pub data: Vec<Occurrence>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadDataResponse {
    pub user_id: String,
    pub events: EventsEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
}

/// User ids arrive as strings from the identity provider but older clients
/// send them as numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
