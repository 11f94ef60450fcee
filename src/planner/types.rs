//! Structured planner outputs, shared with the HTTP API.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::schedule::parse_timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneList {
    pub milestones: Vec<Milestone>,
}

/// A repeatable piece of work derived from the milestones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub title: String,
    /// Minutes per session.
    pub duration: u32,
    /// How many sessions are planned.
    pub recurrence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionList {
    pub missions: Vec<Mission>,
}

/// A calendar time in the Google Calendar event shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarTime {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(rename = "timeZone", default)]
    pub time_zone: String,
}

impl CalendarTime {
    /// Resolve to an absolute instant. Values without an offset are read as
    /// wall time in `default_offset`.
    pub fn resolve(&self, default_offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        if let Some(at) = parse_timestamp(&self.date_time) {
            return Some(at);
        }
        let value = self.date_time.trim();
        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .and_then(|naive| default_offset.from_local_datetime(&naive).single())
    }
}

/// One scheduled, possibly recurring, calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub summary: String,
    pub start: CalendarTime,
    pub end: CalendarTime,
    /// RRULE text, empty for a one-off event.
    #[serde(default)]
    pub recurrence: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleList {
    pub events: Vec<Schedule>,
}
