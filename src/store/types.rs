//! Row types for the persistence store.

use serde::{Deserialize, Serialize};

use crate::schedule::{Task, TaskId};

/// A user row. `user_id` is the identity provider's username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbUser {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Payload for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub user_id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbMilestone {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMilestone {
    pub title: String,
    pub description: String,
}

/// A scheduled task row. Timestamps are stored as `timestamptz` and come
/// back as RFC 3339 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbTask {
    pub id: TaskId,
    pub user_id: String,
    pub name: String,
    pub start_timestamptz: String,
    pub end_timestamptz: String,
    #[serde(default)]
    pub recurrence: Option<String>,
}

impl DbTask {
    /// The expander's view of this row.
    pub fn to_task(&self) -> Task {
        Task {
            id: self.id,
            name: self.name.clone(),
            start: self.start_timestamptz.clone(),
            end: self.end_timestamptz.clone(),
            recurrence: self.recurrence.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub start_timestamptz: String,
    pub end_timestamptz: String,
    pub recurrence: Option<String>,
}

/// Insert shape for owned rows: the payload plus its owner.
#[derive(Debug, Serialize)]
pub(crate) struct OwnedRow<'a, T> {
    pub user_id: &'a str,
    #[serde(flatten)]
    pub row: &'a T,
}
