//! Goal planning on top of a language model.
//!
//! Each step of the planning flow (goal, status, milestones, missions and
//! calendar schedules) is a single completion. The structured steps ask the
//! model for JSON conforming to a strict schema and decode it into typed
//! values; malformed replies surface as [`PlannerError::Decode`].

mod prompts;
mod types;

pub use types::{
    CalendarTime, Milestone, MilestoneList, Mission, MissionList, Schedule, ScheduleList,
};

use chrono::{FixedOffset, NaiveDate};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;

use crate::llm::{ChatMessage, ChatOptions, LlmClient, ResponseFormat};

pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";
pub const DEFAULT_MAX_TOKENS: u64 = 1000;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Llm(#[from] anyhow::Error),

    #[error("model returned no content")]
    EmptyResponse,

    #[error("model reply for {step} did not match the expected shape")]
    Decode {
        step: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

fn or_none(value: Option<&str>) -> &str {
    value.filter(|s| !s.trim().is_empty()).unwrap_or("None")
}

/// Runs the planning prompts against an [`LlmClient`].
#[derive(Clone)]
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_tokens: u64,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Restate a free-form goal as one clear sentence.
    pub async fn generate_goal(&self, goal: &str) -> Result<String, PlannerError> {
        self.ask(prompts::goal(goal), None).await
    }

    /// Describe where the user stands on `goal`. Missing inputs are
    /// rendered as `None`.
    pub async fn generate_status(
        &self,
        goal: &str,
        previous_status: Option<&str>,
        user_description: Option<&str>,
    ) -> Result<String, PlannerError> {
        self.ask(
            prompts::status(goal, or_none(previous_status), or_none(user_description)),
            None,
        )
        .await
    }

    pub async fn generate_milestones(
        &self,
        goal: &str,
        status: &str,
    ) -> Result<MilestoneList, PlannerError> {
        self.ask_structured(
            "milestones",
            prompts::milestones(goal, status),
            prompts::milestone_schema(),
        )
        .await
    }

    pub async fn generate_missions(
        &self,
        goal: &str,
        status: &str,
        milestones: &[Milestone],
    ) -> Result<MissionList, PlannerError> {
        let milestones = serde_json::to_string(milestones).map_err(|source| {
            PlannerError::Decode {
                step: "missions",
                source,
            }
        })?;
        self.ask_structured(
            "missions",
            prompts::missions(goal, status, &milestones),
            prompts::mission_schema(),
        )
        .await
    }

    /// Lay the missions out as calendar events starting from `today`.
    /// Event times are requested in `utc_offset`.
    pub async fn generate_schedules(
        &self,
        missions: &[Mission],
        today: NaiveDate,
        utc_offset: FixedOffset,
    ) -> Result<ScheduleList, PlannerError> {
        let missions = serde_json::to_string(missions).map_err(|source| PlannerError::Decode {
            step: "schedules",
            source,
        })?;
        let today = today.format("%Y-%m-%d").to_string();
        self.ask_structured(
            "schedules",
            prompts::schedules(&missions, &today, &utc_offset.to_string()),
            prompts::schedule_schema(),
        )
        .await
    }

    async fn ask(
        &self,
        prompt: String,
        response_format: Option<ResponseFormat>,
    ) -> Result<String, PlannerError> {
        let options = ChatOptions {
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            response_format,
            ..ChatOptions::default()
        };
        let response = self
            .llm
            .chat_completion_with_options(&self.model, &[ChatMessage::user(prompt)], options)
            .await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion finished"
            );
        }

        response
            .content
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(PlannerError::EmptyResponse)
    }

    async fn ask_structured<T: DeserializeOwned>(
        &self,
        step: &'static str,
        prompt: String,
        schema: serde_json::Value,
    ) -> Result<T, PlannerError> {
        let reply = self
            .ask(prompt, Some(ResponseFormat::json_schema(step, schema)))
            .await?;
        serde_json::from_str(&reply).map_err(|source| {
            tracing::warn!(step, "undecodable model reply: {}", reply);
            PlannerError::Decode { step, source }
        })
    }
}
