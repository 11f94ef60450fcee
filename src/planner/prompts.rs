//! Prompt templates and output schemas for each planning step.

use serde_json::{json, Value};

pub fn goal(goal: &str) -> String {
    format!(
        "Summarise the user's goal. Keep it clear, short and specific. \
         Input: {goal}. Reply with a single sentence."
    )
}

pub fn status(goal: &str, previous_status: &str, user_description: &str) -> String {
    format!(
        "Using the user's description and their previous status (if any), state where \
         they currently stand on the goal. Goal: {goal}. Previous status: {previous_status}. \
         User description: {user_description}. Reply with a single sentence."
    )
}

pub fn milestones(goal: &str, status: &str) -> String {
    format!(
        "Given the goal and the user's current status, list milestones the user can \
         realistically reach, each with a short description. Goal: {goal}. Status: {status}."
    )
}

pub fn missions(goal: &str, status: &str, milestones: &str) -> String {
    format!(
        "To reach the goal from the current status through the milestones, list concrete \
         missions the user can complete within a reasonable period. For each mission give \
         the time needed per session in minutes and how many sessions to repeat. \
         Goal: {goal}. Status: {status}. Milestones: {milestones}."
    )
}

pub fn schedules(missions: &str, today: &str, utc_offset: &str) -> String {
    format!(
        "Turn the missions into calendar events starting on or after {today}. Each event \
         has a summary, a start and an end, and a recurrence. Write start and end as \
         ISO 8601 date-times with the UTC offset {utc_offset}, and use the event length \
         given by the mission duration. Write recurrence as an iCalendar RRULE such as \
         `RRULE:FREQ=WEEKLY;BYDAY=MO,WE;COUNT=8`, using COUNT for the number of sessions, \
         or an empty string for a one-off event. Missions: {missions}."
    )
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

pub fn milestone_schema() -> Value {
    let milestone = object(
        json!({
            "title": { "type": "string" },
            "description": { "type": "string" }
        }),
        &["title", "description"],
    );
    object(
        json!({ "milestones": { "type": "array", "items": milestone } }),
        &["milestones"],
    )
}

pub fn mission_schema() -> Value {
    let mission = object(
        json!({
            "title": { "type": "string" },
            "duration": { "type": "integer" },
            "recurrence": { "type": "integer" }
        }),
        &["title", "duration", "recurrence"],
    );
    object(
        json!({ "missions": { "type": "array", "items": mission } }),
        &["missions"],
    )
}

pub fn schedule_schema() -> Value {
    let time = object(
        json!({
            "dateTime": { "type": "string" },
            "timeZone": { "type": "string" }
        }),
        &["dateTime", "timeZone"],
    );
    let event = object(
        json!({
            "summary": { "type": "string" },
            "start": time.clone(),
            "end": time,
            "recurrence": { "type": "string" }
        }),
        &["summary", "start", "end", "recurrence"],
    );
    object(
        json!({ "events": { "type": "array", "items": event } }),
        &["events"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_embed_inputs() {
        let prompt = status("run a marathon", "None", "I jog twice a week");
        assert!(prompt.contains("Goal: run a marathon."));
        assert!(prompt.contains("Previous status: None."));
        assert!(prompt.contains("I jog twice a week"));

        let prompt = schedules("[]", "2024-03-04", "+08:00");
        assert!(prompt.contains("2024-03-04"));
        assert!(prompt.contains("+08:00"));
    }

    #[test]
    fn test_schemas_are_strict_objects() {
        for schema in [milestone_schema(), mission_schema(), schedule_schema()] {
            assert_eq!(schema["type"], "object");
            assert_eq!(schema["additionalProperties"], false);
        }
        assert_eq!(
            schedule_schema()["properties"]["events"]["items"]["required"],
            json!(["summary", "start", "end", "recurrence"])
        );
    }
}
