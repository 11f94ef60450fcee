//! Task → occurrence expansion.

use std::iter::FusedIterator;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use super::iter::{CompiledRule, StartTimes};
use super::rule::{RecurrenceSet, RuleError};

/// Identity of a persisted task.
pub type TaskId = i64;

/// A possibly recurring task as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub start: String,
    pub end: String,
    /// RRULE text; empty or absent means a single occurrence.
    #[serde(default)]
    pub recurrence: Option<String>,
}

/// One concrete instance of a task on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub task_id: TaskId,
    pub title: String,
    #[serde(rename = "start")]
    pub occurrence_start: DateTime<FixedOffset>,
    #[serde(rename = "end")]
    pub occurrence_end: DateTime<FixedOffset>,
    #[serde(rename = "isDone")]
    pub is_done: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("task {task_id}: malformed {field} timestamp `{value}`")]
    MalformedTimestamp {
        task_id: TaskId,
        field: &'static str,
        value: String,
    },

    #[error("task {task_id}: invalid recurrence rule `{rule}`: {source}")]
    InvalidRecurrenceRule {
        task_id: TaskId,
        rule: String,
        #[source]
        source: RuleError,
    },

    #[error("task {task_id}: end `{end}` is before start `{start}`")]
    EndBeforeStart {
        task_id: TaskId,
        start: String,
        end: String,
    },

    #[error("task {task_id}: more than {limit} occurrences needed to reach the window end")]
    TooManyOccurrences { task_id: TaskId, limit: usize },
}

impl ScheduleError {
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::MalformedTimestamp { task_id, .. }
            | Self::InvalidRecurrenceRule { task_id, .. }
            | Self::EndBeforeStart { task_id, .. }
            | Self::TooManyOccurrences { task_id, .. } => *task_id,
        }
    }
}

/// Parse an absolute timestamp with a UTC offset.
///
/// Accepts RFC 3339 and the PostgreSQL text form
/// (`2024-01-01 09:00:00+08`). Values without an offset are rejected.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    const FALLBACK_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f%#z",
        "%Y-%m-%dT%H:%M:%S%.f%#z",
        "%Y-%m-%d %H:%M%#z",
        "%Y-%m-%dT%H:%M%#z",
    ];
    let value = value.trim();
    DateTime::parse_from_rfc3339(value).ok().or_else(|| {
        FALLBACK_FORMATS
            .iter()
            .find_map(|format| DateTime::parse_from_str(value, format).ok())
    })
}

/// A validated task, ready to enumerate.
#[derive(Debug, Clone)]
pub struct TaskSchedule {
    task_id: TaskId,
    title: String,
    start: DateTime<FixedOffset>,
    duration: Duration,
    rule: Option<Arc<CompiledRule>>,
}

impl TaskSchedule {
    /// Validate timestamps and parse the recurrence rule of `task`.
    pub fn compile(task: &Task) -> Result<Self, ScheduleError> {
        let start = parse_field(task, "start", &task.start)?;
        let end = parse_field(task, "end", &task.end)?;
        if end < start {
            return Err(ScheduleError::EndBeforeStart {
                task_id: task.id,
                start: task.start.clone(),
                end: task.end.clone(),
            });
        }

        let rule = match task.recurrence.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => {
                let invalid = |source| ScheduleError::InvalidRecurrenceRule {
                    task_id: task.id,
                    rule: text.to_string(),
                    source,
                };
                let set: RecurrenceSet = text.parse().map_err(invalid)?;
                let compiled = CompiledRule::new(&set, start).map_err(invalid)?;
                Some(Arc::new(compiled))
            }
        };

        Ok(Self {
            task_id: task.id,
            title: task.name.clone(),
            start,
            duration: end - start,
            rule,
        })
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// False only for a rule without COUNT or UNTIL.
    pub fn is_bounded(&self) -> bool {
        self.rule.as_ref().map_or(true, |r| r.is_bounded())
    }

    /// The task start, or the rule's DTSTART when it overrides it.
    pub fn anchor(&self) -> DateTime<FixedOffset> {
        self.rule.as_ref().map_or(self.start, |r| r.anchor())
    }

    /// Lazy start times. Every call starts over from the anchor.
    pub fn starts(&self) -> StartTimes<'_> {
        match &self.rule {
            Some(rule) => rule.starts(),
            None => StartTimes::once(self.start),
        }
    }

    /// Lazy occurrences. Every call starts over from the anchor.
    pub fn occurrences(&self) -> Occurrences<'_> {
        Occurrences {
            starts: self.starts(),
            schedule: self,
        }
    }

    fn occurrence_at(&self, start: DateTime<FixedOffset>) -> Occurrence {
        Occurrence {
            task_id: self.task_id,
            title: self.title.clone(),
            occurrence_start: start,
            occurrence_end: start + self.duration,
            is_done: false,
        }
    }
}

fn parse_field(
    task: &Task,
    field: &'static str,
    value: &str,
) -> Result<DateTime<FixedOffset>, ScheduleError> {
    parse_timestamp(value).ok_or_else(|| ScheduleError::MalformedTimestamp {
        task_id: task.id,
        field,
        value: value.to_string(),
    })
}

/// Occurrences of a single task, in chronological order.
#[derive(Debug)]
pub struct Occurrences<'a> {
    starts: StartTimes<'a>,
    schedule: &'a TaskSchedule,
}

impl Iterator for Occurrences<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        let start = self.starts.next()?;
        Some(self.schedule.occurrence_at(start))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.starts.size_hint()
    }
}

impl FusedIterator for Occurrences<'_> {}

/// A validated batch of tasks.
///
/// Iterating yields task order first, then time order within each task.
/// Never sorted across tasks. Iteration does not end if any task has an
/// unbounded rule, so callers must bound consumption (see
/// [`expand_between`]).
#[derive(Debug, Clone)]
pub struct Expansion {
    schedules: Vec<TaskSchedule>,
}

impl Expansion {
    pub fn schedules(&self) -> &[TaskSchedule] {
        &self.schedules
    }

    /// Lazy occurrences of the whole batch. Every call starts over.
    pub fn iter(&self) -> ExpansionIter<'_> {
        ExpansionIter {
            schedules: self.schedules.iter(),
            current: None,
        }
    }
}

impl<'a> IntoIterator for &'a Expansion {
    type Item = Occurrence;
    type IntoIter = ExpansionIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug)]
pub struct ExpansionIter<'a> {
    schedules: std::slice::Iter<'a, TaskSchedule>,
    current: Option<Occurrences<'a>>,
}

impl Iterator for ExpansionIter<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        loop {
            if let Some(occurrence) = self.current.as_mut().and_then(Iterator::next) {
                return Some(occurrence);
            }
            self.current = Some(self.schedules.next()?.occurrences());
        }
    }
}

impl FusedIterator for ExpansionIter<'_> {}

/// Validate a batch of tasks for expansion.
///
/// Every task is compiled before anything is produced; the first invalid
/// task (in input order) fails the whole batch.
pub fn expand(tasks: &[Task]) -> Result<Expansion, ScheduleError> {
    let schedules = tasks
        .iter()
        .map(TaskSchedule::compile)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Expansion { schedules })
}

/// Expand a batch of tasks, keeping only occurrences that overlap
/// `[from, to]`. Safe for unbounded rules.
pub fn expand_between(
    tasks: &[Task],
    from: DateTime<FixedOffset>,
    to: DateTime<FixedOffset>,
) -> Result<Vec<Occurrence>, ScheduleError> {
    expand_between_limited(tasks, from, to, usize::MAX)
}

/// [`expand_between`] with a budget on the start times generated up to
/// `to`, counting those that end before `from`. Running out fails with
/// [`ScheduleError::TooManyOccurrences`] naming the task being expanded.
pub fn expand_between_limited(
    tasks: &[Task],
    from: DateTime<FixedOffset>,
    to: DateTime<FixedOffset>,
    limit: usize,
) -> Result<Vec<Occurrence>, ScheduleError> {
    let expansion = expand(tasks)?;
    let mut generated = 0usize;
    let mut window = Vec::new();

    for schedule in expansion.schedules() {
        for start in schedule.starts().take_while(|start| *start <= to) {
            generated += 1;
            if generated > limit {
                return Err(ScheduleError::TooManyOccurrences {
                    task_id: schedule.task_id(),
                    limit,
                });
            }
            if start + schedule.duration() >= from {
                window.push(schedule.occurrence_at(start));
            }
        }
    }
    Ok(window)
}

/// Merge occurrences of different tasks into start-time order. Ties keep
/// their relative order.
pub fn sort_chronologically(occurrences: &mut [Occurrence]) {
    occurrences.sort_by(|a, b| a.occurrence_start.cmp(&b.occurrence_start));
}
