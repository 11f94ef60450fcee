//! Recurring task expansion.
//!
//! Turns persisted tasks (a start, an end and an optional RRULE) into the
//! concrete calendar occurrences a client renders.
//!
//! - [`rule`] reads recurrence strings and applies the local policy
//!   (fixed offsets only, no `TZID`, no `RDATE`)
//! - [`iter`] hands the rule to the `rrule` crate and yields start times
//!   lazily in the task's offset
//! - [`expand`](mod@expand) pairs start times with the task's duration and
//!   handles batches
//!
//! Everything here is pure: no I/O, no clock, no shared state. Completion
//! state is never read, so every occurrence comes out with `is_done = false`.

pub mod expand;
pub mod iter;
pub mod rule;

pub use expand::{
    expand, expand_between, expand_between_limited, parse_timestamp, sort_chronologically,
    Expansion, ExpansionIter, Occurrence, Occurrences, ScheduleError, Task, TaskId, TaskSchedule,
};
pub use iter::{CompiledRule, StartTimes};
pub use rule::{Frequency, RecurrenceRule, RecurrenceSet, RuleError, RuleTime};
