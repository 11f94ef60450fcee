//! Behaviour of the public expansion API over whole task batches.

use chrono::{DateTime, Duration, FixedOffset};
use goal_reacher::schedule::{
    expand, expand_between, sort_chronologically, Occurrence, ScheduleError, Task, TaskSchedule,
};

fn at(value: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value).unwrap()
}

fn task(id: i64, start: &str, end: &str, recurrence: &str) -> Task {
    Task {
        id,
        name: format!("task {id}"),
        start: start.to_string(),
        end: end.to_string(),
        recurrence: Some(recurrence.to_string()).filter(|r| !r.is_empty()),
    }
}

fn starts(occurrences: &[Occurrence]) -> Vec<String> {
    occurrences
        .iter()
        .map(|o| o.occurrence_start.to_rfc3339())
        .collect()
}

#[test]
fn test_daily_count_example() {
    let tasks = [task(
        1,
        "2024-01-01T09:00:00+00:00",
        "2024-01-01T10:00:00+00:00",
        "FREQ=DAILY;COUNT=3",
    )];
    let occurrences: Vec<_> = expand(&tasks).unwrap().iter().collect();

    assert_eq!(
        starts(&occurrences),
        [
            "2024-01-01T09:00:00+00:00",
            "2024-01-02T09:00:00+00:00",
            "2024-01-03T09:00:00+00:00"
        ]
    );
    for occurrence in &occurrences {
        assert_eq!(occurrence.task_id, 1);
        assert_eq!(occurrence.title, "task 1");
        assert_eq!(
            occurrence.occurrence_end - occurrence.occurrence_start,
            Duration::hours(1)
        );
        assert!(!occurrence.is_done);
    }
}

#[test]
fn test_empty_recurrence_is_single_occurrence() {
    let tasks = [
        task(1, "2024-05-01T08:00:00+08:00", "2024-05-01T08:45:00+08:00", ""),
        task(2, "2024-05-02T08:00:00+08:00", "2024-05-02T08:00:00+08:00", ""),
    ];
    let occurrences: Vec<_> = expand(&tasks).unwrap().iter().collect();

    assert_eq!(occurrences.len(), 2);
    assert_eq!(occurrences[0].occurrence_start, at("2024-05-01T08:00:00+08:00"));
    assert_eq!(occurrences[0].occurrence_end, at("2024-05-01T08:45:00+08:00"));
    assert_eq!(occurrences[1].occurrence_start, occurrences[1].occurrence_end);
}

#[test]
fn test_count_is_exact_and_duration_preserved() {
    let cases = [
        "FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=7",
        "FREQ=MONTHLY;BYMONTHDAY=15;COUNT=12",
        "FREQ=YEARLY;BYMONTH=2,8;COUNT=5",
        "FREQ=HOURLY;INTERVAL=5;COUNT=20",
        "FREQ=MINUTELY;INTERVAL=90;COUNT=9",
    ];
    for rule in cases {
        let tasks = [task(
            1,
            "2024-01-15T06:30:00+02:00",
            "2024-01-15T07:15:00+02:00",
            rule,
        )];
        let occurrences: Vec<_> = expand(&tasks).unwrap().iter().collect();
        let expected: usize = rule
            .rsplit("COUNT=")
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap();

        assert_eq!(occurrences.len(), expected, "{rule}");
        assert!(occurrences
            .iter()
            .all(|o| o.occurrence_end - o.occurrence_start == Duration::minutes(45)));
        assert!(
            occurrences
                .windows(2)
                .all(|w| w[0].occurrence_start < w[1].occurrence_start),
            "{rule} not strictly increasing"
        );
    }
}

#[test]
fn test_weekly_by_day() {
    let tasks = [task(
        1,
        "2024-01-01T18:00:00+00:00",
        "2024-01-01T19:00:00+00:00",
        "RRULE:FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=6",
    )];
    let occurrences: Vec<_> = expand(&tasks).unwrap().iter().collect();
    assert_eq!(
        starts(&occurrences),
        [
            "2024-01-01T18:00:00+00:00",
            "2024-01-03T18:00:00+00:00",
            "2024-01-05T18:00:00+00:00",
            "2024-01-08T18:00:00+00:00",
            "2024-01-10T18:00:00+00:00",
            "2024-01-12T18:00:00+00:00"
        ]
    );
}

#[test]
fn test_until_bounds_every_start() {
    let tasks = [task(
        1,
        "2024-01-01T09:00:00+00:00",
        "2024-01-01T09:30:00+00:00",
        "FREQ=DAILY;INTERVAL=2;UNTIL=20240110T090000Z",
    )];
    let schedule = TaskSchedule::compile(&tasks[0]).unwrap();
    assert!(schedule.is_bounded());

    let occurrences: Vec<_> = schedule.occurrences().collect();
    let until = at("2024-01-10T09:00:00+00:00");
    assert_eq!(occurrences.len(), 5);
    assert!(occurrences.iter().all(|o| o.occurrence_start <= until));
    assert_eq!(
        occurrences.last().unwrap().occurrence_start,
        at("2024-01-09T09:00:00+00:00")
    );
}

#[test]
fn test_unbounded_rule_is_lazy() {
    let tasks = [task(
        1,
        "2024-01-01T07:00:00+00:00",
        "2024-01-01T07:20:00+00:00",
        "FREQ=DAILY",
    )];
    let schedule = TaskSchedule::compile(&tasks[0]).unwrap();
    assert!(!schedule.is_bounded());

    let first: Vec<_> = expand(&tasks).unwrap().iter().take(400).collect();
    assert_eq!(first.len(), 400);
    assert_eq!(
        first[399].occurrence_start,
        at("2024-01-01T07:00:00+00:00") + Duration::days(399)
    );
}

#[test]
fn test_window_keeps_overlapping_occurrences() {
    let tasks = [
        task(1, "2024-03-01T23:30:00+00:00", "2024-03-02T00:30:00+00:00", "FREQ=DAILY"),
        task(2, "2024-03-03T12:00:00+00:00", "2024-03-03T13:00:00+00:00", ""),
    ];
    let mut occurrences = expand_between(
        &tasks,
        at("2024-03-03T00:00:00+00:00"),
        at("2024-03-04T00:00:00+00:00"),
    )
    .unwrap();

    // The occurrence starting the evening before still overlaps the window.
    assert_eq!(
        starts(&occurrences),
        [
            "2024-03-02T23:30:00+00:00",
            "2024-03-03T23:30:00+00:00",
            "2024-03-03T12:00:00+00:00"
        ]
    );

    sort_chronologically(&mut occurrences);
    assert_eq!(
        occurrences.iter().map(|o| o.task_id).collect::<Vec<_>>(),
        [1, 2, 1]
    );
}

#[test]
fn test_output_keeps_task_order() {
    let tasks = [
        task(7, "2024-06-10T10:00:00+00:00", "2024-06-10T11:00:00+00:00", "FREQ=DAILY;COUNT=2"),
        task(3, "2024-06-01T10:00:00+00:00", "2024-06-01T11:00:00+00:00", "FREQ=DAILY;COUNT=2"),
    ];
    let ids: Vec<_> = expand(&tasks).unwrap().iter().map(|o| o.task_id).collect();
    assert_eq!(ids, [7, 7, 3, 3]);
}

#[test]
fn test_unsupported_frequency_fails_the_batch() {
    let tasks = [
        task(1, "2024-01-01T09:00:00+00:00", "2024-01-01T10:00:00+00:00", "FREQ=DAILY"),
        task(2, "2024-01-01T09:00:00+00:00", "2024-01-01T10:00:00+00:00", "FREQ=BIWEEKLY"),
    ];
    match expand(&tasks) {
        Err(ScheduleError::InvalidRecurrenceRule { task_id, .. }) => assert_eq!(task_id, 2),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("BIWEEKLY accepted"),
    }
}

#[test]
fn test_first_failure_wins() {
    let tasks = [
        task(1, "yesterday", "2024-01-01T10:00:00+00:00", ""),
        task(2, "2024-01-01T09:00:00+00:00", "2024-01-01T10:00:00+00:00", "FREQ=NEVER"),
    ];
    let err = expand(&tasks).err().unwrap();
    assert!(matches!(
        err,
        ScheduleError::MalformedTimestamp { task_id: 1, field: "start", .. }
    ));
    assert_eq!(err.task_id(), 1);
}

#[test]
fn test_occurrence_wire_shape() {
    let tasks = [task(
        5,
        "2024-01-01T09:00:00+08:00",
        "2024-01-01T10:00:00+08:00",
        "",
    )];
    let occurrence = expand(&tasks).unwrap().iter().next().unwrap();
    assert_eq!(
        serde_json::to_value(&occurrence).unwrap(),
        serde_json::json!({
            "task_id": 5,
            "title": "task 5",
            "start": "2024-01-01T09:00:00+08:00",
            "end": "2024-01-01T10:00:00+08:00",
            "isDone": false
        })
    );
}

#[test]
fn test_unsatisfiable_rule_yields_nothing() {
    let tasks = [
        task(1, "2024-01-01T00:00:00+00:00", "2024-01-01T00:01:00+00:00", "FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=30"),
        task(2, "2024-01-01T09:00:00+00:00", "2024-01-01T10:00:00+00:00", "FREQ=DAILY;UNTIL=20231201"),
    ];
    let expansion = expand(&tasks).unwrap();
    assert_eq!(expansion.iter().count(), 0);
    assert!(expansion.schedules().iter().all(|s| s.is_bounded() == (s.task_id() == 2)));
}
