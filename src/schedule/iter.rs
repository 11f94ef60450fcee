//! Lazy start times backed by the `rrule` crate.
//!
//! Task offsets are fixed, so wall-clock arithmetic in a task's offset is
//! the same as UTC arithmetic on its local time. Rules are expanded by
//! [`rrule::RRuleSet`] in UTC over local times, and the task's offset is
//! put back on every result.

use std::fmt;
use std::iter::FusedIterator;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use rrule::RRuleSet;

use super::rule::{RecurrenceSet, RuleError};

type RuleIter<'a> = <&'a RRuleSet as IntoIterator>::IntoIter;

fn stamp(wall: NaiveDateTime) -> String {
    wall.format("%Y%m%dT%H%M%SZ").to_string()
}

/// A recurrence set resolved against a task start and accepted by `rrule`.
pub struct CompiledRule {
    set: RRuleSet,
    anchor: DateTime<FixedOffset>,
    bounded: bool,
    /// No instant can ever be produced (UNTIL before the anchor, or a
    /// BYSETPOS no period can satisfy).
    exhausted: bool,
}

impl CompiledRule {
    /// Anchor `recurrence` at `start` (unless it carries its own DTSTART)
    /// and hand it to `rrule` for validation.
    pub fn new(recurrence: &RecurrenceSet, start: DateTime<FixedOffset>) -> Result<Self, RuleError> {
        let offset = *start.offset();
        let anchor = match &recurrence.dtstart {
            Some(dtstart) => dtstart
                .wall_clock(offset)
                .ok_or_else(|| RuleError::invalid("DTSTART", &format!("{:?}", dtstart)))?,
            None => start.naive_local(),
        };

        let rule = &recurrence.rule;
        let until = match &rule.until {
            Some(until) => Some(
                until
                    .wall_clock_inclusive(offset)
                    .ok_or_else(|| RuleError::invalid("UNTIL", &format!("{:?}", until)))?,
            ),
            None => None,
        };
        // `rrule` refuses an UNTIL before DTSTART; such a rule is simply empty.
        let until_passed = until.is_some_and(|until| until < anchor);

        let mut text = format!(
            "DTSTART:{}\nRRULE:{}",
            stamp(anchor),
            rule.render(until.filter(|_| !until_passed))
        );
        for exdate in &recurrence.exdates {
            let wall = exdate
                .wall_clock(offset)
                .ok_or_else(|| RuleError::invalid("EXDATE", &format!("{:?}", exdate)))?;
            text.push_str("\nEXDATE:");
            text.push_str(&stamp(wall));
        }

        let set = text
            .parse::<RRuleSet>()
            .map_err(|e| RuleError::Rejected(e.to_string()))?;
        let anchor = offset
            .from_local_datetime(&anchor)
            .single()
            .ok_or_else(|| RuleError::invalid("DTSTART", &stamp(anchor)))?;

        Ok(Self {
            set,
            anchor,
            bounded: rule.is_bounded(),
            exhausted: until_passed || !rule.is_satisfiable(),
        })
    }

    /// Whether the rule ends on its own (COUNT or UNTIL).
    pub fn is_bounded(&self) -> bool {
        self.bounded
    }

    /// DTSTART as the rule sees it. Not necessarily the first start: an
    /// anchor the rule does not match is not emitted.
    pub fn anchor(&self) -> DateTime<FixedOffset> {
        self.anchor
    }

    pub fn starts(&self) -> StartTimes<'_> {
        if self.exhausted {
            return StartTimes { inner: Inner::Done };
        }
        StartTimes {
            inner: Inner::Rule {
                iter: (&self.set).into_iter(),
                offset: *self.anchor.offset(),
            },
        }
    }
}

impl fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("anchor", &self.anchor)
            .field("bounded", &self.bounded)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

enum Inner<'a> {
    Once(DateTime<FixedOffset>),
    Rule {
        iter: RuleIter<'a>,
        offset: FixedOffset,
    },
    Done,
}

/// Start times of one task, in chronological order. Fused.
pub struct StartTimes<'a> {
    inner: Inner<'a>,
}

impl StartTimes<'_> {
    /// The single start of a non-recurring task.
    pub fn once(at: DateTime<FixedOffset>) -> Self {
        StartTimes {
            inner: Inner::Once(at),
        }
    }
}

impl Iterator for StartTimes<'_> {
    type Item = DateTime<FixedOffset>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match &mut self.inner {
            Inner::Once(at) => Some(*at),
            Inner::Rule { iter, offset } => iter
                .next()
                .and_then(|utc| offset.from_local_datetime(&utc.naive_utc()).single()),
            Inner::Done => None,
        };
        if next.is_none() || matches!(self.inner, Inner::Once(_)) {
            self.inner = Inner::Done;
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.inner {
            Inner::Once(_) => (1, Some(1)),
            Inner::Rule { .. } => (0, None),
            Inner::Done => (0, Some(0)),
        }
    }
}

impl FusedIterator for StartTimes<'_> {}

impl fmt::Debug for StartTimes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner {
            Inner::Once(_) => "once",
            Inner::Rule { .. } => "rule",
            Inner::Done => "done",
        };
        f.debug_struct("StartTimes").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(rule: &str, start: &str) -> CompiledRule {
        let set: RecurrenceSet = rule.parse().unwrap();
        let start = DateTime::parse_from_rfc3339(start).unwrap();
        CompiledRule::new(&set, start).unwrap()
    }

    fn starts(rule: &str, start: &str, take: usize) -> Vec<String> {
        compile(rule, start)
            .starts()
            .take(take)
            .map(|t| t.to_rfc3339())
            .collect()
    }

    #[test]
    fn test_daily_count() {
        assert_eq!(
            starts("FREQ=DAILY;COUNT=3", "2024-01-01T09:00:00+00:00", 10),
            vec![
                "2024-01-01T09:00:00+00:00",
                "2024-01-02T09:00:00+00:00",
                "2024-01-03T09:00:00+00:00",
            ]
        );
    }

    #[test]
    fn test_offset_is_kept() {
        // 2024-01-02 is a Tuesday.
        assert_eq!(
            starts("FREQ=WEEKLY;INTERVAL=2;COUNT=3", "2024-01-02T18:30:00+08:00", 10),
            vec![
                "2024-01-02T18:30:00+08:00",
                "2024-01-16T18:30:00+08:00",
                "2024-01-30T18:30:00+08:00",
            ]
        );
    }

    #[test]
    fn test_weekly_byday_skips_days_before_anchor() {
        // Anchor on Wednesday; Monday of the same week is before the anchor.
        assert_eq!(
            starts("FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=4", "2024-01-03T07:00:00+00:00", 10),
            vec![
                "2024-01-03T07:00:00+00:00",
                "2024-01-05T07:00:00+00:00",
                "2024-01-08T07:00:00+00:00",
                "2024-01-10T07:00:00+00:00",
            ]
        );
    }

    #[test]
    fn test_anchor_not_matching_rule_is_skipped() {
        // Monday anchor, Tuesday-only rule.
        assert_eq!(
            starts("FREQ=WEEKLY;BYDAY=TU;COUNT=2", "2024-01-01T09:00:00+00:00", 10),
            vec!["2024-01-02T09:00:00+00:00", "2024-01-09T09:00:00+00:00"]
        );
    }

    #[test]
    fn test_monthly_skips_missing_days() {
        assert_eq!(
            starts("FREQ=MONTHLY;COUNT=4", "2024-01-31T12:00:00+00:00", 10),
            vec![
                "2024-01-31T12:00:00+00:00",
                "2024-03-31T12:00:00+00:00",
                "2024-05-31T12:00:00+00:00",
                "2024-07-31T12:00:00+00:00",
            ]
        );
    }

    #[test]
    fn test_monthly_last_friday() {
        assert_eq!(
            starts("FREQ=MONTHLY;BYDAY=-1FR;COUNT=3", "2024-01-01T10:00:00+00:00", 10),
            vec![
                "2024-01-26T10:00:00+00:00",
                "2024-02-23T10:00:00+00:00",
                "2024-03-29T10:00:00+00:00",
            ]
        );
    }

    #[test]
    fn test_last_weekday_with_setpos() {
        assert_eq!(
            starts(
                "FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1;COUNT=2",
                "2024-03-01T17:00:00+00:00",
                10
            ),
            vec!["2024-03-29T17:00:00+00:00", "2024-04-30T17:00:00+00:00"]
        );
    }

    #[test]
    fn test_yearly_by_month_and_ordinal() {
        // Fourth Thursday of November.
        assert_eq!(
            starts("FREQ=YEARLY;BYMONTH=11;BYDAY=4TH;COUNT=2", "2024-01-01T12:00:00+00:00", 10),
            vec!["2024-11-28T12:00:00+00:00", "2025-11-27T12:00:00+00:00"]
        );
    }

    #[test]
    fn test_until_is_inclusive() {
        assert_eq!(
            starts("FREQ=DAILY;UNTIL=20240103T090000Z", "2024-01-01T09:00:00+00:00", 10),
            vec![
                "2024-01-01T09:00:00+00:00",
                "2024-01-02T09:00:00+00:00",
                "2024-01-03T09:00:00+00:00",
            ]
        );
        assert_eq!(
            starts("FREQ=DAILY;UNTIL=20240102", "2024-01-01T09:00:00+00:00", 10).len(),
            2
        );
    }

    #[test]
    fn test_utc_until_moves_to_task_offset() {
        // 01:00Z on the 3rd is 09:00 in +08:00, so the 3rd is included.
        assert_eq!(
            starts("FREQ=DAILY;UNTIL=20240103T010000Z", "2024-01-01T09:00:00+08:00", 10).len(),
            3
        );
    }

    #[test]
    fn test_until_before_anchor_is_empty() {
        let rule = compile("FREQ=DAILY;UNTIL=20231231", "2024-01-01T09:00:00+00:00");
        assert!(rule.is_bounded());
        assert_eq!(rule.starts().next(), None);
    }

    #[test]
    fn test_hourly_with_day_filter() {
        assert_eq!(
            starts(
                "FREQ=HOURLY;INTERVAL=6;BYDAY=SA;COUNT=5",
                "2024-01-05T22:00:00+00:00",
                10
            ),
            vec![
                "2024-01-06T04:00:00+00:00",
                "2024-01-06T10:00:00+00:00",
                "2024-01-06T16:00:00+00:00",
                "2024-01-06T22:00:00+00:00",
                "2024-01-13T04:00:00+00:00",
            ]
        );
    }

    #[test]
    fn test_minutely_and_secondly() {
        assert_eq!(
            starts("FREQ=MINUTELY;INTERVAL=15;COUNT=3", "2024-01-01T23:40:00+00:00", 10),
            vec![
                "2024-01-01T23:40:00+00:00",
                "2024-01-01T23:55:00+00:00",
                "2024-01-02T00:10:00+00:00",
            ]
        );
        assert_eq!(
            starts("FREQ=SECONDLY;INTERVAL=30", "2024-01-01T00:00:00+00:00", 3),
            vec![
                "2024-01-01T00:00:00+00:00",
                "2024-01-01T00:00:30+00:00",
                "2024-01-01T00:01:00+00:00",
            ]
        );
    }

    #[test]
    fn test_dtstart_and_exdate() {
        let rule = "DTSTART:20240110T010000Z\nRRULE:FREQ=DAILY;COUNT=4\nEXDATE:20240111T010000Z";
        assert_eq!(
            starts(rule, "2024-01-01T09:00:00+08:00", 10),
            vec![
                "2024-01-10T09:00:00+08:00",
                "2024-01-12T09:00:00+08:00",
                "2024-01-13T09:00:00+08:00",
            ]
        );
        assert_eq!(
            compile(rule, "2024-01-01T09:00:00+08:00").anchor().to_rfc3339(),
            "2024-01-10T09:00:00+08:00"
        );
    }

    #[test]
    fn test_sub_daily_setpos_past_one_never_spins() {
        let set: RecurrenceSet = "FREQ=SECONDLY;BYDAY=MO,TU,WE,TH,FR,SA,SU;BYSETPOS=2;COUNT=1"
            .parse()
            .unwrap();
        let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap();
        match CompiledRule::new(&set, start) {
            Ok(rule) => {
                let mut times = rule.starts();
                assert_eq!(times.size_hint(), (0, Some(0)));
                assert_eq!(times.next(), None);
            }
            Err(err) => assert!(matches!(err, RuleError::Rejected(_))),
        }
    }

    #[test]
    fn test_library_rejections_are_typed() {
        let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap();
        for rule in ["FREQ=YEARLY;BYMONTH=13", "FREQ=MONTHLY;BYMONTHDAY=32", "FREQ=WEEKLY;BYDAY=XX"] {
            let set: RecurrenceSet = rule.parse().unwrap();
            assert!(
                matches!(CompiledRule::new(&set, start), Err(RuleError::Rejected(_))),
                "{rule} should be rejected"
            );
        }
    }

    #[test]
    fn test_unbounded_rule_is_lazy() {
        let rule = compile("FREQ=DAILY", "2024-01-01T00:00:00+00:00");
        assert!(!rule.is_bounded());
        let mut times = rule.starts();
        assert_eq!(times.size_hint(), (0, None));
        assert_eq!(times.nth(999).unwrap().to_rfc3339(), "2026-09-26T00:00:00+00:00");
    }

    #[test]
    fn test_once() {
        let at = DateTime::parse_from_rfc3339("2024-01-01T09:00:00+00:00").unwrap();
        let mut times = StartTimes::once(at);
        assert_eq!(times.size_hint(), (1, Some(1)));
        assert_eq!(times.next(), Some(at));
        assert_eq!(times.next(), None);
        assert_eq!(times.next(), None);
    }
}
