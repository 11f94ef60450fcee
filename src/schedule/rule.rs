//! Recurrence strings as stored on tasks.
//!
//! A recurrence string is either a bare rule (`FREQ=DAILY;COUNT=3`), a rule
//! with its property name (`RRULE:FREQ=DAILY`), or a small block of content
//! lines carrying `DTSTART`, `RRULE` and `EXDATE`.
//!
//! Only the parts that decide bounds and time handling (`FREQ`, `COUNT`,
//! `UNTIL`) are read here. Every other part is checked against the
//! supported set and passed through to [`rrule`], which validates and
//! expands it.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Errors raised while parsing a recurrence string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("no RRULE found")]
    MissingRule,

    #[error("FREQ is required")]
    MissingFrequency,

    #[error("unsupported frequency `{0}`")]
    UnknownFrequency(String),

    #[error("unsupported rule part `{0}`")]
    UnknownPart(String),

    #[error("rule part `{0}` given more than once")]
    DuplicatePart(String),

    #[error("malformed rule part `{0}` (expected NAME=VALUE)")]
    MalformedPart(String),

    #[error("invalid {part} value `{value}`")]
    InvalidValue { part: String, value: String },

    #[error("COUNT and UNTIL cannot be combined")]
    CountWithUntil,

    #[error("BYDAY ordinals are only valid with MONTHLY or YEARLY frequency")]
    OrdinalNotAllowed,

    #[error("unsupported property `{0}`")]
    UnsupportedProperty(String),

    #[error("property `{0}` given more than once")]
    DuplicateProperty(String),

    #[error("time zone identifiers are not supported (TZID={0})")]
    UnsupportedTimeZone(String),

    #[error("unsupported parameter `{0}`")]
    UnsupportedParameter(String),

    /// Refused by the `rrule` validator (ranges, BYSETPOS without a BY* part, ...).
    #[error("{0}")]
    Rejected(String),
}

impl RuleError {
    pub(crate) fn invalid(part: &str, value: &str) -> Self {
        RuleError::InvalidValue {
            part: part.to_string(),
            value: value.to_string(),
        }
    }
}

/// Recurrence frequency (`FREQ`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yearly => "YEARLY",
            Self::Monthly => "MONTHLY",
            Self::Weekly => "WEEKLY",
            Self::Daily => "DAILY",
            Self::Hourly => "HOURLY",
            Self::Minutely => "MINUTELY",
            Self::Secondly => "SECONDLY",
        }
    }

    /// Hourly, minutely and secondly periods hold a single candidate instant.
    pub fn is_sub_daily(&self) -> bool {
        matches!(self, Self::Hourly | Self::Minutely | Self::Secondly)
    }
}

impl FromStr for Frequency {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "YEARLY" => Ok(Self::Yearly),
            "MONTHLY" => Ok(Self::Monthly),
            "WEEKLY" => Ok(Self::Weekly),
            "DAILY" => Ok(Self::Daily),
            "HOURLY" => Ok(Self::Hourly),
            "MINUTELY" => Ok(Self::Minutely),
            "SECONDLY" => Ok(Self::Secondly),
            _ => Err(RuleError::UnknownFrequency(s.to_string())),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A date or date-time value as written in a recurrence string.
///
/// Floating values carry no offset and are read as wall time in the
/// offset of the task being expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTime {
    Utc(NaiveDateTime),
    Floating(NaiveDateTime),
    Date(NaiveDate),
}

impl RuleTime {
    fn parse(part: &str, value: &str) -> Result<Self, RuleError> {
        let value = value.trim();
        if value.len() == 8 {
            return NaiveDate::parse_from_str(value, "%Y%m%d")
                .map(RuleTime::Date)
                .map_err(|_| RuleError::invalid(part, value));
        }
        let (body, utc) = match value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
            Some(body) => (body, true),
            None => (value, false),
        };
        let naive = NaiveDateTime::parse_from_str(body, "%Y%m%dT%H%M%S")
            .map_err(|_| RuleError::invalid(part, value))?;
        Ok(if utc {
            RuleTime::Utc(naive)
        } else {
            RuleTime::Floating(naive)
        })
    }

    /// Local time in `offset`. A bare date is the start of that day.
    pub fn wall_clock(&self, offset: FixedOffset) -> Option<NaiveDateTime> {
        match self {
            RuleTime::Utc(naive) => Some(naive.and_utc().with_timezone(&offset).naive_local()),
            RuleTime::Floating(naive) => Some(*naive),
            RuleTime::Date(date) => date.and_hms_opt(0, 0, 0),
        }
    }

    /// Like [`RuleTime::wall_clock`], but a bare date covers the whole day.
    pub fn wall_clock_inclusive(&self, offset: FixedOffset) -> Option<NaiveDateTime> {
        match self {
            RuleTime::Date(date) => date.and_hms_opt(23, 59, 59),
            other => other.wall_clock(offset),
        }
    }

    /// The absolute instant, reading floating values in `offset`.
    pub fn resolve(&self, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        self.wall_clock(offset)?
            .and_local_timezone(offset)
            .single()
    }
}

/// Part names accepted besides `FREQ`, `COUNT` and `UNTIL`.
const PASS_THROUGH: &[&str] = &["INTERVAL", "BYDAY", "BYMONTHDAY", "BYMONTH", "BYSETPOS", "WKST"];

/// A checked `RRULE` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub count: Option<u32>,
    pub until: Option<RuleTime>,
    /// Remaining parts in input order, upper-cased.
    parts: Vec<(String, String)>,
}

impl RecurrenceRule {
    /// Whether the rule ends on its own (COUNT or UNTIL).
    pub fn is_bounded(&self) -> bool {
        self.count.is_some() || self.until.is_some()
    }

    pub fn part(&self, name: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// False when no period can ever hold a selected instant. A sub-daily
    /// period has one candidate, so BYSETPOS must allow position 1 or -1.
    pub fn is_satisfiable(&self) -> bool {
        if !self.frequency.is_sub_daily() {
            return true;
        }
        match self.part("BYSETPOS") {
            None => true,
            Some(list) => list
                .split(',')
                .any(|pos| matches!(pos.trim().parse::<i32>(), Ok(1) | Ok(-1))),
        }
    }

    /// Rule text for `rrule`, with UNTIL replaced by `until` (a wall-clock
    /// time written as UTC).
    pub(crate) fn render(&self, until: Option<NaiveDateTime>) -> String {
        let mut text = format!("FREQ={}", self.frequency);
        if let Some(count) = self.count {
            text.push_str(&format!(";COUNT={}", count));
        }
        if let Some(until) = until {
            text.push_str(&format!(";UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
        }
        for (name, value) in &self.parts {
            text.push_str(&format!(";{}={}", name, value));
        }
        text
    }
}

impl FromStr for RecurrenceRule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim();
        let body = match body.split_once(':') {
            Some((name, value)) if name.trim().eq_ignore_ascii_case("RRULE") => value,
            _ => body,
        };

        let mut seen: Vec<String> = Vec::new();
        let mut frequency = None;
        let mut count = None;
        let mut until = None;
        let mut parts = Vec::new();

        for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| RuleError::MalformedPart(part.to_string()))?;
            let name = name.trim().to_ascii_uppercase();
            let value = value.trim();
            if seen.contains(&name) {
                return Err(RuleError::DuplicatePart(name));
            }

            match name.as_str() {
                "FREQ" => frequency = Some(value.parse::<Frequency>()?),
                "COUNT" => {
                    count = Some(
                        value
                            .parse::<u32>()
                            .ok()
                            .filter(|n| *n >= 1)
                            .ok_or_else(|| RuleError::invalid("COUNT", value))?,
                    )
                }
                "UNTIL" => until = Some(RuleTime::parse("UNTIL", value)?),
                "INTERVAL" if !matches!(value.parse::<u16>(), Ok(n) if n >= 1) => {
                    return Err(RuleError::invalid("INTERVAL", value))
                }
                _ if PASS_THROUGH.contains(&name.as_str()) => {
                    if value.is_empty() {
                        return Err(RuleError::invalid(&name, value));
                    }
                    parts.push((name.clone(), value.to_ascii_uppercase()));
                }
                _ => return Err(RuleError::UnknownPart(name)),
            }
            seen.push(name);
        }

        let rule = RecurrenceRule {
            frequency: frequency.ok_or(RuleError::MissingFrequency)?,
            count,
            until,
            parts,
        };

        if rule.count.is_some() && rule.until.is_some() {
            return Err(RuleError::CountWithUntil);
        }
        // A BYDAY entry longer than a weekday code carries an ordinal.
        let ordinals_allowed = matches!(rule.frequency, Frequency::Monthly | Frequency::Yearly);
        let has_ordinal = rule
            .part("BYDAY")
            .is_some_and(|days| days.split(',').any(|d| d.trim().len() > 2));
        if has_ordinal && !ordinals_allowed {
            return Err(RuleError::OrdinalNotAllowed);
        }

        Ok(rule)
    }
}

/// A full recurrence definition: optional anchor override, one rule and
/// any excluded start times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceSet {
    pub dtstart: Option<RuleTime>,
    pub rule: RecurrenceRule,
    pub exdates: Vec<RuleTime>,
}

impl FromStr for RecurrenceSet {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut dtstart = None;
        let mut rule = None;
        let mut exdates = Vec::new();

        for line in s.lines().map(str::trim).filter(|l| !l.is_empty()) {
            // A bare rule with no property name.
            let Some((head, value)) = line.split_once(':') else {
                if rule.is_some() {
                    return Err(RuleError::DuplicateProperty("RRULE".to_string()));
                }
                rule = Some(line.parse::<RecurrenceRule>()?);
                continue;
            };

            let mut params = head.split(';');
            let name = params.next().unwrap_or_default().trim().to_ascii_uppercase();
            let date_only = parse_value_params(params)?;

            match name.as_str() {
                "RRULE" => {
                    if rule.is_some() {
                        return Err(RuleError::DuplicateProperty(name));
                    }
                    rule = Some(value.parse::<RecurrenceRule>()?);
                }
                "DTSTART" => {
                    if dtstart.is_some() {
                        return Err(RuleError::DuplicateProperty(name));
                    }
                    dtstart = Some(parse_property_time("DTSTART", value, date_only)?);
                }
                "EXDATE" => {
                    for item in value.split(',').map(str::trim).filter(|v| !v.is_empty()) {
                        exdates.push(parse_property_time("EXDATE", item, date_only)?);
                    }
                }
                _ => return Err(RuleError::UnsupportedProperty(name)),
            }
        }

        Ok(Self {
            dtstart,
            rule: rule.ok_or(RuleError::MissingRule)?,
            exdates,
        })
    }
}

/// Returns true when the parameters declare `VALUE=DATE`.
fn parse_value_params<'a>(params: impl Iterator<Item = &'a str>) -> Result<bool, RuleError> {
    let mut date_only = false;
    for param in params.map(str::trim).filter(|p| !p.is_empty()) {
        let (key, val) = param
            .split_once('=')
            .ok_or_else(|| RuleError::UnsupportedParameter(param.to_string()))?;
        match key.trim().to_ascii_uppercase().as_str() {
            "TZID" => return Err(RuleError::UnsupportedTimeZone(val.to_string())),
            "VALUE" if val.eq_ignore_ascii_case("DATE") => date_only = true,
            "VALUE" if val.eq_ignore_ascii_case("DATE-TIME") => {}
            _ => return Err(RuleError::UnsupportedParameter(param.to_string())),
        }
    }
    Ok(date_only)
}

fn parse_property_time(part: &str, value: &str, date_only: bool) -> Result<RuleTime, RuleError> {
    let time = RuleTime::parse(part, value)?;
    if date_only && !matches!(time, RuleTime::Date(_)) {
        return Err(RuleError::invalid(part, value));
    }
    Ok(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_rule() {
        let rule: RecurrenceRule = "FREQ=DAILY;COUNT=3".parse().unwrap();
        assert_eq!(rule.frequency, Frequency::Daily);
        assert_eq!(rule.count, Some(3));
        assert!(rule.is_bounded());
        assert_eq!(rule.render(None), "FREQ=DAILY;COUNT=3");
    }

    #[test]
    fn test_parse_prefixed_and_lowercase() {
        let rule: RecurrenceRule = "RRULE:freq=weekly;interval=2;byday=mo,we,fr".parse().unwrap();
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.part("INTERVAL"), Some("2"));
        assert_eq!(rule.part("BYDAY"), Some("MO,WE,FR"));
        assert!(!rule.is_bounded());
        assert_eq!(rule.render(None), "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE,FR");
    }

    #[test]
    fn test_render_rewrites_until() {
        let rule: RecurrenceRule = "FREQ=DAILY;UNTIL=20240105T090000Z;BYMONTH=1".parse().unwrap();
        let wall = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap();
        assert_eq!(
            rule.render(Some(wall)),
            "FREQ=DAILY;UNTIL=20240105T170000Z;BYMONTH=1"
        );
    }

    #[test]
    fn test_unknown_frequency_rejected() {
        assert_eq!(
            "FREQ=BIWEEKLY".parse::<RecurrenceRule>(),
            Err(RuleError::UnknownFrequency("BIWEEKLY".to_string()))
        );
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(
            "COUNT=3".parse::<RecurrenceRule>(),
            Err(RuleError::MissingFrequency)
        );
        assert_eq!(
            "FREQ=DAILY;FREQ=WEEKLY".parse::<RecurrenceRule>(),
            Err(RuleError::DuplicatePart("FREQ".to_string()))
        );
        assert_eq!(
            "FREQ=DAILY;BYHOUR=9".parse::<RecurrenceRule>(),
            Err(RuleError::UnknownPart("BYHOUR".to_string()))
        );
        assert_eq!(
            "FREQ=DAILY;COUNT".parse::<RecurrenceRule>(),
            Err(RuleError::MalformedPart("COUNT".to_string()))
        );
        assert_eq!(
            "FREQ=DAILY;COUNT=2;UNTIL=20240110".parse::<RecurrenceRule>(),
            Err(RuleError::CountWithUntil)
        );
        assert_eq!(
            "FREQ=WEEKLY;BYDAY=1MO".parse::<RecurrenceRule>(),
            Err(RuleError::OrdinalNotAllowed)
        );
        assert!("FREQ=MONTHLY;BYDAY=-1FR".parse::<RecurrenceRule>().is_ok());
    }

    #[test]
    fn test_locally_checked_values() {
        for bad in [
            "FREQ=DAILY;INTERVAL=0",
            "FREQ=DAILY;INTERVAL=soon",
            "FREQ=DAILY;COUNT=0",
            "FREQ=DAILY;COUNT=-1",
            "FREQ=DAILY;BYDAY=",
            "FREQ=DAILY;UNTIL=tomorrow",
        ] {
            assert!(
                matches!(bad.parse::<RecurrenceRule>(), Err(RuleError::InvalidValue { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_sub_daily_setpos_satisfiability() {
        let rule = |text: &str| text.parse::<RecurrenceRule>().unwrap();
        assert!(rule("FREQ=SECONDLY").is_satisfiable());
        assert!(rule("FREQ=HOURLY;BYDAY=MO;BYSETPOS=-1").is_satisfiable());
        assert!(!rule("FREQ=SECONDLY;BYDAY=MO;BYSETPOS=2").is_satisfiable());
        assert!(!rule("FREQ=MINUTELY;BYMONTH=1;BYSETPOS=3,-2").is_satisfiable());
        assert!(rule("FREQ=MONTHLY;BYDAY=MO,FR;BYSETPOS=2").is_satisfiable());
    }

    #[test]
    fn test_until_forms() {
        let rule: RecurrenceRule = "FREQ=DAILY;UNTIL=20240105T090000Z".parse().unwrap();
        assert!(matches!(rule.until, Some(RuleTime::Utc(_))));
        let rule: RecurrenceRule = "FREQ=DAILY;UNTIL=20240105T090000".parse().unwrap();
        assert!(matches!(rule.until, Some(RuleTime::Floating(_))));
        let rule: RecurrenceRule = "FREQ=DAILY;UNTIL=20240105".parse().unwrap();
        assert!(matches!(rule.until, Some(RuleTime::Date(_))));
    }

    #[test]
    fn test_rule_time_wall_clock() {
        let taipei = FixedOffset::east_opt(8 * 3600).unwrap();
        let utc = RuleTime::parse("UNTIL", "20240105T010000Z").unwrap();
        assert_eq!(
            utc.resolve(taipei).unwrap().to_rfc3339(),
            "2024-01-05T09:00:00+08:00"
        );
        let floating = RuleTime::parse("UNTIL", "20240105T010000").unwrap();
        assert_eq!(
            floating.resolve(taipei).unwrap().to_rfc3339(),
            "2024-01-05T01:00:00+08:00"
        );
        let date = RuleTime::parse("UNTIL", "20240105").unwrap();
        assert_eq!(
            date.wall_clock_inclusive(taipei).unwrap().to_string(),
            "2024-01-05 23:59:59"
        );
        assert_eq!(
            date.wall_clock(taipei).unwrap().to_string(),
            "2024-01-05 00:00:00"
        );
    }

    #[test]
    fn test_parse_recurrence_set() {
        let set: RecurrenceSet = "DTSTART:20240101T090000Z\nRRULE:FREQ=DAILY;COUNT=5\nEXDATE:20240102T090000Z,20240103T090000Z"
            .parse()
            .unwrap();
        assert!(matches!(set.dtstart, Some(RuleTime::Utc(_))));
        assert_eq!(set.rule.count, Some(5));
        assert_eq!(set.exdates.len(), 2);
    }

    #[test]
    fn test_bare_rule_is_a_set() {
        let set: RecurrenceSet = "FREQ=WEEKLY;BYDAY=TU".parse().unwrap();
        assert_eq!(set.dtstart, None);
        assert_eq!(set.rule.frequency, Frequency::Weekly);
    }

    #[test]
    fn test_recurrence_set_errors() {
        assert_eq!(
            "DTSTART:20240101T090000Z".parse::<RecurrenceSet>(),
            Err(RuleError::MissingRule)
        );
        assert_eq!(
            "RRULE:FREQ=DAILY\nRRULE:FREQ=WEEKLY".parse::<RecurrenceSet>(),
            Err(RuleError::DuplicateProperty("RRULE".to_string()))
        );
        assert_eq!(
            "DTSTART;TZID=Asia/Taipei:20240101T090000\nRRULE:FREQ=DAILY".parse::<RecurrenceSet>(),
            Err(RuleError::UnsupportedTimeZone("Asia/Taipei".to_string()))
        );
        assert_eq!(
            "RDATE:20240101T090000Z\nRRULE:FREQ=DAILY".parse::<RecurrenceSet>(),
            Err(RuleError::UnsupportedProperty("RDATE".to_string()))
        );
        assert!(matches!(
            "DTSTART;VALUE=DATE:20240101T090000\nRRULE:FREQ=DAILY".parse::<RecurrenceSet>(),
            Err(RuleError::InvalidValue { .. })
        ));
    }
}
