//! §4.A Schedule parser: parses the optional `spec.schedule` field
//! (`"every <N><unit>"`) into a period in seconds, and computes the next
//! fire time for a dataset given its current `scheduled_for`.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use thiserror::Error;

/// One failure mode of `parse_schedule`. `Display` renders the exact
/// wording the HTTP/upload layer surfaces to callers — preserved
/// verbatim from the original `flowmanager.schedules.parse_schedule`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Schedule should be a string")]
    NotAString,
    #[error("Schedule should start with 'every'")]
    MissingEveryPrefix,
    #[error("Bad time unit for schedule, only s/m/h/d/w are allowed")]
    BadUnit,
    #[error("Failed to parse time number")]
    BadNumber,
    #[error("Can't schedule tasks for less than one minute")]
    TooFrequent,
}

const PREFIX: &str = "every ";

fn unit_multiplier(unit: char) -> Option<i64> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(3600),
        'd' => Some(86_400),
        'w' => Some(7 * 86_400),
        _ => None,
    }
}

/// Parses a `schedule` string of the form `"every <N><unit>"`. Returns
/// `(period_seconds, errors)`: on success `errors` is empty and
/// `period_seconds` is `Some`; on failure `period_seconds` is `None` and
/// `errors` holds exactly one message.
fn parse_schedule_str(schedule: &str) -> (Option<i64>, Vec<String>) {
    let trimmed = schedule.trim();
    let Some(rest) = trimmed.strip_prefix(PREFIX) else {
        return (None, vec![ScheduleError::MissingEveryPrefix.to_string()]);
    };
    let Some(unit_char) = rest.chars().last() else {
        return (None, vec![ScheduleError::BadUnit.to_string()]);
    };
    let Some(multiplier) = unit_multiplier(unit_char) else {
        return (None, vec![ScheduleError::BadUnit.to_string()]);
    };
    let number_part = &rest[..rest.len() - unit_char.len_utf8()];
    let Ok(amount) = number_part.parse::<i64>() else {
        return (None, vec![ScheduleError::BadNumber.to_string()]);
    };
    let period = amount * multiplier;
    if period < 60 {
        return (None, vec![ScheduleError::TooFrequent.to_string()]);
    }
    (Some(period), vec![])
}

/// Parses the `schedule` field out of a spec's top-level JSON value.
/// Absent or `null` yields `(None, [])`; present-but-wrong-type yields
/// the "Schedule should be a string" error.
pub fn parse_schedule(spec: &Value) -> (Option<i64>, Vec<String>) {
    match spec.get("schedule") {
        None | Some(Value::Null) => (None, vec![]),
        Some(Value::String(s)) => parse_schedule_str(s),
        Some(_) => (None, vec![ScheduleError::NotAString.to_string()]),
    }
}

/// §4.A `calculate_new_schedule`: advances `current` by whole multiples
/// of `period` until it is no longer behind `now`. When `current` is
/// `None`, the first fire time is `now + period`. When `period` is
/// `None`, scheduling is disabled and the result is always `None`.
pub fn calculate_new_schedule(
    current: Option<DateTime<Utc>>,
    period_seconds: Option<i64>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let period = period_seconds?;
    let Some(current) = current else {
        return Some(now + Duration::seconds(period));
    };
    if current >= now {
        return Some(current);
    }
    let diff = (now - current).num_seconds();
    let whole_periods = diff / period;
    let mut advanced = current + Duration::seconds(whole_periods * period);
    while advanced < now {
        advanced += Duration::seconds(period);
    }
    Some(advanced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn every_60s_parses() {
        assert_eq!(parse_schedule(&json!({"schedule": "every 60s"})), (Some(60), vec![]));
    }

    #[test]
    fn every_1s_too_frequent() {
        let (period, errors) = parse_schedule(&json!({"schedule": "every 1s"}));
        assert_eq!(period, None);
        assert_eq!(errors, vec!["Can't schedule tasks for less than one minute"]);
    }

    #[test]
    fn bad_unit() {
        let (period, errors) = parse_schedule(&json!({"schedule": "every 6z"}));
        assert_eq!(period, None);
        assert_eq!(errors, vec!["Bad time unit for schedule, only s/m/h/d/w are allowed"]);
    }

    #[test]
    fn bad_number() {
        let (period, errors) = parse_schedule(&json!({"schedule": "every 4.2w"}));
        assert_eq!(period, None);
        assert_eq!(errors, vec!["Failed to parse time number"]);
    }

    #[test]
    fn non_string_schedule() {
        let (period, errors) = parse_schedule(&json!({"schedule": 45454}));
        assert_eq!(period, None);
        assert_eq!(errors, vec!["Schedule should be a string"]);
    }

    #[test]
    fn absent_schedule() {
        assert_eq!(parse_schedule(&json!({})), (None, vec![]));
        assert_eq!(parse_schedule(&json!({"schedule": null})), (None, vec![]));
    }

    #[test]
    fn advance_behind_schedule() {
        assert_eq!(calculate_new_schedule(Some(ts(999)), Some(60), ts(1000)), Some(ts(1059)));
        assert_eq!(calculate_new_schedule(Some(ts(10)), Some(60), ts(1000)), Some(ts(1030)));
    }

    #[test]
    fn preserves_future_schedule() {
        assert_eq!(calculate_new_schedule(Some(ts(1001)), Some(60), ts(1000)), Some(ts(1001)));
    }

    #[test]
    fn first_schedule_from_now() {
        assert_eq!(calculate_new_schedule(None, Some(60), ts(1000)), Some(ts(1060)));
    }

    #[test]
    fn no_period_disables_schedule() {
        assert_eq!(calculate_new_schedule(Some(ts(5)), None, ts(1000)), None);
        assert_eq!(calculate_new_schedule(None, None, ts(1000)), None);
    }
}
