//! ABOUTME: Five-field cron expression parsing and next-fire-time computation
//! ABOUTME: Shared by job validation (at creation time) and the scheduler engine (at dispatch time)

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Errors raised while parsing a cron field or expression.
///
/// Job creation is the only place these are ever surfaced: a trigger that
/// fails to parse is rejected before it is persisted, never at firing time.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CronError {
    #[error("cron field '{field}' is empty")]
    EmptyField { field: &'static str },

    #[error("cron field '{field}' has step 0 in '{raw}'")]
    ZeroStep { field: &'static str, raw: String },

    #[error("cron field '{field}' has an inverted range '{raw}' ({start} > {end})")]
    InvertedRange {
        field: &'static str,
        raw: String,
        start: u32,
        end: u32,
    },

    #[error("cron field '{field}' value {value} is out of range {min}..={max} in '{raw}'")]
    OutOfRange {
        field: &'static str,
        raw: String,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("cron field '{field}' could not parse '{raw}'")]
    Malformed { field: &'static str, raw: String },

    #[error("cron field '{field}' has no values it could ever match")]
    Unsatisfiable { field: &'static str },
}

/// One of the five cron fields. Each carries its valid numeric bounds so that a
/// `*` and an exhaustive list are indistinguishable once parsed, except for the
/// day/day-of-week OR rule, which needs to know whether a field was restricted
/// at all (`*` is never "restricted").
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: &'static str,
    min: u32,
    max: u32,
    /// `None` means unrestricted (`*`): every value in range matches.
    values: Option<BTreeSet<u32>>,
}

impl Field {
    fn star(name: &'static str, min: u32, max: u32) -> Self {
        Self {
            name,
            min,
            max,
            values: None,
        }
    }

    fn is_restricted(&self) -> bool {
        self.values.is_some()
    }

    fn matches(&self, value: u32) -> bool {
        match &self.values {
            None => true,
            Some(set) => set.contains(&value),
        }
    }

    /// Smallest matching value `>= from`, if any exists within the field's bound.
    fn next_matching(&self, from: u32) -> Option<u32> {
        match &self.values {
            None => {
                if from <= self.max {
                    Some(from.max(self.min))
                } else {
                    None
                }
            }
            Some(set) => set.range(from..).next().copied(),
        }
    }

    fn smallest(&self) -> u32 {
        match &self.values {
            None => self.min,
            Some(set) => *set.iter().next().expect("validated non-empty"),
        }
    }

    fn parse(name: &'static str, raw: &str, min: u32, max: u32) -> Result<Self, CronError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CronError::EmptyField { field: name });
        }
        if raw == "*" {
            return Ok(Self::star(name, min, max));
        }

        let mut values = BTreeSet::new();
        for part in raw.split(',') {
            Self::parse_part(name, part, raw, min, max, &mut values)?;
        }
        if values.is_empty() {
            return Err(CronError::Unsatisfiable { field: name });
        }
        Ok(Self {
            name,
            min,
            max,
            values: Some(values),
        })
    }

    fn parse_part(
        name: &'static str,
        part: &str,
        raw: &str,
        min: u32,
        max: u32,
        out: &mut BTreeSet<u32>,
    ) -> Result<(), CronError> {
        let part = part.trim();
        if part.is_empty() {
            return Err(CronError::Malformed {
                field: name,
                raw: raw.to_string(),
            });
        }

        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s.parse().map_err(|_| CronError::Malformed {
                    field: name,
                    raw: raw.to_string(),
                })?;
                if step == 0 {
                    return Err(CronError::ZeroStep {
                        field: name,
                        raw: raw.to_string(),
                    });
                }
                (r, step)
            }
            None => (part, 1),
        };

        let (start, end) = if range_part == "*" {
            (min, max)
        } else if let Some((s, e)) = range_part.split_once('-') {
            let start: u32 = s.parse().map_err(|_| CronError::Malformed {
                field: name,
                raw: raw.to_string(),
            })?;
            let end: u32 = e.parse().map_err(|_| CronError::Malformed {
                field: name,
                raw: raw.to_string(),
            })?;
            if start > end {
                return Err(CronError::InvertedRange {
                    field: name,
                    raw: raw.to_string(),
                    start,
                    end,
                });
            }
            (start, end)
        } else {
            let value: u32 = range_part.parse().map_err(|_| CronError::Malformed {
                field: name,
                raw: raw.to_string(),
            })?;
            (value, value)
        };

        for value in (start..=end).step_by(step as usize) {
            if value < min || value > max {
                return Err(CronError::OutOfRange {
                    field: name,
                    raw: raw.to_string(),
                    value,
                    min,
                    max,
                });
            }
            out.insert(value);
        }
        Ok(())
    }
}

/// A parsed, validated 5-field cron expression bound to no particular timezone.
///
/// Fields are `minute hour day month day_of_week`, matching a job's stored
/// trigger columns. `day_of_week` follows the conventional cron numbering:
/// `0` = Sunday .. `6` = Saturday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minute: Field,
    hour: Field,
    day: Field,
    month: Field,
    day_of_week: Field,
}

/// How far into the future `next_after` will search before giving up.
/// 5 years of headroom covers expressions like `day=31` combined with
/// `month=2`, which only match in leap-adjacent years.
const SEARCH_HORIZON_DAYS: i64 = 5 * 366;

impl CronSchedule {
    /// Parse the five individual fields (as used by job creation requests that
    /// supply `month`/`day`/`day_of_week`/`hour`/`minute` independently).
    pub fn from_fields(
        minute: &str,
        hour: &str,
        day: &str,
        month: &str,
        day_of_week: &str,
    ) -> Result<Self, CronError> {
        Ok(Self {
            minute: Field::parse("minute", minute, 0, 59)?,
            hour: Field::parse("hour", hour, 0, 23)?,
            day: Field::parse("day", day, 1, 31)?,
            month: Field::parse("month", month, 1, 12)?,
            day_of_week: Field::parse("day_of_week", day_of_week, 0, 6)?,
        })
    }

    /// Parse a single space-separated `minute hour day month day_of_week` string.
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::Malformed {
                field: "expression",
                raw: expr.to_string(),
            });
        }
        Self::from_fields(fields[0], fields[1], fields[2], fields[3], fields[4])
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let day_restricted = self.day.is_restricted();
        let dow_restricted = self.day_of_week.is_restricted();
        let day_ok = self.day.matches(date.day());
        let dow = weekday_number(date.weekday());
        let dow_ok = self.day_of_week.matches(dow);

        match (day_restricted, dow_restricted) {
            (false, false) => true,
            (true, false) => day_ok,
            (false, true) => dow_ok,
            // Classical cron OR semantics: either restriction satisfies the day.
            (true, true) => day_ok || dow_ok,
        }
    }

    /// Smallest instant strictly greater than `after` (interpreted in `tz`)
    /// that matches every field, or `None` if nothing matches within the
    /// search horizon.
    pub fn next_after(&self, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local_after = after.with_timezone(&tz);
        let mut candidate = (local_after + Duration::minutes(1))
            .date_naive()
            .and_hms_opt(local_after.hour(), local_after.minute(), 0)
            .unwrap();
        let horizon = local_after.date_naive() + Duration::days(SEARCH_HORIZON_DAYS);

        loop {
            if candidate.date() > horizon {
                return None;
            }

            if !self.month.matches(candidate.month()) {
                candidate = advance_to_next_month(candidate);
                continue;
            }

            if !self.day_matches(candidate.date()) {
                candidate = (candidate.date() + Duration::days(1))
                    .and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap());
                continue;
            }

            if !self.hour.matches(candidate.hour()) {
                match self.hour.next_matching(candidate.hour() + 1) {
                    Some(h) => {
                        candidate = candidate
                            .date()
                            .and_hms_opt(h, 0, 0)
                            .unwrap_or_else(|| candidate.date().and_hms_opt(23, 59, 0).unwrap());
                    }
                    None => {
                        candidate = (candidate.date() + Duration::days(1))
                            .and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap());
                    }
                }
                continue;
            }

            if !self.minute.matches(candidate.minute()) {
                match self.minute.next_matching(candidate.minute() + 1) {
                    Some(m) => {
                        candidate = candidate.date().and_hms_opt(candidate.hour(), m, 0).unwrap();
                    }
                    None => {
                        let next_hour = candidate.hour() + 1;
                        candidate = candidate
                            .date()
                            .and_hms_opt(next_hour, 0, 0)
                            .unwrap_or_else(|| {
                                (candidate.date() + Duration::days(1))
                                    .and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap())
                            });
                    }
                }
                continue;
            }

            // All fields match: resolve the local candidate back to UTC,
            // skipping nonexistent/ambiguous-but-earlier wall clock instants.
            if let Some(resolved) = resolve_local(tz, candidate) {
                if resolved > after {
                    return Some(resolved.with_timezone(&Utc));
                }
            }
            candidate += Duration::minutes(1);
        }
    }
}

fn weekday_number(weekday: Weekday) -> u32 {
    weekday.num_days_from_sunday()
}

fn advance_to_next_month(dt: chrono::NaiveDateTime) -> chrono::NaiveDateTime {
    let (year, month) = if dt.month() == 12 {
        (dt.year() + 1, 1)
    } else {
        (dt.year(), dt.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap()
        .and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap())
}

fn resolve_local(tz: Tz, naive: chrono::NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt),
        chrono::LocalResult::Ambiguous(earliest, _latest) => Some(earliest),
        chrono::LocalResult::None => None,
    }
}

impl FromStr for CronSchedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn every_minute() {
        let s = CronSchedule::from_fields("*", "*", "*", "*", "*").unwrap();
        let after = utc(2026, 1, 1, 10, 30);
        let next = s.next_after(Tz::UTC, after).unwrap();
        assert_eq!(next, utc(2026, 1, 1, 10, 31));
    }

    #[test]
    fn specific_minute_every_hour() {
        let s = CronSchedule::from_fields("15", "*", "*", "*", "*").unwrap();
        let after = utc(2026, 1, 1, 10, 20);
        let next = s.next_after(Tz::UTC, after).unwrap();
        assert_eq!(next, utc(2026, 1, 1, 11, 15));
    }

    #[test]
    fn step_expression() {
        let s = CronSchedule::from_fields("*/15", "*", "*", "*", "*").unwrap();
        let after = utc(2026, 1, 1, 10, 16);
        let next = s.next_after(Tz::UTC, after).unwrap();
        assert_eq!(next, utc(2026, 1, 1, 10, 30));
    }

    #[test]
    fn range_and_list() {
        let s = CronSchedule::from_fields("0", "9-11,14", "*", "*", "*").unwrap();
        let after = utc(2026, 1, 1, 11, 30);
        let next = s.next_after(Tz::UTC, after).unwrap();
        assert_eq!(next, utc(2026, 1, 1, 14, 0));
    }

    #[test]
    fn day_and_dow_combine_with_or() {
        // 2026-01-15 is a Thursday. day=1 OR day_of_week=Monday(1) should fire
        // on both the 1st of the month and every Monday.
        let s = CronSchedule::from_fields("0", "0", "1", "*", "1").unwrap();
        let after = utc(2026, 1, 2, 0, 0); // a Friday
        let next = s.next_after(Tz::UTC, after).unwrap();
        // Next Monday after Jan 2 2026 is Jan 5 2026.
        assert_eq!(next, utc(2026, 1, 5, 0, 0));
    }

    #[test]
    fn month_restriction_skips_ahead() {
        let s = CronSchedule::from_fields("0", "0", "1", "3", "*").unwrap();
        let after = utc(2026, 1, 1, 0, 0);
        let next = s.next_after(Tz::UTC, after).unwrap();
        assert_eq!(next, utc(2026, 3, 1, 0, 0));
    }

    #[test]
    fn idempotent_strictly_increasing() {
        let s = CronSchedule::from_fields("*/5", "*", "*", "*", "*").unwrap();
        let t0 = utc(2026, 6, 1, 0, 0);
        let t1 = s.next_after(Tz::UTC, t0).unwrap();
        let t2 = s.next_after(Tz::UTC, t1).unwrap();
        assert!(t2 > t1);
        assert!(t1 > t0);
    }

    #[test]
    fn zero_step_is_rejected() {
        let err = CronSchedule::from_fields("*/0", "*", "*", "*", "*").unwrap_err();
        assert!(matches!(err, CronError::ZeroStep { .. }));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = CronSchedule::from_fields("30-10", "*", "*", "*", "*").unwrap_err();
        assert!(matches!(err, CronError::InvertedRange { .. }));
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        let err = CronSchedule::from_fields("75", "*", "*", "*", "*").unwrap_err();
        assert!(matches!(err, CronError::OutOfRange { .. }));
    }

    #[test]
    fn unsatisfiable_day_of_month_eventually_exhausts_horizon() {
        // Feb 30th never exists; day=30 month=2 should exhaust the search horizon.
        let s = CronSchedule::from_fields("0", "0", "30", "2", "*").unwrap();
        let after = utc(2026, 1, 1, 0, 0);
        assert!(s.next_after(Tz::UTC, after).is_none());
    }

    #[test]
    fn non_utc_timezone_converts_back_to_utc() {
        let s = CronSchedule::from_fields("0", "9", "*", "*", "*").unwrap();
        let tz: Tz = "America/New_York".parse().unwrap();
        let after = utc(2026, 1, 1, 0, 0);
        let next = s.next_after(tz, after).unwrap();
        // 9am EST on Jan 1 2026 is 14:00 UTC.
        assert_eq!(next, utc(2026, 1, 1, 14, 0));
    }
}
