//! Five-field cron expressions, evaluated in UTC.
//!
//! `minute hour day-of-month month day-of-week` with `*`, lists, ranges,
//! steps and month/day names, plus the `@hourly`, `@daily`, `@weekly`,
//! `@monthly` and `@yearly` shorthands. When both day fields are restricted a
//! time matches if either does.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use thiserror::Error;

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DAY_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Give up looking for a match this many years ahead.
const SEARCH_YEARS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid {field} field '{value}'")]
    Field { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value the first name maps to
    name_base: u32,
}

const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[], name_base: 0 };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[], name_base: 0 };
const DAY: FieldSpec = FieldSpec { name: "day of month", min: 1, max: 31, names: &[], name_base: 0 };
const MONTH: FieldSpec = FieldSpec { name: "month", min: 1, max: 12, names: MONTH_NAMES, name_base: 1 };
// 7 is accepted as Sunday and folded onto 0
const WEEKDAY: FieldSpec = FieldSpec { name: "day of week", min: 0, max: 7, names: DAY_NAMES, name_base: 0 };

/// A parsed schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    weekdays: u64,
    any_day: bool,
    any_weekday: bool,
    source: String,
}

impl FieldSpec {
    fn value(&self, raw: &str) -> Option<u32> {
        if let Ok(n) = raw.parse::<u32>() {
            return (self.min..=self.max).contains(&n).then_some(n);
        }
        let lower = raw.to_lowercase();
        self.names
            .iter()
            .position(|n| *n == lower)
            .map(|i| i as u32 + self.name_base)
    }

    /// Parse one field into a bitmask. Returns the mask and whether it was `*`.
    fn parse(&self, field: &str) -> Result<(u64, bool), CronError> {
        let err = || CronError::Field {
            field: self.name,
            value: field.to_string(),
        };

        let mut mask = 0u64;
        for item in field.split(',') {
            let (range, step) = match item.split_once('/') {
                Some((r, s)) => {
                    let step: u32 = s.parse().map_err(|_| err())?;
                    if step == 0 {
                        return Err(err());
                    }
                    (r, Some(step))
                }
                None => (item, None),
            };

            let (lo, hi) = if range == "*" {
                (self.min, self.max)
            } else if let Some((a, b)) = range.split_once('-') {
                let (a, b) = (self.value(a).ok_or_else(err)?, self.value(b).ok_or_else(err)?);
                if a > b {
                    return Err(err());
                }
                (a, b)
            } else {
                let a = self.value(range).ok_or_else(err)?;
                // `5/10` runs from 5 to the end of the range
                (a, if step.is_some() { self.max } else { a })
            };

            let step = step.unwrap_or(1) as usize;
            for v in (lo..=hi).step_by(step) {
                mask |= 1 << v;
            }
        }

        if mask == 0 {
            return Err(err());
        }
        Ok((mask, field == "*"))
    }
}

impl FromStr for CronSchedule {
    type Err = CronError;

    fn from_str(expr: &str) -> Result<Self, CronError> {
        let source = expr.trim().to_string();
        let expanded = match source.to_lowercase().as_str() {
            "@hourly" => "0 * * * *".to_string(),
            "@daily" | "@midnight" => "0 0 * * *".to_string(),
            "@weekly" => "0 0 * * 0".to_string(),
            "@monthly" => "0 0 1 * *".to_string(),
            "@yearly" | "@annually" => "0 0 1 1 *".to_string(),
            _ => source.clone(),
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount(fields.len()));
        }

        let (minutes, _) = MINUTE.parse(fields[0])?;
        let (hours, _) = HOUR.parse(fields[1])?;
        let (days, any_day) = DAY.parse(fields[2])?;
        let (months, _) = MONTH.parse(fields[3])?;
        let (mut weekdays, any_weekday) = WEEKDAY.parse(fields[4])?;
        if weekdays & (1 << 7) != 0 {
            weekdays = (weekdays | 1) & !(1 << 7);
        }

        Ok(Self {
            minutes,
            hours,
            days,
            months,
            weekdays,
            any_day,
            any_weekday,
            source,
        })
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn has(mask: u64, v: u32) -> bool {
    mask & (1 << v) != 0
}

impl CronSchedule {
    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = has(self.days, date.day());
        let dow = has(self.weekdays, date.weekday().num_days_from_sunday());
        match (self.any_day, self.any_weekday) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }

    /// First matching minute strictly after `after`.
    ///
    /// Returns `None` for expressions that never match (e.g. February 31st).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let limit = start.year() + SEARCH_YEARS;
        let mut t = start.naive_utc();

        while t.year() <= limit {
            if !has(self.months, t.month()) {
                let (y, m) = if t.month() == 12 { (t.year() + 1, 1) } else { (t.year(), t.month() + 1) };
                t = NaiveDate::from_ymd_opt(y, m, 1)?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !has(self.hours, t.hour()) {
                t = t.date().and_hms_opt(t.hour(), 0, 0)? + Duration::hours(1);
                continue;
            }
            if !has(self.minutes, t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            return Some(Utc.from_utc_datetime(&t));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn cron(expr: &str) -> CronSchedule {
        expr.parse().unwrap()
    }

    #[test]
    fn steps_within_the_hour() {
        let c = cron("*/15 * * * *");
        assert_eq!(c.next_after(at(2024, 5, 1, 10, 7)), Some(at(2024, 5, 1, 10, 15)));
        assert_eq!(c.next_after(at(2024, 5, 1, 10, 45)), Some(at(2024, 5, 1, 11, 0)));
    }

    #[test]
    fn strictly_after() {
        let c = cron("30 * * * *");
        assert_eq!(c.next_after(at(2024, 5, 1, 10, 30)), Some(at(2024, 5, 1, 11, 30)));
    }

    #[test]
    fn weekday_names_and_ranges() {
        // 2024-05-04 is a Saturday
        let c = cron("0 9 * * mon-fri");
        assert_eq!(c.next_after(at(2024, 5, 4, 12, 0)), Some(at(2024, 5, 6, 9, 0)));

        let sunday = cron("0 0 * * 7");
        assert_eq!(sunday.next_after(at(2024, 5, 4, 12, 0)), Some(at(2024, 5, 5, 0, 0)));
    }

    #[test]
    fn month_rollover_and_names() {
        let c = cron("0 12 1 jan,jul *");
        assert_eq!(c.next_after(at(2024, 2, 10, 0, 0)), Some(at(2024, 7, 1, 12, 0)));
        assert_eq!(c.next_after(at(2024, 8, 1, 0, 0)), Some(at(2025, 1, 1, 12, 0)));
    }

    #[test]
    fn either_day_field_matches() {
        // The 13th or any Friday; 2024-09-06 is a Friday
        let c = cron("0 0 13 * fri");
        assert_eq!(c.next_after(at(2024, 9, 1, 0, 0)), Some(at(2024, 9, 6, 0, 0)));
        assert_eq!(c.next_after(at(2024, 9, 7, 0, 0)), Some(at(2024, 9, 13, 0, 0)));
    }

    #[test]
    fn descriptors() {
        assert_eq!(cron("@hourly").next_after(at(2024, 1, 1, 5, 5)), Some(at(2024, 1, 1, 6, 0)));
        assert_eq!(cron("@daily").next_after(at(2024, 1, 1, 5, 5)), Some(at(2024, 1, 2, 0, 0)));
        assert_eq!(cron("@yearly").to_string(), "@yearly");
    }

    #[test]
    fn never_matching() {
        assert_eq!(cron("0 0 31 2 *").next_after(at(2024, 1, 1, 0, 0)), None);
    }

    #[test]
    fn rejects_bad_expressions() {
        assert_eq!("* * * *".parse::<CronSchedule>(), Err(CronError::FieldCount(4)));
        assert!("61 * * * *".parse::<CronSchedule>().is_err());
        assert!("*/0 * * * *".parse::<CronSchedule>().is_err());
        assert!("0 0 * foo *".parse::<CronSchedule>().is_err());
        assert!("5-1 * * * *".parse::<CronSchedule>().is_err());
    }
}
