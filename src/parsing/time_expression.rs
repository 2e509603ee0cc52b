use std::sync::LazyLock;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;


const CONNECTORS: [&str; 4] = ["at", "in", "after", "for"];

const DEFAULT_GRACE: TimeDelta = TimeDelta::minutes(5);
const TOMORROW_HOUR: u32 = 9;

static CLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}):(\d{2})\s*(am|pm)?").expect("Clock pattern is valid.")
});

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("Number pattern is valid."));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl DurationUnit {
    fn delta(self, amount: i64) -> Option<TimeDelta> {
        match self {
            DurationUnit::Minutes => TimeDelta::try_minutes(amount),
            DurationUnit::Hours => TimeDelta::try_hours(amount),
            DurationUnit::Days => TimeDelta::try_days(amount),
            DurationUnit::Weeks => TimeDelta::try_weeks(amount),
        }
    }
}

// Units are tried in this order, so "1 hour 30 minutes" resolves to 30 minutes.
static DURATION_PATTERNS: LazyLock<Vec<(DurationUnit, Regex)>> = LazyLock::new(|| {
    [
        (DurationUnit::Minutes, r"(\d+)\s*minutes?"),
        (DurationUnit::Hours, r"(\d+)\s*hours?"),
        (DurationUnit::Days, r"(\d+)\s*days?"),
        (DurationUnit::Weeks, r"(\d+)\s*weeks?"),
    ]
    .into_iter()
    .map(|(unit, pattern)| (unit, Regex::new(pattern).expect("Duration pattern is valid.")))
    .collect()
});

/// Which rule produced a [`ParsedTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Relative,
    AbsoluteClock,
    Tomorrow,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTime {
    pub at: DateTime<Utc>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("Could not understand time expression \"{0}\"")]
    NotParseable(String),
    #[error("No calendar day follows {0}")]
    DateOutOfRange(NaiveDate),
}

/// Turns phrases like `at 3:30 pm`, `in 10 minutes` or `15` into an instant
/// that is never in the past.
#[derive(Debug, Clone, Copy)]
pub struct TimeExpressionParser {
    tz: Tz,
}

impl TimeExpressionParser {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn parse(&self, text: &str, now: DateTime<Utc>) -> Result<ParsedTime, TimeParseError> {
        let normalized = text.trim().to_lowercase();
        let expression = strip_connector(&normalized);

        if let Some(parsed) = self.match_clock(expression, now) {
            return parsed;
        }

        if let Some(parsed) = match_duration(expression, now) {
            return Ok(parsed);
        }

        if BARE_NUMBER.is_match(expression) {
            if let Some(parsed) = expression
                .parse::<i64>()
                .ok()
                .and_then(|minutes| offset(now, DurationUnit::Minutes, minutes))
            {
                return Ok(parsed);
            }
        }

        Err(TimeParseError::NotParseable(text.trim().to_string()))
    }

    /// Only the `H:MM [am|pm]` rule.
    pub fn parse_clock(&self, text: &str, now: DateTime<Utc>) -> Result<ParsedTime, TimeParseError> {
        let normalized = text.trim().to_lowercase();
        self.match_clock(&normalized, now)
            .unwrap_or_else(|| Err(TimeParseError::NotParseable(text.trim().to_string())))
    }

    /// Only the `<n> minutes|hours|days|weeks` rule.
    pub fn parse_duration(&self, text: &str, now: DateTime<Utc>) -> Result<ParsedTime, TimeParseError> {
        let normalized = text.trim().to_lowercase();
        match_duration(&normalized, now)
            .ok_or_else(|| TimeParseError::NotParseable(text.trim().to_string()))
    }

    pub fn tomorrow_morning(&self, now: DateTime<Utc>) -> Result<ParsedTime, TimeParseError> {
        let today = now.with_timezone(&self.tz).date_naive();
        let time = NaiveTime::from_hms_opt(TOMORROW_HOUR, 0, 0).expect("09:00 is a valid time.");
        let tomorrow = today.succ_opt().ok_or(TimeParseError::DateOutOfRange(today))?;

        Ok(ParsedTime {
            at: self.localize(tomorrow, time),
            provenance: Provenance::Tomorrow,
        })
    }

    pub fn default_grace(&self, now: DateTime<Utc>) -> ParsedTime {
        ParsedTime {
            at: now + DEFAULT_GRACE,
            provenance: Provenance::Default,
        }
    }

    fn match_clock(
        &self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Option<Result<ParsedTime, TimeParseError>> {
        let captures = CLOCK_PATTERN.captures(text)?;
        let hour: u32 = captures[1].parse().ok()?;
        let minute: u32 = captures[2].parse().ok()?;
        let meridiem = captures.get(3).map(|m| m.as_str());

        let hour = to_24_hour(hour, meridiem)?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0)?;

        Some(self.resolve_clock(time, now).map(|at| ParsedTime {
            at,
            provenance: Provenance::AbsoluteClock,
        }))
    }

    fn resolve_clock(
        &self,
        time: NaiveTime,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, TimeParseError> {
        let today = now.with_timezone(&self.tz).date_naive();
        let candidate = self.localize(today, time);
        if candidate > now {
            return Ok(candidate);
        }

        let tomorrow = today.succ_opt().ok_or(TimeParseError::DateOutOfRange(today))?;
        Ok(self.localize(tomorrow, time))
    }

    /// A repeated local time (DST fold) takes its earliest instant. A skipped one
    /// (DST gap) keeps the offset from before the jump, so 02:30 on a
    /// spring-forward night becomes 03:30.
    fn localize(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(at) | LocalResult::Ambiguous(at, _) => at.with_timezone(&Utc),
            LocalResult::None => {
                let before = self
                    .tz
                    .offset_from_utc_datetime(&(local - TimeDelta::days(1)))
                    .fix();
                (local - before).and_utc()
            }
        }
    }
}

fn strip_connector(text: &str) -> &str {
    match text.split_once(char::is_whitespace) {
        Some((first, rest)) if CONNECTORS.contains(&first) => rest.trim_start(),
        _ => text,
    }
}

fn to_24_hour(hour: u32, meridiem: Option<&str>) -> Option<u32> {
    match meridiem {
        Some(_) if !(1..=12).contains(&hour) => None,
        Some("pm") if hour != 12 => Some(hour + 12),
        Some("am") if hour == 12 => Some(0),
        Some(_) => Some(hour),
        None if hour <= 23 => Some(hour),
        None => None,
    }
}

fn match_duration(text: &str, now: DateTime<Utc>) -> Option<ParsedTime> {
    DURATION_PATTERNS.iter().find_map(|(unit, pattern)| {
        let captures = pattern.captures(text)?;
        let amount = captures[1].parse::<i64>().ok()?;
        offset(now, *unit, amount)
    })
}

fn offset(now: DateTime<Utc>, unit: DurationUnit, amount: i64) -> Option<ParsedTime> {
    let delta = unit.delta(amount)?;
    now.checked_add_signed(delta).map(|at| ParsedTime {
        at,
        provenance: Provenance::Relative,
    })
}
