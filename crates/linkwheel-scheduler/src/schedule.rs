use std::fmt;

use chrono::{DateTime, Datelike, Days, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use linkwheel_core::config::{ScheduleConfig, DEFAULT_SCHEDULE_TIME};

use crate::error::{DispatchError, Result};

/// Upper bound on `schedule.every`: one leap year in seconds.
const MAX_INTERVAL_SECS: u64 = 366 * 24 * 60 * 60;

/// Defines when the dispatcher fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fire every day at the given wall-clock time in `tz`.
    Daily { hour: u8, minute: u8, tz: Tz },

    /// Fire repeatedly with a fixed interval in seconds.
    Interval { every_secs: u64 },
}

impl Schedule {
    /// Build a schedule from the config section.
    ///
    /// `schedule.time` and `schedule.every` are mutually exclusive; with
    /// neither set, the default is daily at 09:00 in the configured
    /// timezone. `schedule.every` accepts 1 second up to one year.
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        match (config.time.as_deref(), config.every) {
            (Some(_), Some(_)) => Err(DispatchError::InvalidSchedule(
                "schedule.time and schedule.every are mutually exclusive".to_string(),
            )),
            (None, Some(0)) => Err(DispatchError::InvalidSchedule(
                "schedule.every must be at least 1 second".to_string(),
            )),
            (None, Some(every_secs)) if every_secs > MAX_INTERVAL_SECS => {
                Err(DispatchError::InvalidSchedule(format!(
                    "schedule.every must be at most {MAX_INTERVAL_SECS} seconds (one year)"
                )))
            }
            (None, Some(every_secs)) => Ok(Schedule::Interval { every_secs }),
            (Some(time), None) => Self::daily(time, &config.timezone),
            (None, None) => Self::daily(DEFAULT_SCHEDULE_TIME, &config.timezone),
        }
    }

    /// Parse `"HH:MM"` plus an IANA timezone name into a daily schedule.
    pub fn daily(time: &str, timezone: &str) -> Result<Self> {
        let (hour, minute) = parse_hhmm(time)?;
        let tz: Tz = timezone
            .parse()
            .map_err(|_| DispatchError::InvalidSchedule(format!("unknown timezone: {timezone}")))?;
        Ok(Schedule::Daily { hour, minute, tz })
    }

    /// Compute the next fire instant strictly after `from`.
    ///
    /// Daily schedules resolve their wall-clock time in the configured
    /// timezone: a time that does not exist on some day (spring-forward
    /// gap) skips to the next valid day, and an ambiguous time (fall-back)
    /// fires at the earlier of the two instants.
    pub fn next_fire(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Schedule::Interval { every_secs } => from + Duration::seconds(*every_secs as i64),

            Schedule::Daily { hour, minute, tz } => {
                let local_today = from.with_timezone(tz).date_naive();
                for offset in 0..=2u64 {
                    let Some(date) = local_today.checked_add_days(Days::new(offset)) else {
                        continue;
                    };
                    if let Some(candidate) = at_local(*tz, date, *hour, *minute) {
                        if candidate > from {
                            return candidate;
                        }
                    }
                }
                // A fixed wall-clock time cannot be skipped two days in a
                // row, so this is unreachable short of a calendar overflow.
                from + Duration::days(1)
            }
        }
    }

    /// Human label, also substituted for the `{time}` template placeholder.
    pub fn label(&self) -> String {
        match self {
            Schedule::Daily { hour, minute, tz } => format!("{hour:02}:{minute:02} {tz}"),
            Schedule::Interval { every_secs } => format!("every {every_secs}s"),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Daily { .. } => write!(f, "daily at {}", self.label()),
            Schedule::Interval { .. } => write!(f, "{}", self.label()),
        }
    }
}

// — private helpers —

/// Resolve `date` at HH:MM in `tz` to a UTC instant. `None` in a DST gap.
fn at_local(tz: Tz, date: NaiveDate, hour: u8, minute: u8) -> Option<DateTime<Utc>> {
    let resolved = tz.with_ymd_and_hms(
        date.year(),
        date.month(),
        date.day(),
        hour as u32,
        minute as u32,
        0,
    );
    match resolved {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

fn parse_hhmm(time: &str) -> Result<(u8, u8)> {
    let invalid =
        || DispatchError::InvalidSchedule(format!("schedule time must be HH:MM, got {time:?}"));
    let (h, m) = time.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u8 = h.parse().map_err(|_| invalid())?;
    let minute: u8 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}
