//! Operational-calendar time arithmetic.
//!
//! This module converts an operational-hours definition plus a holiday set
//! into counted-duration arithmetic: measuring how much counted time elapsed
//! between two instants, and adding a counted budget to an instant to obtain
//! a deadline.
//!
//! # Counted time
//!
//! Counted time is the portion of wall-clock time that falls inside the
//! profile's open windows on non-holiday dates. The three operational modes
//! are modeled as a tagged variant so each mode's edge cases stay isolated:
//!
//! - [`OperationalHours::Calendar`]: 24x7; every non-holiday instant counts.
//! - [`OperationalHours::Business`]: named windows per weekday.
//! - [`OperationalHours::Custom`]: explicit per-day windows.
//!
//! # Timezone handling
//!
//! All window and holiday boundaries are resolved in the profile's IANA
//! timezone per local calendar day; results are returned in UTC. Around DST
//! transitions a nonexistent local time (spring-forward gap) resolves to the
//! first valid instant after the gap, and an ambiguous local time
//! (fall-back) resolves to the earlier occurrence, so no window is counted
//! twice or lost.
//!
//! # Termination
//!
//! [`add_counted_duration`] walks forward at most [`MAX_LOOKAHEAD_DAYS`]
//! days. A schedule that can make no forward progress (or a budget too large
//! to consume within the bound) fails with
//! [`CalendarError::LookaheadExhausted`] instead of hanging.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
mod tests;

/// Upper bound, in days, on the forward walk performed by
/// [`add_counted_duration`] (two years).
pub const MAX_LOOKAHEAD_DAYS: i64 = 731;

/// Weekdays indexed as stored in [`WeekSchedule`] (Monday first).
const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Errors raised by calendar construction and arithmetic.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CalendarError {
    /// A window's start is not strictly before its end.
    #[error("window start {start} is not before window end {end}")]
    InvalidWindow {
        /// The offending start time-of-day.
        start: NaiveTime,
        /// The offending end time-of-day.
        end: NaiveTime,
    },

    /// Windows within one weekday overlap or are out of order.
    #[error("windows on {weekday} overlap or are out of order")]
    UnorderedWindows {
        /// The weekday whose window list is invalid.
        weekday: Weekday,
    },

    /// The schedule has no open window on any weekday, so no counted time
    /// can ever accrue.
    #[error("schedule has no open window on any weekday")]
    EmptySchedule,

    /// The same date was supplied twice when building a holiday set.
    #[error("duplicate holiday date {date}")]
    DuplicateHoliday {
        /// The duplicated date.
        date: NaiveDate,
    },

    /// A recurring holiday entry does not name a real month/day.
    #[error("invalid recurring holiday month/day {month}-{day}")]
    InvalidMonthDay {
        /// The supplied month (1-12).
        month: u32,
        /// The supplied day of month (1-31).
        day: u32,
    },

    /// No counted time could be accumulated within the bounded lookahead.
    /// This is a configuration error: the profile admits no forward
    /// progress for the requested budget.
    #[error("no counted time reachable within {max_days} days of {start}")]
    LookaheadExhausted {
        /// The walk's anchor instant.
        start: DateTime<Utc>,
        /// The lookahead bound that was exhausted.
        max_days: i64,
    },
}

/// A single open window within one day, `[start, end)` in local
/// time-of-day. Windows do not cross midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeWindow", into = "RawTimeWindow")]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    /// Creates a window, requiring `start < end`.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidWindow`] when the window is empty or
    /// inverted.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, CalendarError> {
        if start >= end {
            return Err(CalendarError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// The window's opening time-of-day.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// The window's closing time-of-day (exclusive).
    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawTimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TryFrom<RawTimeWindow> for TimeWindow {
    type Error = CalendarError;

    fn try_from(raw: RawTimeWindow) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl From<TimeWindow> for RawTimeWindow {
    fn from(window: TimeWindow) -> Self {
        Self {
            start: window.start,
            end: window.end,
        }
    }
}

/// Ordered, non-overlapping windows for each weekday (Monday first).
///
/// The ordering invariant is enforced at construction and across
/// deserialization, so downstream arithmetic never has to re-check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWeekSchedule", into = "RawWeekSchedule")]
pub struct WeekSchedule {
    days: [Vec<TimeWindow>; 7],
}

impl WeekSchedule {
    /// Creates a schedule from per-weekday window lists (Monday first).
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::UnorderedWindows`] when a day's windows
    /// overlap or are out of order, and [`CalendarError::EmptySchedule`]
    /// when no weekday has any window at all.
    pub fn new(days: [Vec<TimeWindow>; 7]) -> Result<Self, CalendarError> {
        for (index, windows) in days.iter().enumerate() {
            for pair in windows.windows(2) {
                if pair[0].end() > pair[1].start() {
                    return Err(CalendarError::UnorderedWindows {
                        weekday: WEEKDAYS[index],
                    });
                }
            }
        }
        if days.iter().all(Vec::is_empty) {
            return Err(CalendarError::EmptySchedule);
        }
        Ok(Self { days })
    }

    /// Convenience constructor: the same single window Monday through
    /// Friday, weekends closed.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidWindow`] when `start >= end`.
    pub fn weekdays(start: NaiveTime, end: NaiveTime) -> Result<Self, CalendarError> {
        let window = TimeWindow::new(start, end)?;
        Self::new([
            vec![window],
            vec![window],
            vec![window],
            vec![window],
            vec![window],
            Vec::new(),
            Vec::new(),
        ])
    }

    /// The windows configured for `weekday`, in order.
    #[must_use]
    pub fn windows(&self, weekday: Weekday) -> &[TimeWindow] {
        &self.days[weekday.num_days_from_monday() as usize]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawWeekSchedule {
    days: [Vec<TimeWindow>; 7],
}

impl TryFrom<RawWeekSchedule> for WeekSchedule {
    type Error = CalendarError;

    fn try_from(raw: RawWeekSchedule) -> Result<Self, Self::Error> {
        Self::new(raw.days)
    }
}

impl From<WeekSchedule> for RawWeekSchedule {
    fn from(schedule: WeekSchedule) -> Self {
        Self {
            days: schedule.days,
        }
    }
}

/// A month/day pair observed every year (recurring holiday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthDay {
    /// Month, 1-12.
    pub month: u32,
    /// Day of month, 1-31.
    pub day: u32,
}

/// Dates that contribute zero counted time, in the tenant timezone.
///
/// One-off dates and recurring month/day entries are kept as sets, so the
/// no-duplicates invariant holds structurally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidaySet {
    #[serde(default)]
    dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    recurring: BTreeSet<MonthDay>,
}

impl HolidaySet {
    /// An empty holiday set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a set of one-off holiday dates.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::DuplicateHoliday`] when the same date is
    /// supplied twice.
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Result<Self, CalendarError> {
        let mut set = Self::default();
        for date in dates {
            if !set.dates.insert(date) {
                return Err(CalendarError::DuplicateHoliday { date });
            }
        }
        Ok(set)
    }

    /// Adds a recurring month/day entry observed every year.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidMonthDay`] when the pair does not
    /// name a possible date.
    pub fn add_recurring(&mut self, month: u32, day: u32) -> Result<(), CalendarError> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(CalendarError::InvalidMonthDay { month, day });
        }
        self.recurring.insert(MonthDay { month, day });
        Ok(())
    }

    /// Whether `date` is a holiday (one-off or recurring).
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
            || self.recurring.contains(&MonthDay {
                month: date.month(),
                day: date.day(),
            })
    }

    /// Whether the set holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() && self.recurring.is_empty()
    }
}

/// Operational-hours mode, one resolver arm per tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OperationalHours {
    /// 24 hours x 7 days. Holidays still contribute zero counted time.
    Calendar,
    /// Named business-hours windows per weekday.
    Business {
        /// The weekly window layout.
        schedule: WeekSchedule,
    },
    /// Explicit per-day windows.
    Custom {
        /// The weekly window layout.
        schedule: WeekSchedule,
    },
}

/// An operational-hours definition bound to a tenant timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalHoursProfile {
    /// IANA timezone all window and holiday boundaries are resolved in.
    pub timezone: Tz,
    /// The operational-hours mode.
    pub hours: OperationalHours,
}

impl OperationalHoursProfile {
    /// A 24x7 profile in `timezone`.
    #[must_use]
    pub const fn calendar(timezone: Tz) -> Self {
        Self {
            timezone,
            hours: OperationalHours::Calendar,
        }
    }

    /// A business-hours profile in `timezone`.
    #[must_use]
    pub const fn business(timezone: Tz, schedule: WeekSchedule) -> Self {
        Self {
            timezone,
            hours: OperationalHours::Business { schedule },
        }
    }

    /// A custom-hours profile in `timezone`.
    #[must_use]
    pub const fn custom(timezone: Tz, schedule: WeekSchedule) -> Self {
        Self {
            timezone,
            hours: OperationalHours::Custom { schedule },
        }
    }
}

/// Resolves a local date + time-of-day in `tz` to a UTC instant.
///
/// Nonexistent local times (spring-forward gap) resolve to the first valid
/// instant after the gap; ambiguous local times (fall-back) resolve to the
/// earlier occurrence.
fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    use chrono::offset::LocalResult;
    use chrono::TimeZone;

    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(instant) => instant.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => {
            let mut probe = date.and_time(time);
            for _ in 0..(24 * 60) {
                probe = probe + Duration::minutes(1);
                if let Some(instant) = tz.from_local_datetime(&probe).earliest() {
                    return instant.with_timezone(&Utc);
                }
            }
            // IANA gaps are bounded well under a day; treat the raw local
            // time as UTC rather than loop further.
            Utc.from_utc_datetime(&date.and_time(time))
        },
    }
}

/// Collects the UTC spans of `date`'s open windows into `out`.
///
/// Holiday dates yield no windows. In calendar mode the whole local day is
/// one window, so a DST-short or DST-long day contributes its actual
/// wall-clock length.
fn day_windows(
    profile: &OperationalHoursProfile,
    holidays: &HolidaySet,
    date: NaiveDate,
    out: &mut Vec<(DateTime<Utc>, DateTime<Utc>)>,
) {
    out.clear();
    if holidays.contains(date) {
        return;
    }
    match &profile.hours {
        OperationalHours::Calendar => {
            let Some(next) = date.succ_opt() else { return };
            let start = local_instant(profile.timezone, date, NaiveTime::MIN);
            let end = local_instant(profile.timezone, next, NaiveTime::MIN);
            if start < end {
                out.push((start, end));
            }
        },
        OperationalHours::Business { schedule } | OperationalHours::Custom { schedule } => {
            for window in schedule.windows(date.weekday()) {
                let start = local_instant(profile.timezone, date, window.start());
                let end = local_instant(profile.timezone, date, window.end());
                if start < end {
                    out.push((start, end));
                }
            }
        },
    }
}

/// Measures the counted duration between `start` and `end`.
///
/// Returns zero when `end <= start`. The result is never negative and is
/// monotone in `end`.
#[must_use]
pub fn counted_duration(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    profile: &OperationalHoursProfile,
    holidays: &HolidaySet,
) -> Duration {
    if end <= start {
        return Duration::zero();
    }

    let first = start.with_timezone(&profile.timezone).date_naive();
    let last = end.with_timezone(&profile.timezone).date_naive();

    let mut total = Duration::zero();
    let mut windows = Vec::new();
    let mut date = first;
    loop {
        day_windows(profile, holidays, date, &mut windows);
        for &(window_start, window_end) in &windows {
            let overlap_start = window_start.max(start);
            let overlap_end = window_end.min(end);
            if overlap_start < overlap_end {
                total += overlap_end - overlap_start;
            }
        }
        if date >= last {
            break;
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    total
}

/// Adds a counted budget to `start`, returning the exact instant the budget
/// is consumed.
///
/// A budget exhausted exactly at a window close lands on the window-close
/// instant. A non-positive budget returns `start` unchanged.
///
/// # Errors
///
/// Returns [`CalendarError::LookaheadExhausted`] when the budget cannot be
/// consumed within [`MAX_LOOKAHEAD_DAYS`] days, which covers both a
/// schedule with no usable windows and an unreasonably large budget.
pub fn add_counted_duration(
    start: DateTime<Utc>,
    amount: Duration,
    profile: &OperationalHoursProfile,
    holidays: &HolidaySet,
) -> Result<DateTime<Utc>, CalendarError> {
    if amount <= Duration::zero() {
        return Ok(start);
    }

    let mut remaining = amount;
    let mut windows = Vec::new();
    let mut date = start.with_timezone(&profile.timezone).date_naive();

    for _ in 0..=MAX_LOOKAHEAD_DAYS {
        day_windows(profile, holidays, date, &mut windows);
        for &(window_start, window_end) in &windows {
            if window_end <= start {
                continue;
            }
            let segment_start = window_start.max(start);
            let available = window_end - segment_start;
            if remaining <= available {
                return Ok(segment_start + remaining);
            }
            remaining -= available;
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    Err(CalendarError::LookaheadExhausted {
        start,
        max_days: MAX_LOOKAHEAD_DAYS,
    })
}
