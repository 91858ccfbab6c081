//! The daily tournament window.

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};

use crate::domain::constants::{TOURNAMENT_END_HOUR_UTC, TOURNAMENT_START_HOUR_UTC};

/// A daily `[start_hour, end_hour)` window in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    start_hour: u32,
    end_hour: u32,
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            start_hour: TOURNAMENT_START_HOUR_UTC,
            end_hour: TOURNAMENT_END_HOUR_UTC,
        }
    }
}

impl DailySchedule {
    /// Returns `None` unless `start_hour < end_hour <= 24`.
    pub fn new(start_hour: u32, end_hour: u32) -> Option<Self> {
        (start_hour < end_hour && end_hour <= 24).then_some(Self {
            start_hour,
            end_hour,
        })
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    /// Whether a tournament should be running at `now`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        (self.start_hour..self.end_hour).contains(&now.hour())
    }

    /// Opening instant of the window on `now`'s date
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Self::at_hour(now, self.start_hour)
    }

    /// Closing instant of the window on `now`'s date
    pub fn window_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Self::at_hour(now, self.end_hour)
    }

    /// The next instant strictly after `now` at which the window opens or closes
    pub fn next_transition(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.window_start(now);
        let end = self.window_end(now);
        if now < start {
            start
        } else if now < end {
            end
        } else {
            start + Duration::days(1)
        }
    }

    fn at_hour(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
        now.date_naive().and_time(NaiveTime::MIN).and_utc() + Duration::hours(i64::from(hour))
    }
}
