//! Work-window slot planning.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::ScheduleError;

/// Origin of the capture grid. Interval boundaries are measured from this
/// fixed point, so slots land on global :00/:30-style marks rather than a
/// grid anchored to process start.
fn grid_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .expect("fixed calendar date")
        .and_hms_opt(0, 0, 0)
        .expect("fixed time of day")
}

/// The daily `[start_hour, end_hour)` range during which captures run.
///
/// Immutable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkWindow {
    start_hour: u32,
    end_hour: u32,
}

impl WorkWindow {
    /// Validate and build a window. Both hours must be in `[0, 24)` with
    /// `start_hour < end_hour`.
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self, ScheduleError> {
        if start_hour >= end_hour || end_hour >= 24 {
            return Err(ScheduleError::InvalidWindow {
                start: start_hour,
                end: end_hour,
            });
        }
        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    /// The window's open and close instants on `day`.
    pub fn bounds_on(&self, day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start = day
            .and_hms_opt(self.start_hour, 0, 0)
            .expect("hour validated at construction");
        let end = day
            .and_hms_opt(self.end_hour, 0, 0)
            .expect("hour validated at construction");
        (start, end)
    }

    /// Whether `at` falls inside the window on its own day.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let (start, end) = self.bounds_on(at.date());
        start <= at && at < end
    }
}

/// What happens when the current time is outside the work window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReopenPolicy {
    /// Any out-of-window time advances to the next day's window start, even
    /// a time earlier than today's start.
    #[default]
    NextDay,
    /// A time earlier than today's start waits for today's start instead.
    SameDay,
}

/// Computes the next capture slot from a work window and interval.
#[derive(Debug, Clone)]
pub struct SlotPlanner {
    window: WorkWindow,
    interval: Duration,
    reopen: ReopenPolicy,
}

impl SlotPlanner {
    /// Build a planner. `interval_minutes` must be positive.
    pub fn new(
        window: WorkWindow,
        interval_minutes: i64,
        reopen: ReopenPolicy,
    ) -> Result<Self, ScheduleError> {
        if interval_minutes <= 0 {
            return Err(ScheduleError::InvalidInterval(interval_minutes));
        }
        Ok(Self {
            window,
            interval: Duration::minutes(interval_minutes),
            reopen,
        })
    }

    /// The timestamp of the next capture, strictly after `now`.
    ///
    /// Inside the window the result is `now` rounded up to the next interval
    /// mark on the fixed grid; a mark that reaches the window close, or a
    /// `now` outside the window, advances to the next window opening per the
    /// reopen policy. The result always falls inside a work window.
    pub fn next_slot(&self, now: NaiveDateTime) -> NaiveDateTime {
        let (start_today, end_today) = self.window.bounds_on(now.date());

        if !(start_today <= now && now < end_today) {
            return self.reopen_at(now, start_today);
        }

        let slot = align_up(now, self.interval);
        if slot >= end_today {
            return self.reopen_at(now, start_today);
        }
        slot
    }

    /// The window this planner schedules within.
    pub fn window(&self) -> WorkWindow {
        self.window
    }

    fn reopen_at(&self, now: NaiveDateTime, start_today: NaiveDateTime) -> NaiveDateTime {
        match self.reopen {
            ReopenPolicy::SameDay if now < start_today => start_today,
            _ => start_today + Duration::days(1),
        }
    }
}

/// Round `now` up to the next multiple of `interval` past the grid epoch.
///
/// A `now` exactly on a grid mark advances a full interval, so the result is
/// strictly after `now`.
fn align_up(now: NaiveDateTime, interval: Duration) -> NaiveDateTime {
    let interval_us = interval
        .num_microseconds()
        .expect("interval fits in microseconds");
    let since_epoch = (now - grid_epoch())
        .num_microseconds()
        .expect("timestamp fits in microseconds");
    let rem = since_epoch.rem_euclid(interval_us);
    now + Duration::microseconds(interval_us - rem)
}
