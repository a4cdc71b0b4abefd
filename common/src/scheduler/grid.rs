// Discretisation of continuous time onto the solver's integer axis

use crate::errors::SchedulerError;
use crate::models::{BoundedInterval, ScheduleInterval, Timestamp};
use crate::time::{ceil_div, contains, floor_div, scale, validate_range};
use chrono::Duration;

/// TimeGrid maps timestamps to whole units counted from the window start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGrid {
    origin: Timestamp,
    end: Timestamp,
    unit: Duration,
}

fn to_units(value: i128) -> Result<i64, SchedulerError> {
    i64::try_from(value).map_err(|_| SchedulerError::UnitOverflow)
}

impl TimeGrid {
    pub fn new(window: (Timestamp, Timestamp), unit: Duration) -> Result<Self, SchedulerError> {
        validate_range(&window)?;
        if unit <= Duration::zero() {
            return Err(SchedulerError::InvalidUnitLength);
        }
        Ok(Self {
            origin: window.0,
            end: window.1,
            unit,
        })
    }

    pub fn origin(&self) -> Timestamp {
        self.origin
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    pub fn window(&self) -> (Timestamp, Timestamp) {
        (self.origin, self.end)
    }

    /// The interval's outer span must lie inside the window
    pub fn check_contains(&self, interval: &ScheduleInterval) -> Result<(), SchedulerError> {
        if contains(&self.window(), &interval.effective_interval())? {
            Ok(())
        } else {
            Err(SchedulerError::OutOfRange {
                interval_id: interval.id,
            })
        }
    }

    /// `(ceil(lo), floor(hi))` in units, with the upper bound raised to the
    /// lower one when the range is narrower than a unit
    pub fn to_units_pair(
        &self,
        range: &BoundedInterval<Timestamp>,
    ) -> Result<(i64, i64), SchedulerError> {
        let lower = ceil_div(range.lower() - self.origin, self.unit);
        let upper = floor_div(range.upper() - self.origin, self.unit);
        Ok((to_units(lower)?, to_units(upper.max(lower))?))
    }

    /// Same rounding as [`TimeGrid::to_units_pair`], but the lower bound is
    /// lowered to the upper one instead
    pub fn duration_units_pair(
        &self,
        range: &BoundedInterval<Duration>,
    ) -> Result<(i64, i64), SchedulerError> {
        let lower = ceil_div(range.lower(), self.unit);
        let upper = floor_div(range.upper(), self.unit);
        Ok((to_units(lower.min(upper))?, to_units(upper)?))
    }

    /// `origin + units * unit`
    pub fn to_time(&self, units: i64) -> Result<Timestamp, SchedulerError> {
        scale(self.unit, i128::from(units))
            .and_then(|offset| self.origin.checked_add_signed(offset))
            .ok_or(SchedulerError::UnitOverflow)
    }
}
