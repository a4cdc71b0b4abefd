// Closed-range arithmetic and periodic anchors
//
// Every range is an ordered pair (lower, upper) with lower <= upper. The pair
// is re-validated on each call so that malformed input is caught at the
// boundary where it is used, not silently corrected.

use crate::errors::{IntervalError, TemplateError, ValidationError};
use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use std::fmt::Debug;
use std::str::FromStr;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Containment semantics for [`is_inside`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsideMode {
    /// `[lower, upper)`
    ClosedOpen,
    /// `(lower, upper]`
    OpenClosed,
    /// `[lower, upper]`
    Closed,
    /// `(lower, upper)`
    Open,
}

impl FromStr for InsideMode {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CO" => Ok(InsideMode::ClosedOpen),
            "OC" => Ok(InsideMode::OpenClosed),
            "CC" => Ok(InsideMode::Closed),
            "OO" => Ok(InsideMode::Open),
            other => Err(IntervalError::UnsupportedMode(other.to_string())),
        }
    }
}

/// Check that `lower <= upper`
pub fn validate_range<T: PartialOrd + Debug>(range: &(T, T)) -> Result<(), IntervalError> {
    if range.0 <= range.1 {
        Ok(())
    } else {
        Err(IntervalError::invalid_range(&range.0, &range.1))
    }
}

/// Whether two closed ranges share at least one point
pub fn overlaps<T: PartialOrd + Debug>(a: &(T, T), b: &(T, T)) -> Result<bool, IntervalError> {
    validate_range(a)?;
    validate_range(b)?;
    Ok(a.0 <= b.1 && b.0 <= a.1)
}

/// The common part of two closed ranges
pub fn intersect<T: PartialOrd + Copy + Debug>(
    a: &(T, T),
    b: &(T, T),
) -> Result<(T, T), IntervalError> {
    validate_range(a)?;
    validate_range(b)?;
    let left = if a.0 >= b.0 { a.0 } else { b.0 };
    let right = if a.1 <= b.1 { a.1 } else { b.1 };
    if left > right {
        return Err(IntervalError::NoIntersection);
    }
    Ok((left, right))
}

/// Whether `inner` lies completely within `outer`
pub fn contains<T: PartialOrd + Debug>(outer: &(T, T), inner: &(T, T)) -> Result<bool, IntervalError> {
    validate_range(outer)?;
    validate_range(inner)?;
    Ok(outer.0 <= inner.0 && inner.1 <= outer.1)
}

/// Whether `point` lies inside `range`. Only closed-open containment is supported.
pub fn is_inside<T: PartialOrd + Debug>(
    range: &(T, T),
    point: &T,
    mode: InsideMode,
) -> Result<bool, IntervalError> {
    validate_range(range)?;
    match mode {
        InsideMode::ClosedOpen => Ok(range.0 <= *point && *point < range.1),
        other => Err(IntervalError::UnsupportedMode(format!("{:?}", other))),
    }
}

/// Shorthand for closed-open containment
pub fn is_inside_half_open<T: PartialOrd + Debug>(
    range: &(T, T),
    point: &T,
) -> Result<bool, IntervalError> {
    is_inside(range, point, InsideMode::ClosedOpen)
}

/// Total nanoseconds of a duration, widened so that products never overflow
pub fn duration_to_nanos(d: Duration) -> i128 {
    d.num_seconds() as i128 * NANOS_PER_SEC + d.subsec_nanos() as i128
}

/// Inverse of [`duration_to_nanos`]; `None` when the value is outside chrono's range
pub fn duration_from_nanos(nanos: i128) -> Option<Duration> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC)).ok()?;
    let sub = nanos.rem_euclid(NANOS_PER_SEC) as i64;
    Duration::try_seconds(secs)?.checked_add(&Duration::nanoseconds(sub))
}

/// `floor(num / den)`; `den` must be positive
pub fn floor_div(num: Duration, den: Duration) -> i128 {
    duration_to_nanos(num).div_euclid(duration_to_nanos(den))
}

/// `ceil(num / den)`; `den` must be positive
pub fn ceil_div(num: Duration, den: Duration) -> i128 {
    -(-duration_to_nanos(num)).div_euclid(duration_to_nanos(den))
}

/// `len * count`, checked
pub fn scale(len: Duration, count: i128) -> Option<Duration> {
    duration_from_nanos(duration_to_nanos(len).checked_mul(count)?)
}

/// Truncate a timestamp to midnight of its own calendar day, keeping its offset
pub fn retain_date(dt: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    let midnight = dt.date_naive().and_hms_opt(0, 0, 0)?;
    dt.offset().from_local_datetime(&midnight).single()
}

/// Anchored partition of the timeline into consecutive half-open periods
/// of equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    anchor: DateTime<FixedOffset>,
    length: Duration,
    current: (DateTime<FixedOffset>, DateTime<FixedOffset>),
}

impl Period {
    /// Create a period helper; the first current period starts at the anchor
    pub fn new(anchor: DateTime<FixedOffset>, length: Duration) -> Result<Self, TemplateError> {
        if length <= Duration::zero() {
            return Err(ValidationError::NonPositiveLength {
                field: "period length".to_string(),
            }
            .into());
        }
        let end = anchor.checked_add_signed(length).ok_or(TemplateError::Overflow)?;
        Ok(Self {
            anchor,
            length,
            current: (anchor, end),
        })
    }

    pub fn anchor(&self) -> DateTime<FixedOffset> {
        self.anchor
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    /// The most recently located or stepped period
    pub fn current(&self) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        self.current
    }

    /// Locate the period containing `target` (left-inclusive)
    pub fn get_period<Tz: TimeZone>(
        &mut self,
        target: &DateTime<Tz>,
    ) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), TemplateError> {
        let target = target.with_timezone(&self.anchor.timezone());
        let count = floor_div(target - self.anchor, self.length);
        let offset = scale(self.length, count).ok_or(TemplateError::Overflow)?;
        let pivot_start = self
            .anchor
            .checked_add_signed(offset)
            .ok_or(TemplateError::Overflow)?;
        let pivot = (pivot_start, self.shift(pivot_start, 1)?);
        if is_inside_half_open(&pivot, &target)? {
            self.current = pivot;
            return Ok(pivot);
        }

        let neighbour = if target < pivot.0 {
            (self.shift(pivot.0, -1)?, pivot.0)
        } else {
            (pivot.1, self.shift(pivot.1, 1)?)
        };
        if is_inside_half_open(&neighbour, &target)? {
            self.current = neighbour;
            return Ok(neighbour);
        }

        Err(TemplateError::PeriodNotFound(target.to_rfc3339()))
    }

    /// Step the current period forward by one length
    pub fn next_period(&mut self) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), TemplateError> {
        let start = self.current.1;
        self.current = (start, self.shift(start, 1)?);
        Ok(self.current)
    }

    /// Step the current period backward by one length
    pub fn prev_period(&mut self) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), TemplateError> {
        let end = self.current.0;
        self.current = (self.shift(end, -1)?, end);
        Ok(self.current)
    }

    fn shift(
        &self,
        at: DateTime<FixedOffset>,
        periods: i128,
    ) -> Result<DateTime<FixedOffset>, TemplateError> {
        let by = scale(self.length, periods).ok_or(TemplateError::Overflow)?;
        at.checked_add_signed(by).ok_or(TemplateError::Overflow)
    }
}
