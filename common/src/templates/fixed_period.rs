// Recurring task repeating a fixed pattern every period

use crate::errors::{TemplateError, ValidationError};
use crate::models::serde_ext::{duration_range, duration_secs};
use crate::models::{BoundedInterval, ScheduleInterval, Timestamp};
use crate::templates::TaskCommon;
use crate::time::{contains, scale, Period};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_period_unit_len() -> Duration {
    Duration::days(1)
}

/// RelativePeriodItem places one occurrence inside a period.
///
/// The ranges are offsets from the start of the `active_index`-th unit and
/// may under- or overflow that unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativePeriodItem {
    pub active_index: i64,
    #[serde(with = "duration_range")]
    pub start_interval: BoundedInterval<Duration>,
    #[serde(with = "duration_range")]
    pub end_interval: BoundedInterval<Duration>,
    #[serde(with = "duration_range")]
    pub duration_interval: BoundedInterval<Duration>,
}

impl RelativePeriodItem {
    pub fn new(
        active_index: i64,
        start_interval: BoundedInterval<Duration>,
        end_interval: BoundedInterval<Duration>,
        duration_interval: BoundedInterval<Duration>,
    ) -> Self {
        Self {
            active_index,
            start_interval,
            end_interval,
            duration_interval,
        }
    }
}

/// The batch of intervals generated for the period starting at `time_stamp`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedIntervals {
    pub time_stamp: Timestamp,
    #[serde(default)]
    pub intervals: Vec<ScheduleInterval>,
}

/// FixedPeriodTask repeats its period items in every period of
/// `period_unit_num * period_unit_len`, anchored at `anchor_date`.
///
/// Batches are generated lazily on query and cached in `container`, so a
/// period is materialised at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "FixedPeriodTaskDef")]
pub struct FixedPeriodTask {
    #[serde(flatten)]
    common: TaskCommon,
    #[serde(with = "duration_secs")]
    period_unit_len: Duration,
    period_unit_num: u32,
    anchor_date: Timestamp,
    effective_interval: BoundedInterval<Timestamp>,
    period_items: Vec<RelativePeriodItem>,
    container: Vec<TimestampedIntervals>,
    #[serde(skip)]
    offset_lb: Duration,
    #[serde(skip)]
    offset_rb: Duration,
    #[serde(skip)]
    period: Period,
}

#[derive(Deserialize)]
struct FixedPeriodTaskDef {
    #[serde(flatten)]
    common: TaskCommon,
    #[serde(default = "default_period_unit_len", with = "duration_secs")]
    period_unit_len: Duration,
    period_unit_num: u32,
    anchor_date: Timestamp,
    effective_interval: BoundedInterval<Timestamp>,
    period_items: Vec<RelativePeriodItem>,
    #[serde(default)]
    container: Vec<TimestampedIntervals>,
}

impl TryFrom<FixedPeriodTaskDef> for FixedPeriodTask {
    type Error = TemplateError;

    fn try_from(def: FixedPeriodTaskDef) -> Result<Self, Self::Error> {
        let mut task = Self::new(
            def.common,
            def.period_unit_len,
            def.period_unit_num,
            def.anchor_date,
            def.effective_interval,
            def.period_items,
        )?;
        task.container = def.container;
        Ok(task)
    }
}

impl PartialEq for FixedPeriodTask {
    fn eq(&self, other: &Self) -> bool {
        self.common == other.common
            && self.period_unit_len == other.period_unit_len
            && self.period_unit_num == other.period_unit_num
            && self.anchor_date == other.anchor_date
            && self.effective_interval == other.effective_interval
            && self.period_items == other.period_items
            && self.container == other.container
    }
}

impl FixedPeriodTask {
    pub fn new(
        common: TaskCommon,
        period_unit_len: Duration,
        period_unit_num: u32,
        anchor_date: Timestamp,
        effective_interval: BoundedInterval<Timestamp>,
        period_items: Vec<RelativePeriodItem>,
    ) -> Result<Self, TemplateError> {
        if period_unit_len <= Duration::zero() {
            return Err(ValidationError::NonPositiveLength {
                field: "period_unit_len".to_string(),
            }
            .into());
        }
        if period_unit_num == 0 {
            return Err(ValidationError::NonPositiveLength {
                field: "period_unit_num".to_string(),
            }
            .into());
        }
        if period_items.is_empty() {
            return Err(ValidationError::EmptyPeriodItems.into());
        }
        for item in &period_items {
            if item.active_index < 0 || item.active_index >= i64::from(period_unit_num) {
                return Err(ValidationError::InvalidIndex {
                    index: item.active_index,
                    unit_num: period_unit_num,
                }
                .into());
            }
            if item.start_interval.lower() > item.end_interval.upper() {
                return Err(ValidationError::StartAfterEnd.into());
            }
        }

        let (offset_lb, offset_rb) = Self::offsets(period_unit_len, &period_items)?;
        let period_len =
            scale(period_unit_len, i128::from(period_unit_num)).ok_or(TemplateError::Overflow)?;
        let period = Period::new(anchor_date, period_len)?;

        Ok(Self {
            common,
            period_unit_len,
            period_unit_num,
            anchor_date,
            effective_interval,
            period_items,
            container: Vec::new(),
            offset_lb,
            offset_rb,
            period,
        })
    }

    /// Leftmost possible start and rightmost possible end relative to a
    /// period start, across all items
    fn offsets(
        unit_len: Duration,
        items: &[RelativePeriodItem],
    ) -> Result<(Duration, Duration), TemplateError> {
        let mut lb: Option<Duration> = None;
        let mut rb: Option<Duration> = None;
        for item in items {
            let base = scale(unit_len, i128::from(item.active_index)).ok_or(TemplateError::Overflow)?;
            let start = base
                .checked_add(&item.start_interval.lower())
                .ok_or(TemplateError::Overflow)?;
            let end = base
                .checked_add(&item.end_interval.upper())
                .ok_or(TemplateError::Overflow)?;
            lb = Some(lb.map_or(start, |current| current.min(start)));
            rb = Some(rb.map_or(end, |current| current.max(end)));
        }
        match (lb, rb) {
            (Some(lb), Some(rb)) => Ok((lb, rb)),
            _ => Err(ValidationError::EmptyPeriodItems.into()),
        }
    }

    pub fn common(&self) -> &TaskCommon {
        &self.common
    }

    pub fn period_unit_len(&self) -> Duration {
        self.period_unit_len
    }

    pub fn period_unit_num(&self) -> u32 {
        self.period_unit_num
    }

    pub fn anchor_date(&self) -> Timestamp {
        self.anchor_date
    }

    pub fn effective_interval(&self) -> BoundedInterval<Timestamp> {
        self.effective_interval
    }

    pub fn period_items(&self) -> &[RelativePeriodItem] {
        &self.period_items
    }

    pub fn container(&self) -> &[TimestampedIntervals] {
        &self.container
    }

    /// Full period length: `period_unit_len * period_unit_num`
    pub fn period_len(&self) -> Duration {
        self.period.length()
    }

    /// Start timestamps of every batch generated so far
    pub fn datetime_stamps(&self) -> Vec<Timestamp> {
        self.container.iter().map(|batch| batch.time_stamp).collect()
    }

    pub fn intervals(&self) -> impl Iterator<Item = &ScheduleInterval> {
        self.container.iter().flat_map(|batch| batch.intervals.iter())
    }

    pub fn intervals_mut(&mut self) -> impl Iterator<Item = &mut ScheduleInterval> {
        self.container
            .iter_mut()
            .flat_map(|batch| batch.intervals.iter_mut())
    }

    /// Intervals of every period whose occupied envelope fits inside both
    /// `window` and the task's effective interval.
    ///
    /// Periods are visited in increasing order starting from the one holding
    /// `window.0` (or the next one when the first envelope does not fit), and
    /// the walk stops at the first envelope that does not fit.
    pub fn get_intervals(
        &mut self,
        window: (Timestamp, Timestamp),
    ) -> Result<Vec<ScheduleInterval>, TemplateError> {
        let period_len = self.period_len();
        let mut result = Vec::new();

        let mut current = window.0;
        let mut envelope = self.envelope_at(current)?;
        if !self.accepts(envelope, window)? {
            current = advance(current, period_len)?;
            envelope = self.envelope_at(current)?;
        }
        while self.accepts(envelope, window)? {
            let index = self.batch_index(current)?;
            result.extend(self.container[index].intervals.iter().cloned());
            current = advance(current, period_len)?;
            envelope = self.envelope_at(current)?;
        }

        debug!(
            task_id = %self.common.id,
            intervals = result.len(),
            "Collected periodic intervals"
        );
        Ok(result)
    }

    /// Real time span occupied by the period containing `at`
    fn envelope_at(&mut self, at: Timestamp) -> Result<(Timestamp, Timestamp), TemplateError> {
        let (period_start, _) = self.period.get_period(&at)?;
        Ok((
            advance(period_start, self.offset_lb)?,
            advance(period_start, self.offset_rb)?,
        ))
    }

    fn accepts(
        &self,
        envelope: (Timestamp, Timestamp),
        window: (Timestamp, Timestamp),
    ) -> Result<bool, TemplateError> {
        Ok(contains(&window, &envelope)?
            && contains(&self.effective_interval.as_pair(), &envelope)?)
    }

    /// Position of the cached batch for the period containing `at`,
    /// generating it first when missing
    fn batch_index(&mut self, at: Timestamp) -> Result<usize, TemplateError> {
        let (period_start, _) = self.period.get_period(&at)?;
        let existing: Vec<usize> = self
            .container
            .iter()
            .enumerate()
            .filter(|(_, batch)| batch.time_stamp == period_start)
            .map(|(index, _)| index)
            .collect();
        match existing.as_slice() {
            [index] => return Ok(*index),
            [] => {}
            _ => return Err(TemplateError::DuplicatePeriod(period_start.to_rfc3339())),
        }

        let mut intervals = Vec::with_capacity(self.period_items.len());
        for item in &self.period_items {
            let unit_offset = scale(self.period_unit_len, i128::from(item.active_index))
                .ok_or(TemplateError::Overflow)?;
            let base = advance(period_start, unit_offset)?;
            let start_interval = offset_range(base, item.start_interval)?;
            let end_interval = offset_range(base, item.end_interval)?;
            let interval = ScheduleInterval::new(
                format!("{}{}", self.common.name, end_interval.lower().to_rfc3339()),
                self.common.mandatory,
                self.common.priority,
                start_interval,
                end_interval,
                item.duration_interval,
            )?
            .with_source(self.common.id);
            intervals.push(interval);
        }

        self.container.push(TimestampedIntervals {
            time_stamp: period_start,
            intervals,
        });
        Ok(self.container.len() - 1)
    }
}

fn advance(at: Timestamp, by: Duration) -> Result<Timestamp, TemplateError> {
    at.checked_add_signed(by).ok_or(TemplateError::Overflow)
}

fn offset_range(
    base: Timestamp,
    range: BoundedInterval<Duration>,
) -> Result<BoundedInterval<Timestamp>, TemplateError> {
    Ok(BoundedInterval::new(
        advance(base, range.lower())?,
        advance(base, range.upper())?,
    )?)
}
