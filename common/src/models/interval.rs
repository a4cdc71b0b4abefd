// Candidate occurrences and their resolved placement

use crate::errors::ValidationError;
use crate::models::serde_ext::duration_range;
use crate::models::{BoundedInterval, Timestamp};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// The placement chosen by the solver: both bounds set, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ActualIntervalRepr", into = "ActualIntervalRepr")]
pub struct ActualInterval {
    bounds: Option<(Timestamp, Timestamp)>,
}

impl ActualInterval {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InconsistentActualInterval);
        }
        Ok(Self {
            bounds: Some((start, end)),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    pub fn start(&self) -> Option<Timestamp> {
        self.bounds.map(|(start, _)| start)
    }

    pub fn end(&self) -> Option<Timestamp> {
        self.bounds.map(|(_, end)| end)
    }

    /// `end - start`, derived rather than stored
    pub fn duration(&self) -> Option<Duration> {
        self.bounds.map(|(start, end)| end - start)
    }

    pub fn as_pair(&self) -> Option<(Timestamp, Timestamp)> {
        self.bounds
    }
}

#[derive(Serialize, Deserialize)]
struct ActualIntervalRepr {
    #[serde(default)]
    start: Option<Timestamp>,
    #[serde(default)]
    end: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
}

impl TryFrom<ActualIntervalRepr> for ActualInterval {
    type Error = ValidationError;

    fn try_from(repr: ActualIntervalRepr) -> Result<Self, Self::Error> {
        match (repr.start, repr.end) {
            (None, None) => Ok(ActualInterval::empty()),
            (Some(start), Some(end)) => ActualInterval::new(start, end),
            _ => Err(ValidationError::InconsistentActualInterval),
        }
    }
}

impl From<ActualInterval> for ActualIntervalRepr {
    fn from(actual: ActualInterval) -> Self {
        Self {
            start: actual.start(),
            end: actual.end(),
            duration: actual
                .duration()
                .map(|d| crate::time::duration_to_nanos(d) as f64 / 1e9),
        }
    }
}

/// One concrete candidate occurrence generated by a task template.
///
/// The three bounded ranges describe where the occurrence may be placed;
/// `actual_interval` stays empty until a solve selects and places it.
/// Solver variables are never stored here: the scheduler keeps them in a
/// side table keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleInterval {
    pub id: Uuid,
    pub name: String,
    pub mandatory: bool,
    pub priority: i64,
    pub start_interval: BoundedInterval<Timestamp>,
    pub end_interval: BoundedInterval<Timestamp>,
    #[serde(with = "duration_range")]
    pub duration_interval: BoundedInterval<Duration>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub actual_interval: ActualInterval,
    /// Id of the template that generated this occurrence (non-owning tag)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_task_id: Option<Uuid>,
}

impl ScheduleInterval {
    pub fn new(
        name: impl Into<String>,
        mandatory: bool,
        priority: i64,
        start_interval: BoundedInterval<Timestamp>,
        end_interval: BoundedInterval<Timestamp>,
        duration_interval: BoundedInterval<Duration>,
    ) -> Result<Self, ValidationError> {
        let interval = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            mandatory,
            priority,
            start_interval,
            end_interval,
            duration_interval,
            labels: BTreeSet::new(),
            actual_interval: ActualInterval::empty(),
            source_task_id: None,
        };
        interval.validate()?;
        Ok(interval)
    }

    pub fn with_source(mut self, task_id: Uuid) -> Self {
        self.source_task_id = Some(task_id);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    /// An occurrence cannot end before its earliest possible start
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start_interval.lower() > self.end_interval.upper() {
            return Err(ValidationError::StartAfterEnd);
        }
        Ok(())
    }

    /// The outermost span this occurrence can occupy
    pub fn effective_interval(&self) -> (Timestamp, Timestamp) {
        (self.start_interval.lower(), self.end_interval.upper())
    }

    pub fn is_scheduled(&self) -> bool {
        !self.actual_interval.is_empty()
    }
}
