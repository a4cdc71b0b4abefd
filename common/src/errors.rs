// Error handling framework
// Validation, containment and state errors raised by the scheduling engine.
// Solver outcomes (infeasible / unknown) are reported as values, not errors.

use thiserror::Error;
use uuid::Uuid;

/// Errors from closed-range arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Invalid range: lower bound {lower} is greater than upper bound {upper}")]
    InvalidRange { lower: String, upper: String },

    #[error("Ranges do not intersect")]
    NoIntersection,

    #[error("Unsupported containment mode: {0}")]
    UnsupportedMode(String),
}

/// Validation errors raised while constructing domain entities
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Active index {index} is outside [0, {unit_num})")]
    InvalidIndex { index: i64, unit_num: u32 },

    #[error("Either group_name or label must be provided")]
    MissingTarget,

    #[error("A periodic task needs at least one period item")]
    EmptyPeriodItems,

    #[error("{field} must be greater than zero")]
    NonPositiveLength { field: String },

    #[error("Start lower bound must be <= end upper bound")]
    StartAfterEnd,

    #[error("Actual interval must have both bounds or none, with start <= end")]
    InconsistentActualInterval,

    #[error("Stored repetitions do not match the task: {reason}")]
    RepetitionMismatch { reason: String },

    #[error(transparent)]
    Interval(#[from] IntervalError),
}

/// Errors raised while expanding task templates into intervals
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Duplicate interval batch for period starting at {0}")]
    DuplicatePeriod(String),

    #[error("No period found containing {0}")]
    PeriodNotFound(String),

    #[error("Time arithmetic overflowed")]
    Overflow,

    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors raised by the scheduler while building or solving a model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Interval {interval_id} is not contained in the schedule window")]
    OutOfRange { interval_id: Uuid },

    #[error("Scheduler must be built before solving")]
    NotBuilt,

    #[error("Scheduler is already built; reset it before building again")]
    AlreadyBuilt,

    #[error("Unit length must be greater than zero")]
    InvalidUnitLength,

    #[error("Time value does not fit the solver's integer domain")]
    UnitOverflow,

    #[error("Solver failure: {0}")]
    Solver(String),

    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Persistence errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Filesystem error: {0}")]
    Io(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Task pool not found: {0}")]
    NotFound(i64),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::InvalidJson(err.to_string())
    }
}

impl IntervalError {
    pub(crate) fn invalid_range<T: std::fmt::Debug>(lower: &T, upper: &T) -> Self {
        IntervalError::InvalidRange {
            lower: format!("{:?}", lower),
            upper: format!("{:?}", upper),
        }
    }
}
