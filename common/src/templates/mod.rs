// Task templates: generators of candidate schedule intervals

pub mod exact_date;
pub mod fixed_period;

use crate::errors::TemplateError;
use crate::models::{ScheduleInterval, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use exact_date::ExactDateTask;
pub use fixed_period::{FixedPeriodTask, RelativePeriodItem, TimestampedIntervals};

/// TaskCommon holds the fields every template copies onto its intervals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCommon {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub mandatory: bool,
    pub priority: i64,
}

impl TaskCommon {
    pub fn new(name: impl Into<String>, mandatory: bool, priority: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            mandatory,
            priority,
        }
    }
}

/// TaskTemplate represents a recurring or one-off task definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "template_type", rename_all = "snake_case")]
pub enum TaskTemplate {
    ExactDate(ExactDateTask),
    FixedPeriod(FixedPeriodTask),
}

impl TaskTemplate {
    pub fn id(&self) -> Uuid {
        self.common().id
    }

    pub fn name(&self) -> &str {
        &self.common().name
    }

    pub fn common(&self) -> &TaskCommon {
        match self {
            TaskTemplate::ExactDate(task) => task.common(),
            TaskTemplate::FixedPeriod(task) => task.common(),
        }
    }

    /// Candidate intervals falling inside `window`.
    ///
    /// Periodic templates cache every batch they generate, so this takes
    /// `&mut self`; the returned intervals are snapshots of the cached ones.
    pub fn get_intervals(
        &mut self,
        window: (Timestamp, Timestamp),
    ) -> Result<Vec<ScheduleInterval>, TemplateError> {
        match self {
            TaskTemplate::ExactDate(task) => task.get_intervals(window),
            TaskTemplate::FixedPeriod(task) => task.get_intervals(window),
        }
    }

    /// Every interval the template currently holds
    pub fn intervals(&self) -> Box<dyn Iterator<Item = &ScheduleInterval> + '_> {
        match self {
            TaskTemplate::ExactDate(task) => Box::new(task.intervals().iter()),
            TaskTemplate::FixedPeriod(task) => Box::new(task.intervals()),
        }
    }

    pub fn intervals_mut(&mut self) -> Box<dyn Iterator<Item = &mut ScheduleInterval> + '_> {
        match self {
            TaskTemplate::ExactDate(task) => Box::new(task.intervals_mut().iter_mut()),
            TaskTemplate::FixedPeriod(task) => Box::new(task.intervals_mut()),
        }
    }

    pub fn interval_mut(&mut self, interval_id: &Uuid) -> Option<&mut ScheduleInterval> {
        self.intervals_mut().find(|interval| interval.id == *interval_id)
    }
}

impl From<ExactDateTask> for TaskTemplate {
    fn from(task: ExactDateTask) -> Self {
        TaskTemplate::ExactDate(task)
    }
}

impl From<FixedPeriodTask> for TaskTemplate {
    fn from(task: FixedPeriodTask) -> Self {
        TaskTemplate::FixedPeriod(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundedInterval;
    use chrono::{Duration, TimeZone, Utc};

    fn exact() -> TaskTemplate {
        let anchor: Timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().fixed_offset();
        ExactDateTask::new(
            TaskCommon::new("exact_demo", true, 1),
            2,
            BoundedInterval::exact(anchor),
            BoundedInterval::exact(anchor + Duration::hours(3)),
            BoundedInterval::exact(Duration::hours(3)),
        )
        .unwrap()
        .into()
    }

    #[test]
    fn test_template_type_tag() {
        let json = serde_json::to_value(exact()).unwrap();
        assert_eq!(json["template_type"], "exact_date");
        assert_eq!(json["name"], "exact_demo");
    }

    #[test]
    fn test_missing_id_gets_generated() {
        let common: TaskCommon =
            serde_json::from_str(r#"{"name": "x", "mandatory": false, "priority": 2}"#).unwrap();
        assert!(!common.id.is_nil());
    }

    #[test]
    fn test_interval_mut_finds_owned_interval() {
        let mut task = exact();
        let target = task.intervals().nth(1).unwrap().id;
        task.interval_mut(&target).unwrap().priority = 42;
        assert_eq!(task.intervals().filter(|i| i.priority == 42).count(), 1);
        assert!(task.interval_mut(&Uuid::new_v4()).is_none());
    }
}
