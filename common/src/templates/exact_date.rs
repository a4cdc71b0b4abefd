// One-off task repeated a fixed number of times within a single range

use crate::errors::{TemplateError, ValidationError};
use crate::models::serde_ext::duration_range;
use crate::models::{BoundedInterval, ScheduleInterval, Timestamp};
use crate::templates::TaskCommon;
use crate::time::contains;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Holder for the eagerly generated repetitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalList {
    #[serde(default)]
    pub intervals: Vec<ScheduleInterval>,
}

/// ExactDateTask produces `repetition` identical candidates sharing the
/// same start, end and duration ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExactDateTaskDef")]
pub struct ExactDateTask {
    #[serde(flatten)]
    common: TaskCommon,
    repetition: u32,
    start_interval: BoundedInterval<Timestamp>,
    end_interval: BoundedInterval<Timestamp>,
    #[serde(with = "duration_range")]
    duration_interval: BoundedInterval<Duration>,
    container: IntervalList,
}

#[derive(Deserialize)]
struct ExactDateTaskDef {
    #[serde(flatten)]
    common: TaskCommon,
    repetition: u32,
    start_interval: BoundedInterval<Timestamp>,
    end_interval: BoundedInterval<Timestamp>,
    #[serde(with = "duration_range")]
    duration_interval: BoundedInterval<Duration>,
    #[serde(default)]
    container: Option<IntervalList>,
}

impl TryFrom<ExactDateTaskDef> for ExactDateTask {
    type Error = TemplateError;

    fn try_from(def: ExactDateTaskDef) -> Result<Self, Self::Error> {
        let mut task = Self::new(
            def.common,
            def.repetition,
            def.start_interval,
            def.end_interval,
            def.duration_interval,
        )?;
        // Persisted repetitions keep their ids and resolutions
        if let Some(container) = def.container {
            task.check_stored(&container)?;
            task.container = container;
        }
        Ok(task)
    }
}

impl ExactDateTask {
    pub fn new(
        common: TaskCommon,
        repetition: u32,
        start_interval: BoundedInterval<Timestamp>,
        end_interval: BoundedInterval<Timestamp>,
        duration_interval: BoundedInterval<Duration>,
    ) -> Result<Self, TemplateError> {
        if start_interval.lower() > end_interval.upper() {
            return Err(ValidationError::StartAfterEnd.into());
        }

        let intervals = (0..repetition)
            .map(|i| {
                ScheduleInterval::new(
                    format!("{}{}", common.name, i),
                    common.mandatory,
                    common.priority,
                    start_interval,
                    end_interval,
                    duration_interval,
                )
                .map(|interval| interval.with_source(common.id))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            common,
            repetition,
            start_interval,
            end_interval,
            duration_interval,
            container: IntervalList { intervals },
        })
    }

    /// Every stored repetition must carry this task's ranges
    fn check_stored(&self, stored: &IntervalList) -> Result<(), ValidationError> {
        if stored.intervals.len() != self.repetition as usize {
            return Err(ValidationError::RepetitionMismatch {
                reason: format!(
                    "expected {} repetitions, found {}",
                    self.repetition,
                    stored.intervals.len()
                ),
            });
        }
        for interval in &stored.intervals {
            if interval.start_interval != self.start_interval
                || interval.end_interval != self.end_interval
                || interval.duration_interval != self.duration_interval
            {
                return Err(ValidationError::RepetitionMismatch {
                    reason: format!("interval {} has different ranges", interval.name),
                });
            }
        }
        Ok(())
    }

    pub fn common(&self) -> &TaskCommon {
        &self.common
    }

    pub fn repetition(&self) -> u32 {
        self.repetition
    }

    pub fn start_interval(&self) -> BoundedInterval<Timestamp> {
        self.start_interval
    }

    pub fn end_interval(&self) -> BoundedInterval<Timestamp> {
        self.end_interval
    }

    pub fn duration_interval(&self) -> BoundedInterval<Duration> {
        self.duration_interval
    }

    /// `(start_interval.lower, end_interval.upper)`
    pub fn effective_interval(&self) -> (Timestamp, Timestamp) {
        (self.start_interval.lower(), self.end_interval.upper())
    }

    pub fn intervals(&self) -> &[ScheduleInterval] {
        &self.container.intervals
    }

    pub fn intervals_mut(&mut self) -> &mut [ScheduleInterval] {
        &mut self.container.intervals
    }

    /// All repetitions when the effective interval fits inside `window`,
    /// nothing otherwise. There is no partial slicing.
    pub fn get_intervals(
        &mut self,
        window: (Timestamp, Timestamp),
    ) -> Result<Vec<ScheduleInterval>, TemplateError> {
        if contains(&window, &self.effective_interval())? {
            Ok(self.container.intervals.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn anchor() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().fixed_offset()
    }

    fn task(repetition: u32) -> ExactDateTask {
        let start = anchor();
        let end = start + Duration::hours(3);
        ExactDateTask::new(
            TaskCommon::new("exact_demo", true, 1),
            repetition,
            BoundedInterval::exact(start),
            BoundedInterval::exact(end),
            BoundedInterval::exact(Duration::hours(3)),
        )
        .unwrap()
    }

    #[test]
    fn test_repetitions_generated_eagerly() {
        let task = task(3);
        let names: Vec<_> = task.intervals().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["exact_demo0", "exact_demo1", "exact_demo2"]);
        assert!(task
            .intervals()
            .iter()
            .all(|i| i.source_task_id == Some(task.common().id) && i.mandatory));
    }

    #[test]
    fn test_window_containment_is_all_or_nothing() {
        let mut task = task(15);
        let full = (anchor(), anchor() + Duration::hours(168));
        assert_eq!(task.get_intervals(full).unwrap().len(), 15);

        let partial = (anchor() + Duration::hours(1), anchor() + Duration::hours(168));
        assert!(task.get_intervals(partial).unwrap().is_empty());

        let disjoint = (anchor() + Duration::days(10), anchor() + Duration::days(11));
        assert!(task.get_intervals(disjoint).unwrap().is_empty());
    }

    #[test]
    fn test_zero_repetitions() {
        let mut task = task(0);
        let full = (anchor(), anchor() + Duration::hours(168));
        assert!(task.get_intervals(full).unwrap().is_empty());
    }

    #[test]
    fn test_start_after_end_rejected() {
        let result = ExactDateTask::new(
            TaskCommon::new("bad", false, 1),
            1,
            BoundedInterval::exact(anchor() + Duration::hours(5)),
            BoundedInterval::exact(anchor()),
            BoundedInterval::exact(Duration::hours(1)),
        );
        assert!(matches!(
            result,
            Err(TemplateError::Validation(ValidationError::StartAfterEnd))
        ));
    }

    #[test]
    fn test_round_trip_keeps_interval_ids() {
        let task = task(2);
        let json = serde_json::to_string(&task).unwrap();
        let back: ExactDateTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_missing_container_regenerates() {
        let task = task(2);
        let mut json = serde_json::to_value(&task).unwrap();
        json.as_object_mut().unwrap().remove("container");
        let back: ExactDateTask = serde_json::from_value(json).unwrap();
        assert_eq!(back.intervals().len(), 2);
        assert_eq!(back.common(), task.common());
    }

    #[test]
    fn test_stored_repetition_count_must_match() {
        let task = task(2);
        let mut json = serde_json::to_value(&task).unwrap();
        json["repetition"] = serde_json::json!(3);
        let err = serde_json::from_value::<ExactDateTask>(json).unwrap_err();
        assert!(err.to_string().contains("expected 3 repetitions, found 2"));
    }

    #[test]
    fn test_stored_repetition_ranges_must_match() {
        let task = task(2);
        let mut json = serde_json::to_value(&task).unwrap();
        json["container"]["intervals"][1]["duration_interval"] = serde_json::json!([3600, 7200]);
        let err = serde_json::from_value::<ExactDateTask>(json).unwrap_err();
        assert!(err.to_string().contains("exact_demo1 has different ranges"));
    }

    #[test]
    fn test_check_stored_reports_validation_error() {
        let task = task(1);
        let empty = IntervalList::default();
        assert!(matches!(
            task.check_stored(&empty),
            Err(ValidationError::RepetitionMismatch { .. })
        ));
        assert_eq!(task.check_stored(&task.container), Ok(()));
    }
}
