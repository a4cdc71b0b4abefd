// Side table linking domain intervals to solver variables

use crate::cp::{BoolVar, CpModel, IntVar, IntervalVar};
use crate::errors::SchedulerError;
use crate::models::ScheduleInterval;
use crate::scheduler::grid::TimeGrid;
use std::collections::HashMap;
use uuid::Uuid;

/// The solver variables created for one interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverHandles {
    pub start: IntVar,
    pub end: IntVar,
    pub duration: IntVar,
    pub presence: BoolVar,
    pub interval: IntervalVar,
}

/// ModelBinding owns the model of one build together with the handles of
/// every interval, keyed by interval id
#[derive(Debug, Default)]
pub struct ModelBinding {
    model: CpModel,
    handles: HashMap<Uuid, SolverHandles>,
}

impl ModelBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> &CpModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut CpModel {
        &mut self.model
    }

    pub fn handles(&self, interval_id: &Uuid) -> Option<&SolverHandles> {
        self.handles.get(interval_id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Create start, end, duration and presence variables plus the optional
    /// interval tying them together. Mandatory intervals get `presence == 1`.
    pub fn bind_interval(
        &mut self,
        interval: &ScheduleInterval,
        grid: &TimeGrid,
    ) -> Result<SolverHandles, SchedulerError> {
        grid.check_contains(interval)?;
        let (min_start, max_start) = grid.to_units_pair(&interval.start_interval)?;
        let (min_end, max_end) = grid.to_units_pair(&interval.end_interval)?;
        let (min_duration, max_duration) = grid.duration_units_pair(&interval.duration_interval)?;

        let name = &interval.name;
        let start = self
            .model
            .new_int_var(min_start, max_start, format!("{name}_start_var"));
        let end = self
            .model
            .new_int_var(min_end, max_end, format!("{name}_end_var"));
        let duration =
            self.model
                .new_int_var(min_duration, max_duration, format!("{name}_duration_var"));
        let presence = self.model.new_bool_var(format!("{name}_presence_var"));
        let solver_interval = self.model.new_optional_interval(
            start,
            duration,
            end,
            presence,
            format!("{name}_interval_var"),
        );
        if interval.mandatory {
            self.model.add_equality(presence.var(), 1);
        }

        let handles = SolverHandles {
            start,
            end,
            duration,
            presence,
            interval: solver_interval,
        };
        self.handles.insert(interval.id, handles);
        Ok(handles)
    }
}
