// Scheduler engine: builds a constraint model from a pool and writes the
// solver's placements back onto it

use crate::context::SchedulingContext;
use crate::cp::{ConstraintSolver, LinearExpr, PumpkinSolver, SolveOptions, SolveStatus};
use crate::errors::SchedulerError;
use crate::models::{ActualInterval, IntervalMap, Timestamp};
use crate::pool::TaskPool;
use crate::scheduler::binding::ModelBinding;
use crate::scheduler::grid::TimeGrid;
use crate::telemetry;
use chrono::Duration;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Lifecycle of a [`Scheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Unbuilt,
    Built,
    Solved,
}

/// Result of one solve
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub objective: Option<i64>,
    pub scheduled: usize,
    pub unscheduled: usize,
    /// Wall time spent in the solver
    pub elapsed_ms: u64,
    /// Snapshot of the window's intervals with their placements
    pub intervals: IntervalMap,
}

struct BuiltModel {
    grid: TimeGrid,
    binding: ModelBinding,
    interval_map: IntervalMap,
}

/// Scheduler owns a pool for one build/solve cycle.
///
/// `build` turns every interval of the window into solver variables and
/// applies the pool's constraints; `solve` maximises the summed priority of
/// the placed intervals and records each placement as the interval's
/// `actual_interval`. Use [`Scheduler::reset`] to take the pool back.
pub struct Scheduler<S = PumpkinSolver> {
    solver: S,
    options: SolveOptions,
    state: SchedulerState,
    pool: Option<TaskPool>,
    built: Option<BuiltModel>,
}

impl Default for Scheduler<PumpkinSolver> {
    fn default() -> Self {
        Self::new(PumpkinSolver::new(), SolveOptions::default())
    }
}

impl<S: ConstraintSolver> Scheduler<S> {
    pub fn new(solver: S, options: SolveOptions) -> Self {
        Self {
            solver,
            options,
            state: SchedulerState::Unbuilt,
            pool: None,
            built: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    pub fn pool(&self) -> Option<&TaskPool> {
        self.pool.as_ref()
    }

    /// Intervals of the built window, with placements after a solve
    pub fn interval_map(&self) -> Option<&IntervalMap> {
        self.built.as_ref().map(|built| &built.interval_map)
    }

    pub fn binding(&self) -> Option<&ModelBinding> {
        self.built.as_ref().map(|built| &built.binding)
    }

    pub fn grid(&self) -> Option<&TimeGrid> {
        self.built.as_ref().map(|built| &built.grid)
    }

    /// Drop the model and hand back the pool
    pub fn reset(&mut self) -> Option<TaskPool> {
        self.built = None;
        self.state = SchedulerState::Unbuilt;
        self.pool.take()
    }

    pub fn into_pool(self) -> Option<TaskPool> {
        self.pool
    }

    /// Build the model for `window` discretised in steps of `unit_length`.
    ///
    /// When building fails after the pool was accepted, the pool stays in
    /// the scheduler and can be recovered with [`Scheduler::reset`].
    #[instrument(skip(self, pool), fields(pool_id = pool.id, window_start = %window.0, window_end = %window.1))]
    pub fn build(
        &mut self,
        pool: TaskPool,
        window: (Timestamp, Timestamp),
        unit_length: Duration,
    ) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Unbuilt {
            return Err(SchedulerError::AlreadyBuilt);
        }
        self.built = None;
        let pool = self.pool.insert(pool);

        let grid = TimeGrid::new(window, unit_length)?;
        let interval_map = pool.get_intervals(window)?;
        let pool: &TaskPool = pool;

        let mut binding = ModelBinding::new();
        {
            let ctx = SchedulingContext::new(pool, &interval_map);
            for interval in ctx.all_intervals() {
                let handles = binding.bind_interval(interval, &grid)?;
                debug!(
                    interval_id = %interval.id,
                    interval_name = %interval.name,
                    mandatory = interval.mandatory,
                    start = ?binding.model().var_bounds(handles.start),
                    end = ?binding.model().var_bounds(handles.end),
                    duration = ?binding.model().var_bounds(handles.duration),
                    "Interval bound to solver variables"
                );
            }
            for constraint in &pool.constraints {
                constraint.apply(&ctx, &mut binding);
            }
        }

        info!(
            tasks = interval_map.len(),
            intervals = binding.len(),
            variables = binding.model().num_variables(),
            constraints = binding.model().num_constraints(),
            "Scheduling model built"
        );

        self.built = Some(BuiltModel {
            grid,
            binding,
            interval_map,
        });
        self.state = SchedulerState::Built;
        Ok(())
    }

    /// Solve the built model. A failed solve is reported through the status
    /// and leaves every placement untouched.
    #[instrument(skip(self))]
    pub fn solve(&mut self) -> Result<SolveReport, SchedulerError> {
        let built = self.built.as_mut().ok_or(SchedulerError::NotBuilt)?;

        let mut objective = LinearExpr::new();
        for interval in built.interval_map.intervals() {
            if let Some(handles) = built.binding.handles(&interval.id) {
                objective.add_term(interval.priority, handles.presence.var());
            }
        }
        built.binding.model_mut().maximize(objective);

        let solution = self.solver.solve(built.binding.model(), &self.options);
        let status = solution.status;
        let total = built.interval_map.interval_count();

        let mut resolutions: HashMap<Uuid, ActualInterval> = HashMap::new();
        if status.is_success() {
            for interval in built.interval_map.intervals() {
                let Some(handles) = built.binding.handles(&interval.id) else {
                    continue;
                };
                let actual = if solution.bool_value(handles.presence) == Some(true) {
                    let (start, end) = solution
                        .value(handles.start)
                        .zip(solution.value(handles.end))
                        .ok_or_else(|| {
                            SchedulerError::Solver(format!(
                                "no value reported for interval {}",
                                interval.name
                            ))
                        })?;
                    ActualInterval::new(built.grid.to_time(start)?, built.grid.to_time(end)?)?
                } else {
                    ActualInterval::empty()
                };
                resolutions.insert(interval.id, actual);
            }

            for (interval_id, actual) in &resolutions {
                if let Some(interval) = built.interval_map.find_interval_mut(interval_id) {
                    interval.actual_interval = *actual;
                }
            }
            if let Some(pool) = self.pool.as_mut() {
                pool.apply_resolutions(&resolutions);
            }
        } else {
            warn!(
                status = %status,
                intervals = total,
                "Solver found no schedule"
            );
        }

        let scheduled = resolutions.values().filter(|actual| !actual.is_empty()).count();
        let elapsed_ms = u64::try_from(solution.wall_time.as_millis()).unwrap_or(u64::MAX);
        telemetry::record_solve(status.as_str(), solution.wall_time.as_secs_f64(), scheduled);
        info!(
            status = %status,
            objective = ?solution.objective,
            scheduled,
            unscheduled = total - scheduled,
            elapsed_ms,
            "Solve finished"
        );

        self.state = SchedulerState::Solved;
        Ok(SolveReport {
            status,
            objective: solution.objective,
            scheduled,
            unscheduled: total - scheduled,
            elapsed_ms,
            intervals: built.interval_map.clone(),
        })
    }
}
