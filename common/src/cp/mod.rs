// Constraint model for interval scheduling and the solver seam

mod pumpkin;

pub use pumpkin::PumpkinSolver;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Handle to a bounded integer variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntVar(usize);

impl IntVar {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to a 0/1 variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoolVar(IntVar);

impl BoolVar {
    pub fn var(&self) -> IntVar {
        self.0
    }
}

/// Handle to an optional interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalVar(usize);

impl IntervalVar {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VariableDef {
    pub(crate) name: String,
    pub(crate) lower: i64,
    pub(crate) upper: i64,
}

/// `start + duration == end`, enforced only while `presence` is true
#[derive(Debug, Clone)]
pub struct IntervalDef {
    pub name: String,
    pub start: IntVar,
    pub duration: IntVar,
    pub end: IntVar,
    pub presence: BoolVar,
}

/// Weighted sum of variables plus a constant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearExpr {
    terms: Vec<(i64, IntVar)>,
    constant: i64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, coefficient: i64, var: IntVar) -> &mut Self {
        self.terms.push((coefficient, var));
        self
    }

    pub fn add_constant(&mut self, value: i64) -> &mut Self {
        self.constant = self.constant.saturating_add(value);
        self
    }

    pub fn terms(&self) -> &[(i64, IntVar)] {
        &self.terms
    }

    pub fn constant(&self) -> i64 {
        self.constant
    }

    /// Value of the expression under a full assignment
    pub fn evaluate(&self, values: &[i64]) -> i64 {
        self.terms.iter().fold(self.constant, |acc, (coefficient, var)| {
            let value = values.get(var.0).copied().unwrap_or(0);
            acc.saturating_add(coefficient.saturating_mul(value))
        })
    }
}

/// CpModel collects variables and constraints before solving.
///
/// It holds bounded integer variables, optional intervals tied to a
/// presence variable, no-overlap rules, equalities and one maximisation
/// objective.
#[derive(Debug, Clone, Default)]
pub struct CpModel {
    pub(crate) variables: Vec<VariableDef>,
    pub(crate) intervals: Vec<IntervalDef>,
    pub(crate) no_overlaps: Vec<Vec<IntervalVar>>,
    pub(crate) equalities: Vec<(IntVar, i64)>,
    pub(crate) objective: Option<LinearExpr>,
}

impl CpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_int_var(&mut self, lower: i64, upper: i64, name: impl Into<String>) -> IntVar {
        self.variables.push(VariableDef {
            name: name.into(),
            lower,
            upper,
        });
        IntVar(self.variables.len() - 1)
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> BoolVar {
        BoolVar(self.new_int_var(0, 1, name))
    }

    pub fn new_optional_interval(
        &mut self,
        start: IntVar,
        duration: IntVar,
        end: IntVar,
        presence: BoolVar,
        name: impl Into<String>,
    ) -> IntervalVar {
        self.intervals.push(IntervalDef {
            name: name.into(),
            start,
            duration,
            end,
            presence,
        });
        IntervalVar(self.intervals.len() - 1)
    }

    /// No two present intervals of the set may overlap in time
    pub fn add_no_overlap(&mut self, intervals: Vec<IntervalVar>) {
        self.no_overlaps.push(intervals);
    }

    pub fn add_equality(&mut self, var: IntVar, value: i64) {
        self.equalities.push((var, value));
    }

    /// Replace the objective
    pub fn maximize(&mut self, objective: LinearExpr) {
        self.objective = Some(objective);
    }

    pub fn var_name(&self, var: IntVar) -> Option<&str> {
        self.variables.get(var.0).map(|def| def.name.as_str())
    }

    pub fn var_bounds(&self, var: IntVar) -> Option<(i64, i64)> {
        self.variables.get(var.0).map(|def| (def.lower, def.upper))
    }

    pub fn interval(&self, interval: IntervalVar) -> Option<&IntervalDef> {
        self.intervals.get(interval.0)
    }

    pub fn objective(&self) -> Option<&LinearExpr> {
        self.objective.as_ref()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_intervals(&self) -> usize {
        self.intervals.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.no_overlaps.len() + self.equalities.len()
    }
}

/// Cooperative cancellation flag shared with a running solve
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Search budget applied when no limit is configured
pub const DEFAULT_TIME_LIMIT: StdDuration = StdDuration::from_secs(30);

/// Limits applied to one solver invocation
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// `None` searches until the status is proven
    pub time_limit: Option<StdDuration>,
    pub cancel: Option<CancelToken>,
    /// Emit search statistics at debug level
    pub log_search: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit: Some(DEFAULT_TIME_LIMIT),
            cancel: None,
            log_search: false,
        }
    }
}

/// Outcome of a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    /// Best possible assignment, proven
    Optimal,
    /// Valid assignment found, search stopped before proving optimality
    Feasible,
    /// Proven that no assignment satisfies the model
    Infeasible,
    /// Search stopped without an assignment, or the model is outside what
    /// the solver handles
    Unknown,
}

impl SolveStatus {
    /// Whether variable values can be read back
    pub fn is_success(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Solver result. `values` is only populated on success.
#[derive(Debug, Clone)]
pub struct CpSolution {
    pub status: SolveStatus,
    pub objective: Option<i64>,
    pub values: Vec<i64>,
    pub wall_time: StdDuration,
}

impl CpSolution {
    pub(crate) fn without_values(status: SolveStatus, wall_time: StdDuration) -> Self {
        Self {
            status,
            objective: None,
            values: Vec::new(),
            wall_time,
        }
    }

    pub fn value(&self, var: IntVar) -> Option<i64> {
        self.values.get(var.0).copied()
    }

    pub fn bool_value(&self, var: BoolVar) -> Option<bool> {
        self.value(var.0).map(|value| value != 0)
    }
}

/// A backend able to solve a [`CpModel`]
pub trait ConstraintSolver {
    fn solve(&self, model: &CpModel, options: &SolveOptions) -> CpSolution;
}
