// Constraint model backend on the Pumpkin lazy clause generation solver

use super::{
    CancelToken, ConstraintSolver, CpModel, CpSolution, IntVar, LinearExpr, SolveOptions, SolveStatus,
};
use pumpkin_solver::constraints as cp;
use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::results::{OptimisationResult, ProblemSolution};
use pumpkin_solver::termination::{TerminationCondition, TimeBudget};
use pumpkin_solver::variables::{DomainId, Literal, TransformableVariable};
use pumpkin_solver::Solver;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

/// Solves a [`CpModel`] with `pumpkin_solver`.
///
/// Variables become bounded integer domains and every interval presence a
/// literal. An interval's `start + duration == end` only holds when its
/// literal is true. Each pair of a no-overlap set gets two ordering
/// literals, and a clause forces one of them when both intervals are
/// present. The objective is maximised with linear SAT-UNSAT search.
#[derive(Debug, Clone, Copy, Default)]
pub struct PumpkinSolver;

impl PumpkinSolver {
    pub fn new() -> Self {
        Self
    }
}

/// Stops the search on the time budget or a cancelled token
struct SolveBudget {
    time: Option<TimeBudget>,
    cancel: Option<CancelToken>,
}

impl TerminationCondition for SolveBudget {
    fn should_stop(&mut self) -> bool {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return true;
        }
        self.time.as_mut().is_some_and(|budget| budget.should_stop())
    }
}

enum Rejected {
    /// Bounds outside the solver's 32-bit domains
    Unsupported(String),
    /// Conflict found while posting
    Infeasible,
}

struct Posted {
    solver: Solver,
    domains: Vec<DomainId>,
    objective: DomainId,
    objective_offset: i64,
}

fn narrow(value: i64, what: &str) -> Result<i32, Rejected> {
    i32::try_from(value)
        .map_err(|_| Rejected::Unsupported(format!("{} {} does not fit a solver domain", what, value)))
}

fn post_model(model: &CpModel) -> Result<Posted, Rejected> {
    let mut solver = Solver::default();
    let tag = solver.new_constraint_tag();

    let mut domains = Vec::with_capacity(model.variables.len());
    for def in &model.variables {
        if def.lower > def.upper {
            return Err(Rejected::Infeasible);
        }
        let lower = narrow(def.lower, &def.name)?;
        let upper = narrow(def.upper, &def.name)?;
        domains.push(solver.new_bounded_integer(lower, upper));
    }
    let domain = |var: IntVar| -> Result<DomainId, Rejected> {
        domains
            .get(var.index())
            .copied()
            .ok_or_else(|| Rejected::Unsupported(format!("unknown variable {}", var.index())))
    };

    // One literal per presence variable, shared by every interval using it
    let mut presence: HashMap<IntVar, Literal> = HashMap::new();
    for def in &model.intervals {
        let var = def.presence.var();
        if presence.contains_key(&var) {
            continue;
        }
        let literal = solver.new_literal();
        solver
            .add_constraint(cp::equals(
                vec![literal.get_integer_variable(), domain(var)?.scaled(-1)],
                0,
                tag,
            ))
            .post()
            .map_err(|_| Rejected::Infeasible)?;
        presence.insert(var, literal);
    }
    let literal_of = |var: IntVar| -> Result<Literal, Rejected> {
        presence
            .get(&var)
            .copied()
            .ok_or_else(|| Rejected::Unsupported(format!("variable {} is not a presence", var.index())))
    };

    for def in &model.intervals {
        let terms = vec![
            domain(def.start)?.scaled(1),
            domain(def.duration)?.scaled(1),
            domain(def.end)?.scaled(-1),
        ];
        solver
            .add_constraint(cp::equals(terms, 0, tag))
            .implied_by(literal_of(def.presence.var())?)
            .map_err(|_| Rejected::Infeasible)?;
    }

    for set in &model.no_overlaps {
        let members = set
            .iter()
            .map(|interval| {
                model
                    .interval(*interval)
                    .ok_or_else(|| Rejected::Unsupported(format!("unknown interval {}", interval.index())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (i, first) in members.iter().enumerate() {
            for second in members.iter().skip(i + 1) {
                let first_present = literal_of(first.presence.var())?;
                let second_present = literal_of(second.presence.var())?;
                let first_before = solver.new_literal();
                let second_before = solver.new_literal();

                solver
                    .add_constraint(cp::less_than_or_equals(
                        vec![domain(first.end)?.scaled(1), domain(second.start)?.scaled(-1)],
                        0,
                        tag,
                    ))
                    .implied_by(first_before)
                    .map_err(|_| Rejected::Infeasible)?;
                solver
                    .add_constraint(cp::less_than_or_equals(
                        vec![domain(second.end)?.scaled(1), domain(first.start)?.scaled(-1)],
                        0,
                        tag,
                    ))
                    .implied_by(second_before)
                    .map_err(|_| Rejected::Infeasible)?;
                solver
                    .add_constraint(cp::clause(
                        vec![!first_present, !second_present, first_before, second_before],
                        tag,
                    ))
                    .post()
                    .map_err(|_| Rejected::Infeasible)?;
            }
        }
    }

    for (var, value) in &model.equalities {
        let value = narrow(*value, "equality value")?;
        solver
            .add_constraint(cp::equals(vec![domain(*var)?.scaled(1)], value, tag))
            .post()
            .map_err(|_| Rejected::Infeasible)?;
    }

    // The objective domain spans every value the weighted sum can take
    let empty = LinearExpr::new();
    let expr = model.objective().unwrap_or(&empty);
    let (mut lowest, mut highest) = (0i64, 0i64);
    let mut terms = Vec::with_capacity(expr.terms().len() + 1);
    for (coefficient, var) in expr.terms() {
        let (lower, upper) = model
            .var_bounds(*var)
            .ok_or_else(|| Rejected::Unsupported(format!("unknown variable {}", var.index())))?;
        let a = coefficient.saturating_mul(lower);
        let b = coefficient.saturating_mul(upper);
        lowest = lowest.saturating_add(a.min(b));
        highest = highest.saturating_add(a.max(b));
        terms.push(domain(*var)?.scaled(narrow(*coefficient, "objective coefficient")?));
    }
    let objective = solver.new_bounded_integer(
        narrow(lowest, "objective lower bound")?,
        narrow(highest, "objective upper bound")?,
    );
    terms.push(objective.scaled(-1));
    solver
        .add_constraint(cp::equals(terms, 0, tag))
        .post()
        .map_err(|_| Rejected::Infeasible)?;

    Ok(Posted {
        solver,
        domains,
        objective,
        objective_offset: expr.constant(),
    })
}

fn noop_callback<B>(_: &Solver, _: pumpkin_solver::results::SolutionReference, _: &B) {}

impl ConstraintSolver for PumpkinSolver {
    fn solve(&self, model: &CpModel, options: &SolveOptions) -> CpSolution {
        let started = Instant::now();
        if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return CpSolution::without_values(SolveStatus::Unknown, started.elapsed());
        }

        let mut posted = match post_model(model) {
            Ok(posted) => posted,
            Err(Rejected::Infeasible) => {
                return CpSolution::without_values(SolveStatus::Infeasible, started.elapsed());
            }
            Err(Rejected::Unsupported(reason)) => {
                warn!(reason = %reason, "Model cannot be passed to the solver");
                return CpSolution::without_values(SolveStatus::Unknown, started.elapsed());
            }
        };

        let mut brancher = posted.solver.default_brancher();
        let mut termination = SolveBudget {
            time: options.time_limit.map(TimeBudget::starting_now),
            cancel: options.cancel.clone(),
        };
        let result = posted.solver.optimise(
            &mut brancher,
            &mut termination,
            LinearSatUnsat::new(OptimisationDirection::Maximise, posted.objective, noop_callback),
        );

        let (status, objective, values) = match result {
            OptimisationResult::Optimal(solution) => (
                SolveStatus::Optimal,
                solution.get_integer_value(posted.objective),
                posted
                    .domains
                    .iter()
                    .map(|&domain| i64::from(solution.get_integer_value(domain)))
                    .collect::<Vec<_>>(),
            ),
            OptimisationResult::Satisfiable(solution) => (
                SolveStatus::Feasible,
                solution.get_integer_value(posted.objective),
                posted
                    .domains
                    .iter()
                    .map(|&domain| i64::from(solution.get_integer_value(domain)))
                    .collect::<Vec<_>>(),
            ),
            OptimisationResult::Unsatisfiable => {
                return CpSolution::without_values(SolveStatus::Infeasible, started.elapsed());
            }
            OptimisationResult::Unknown => {
                return CpSolution::without_values(SolveStatus::Unknown, started.elapsed());
            }
        };

        let wall_time = started.elapsed();
        if options.log_search {
            debug!(
                status = %status,
                variables = posted.domains.len(),
                intervals = model.num_intervals(),
                no_overlaps = model.no_overlaps.len(),
                elapsed_ms = wall_time.as_millis() as u64,
                "Solver search finished"
            );
        }

        CpSolution {
            status,
            objective: Some(i64::from(objective).saturating_add(posted.objective_offset)),
            values,
            wall_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::{BoolVar, IntervalVar};
    use std::time::Duration;

    struct Job {
        start: IntVar,
        end: IntVar,
        presence: BoolVar,
        interval: IntervalVar,
    }

    fn job(model: &mut CpModel, name: &str, earliest: i64, latest_end: i64, length: i64) -> Job {
        let start = model.new_int_var(earliest, latest_end - length, format!("{}_start", name));
        let duration = model.new_int_var(length, length, format!("{}_duration", name));
        let end = model.new_int_var(earliest + length, latest_end, format!("{}_end", name));
        let presence = model.new_bool_var(format!("{}_presence", name));
        let interval = model.new_optional_interval(start, duration, end, presence, name);
        Job {
            start,
            end,
            presence,
            interval,
        }
    }

    fn priorities(model: &mut CpModel, jobs: &[(&Job, i64)]) {
        let mut objective = LinearExpr::new();
        for (job, weight) in jobs {
            objective.add_term(*weight, job.presence.var());
        }
        model.maximize(objective);
    }

    #[test]
    fn test_disjoint_jobs_both_placed() {
        let mut model = CpModel::new();
        let a = job(&mut model, "a", 0, 10, 4);
        let b = job(&mut model, "b", 0, 10, 5);
        model.add_no_overlap(vec![a.interval, b.interval]);
        priorities(&mut model, &[(&a, 1), (&b, 1)]);

        let solution = PumpkinSolver::new().solve(&model, &SolveOptions::default());
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(solution.objective, Some(2));

        let a_span = (solution.value(a.start).unwrap(), solution.value(a.end).unwrap());
        let b_span = (solution.value(b.start).unwrap(), solution.value(b.end).unwrap());
        assert_eq!(a_span.1 - a_span.0, 4);
        assert_eq!(b_span.1 - b_span.0, 5);
        assert!(a_span.1 <= b_span.0 || b_span.1 <= a_span.0);
    }

    #[test]
    fn test_conflict_keeps_the_heavier_job() {
        let mut model = CpModel::new();
        let light = job(&mut model, "light", 0, 6, 4);
        let heavy = job(&mut model, "heavy", 0, 6, 4);
        model.add_no_overlap(vec![light.interval, heavy.interval]);
        priorities(&mut model, &[(&light, 2), (&heavy, 7)]);

        let solution = PumpkinSolver::new().solve(&model, &SolveOptions::default());
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(solution.objective, Some(7));
        assert_eq!(solution.bool_value(heavy.presence), Some(true));
        assert_eq!(solution.bool_value(light.presence), Some(false));
    }

    #[test]
    fn test_absent_interval_ignores_its_own_arithmetic() {
        let mut model = CpModel::new();
        let start = model.new_int_var(0, 2, "start");
        let duration = model.new_int_var(5, 5, "duration");
        let end = model.new_int_var(0, 3, "end");
        let presence = model.new_bool_var("presence");
        model.new_optional_interval(start, duration, end, presence, "impossible");
        let mut objective = LinearExpr::new();
        objective.add_term(1, presence.var());
        model.maximize(objective);

        let solution = PumpkinSolver::new().solve(&model, &SolveOptions::default());
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert_eq!(solution.bool_value(presence), Some(false));
        assert_eq!(solution.objective, Some(0));
    }

    #[test]
    fn test_mandatory_conflict_is_infeasible() {
        let mut model = CpModel::new();
        let a = job(&mut model, "a", 0, 4, 3);
        let b = job(&mut model, "b", 0, 4, 3);
        model.add_no_overlap(vec![a.interval, b.interval]);
        model.add_equality(a.presence.var(), 1);
        model.add_equality(b.presence.var(), 1);

        let solution = PumpkinSolver::new().solve(&model, &SolveOptions::default());
        assert_eq!(solution.status, SolveStatus::Infeasible);
        assert!(solution.values.is_empty());
        assert_eq!(solution.objective, None);
    }

    #[test]
    fn test_objective_constant_is_added() {
        let mut model = CpModel::new();
        let a = job(&mut model, "a", 0, 4, 2);
        let mut objective = LinearExpr::new();
        objective.add_term(3, a.presence.var()).add_constant(10);
        model.maximize(objective);

        let solution = PumpkinSolver::new().solve(&model, &SolveOptions::default());
        assert_eq!(solution.objective, Some(13));
    }

    #[test]
    fn test_cancelled_token_returns_unknown() {
        let mut model = CpModel::new();
        job(&mut model, "a", 0, 4, 2);
        let token = CancelToken::new();
        token.cancel();
        let options = SolveOptions {
            time_limit: Some(Duration::from_secs(5)),
            cancel: Some(token),
            log_search: false,
        };

        let solution = PumpkinSolver::new().solve(&model, &options);
        assert_eq!(solution.status, SolveStatus::Unknown);
        assert!(solution.values.is_empty());
    }

    #[test]
    fn test_out_of_range_bounds_are_unknown() {
        let mut model = CpModel::new();
        model.new_int_var(0, i64::from(i32::MAX) + 1, "huge");

        let solution = PumpkinSolver::new().solve(&model, &SolveOptions::default());
        assert_eq!(solution.status, SolveStatus::Unknown);
    }

    #[test]
    fn test_empty_bounds_are_infeasible() {
        let mut model = CpModel::new();
        model.new_int_var(3, 1, "backwards");

        let solution = PumpkinSolver::new().solve(&model, &SolveOptions::default());
        assert_eq!(solution.status, SolveStatus::Infeasible);
    }
}
