// End-to-end scheduling scenarios: pool → build → solve → write-back

use chrono::{Duration, TimeZone, Utc};
use common::constraints::{Constraint, NoOverlapConstraint};
use common::cp::{CancelToken, PumpkinSolver, SolveOptions, SolveStatus};
use common::errors::SchedulerError;
use common::indexes::{Index, DEFAULT_GROUP};
use common::models::{BoundedInterval, Timestamp};
use common::pool::TaskPool;
use common::scheduler::{Scheduler, SchedulerState};
use common::storage::{JsonFilePoolStore, PoolRepository};
use common::templates::{ExactDateTask, FixedPeriodTask, RelativePeriodItem, TaskCommon};
use uuid::Uuid;

fn anchor() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().fixed_offset()
}

fn hours(n: i64) -> Duration {
    Duration::hours(n)
}

fn week() -> (Timestamp, Timestamp) {
    (anchor(), anchor() + hours(168))
}

/// Fifteen 12-hour repetitions that may be placed anywhere in the week
fn half_days(mandatory: bool) -> ExactDateTask {
    ExactDateTask::new(
        TaskCommon::new("half_day", mandatory, 1),
        15,
        BoundedInterval::new(anchor(), anchor() + hours(156)).unwrap(),
        BoundedInterval::new(anchor() + hours(12), anchor() + hours(168)).unwrap(),
        BoundedInterval::exact(hours(12)),
    )
    .unwrap()
}

/// A single mandatory interval pinned to `[at, at + length]`
fn pinned(name: &str, at: i64, length: i64) -> ExactDateTask {
    ExactDateTask::new(
        TaskCommon::new(name, true, 1),
        1,
        BoundedInterval::exact(anchor() + hours(at)),
        BoundedInterval::exact(anchor() + hours(at + length)),
        BoundedInterval::exact(hours(length)),
    )
    .unwrap()
}

fn placed_count(pool: &TaskPool, task_id: &Uuid) -> usize {
    pool.task(task_id)
        .map(|task| task.intervals().filter(|i| i.is_scheduled()).count())
        .unwrap_or(0)
}

#[test]
fn test_fifteen_half_days_in_a_week_schedule_fourteen() {
    let mut pool = TaskPool::new(1);
    let task_id = pool.add_task(half_days(false), DEFAULT_GROUP);

    let mut scheduler: Scheduler = Scheduler::default();
    scheduler.build(pool, week(), hours(1)).unwrap();
    let report = scheduler.solve().unwrap();

    assert_eq!(report.status, SolveStatus::Optimal);
    assert_eq!(report.objective, Some(14));
    assert_eq!((report.scheduled, report.unscheduled), (14, 1));

    let pool = scheduler.into_pool().unwrap();
    assert_eq!(placed_count(&pool, &task_id), 14);

    let mut spans: Vec<_> = pool
        .task(&task_id)
        .unwrap()
        .intervals()
        .filter_map(|i| i.actual_interval.as_pair())
        .collect();
    spans.sort();
    for pair in spans.windows(2) {
        assert!(pair[0].1 <= pair[1].0);
    }
}

#[test]
fn test_mandatory_intervals_are_all_scheduled() {
    let task = ExactDateTask::new(
        TaskCommon::new("standup", true, 3),
        4,
        BoundedInterval::new(anchor(), anchor() + hours(40)).unwrap(),
        BoundedInterval::new(anchor() + hours(10), anchor() + hours(50)).unwrap(),
        BoundedInterval::exact(hours(10)),
    )
    .unwrap();
    let mut pool = TaskPool::new(1);
    let task_id = pool.add_task(task, DEFAULT_GROUP);

    let mut scheduler: Scheduler = Scheduler::default();
    scheduler.build(pool, (anchor(), anchor() + hours(50)), hours(1)).unwrap();
    let report = scheduler.solve().unwrap();

    assert_eq!(report.status, SolveStatus::Optimal);
    assert_eq!(report.objective, Some(12));
    assert_eq!(placed_count(scheduler.pool().unwrap(), &task_id), 4);
}

#[test]
fn test_overlapping_mandatory_intervals_are_infeasible() {
    let mut pool = TaskPool::new(1);
    let grouped = pool.add_task(pinned("grouped", 0, 12), "focus");
    let labelled = pool.add_task(pinned("labelled", 6, 12), "elsewhere");
    for interval in pool.task_mut(&labelled).unwrap().intervals_mut() {
        interval.labels.insert("focus".to_string());
    }
    pool.constraints.push(Constraint::NoOverlap(
        NoOverlapConstraint::new(Some("focus".to_string()), Some("focus".to_string())).unwrap(),
    ));

    let mut scheduler: Scheduler = Scheduler::default();
    scheduler.build(pool, week(), hours(1)).unwrap();
    let report = scheduler.solve().unwrap();

    assert_eq!(report.status, SolveStatus::Infeasible);
    assert_eq!(report.objective, None);
    assert_eq!((report.scheduled, report.unscheduled), (0, 2));
    let pool = scheduler.pool().unwrap();
    assert_eq!(placed_count(pool, &grouped), 0);
    assert_eq!(placed_count(pool, &labelled), 0);
}

#[test]
fn test_rules_only_bind_their_own_group() {
    let mut pool = TaskPool::new(1);
    let first = pool.add_task(pinned("first", 0, 12), "A");
    let second = pool.add_task(pinned("second", 6, 12), "B");
    pool.constraints
        .push(Constraint::NoOverlap(NoOverlapConstraint::for_group("A")));
    // A label with the group's name does not pull an interval into the group
    for interval in pool.task_mut(&second).unwrap().intervals_mut() {
        interval.labels.insert("A".to_string());
    }

    let mut scheduler: Scheduler = Scheduler::default();
    scheduler.build(pool, week(), hours(1)).unwrap();
    let report = scheduler.solve().unwrap();

    assert_eq!(report.status, SolveStatus::Optimal);
    let pool = scheduler.pool().unwrap();
    assert_eq!(placed_count(pool, &first), 1);
    assert_eq!(placed_count(pool, &second), 1);
}

#[test]
fn test_default_group_rule_is_seeded() {
    let pool: TaskPool = serde_json::from_str(r#"{"id": 11, "tasks": []}"#).unwrap();
    assert!(pool.constraints.iter().any(|constraint| matches!(
        constraint,
        Constraint::NoOverlap(rule) if rule.group_name() == Some(DEFAULT_GROUP)
    )));
    assert!(pool.indexes.iter().any(|index| matches!(
        index,
        Index::GroupIndex(groups) if groups.has_group(DEFAULT_GROUP)
    )));

    // The seeded rule separates default-group tasks without any setup
    let mut pool = pool;
    pool.add_task(pinned("first", 0, 12), DEFAULT_GROUP);
    pool.add_task(pinned("second", 6, 12), DEFAULT_GROUP);
    let mut scheduler: Scheduler = Scheduler::default();
    scheduler.build(pool, week(), hours(1)).unwrap();
    assert_eq!(scheduler.solve().unwrap().status, SolveStatus::Infeasible);
}

#[test]
fn test_exact_date_needs_full_containment() {
    let mut pool = TaskPool::new(1);
    let task_id = pool.add_task(half_days(false), DEFAULT_GROUP);

    let map = pool.get_intervals(week()).unwrap();
    assert_eq!(map.get(&task_id).map(|intervals| intervals.len()), Some(15));

    let partial = (anchor() + hours(1), anchor() + hours(168));
    let map = pool.get_intervals(partial).unwrap();
    assert_eq!(map.get(&task_id).map(|intervals| intervals.len()), Some(0));
}

#[test]
fn test_fixed_period_weekdays_fill_one_week() {
    let items = (1..=5)
        .map(|index| {
            RelativePeriodItem::new(
                index,
                BoundedInterval::exact(hours(8)),
                BoundedInterval::exact(hours(18)),
                BoundedInterval::exact(hours(10)),
            )
        })
        .collect();
    let task = FixedPeriodTask::new(
        TaskCommon::new("office", true, 1),
        Duration::days(1),
        7,
        anchor(),
        BoundedInterval::new(anchor(), anchor() + Duration::days(7)).unwrap(),
        items,
    )
    .unwrap();
    let mut pool = TaskPool::new(1);
    let task_id = pool.add_task(task, DEFAULT_GROUP);

    let mut scheduler: Scheduler = Scheduler::default();
    scheduler.build(pool, week(), hours(1)).unwrap();
    let report = scheduler.solve().unwrap();
    assert_eq!(report.status, SolveStatus::Optimal);
    assert_eq!(report.scheduled, 5);

    let pool = scheduler.into_pool().unwrap();
    match pool.task(&task_id).unwrap() {
        common::templates::TaskTemplate::FixedPeriod(task) => {
            assert_eq!(task.datetime_stamps(), vec![anchor()]);
        }
        other => panic!("unexpected template {:?}", other),
    }
    let mut starts: Vec<_> = pool
        .task(&task_id)
        .unwrap()
        .intervals()
        .filter_map(|i| i.actual_interval.start())
        .collect();
    starts.sort();
    let expected: Vec<_> = (1..=5)
        .map(|day| anchor() + Duration::days(day) + hours(8))
        .collect();
    assert_eq!(starts, expected);
}

#[test]
fn test_empty_pool_is_trivially_optimal() {
    let mut scheduler: Scheduler = Scheduler::default();
    scheduler.build(TaskPool::new(1), week(), hours(1)).unwrap();
    let report = scheduler.solve().unwrap();
    assert_eq!(report.status, SolveStatus::Optimal);
    assert_eq!(report.scheduled, 0);
    assert!(report.intervals.is_empty());
}

#[test]
fn test_cancelled_solve_leaves_pool_untouched() {
    let mut pool = TaskPool::new(1);
    let task_id = pool.add_task(
        ExactDateTask::new(
            TaskCommon::new("pair", true, 1),
            2,
            BoundedInterval::new(anchor(), anchor() + hours(5)).unwrap(),
            BoundedInterval::new(anchor() + hours(5), anchor() + hours(10)).unwrap(),
            BoundedInterval::exact(hours(5)),
        )
        .unwrap(),
        DEFAULT_GROUP,
    );
    let cancel = CancelToken::new();
    cancel.cancel();
    let options = SolveOptions {
        cancel: Some(cancel),
        ..SolveOptions::default()
    };

    let mut scheduler = Scheduler::new(PumpkinSolver::new(), options);
    scheduler.build(pool, week(), hours(1)).unwrap();
    let report = scheduler.solve().unwrap();

    assert_eq!(report.status, SolveStatus::Unknown);
    assert_eq!(report.scheduled, 0);
    assert_eq!(placed_count(scheduler.pool().unwrap(), &task_id), 0);
}

#[test]
fn test_scheduler_lifecycle_errors() {
    let mut scheduler: Scheduler = Scheduler::default();
    assert_eq!(scheduler.solve().unwrap_err(), SchedulerError::NotBuilt);

    scheduler.build(TaskPool::new(1), week(), hours(1)).unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Built);
    assert_eq!(
        scheduler.build(TaskPool::new(2), week(), hours(1)).unwrap_err(),
        SchedulerError::AlreadyBuilt
    );

    scheduler.solve().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Solved);
    scheduler.solve().unwrap();

    let pool = scheduler.reset().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Unbuilt);
    assert!(scheduler.solve().is_err());
    assert!(scheduler.build(pool, week(), hours(1)).is_ok());
}

#[test]
fn test_placements_survive_json_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFilePoolStore::new(dir.path().join("pools"));

    let mut pool = store.load_or_create(21).unwrap();
    let task_id = pool.add_task(half_days(false), DEFAULT_GROUP);
    store.save(21, &pool).unwrap();

    let mut scheduler: Scheduler = Scheduler::default();
    scheduler.build(store.load(21).unwrap(), week(), hours(1)).unwrap();
    scheduler.solve().unwrap();
    let solved = scheduler.into_pool().unwrap();
    store.save(21, &solved).unwrap();

    let reloaded = store.load(21).unwrap();
    assert_eq!(reloaded, solved);
    assert_eq!(placed_count(&reloaded, &task_id), 14);
}
