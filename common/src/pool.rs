// Task pool: the persisted unit owning templates, indexes and constraints

use crate::constraints::{Constraint, NoOverlapConstraint};
use crate::errors::TemplateError;
use crate::indexes::{GroupIndex, IdIndex, Index, IndexKind, LabelIndex, DEFAULT_GROUP};
use crate::models::{ActualInterval, IntervalMap, ScheduleInterval, Timestamp};
use crate::templates::TaskTemplate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// TaskPool groups the templates scheduled together.
///
/// Every pool carries a no-overlap rule over the `"default"` group together
/// with one index of each kind; [`TaskPool::normalize`] restores them and
/// runs on construction and after deserialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TaskPoolDef")]
pub struct TaskPool {
    pub id: i64,
    pub tasks: Vec<TaskTemplate>,
    pub indexes: Vec<Index>,
    pub constraints: Vec<Constraint>,
}

#[derive(Deserialize)]
struct TaskPoolDef {
    id: i64,
    #[serde(default)]
    tasks: Vec<TaskTemplate>,
    #[serde(default)]
    indexes: Vec<Index>,
    #[serde(default)]
    constraints: Vec<Constraint>,
}

impl From<TaskPoolDef> for TaskPool {
    fn from(def: TaskPoolDef) -> Self {
        let mut pool = Self {
            id: def.id,
            tasks: def.tasks,
            indexes: def.indexes,
            constraints: def.constraints,
        };
        pool.normalize();
        pool
    }
}

impl TaskPool {
    pub fn new(id: i64) -> Self {
        let mut pool = Self {
            id,
            tasks: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
        };
        pool.normalize();
        pool
    }

    /// Seed the default constraint, indexes and group when missing.
    /// Idempotent.
    pub fn normalize(&mut self) {
        let has_default_rule = self.constraints.iter().any(|constraint| {
            matches!(constraint, Constraint::NoOverlap(rule) if rule.group_name() == Some(DEFAULT_GROUP))
        });
        if !has_default_rule {
            self.constraints
                .push(Constraint::NoOverlap(NoOverlapConstraint::for_group(DEFAULT_GROUP)));
        }

        if !self.has_index(IndexKind::Id) {
            self.indexes.push(Index::IdIndex(IdIndex::new()));
        }
        if !self.has_index(IndexKind::Label) {
            self.indexes.push(Index::LabelIndex(LabelIndex::new()));
        }
        match self.group_index_mut() {
            Some(groups) => groups.ensure_group(DEFAULT_GROUP),
            None => self
                .indexes
                .push(Index::GroupIndex(GroupIndex::new().with_group(DEFAULT_GROUP))),
        }
    }

    fn has_index(&self, kind: IndexKind) -> bool {
        self.indexes.iter().any(|index| index.kind() == kind)
    }

    /// The first group index, which receives new task memberships
    pub fn group_index_mut(&mut self) -> Option<&mut GroupIndex> {
        self.indexes.iter_mut().find_map(|index| match index {
            Index::GroupIndex(groups) => Some(groups),
            _ => None,
        })
    }

    /// Add a task and register it under `group_name`, creating the group
    /// when needed. Returns the task id.
    pub fn add_task(&mut self, task: impl Into<TaskTemplate>, group_name: &str) -> Uuid {
        let task = task.into();
        let task_id = task.id();
        self.tasks.push(task);
        if self.group_index_mut().is_none() {
            self.normalize();
        }
        if let Some(groups) = self.group_index_mut() {
            groups.add_task_to_group(group_name, task_id);
        }
        info!(pool_id = self.id, task_id = %task_id, group_name, "Task added to pool");
        task_id
    }

    /// Remove a task and drop it from every group
    pub fn remove_task(&mut self, task_id: &Uuid) -> Option<TaskTemplate> {
        let position = self.tasks.iter().position(|task| task.id() == *task_id)?;
        let task = self.tasks.remove(position);
        for index in &mut self.indexes {
            if let Index::GroupIndex(groups) = index {
                groups.remove_task(task_id);
            }
        }
        info!(pool_id = self.id, task_id = %task_id, "Task removed from pool");
        Some(task)
    }

    pub fn task(&self, task_id: &Uuid) -> Option<&TaskTemplate> {
        self.tasks.iter().find(|task| task.id() == *task_id)
    }

    pub fn task_mut(&mut self, task_id: &Uuid) -> Option<&mut TaskTemplate> {
        self.tasks.iter_mut().find(|task| task.id() == *task_id)
    }

    /// Intervals of every task inside `window`, one entry per task
    pub fn get_intervals(
        &mut self,
        window: (Timestamp, Timestamp),
    ) -> Result<IntervalMap, TemplateError> {
        let mut map = IntervalMap::new();
        for task in &mut self.tasks {
            let intervals = task.get_intervals(window)?;
            map.insert(task.id(), intervals);
        }
        debug!(
            pool_id = self.id,
            tasks = map.len(),
            intervals = map.interval_count(),
            "Collected pool intervals"
        );
        Ok(map)
    }

    pub fn interval(&self, interval_id: &Uuid) -> Option<&ScheduleInterval> {
        self.tasks
            .iter()
            .flat_map(|task| task.intervals())
            .find(|interval| interval.id == *interval_id)
    }

    pub fn interval_mut(&mut self, interval_id: &Uuid) -> Option<&mut ScheduleInterval> {
        self.tasks
            .iter_mut()
            .find_map(|task| task.interval_mut(interval_id))
    }

    /// Write solved placements back onto the owned intervals.
    /// Returns how many intervals were found and updated.
    pub fn apply_resolutions(&mut self, resolutions: &HashMap<Uuid, ActualInterval>) -> usize {
        let mut applied = 0;
        for task in &mut self.tasks {
            for interval in task.intervals_mut() {
                if let Some(actual) = resolutions.get(&interval.id) {
                    interval.actual_interval = *actual;
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Reset the placement of the given intervals
    pub fn clear_resolutions<'i>(&mut self, interval_ids: impl IntoIterator<Item = &'i Uuid>) {
        for interval_id in interval_ids {
            if let Some(interval) = self.interval_mut(interval_id) {
                interval.actual_interval = ActualInterval::empty();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundedInterval;
    use crate::templates::{ExactDateTask, TaskCommon};
    use chrono::{Duration, TimeZone, Utc};

    fn anchor() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().fixed_offset()
    }

    fn exact(name: &str) -> ExactDateTask {
        ExactDateTask::new(
            TaskCommon::new(name, false, 1),
            2,
            BoundedInterval::exact(anchor()),
            BoundedInterval::exact(anchor() + Duration::hours(2)),
            BoundedInterval::exact(Duration::hours(2)),
        )
        .unwrap()
    }

    fn default_group(pool: &TaskPool) -> Vec<Uuid> {
        pool.indexes
            .iter()
            .find_map(|index| match index {
                Index::GroupIndex(groups) => groups.template_groups.get(DEFAULT_GROUP).cloned(),
                _ => None,
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_new_pool_is_seeded() {
        let pool = TaskPool::new(6);
        assert_eq!(
            pool.constraints,
            vec![Constraint::NoOverlap(NoOverlapConstraint::for_group("default"))]
        );
        assert_eq!(pool.indexes.len(), 3);
        assert!(default_group(&pool).is_empty());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut pool = TaskPool::new(6);
        let before = pool.clone();
        pool.normalize();
        pool.normalize();
        assert_eq!(pool, before);
    }

    #[test]
    fn test_add_task_registers_group() {
        let mut pool = TaskPool::new(1);
        let first = pool.add_task(exact("a"), "default");
        let second = pool.add_task(exact("b"), "focus");
        assert_eq!(default_group(&pool), vec![first]);

        let groups = pool.group_index_mut().unwrap();
        assert_eq!(groups.template_groups["focus"], vec![second]);
    }

    #[test]
    fn test_remove_task_cleans_groups() {
        let mut pool = TaskPool::new(1);
        let task_id = pool.add_task(exact("a"), "default");
        assert!(pool.remove_task(&task_id).is_some());
        assert!(pool.tasks.is_empty());
        assert!(default_group(&pool).is_empty());
        assert!(pool.remove_task(&task_id).is_none());
    }

    #[test]
    fn test_get_intervals_has_entry_per_task() {
        let mut pool = TaskPool::new(1);
        let inside = pool.add_task(exact("inside"), "default");
        let window = (anchor() + Duration::hours(1), anchor() + Duration::hours(5));
        let map = pool.get_intervals(window).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&inside).map(|v| v.len()), Some(0));

        let window = (anchor(), anchor() + Duration::hours(5));
        assert_eq!(pool.get_intervals(window).unwrap().interval_count(), 2);
    }

    #[test]
    fn test_apply_and_clear_resolutions() {
        let mut pool = TaskPool::new(1);
        pool.add_task(exact("a"), "default");
        let interval_id = pool.tasks[0].intervals().next().unwrap().id;
        let actual = ActualInterval::new(anchor(), anchor() + Duration::hours(2)).unwrap();

        let applied = pool.apply_resolutions(&HashMap::from([(interval_id, actual), (Uuid::new_v4(), actual)]));
        assert_eq!(applied, 1);
        assert_eq!(pool.interval(&interval_id).unwrap().actual_interval, actual);

        pool.clear_resolutions([&interval_id]);
        assert!(pool.interval(&interval_id).unwrap().actual_interval.is_empty());
    }

    #[test]
    fn test_deserialize_restores_defaults() {
        let pool: TaskPool = serde_json::from_str(r#"{"id": 9}"#).unwrap();
        assert_eq!(pool.constraints.len(), 1);
        assert_eq!(pool.indexes.len(), 3);

        let json = serde_json::to_string(&pool).unwrap();
        let back: TaskPool = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pool);
    }
}
