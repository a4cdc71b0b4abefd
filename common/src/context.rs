// Read-only view over one window's intervals, used while building a model

use crate::indexes::{IndexCache, IndexKind};
use crate::models::{IntervalMap, ScheduleInterval};
use crate::pool::TaskPool;
use std::collections::HashMap;
use uuid::Uuid;

/// SchedulingContext flattens the interval map of one build and answers
/// lookups through the pool's indexes. It lives for a single build/solve
/// cycle.
pub struct SchedulingContext<'a> {
    pool: &'a TaskPool,
    interval_map: &'a IntervalMap,
    all_intervals: Vec<&'a ScheduleInterval>,
    caches: HashMap<IndexKind, IndexCache<'a>>,
}

impl<'a> SchedulingContext<'a> {
    pub fn new(pool: &'a TaskPool, interval_map: &'a IntervalMap) -> Self {
        let all_intervals: Vec<&'a ScheduleInterval> = interval_map.intervals().collect();

        let mut caches: HashMap<IndexKind, IndexCache<'a>> = HashMap::new();
        for index in &pool.indexes {
            let cache = index.build_cache(&all_intervals, interval_map);
            match caches.get_mut(&index.kind()) {
                Some(existing) => existing.merge(cache),
                None => {
                    caches.insert(index.kind(), cache);
                }
            }
        }

        Self {
            pool,
            interval_map,
            all_intervals,
            caches,
        }
    }

    pub fn pool(&self) -> &'a TaskPool {
        self.pool
    }

    /// Every interval, in task order then generation order
    pub fn all_intervals(&self) -> &[&'a ScheduleInterval] {
        &self.all_intervals
    }

    pub fn intervals_by_task(&self, task_id: &Uuid) -> &'a [ScheduleInterval] {
        self.interval_map.get(task_id).unwrap_or(&[])
    }

    pub fn intervals_by_group(&self, group_name: &str) -> &[&'a ScheduleInterval] {
        self.caches
            .get(&IndexKind::Group)
            .map(|cache| cache.by_key(group_name))
            .unwrap_or(&[])
    }

    pub fn intervals_by_label(&self, label: &str) -> &[&'a ScheduleInterval] {
        self.caches
            .get(&IndexKind::Label)
            .map(|cache| cache.by_key(label))
            .unwrap_or(&[])
    }

    /// Lookup through the id index, falling back to a scan when the pool
    /// has none
    pub fn interval(&self, interval_id: &Uuid) -> Option<&'a ScheduleInterval> {
        match self.caches.get(&IndexKind::Id) {
            Some(cache) => cache.by_id(interval_id),
            None => self
                .all_intervals
                .iter()
                .copied()
                .find(|interval| interval.id == *interval_id),
        }
    }
}
