// Insertion-ordered task id -> intervals mapping

use crate::models::ScheduleInterval;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Intervals generated for one window, grouped by the task that produced
/// them. Iteration follows the order in which tasks were inserted, which
/// keeps model construction deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalMap {
    entries: Vec<(Uuid, Vec<ScheduleInterval>)>,
}

impl IntervalMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the intervals of a task
    pub fn insert(&mut self, task_id: Uuid, intervals: Vec<ScheduleInterval>) {
        match self.entries.iter_mut().find(|(id, _)| *id == task_id) {
            Some((_, existing)) => *existing = intervals,
            None => self.entries.push((task_id, intervals)),
        }
    }

    pub fn get(&self, task_id: &Uuid) -> Option<&[ScheduleInterval]> {
        self.entries
            .iter()
            .find(|(id, _)| id == task_id)
            .map(|(_, intervals)| intervals.as_slice())
    }

    pub fn get_mut(&mut self, task_id: &Uuid) -> Option<&mut Vec<ScheduleInterval>> {
        self.entries
            .iter_mut()
            .find(|(id, _)| id == task_id)
            .map(|(_, intervals)| intervals)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &[ScheduleInterval])> {
        self.entries
            .iter()
            .map(|(id, intervals)| (id, intervals.as_slice()))
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &Uuid> {
        self.entries.iter().map(|(id, _)| id)
    }

    /// Every interval, flattened in task order
    pub fn intervals(&self) -> impl Iterator<Item = &ScheduleInterval> {
        self.entries.iter().flat_map(|(_, intervals)| intervals.iter())
    }

    pub fn find_interval_mut(&mut self, interval_id: &Uuid) -> Option<&mut ScheduleInterval> {
        self.entries
            .iter_mut()
            .flat_map(|(_, intervals)| intervals.iter_mut())
            .find(|interval| interval.id == *interval_id)
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn interval_count(&self) -> usize {
        self.entries.iter().map(|(_, intervals)| intervals.len()).sum()
    }
}

impl Serialize for IntervalMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, intervals) in &self.entries {
            map.serialize_entry(id, intervals)?;
        }
        map.end()
    }
}
