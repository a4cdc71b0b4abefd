// Lookup indexes over the intervals of one scheduling window

use crate::models::{IntervalMap, ScheduleInterval};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// Name of the group every task joins unless told otherwise
pub const DEFAULT_GROUP: &str = "default";

/// IdIndex resolves interval ids to intervals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdIndex {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
}

/// LabelIndex groups intervals by each of their labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelIndex {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
}

/// GroupIndex maps group names to whole tasks and to individual intervals.
///
/// Both sources feed the same group namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupIndex {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Group name -> task ids
    #[serde(default)]
    pub template_groups: BTreeMap<String, Vec<Uuid>>,
    /// Group name -> interval ids
    #[serde(default)]
    pub interval_groups: BTreeMap<String, Vec<Uuid>>,
}

/// Index represents one configured lookup structure of a task pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "index_type", rename_all = "snake_case")]
pub enum Index {
    IdIndex(IdIndex),
    LabelIndex(LabelIndex),
    GroupIndex(GroupIndex),
}

/// Variant key used to merge caches of indexes of the same kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Id,
    Label,
    Group,
}

/// Materialised lookup built from an index for one window
#[derive(Debug, Clone)]
pub enum IndexCache<'a> {
    ById(HashMap<Uuid, &'a ScheduleInterval>),
    ByKey(HashMap<String, Vec<&'a ScheduleInterval>>),
}

impl IdIndex {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for IdIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelIndex {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for LabelIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupIndex {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            template_groups: BTreeMap::new(),
            interval_groups: BTreeMap::new(),
        }
    }

    /// Ensure a (possibly empty) task group exists
    pub fn with_group(mut self, group_name: &str) -> Self {
        self.ensure_group(group_name);
        self
    }

    pub fn ensure_group(&mut self, group_name: &str) {
        self.template_groups
            .entry(group_name.to_string())
            .or_default();
    }

    pub fn has_group(&self, group_name: &str) -> bool {
        self.template_groups.contains_key(group_name)
    }

    pub fn add_task_to_group(&mut self, group_name: &str, task_id: Uuid) {
        let members = self
            .template_groups
            .entry(group_name.to_string())
            .or_default();
        if !members.contains(&task_id) {
            members.push(task_id);
        }
    }

    pub fn add_interval_to_group(&mut self, group_name: &str, interval_id: Uuid) {
        let members = self
            .interval_groups
            .entry(group_name.to_string())
            .or_default();
        if !members.contains(&interval_id) {
            members.push(interval_id);
        }
    }

    /// Drop a task from every template group; groups themselves are kept
    pub fn remove_task(&mut self, task_id: &Uuid) {
        for members in self.template_groups.values_mut() {
            members.retain(|id| id != task_id);
        }
    }

    fn build_groups<'a>(
        &self,
        intervals: &[&'a ScheduleInterval],
        task_map: &'a IntervalMap,
    ) -> HashMap<String, Vec<&'a ScheduleInterval>> {
        let mut cache: HashMap<String, Vec<&'a ScheduleInterval>> = HashMap::new();

        for (group_name, task_ids) in &self.template_groups {
            for task_id in task_ids {
                if let Some(task_intervals) = task_map.get(task_id) {
                    cache
                        .entry(group_name.clone())
                        .or_default()
                        .extend(task_intervals.iter());
                }
            }
        }

        let by_id: HashMap<Uuid, &'a ScheduleInterval> =
            intervals.iter().map(|interval| (interval.id, *interval)).collect();
        for (group_name, interval_ids) in &self.interval_groups {
            for interval_id in interval_ids {
                if let Some(interval) = by_id.get(interval_id) {
                    cache.entry(group_name.clone()).or_default().push(*interval);
                }
            }
        }

        for members in cache.values_mut() {
            dedupe_by_id(members);
        }
        cache
    }
}

impl Default for GroupIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    pub fn id(&self) -> Uuid {
        match self {
            Index::IdIndex(index) => index.id,
            Index::LabelIndex(index) => index.id,
            Index::GroupIndex(index) => index.id,
        }
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            Index::IdIndex(_) => IndexKind::Id,
            Index::LabelIndex(_) => IndexKind::Label,
            Index::GroupIndex(_) => IndexKind::Group,
        }
    }

    /// Build this index's lookup over one window's intervals
    pub fn build_cache<'a>(
        &self,
        intervals: &[&'a ScheduleInterval],
        task_map: &'a IntervalMap,
    ) -> IndexCache<'a> {
        match self {
            Index::IdIndex(_) => IndexCache::ById(
                intervals
                    .iter()
                    .map(|interval| (interval.id, *interval))
                    .collect(),
            ),
            Index::LabelIndex(_) => {
                let mut cache: HashMap<String, Vec<&'a ScheduleInterval>> = HashMap::new();
                for interval in intervals {
                    for label in &interval.labels {
                        cache.entry(label.clone()).or_default().push(*interval);
                    }
                }
                IndexCache::ByKey(cache)
            }
            Index::GroupIndex(index) => IndexCache::ByKey(index.build_groups(intervals, task_map)),
        }
    }
}

impl<'a> IndexCache<'a> {
    /// Fold another cache of the same kind into this one.
    ///
    /// Id lookups are overwritten by the later cache; keyed lists are
    /// concatenated and deduplicated by interval id. Caches of different
    /// shapes are left untouched.
    pub fn merge(&mut self, other: IndexCache<'a>) {
        match (self, other) {
            (IndexCache::ById(existing), IndexCache::ById(incoming)) => {
                existing.extend(incoming);
            }
            (IndexCache::ByKey(existing), IndexCache::ByKey(incoming)) => {
                for (key, intervals) in incoming {
                    let members = existing.entry(key).or_default();
                    members.extend(intervals);
                    dedupe_by_id(members);
                }
            }
            _ => {}
        }
    }

    pub fn by_id(&self, id: &Uuid) -> Option<&'a ScheduleInterval> {
        match self {
            IndexCache::ById(map) => map.get(id).copied(),
            IndexCache::ByKey(_) => None,
        }
    }

    pub fn by_key(&self, key: &str) -> &[&'a ScheduleInterval] {
        match self {
            IndexCache::ByKey(map) => map.get(key).map(Vec::as_slice).unwrap_or(&[]),
            IndexCache::ById(_) => &[],
        }
    }
}

/// Keep the first occurrence of each interval id, preserving order
fn dedupe_by_id(intervals: &mut Vec<&ScheduleInterval>) {
    let mut seen = HashSet::new();
    intervals.retain(|interval| seen.insert(interval.id));
}
