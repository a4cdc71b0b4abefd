// Global scheduling rules applied to a built model

use crate::context::SchedulingContext;
use crate::errors::ValidationError;
use crate::scheduler::ModelBinding;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Constraint represents a rule spanning several intervals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "constraint_type", rename_all = "snake_case")]
pub enum Constraint {
    NoOverlap(NoOverlapConstraint),
}

impl Constraint {
    /// Register this rule with the model held by `binding`
    pub fn apply(&self, ctx: &SchedulingContext<'_>, binding: &mut ModelBinding) {
        match self {
            Constraint::NoOverlap(constraint) => constraint.apply(ctx, binding),
        }
    }
}

/// NoOverlapConstraint forbids two present intervals of one group or label
/// from overlapping in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NoOverlapDef")]
pub struct NoOverlapConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

#[derive(Deserialize)]
struct NoOverlapDef {
    #[serde(default)]
    group_name: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

impl TryFrom<NoOverlapDef> for NoOverlapConstraint {
    type Error = ValidationError;

    fn try_from(def: NoOverlapDef) -> Result<Self, Self::Error> {
        Self::new(def.group_name, def.label)
    }
}

impl NoOverlapConstraint {
    /// At least one of `group_name` and `label` must be given
    pub fn new(group_name: Option<String>, label: Option<String>) -> Result<Self, ValidationError> {
        if group_name.is_none() && label.is_none() {
            return Err(ValidationError::MissingTarget);
        }
        Ok(Self { group_name, label })
    }

    pub fn for_group(group_name: impl Into<String>) -> Self {
        Self {
            group_name: Some(group_name.into()),
            label: None,
        }
    }

    pub fn for_label(label: impl Into<String>) -> Self {
        Self {
            group_name: None,
            label: Some(label.into()),
        }
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn apply(&self, ctx: &SchedulingContext<'_>, binding: &mut ModelBinding) {
        let mut targets = Vec::new();
        if let Some(group_name) = &self.group_name {
            targets.extend(ctx.intervals_by_group(group_name).iter().copied());
        }
        if let Some(label) = &self.label {
            targets.extend(ctx.intervals_by_label(label).iter().copied());
        }

        let mut seen = HashSet::new();
        let solver_intervals: Vec<_> = targets
            .into_iter()
            .filter(|interval| seen.insert(interval.id))
            .filter_map(|interval| binding.handles(&interval.id).map(|handles| handles.interval))
            .collect();

        debug!(
            group_name = ?self.group_name,
            label = ?self.label,
            intervals = solver_intervals.len(),
            "Applying no-overlap constraint"
        );
        if !solver_intervals.is_empty() {
            binding.model_mut().add_no_overlap(solver_intervals);
        }
    }
}
