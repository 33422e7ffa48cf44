use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config_goal::ConfigGoal;
use crate::request::MemoryAllocationRequest;
use crate::types::Dimm;

/// Legal but sub-optimal outcomes attached to a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutWarning {
    AppDirectSettingsNotRecommended,
    PersistentSettingsNotRecommended,
    NonOptimalPopulation,
}

/// Result of planning a [`MemoryAllocationRequest`]. All capacities are GiB.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAllocationLayout {
    /// Goal for every requested module, keyed by UID.
    pub goals: BTreeMap<String, ConfigGoal>,
    pub memory_capacity_gib: u64,
    pub app_direct_capacity_gib: u64,
    /// Capacity placed for each requested extent, in request order.
    pub app_direct_capacities_gib: Vec<u64>,
    pub storage_capacity_gib: u64,
    pub remaining_capacity_gib: u64,
    pub reserved_dimm_uid: Option<String>,
    warnings: Vec<LayoutWarning>,
    /// Interleave set ids created for each extent.
    #[serde(skip)]
    extent_set_ids: Vec<BTreeSet<u16>>,
}

impl MemoryAllocationLayout {
    /// An empty layout with a zeroed goal per requested module.
    pub fn for_request(request: &MemoryAllocationRequest) -> Self {
        Self {
            goals: request
                .dimms()
                .iter()
                .map(|dimm| (dimm.uid.clone(), ConfigGoal::default()))
                .collect(),
            app_direct_capacities_gib: vec![0; request.app_direct_extents.len()],
            extent_set_ids: vec![BTreeSet::new(); request.app_direct_extents.len()],
            ..Self::default()
        }
    }

    pub fn warnings(&self) -> &[LayoutWarning] {
        &self.warnings
    }

    pub fn has_warning(&self, warning: LayoutWarning) -> bool {
        self.warnings.contains(&warning)
    }

    /// Record `warning` once. Returns `true` if it was not present before.
    pub fn push_warning(&mut self, warning: LayoutWarning) -> bool {
        if self.has_warning(warning) {
            return false;
        }
        tracing::debug!(target: "nvmem.alloc", ?warning, "layout warning");
        self.warnings.push(warning);
        true
    }

    pub fn goal(&self, uid: &str) -> Option<&ConfigGoal> {
        self.goals.get(uid)
    }

    pub(crate) fn goal_mut(&mut self, uid: &str) -> &mut ConfigGoal {
        self.goals.entry(uid.to_string()).or_default()
    }

    /// Whole GiB on `dimm` not yet claimed by memory mode or app direct.
    pub fn unallocated_gib(&self, dimm: &Dimm) -> u64 {
        let allocated = self.goal(&dimm.uid).map_or(0, ConfigGoal::allocated_gib);
        dimm.capacity_gib().saturating_sub(allocated)
    }

    pub fn unallocated_gib_on<'a>(&self, dimms: impl IntoIterator<Item = &'a Dimm>) -> u64 {
        dimms.into_iter().map(|dimm| self.unallocated_gib(dimm)).sum()
    }

    pub(crate) fn max_set_id(&self) -> u16 {
        self.goals
            .values()
            .filter_map(ConfigGoal::max_set_id)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn record_extent_set(&mut self, extent: usize, set_id: u16) {
        if let Some(ids) = self.extent_set_ids.get_mut(extent) {
            ids.insert(set_id);
        }
    }

    /// Capacity currently held by the sets created for `extent`.
    pub(crate) fn extent_capacity_gib(&self, extent: usize) -> u64 {
        let Some(ids) = self.extent_set_ids.get(extent) else {
            return 0;
        };
        self.goals
            .values()
            .flat_map(|goal| goal.app_direct_1.iter().chain(goal.app_direct_2.iter()))
            .filter(|set| ids.contains(&set.set_id))
            .map(|set| set.size_gib)
            .sum()
    }

    pub fn total_app_direct_gib(&self) -> u64 {
        self.goals.values().map(ConfigGoal::app_direct_size_gib).sum()
    }

    pub fn total_memory_gib(&self) -> u64 {
        self.goals.values().map(|goal| goal.memory_size_gib).sum()
    }
}
