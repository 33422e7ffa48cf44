use serde::{Deserialize, Serialize};

use crate::types::{InterleaveSize, InterleaveWays};

/// Lifecycle of a per-module goal as reported by the device library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigGoalStatus {
    #[default]
    Unknown,
    /// Created but not yet applied by firmware.
    New,
    Success,
    ErrBadRequest,
    ErrInsufficientResources,
    ErrFirmware,
    ErrUnknown,
}

/// Interleave attributes shared by every module of one app-direct set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDirectSettings {
    pub ways: InterleaveWays,
    pub imc: InterleaveSize,
    pub channel: InterleaveSize,
    /// Member modules, in set order.
    pub dimms: Vec<String>,
}

impl AppDirectSettings {
    /// Two sets can be merged into one when they stripe the same way. x1 sets
    /// only need the way count to agree.
    pub fn compatible_with(&self, other: &AppDirectSettings) -> bool {
        if self.ways != other.ways {
            return false;
        }
        self.ways == InterleaveWays::One
            || (self.imc == other.imc && self.channel == other.channel && self.dimms == other.dimms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDirectSet {
    pub size_gib: u64,
    pub set_id: u16,
    pub settings: AppDirectSettings,
}

/// The capacity partition of a single module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigGoal {
    pub memory_size_gib: u64,
    pub app_direct_1: Option<AppDirectSet>,
    pub app_direct_2: Option<AppDirectSet>,
    #[serde(default)]
    pub status: ConfigGoalStatus,
}

impl ConfigGoal {
    pub fn app_direct_count(&self) -> usize {
        usize::from(self.app_direct_1.is_some()) + usize::from(self.app_direct_2.is_some())
    }

    pub fn app_direct_1_size_gib(&self) -> u64 {
        self.app_direct_1.as_ref().map_or(0, |set| set.size_gib)
    }

    pub fn app_direct_2_size_gib(&self) -> u64 {
        self.app_direct_2.as_ref().map_or(0, |set| set.size_gib)
    }

    pub fn app_direct_size_gib(&self) -> u64 {
        self.app_direct_1_size_gib() + self.app_direct_2_size_gib()
    }

    pub fn allocated_gib(&self) -> u64 {
        self.memory_size_gib + self.app_direct_size_gib()
    }

    pub fn max_set_id(&self) -> Option<u16> {
        self.app_direct_1
            .iter()
            .chain(self.app_direct_2.iter())
            .map(|set| set.set_id)
            .max()
    }

    /// Most recently added set, the only one a later placement may extend.
    pub fn last_set_mut(&mut self) -> Option<&mut AppDirectSet> {
        match self.app_direct_2 {
            Some(ref mut set) => Some(set),
            None => self.app_direct_1.as_mut(),
        }
    }

    /// Append a set in the next free slot. Returns `false` when both slots are taken.
    pub fn push_set(&mut self, set: AppDirectSet) -> bool {
        if self.app_direct_1.is_none() {
            self.app_direct_1 = Some(set);
        } else if self.app_direct_2.is_none() {
            self.app_direct_2 = Some(set);
        } else {
            return false;
        }
        true
    }

    /// Drop the first set. A surviving second set moves into the first slot.
    pub fn remove_app_direct_1(&mut self) {
        self.app_direct_1 = self.app_direct_2.take();
    }

    pub fn remove_app_direct_2(&mut self) {
        self.app_direct_2 = None;
    }
}
