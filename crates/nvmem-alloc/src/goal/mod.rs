//! Per-device goals: the layout's output paired with device metadata.

mod collection;
mod service;

use serde::{Deserialize, Serialize};

use crate::config_goal::{ConfigGoal, ConfigGoalStatus};
use crate::library::DeviceDiscovery;
use crate::types::{InterleaveSize, InterleaveWays};
use crate::units;

pub use collection::MemoryAllocationGoalCollection;
pub use service::{GoalServiceError, MemoryAllocationGoalService};

/// A configuration goal bound to the device it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAllocationGoal {
    pub device: DeviceDiscovery,
    pub goal: ConfigGoal,
}

impl MemoryAllocationGoal {
    pub fn new(device: DeviceDiscovery, goal: ConfigGoal) -> Self {
        Self { device, goal }
    }

    pub fn device_uid(&self) -> &str {
        &self.device.uid
    }

    pub fn socket_id(&self) -> u16 {
        self.device.socket_id
    }

    pub fn device_capacity_bytes(&self) -> u64 {
        self.device.capacity_bytes
    }

    pub fn status(&self) -> ConfigGoalStatus {
        self.goal.status
    }

    pub fn memory_size_bytes(&self) -> u64 {
        units::gib_to_bytes(self.goal.memory_size_gib)
    }

    pub fn app_direct_count(&self) -> usize {
        self.goal.app_direct_count()
    }

    pub fn app_direct_1_size_bytes(&self) -> u64 {
        units::gib_to_bytes(self.goal.app_direct_1_size_gib())
    }

    pub fn app_direct_2_size_bytes(&self) -> u64 {
        units::gib_to_bytes(self.goal.app_direct_2_size_gib())
    }

    pub fn app_direct_1_set_id(&self) -> Option<u16> {
        self.goal.app_direct_1.as_ref().map(|set| set.set_id)
    }

    pub fn app_direct_2_set_id(&self) -> Option<u16> {
        self.goal.app_direct_2.as_ref().map(|set| set.set_id)
    }

    pub fn app_direct_1_ways(&self) -> Option<InterleaveWays> {
        self.goal.app_direct_1.as_ref().map(|set| set.settings.ways)
    }

    pub fn app_direct_2_ways(&self) -> Option<InterleaveWays> {
        self.goal.app_direct_2.as_ref().map(|set| set.settings.ways)
    }

    /// `(imc, channel)` interleave sizes of the first set.
    pub fn app_direct_1_interleave_sizes(&self) -> Option<(InterleaveSize, InterleaveSize)> {
        self.goal
            .app_direct_1
            .as_ref()
            .map(|set| (set.settings.imc, set.settings.channel))
    }

    pub fn app_direct_2_interleave_sizes(&self) -> Option<(InterleaveSize, InterleaveSize)> {
        self.goal
            .app_direct_2
            .as_ref()
            .map(|set| (set.settings.imc, set.settings.channel))
    }

    /// Capacity left to storage: the persistent partition minus app direct.
    ///
    /// Without memory mode the whole device is persistent; otherwise the
    /// persistent partition is the GiB-aligned capacity minus memory mode.
    pub fn storage_size_bytes(&self) -> u64 {
        let persistent = if self.goal.memory_size_gib == 0 {
            self.device.capacity_bytes
        } else {
            let aligned = units::gib_to_bytes(units::bytes_to_gib(self.device.capacity_bytes));
            aligned.saturating_sub(self.memory_size_bytes())
        };
        persistent.saturating_sub(units::gib_to_bytes(self.goal.app_direct_size_gib()))
    }
}
