use std::collections::{BTreeMap, BTreeSet};

use crate::error::AllocationError;
use crate::layout::{LayoutWarning, MemoryAllocationLayout};
use crate::request::MemoryAllocationRequest;
use crate::steps::LayoutStep;
use crate::types::{Dimm, InterleaveSelector, ModeCapabilities, PersistentMode};

/// Warns when a by-one or explicit extent has no recommended platform format.
pub struct SettingsNotRecommended {
    mode: PersistentMode,
    capabilities: ModeCapabilities,
}

impl SettingsNotRecommended {
    pub fn new(mode: PersistentMode, capabilities: ModeCapabilities) -> Self {
        Self { mode, capabilities }
    }
}

impl LayoutStep for SettingsNotRecommended {
    fn name(&self) -> &'static str {
        match self.mode {
            PersistentMode::AppDirect => "app_direct_settings_not_recommended",
            PersistentMode::PmDirect => "persistent_settings_not_recommended",
        }
    }

    fn execute(
        &self,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), AllocationError> {
        let not_recommended = request
            .app_direct_extents
            .iter()
            .filter(|extent| extent.interleave != InterleaveSelector::Default)
            .any(|extent| !self.capabilities.recommends(&extent.interleave));
        if not_recommended {
            layout.push_warning(self.mode.settings_not_recommended());
        }
        Ok(())
    }
}

/// Warns when a socket's modules cannot interleave evenly: mixed capacities,
/// or a channel whose partner on the other controller is missing.
pub struct CheckAsymmetricalPopulation;

impl CheckAsymmetricalPopulation {
    fn socket_is_asymmetric(dimms: &[&Dimm]) -> bool {
        let capacities: BTreeSet<u64> = dimms.iter().map(|dimm| dimm.capacity_bytes).collect();
        if capacities.len() > 1 {
            return true;
        }
        let mut channel_groups: BTreeMap<u32, usize> = BTreeMap::new();
        for dimm in dimms {
            *channel_groups.entry(dimm.channel_group()).or_default() += 1;
        }
        channel_groups.values().any(|count| *count == 1)
    }
}

impl LayoutStep for CheckAsymmetricalPopulation {
    fn name(&self) -> &'static str {
        "check_asymmetrical_population"
    }

    fn execute(
        &self,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), AllocationError> {
        if request.memory_mode_capacity_gib() == 0 && !request.requests_app_direct() {
            return Ok(());
        }

        let mut sockets: BTreeMap<u16, Vec<&Dimm>> = BTreeMap::new();
        for dimm in request.dimms() {
            sockets.entry(dimm.socket_id).or_default().push(dimm);
        }
        if sockets.values().any(|dimms| Self::socket_is_asymmetric(dimms)) {
            layout.push_warning(LayoutWarning::NonOptimalPopulation);
        }
        Ok(())
    }
}
