use std::collections::BTreeMap;

use crate::config_goal::{AppDirectSet, AppDirectSettings, ConfigGoal};
use crate::error::AllocationError;
use crate::layout::MemoryAllocationLayout;
use crate::request::MemoryAllocationRequest;
use crate::steps::{symmetric_share, LayoutStep};
use crate::types::{
    AppDirectExtent, Dimm, InterleaveSelector, InterleaveSize, InterleaveWays, ModeCapabilities,
    DIMMS_PER_SOCKET, IMCS_PER_SOCKET, MAX_APP_DIRECT_EXTENTS,
};

/// Socket population patterns tried for an interleave set, widest first.
///
/// Bit `n` is socket slot `n` (see [`Dimm::socket_slot`]).
pub const INTERLEAVE_SETS: [u8; 21] = [
    // x6
    0b111111,
    // x4
    0b001111, 0b111100, 0b110011,
    // x3
    0b010101, 0b101010,
    // x2 across controllers
    0b000011, 0b001100, 0b110000,
    // x2 across channels
    0b000101, 0b001010, 0b010100, 0b101000, 0b010001, 0b100010,
    // x1
    0b000001, 0b000010, 0b000100, 0b001000, 0b010000, 0b100000,
];

/// Places one requested app-direct extent.
pub struct AppDirectStep {
    index: usize,
    capabilities: ModeCapabilities,
    existing_max_set_id: u16,
}

impl AppDirectStep {
    pub fn new(index: usize, capabilities: ModeCapabilities, existing_max_set_id: u16) -> Self {
        Self {
            index,
            capabilities,
            existing_max_set_id,
        }
    }
}

impl LayoutStep for AppDirectStep {
    fn name(&self) -> &'static str {
        "app_direct"
    }

    fn execute(
        &self,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), AllocationError> {
        let Some(extent) = request.app_direct_extents.get(self.index) else {
            return Ok(());
        };
        let dimms = request.non_reserved_dimms();
        let placement = ExtentPlacement {
            step: self,
            extent,
            prior_set_counts: dimms
                .iter()
                .map(|dimm| {
                    let count = layout.goal(&dimm.uid).map_or(0, ConfigGoal::app_direct_count);
                    (dimm.uid.clone(), count)
                })
                .collect(),
        };

        let placed = if extent.capacity_gib == 0 {
            0
        } else if extent.interleave.is_by_one() {
            placement.by_one(layout, &dimms)
        } else {
            placement.interleaved(layout, &dimms)
        };

        tracing::debug!(
            target: "nvmem.alloc",
            extent = self.index,
            requested = extent.capacity_gib,
            placed,
            "app direct extent placed"
        );
        if let Some(slot) = layout.app_direct_capacities_gib.get_mut(self.index) {
            *slot = placed;
        }
        layout.app_direct_capacity_gib += placed;
        Ok(())
    }
}

struct ExtentPlacement<'s> {
    step: &'s AppDirectStep,
    extent: &'s AppDirectExtent,
    /// Sets each module held before this extent; anything above belongs to it.
    prior_set_counts: BTreeMap<String, usize>,
}

impl ExtentPlacement<'_> {
    /// One x1 set per module, an equal share on each.
    fn by_one(&self, layout: &mut MemoryAllocationLayout, dimms: &[&Dimm]) -> u64 {
        let settings_for = |dimm: &Dimm| self.settings(vec![dimm.uid.clone()]);
        let mut remaining = self.extent.capacity_gib;
        while remaining > 0 {
            let candidates: Vec<&Dimm> = dimms
                .iter()
                .copied()
                .filter(|dimm| self.can_map(layout, dimm, &settings_for(dimm)))
                .collect();
            let (share, included) = symmetric_share(layout, &candidates, remaining);
            if share == 0 {
                break;
            }
            let before = remaining;
            for dimm in included {
                if self.layout_set(layout, &[dimm], share) {
                    remaining -= share;
                }
            }
            if remaining == before {
                break;
            }
        }
        self.extent.capacity_gib - remaining
    }

    /// Repeats interleaved passes until the extent is placed or a pass places
    /// nothing. Later passes put the remainder on modules that still have room.
    fn interleaved(&self, layout: &mut MemoryAllocationLayout, dimms: &[&Dimm]) -> u64 {
        let mut remaining = self.extent.capacity_gib;
        while remaining > 0 {
            let placed = self.interleaved_pass(layout, dimms, remaining);
            if placed == 0 {
                break;
            }
            tracing::trace!(target: "nvmem.alloc", extent = self.step.index, placed, "interleaved pass");
            remaining = remaining.saturating_sub(placed);
        }
        self.extent.capacity_gib - remaining
    }

    /// Splits `requested_gib` evenly across sockets, then per socket lays out
    /// the widest sets the population allows.
    fn interleaved_pass(
        &self,
        layout: &mut MemoryAllocationLayout,
        dimms: &[&Dimm],
        requested_gib: u64,
    ) -> u64 {
        let mut sockets: BTreeMap<u16, Vec<&Dimm>> = BTreeMap::new();
        for dimm in dimms.iter().copied() {
            let usable = in_slot_map(dimm)
                && layout.unallocated_gib(dimm) > 0
                && self.has_set_room(layout, dimm);
            if usable {
                sockets.entry(dimm.socket_id).or_default().push(dimm);
            }
        }
        let dimm_count: usize = sockets.values().map(Vec::len).sum();
        if dimm_count == 0 {
            return 0;
        }

        let per_dimm = requested_gib / dimm_count as u64;
        sockets
            .values()
            .map(|socket_dimms| {
                let per_socket = per_dimm * socket_dimms.len() as u64;
                self.layout_socket(layout, socket_dimms, per_socket)
            })
            .sum()
    }

    fn layout_socket(
        &self,
        layout: &mut MemoryAllocationLayout,
        socket_dimms: &[&Dimm],
        per_socket: u64,
    ) -> u64 {
        let mut available: Vec<&Dimm> = socket_dimms.to_vec();
        let max_per_dimm = per_socket / available.len().max(1) as u64;
        let mut remaining = per_socket;

        while remaining > 0 && !available.is_empty() {
            let Some(set_dimms) = self.best_interleave(layout, &available) else {
                break;
            };
            let (share, included) = symmetric_share(layout, &set_dimms, remaining);
            let share = share.min(max_per_dimm);
            if share == 0 || included.len() != set_dimms.len() {
                break;
            }
            if self.layout_set(layout, &set_dimms, share) {
                remaining = remaining.saturating_sub(share * set_dimms.len() as u64);
            }
            available.retain(|dimm| !set_dimms.iter().any(|used| used.uid == dimm.uid));
        }
        per_socket - remaining
    }

    /// The widest pattern whose slots all hold a module with free capacity
    /// that can take another set.
    fn best_interleave<'d>(
        &self,
        layout: &MemoryAllocationLayout,
        dimms: &[&'d Dimm],
    ) -> Option<Vec<&'d Dimm>> {
        let mut by_slot: BTreeMap<u32, &'d Dimm> = BTreeMap::new();
        for dimm in dimms.iter().copied() {
            if in_slot_map(dimm) && layout.unallocated_gib(dimm) > 0 {
                by_slot.entry(dimm.socket_slot()).or_insert(dimm);
            }
        }
        let population = by_slot.keys().fold(0u8, |mask, slot| mask | (1 << slot));

        INTERLEAVE_SETS
            .iter()
            .filter(|pattern| population & **pattern == **pattern)
            .find_map(|pattern| {
                let set_dimms: Vec<&'d Dimm> = by_slot
                    .iter()
                    .filter(|(slot, _)| pattern & (1 << **slot) != 0)
                    .map(|(_, dimm)| *dimm)
                    .collect();
                let settings = self.settings(set_dimms.iter().map(|d| d.uid.clone()).collect());
                set_dimms
                    .iter()
                    .all(|dimm| self.can_map(layout, dimm, &settings))
                    .then_some(set_dimms)
            })
    }

    /// Whether `dimm` can hold `settings`: a free set slot, or a last set
    /// created by this extent that the new one can extend.
    fn can_map(&self, layout: &MemoryAllocationLayout, dimm: &Dimm, settings: &AppDirectSettings) -> bool {
        let Some(goal) = layout.goal(&dimm.uid) else {
            return true;
        };
        let count = goal.app_direct_count();
        if count < MAX_APP_DIRECT_EXTENTS {
            return true;
        }
        self.extends_last_set(goal, &dimm.uid, settings)
    }

    /// Whether `dimm` has a free set slot or a set from this extent that a
    /// later pass might extend.
    fn has_set_room(&self, layout: &MemoryAllocationLayout, dimm: &Dimm) -> bool {
        let Some(goal) = layout.goal(&dimm.uid) else {
            return true;
        };
        let prior = self.prior_set_counts.get(&dimm.uid).copied().unwrap_or(0);
        goal.app_direct_count() < MAX_APP_DIRECT_EXTENTS || goal.app_direct_count() > prior
    }

    fn extends_last_set(&self, goal: &ConfigGoal, uid: &str, settings: &AppDirectSettings) -> bool {
        let prior = self.prior_set_counts.get(uid).copied().unwrap_or(0);
        if goal.app_direct_count() <= prior {
            return false;
        }
        let last = goal.app_direct_2.as_ref().or(goal.app_direct_1.as_ref());
        last.is_some_and(|set| set.settings.compatible_with(settings))
    }

    /// Adds `size_gib` on each of `set_dimms` as one interleave set. Nothing
    /// is written unless every member can take it.
    fn layout_set(&self, layout: &mut MemoryAllocationLayout, set_dimms: &[&Dimm], size_gib: u64) -> bool {
        let settings = self.settings(set_dimms.iter().map(|d| d.uid.clone()).collect());
        let set_id = self
            .step
            .existing_max_set_id
            .max(layout.max_set_id())
            .saturating_add(1);

        let mut extends = Vec::with_capacity(set_dimms.len());
        for dimm in set_dimms {
            let goal = layout.goal(&dimm.uid);
            let extend = goal.is_some_and(|goal| self.extends_last_set(goal, &dimm.uid, &settings));
            let free_slot = goal.map_or(true, |goal| goal.app_direct_count() < MAX_APP_DIRECT_EXTENTS);
            if !extend && !free_slot {
                tracing::warn!(target: "nvmem.alloc", uid = %dimm.uid, "no free interleave set slot");
                return false;
            }
            extends.push(extend);
        }

        let mut used_id = None;
        for (dimm, extend) in set_dimms.iter().zip(extends) {
            let goal = layout.goal_mut(&dimm.uid);
            if extend {
                if let Some(last) = goal.last_set_mut() {
                    last.size_gib += size_gib;
                    used_id = Some(last.set_id);
                    continue;
                }
            }
            goal.push_set(AppDirectSet {
                size_gib,
                set_id,
                settings: settings.clone(),
            });
            used_id = Some(set_id);
        }
        if let Some(id) = used_id {
            layout.record_extent_set(self.step.index, id);
        }
        true
    }

    fn settings(&self, dimms: Vec<String>) -> AppDirectSettings {
        let ways = InterleaveWays::from_dimm_count(dimms.len()).unwrap_or(InterleaveWays::One);
        let (imc, channel) = match self.extent.interleave {
            InterleaveSelector::Explicit { imc, channel } => (imc, channel),
            InterleaveSelector::ByOne | InterleaveSelector::Default => self
                .step
                .capabilities
                .default_sizes_for(ways)
                .unwrap_or((InterleaveSize::default(), InterleaveSize::default())),
        };
        AppDirectSettings {
            ways,
            imc,
            channel,
            dimms,
        }
    }
}

/// Modules outside the two-controller slot map would share a slot with
/// another module, so interleaving never uses them.
fn in_slot_map(dimm: &Dimm) -> bool {
    usize::from(dimm.memory_controller_id) < IMCS_PER_SOCKET && dimm.socket_slot() < DIMMS_PER_SOCKET
}
