use std::collections::BTreeMap;

use crate::config_goal::ConfigGoal;
use crate::error::{AllocationError, RejectionKind};
use crate::layout::MemoryAllocationLayout;
use crate::request::MemoryAllocationRequest;
use crate::steps::LayoutStep;
use crate::types::Dimm;

/// Frees app-direct capacity until the requested reservation fits, then
/// accounts for what is left unmapped.
pub struct ReservedStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pool {
    First,
    Second,
}

impl Pool {
    fn size_gib(self, goal: &ConfigGoal) -> u64 {
        match self {
            Pool::First => goal.app_direct_1_size_gib(),
            Pool::Second => goal.app_direct_2_size_gib(),
        }
    }

    fn set_id(self, goal: &ConfigGoal) -> Option<u16> {
        match self {
            Pool::First => goal.app_direct_1.as_ref(),
            Pool::Second => goal.app_direct_2.as_ref(),
        }
        .map(|set| set.set_id)
    }

    fn set_size_gib(self, goal: &mut ConfigGoal, size_gib: u64) {
        if size_gib == 0 {
            match self {
                Pool::First => goal.remove_app_direct_1(),
                Pool::Second => goal.remove_app_direct_2(),
            }
            return;
        }
        let set = match self {
            Pool::First => goal.app_direct_1.as_mut(),
            Pool::Second => goal.app_direct_2.as_mut(),
        };
        if let Some(set) = set {
            set.size_gib = size_gib;
        }
    }
}

impl LayoutStep for ReservedStep {
    fn name(&self) -> &'static str {
        "reserved"
    }

    fn execute(
        &self,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), AllocationError> {
        let reserved = request.reserved_capacity_gib();
        let dimms = request.non_reserved_dimms();

        if reserved > 0 {
            let free = layout.unallocated_gib_on(dimms.iter().copied());
            let shortfall = reserved.saturating_sub(free);
            if shortfall > 0 {
                tracing::debug!(target: "nvmem.alloc", reserved, free, shortfall, "shrinking app direct pools");
                let left = shrink_pool(layout, &dimms, Pool::Second, shortfall);
                shrink_pool(layout, &dimms, Pool::First, left);

                layout.app_direct_capacity_gib = layout.total_app_direct_gib();
                for index in 0..layout.app_direct_capacities_gib.len() {
                    layout.app_direct_capacities_gib[index] = layout.extent_capacity_gib(index);
                }
            }
        }

        let remaining = layout.unallocated_gib_on(dimms.iter().copied());
        layout.remaining_capacity_gib = remaining;
        layout.storage_capacity_gib += remaining;

        if remaining == 0 {
            tracing::debug!(target: "nvmem.alloc", reserved, "no capacity left on requested modules");
            return Err(RejectionKind::BadRequestSize.into());
        }
        Ok(())
    }
}

/// Shrinks `pool` across `dimms` by `shrink_gib`, spread evenly and rounded up
/// per module. Every member of an interleave set gives up the same amount, so
/// a set may shrink past what was asked. Returns what could not be taken from
/// this pool.
fn shrink_pool(
    layout: &mut MemoryAllocationLayout,
    dimms: &[&Dimm],
    pool: Pool,
    mut shrink_gib: u64,
) -> u64 {
    let mut sets: BTreeMap<u16, Vec<&Dimm>> = BTreeMap::new();
    for dimm in dimms.iter().copied() {
        if let Some(set_id) = layout.goal(&dimm.uid).and_then(|goal| pool.set_id(goal)) {
            sets.entry(set_id).or_default().push(dimm);
        }
    }
    let holders: usize = sets.values().map(Vec::len).sum();
    if shrink_gib == 0 || holders == 0 {
        return shrink_gib;
    }

    let total: u64 = sets
        .values()
        .flatten()
        .filter_map(|dimm| layout.goal(&dimm.uid))
        .map(|goal| pool.size_gib(goal))
        .sum();
    if shrink_gib >= total {
        for dimm in sets.values().flatten() {
            pool.set_size_gib(layout.goal_mut(&dimm.uid), 0);
        }
        return shrink_gib - total;
    }

    let reduce_by = shrink_gib.div_ceil(holders as u64);
    for members in sets.values() {
        if shrink_gib == 0 {
            break;
        }
        for dimm in members {
            let goal = layout.goal_mut(&dimm.uid);
            let size = pool.size_gib(goal);
            let new_size = size.saturating_sub(reduce_by);
            shrink_gib = shrink_gib.saturating_sub(size - new_size);
            pool.set_size_gib(goal, new_size);
        }
    }
    shrink_gib
}
