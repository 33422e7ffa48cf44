use crate::error::AllocationError;
use crate::layout::MemoryAllocationLayout;
use crate::request::MemoryAllocationRequest;
use crate::steps::{symmetric_share, LayoutStep};

/// Spreads memory-mode capacity evenly over the non-reserved modules.
pub struct MemoryModeStep;

impl LayoutStep for MemoryModeStep {
    fn name(&self) -> &'static str {
        "memory_mode"
    }

    fn execute(
        &self,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), AllocationError> {
        let requested = request.memory_mode_capacity_gib();
        let dimms = request.non_reserved_dimms();
        let mut remaining = requested;

        // Smaller modules fill first; keep going while the rest can take an equal share.
        while remaining > 0 {
            let (share, included) = symmetric_share(layout, &dimms, remaining);
            if share == 0 {
                break;
            }
            for dimm in included {
                layout.goal_mut(&dimm.uid).memory_size_gib += share;
                remaining -= share;
            }
        }

        layout.memory_capacity_gib = requested - remaining;
        if remaining > 0 {
            tracing::debug!(
                target: "nvmem.alloc",
                requested,
                placed = layout.memory_capacity_gib,
                "memory mode request not fully placed"
            );
        }
        Ok(())
    }
}
