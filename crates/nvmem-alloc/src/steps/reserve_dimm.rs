use crate::config_goal::ConfigGoal;
use crate::error::AllocationError;
use crate::layout::MemoryAllocationLayout;
use crate::request::MemoryAllocationRequest;
use crate::steps::LayoutStep;

/// Sets the reserved module aside: its whole capacity becomes storage.
pub struct ReserveDimmStep;

impl LayoutStep for ReserveDimmStep {
    fn name(&self) -> &'static str {
        "reserve_dimm"
    }

    fn execute(
        &self,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), AllocationError> {
        let Some(dimm) = request.reserved_dimm() else {
            return Ok(());
        };
        tracing::debug!(target: "nvmem.alloc", uid = %dimm.uid, "reserving dimm for storage");
        *layout.goal_mut(&dimm.uid) = ConfigGoal::default();
        layout.reserved_dimm_uid = Some(dimm.uid.clone());
        layout.storage_capacity_gib = dimm.capacity_gib();
        Ok(())
    }
}
