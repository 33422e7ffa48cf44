use crate::error::{AllocationError, RejectionKind};
use crate::layout::MemoryAllocationLayout;
use crate::request::MemoryAllocationRequest;

/// Largest accepted difference between requested and laid out capacity, in percent.
pub const ACCEPTED_PERCENT_DEVIATION: f64 = 10.0;

/// Judges a finished layout against the request that produced it.
pub trait PostLayoutCheck: Send + Sync {
    fn name(&self) -> &'static str;

    fn verify(
        &self,
        request: &MemoryAllocationRequest,
        layout: &MemoryAllocationLayout,
    ) -> Result<(), AllocationError>;
}

/// Rejects layouts that dropped a requested region or strayed more than
/// [`ACCEPTED_PERCENT_DEVIATION`] from it.
pub struct PostLayoutRequestDeviationCheck;

impl PostLayoutRequestDeviationCheck {
    /// Percent deviation of `observed` from `expected`. `expected` must be non-zero.
    pub fn deviation_percent(expected: u64, observed: u64) -> f64 {
        let diff = expected.abs_diff(observed) as f64;
        100.0 * diff / expected as f64
    }

    fn acceptable(expected: u64, observed: u64) -> bool {
        observed != 0 && Self::deviation_percent(expected, observed) <= ACCEPTED_PERCENT_DEVIATION
    }
}

impl PostLayoutCheck for PostLayoutRequestDeviationCheck {
    fn name(&self) -> &'static str {
        "post_layout_request_deviation"
    }

    fn verify(
        &self,
        request: &MemoryAllocationRequest,
        layout: &MemoryAllocationLayout,
    ) -> Result<(), AllocationError> {
        let memory = request.memory_mode_capacity_gib();
        if memory > 0 && !Self::acceptable(memory, layout.memory_capacity_gib) {
            tracing::debug!(
                target: "nvmem.alloc",
                expected = memory,
                observed = layout.memory_capacity_gib,
                "memory mode capacity deviates too far"
            );
            return Err(RejectionKind::UnacceptableLayoutDeviation.into());
        }

        for (index, extent) in request.app_direct_extents.iter().enumerate() {
            if extent.capacity_gib == 0 {
                continue;
            }
            let observed = layout
                .app_direct_capacities_gib
                .get(index)
                .copied()
                .unwrap_or(0);
            if !Self::acceptable(extent.capacity_gib, observed) {
                tracing::debug!(
                    target: "nvmem.alloc",
                    extent = index,
                    expected = extent.capacity_gib,
                    observed,
                    "app direct capacity deviates too far"
                );
                return Err(RejectionKind::UnacceptableLayoutDeviation.into());
            }
        }
        Ok(())
    }
}
