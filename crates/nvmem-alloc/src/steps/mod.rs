//! Ordered stages that turn an accepted request into a layout.

mod app_direct;
mod memory;
mod reserve_dimm;
mod reserved;
mod warnings;

use crate::error::AllocationError;
use crate::layout::MemoryAllocationLayout;
use crate::request::MemoryAllocationRequest;
use crate::types::{Dimm, PersistentMode, PlatformCapabilities};

pub use app_direct::{AppDirectStep, INTERLEAVE_SETS};
pub use memory::MemoryModeStep;
pub use reserve_dimm::ReserveDimmStep;
pub use reserved::ReservedStep;
pub use warnings::{CheckAsymmetricalPopulation, SettingsNotRecommended};

pub trait LayoutStep: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute(
        &self,
        request: &MemoryAllocationRequest,
        layout: &mut MemoryAllocationLayout,
    ) -> Result<(), AllocationError>;
}

/// The standard step sequence for `request`: one app-direct step per extent.
///
/// New interleave set ids start after `existing_max_set_id`.
pub fn standard_steps(
    request: &MemoryAllocationRequest,
    capabilities: &PlatformCapabilities,
    mode: PersistentMode,
    existing_max_set_id: u16,
) -> Vec<Box<dyn LayoutStep>> {
    let persistent = mode.capabilities(capabilities);
    let mut steps: Vec<Box<dyn LayoutStep>> = vec![Box::new(ReserveDimmStep), Box::new(MemoryModeStep)];
    for index in 0..request.app_direct_extents.len() {
        steps.push(Box::new(AppDirectStep::new(
            index,
            persistent.clone(),
            existing_max_set_id,
        )));
    }
    steps.push(Box::new(ReservedStep));
    steps.push(Box::new(SettingsNotRecommended::new(mode, persistent.clone())));
    steps.push(Box::new(CheckAsymmetricalPopulation));
    steps
}

/// GiB to place on each of `dimms` so that every module with free capacity
/// gets the same amount: `requested / n`, bounded by the smallest free module.
/// Returns the share and the modules it applies to.
pub(crate) fn symmetric_share<'a>(
    layout: &MemoryAllocationLayout,
    dimms: &[&'a Dimm],
    requested_gib: u64,
) -> (u64, Vec<&'a Dimm>) {
    let included: Vec<&'a Dimm> = dimms
        .iter()
        .copied()
        .filter(|dimm| layout.unallocated_gib(dimm) > 0)
        .collect();
    let Some(smallest) = included.iter().map(|dimm| layout.unallocated_gib(dimm)).min() else {
        return (0, included);
    };
    let even = requested_gib / included.len() as u64;
    (smallest.min(even), included)
}
