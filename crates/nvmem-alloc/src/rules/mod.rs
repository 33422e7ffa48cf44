//! Preconditions checked before any capacity is placed.
//!
//! Rules run in registration order and the first failure aborts the run.

mod capabilities;
mod device_state;
mod dimm_list;
mod population;
mod request_shape;

use std::sync::Arc;

use crate::error::AllocationError;
use crate::library::{DeviceDiscovery, DeviceLibrary};
use crate::request::MemoryAllocationRequest;
use crate::types::{PersistentMode, PlatformCapabilities};

pub use capabilities::PersistentNotSupported;
pub use device_state::{DimmHasConfigGoal, NamespacesExist};
pub use dimm_list::DimmListInvalid;
pub use population::Reject2LMGoalWhenAEPDimmsAreNotInBothIMCs;
pub use request_shape::{NoDimms, ReserveDimmPropertyInvalid, TooManyAppDirectExtents};

pub trait RequestRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn verify(&self, request: &MemoryAllocationRequest) -> Result<(), AllocationError>;
}

/// The standard rule chain, in evaluation order.
pub fn standard_rules(
    library: &Arc<dyn DeviceLibrary>,
    capabilities: &PlatformCapabilities,
    manageable: &[DeviceDiscovery],
    mode: PersistentMode,
) -> Vec<Box<dyn RequestRule>> {
    vec![
        Box::new(NoDimms),
        Box::new(TooManyAppDirectExtents),
        Box::new(ReserveDimmPropertyInvalid),
        Box::new(DimmListInvalid::new(manageable.to_vec())),
        Box::new(PersistentNotSupported::new(mode, capabilities.clone())),
        Box::new(DimmHasConfigGoal::new(Arc::clone(library))),
        Box::new(NamespacesExist::new(
            Arc::clone(library),
            capabilities.memory_mode.supported,
        )),
        Box::new(Reject2LMGoalWhenAEPDimmsAreNotInBothIMCs::new(manageable.to_vec())),
    ]
}
