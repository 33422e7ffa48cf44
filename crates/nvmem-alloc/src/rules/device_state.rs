use std::sync::Arc;

use crate::config_goal::ConfigGoalStatus;
use crate::error::{AllocationError, LibraryError, RejectionKind};
use crate::library::{DeviceLibrary, NamespaceType};
use crate::request::MemoryAllocationRequest;
use crate::rules::RequestRule;

/// A module whose last goal has not been applied successfully cannot take a new one.
pub struct DimmHasConfigGoal {
    library: Arc<dyn DeviceLibrary>,
}

impl DimmHasConfigGoal {
    pub fn new(library: Arc<dyn DeviceLibrary>) -> Self {
        Self { library }
    }
}

impl RequestRule for DimmHasConfigGoal {
    fn name(&self) -> &'static str {
        "dimm_has_config_goal"
    }

    fn verify(&self, request: &MemoryAllocationRequest) -> Result<(), AllocationError> {
        for dimm in request.dimms() {
            match self.library.config_goal(&dimm.uid) {
                Ok(goal) if goal.status != ConfigGoalStatus::Success => {
                    tracing::debug!(
                        target: "nvmem.alloc",
                        uid = %dimm.uid,
                        status = ?goal.status,
                        "dimm has a pending goal"
                    );
                    return Err(RejectionKind::DimmHasConfigGoal.into());
                }
                Ok(_) | Err(LibraryError::NotFound) => {}
                Err(source) => {
                    return Err(AllocationError::library(
                        format!("config_goal({})", dimm.uid),
                        source,
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Requested modules must not hold namespaces.
///
/// When the platform cannot count namespaces, a memory-mode-only request is
/// allowed through as long as memory mode itself is supported. Every other
/// request surfaces the library failure.
pub struct NamespacesExist {
    library: Arc<dyn DeviceLibrary>,
    memory_mode_supported: bool,
}

impl NamespacesExist {
    pub fn new(library: Arc<dyn DeviceLibrary>, memory_mode_supported: bool) -> Self {
        Self {
            library,
            memory_mode_supported,
        }
    }
}

impl RequestRule for NamespacesExist {
    fn name(&self) -> &'static str {
        "namespaces_exist"
    }

    fn verify(&self, request: &MemoryAllocationRequest) -> Result<(), AllocationError> {
        for dimm in request.dimms() {
            match self.library.namespace_count(&dimm.uid, NamespaceType::Unknown) {
                Ok(0) => {}
                Ok(count) => {
                    tracing::debug!(target: "nvmem.alloc", uid = %dimm.uid, count, "dimm has namespaces");
                    return Err(RejectionKind::NamespacesExist.into());
                }
                Err(LibraryError::NotSupported) if request.is_volatile_only() => {
                    if !self.memory_mode_supported {
                        return Err(RejectionKind::VolatileNotSupported.into());
                    }
                }
                Err(source) => {
                    return Err(AllocationError::library(
                        format!("namespace_count({})", dimm.uid),
                        source,
                    ))
                }
            }
        }
        Ok(())
    }
}
