use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AllocationError, RejectionKind};
use crate::library::DeviceDiscovery;
use crate::request::MemoryAllocationRequest;
use crate::rules::RequestRule;
use crate::types::IMCS_PER_SOCKET;

/// Memory mode needs manageable modules behind both memory controllers of
/// every socket the request touches.
pub struct Reject2LMGoalWhenAEPDimmsAreNotInBothIMCs {
    controllers_by_socket: BTreeMap<u16, BTreeSet<u16>>,
}

impl Reject2LMGoalWhenAEPDimmsAreNotInBothIMCs {
    pub fn new(manageable: Vec<DeviceDiscovery>) -> Self {
        let mut controllers_by_socket: BTreeMap<u16, BTreeSet<u16>> = BTreeMap::new();
        for device in manageable {
            controllers_by_socket
                .entry(device.socket_id)
                .or_default()
                .insert(device.memory_controller_id);
        }
        Self {
            controllers_by_socket,
        }
    }
}

impl RequestRule for Reject2LMGoalWhenAEPDimmsAreNotInBothIMCs {
    fn name(&self) -> &'static str {
        "reject_2lm_when_dimms_not_in_both_imcs"
    }

    fn verify(&self, request: &MemoryAllocationRequest) -> Result<(), AllocationError> {
        if request.memory_mode_capacity_gib() == 0 {
            return Ok(());
        }
        for socket in request.sockets() {
            let populated = self
                .controllers_by_socket
                .get(&socket)
                .map_or(0, BTreeSet::len);
            if populated != IMCS_PER_SOCKET {
                tracing::debug!(target: "nvmem.alloc", socket, populated, "memory mode needs both controllers");
                return Err(RejectionKind::BadRequestNoAEPInOneOfTheiMCs.into());
            }
        }
        Ok(())
    }
}
