use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AllocationError, RejectionKind};
use crate::library::DeviceDiscovery;
use crate::request::MemoryAllocationRequest;
use crate::rules::RequestRule;

/// Every requested module must be unique and match what discovery reported.
pub struct DimmListInvalid {
    manageable: BTreeMap<String, DeviceDiscovery>,
}

impl DimmListInvalid {
    pub fn new(manageable: Vec<DeviceDiscovery>) -> Self {
        Self {
            manageable: manageable
                .into_iter()
                .map(|device| (device.uid.clone(), device))
                .collect(),
        }
    }
}

impl RequestRule for DimmListInvalid {
    fn name(&self) -> &'static str {
        "dimm_list_invalid"
    }

    fn verify(&self, request: &MemoryAllocationRequest) -> Result<(), AllocationError> {
        let mut seen = BTreeSet::new();
        for dimm in request.dimms() {
            if !seen.insert(dimm.uid.as_str()) {
                tracing::debug!(target: "nvmem.alloc", uid = %dimm.uid, "duplicate dimm in request");
                return Err(RejectionKind::BadDimmList.into());
            }

            let Some(device) = self.manageable.get(&dimm.uid) else {
                tracing::debug!(target: "nvmem.alloc", uid = %dimm.uid, "dimm is not manageable");
                return Err(RejectionKind::InvalidDimm.into());
            };

            if device.socket_id != dimm.socket_id
                || device.memory_controller_id != dimm.memory_controller_id
                || device.capacity_bytes != dimm.capacity_bytes
            {
                tracing::debug!(
                    target: "nvmem.alloc",
                    uid = %dimm.uid,
                    ?device,
                    "requested dimm disagrees with discovery"
                );
                return Err(RejectionKind::BadDimmList.into());
            }
        }
        Ok(())
    }
}
