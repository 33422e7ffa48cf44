use crate::error::{AllocationError, RejectionKind};
use crate::request::MemoryAllocationRequest;
use crate::rules::RequestRule;
use crate::types::MAX_APP_DIRECT_EXTENTS;

pub struct NoDimms;

impl RequestRule for NoDimms {
    fn name(&self) -> &'static str {
        "no_dimms"
    }

    fn verify(&self, request: &MemoryAllocationRequest) -> Result<(), AllocationError> {
        if request.dimms().is_empty() {
            return Err(RejectionKind::BadRequestNoDimms.into());
        }
        Ok(())
    }
}

pub struct TooManyAppDirectExtents;

impl RequestRule for TooManyAppDirectExtents {
    fn name(&self) -> &'static str {
        "too_many_app_direct_extents"
    }

    fn verify(&self, request: &MemoryAllocationRequest) -> Result<(), AllocationError> {
        if request.app_direct_extents.len() > MAX_APP_DIRECT_EXTENTS {
            return Err(RejectionKind::TooManyAppDirectExtents.into());
        }
        Ok(())
    }
}

/// A lone module cannot be reserved for storage and also carry other capacity.
pub struct ReserveDimmPropertyInvalid;

impl RequestRule for ReserveDimmPropertyInvalid {
    fn name(&self) -> &'static str {
        "reserve_dimm_property_invalid"
    }

    fn verify(&self, request: &MemoryAllocationRequest) -> Result<(), AllocationError> {
        let wants_capacity =
            request.memory_mode_capacity_gib() > 0 || request.app_direct_capacity_gib() > 0;
        if request.reserves_dimm() && request.dimms().len() == 1 && wants_capacity {
            return Err(RejectionKind::BadRequestReserveDimm.into());
        }
        Ok(())
    }
}
