use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, LibraryError, RejectionKind};
use crate::library::DeviceLibrary;
use crate::request::MemoryAllocationRequest;
use crate::reserve::ReserveDimmSelector;
use crate::types::{AppDirectExtent, Dimm};
use crate::units;

/// How capacity left after memory mode and the reservation is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistentType {
    #[default]
    AppDirect,
    AppDirectNotInterleaved,
}

/// Builds a [`MemoryAllocationRequest`] from percentages of the selected modules.
pub struct MemoryAllocationRequestBuilder {
    library: Arc<dyn DeviceLibrary>,
    dimm_uids: Vec<String>,
    sockets: Vec<u16>,
    memory_mode_percent: u32,
    reserved_percent: u32,
    persistent_type: PersistentType,
    reserve_dimm: bool,
}

impl MemoryAllocationRequestBuilder {
    pub fn new(library: Arc<dyn DeviceLibrary>) -> Self {
        Self {
            library,
            dimm_uids: Vec::new(),
            sockets: Vec::new(),
            memory_mode_percent: 0,
            reserved_percent: 0,
            persistent_type: PersistentType::default(),
            reserve_dimm: false,
        }
    }

    #[must_use]
    pub fn dimms<I, S>(mut self, uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimm_uids.extend(uids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn sockets(mut self, sockets: impl IntoIterator<Item = u16>) -> Self {
        self.sockets.extend(sockets);
        self
    }

    #[must_use]
    pub fn memory_mode_percent(mut self, percent: u32) -> Self {
        self.memory_mode_percent = percent;
        self
    }

    #[must_use]
    pub fn reserved_percent(mut self, percent: u32) -> Self {
        self.reserved_percent = percent;
        self
    }

    #[must_use]
    pub fn persistent_type(mut self, persistent_type: PersistentType) -> Self {
        self.persistent_type = persistent_type;
        self
    }

    #[must_use]
    pub fn reserve_dimm(mut self, reserve: bool) -> Self {
        self.reserve_dimm = reserve;
        self
    }

    pub fn build(&self) -> Result<MemoryAllocationRequest, AllocationError> {
        for percent in [self.memory_mode_percent, self.reserved_percent] {
            if percent > 100 {
                return Err(AllocationError::InvalidPercentage(percent));
            }
        }

        let mut dimms = self.selected_dimms()?;
        if self.reserve_dimm {
            let picked = ReserveDimmSelector::new(&dimms)
                .select()
                .map(|dimm| dimm.uid.clone());
            if let Some(uid) = picked {
                if let Some(dimm) = dimms.iter_mut().find(|dimm| dimm.uid == uid) {
                    dimm.reserved = true;
                }
            }
        }

        let mut request = MemoryAllocationRequest::new(dimms);
        request.reserve_dimm = self.reserve_dimm;

        let total_bytes: u64 = request
            .non_reserved_dimms()
            .iter()
            .map(|dimm| dimm.capacity_bytes)
            .sum();
        let memory_gib = percent_of_gib(total_bytes, self.memory_mode_percent);
        let reserved_gib = percent_of_gib(total_bytes, self.reserved_percent);
        let mut app_direct_gib = units::bytes_to_gib(total_bytes)
            .saturating_sub(memory_gib)
            .saturating_sub(reserved_gib);
        if reserved_gib == 0 {
            // A plan that maps every GiB is refused, so one stays as storage.
            app_direct_gib = app_direct_gib.saturating_sub(1);
        }

        request.memory_mode_capacity_gib = memory_gib;
        request.reserved_capacity_gib = reserved_gib;
        if app_direct_gib > 0 {
            request.app_direct_extents.push(match self.persistent_type {
                PersistentType::AppDirect => AppDirectExtent::interleaved(app_direct_gib),
                PersistentType::AppDirectNotInterleaved => AppDirectExtent::by_one(app_direct_gib),
            });
        }

        tracing::debug!(
            target: "nvmem.alloc",
            dimms = request.dimms().len(),
            memory_gib,
            reserved_gib,
            app_direct_gib,
            "built allocation request"
        );
        Ok(request)
    }

    /// Requested modules sorted by UID. With neither UIDs nor sockets given,
    /// every manageable module is selected.
    fn selected_dimms(&self) -> Result<Vec<Dimm>, AllocationError> {
        let manageable = self
            .library
            .manageable_devices()
            .map_err(|source| AllocationError::library("manageable_devices", source))?;

        let mut selected: BTreeMap<String, Dimm> = BTreeMap::new();
        if self.dimm_uids.is_empty() && self.sockets.is_empty() {
            for device in &manageable {
                selected.insert(device.uid.clone(), device.to_dimm());
            }
            return Ok(selected.into_values().collect());
        }

        for uid in &self.dimm_uids {
            let device = match self.library.device(uid) {
                Ok(device) => device,
                Err(LibraryError::NotFound) => return Err(RejectionKind::InvalidDimm.into()),
                Err(source) => return Err(AllocationError::library(format!("device({uid})"), source)),
            };
            selected.insert(device.uid.clone(), device.to_dimm());
        }
        for device in manageable
            .iter()
            .filter(|device| self.sockets.contains(&device.socket_id))
        {
            selected.insert(device.uid.clone(), device.to_dimm());
        }
        Ok(selected.into_values().collect())
    }
}

fn percent_of_gib(total_bytes: u64, percent: u32) -> u64 {
    let bytes = u128::from(total_bytes) * u128::from(percent) / 100;
    units::bytes_to_gib(u64::try_from(bytes).unwrap_or(u64::MAX))
}
