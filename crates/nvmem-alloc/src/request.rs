use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::reserve::ReserveDimmSelector;
use crate::types::{AppDirectExtent, Dimm};

/// Planning input. Capacities are whole GiB and zero means "not requested".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAllocationRequest {
    pub dimms: Vec<Dimm>,
    /// Set one whole module aside for storage.
    #[serde(default)]
    pub reserve_dimm: bool,
    #[serde(default)]
    pub memory_mode_capacity_gib: u64,
    /// Capacity to leave unmapped on the non-reserved modules.
    #[serde(default)]
    pub reserved_capacity_gib: u64,
    #[serde(default)]
    pub app_direct_extents: Vec<AppDirectExtent>,
}

impl MemoryAllocationRequest {
    pub fn new(dimms: Vec<Dimm>) -> Self {
        Self {
            dimms,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_memory_mode_gib(mut self, gib: u64) -> Self {
        self.memory_mode_capacity_gib = gib;
        self
    }

    #[must_use]
    pub fn with_reserved_gib(mut self, gib: u64) -> Self {
        self.reserved_capacity_gib = gib;
        self
    }

    #[must_use]
    pub fn with_extent(mut self, extent: AppDirectExtent) -> Self {
        self.app_direct_extents.push(extent);
        self
    }

    #[must_use]
    pub fn with_reserve_dimm(mut self) -> Self {
        self.reserve_dimm = true;
        self
    }

    pub fn dimms(&self) -> &[Dimm] {
        &self.dimms
    }

    /// Whether one module is set aside, either flagged directly or via `reserve_dimm`.
    pub fn reserves_dimm(&self) -> bool {
        self.reserve_dimm || self.dimms.iter().any(|dimm| dimm.reserved)
    }

    /// The module set aside for storage. A module flagged `reserved` wins;
    /// otherwise [`ReserveDimmSelector`] picks one.
    pub fn reserved_dimm(&self) -> Option<&Dimm> {
        if let Some(flagged) = self.dimms.iter().find(|dimm| dimm.reserved) {
            return Some(flagged);
        }
        if !self.reserve_dimm {
            return None;
        }
        ReserveDimmSelector::new(&self.dimms).select()
    }

    pub fn non_reserved_dimms(&self) -> Vec<&Dimm> {
        let reserved = self.reserved_dimm().map(|dimm| dimm.uid.as_str());
        self.dimms
            .iter()
            .filter(|dimm| Some(dimm.uid.as_str()) != reserved)
            .collect()
    }

    pub fn memory_mode_capacity_gib(&self) -> u64 {
        self.memory_mode_capacity_gib
    }

    pub fn reserved_capacity_gib(&self) -> u64 {
        self.reserved_capacity_gib
    }

    pub fn app_direct_capacity_gib(&self) -> u64 {
        self.app_direct_extents
            .iter()
            .map(|extent| extent.capacity_gib)
            .sum()
    }

    pub fn requests_app_direct(&self) -> bool {
        !self.app_direct_extents.is_empty()
    }

    /// Memory mode capacity and nothing persistent.
    pub fn is_volatile_only(&self) -> bool {
        self.memory_mode_capacity_gib > 0 && self.app_direct_extents.is_empty()
    }

    pub fn total_capacity_bytes(&self) -> u64 {
        self.dimms.iter().map(|dimm| dimm.capacity_bytes).sum()
    }

    pub fn sockets(&self) -> BTreeSet<u16> {
        self.dimms.iter().map(|dimm| dimm.socket_id).collect()
    }
}
