use std::sync::Arc;

use nvmem_alloc::{
    ConfigGoal, ConfigGoalStatus, DeviceDiscovery, DeviceLibrary, InMemoryLibrary, Manageability,
    MemoryAllocationRequestBuilder, ModeCapabilities, PersistentType, PlatformCapabilities,
};
use serde::{Deserialize, Serialize};

/// A capacity given either as a byte count or with a binary suffix
/// (`"256GiB"`, `"1.5T"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capacity(pub u64);

impl Capacity {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl Serialize for Capacity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Capacity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bytes(u64),
            Human(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Bytes(value) => Ok(Capacity(value)),
            Repr::Human(value) => nvmem_alloc::units::parse_capacity(&value)
                .map(Capacity)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Static description of a platform: what each mode supports and which
/// modules are installed where.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub memory_mode: ModeCapabilities,
    #[serde(default)]
    pub app_direct: ModeCapabilities,
    #[serde(default)]
    pub pm_direct: ModeCapabilities,
    #[serde(default)]
    pub dimms: Vec<DimmConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimmConfig {
    pub uid: String,
    pub socket: u16,
    pub memory_controller: u16,
    pub channel: u32,
    pub capacity: Capacity,
    #[serde(default = "DimmConfig::default_manageable")]
    pub manageable: bool,
    /// Namespaces already present on the module.
    #[serde(default)]
    pub namespaces: usize,
    /// Status of a goal already stored on the module. Absent means no goal.
    #[serde(default)]
    pub goal_status: Option<ConfigGoalStatus>,
}

impl DimmConfig {
    fn default_manageable() -> bool {
        true
    }

    fn to_device(&self) -> DeviceDiscovery {
        DeviceDiscovery {
            uid: self.uid.clone(),
            socket_id: self.socket,
            memory_controller_id: self.memory_controller,
            channel_id: self.channel,
            capacity_bytes: self.capacity.bytes(),
            manageability: if self.manageable {
                Manageability::ValidConfig
            } else {
                Manageability::InvalidConfig
            },
        }
    }
}

impl PlatformConfig {
    pub fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities {
            memory_mode: self.memory_mode.clone(),
            app_direct: self.app_direct.clone(),
            pm_direct: self.pm_direct.clone(),
        }
    }

    pub fn to_library(&self) -> InMemoryLibrary {
        self.dimms
            .iter()
            .fold(InMemoryLibrary::new(self.capabilities()), |library, dimm| {
                let mut library = library.with_device(dimm.to_device());
                if dimm.namespaces > 0 {
                    library = library.with_namespaces(dimm.uid.clone(), dimm.namespaces);
                }
                if let Some(status) = dimm.goal_status {
                    library = library.with_goal(
                        dimm.uid.clone(),
                        ConfigGoal {
                            status,
                            ..ConfigGoal::default()
                        },
                    );
                }
                library
            })
    }
}

/// A goal request in the percentage form users write it in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalRequestConfig {
    #[serde(default)]
    pub memory_mode_percent: u32,
    #[serde(default)]
    pub reserved_percent: u32,
    #[serde(default)]
    pub persistent_type: PersistentType,
    /// Set one module aside as storage.
    #[serde(default)]
    pub reserve_dimm: bool,
    /// Module UIDs to configure. With neither `dimms` nor `sockets`, every
    /// manageable module is used.
    #[serde(default)]
    pub dimms: Vec<String>,
    #[serde(default)]
    pub sockets: Vec<u16>,
}

impl GoalRequestConfig {
    pub fn to_builder(&self, library: Arc<dyn DeviceLibrary>) -> MemoryAllocationRequestBuilder {
        MemoryAllocationRequestBuilder::new(library)
            .dimms(self.dimms.iter().cloned())
            .sockets(self.sockets.iter().copied())
            .memory_mode_percent(self.memory_mode_percent)
            .reserved_percent(self.reserved_percent)
            .persistent_type(self.persistent_type)
            .reserve_dimm(self.reserve_dimm)
    }
}
