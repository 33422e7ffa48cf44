use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config_goal::ConfigGoal;
use crate::error::LibraryError;
use crate::types::{Dimm, PlatformCapabilities};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Manageability {
    #[default]
    Unknown,
    ValidConfig,
    InvalidConfig,
}

/// Namespace flavor to count. `Unknown` counts every namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceType {
    #[default]
    Unknown,
    AppDirect,
    Storage,
}

/// Module metadata as reported by device discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDiscovery {
    pub uid: String,
    pub socket_id: u16,
    pub memory_controller_id: u16,
    pub channel_id: u32,
    pub capacity_bytes: u64,
    #[serde(default)]
    pub manageability: Manageability,
}

impl DeviceDiscovery {
    pub fn is_manageable(&self) -> bool {
        self.manageability == Manageability::ValidConfig
    }

    pub fn to_dimm(&self) -> Dimm {
        Dimm::new(
            self.uid.clone(),
            self.socket_id,
            self.memory_controller_id,
            self.channel_id,
            self.capacity_bytes,
        )
    }
}

/// Read-only view of the platform and its modules.
///
/// Implementations must be cheap to query repeatedly; the engine does not cache
/// anything beyond the capability and device snapshot taken at construction.
pub trait DeviceLibrary: Send + Sync {
    fn capabilities(&self) -> Result<PlatformCapabilities, LibraryError>;

    /// Every discovered module, manageable or not.
    fn devices(&self) -> Result<Vec<DeviceDiscovery>, LibraryError>;

    fn manageable_devices(&self) -> Result<Vec<DeviceDiscovery>, LibraryError> {
        Ok(self
            .devices()?
            .into_iter()
            .filter(DeviceDiscovery::is_manageable)
            .collect())
    }

    fn device(&self, uid: &str) -> Result<DeviceDiscovery, LibraryError> {
        self.devices()?
            .into_iter()
            .find(|device| device.uid == uid)
            .ok_or(LibraryError::NotFound)
    }

    /// The goal currently stored on `uid`. `NotFound` when there is none.
    fn config_goal(&self, uid: &str) -> Result<ConfigGoal, LibraryError>;

    fn namespace_count(&self, uid: &str, namespace_type: NamespaceType) -> Result<usize, LibraryError>;
}

/// A [`DeviceLibrary`] over owned data, for static platform descriptions and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLibrary {
    capabilities: PlatformCapabilities,
    devices: Vec<DeviceDiscovery>,
    goals: BTreeMap<String, ConfigGoal>,
    namespaces: BTreeMap<String, usize>,
    namespace_query_error: Option<LibraryError>,
    goal_query_error: Option<LibraryError>,
}

impl InMemoryLibrary {
    pub fn new(capabilities: PlatformCapabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_device(mut self, device: DeviceDiscovery) -> Self {
        self.devices.push(device);
        self
    }

    /// Adds `dimm` as a manageable module.
    #[must_use]
    pub fn with_dimm(self, dimm: &Dimm) -> Self {
        self.with_device(DeviceDiscovery {
            uid: dimm.uid.clone(),
            socket_id: dimm.socket_id,
            memory_controller_id: dimm.memory_controller_id,
            channel_id: dimm.channel_id,
            capacity_bytes: dimm.capacity_bytes,
            manageability: Manageability::ValidConfig,
        })
    }

    #[must_use]
    pub fn with_goal(mut self, uid: impl Into<String>, goal: ConfigGoal) -> Self {
        self.goals.insert(uid.into(), goal);
        self
    }

    #[must_use]
    pub fn with_namespaces(mut self, uid: impl Into<String>, count: usize) -> Self {
        self.namespaces.insert(uid.into(), count);
        self
    }

    /// Make every namespace query fail with `error`.
    #[must_use]
    pub fn with_namespace_query_error(mut self, error: LibraryError) -> Self {
        self.namespace_query_error = Some(error);
        self
    }

    /// Make every goal query fail with `error`.
    #[must_use]
    pub fn with_goal_query_error(mut self, error: LibraryError) -> Self {
        self.goal_query_error = Some(error);
        self
    }
}

impl DeviceLibrary for InMemoryLibrary {
    fn capabilities(&self) -> Result<PlatformCapabilities, LibraryError> {
        Ok(self.capabilities.clone())
    }

    fn devices(&self) -> Result<Vec<DeviceDiscovery>, LibraryError> {
        Ok(self.devices.clone())
    }

    fn config_goal(&self, uid: &str) -> Result<ConfigGoal, LibraryError> {
        if let Some(error) = self.goal_query_error {
            return Err(error);
        }
        self.goals.get(uid).cloned().ok_or(LibraryError::NotFound)
    }

    fn namespace_count(&self, uid: &str, _namespace_type: NamespaceType) -> Result<usize, LibraryError> {
        if let Some(error) = self.namespace_query_error {
            return Err(error);
        }
        Ok(self.namespaces.get(uid).copied().unwrap_or(0))
    }
}
