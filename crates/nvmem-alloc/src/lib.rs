//! Capacity planning for persistent-memory modules.
//!
//! A [`MemoryAllocationRequest`] ("N GiB memory mode, M GiB app direct on these
//! modules") is checked by a chain of [`RequestRule`]s, laid out by ordered
//! [`LayoutStep`]s into a per-module [`MemoryAllocationLayout`], and finally
//! judged by [`PostLayoutCheck`]s. [`MemoryAllocator`] drives the pipeline and
//! [`MemoryAllocationGoalService`] turns layouts into per-device goals.
//!
//! Device state is read through the [`DeviceLibrary`] trait; nothing here
//! writes to hardware.

mod allocator;
mod builder;
mod config_goal;
mod deviation;
mod error;
mod goal;
mod layout;
mod library;
mod request;
mod reserve;
pub mod rules;
pub mod steps;
mod types;
pub mod units;

pub use allocator::{MemoryAllocator, PlanningStage};
pub use builder::{MemoryAllocationRequestBuilder, PersistentType};
pub use config_goal::{AppDirectSet, AppDirectSettings, ConfigGoal, ConfigGoalStatus};
pub use deviation::{PostLayoutCheck, PostLayoutRequestDeviationCheck, ACCEPTED_PERCENT_DEVIATION};
pub use error::{AllocationError, LibraryError, RejectionCategory, RejectionKind};
pub use goal::{
    GoalServiceError, MemoryAllocationGoal, MemoryAllocationGoalCollection, MemoryAllocationGoalService,
};
pub use layout::{LayoutWarning, MemoryAllocationLayout};
pub use library::{DeviceDiscovery, DeviceLibrary, InMemoryLibrary, Manageability, NamespaceType};
pub use request::MemoryAllocationRequest;
pub use reserve::ReserveDimmSelector;
pub use rules::RequestRule;
pub use steps::LayoutStep;
pub use types::{
    AppDirectExtent, Dimm, InterleaveFormat, InterleaveSelector, InterleaveSize, InterleaveWays,
    ModeCapabilities, PersistentExtent, PersistentMode, PlatformCapabilities, CHANNELS_PER_IMC,
    DIMMS_PER_SOCKET, IMCS_PER_SOCKET, MAX_APP_DIRECT_EXTENTS,
};
