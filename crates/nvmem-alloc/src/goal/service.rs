use std::sync::Arc;

use thiserror::Error;

use crate::error::LibraryError;
use crate::goal::{MemoryAllocationGoal, MemoryAllocationGoalCollection};
use crate::layout::MemoryAllocationLayout;
use crate::library::DeviceLibrary;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoalServiceError {
    #[error("no configuration goal on device {0}")]
    NoGoalOnDevice(String),
    #[error("{operation} failed: {source}")]
    Library {
        operation: String,
        #[source]
        source: LibraryError,
    },
}

impl GoalServiceError {
    fn library(operation: impl Into<String>, source: LibraryError) -> Self {
        GoalServiceError::Library {
            operation: operation.into(),
            source,
        }
    }
}

/// Reads goals stored on devices and turns layouts into goal collections.
#[derive(Clone)]
pub struct MemoryAllocationGoalService {
    library: Arc<dyn DeviceLibrary>,
}

impl MemoryAllocationGoalService {
    pub fn new(library: Arc<dyn DeviceLibrary>) -> Self {
        Self { library }
    }

    /// Goals on every manageable device. Devices without one are skipped.
    pub fn all_goals(&self) -> Result<MemoryAllocationGoalCollection, GoalServiceError> {
        let devices = self
            .library
            .manageable_devices()
            .map_err(|source| GoalServiceError::library("manageable_devices", source))?;

        let mut goals = MemoryAllocationGoalCollection::new();
        for device in devices {
            match self.library.config_goal(&device.uid) {
                Ok(goal) => {
                    goals.push(MemoryAllocationGoal::new(device, goal));
                }
                Err(LibraryError::NotFound) => {}
                Err(source) => {
                    return Err(GoalServiceError::library(
                        format!("config_goal({})", device.uid),
                        source,
                    ))
                }
            }
        }
        Ok(goals)
    }

    pub fn goal_for_device(&self, uid: &str) -> Result<MemoryAllocationGoal, GoalServiceError> {
        let goal = match self.library.config_goal(uid) {
            Ok(goal) => goal,
            Err(LibraryError::NotFound) => return Err(GoalServiceError::NoGoalOnDevice(uid.to_string())),
            Err(source) => return Err(GoalServiceError::library(format!("config_goal({uid})"), source)),
        };
        let device = self
            .library
            .device(uid)
            .map_err(|source| GoalServiceError::library(format!("device({uid})"), source))?;
        Ok(MemoryAllocationGoal::new(device, goal))
    }

    /// One goal per module in `layout`, with device metadata from the library.
    pub fn goals_from_layout(
        &self,
        layout: &MemoryAllocationLayout,
    ) -> Result<MemoryAllocationGoalCollection, GoalServiceError> {
        layout
            .goals
            .iter()
            .map(|(uid, goal)| {
                let device = self
                    .library
                    .device(uid)
                    .map_err(|source| GoalServiceError::library(format!("device({uid})"), source))?;
                Ok(MemoryAllocationGoal::new(device, goal.clone()))
            })
            .collect()
    }
}

impl std::fmt::Debug for MemoryAllocationGoalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAllocationGoalService").finish_non_exhaustive()
    }
}
