use std::sync::Arc;

use crate::deviation::{PostLayoutCheck, PostLayoutRequestDeviationCheck};
use crate::error::{AllocationError, LibraryError};
use crate::layout::MemoryAllocationLayout;
use crate::library::{DeviceDiscovery, DeviceLibrary};
use crate::request::MemoryAllocationRequest;
use crate::rules::{self, RequestRule};
use crate::steps::{self, LayoutStep};
use crate::types::{PersistentMode, PlatformCapabilities};

/// Where a planning run currently is. Runs only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanningStage {
    Validating,
    Planning,
    Verifying,
    Accepted,
    Rejected,
}

/// Turns requests into verified layouts.
///
/// Capabilities and manageable devices are captured once at construction;
/// goal and namespace state is queried from the library on every run.
pub struct MemoryAllocator {
    library: Arc<dyn DeviceLibrary>,
    mode: PersistentMode,
    capabilities: PlatformCapabilities,
    manageable: Vec<DeviceDiscovery>,
    rules: Vec<Box<dyn RequestRule>>,
    checks: Vec<Box<dyn PostLayoutCheck>>,
}

impl MemoryAllocator {
    pub fn new(library: Arc<dyn DeviceLibrary>, mode: PersistentMode) -> Result<Self, AllocationError> {
        let capabilities = library
            .capabilities()
            .map_err(|source| AllocationError::library("capabilities", source))?;
        let manageable = library
            .manageable_devices()
            .map_err(|source| AllocationError::library("manageable_devices", source))?;
        let rules = rules::standard_rules(&library, &capabilities, &manageable, mode);

        Ok(Self {
            library,
            mode,
            capabilities,
            manageable,
            rules,
            checks: vec![Box::new(PostLayoutRequestDeviationCheck)],
        })
    }

    pub fn persistent_mode(&self) -> PersistentMode {
        self.mode
    }

    pub fn capabilities(&self) -> &PlatformCapabilities {
        &self.capabilities
    }

    pub fn manageable_devices(&self) -> &[DeviceDiscovery] {
        &self.manageable
    }

    /// Appends `rule` after the standard chain.
    #[must_use]
    pub fn with_rule(mut self, rule: Box<dyn RequestRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Appends `check` after the deviation check.
    #[must_use]
    pub fn with_check(mut self, check: Box<dyn PostLayoutCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Validates `request`, lays it out, and verifies the result. Nothing
    /// partial is returned on failure.
    pub fn layout(&self, request: &MemoryAllocationRequest) -> Result<MemoryAllocationLayout, AllocationError> {
        let _span = tracing::info_span!(
            target: "nvmem.alloc",
            "layout",
            dimms = request.dimms().len(),
            memory_gib = request.memory_mode_capacity_gib(),
            extents = request.app_direct_extents.len(),
        )
        .entered();

        match self.run(request) {
            Ok(layout) => {
                tracing::debug!(target: "nvmem.alloc", stage = ?PlanningStage::Accepted, "layout accepted");
                Ok(layout)
            }
            Err((stage, err)) => {
                tracing::warn!(
                    target: "nvmem.alloc",
                    stage = ?PlanningStage::Rejected,
                    failed_in = ?stage,
                    rejection = ?err.rejection(),
                    error = %err,
                    "layout rejected"
                );
                Err(err)
            }
        }
    }

    fn run(
        &self,
        request: &MemoryAllocationRequest,
    ) -> Result<MemoryAllocationLayout, (PlanningStage, AllocationError)> {
        let mut stage = PlanningStage::Validating;
        tracing::debug!(target: "nvmem.alloc", ?stage, "validating request");
        for rule in &self.rules {
            rule.verify(request).map_err(|err| {
                tracing::debug!(target: "nvmem.alloc", rule = rule.name(), "rule failed");
                (stage, err)
            })?;
        }

        stage = PlanningStage::Planning;
        tracing::debug!(target: "nvmem.alloc", ?stage, "planning layout");
        let existing_max_set_id = self.existing_max_set_id().map_err(|err| (stage, err))?;
        let mut layout = MemoryAllocationLayout::for_request(request);
        let steps: Vec<Box<dyn LayoutStep>> =
            steps::standard_steps(request, &self.capabilities, self.mode, existing_max_set_id);
        for step in &steps {
            step.execute(request, &mut layout).map_err(|err| {
                tracing::debug!(target: "nvmem.alloc", step = step.name(), "step failed");
                (stage, err)
            })?;
        }

        stage = PlanningStage::Verifying;
        tracing::debug!(target: "nvmem.alloc", ?stage, "verifying layout");
        for check in &self.checks {
            check.verify(request, &layout).map_err(|err| {
                tracing::debug!(target: "nvmem.alloc", check = check.name(), "check failed");
                (stage, err)
            })?;
        }
        Ok(layout)
    }

    /// Highest interleave set id already stored on any manageable module.
    fn existing_max_set_id(&self) -> Result<u16, AllocationError> {
        let mut max = 0;
        for device in &self.manageable {
            match self.library.config_goal(&device.uid) {
                Ok(goal) => max = max.max(goal.max_set_id().unwrap_or(0)),
                Err(LibraryError::NotFound) => {}
                Err(source) => {
                    return Err(AllocationError::library(
                        format!("config_goal({})", device.uid),
                        source,
                    ))
                }
            }
        }
        Ok(max)
    }
}

impl std::fmt::Debug for MemoryAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAllocator")
            .field("mode", &self.mode)
            .field("capabilities", &self.capabilities)
            .field("manageable", &self.manageable.len())
            .field("rules", &self.rules.iter().map(|rule| rule.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
