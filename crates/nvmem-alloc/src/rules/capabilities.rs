use crate::error::{AllocationError, RejectionKind};
use crate::request::MemoryAllocationRequest;
use crate::rules::RequestRule;
use crate::types::{PersistentMode, PlatformCapabilities};

/// Persistent extents need a supported capability family with a format
/// honoring every extent's interleave selector.
///
/// Registered as `app_direct_not_supported` or `persistent_not_supported`
/// depending on the allocator's [`PersistentMode`].
pub struct PersistentNotSupported {
    mode: PersistentMode,
    capabilities: PlatformCapabilities,
}

impl PersistentNotSupported {
    pub fn new(mode: PersistentMode, capabilities: PlatformCapabilities) -> Self {
        Self { mode, capabilities }
    }
}

impl RequestRule for PersistentNotSupported {
    fn name(&self) -> &'static str {
        match self.mode {
            PersistentMode::AppDirect => "app_direct_not_supported",
            PersistentMode::PmDirect => "persistent_not_supported",
        }
    }

    fn verify(&self, request: &MemoryAllocationRequest) -> Result<(), AllocationError> {
        if !request.requests_app_direct() {
            return Ok(());
        }

        let caps = self.mode.capabilities(&self.capabilities);
        if !caps.supported {
            return Err(RejectionKind::RequestNotSupported.into());
        }

        let unsupported = request
            .app_direct_extents
            .iter()
            .find(|extent| !caps.supports(&extent.interleave));
        if let Some(extent) = unsupported {
            tracing::debug!(
                target: "nvmem.alloc",
                selector = ?extent.interleave,
                mode = ?self.mode,
                "no platform format honors extent"
            );
            return Err(self.mode.settings_not_supported().into());
        }
        Ok(())
    }
}
