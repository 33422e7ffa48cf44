use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a request was refused. Every kind is final: the caller has to change the
/// request or the hardware state before trying again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    #[error("the requested configuration is not supported by the platform")]
    RequestNotSupported,
    #[error("the requested app direct interleave settings are not supported by the platform")]
    AppDirectSettingsNotSupported,
    #[error("the requested persistent memory settings are not supported by the platform")]
    PersistentSettingsNotSupported,
    #[error("memory mode is not supported by the platform")]
    VolatileNotSupported,
    #[error("one or more requested dimms contain namespaces")]
    NamespacesExist,
    #[error("one or more requested dimms already have an unapplied configuration goal")]
    DimmHasConfigGoal,
    #[error("a dimm reserved for storage cannot also hold memory mode or app direct capacity")]
    BadRequestReserveDimm,
    #[error("memory mode requires persistent memory on both memory controllers of every requested socket")]
    BadRequestNoAEPInOneOfTheiMCs,
    #[error("the requested capacity was invalid")]
    BadRequestSize,
    #[error("requested capacities were adjusted beyond the maximum acceptable layout deviation")]
    UnacceptableLayoutDeviation,
    #[error("no dimms were requested")]
    BadRequestNoDimms,
    #[error("at most two app direct extents may be requested")]
    TooManyAppDirectExtents,
    #[error("a requested dimm is not manageable")]
    InvalidDimm,
    #[error("the requested dimm list is invalid")]
    BadDimmList,
}

/// Coarse grouping of [`RejectionKind`]s for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCategory {
    UnsupportedConfiguration,
    ConflictingState,
    MalformedRequest,
    PlanningIntegrity,
}

impl RejectionKind {
    pub fn category(self) -> RejectionCategory {
        match self {
            RejectionKind::RequestNotSupported
            | RejectionKind::AppDirectSettingsNotSupported
            | RejectionKind::PersistentSettingsNotSupported
            | RejectionKind::VolatileNotSupported => RejectionCategory::UnsupportedConfiguration,
            RejectionKind::NamespacesExist | RejectionKind::DimmHasConfigGoal => {
                RejectionCategory::ConflictingState
            }
            RejectionKind::UnacceptableLayoutDeviation => RejectionCategory::PlanningIntegrity,
            RejectionKind::BadRequestReserveDimm
            | RejectionKind::BadRequestNoAEPInOneOfTheiMCs
            | RejectionKind::BadRequestSize
            | RejectionKind::BadRequestNoDimms
            | RejectionKind::TooManyAppDirectExtents
            | RejectionKind::InvalidDimm
            | RejectionKind::BadDimmList => RejectionCategory::MalformedRequest,
        }
    }
}

/// Failure reported by the device library collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LibraryError {
    #[error("not found")]
    NotFound,
    #[error("not supported")]
    NotSupported,
    #[error("device library error code {0}")]
    Code(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error(transparent)]
    Rejected(#[from] RejectionKind),
    #[error("{operation} failed: {source}")]
    Library {
        operation: String,
        #[source]
        source: LibraryError,
    },
    #[error("invalid percentage {0}; expected a value between 0 and 100")]
    InvalidPercentage(u32),
}

impl AllocationError {
    pub(crate) fn library(operation: impl Into<String>, source: LibraryError) -> Self {
        AllocationError::Library {
            operation: operation.into(),
            source,
        }
    }

    /// The rejection kind, if the request itself was refused.
    pub fn rejection(&self) -> Option<RejectionKind> {
        match self {
            AllocationError::Rejected(kind) => Some(*kind),
            _ => None,
        }
    }
}
