use serde::{Deserialize, Serialize};

use crate::error::RejectionKind;
use crate::layout::LayoutWarning;
use crate::units;

/// Maximum number of app-direct extents (and interleave sets per DIMM).
pub const MAX_APP_DIRECT_EXTENTS: usize = 2;
pub const IMCS_PER_SOCKET: usize = 2;
pub const CHANNELS_PER_IMC: u32 = 3;
pub const DIMMS_PER_SOCKET: u32 = 6;

/// One persistent-memory module, as seen by a single planning run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimm {
    pub uid: String,
    pub socket_id: u16,
    pub memory_controller_id: u16,
    pub channel_id: u32,
    pub capacity_bytes: u64,
    /// Reserve this module entirely for storage.
    #[serde(default)]
    pub reserved: bool,
}

impl Dimm {
    pub fn new(
        uid: impl Into<String>,
        socket_id: u16,
        memory_controller_id: u16,
        channel_id: u32,
        capacity_bytes: u64,
    ) -> Self {
        Self {
            uid: uid.into(),
            socket_id,
            memory_controller_id,
            channel_id,
            capacity_bytes,
            reserved: false,
        }
    }

    #[must_use]
    pub fn reserved(mut self) -> Self {
        self.reserved = true;
        self
    }

    pub fn capacity_gib(&self) -> u64 {
        units::bytes_to_gib(self.capacity_bytes)
    }

    /// Channel index within its memory controller. Modules sharing a group on
    /// the two controllers of a socket are channel partners.
    pub fn channel_group(&self) -> u32 {
        self.channel_id % CHANNELS_PER_IMC
    }

    /// Bit position of this module in a socket population map.
    pub fn socket_slot(&self) -> u32 {
        2 * self.channel_group() + u32::from(self.memory_controller_id)
    }
}

/// Interleave granularity reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum InterleaveSize {
    #[serde(rename = "64b")]
    Size64B,
    #[serde(rename = "128b")]
    Size128B,
    #[serde(rename = "256b")]
    Size256B,
    #[default]
    #[serde(rename = "4kb")]
    Size4KB,
    #[serde(rename = "1gb")]
    Size1GB,
}

impl InterleaveSize {
    pub fn bytes(self) -> u64 {
        match self {
            InterleaveSize::Size64B => 64,
            InterleaveSize::Size128B => 128,
            InterleaveSize::Size256B => 256,
            InterleaveSize::Size4KB => 4 * units::KIB,
            InterleaveSize::Size1GB => units::GIB,
        }
    }
}

/// Number of modules striped together by one interleave set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum InterleaveWays {
    One,
    Two,
    Three,
    Four,
    Six,
}

impl InterleaveWays {
    /// Platforms only build sets over 1, 2, 3, 4 or 6 modules.
    pub fn from_dimm_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(InterleaveWays::One),
            2 => Some(InterleaveWays::Two),
            3 => Some(InterleaveWays::Three),
            4 => Some(InterleaveWays::Four),
            6 => Some(InterleaveWays::Six),
            _ => None,
        }
    }

    pub fn dimm_count(self) -> usize {
        match self {
            InterleaveWays::One => 1,
            InterleaveWays::Two => 2,
            InterleaveWays::Three => 3,
            InterleaveWays::Four => 4,
            InterleaveWays::Six => 6,
        }
    }
}

impl TryFrom<u8> for InterleaveWays {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_dimm_count(usize::from(value))
            .ok_or_else(|| format!("unsupported interleave ways {value} (expected 1, 2, 3, 4 or 6)"))
    }
}

impl From<InterleaveWays> for u8 {
    fn from(value: InterleaveWays) -> Self {
        value.dimm_count() as u8
    }
}

/// A platform-reported interleave capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterleaveFormat {
    pub ways: InterleaveWays,
    pub imc: InterleaveSize,
    pub channel: InterleaveSize,
    #[serde(default)]
    pub recommended: bool,
}

impl InterleaveFormat {
    pub fn new(ways: InterleaveWays, imc: InterleaveSize, channel: InterleaveSize) -> Self {
        Self {
            ways,
            imc,
            channel,
            recommended: false,
        }
    }

    #[must_use]
    pub fn recommended(mut self) -> Self {
        self.recommended = true;
        self
    }

    pub fn is_by_one(&self) -> bool {
        self.ways == InterleaveWays::One
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCapabilities {
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub interleave_formats: Vec<InterleaveFormat>,
}

impl ModeCapabilities {
    pub fn supported(interleave_formats: Vec<InterleaveFormat>) -> Self {
        Self {
            supported: true,
            interleave_formats,
        }
    }

    pub fn unsupported() -> Self {
        Self::default()
    }

    /// Whether any platform format honors `selector`.
    pub fn supports(&self, selector: &InterleaveSelector) -> bool {
        self.interleave_formats
            .iter()
            .any(|format| selector.matches(format))
    }

    /// Whether a platform format honoring `selector` is also recommended.
    ///
    /// Only meaningful for by-one and explicit selectors; a default selector
    /// always defers to the platform and is never judged.
    pub fn recommends(&self, selector: &InterleaveSelector) -> bool {
        self.interleave_formats.iter().any(|format| {
            format.recommended
                && match selector {
                    InterleaveSelector::ByOne => format.is_by_one(),
                    InterleaveSelector::Explicit { imc, channel } => {
                        !format.is_by_one() && format.imc == *imc && format.channel == *channel
                    }
                    InterleaveSelector::Default => false,
                }
        })
    }

    /// Interleave sizes to use for a set over `ways` modules when the request
    /// left them to the platform. The last matching format wins unless an
    /// earlier one is recommended.
    pub fn default_sizes_for(&self, ways: InterleaveWays) -> Option<(InterleaveSize, InterleaveSize)> {
        let mut found = None;
        for format in self.interleave_formats.iter().filter(|f| f.ways == ways) {
            found = Some((format.imc, format.channel));
            if format.recommended {
                break;
            }
        }
        found
    }
}

/// Platform capability snapshot consumed by rules and steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    #[serde(default)]
    pub memory_mode: ModeCapabilities,
    #[serde(default)]
    pub app_direct: ModeCapabilities,
    #[serde(default)]
    pub pm_direct: ModeCapabilities,
}

/// How a requested extent should be interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InterleaveSelector {
    /// One x1 set per module, no interleaving.
    ByOne,
    /// Let the platform pick sizes for whatever way count the layout ends up with.
    #[default]
    Default,
    Explicit {
        imc: InterleaveSize,
        channel: InterleaveSize,
    },
}

impl InterleaveSelector {
    pub fn is_by_one(&self) -> bool {
        matches!(self, InterleaveSelector::ByOne)
    }

    /// By-one matches x1 formats, explicit sizes match on `{imc, channel}`,
    /// and the default selector matches any format.
    pub fn matches(&self, format: &InterleaveFormat) -> bool {
        match self {
            InterleaveSelector::ByOne => format.is_by_one(),
            InterleaveSelector::Default => true,
            InterleaveSelector::Explicit { imc, channel } => {
                format.imc == *imc && format.channel == *channel
            }
        }
    }
}

/// A requested contiguous persistent region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDirectExtent {
    pub capacity_gib: u64,
    #[serde(default)]
    pub interleave: InterleaveSelector,
}

/// Persistent extents share the app-direct shape; they are judged against the
/// `pm_direct` capability family instead.
pub type PersistentExtent = AppDirectExtent;

impl AppDirectExtent {
    pub fn interleaved(capacity_gib: u64) -> Self {
        Self {
            capacity_gib,
            interleave: InterleaveSelector::Default,
        }
    }

    pub fn by_one(capacity_gib: u64) -> Self {
        Self {
            capacity_gib,
            interleave: InterleaveSelector::ByOne,
        }
    }

    pub fn explicit(capacity_gib: u64, imc: InterleaveSize, channel: InterleaveSize) -> Self {
        Self {
            capacity_gib,
            interleave: InterleaveSelector::Explicit { imc, channel },
        }
    }
}

/// Which capability family persistent extents are validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistentMode {
    #[default]
    AppDirect,
    PmDirect,
}

impl PersistentMode {
    pub fn capabilities(self, platform: &PlatformCapabilities) -> &ModeCapabilities {
        match self {
            PersistentMode::AppDirect => &platform.app_direct,
            PersistentMode::PmDirect => &platform.pm_direct,
        }
    }

    pub fn settings_not_supported(self) -> RejectionKind {
        match self {
            PersistentMode::AppDirect => RejectionKind::AppDirectSettingsNotSupported,
            PersistentMode::PmDirect => RejectionKind::PersistentSettingsNotSupported,
        }
    }

    pub fn settings_not_recommended(self) -> LayoutWarning {
        match self {
            PersistentMode::AppDirect => LayoutWarning::AppDirectSettingsNotRecommended,
            PersistentMode::PmDirect => LayoutWarning::PersistentSettingsNotRecommended,
        }
    }
}
