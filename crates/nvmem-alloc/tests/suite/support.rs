use std::sync::Arc;

use nvmem_alloc::units::GIB;
use nvmem_alloc::{
    Dimm, InMemoryLibrary, InterleaveFormat, InterleaveSize, InterleaveWays, MemoryAllocator,
    ModeCapabilities, PersistentMode, PlatformCapabilities,
};

/// Memory mode plus app direct with recommended 4KB formats for every way count.
pub fn platform() -> PlatformCapabilities {
    let mut formats = Vec::new();
    for ways in [
        InterleaveWays::One,
        InterleaveWays::Two,
        InterleaveWays::Three,
        InterleaveWays::Four,
        InterleaveWays::Six,
    ] {
        formats.push(
            InterleaveFormat::new(ways, InterleaveSize::Size4KB, InterleaveSize::Size4KB).recommended(),
        );
        formats.push(InterleaveFormat::new(ways, InterleaveSize::Size64B, InterleaveSize::Size64B));
    }
    PlatformCapabilities {
        memory_mode: ModeCapabilities::supported(Vec::new()),
        app_direct: ModeCapabilities::supported(formats),
        pm_direct: ModeCapabilities::unsupported(),
    }
}

/// A fully populated socket: six modules, one per slot.
pub fn socket(socket_id: u16, gib: u64) -> Vec<Dimm> {
    (0..6u32)
        .map(|slot| {
            Dimm::new(
                format!("s{socket_id}-d{slot}"),
                socket_id,
                (slot % 2) as u16,
                slot / 2,
                gib * GIB,
            )
        })
        .collect()
}

pub fn library_with(dimms: &[Dimm]) -> InMemoryLibrary {
    dimms
        .iter()
        .fold(InMemoryLibrary::new(platform()), |library, dimm| library.with_dimm(dimm))
}

pub fn allocator(library: InMemoryLibrary) -> MemoryAllocator {
    MemoryAllocator::new(Arc::new(library), PersistentMode::AppDirect).expect("allocator")
}
