use std::sync::Arc;

use nvmem_alloc::units::GIB;
use nvmem_alloc::{
    InterleaveSelector, LayoutWarning, MemoryAllocationRequestBuilder, PersistentType,
    RejectionKind,
};

use super::support::{allocator, library_with, socket};

#[test]
fn built_requests_plan_cleanly() {
    let mut dimms = socket(0, 256);
    dimms.extend(socket(1, 256));
    let library = library_with(&dimms);
    let allocator = allocator(library.clone());

    let request = MemoryAllocationRequestBuilder::new(Arc::new(library))
        .memory_mode_percent(25)
        .reserved_percent(10)
        .build()
        .expect("request");

    assert_eq!(request.dimms().len(), 12);
    assert_eq!(request.memory_mode_capacity_gib, 768);
    assert_eq!(request.reserved_capacity_gib, 307);
    assert_eq!(request.app_direct_capacity_gib(), 3072 - 768 - 307);
    assert_eq!(request.app_direct_extents[0].interleave, InterleaveSelector::Default);

    let layout = allocator.layout(&request).expect("layout accepted");
    assert_eq!(layout.memory_capacity_gib, 768);
    assert!(layout.remaining_capacity_gib >= 307, "{}", layout.remaining_capacity_gib);
}

#[test]
fn socket_selection_with_reserved_dimm() {
    let mut dimms = socket(0, 256);
    dimms.extend(socket(1, 256));
    let library = library_with(&dimms);
    let allocator = allocator(library.clone());

    let request = MemoryAllocationRequestBuilder::new(Arc::new(library))
        .sockets([1])
        .reserve_dimm(true)
        .persistent_type(PersistentType::AppDirectNotInterleaved)
        .build()
        .expect("request");

    assert_eq!(request.dimms().len(), 6);
    assert_eq!(request.reserved_dimm().map(|d| d.uid.as_str()), Some("s1-d0"));
    assert_eq!(request.app_direct_extents[0].interleave, InterleaveSelector::ByOne);
    assert_eq!(request.app_direct_capacity_gib(), 5 * 256 - 1);

    let layout = allocator.layout(&request).expect("layout accepted");
    assert_eq!(layout.reserved_dimm_uid.as_deref(), Some("s1-d0"));
    assert_eq!(layout.app_direct_capacities_gib, vec![5 * 255]);
    assert_eq!(layout.remaining_capacity_gib, 5);
}

#[test]
fn reserve_dimm_on_a_single_module_is_refused_by_the_rules() {
    let dimms = socket(0, 256);
    let library = library_with(&dimms);
    let allocator = allocator(library.clone());

    let request = MemoryAllocationRequestBuilder::new(Arc::new(library))
        .dimms(["s0-d3"])
        .reserve_dimm(true)
        .memory_mode_percent(50)
        .build()
        .expect("request");

    // The lone module is reserved, so nothing is left to plan on.
    assert_eq!(request.memory_mode_capacity_gib, 0);
    assert_eq!(
        allocator.layout(&request).err().and_then(|e| e.rejection()),
        Some(RejectionKind::BadRequestSize)
    );

    let with_capacity = request.with_memory_mode_gib(16);
    assert_eq!(
        allocator.layout(&with_capacity).err().and_then(|e| e.rejection()),
        Some(RejectionKind::BadRequestReserveDimm)
    );
}

#[test]
fn default_request_plans_on_mixed_module_sizes() {
    let dimms = vec![
        nvmem_alloc::Dimm::new("small", 0, 0, 0, 128 * GIB),
        nvmem_alloc::Dimm::new("large", 0, 1, 0, 256 * GIB),
    ];
    let library = library_with(&dimms);
    let allocator = allocator(library.clone());

    let request = MemoryAllocationRequestBuilder::new(Arc::new(library))
        .build()
        .expect("request");
    assert_eq!(request.app_direct_capacity_gib(), 383);

    let layout = allocator.layout(&request).expect("layout accepted");
    assert_eq!(layout.app_direct_capacities_gib, vec![383]);
    assert_eq!(layout.remaining_capacity_gib, 1);
    assert_eq!(layout.warnings(), &[LayoutWarning::NonOptimalPopulation]);
}
