use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nvmem_alloc::units::GIB;
use nvmem_alloc::{
    AllocationError, AppDirectExtent, ConfigGoal, ConfigGoalStatus, Dimm, LibraryError,
    MemoryAllocationLayout, MemoryAllocationRequest, RejectionKind, RequestRule,
};

use super::support::{allocator, library_with, socket};

/// Counts how often the chain reached it.
struct Probe(Arc<AtomicUsize>);

impl RequestRule for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn verify(&self, _request: &MemoryAllocationRequest) -> Result<(), AllocationError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn rejection(result: Result<MemoryAllocationLayout, AllocationError>) -> Option<RejectionKind> {
    result.err().and_then(|e| e.rejection())
}

#[test]
fn first_failing_rule_stops_the_chain() {
    let dimms = socket(0, 256);
    let calls = Arc::new(AtomicUsize::new(0));
    let allocator = allocator(library_with(&dimms)).with_rule(Box::new(Probe(Arc::clone(&calls))));

    let too_many = MemoryAllocationRequest::new(dimms.clone())
        .with_extent(AppDirectExtent::interleaved(10))
        .with_extent(AppDirectExtent::interleaved(10))
        .with_extent(AppDirectExtent::interleaved(10));
    assert_eq!(
        rejection(allocator.layout(&too_many)),
        Some(RejectionKind::TooManyAppDirectExtents)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let fine = MemoryAllocationRequest::new(dimms).with_memory_mode_gib(60);
    assert!(allocator.layout(&fine).is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_request_reports_no_dimms_before_anything_else() {
    let allocator = allocator(library_with(&socket(0, 256)));
    let request = MemoryAllocationRequest::default()
        .with_extent(AppDirectExtent::interleaved(1))
        .with_extent(AppDirectExtent::interleaved(1))
        .with_extent(AppDirectExtent::interleaved(1));
    assert_eq!(rejection(allocator.layout(&request)), Some(RejectionKind::BadRequestNoDimms));
}

#[test]
fn namespaces_are_reported_before_controller_population() {
    // Only controller 0 is populated, which memory mode would also reject.
    let dimms = vec![
        Dimm::new("a", 0, 0, 0, 256 * GIB),
        Dimm::new("b", 0, 0, 1, 256 * GIB),
    ];
    let request = MemoryAllocationRequest::new(dimms.clone()).with_memory_mode_gib(64);

    let with_namespaces = allocator(library_with(&dimms).with_namespaces("b", 1));
    assert_eq!(
        rejection(with_namespaces.layout(&request)),
        Some(RejectionKind::NamespacesExist)
    );

    let without = allocator(library_with(&dimms));
    assert_eq!(
        rejection(without.layout(&request)),
        Some(RejectionKind::BadRequestNoAEPInOneOfTheiMCs)
    );
}

#[test]
fn pending_goal_blocks_planning() {
    let dimms = socket(0, 256);
    let pending = ConfigGoal {
        memory_size_gib: 10,
        status: ConfigGoalStatus::New,
        ..ConfigGoal::default()
    };
    let allocator = allocator(library_with(&dimms).with_goal("s0-d4", pending));
    let request = MemoryAllocationRequest::new(dimms).with_memory_mode_gib(60);
    assert_eq!(rejection(allocator.layout(&request)), Some(RejectionKind::DimmHasConfigGoal));
}

#[test]
fn unmanaged_or_mismatched_dimms_are_refused() {
    let dimms = socket(0, 256);
    let allocator = allocator(library_with(&dimms[..5]));

    let request = MemoryAllocationRequest::new(dimms.clone()).with_memory_mode_gib(60);
    assert_eq!(rejection(allocator.layout(&request)), Some(RejectionKind::InvalidDimm));

    let mut resized = dimms[..5].to_vec();
    resized[0].capacity_bytes = 128 * GIB;
    let request = MemoryAllocationRequest::new(resized).with_memory_mode_gib(60);
    assert_eq!(rejection(allocator.layout(&request)), Some(RejectionKind::BadDimmList));
}

#[test]
fn single_reserved_dimm_with_capacity_is_refused() {
    let dimms = vec![Dimm::new("a", 0, 0, 0, 256 * GIB)];
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms)
        .with_reserve_dimm()
        .with_extent(AppDirectExtent::interleaved(64));
    assert_eq!(
        rejection(allocator.layout(&request)),
        Some(RejectionKind::BadRequestReserveDimm)
    );
}

#[test]
fn library_failures_surface_as_library_errors() {
    let dimms = socket(0, 256);
    let allocator = allocator(
        library_with(&dimms).with_namespace_query_error(LibraryError::Code(-12)),
    );
    let request = MemoryAllocationRequest::new(dimms).with_memory_mode_gib(60);

    let err = allocator.layout(&request).expect_err("library failure");
    assert_eq!(err.rejection(), None);
    assert!(
        matches!(err, AllocationError::Library { source: LibraryError::Code(-12), .. }),
        "unexpected error: {err:?}"
    );
}
