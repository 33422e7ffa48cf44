use std::sync::Arc;

use nvmem_alloc::units::GIB;
use nvmem_alloc::{
    AppDirectExtent, AppDirectSet, AppDirectSettings, ConfigGoal, ConfigGoalStatus, Dimm,
    InMemoryLibrary, InterleaveFormat, InterleaveSize, InterleaveWays, LayoutWarning,
    MemoryAllocationRequest, MemoryAllocator, ModeCapabilities, PersistentMode, RejectionKind,
};

use super::support::{allocator, library_with, platform, socket};

fn two_sockets() -> Vec<Dimm> {
    let mut dimms = socket(0, 256);
    dimms.extend(socket(1, 256));
    dimms
}

#[test]
fn symmetric_request_is_laid_out_evenly() {
    let dimms = two_sockets();
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms)
        .with_memory_mode_gib(768)
        .with_extent(AppDirectExtent::interleaved(1200));

    let layout = allocator.layout(&request).expect("layout accepted");

    assert_eq!(layout.memory_capacity_gib, 768);
    assert_eq!(layout.app_direct_capacity_gib, 1200);
    assert_eq!(layout.app_direct_capacities_gib, vec![1200]);
    assert_eq!(layout.remaining_capacity_gib, 12 * 92);
    assert_eq!(layout.storage_capacity_gib, 12 * 92);
    assert!(layout.warnings().is_empty(), "{:?}", layout.warnings());

    assert_eq!(layout.goals.len(), 12);
    for (uid, goal) in &layout.goals {
        assert_eq!(goal.memory_size_gib, 64, "{uid}");
        let set = goal.app_direct_1.as_ref().expect("one set per module");
        assert_eq!(set.size_gib, 100);
        assert_eq!(set.settings.ways, InterleaveWays::Six);
        assert_eq!(set.settings.imc, InterleaveSize::Size4KB);
        assert!(goal.app_direct_2.is_none());
    }
    assert_eq!(layout.goal("s0-d3").and_then(|g| g.max_set_id()), Some(1));
    assert_eq!(layout.goal("s1-d3").and_then(|g| g.max_set_id()), Some(2));
}

#[test]
fn reserved_dimm_holds_nothing_but_storage() {
    let dimms = socket(0, 256);
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms)
        .with_reserve_dimm()
        .with_memory_mode_gib(300)
        .with_extent(AppDirectExtent::interleaved(600));

    let layout = allocator.layout(&request).expect("layout accepted");

    assert_eq!(layout.reserved_dimm_uid.as_deref(), Some("s0-d0"));
    assert_eq!(layout.goal("s0-d0"), Some(&ConfigGoal::default()));
    assert_eq!(layout.memory_capacity_gib, 300);
    assert_eq!(layout.app_direct_capacities_gib, vec![600]);
    assert_eq!(layout.storage_capacity_gib, 256 + 5 * 76);

    let widths: Vec<Option<InterleaveWays>> = ["s0-d1", "s0-d2"]
        .iter()
        .map(|uid| {
            layout
                .goal(uid)
                .and_then(|g| g.app_direct_1.as_ref())
                .map(|set| set.settings.ways)
        })
        .collect();
    assert_eq!(widths, vec![Some(InterleaveWays::One), Some(InterleaveWays::Four)]);
}

#[test]
fn tiny_extents_are_rejected_by_the_deviation_check() {
    let dimms = socket(0, 256);
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms).with_extent(AppDirectExtent::interleaved(5));

    let err = allocator.layout(&request).expect_err("nothing could be placed");
    assert_eq!(err.rejection(), Some(RejectionKind::UnacceptableLayoutDeviation));
}

#[test]
fn memory_over_capacity_leaves_nothing_and_is_a_bad_size() {
    let dimms = socket(0, 16);
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms).with_memory_mode_gib(200);

    let err = allocator.layout(&request).expect_err("only 96 GiB exist");
    assert_eq!(err.rejection(), Some(RejectionKind::BadRequestSize));
}

#[test]
fn mixed_capacities_warn_but_succeed() {
    let mut dimms = socket(0, 256);
    dimms[5] = Dimm::new("s0-d5", 0, 1, 2, 128 * GIB);
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms).with_memory_mode_gib(60);

    let layout = allocator.layout(&request).expect("layout accepted");
    assert_eq!(layout.warnings(), &[LayoutWarning::NonOptimalPopulation]);
}

#[test]
fn interleaved_extent_on_mixed_sizes_is_placed_with_a_warning() {
    let dimms = vec![
        Dimm::new("small", 0, 0, 0, 16 * GIB),
        Dimm::new("large", 0, 1, 0, 64 * GIB),
    ];
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms).with_extent(AppDirectExtent::interleaved(60));

    let layout = allocator.layout(&request).expect("layout accepted");
    assert_eq!(layout.app_direct_capacities_gib, vec![60]);
    assert_eq!(layout.remaining_capacity_gib, 20);
    assert_eq!(layout.warnings(), &[LayoutWarning::NonOptimalPopulation]);

    let large = layout.goal("large").expect("goal for the large module");
    assert_eq!(large.app_direct_count(), 2);
    assert_eq!(large.app_direct_size_gib(), 60 - 16);
}

#[test]
fn by_one_extent_on_mixed_sizes_is_placed_with_a_warning() {
    let dimms = vec![
        Dimm::new("small", 0, 0, 0, 16 * GIB),
        Dimm::new("large", 0, 1, 0, 64 * GIB),
    ];
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms).with_extent(AppDirectExtent::by_one(60));

    let layout = allocator.layout(&request).expect("layout accepted");
    assert_eq!(layout.app_direct_capacities_gib, vec![60]);
    assert_eq!(layout.warnings(), &[LayoutWarning::NonOptimalPopulation]);
    assert_eq!(layout.goal("small").map(ConfigGoal::app_direct_size_gib), Some(16));
    assert_eq!(layout.goal("large").map(ConfigGoal::app_direct_size_gib), Some(44));
}

#[test]
fn plan_using_every_gib_is_a_bad_size() {
    let dimms = vec![
        Dimm::new("a", 0, 0, 0, 256 * GIB),
        Dimm::new("b", 0, 1, 0, 256 * GIB),
    ];
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms).with_memory_mode_gib(512);

    let err = allocator.layout(&request).expect_err("no capacity left");
    assert_eq!(err.rejection(), Some(RejectionKind::BadRequestSize));
}

#[test]
fn reservation_on_exhausted_capacity_is_a_bad_size() {
    let dimms = vec![
        Dimm::new("a", 0, 0, 0, 256 * GIB),
        Dimm::new("b", 0, 1, 0, 256 * GIB),
    ];
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms)
        .with_memory_mode_gib(512)
        .with_reserved_gib(10);

    let err = allocator.layout(&request).expect_err("nothing left to reserve");
    assert_eq!(err.rejection(), Some(RejectionKind::BadRequestSize));
}

#[test]
fn set_ids_continue_after_existing_goals() {
    let dimms = vec![
        Dimm::new("a", 0, 0, 0, 256 * GIB),
        Dimm::new("b", 0, 1, 0, 256 * GIB),
    ];
    let applied = ConfigGoal {
        app_direct_1: Some(AppDirectSet {
            size_gib: 10,
            set_id: 5,
            settings: AppDirectSettings {
                ways: InterleaveWays::One,
                imc: InterleaveSize::Size4KB,
                channel: InterleaveSize::Size4KB,
                dimms: vec!["a".into()],
            },
        }),
        status: ConfigGoalStatus::Success,
        ..ConfigGoal::default()
    };
    let allocator = allocator(library_with(&dimms).with_goal("a", applied));
    let request = MemoryAllocationRequest::new(dimms).with_extent(AppDirectExtent::interleaved(100));

    let layout = allocator.layout(&request).expect("layout accepted");
    let ids: Vec<Option<u16>> = ["a", "b"]
        .iter()
        .map(|uid| layout.goal(uid).and_then(|g| g.max_set_id()))
        .collect();
    assert_eq!(ids, vec![Some(6), Some(6)]);
}

#[test]
fn pm_direct_mode_judges_persistent_formats() {
    let dimms = vec![
        Dimm::new("a", 0, 0, 0, 256 * GIB),
        Dimm::new("b", 0, 1, 0, 256 * GIB),
    ];
    let mut caps = platform();
    caps.pm_direct = ModeCapabilities::supported(vec![InterleaveFormat::new(
        InterleaveWays::One,
        InterleaveSize::Size4KB,
        InterleaveSize::Size4KB,
    )]);
    let library = dimms
        .iter()
        .fold(InMemoryLibrary::new(caps), |library, dimm| library.with_dimm(dimm));
    let allocator =
        MemoryAllocator::new(Arc::new(library), PersistentMode::PmDirect).expect("allocator");
    assert_eq!(allocator.persistent_mode(), PersistentMode::PmDirect);

    let by_one = MemoryAllocationRequest::new(dimms.clone()).with_extent(AppDirectExtent::by_one(100));
    let layout = allocator.layout(&by_one).expect("layout accepted");
    assert_eq!(layout.warnings(), &[LayoutWarning::PersistentSettingsNotRecommended]);
    assert_eq!(layout.app_direct_capacities_gib, vec![100]);

    let explicit = MemoryAllocationRequest::new(dimms).with_extent(AppDirectExtent::explicit(
        100,
        InterleaveSize::Size64B,
        InterleaveSize::Size64B,
    ));
    assert_eq!(
        allocator.layout(&explicit).err().and_then(|e| e.rejection()),
        Some(RejectionKind::PersistentSettingsNotSupported)
    );
}

#[test]
fn layouts_serialize_for_callers() {
    let dimms = socket(0, 256);
    let allocator = allocator(library_with(&dimms));
    let request = MemoryAllocationRequest::new(dimms).with_memory_mode_gib(60);
    let layout = allocator.layout(&request).expect("layout accepted");

    let json = serde_json::to_value(&layout).expect("layout serializes");
    assert_eq!(json["memory_capacity_gib"], 60);
    assert_eq!(json["goals"]["s0-d0"]["memory_size_gib"], 10);
    assert_eq!(json["goals"]["s0-d0"]["status"], "unknown");
}
