use nvmem_alloc::units::GIB;
use nvmem_alloc::{
    ConfigGoalStatus, InterleaveSize, InterleaveWays, MemoryAllocationGoalService, PersistentType,
    RejectionKind,
};
use nvmem_config::NvmemConfig;

const PLATFORM: &str = r#"
[platform]
memory_mode = { supported = true }

[platform.app_direct]
supported = true
interleave_formats = [
    { ways = 1, imc = "4kb", channel = "4kb", recommended = true },
    { ways = 2, imc = "4kb", channel = "4kb", recommended = true },
    { ways = 3, imc = "4kb", channel = "4kb", recommended = true },
    { ways = 4, imc = "4kb", channel = "4kb", recommended = true },
    { ways = 6, imc = "4kb", channel = "4kb", recommended = true },
]

[[platform.dimms]]
uid = "d0"
socket = 0
memory_controller = 0
channel = 0
capacity = "256GiB"

[[platform.dimms]]
uid = "d1"
socket = 0
memory_controller = 1
channel = 0
capacity = "256GiB"

[[platform.dimms]]
uid = "d2"
socket = 0
memory_controller = 0
channel = 1
capacity = "256GiB"

[[platform.dimms]]
uid = "d3"
socket = 0
memory_controller = 1
channel = 1
capacity = "256GiB"

[[platform.dimms]]
uid = "d4"
socket = 0
memory_controller = 0
channel = 2
capacity = "256GiB"

[[platform.dimms]]
uid = "d5"
socket = 0
memory_controller = 1
channel = 2
capacity = 274877906944
"#;

fn load(goal: &str) -> NvmemConfig {
    let text = format!("{PLATFORM}\n{goal}");
    let (config, diagnostics) =
        NvmemConfig::load_from_str_with_diagnostics(&text).expect("config should parse");
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    config
}

#[test]
fn platform_description_becomes_a_library() {
    let config = load("");
    let platform = config.platform.as_ref().expect("platform");
    assert_eq!(platform.dimms.len(), 6);
    assert!(platform.dimms.iter().all(|dimm| dimm.capacity.bytes() == 256 * GIB));

    let capabilities = platform.capabilities();
    assert!(capabilities.memory_mode.supported);
    assert_eq!(capabilities.app_direct.interleave_formats.len(), 5);
    assert!(!capabilities.pm_direct.supported);
}

#[test]
fn percentage_goal_is_planned_end_to_end() {
    let config = load("[goal]\nmemory_mode_percent = 25\n");

    let layout = config.plan().expect("plan").expect("platform described");
    assert_eq!(layout.memory_capacity_gib, 384);
    // 1151 GiB requested: one GiB stays unmapped and the x6 share rounds down.
    assert_eq!(layout.app_direct_capacities_gib, vec![6 * 191]);
    assert_eq!(layout.remaining_capacity_gib, 6);
    assert!(layout.warnings().is_empty(), "{:?}", layout.warnings());

    let library = config.library().expect("library");
    let goals = MemoryAllocationGoalService::new(library)
        .goals_from_layout(&layout)
        .expect("goals");
    assert_eq!(goals.len(), 6);
    for goal in goals.iter() {
        assert_eq!(goal.memory_size_bytes(), 64 * GIB);
        assert_eq!(goal.app_direct_1_size_bytes(), 191 * GIB);
        assert_eq!(goal.app_direct_1_ways(), Some(InterleaveWays::Six));
        assert_eq!(
            goal.app_direct_1_interleave_sizes(),
            Some((InterleaveSize::Size4KB, InterleaveSize::Size4KB))
        );
    }
}

#[test]
fn not_interleaved_goal_uses_one_set_per_module() {
    let config = load(
        r#"
[goal]
persistent_type = "app_direct_not_interleaved"
dimms = ["d0", "d1"]
"#,
    );
    assert_eq!(config.goal.persistent_type, PersistentType::AppDirectNotInterleaved);

    let layout = config.plan().expect("plan").expect("platform described");
    assert_eq!(layout.goals.len(), 2);
    let set_ids: Vec<Option<u16>> = ["d0", "d1"]
        .iter()
        .map(|uid| layout.goal(uid).and_then(|goal| goal.max_set_id()))
        .collect();
    assert_eq!(set_ids, vec![Some(1), Some(2)]);
}

#[test]
fn pending_goal_on_a_module_rejects_the_plan() {
    let text = format!("{}\ngoal_status = \"new\"\n", PLATFORM.trim_end());
    let (config, _) = NvmemConfig::load_from_str_with_diagnostics(&text).expect("parse");
    assert_eq!(
        config.platform.as_ref().and_then(|p| p.dimms[5].goal_status),
        Some(ConfigGoalStatus::New)
    );

    let err = config.plan().expect_err("pending goal");
    assert_eq!(err.rejection(), Some(RejectionKind::DimmHasConfigGoal));
}
