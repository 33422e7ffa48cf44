use std::collections::{BTreeMap, BTreeSet};

use crate::diagnostics::{ConfigValidationError, ConfigWarning, ValidationDiagnostics};
use crate::{LoggingConfig, NvmemConfig, PlatformConfig};

impl NvmemConfig {
    /// Semantic checks that deserialization cannot express.
    pub fn validate(&self) -> ValidationDiagnostics {
        let mut out = ValidationDiagnostics::default();
        validate_logging(self, &mut out);
        validate_goal_percentages(self, &mut out);
        if let Some(platform) = &self.platform {
            validate_platform(platform, &mut out);
            validate_goal_targets(self, platform, &mut out);
        }
        out
    }
}

fn validate_logging(config: &NvmemConfig, out: &mut ValidationDiagnostics) {
    let normalized = LoggingConfig::normalize_level_directives(&config.logging.level);
    if !config.logging.level.trim().is_empty()
        && tracing_subscriber::EnvFilter::try_new(normalized.clone()).is_err()
    {
        out.warnings.push(ConfigWarning::LoggingLevelInvalid {
            value: config.logging.level.clone(),
            normalized,
        });
    }

    if config.logging.buffer_lines == 0 {
        out.warnings.push(ConfigWarning::InvalidValue {
            toml_path: "logging.buffer_lines".to_string(),
            message: "must be >= 1".to_string(),
        });
    }
}

fn validate_goal_percentages(config: &NvmemConfig, out: &mut ValidationDiagnostics) {
    let goal = &config.goal;
    let mut in_range = true;
    for (path, percent) in [
        ("goal.memory_mode_percent", goal.memory_mode_percent),
        ("goal.reserved_percent", goal.reserved_percent),
    ] {
        if percent > 100 {
            in_range = false;
            out.errors.push(ConfigValidationError::InvalidValue {
                toml_path: path.to_string(),
                message: format!("{percent} is not a percentage (0..=100)"),
            });
        }
    }

    if in_range && goal.memory_mode_percent + goal.reserved_percent > 100 {
        out.errors.push(ConfigValidationError::PercentagesExceedTotal {
            memory_mode_percent: goal.memory_mode_percent,
            reserved_percent: goal.reserved_percent,
        });
    }
}

fn validate_platform(platform: &PlatformConfig, out: &mut ValidationDiagnostics) {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    for (idx, dimm) in platform.dimms.iter().enumerate() {
        if seen.insert(dimm.uid.as_str(), idx).is_some() {
            out.errors.push(ConfigValidationError::DuplicateDimmUid {
                toml_path: format!("platform.dimms[{idx}].uid"),
                uid: dimm.uid.clone(),
            });
        }

        if dimm.capacity.bytes() == 0 {
            out.warnings.push(ConfigWarning::InvalidValue {
                toml_path: format!("platform.dimms[{idx}].capacity"),
                message: "module has no capacity".to_string(),
            });
        }
    }
}

fn validate_goal_targets(config: &NvmemConfig, platform: &PlatformConfig, out: &mut ValidationDiagnostics) {
    let known: BTreeSet<&str> = platform.dimms.iter().map(|dimm| dimm.uid.as_str()).collect();
    for (idx, uid) in config.goal.dimms.iter().enumerate() {
        if !known.contains(uid.as_str()) {
            out.warnings.push(ConfigWarning::UnknownGoalDimm {
                toml_path: format!("goal.dimms[{idx}]"),
                uid: uid.clone(),
            });
        }
    }

    let populated: BTreeSet<u16> = platform
        .dimms
        .iter()
        .filter(|dimm| dimm.manageable)
        .map(|dimm| dimm.socket)
        .collect();
    for (idx, socket) in config.goal.sockets.iter().enumerate() {
        if !populated.contains(socket) {
            out.warnings.push(ConfigWarning::EmptyGoalSocket {
                toml_path: format!("goal.sockets[{idx}]"),
                socket: *socket,
            });
        }
    }
}
