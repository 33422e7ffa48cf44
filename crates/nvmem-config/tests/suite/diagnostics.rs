use std::io::Write;

use nvmem_config::{ConfigError, ConfigValidationError, ConfigWarning, NvmemConfig};
use tempfile::NamedTempFile;

#[test]
fn reports_unknown_keys_with_full_paths() {
    let text = r#"
typo = 1

[logging]
levle = "debug"

[goal]
memory_mode_percnt = 20

[platform.app_direct]
supported = true
interleave_formats = [{ ways = 2, imc = "4kb", channel = "4kb", recomended = true }]
"#;

    let (_config, diagnostics) =
        NvmemConfig::load_from_str_with_diagnostics(text).expect("config should parse");

    assert_eq!(
        diagnostics.unknown_keys,
        vec![
            "goal.memory_mode_percnt",
            "logging.levle",
            "platform.app_direct.interleave_formats[0].recomended",
            "typo",
        ]
    );
    assert!(diagnostics.is_ok());
}

#[test]
fn reports_semantic_errors_alongside_a_usable_config() {
    let text = r#"
[[platform.dimms]]
uid = "a"
socket = 0
memory_controller = 0
channel = 0
capacity = "256GiB"

[[platform.dimms]]
uid = "a"
socket = 0
memory_controller = 1
channel = 0
capacity = 0

[goal]
memory_mode_percent = 60
reserved_percent = 50
"#;

    let (config, diagnostics) =
        NvmemConfig::load_from_str_with_diagnostics(text).expect("config should parse");

    assert_eq!(config.goal.memory_mode_percent, 60);
    assert!(!diagnostics.is_ok());
    assert_eq!(
        diagnostics.errors,
        vec![
            ConfigValidationError::PercentagesExceedTotal {
                memory_mode_percent: 60,
                reserved_percent: 50,
            },
            ConfigValidationError::DuplicateDimmUid {
                toml_path: "platform.dimms[1].uid".to_string(),
                uid: "a".to_string(),
            },
        ]
    );
    assert_eq!(
        diagnostics.warnings,
        vec![ConfigWarning::InvalidValue {
            toml_path: "platform.dimms[1].capacity".to_string(),
            message: "module has no capacity".to_string(),
        }]
    );
}

#[test]
fn logging_level_synonyms_are_accepted() {
    let (_config, diagnostics) =
        NvmemConfig::load_from_str_with_diagnostics("[logging]\nlevel = \"WARNING\"\n")
            .expect("config should parse");
    assert!(diagnostics.is_empty());
}

#[test]
fn invalid_capacity_is_a_parse_error() {
    let text = r#"
[[platform.dimms]]
uid = "a"
socket = 0
memory_controller = 0
channel = 0
capacity = "lots"
"#;

    let err = NvmemConfig::load_from_str_with_diagnostics(text).expect_err("bad capacity");
    assert!(matches!(err, ConfigError::Toml(_)), "unexpected error: {err:?}");
}

#[test]
fn loads_from_path() {
    let mut file = NamedTempFile::new().expect("tempfile");
    writeln!(file, "[logging]\njson = true\nbuffer_lines = 50").expect("write");

    let config = NvmemConfig::load_from_path(file.path()).expect("load");
    assert!(config.logging.json);
    assert_eq!(config.logging.buffer_lines, 50);
    assert!(config.logging.stderr);
}
