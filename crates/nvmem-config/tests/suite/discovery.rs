use std::ffi::OsString;

use nvmem_config::{
    discover_config_path, load_for_root, load_for_root_with_diagnostics, with_config_env_lock,
    ConfigError, NvmemConfig, NVMEM_CONFIG_ENV_VAR,
};
use nvmem_alloc::PersistentMode;
use tempfile::tempdir;

struct EnvVarGuard {
    key: &'static str,
    prev: Option<OsString>,
}

impl EnvVarGuard {
    fn set(key: &'static str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        let prev = std::env::var_os(key);
        std::env::set_var(key, value);
        Self { key, prev }
    }

    fn unset(key: &'static str) -> Self {
        let prev = std::env::var_os(key);
        std::env::remove_var(key);
        Self { key, prev }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => std::env::set_var(self.key, v),
            None => std::env::remove_var(self.key),
        }
    }
}

#[test]
fn discovers_nvmem_toml_in_root() {
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(NVMEM_CONFIG_ENV_VAR);
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nvmem.toml");
        std::fs::write(&config_path, "[planner]\npersistent_mode = \"pm_direct\"\n").unwrap();

        let discovered = discover_config_path(dir.path()).expect("nvmem.toml should be discovered");
        assert_eq!(discovered, config_path.canonicalize().unwrap_or(config_path));

        let (config, path) = load_for_root(dir.path()).expect("load");
        assert_eq!(path, Some(discovered));
        assert_eq!(config.planner.persistent_mode, PersistentMode::PmDirect);
    });
}

#[test]
fn plain_name_wins_over_dotfile() {
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(NVMEM_CONFIG_ENV_VAR);
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".nvmem.toml"), "").unwrap();
        assert!(discover_config_path(dir.path())
            .expect("dotfile discovered")
            .ends_with(".nvmem.toml"));

        std::fs::write(dir.path().join("nvmem.toml"), "").unwrap();
        assert!(discover_config_path(dir.path())
            .expect("config discovered")
            .ends_with("nvmem.toml"));
    });
}

#[test]
fn env_var_overrides_discovery_and_resolves_relative_paths() {
    with_config_env_lock(|| {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("nvmem.toml"), "").unwrap();
        std::fs::create_dir(dir.path().join("conf")).unwrap();
        let custom = dir.path().join("conf").join("lab.toml");
        std::fs::write(&custom, "[logging]\nlevel = \"debug\"\n").unwrap();

        let _env = EnvVarGuard::set(NVMEM_CONFIG_ENV_VAR, "conf/lab.toml");
        let discovered = discover_config_path(dir.path()).expect("env path");
        assert_eq!(discovered, custom.canonicalize().unwrap_or(custom));

        let (config, _) = load_for_root(dir.path()).expect("load");
        assert_eq!(config.logging.level, "debug");
    });
}

#[test]
fn missing_config_falls_back_to_defaults() {
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(NVMEM_CONFIG_ENV_VAR);
        let dir = tempdir().unwrap();

        let (config, path, diagnostics) = load_for_root_with_diagnostics(dir.path()).expect("load");
        assert_eq!(config, NvmemConfig::default());
        assert_eq!(path, None);
        assert!(diagnostics.is_empty());
    });
}

#[test]
fn env_var_pointing_at_missing_file_is_an_io_error() {
    with_config_env_lock(|| {
        let dir = tempdir().unwrap();
        let _env = EnvVarGuard::set(NVMEM_CONFIG_ENV_VAR, dir.path().join("absent.toml"));

        let err = load_for_root(dir.path()).expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { .. }), "unexpected error: {err:?}");
    });
}
