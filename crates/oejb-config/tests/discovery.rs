use std::ffi::OsString;

use oejb_config::{
    discover_config_path, load_for_dir, with_config_env_lock, ContainerConfig, OEJB_CONFIG_ENV_VAR,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

struct EnvVarGuard {
    key: &'static str,
    prev: Option<OsString>,
}

impl EnvVarGuard {
    fn set(key: &'static str, value: &std::path::Path) -> Self {
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
fn missing_config_yields_defaults() {
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(OEJB_CONFIG_ENV_VAR);
        let dir = tempdir().unwrap();

        let (config, path) = load_for_dir(dir.path()).unwrap();
        assert_eq!(config, ContainerConfig::default());
        assert!(path.is_none());
    });
}

#[test]
fn discovers_oejb_toml_in_root() {
    with_config_env_lock(|| {
        let _env = EnvVarGuard::unset(OEJB_CONFIG_ENV_VAR);
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("oejb.toml");
        std::fs::write(
            &config_path,
            "[classloader]\ncontainer_extensions = false\n\n[naming]\nfederation = [\"ext\", \"ext\"]\n",
        )
        .unwrap();

        let discovered = discover_config_path(dir.path()).expect("oejb.toml should be found");
        assert_eq!(discovered, config_path.canonicalize().unwrap_or(config_path));

        let (config, _) = load_for_dir(dir.path()).unwrap();
        assert!(!config.classloader.container_extensions);
        assert_eq!(config.naming.federation, vec!["ext".to_string()]);
    });
}

#[test]
fn env_var_overrides_discovery() {
    with_config_env_lock(|| {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("oejb.toml"), "[logging]\nlevel = \"warn\"\n").unwrap();
        let custom = dir.path().join("custom.toml");
        std::fs::write(&custom, "[logging]\nlevel = \"debug\"\njson = true\n").unwrap();
        let _env = EnvVarGuard::set(OEJB_CONFIG_ENV_VAR, &custom);

        let (config, path) = load_for_dir(dir.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(path, Some(custom.canonicalize().unwrap_or(custom)));
    });
}

#[test]
fn io_errors_name_the_file() {
    let err = ContainerConfig::load_from_path("/definitely/not/here/oejb.toml").unwrap_err();
    assert!(err.to_string().contains("oejb.toml"), "{err}");
}
