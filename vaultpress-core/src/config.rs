//! YAML configuration file.
//!
//! # Storage layout
//!
//! ```text
//! ~/.vaultpress/
//!   config.yaml       (mode 0600: may hold the API token)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::ConfigError;
use crate::types::{PublishConfig, RemoteConfig, CONFIG_VERSION, DEFAULT_MANIFEST_PATH};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.vaultpress/`: pure, no I/O.
pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(".vaultpress")
}

/// `<home>/.vaultpress/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load `<home>/.vaultpress/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<PublishConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let config: PublishConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: config.version,
            expected: CONFIG_VERSION,
        });
    }
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<PublishConfig, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the config to `<home>/.vaultpress/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem: no EXDEV on macOS).
pub fn save_at(home: &Path, config: &PublishConfig) -> Result<(), ConfigError> {
    let dir = config_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(config: &PublishConfig) -> Result<(), ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Write a fresh config for `vault` publishing to `remote`.
///
/// Idempotent: if a config already exists, loads and returns it unchanged.
pub fn init_at(
    home: &Path,
    vault: PathBuf,
    posts_dir: PathBuf,
    remote: RemoteConfig,
) -> Result<PublishConfig, ConfigError> {
    let path = config_path_at(home);
    if path.exists() {
        return load_at(home);
    }

    let now = Utc::now();
    let config = PublishConfig {
        version: CONFIG_VERSION,
        vault,
        posts_dir,
        manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
        remote,
        created_at: now,
        updated_at: now,
    };
    save_at(home, &config)?;
    Ok(config)
}

/// `init_at` convenience wrapper.
pub fn init(
    vault: PathBuf,
    posts_dir: PathBuf,
    remote: RemoteConfig,
) -> Result<PublishConfig, ConfigError> {
    init_at(&home()?, vault, posts_dir, remote)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DEFAULT_API_BASE, DEFAULT_BRANCH};
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    fn remote() -> RemoteConfig {
        RemoteConfig {
            api_base: DEFAULT_API_BASE.to_string(),
            owner: "me".to_string(),
            repo: "blog".to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            content_root: "content/posts".to_string(),
            token: Some("secret".to_string()),
        }
    }

    #[test]
    fn config_path_is_correct() {
        let home = make_home();
        let path = config_path_at(home.path());
        assert!(path.ends_with(".vaultpress/config.yaml"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = make_home();
        let cfg = init_at(
            home.path(),
            PathBuf::from("/notes"),
            PathBuf::from("Posts"),
            remote(),
        )
        .expect("init");
        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = make_home();
        init_at(home.path(), PathBuf::from("/notes"), PathBuf::new(), remote()).expect("init");
        let tmp = config_path_at(home.path()).with_file_name("config.yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    #[cfg(unix)]
    fn config_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let home = make_home();
        init_at(home.path(), PathBuf::from("/notes"), PathBuf::new(), remote()).expect("init");
        let mode = std::fs::metadata(config_path_at(home.path()))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn init_is_idempotent() {
        let home = make_home();
        let first = init_at(home.path(), PathBuf::from("/a"), PathBuf::new(), remote()).unwrap();
        let second = init_at(home.path(), PathBuf::from("/b"), PathBuf::new(), remote()).unwrap();
        assert_eq!(second.vault, first.vault);
    }

    #[test]
    fn load_missing_config_returns_not_found() {
        let home = make_home();
        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound { .. }));
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(ConfigError::HomeNotFound.to_string().contains("home directory"));
    }
}
