//! Domain types for vaultpress.
//!
//! All local path fields use `PathBuf`. Remote paths are `/`-separated
//! `String`s because they address the repository tree, not the filesystem.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Schema version written into `config.yaml`.
pub const CONFIG_VERSION: u32 = 1;

/// Environment variable that overrides the token stored in the config file.
pub const TOKEN_ENV: &str = "VAULTPRESS_TOKEN";

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_CONTENT_ROOT: &str = "content/posts";
pub const DEFAULT_MANIFEST_PATH: &str = ".vaultpress/manifest.json";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// URL-safe identifier for a published document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(pub String);

impl Slug {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Slug {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Slug {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Where and how to publish on the remote repository.
///
/// Equality is used by the client cache to decide whether a store must be
/// rebuilt, so every field that affects requests takes part in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Remote directory prefix that holds published posts. Deletions never
    /// leave this prefix.
    #[serde(default = "default_content_root")]
    pub content_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl RemoteConfig {
    /// Replace the token with `$VAULTPRESS_TOKEN` when that variable is set
    /// and non-empty.
    pub fn with_env_token(mut self) -> Self {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.token = Some(token);
            }
        }
        self
    }

    /// `content_root` without leading or trailing slashes.
    pub fn normalized_content_root(&self) -> String {
        self.content_root.trim_matches('/').to_string()
    }
}

/// Root of `~/.vaultpress/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    pub version: u32,
    /// Absolute path to the vault root on disk.
    pub vault: PathBuf,
    /// Vault-relative folder whose Markdown files are published. Empty means
    /// the whole vault.
    #[serde(default)]
    pub posts_dir: PathBuf,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    pub remote: RemoteConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishConfig {
    /// Check that every field needed to begin a publish run is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                expected: CONFIG_VERSION,
            });
        }
        if self.remote.owner.trim().is_empty() {
            return Err(ConfigError::Incomplete { field: "remote.owner" });
        }
        if self.remote.repo.trim().is_empty() {
            return Err(ConfigError::Incomplete { field: "remote.repo" });
        }
        if self.remote.normalized_content_root().is_empty() {
            return Err(ConfigError::Incomplete {
                field: "remote.content_root",
            });
        }
        match self.remote.token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::Incomplete {
                field: "remote.token",
            }),
        }
    }

    /// Absolute directory holding the publishable documents.
    pub fn posts_root(&self) -> PathBuf {
        self.vault.join(&self.posts_dir)
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_content_root() -> String {
    DEFAULT_CONTENT_ROOT.to_string()
}

fn default_manifest_path() -> String {
    DEFAULT_MANIFEST_PATH.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PublishConfig {
        let now = Utc::now();
        PublishConfig {
            version: CONFIG_VERSION,
            vault: PathBuf::from("/notes"),
            posts_dir: PathBuf::from("Posts"),
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
            remote: RemoteConfig {
                api_base: DEFAULT_API_BASE.to_string(),
                owner: "me".to_string(),
                repo: "blog".to_string(),
                branch: DEFAULT_BRANCH.to_string(),
                content_root: "/content/posts/".to_string(),
                token: Some("secret".to_string()),
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn slug_display_and_serde_are_transparent() {
        let slug = Slug::from("my-post");
        assert_eq!(slug.to_string(), "my-post");
        assert_eq!(serde_yaml::to_string(&slug).unwrap().trim(), "my-post");
    }

    #[test]
    fn complete_config_validates() {
        config().validate().expect("valid");
    }

    #[test]
    fn missing_token_is_incomplete() {
        let mut cfg = config();
        cfg.remote.token = None;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete { field: "remote.token" }));
    }

    #[test]
    fn blank_owner_is_incomplete() {
        let mut cfg = config();
        cfg.remote.owner = "  ".to_string();
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::Incomplete { field: "remote.owner" }
        ));
    }

    #[test]
    fn content_root_is_normalized() {
        assert_eq!(config().remote.normalized_content_root(), "content/posts");
    }

    #[test]
    fn posts_root_joins_vault() {
        assert_eq!(config().posts_root(), PathBuf::from("/notes/Posts"));
    }

    #[test]
    fn remote_defaults_fill_missing_fields() {
        let yaml = "owner: me\nrepo: blog\n";
        let remote: RemoteConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(remote.api_base, DEFAULT_API_BASE);
        assert_eq!(remote.branch, DEFAULT_BRANCH);
        assert_eq!(remote.content_root, DEFAULT_CONTENT_ROOT);
        assert!(remote.token.is_none());
    }
}
