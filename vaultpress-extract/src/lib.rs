//! # vaultpress-extract
//!
//! Turns a vault document into something publishable: finds embedded image
//! references, resolves them against the vault, and rewrites them into bare
//! links to sanitized, co-located filenames.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vaultpress_extract::{derive_slug, extract, FsVault, SourceReader, VaultFile};
//!
//! fn prepare(vault: &FsVault, doc: &VaultFile) {
//!     let slug = derive_slug(doc.path());
//!     if let Ok(body) = vault.read_text(doc) {
//!         let processed = extract(&body, doc.path(), vault, &format!("content/posts/{slug}"));
//!         for asset in &processed.assets {
//!             println!("{} -> {}", asset.source.path().display(), asset.target_path);
//!         }
//!     }
//! }
//! ```

pub mod assets;
pub mod error;
pub mod slug;
pub mod vault;

pub use assets::{extract, is_image, AssetReference, ProcessedContent, IMAGE_EXTENSIONS};
pub use error::ExtractError;
pub use slug::{derive_slug, sanitize_file_name, sanitize_slug};
pub use vault::{FsVault, LinkResolver, SourceReader, VaultEntry, VaultFile};
