//! # vaultpress-sync
//!
//! Manifest-driven publishing of vault posts to a remote store.
//!
//! Call [`pipeline::run`] to publish, [`status::status`] to compare the vault
//! with the last publish, or [`diff::diff_post`] to preview one post.

pub mod diff;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod publisher;
pub mod status;

pub use diff::{diff_post, PostDiff};
pub use error::SyncError;
pub use manifest::{
    DeletionSummary, ManifestPost, PendingDeletion, PublishManifest, SyncManifest,
    SyncOperations, MANIFEST_VERSION,
};
pub use pipeline::{run, PublishReport, PublishScope, RunOptions};
pub use publisher::{publish_document, PostOutcome, PostState, PublishContext};
pub use status::{status, PostStatus, StatusEntry, StatusReport};
