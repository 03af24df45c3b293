//! vaultpress remote store client.
//!
//! - [`store`]: the [`RemoteStore`] contract
//! - [`github`]: [`GitHubStore`], the contents API implementation
//! - [`gate`]: [`RequestGate`], the process-wide in-flight bound
//! - [`retry`]: [`RetryPolicy`], rate-limit aware back-off
//! - [`digest`]: git blob digests
//! - [`transport`]: the raw HTTP seam
//! - [`cache`]: [`StoreCache`]
//!
//! The `mock` feature exposes `fake::FakeGitHub`, an in-memory transport
//! for other crates' tests.

pub mod cache;
pub mod digest;
pub mod error;
pub mod gate;
pub mod github;
pub mod retry;
pub mod store;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod fake;

pub use cache::StoreCache;
pub use digest::{blob_sha, text_sha};
pub use error::RemoteError;
pub use gate::{GatePermit, RequestGate, MAX_IN_FLIGHT};
pub use github::GitHubStore;
pub use retry::RetryPolicy;
pub use store::{EntryKind, RemoteEntry, RemoteFile, RemoteStore, UploadResult};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
