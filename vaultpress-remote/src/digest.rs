//! Content addressing with git's blob hash.
//!
//! `sha1("blob " + len + "\0" + bytes)`, hex-encoded. This is the `sha` the
//! GitHub contents API reports for a file, so a local digest can be compared
//! with a remote one without downloading the file.

use sha1::{Digest, Sha1};

/// Git blob digest of `bytes`.
pub fn blob_sha(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", bytes.len()).as_bytes());
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Git blob digest of `text` after UTF-8 encoding.
pub fn text_sha(text: &str) -> String {
    blob_sha(text.as_bytes())
}
