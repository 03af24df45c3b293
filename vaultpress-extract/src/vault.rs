//! Vault access: link resolution and file readers.
//!
//! The extractor only depends on the [`LinkResolver`] and [`SourceReader`]
//! traits; [`FsVault`] is the implementation over a directory on disk.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{io_err, ExtractError};

/// A file inside the vault, identified by its vault-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VaultFile {
    path: PathBuf,
}

impl VaultFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Vault-relative path; this is the file's identity.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name, including the extension.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// What a link resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEntry {
    File(VaultFile),
    Folder(PathBuf),
}

/// Resolve link text written inside a document to a concrete vault entry.
pub trait LinkResolver {
    /// Resolve `link` as written in the document at `from`, or `None`.
    fn resolve_link(&self, link: &str, from: &Path) -> Option<VaultEntry>;

    /// Every file in the vault; used as a by-filename fallback.
    fn list_all_files(&self) -> Vec<VaultFile>;
}

/// Read the contents of resolved vault files.
pub trait SourceReader {
    fn read_text(&self, file: &VaultFile) -> Result<String, ExtractError>;
    fn read_bytes(&self, file: &VaultFile) -> Result<Vec<u8>, ExtractError>;
}

// ---------------------------------------------------------------------------
// FsVault
// ---------------------------------------------------------------------------

/// A vault rooted at a directory on the local filesystem.
///
/// The full file listing is walked once on first use and cached for the
/// lifetime of the value.
pub struct FsVault {
    root: PathBuf,
    listing: OnceLock<Vec<VaultFile>>,
}

impl FsVault {
    /// Open the vault at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ExtractError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ExtractError::VaultNotFound { path: root });
        }
        Ok(Self {
            root,
            listing: OnceLock::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Markdown documents under the vault-relative folder `dir`, sorted by path.
    pub fn documents_under(&self, dir: &Path) -> Result<Vec<VaultFile>, ExtractError> {
        let start = self.root.join(dir);
        if !start.is_dir() {
            return Err(ExtractError::VaultNotFound { path: start });
        }
        let mut out = Vec::new();
        collect_files(&self.root, &start, &mut out)?;
        out.retain(|f| f.extension().as_deref() == Some("md"));
        out.sort();
        Ok(out)
    }

    /// Map an absolute or vault-relative path to a [`VaultFile`] if it names a
    /// file inside this vault.
    pub fn file_at(&self, path: &Path) -> Option<VaultFile> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root).ok()?.to_path_buf()
        } else {
            path.to_path_buf()
        };
        let relative = normalize(&relative)?;
        self.root
            .join(&relative)
            .is_file()
            .then(|| VaultFile::new(relative))
    }

    fn entry_at(&self, relative: &Path) -> Option<VaultEntry> {
        let full = self.root.join(relative);
        if full.is_file() {
            Some(VaultEntry::File(VaultFile::new(relative)))
        } else if full.is_dir() {
            Some(VaultEntry::Folder(relative.to_path_buf()))
        } else {
            None
        }
    }
}

impl LinkResolver for FsVault {
    fn resolve_link(&self, link: &str, from: &Path) -> Option<VaultEntry> {
        let link = link.trim();
        if link.is_empty() {
            return None;
        }

        let mut candidates = Vec::new();
        if let Some(rooted) = link.strip_prefix('/') {
            candidates.push(PathBuf::from(rooted));
        } else {
            let doc_dir = from.parent().unwrap_or(Path::new(""));
            candidates.push(doc_dir.join(link));
            candidates.push(PathBuf::from(link));
        }
        if Path::new(link).extension().is_none() {
            let with_md: Vec<PathBuf> = candidates
                .iter()
                .map(|c| c.with_extension("md"))
                .collect();
            candidates.extend(with_md);
        }

        candidates
            .iter()
            .filter_map(|c| normalize(c))
            .find_map(|c| self.entry_at(&c))
    }

    fn list_all_files(&self) -> Vec<VaultFile> {
        self.listing
            .get_or_init(|| {
                let mut out = Vec::new();
                if let Err(err) = collect_files(&self.root, &self.root, &mut out) {
                    tracing::warn!("vault listing incomplete: {err}");
                }
                out.sort();
                out
            })
            .clone()
    }
}

impl SourceReader for FsVault {
    fn read_text(&self, file: &VaultFile) -> Result<String, ExtractError> {
        let path = self.root.join(file.path());
        std::fs::read_to_string(&path).map_err(|e| io_err(path, e))
    }

    fn read_bytes(&self, file: &VaultFile) -> Result<Vec<u8>, ExtractError> {
        let path = self.root.join(file.path());
        std::fs::read(&path).map_err(|e| io_err(path, e))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Walk `dir` recursively, pushing vault-relative files. Hidden entries
/// (`.obsidian`, `.git`, ...) are skipped.
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<VaultFile>) -> Result<(), ExtractError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_files(root, &path, out)?;
        } else if meta.is_file() {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(VaultFile::new(relative));
            }
        }
    }
    Ok(())
}

/// Resolve `.` and `..` lexically. Returns `None` when the path would climb
/// above the vault root or is absolute.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(_) => parts.push(component),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().collect())
}
