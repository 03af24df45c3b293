//! Embedded-image discovery and link rewriting.
//!
//! Two reference syntaxes are recognised:
//!
//! | Syntax                      | Caption used in the rewrite |
//! |-----------------------------|-----------------------------|
//! | `![[name]]`                 | empty                       |
//! | `![[name\|caption]]`        | `caption`                   |
//! | `![alt](path)`              | `alt`                       |
//!
//! Every reference that resolves to an image in the vault is rewritten to
//! `![caption](sanitized-name.ext)`, a bare link that works once the document
//! is stored next to its assets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::slug::sanitize_file_name;
use crate::vault::{LinkResolver, VaultEntry, VaultFile};

/// Extensions (lowercase) that are published as assets.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "avif"];

static IMAGE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"!\[\[(?P<wname>[^\]|\n]+)(?:\|(?P<wcap>[^\]\n]*))?\]\]|!\[(?P<alt>[^\]\n]*)\]\(\s*(?P<path><[^>\n]*>|(?:[^()\s]|\([^()\s]*\))+)(?:\s+"[^"\n]*")?\s*\)"#,
    )
    .unwrap()
});

/// One resolved image found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Vault file the reference resolved to.
    pub source: VaultFile,
    /// The reference exactly as written (first occurrence).
    pub original: String,
    /// Sanitized filename; only `[A-Za-z0-9._-]`.
    pub file_name: String,
    /// `target_dir/file_name`.
    pub target_path: String,
}

/// Result of [`extract`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedContent {
    /// Document text with every resolved image reference rewritten.
    pub content: String,
    /// One entry per distinct resolved file, in order of first appearance.
    pub assets: Vec<AssetReference>,
    /// Human-readable problems that did not stop extraction.
    pub warnings: Vec<String>,
}

struct Reference<'a> {
    whole: &'a str,
    link: String,
    caption: &'a str,
}

/// Scan `body` (the document at `source`) for image references, resolve them
/// through `resolver`, and rewrite them for publication under `target_dir`.
pub fn extract(
    body: &str,
    source: &Path,
    resolver: &dyn LinkResolver,
    target_dir: &str,
) -> ProcessedContent {
    let target_dir = target_dir.trim_end_matches('/');
    let mut content = String::with_capacity(body.len());
    let mut assets: Vec<AssetReference> = Vec::new();
    // `None` marks a source whose target name was already taken.
    let mut by_source: HashMap<PathBuf, Option<usize>> = HashMap::new();
    let mut warnings = Vec::new();
    let mut last = 0;

    for caps in IMAGE_REFERENCE.captures_iter(body) {
        let Some(reference) = parse_reference(&caps) else {
            continue;
        };
        let Some(whole) = caps.get(0) else {
            continue;
        };
        content.push_str(&body[last..whole.start()]);
        last = whole.end();

        if is_passthrough(&reference.link) {
            content.push_str(reference.whole);
            continue;
        }

        let file = match resolve(resolver, &reference.link, source) {
            Some(VaultEntry::File(file)) => file,
            Some(VaultEntry::Folder(folder)) => {
                warnings.push(format!(
                    "image link `{}` in {} points to a folder ({}), not a file",
                    reference.link,
                    source.display(),
                    folder.display()
                ));
                content.push_str(reference.whole);
                continue;
            }
            None => {
                warnings.push(format!(
                    "unresolved image link `{}` in {}",
                    reference.link,
                    source.display()
                ));
                content.push_str(reference.whole);
                continue;
            }
        };

        if !is_image(&file) {
            content.push_str(reference.whole);
            continue;
        }

        let index = match by_source.get(file.path()) {
            Some(Some(index)) => *index,
            Some(None) => {
                content.push_str(reference.whole);
                continue;
            }
            None => {
                let file_name = sanitize_file_name(&file.name());
                if let Some(taken) = assets.iter().find(|a| a.file_name == file_name) {
                    warnings.push(format!(
                        "images `{}` and `{}` in {} both publish as `{}`; the second is left unpublished",
                        taken.source.path().display(),
                        file.path().display(),
                        source.display(),
                        file_name
                    ));
                    by_source.insert(file.path().to_path_buf(), None);
                    content.push_str(reference.whole);
                    continue;
                }
                tracing::debug!("asset {} -> {}", file.path().display(), file_name);
                assets.push(AssetReference {
                    target_path: format!("{target_dir}/{file_name}"),
                    original: reference.whole.to_string(),
                    source: file.clone(),
                    file_name,
                });
                by_source.insert(file.path().to_path_buf(), Some(assets.len() - 1));
                assets.len() - 1
            }
        };

        content.push_str(&format!(
            "![{}]({})",
            reference.caption, assets[index].file_name
        ));
    }
    content.push_str(&body[last..]);

    ProcessedContent {
        content,
        assets,
        warnings,
    }
}

/// Whether `file` has an allow-listed image extension (case-insensitive).
pub fn is_image(file: &VaultFile) -> bool {
    file.extension()
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn parse_reference<'a>(caps: &Captures<'a>) -> Option<Reference<'a>> {
    let whole = caps.get(0)?.as_str();
    if let Some(name) = caps.name("wname") {
        return Some(Reference {
            whole,
            link: name.as_str().trim().to_string(),
            caption: caps.name("wcap").map_or("", |c| c.as_str()),
        });
    }
    let path = caps.name("path")?.as_str();
    Some(Reference {
        whole,
        link: clean_link_target(path),
        caption: caps.name("alt").map_or("", |c| c.as_str()),
    })
}

/// `<a b.png>` → `a b.png`, `a%20b.png` → `a b.png`.
fn clean_link_target(raw: &str) -> String {
    let raw = raw.trim();
    let target = if let Some(inner) = raw.strip_prefix('<') {
        inner.split('>').next().unwrap_or(inner)
    } else {
        raw
    };
    target.replace("%20", " ")
}

fn is_passthrough(link: &str) -> bool {
    let lower = link.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

/// Resolve directly, then fall back to a bare-filename match across the
/// whole vault (exact case first).
fn resolve(resolver: &dyn LinkResolver, link: &str, source: &Path) -> Option<VaultEntry> {
    if let Some(entry) = resolver.resolve_link(link, source) {
        return Some(entry);
    }

    let bare = link.rsplit(['/', '\\']).next().unwrap_or(link);
    if bare.is_empty() {
        return None;
    }
    let all = resolver.list_all_files();
    let found = all
        .iter()
        .find(|f| f.name() == bare)
        .or_else(|| all.iter().find(|f| f.name().eq_ignore_ascii_case(bare)))
        .cloned();
    if let Some(file) = &found {
        tracing::debug!(
            "resolved `{link}` by filename to {}",
            file.path().display()
        );
    }
    found.map(VaultEntry::File)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Resolver over a fixed set of vault paths; folders are listed separately.
    struct StaticVault {
        files: BTreeMap<PathBuf, ()>,
        folders: Vec<PathBuf>,
    }

    impl StaticVault {
        fn new(files: &[&str], folders: &[&str]) -> Self {
            Self {
                files: files.iter().map(|f| (PathBuf::from(f), ())).collect(),
                folders: folders.iter().map(PathBuf::from).collect(),
            }
        }
    }

    impl LinkResolver for StaticVault {
        fn resolve_link(&self, link: &str, from: &Path) -> Option<VaultEntry> {
            let dir = from.parent().unwrap_or(Path::new(""));
            for candidate in [dir.join(link), PathBuf::from(link)] {
                if self.files.contains_key(&candidate) {
                    return Some(VaultEntry::File(VaultFile::new(candidate)));
                }
                if self.folders.contains(&candidate) {
                    return Some(VaultEntry::Folder(candidate));
                }
            }
            None
        }

        fn list_all_files(&self) -> Vec<VaultFile> {
            self.files.keys().map(VaultFile::new).collect()
        }
    }

    const DOC: &str = "posts/my-post.md";

    fn run(body: &str, vault: &StaticVault) -> ProcessedContent {
        extract(body, Path::new(DOC), vault, "content/posts/my-post")
    }

    #[test]
    fn wikilink_is_rewritten_to_bare_sanitized_name() {
        let vault = StaticVault::new(&["attachments/my image.png"], &[]);
        let out = run("Look: ![[my image.png]] ok", &vault);
        assert_eq!(out.content, "Look: ![](my-image.png) ok");
        assert_eq!(out.assets.len(), 1);
        assert_eq!(out.assets[0].file_name, "my-image.png");
        assert_eq!(out.assets[0].target_path, "content/posts/my-post/my-image.png");
        assert_eq!(out.assets[0].original, "![[my image.png]]");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn wikilink_caption_is_kept() {
        let vault = StaticVault::new(&["posts/cat.jpg"], &[]);
        let out = run("![[cat.jpg|A sleepy cat]]", &vault);
        assert_eq!(out.content, "![A sleepy cat](cat.jpg)");
    }

    #[test]
    fn both_syntaxes_for_one_file_dedup() {
        let vault = StaticVault::new(&["folder/x.png"], &[]);
        let body = "![[x.png]]\n\n![alt](folder/x.png)\n";
        let out = run(body, &vault);
        assert_eq!(out.assets.len(), 1);
        assert_eq!(out.assets[0].source.path(), Path::new("folder/x.png"));
        assert_eq!(out.content, "![](x.png)\n\n![alt](x.png)\n");
    }

    #[test]
    fn remote_and_inline_targets_pass_through() {
        let vault = StaticVault::new(&["a.png"], &[]);
        let body = "![ext](https://host/a.png) ![ext](http://host/a.png) ![inline](data:image/png;base64,AAA)";
        let out = run(body, &vault);
        assert!(out.assets.is_empty());
        assert!(out.warnings.is_empty());
        assert_eq!(out.content, body);
    }

    #[test]
    fn unresolved_reference_warns_and_is_untouched() {
        let vault = StaticVault::new(&[], &[]);
        let body = "before ![[missing.png]] after";
        let out = run(body, &vault);
        assert!(out.assets.is_empty());
        assert_eq!(out.content, body);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("missing.png"));
    }

    #[test]
    fn folder_reference_warns_and_is_untouched() {
        let vault = StaticVault::new(&[], &["posts/gallery"]);
        let body = "![[gallery]]";
        let out = run(body, &vault);
        assert_eq!(out.content, body);
        assert!(out.assets.is_empty());
        assert!(out.warnings[0].contains("folder"));
    }

    #[test]
    fn non_image_files_are_left_alone_silently() {
        let vault = StaticVault::new(&["posts/notes.pdf", "posts/other.md"], &[]);
        let body = "![[notes.pdf]] ![[other.md]]";
        let out = run(body, &vault);
        assert_eq!(out.content, body);
        assert!(out.assets.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let vault = StaticVault::new(&["posts/Photo.JPEG"], &[]);
        let out = run("![[Photo.JPEG]]", &vault);
        assert_eq!(out.assets.len(), 1);
        assert_eq!(out.content, "![](Photo.JPEG)");
    }

    #[test]
    fn angle_brackets_titles_and_encoded_spaces_are_understood() {
        let vault = StaticVault::new(&["posts/image (1).png"], &[]);
        let body = "![a](<image (1).png>) ![b](image%20(1).png \"Title\")";
        let out = run(body, &vault);
        assert_eq!(out.assets.len(), 1);
        assert_eq!(out.content, "![a](image-1.png) ![b](image-1.png)");
    }

    #[test]
    fn filename_fallback_ignores_case_when_needed() {
        let vault = StaticVault::new(&["deep/nested/Diagram.svg"], &[]);
        let out = run("![[diagram.svg]]", &vault);
        assert_eq!(out.assets.len(), 1);
        assert_eq!(out.assets[0].source.path(), Path::new("deep/nested/Diagram.svg"));
    }

    #[test]
    fn non_ascii_stem_is_dropped_not_transliterated() {
        let vault = StaticVault::new(&["posts/日本.png", "posts/café.png"], &[]);
        let out = run("![[日本.png]] ![[café.png]]", &vault);
        assert_eq!(out.assets[0].file_name, ".png");
        assert_eq!(out.assets[1].file_name, "caf.png");
    }

    #[test]
    fn first_file_keeps_a_contested_target_name() {
        let vault = StaticVault::new(&["posts/a b.png", "posts/a-b.png"], &[]);
        let out = run("![[a b.png]] ![[a-b.png]] ![again](a-b.png)", &vault);
        assert_eq!(out.assets.len(), 1);
        assert_eq!(out.assets[0].source.path(), Path::new("posts/a b.png"));
        assert_eq!(out.assets[0].target_path, "content/posts/my-post/a-b.png");
        assert_eq!(out.content, "![](a-b.png) ![[a-b.png]] ![again](a-b.png)");
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("left unpublished"));
    }

    #[test]
    fn text_without_references_is_unchanged() {
        let vault = StaticVault::new(&[], &[]);
        let body = "# Title\n\n[a link](other.md) and `code`\n";
        let out = run(body, &vault);
        assert_eq!(out, ProcessedContent {
            content: body.to_string(),
            assets: vec![],
            warnings: vec![],
        });
    }
}
