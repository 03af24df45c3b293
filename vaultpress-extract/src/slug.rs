//! Slug derivation and filename sanitization.

use std::path::Path;

use vaultpress_core::Slug;

/// Characters that cannot appear in a slug because they are unsafe in a
/// remote path segment.
const PATH_UNSAFE: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Publish slug for a document at `document` (vault-relative or absolute).
///
/// The slug is the filename stem, except for `index` documents
/// (case-insensitive), which take the name of their containing folder.
pub fn derive_slug(document: &Path) -> Slug {
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let chosen = if stem.eq_ignore_ascii_case("index") {
        document
            .parent()
            .and_then(Path::file_name)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(stem)
    } else {
        stem
    };

    Slug::from(sanitize_slug(&chosen))
}

/// Replace each path-unsafe character with `-` and collapse whitespace runs
/// into a single `-`.
pub fn sanitize_slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_whitespace = false;
    for c in raw.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if PATH_UNSAFE.contains(&c) {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}

/// Target filename for an asset: whitespace runs become `-`, then anything
/// outside `[A-Za-z0-9._-]` is dropped.
///
/// Non-ASCII characters are removed rather than transliterated, so the
/// result can be empty.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("posts/my-post.md", "my-post")]
    #[case("my-post/index.md", "my-post")]
    #[case("Travel/Japan 2024/INDEX.md", "Japan-2024")]
    #[case("notes/What is: this?.md", "What-is--this-")]
    #[case("a/b/Tabs\tand  spaces.md", "Tabs-and-spaces")]
    #[case("index.md", "index")]
    fn slug_cases(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(derive_slug(Path::new(path)).as_str(), expected);
    }

    #[rstest]
    #[case("my image.png", "my-image.png")]
    #[case("image (1).png", "image-1.png")]
    #[case("  leading.png", "-leading.png")]
    #[case("café.jpg", "caf.jpg")]
    #[case("snake_case-name.v2.gif", "snake_case-name.v2.gif")]
    #[case("日本", "")]
    fn file_name_cases(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(sanitize_file_name(name), expected);
    }

    #[test]
    fn sanitized_file_names_only_use_the_safe_alphabet() {
        let name = sanitize_file_name("We!rd  n@me #3 (final).PNG");
        assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));
        assert_eq!(name, "Werd-nme-3-final.PNG");
    }
}
