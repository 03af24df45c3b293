use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vaultpress_core::{RemoteConfig, Slug};
use vaultpress_extract::FsVault;
use vaultpress_remote::fake::FakeGitHub;
use vaultpress_remote::{GitHubStore, RemoteStore, RequestGate};
use vaultpress_sync::{
    diff_post, run, status, PostState, PostStatus, PublishContext, PublishManifest, PublishScope,
    RunOptions,
};

const MANIFEST: &str = ".vaultpress/manifest.json";

struct Fixture {
    vault_dir: TempDir,
    store: GitHubStore<FakeGitHub>,
}

impl Fixture {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let vault_dir = TempDir::new().expect("vault");
        let root = vault_dir.path();
        fs::create_dir_all(root.join("Posts/Road Trip")).unwrap();
        fs::create_dir_all(root.join("Attachments")).unwrap();
        fs::write(
            root.join("Posts/Road Trip/index.md"),
            "# Road trip\n\n![[Desert Sunset.jpg|Dusk]]\n",
        )
        .unwrap();
        fs::write(root.join("Posts/hello.md"), "# Hello\n\n![logo](../Attachments/logo.png)\n").unwrap();
        fs::write(root.join("Attachments/Desert Sunset.jpg"), b"jpeg-bytes").unwrap();
        fs::write(root.join("Attachments/logo.png"), b"png-bytes").unwrap();

        let remote = RemoteConfig {
            api_base: "https://api.example.test".into(),
            owner: "me".into(),
            repo: "blog".into(),
            branch: "main".into(),
            content_root: "content/posts".into(),
            token: Some("t".into()),
        };
        let store = GitHubStore::with_transport(remote, FakeGitHub::new(), RequestGate::default());
        Self { vault_dir, store }
    }

    fn root(&self) -> &Path {
        self.vault_dir.path()
    }

    fn fake(&self) -> &FakeGitHub {
        self.store.transport()
    }

    async fn publish(&self, scope: PublishScope, options: RunOptions) -> vaultpress_sync::PublishReport {
        let vault = FsVault::open(self.root()).expect("open vault");
        let ctx = context(&vault, &self.store);
        run(&ctx, scope, options).await.expect("run")
    }

    fn manifest(&self) -> PublishManifest {
        let bytes = self.fake().file(MANIFEST).expect("manifest stored");
        PublishManifest::parse(&bytes).expect("valid manifest")
    }
}

fn context<'a>(vault: &'a FsVault, store: &'a dyn RemoteStore) -> PublishContext<'a> {
    PublishContext {
        vault,
        store,
        posts_dir: PathBuf::from("Posts"),
        content_root: "content/posts".into(),
        manifest_path: MANIFEST.into(),
    }
}

#[tokio::test]
async fn first_publish_uploads_bundles_and_manifest() {
    let fx = Fixture::new();
    let report = fx.publish(PublishScope::All, RunOptions::default()).await;

    assert_eq!(report.count(PostState::Uploaded), 2);
    assert!(!report.has_failures());
    assert_eq!(
        fx.fake().paths(),
        vec![
            MANIFEST.to_string(),
            "content/posts/Road-Trip/Desert-Sunset.jpg".to_string(),
            "content/posts/Road-Trip/index.md".to_string(),
            "content/posts/hello/index.md".to_string(),
            "content/posts/hello/logo.png".to_string(),
        ]
    );
    assert_eq!(
        fx.fake().text("content/posts/Road-Trip/index.md").as_deref(),
        Some("# Road trip\n\n![Dusk](Desert-Sunset.jpg)\n")
    );

    let manifest = fx.manifest();
    assert!(manifest.last_publish.is_some());
    let trip = &manifest.posts[&Slug::from("Road-Trip")];
    assert_eq!(trip.vault_path, "Posts/Road Trip/index.md");
    assert_eq!(trip.repo_path, "content/posts/Road-Trip/index.md");
    assert_eq!(trip.assets, vec!["content/posts/Road-Trip/Desert-Sunset.jpg"]);
}

#[tokio::test]
async fn republishing_unchanged_vault_only_rewrites_the_manifest() {
    let fx = Fixture::new();
    fx.publish(PublishScope::All, RunOptions::default()).await;
    fx.fake().reset_counters();

    let report = fx.publish(PublishScope::All, RunOptions::default()).await;

    assert_eq!(report.count(PostState::Unchanged), 2);
    assert!(report.posts.iter().all(|p| p.assets_uploaded == 0));
    assert_eq!(fx.fake().put_paths(), vec![MANIFEST.to_string()]);
    assert_eq!(fx.fake().deletes(), 0);
}

#[tokio::test]
async fn removed_document_is_deleted_remotely() {
    let fx = Fixture::new();
    fx.publish(PublishScope::All, RunOptions::default()).await;

    fs::remove_file(fx.root().join("Posts/hello.md")).unwrap();
    let report = fx.publish(PublishScope::All, RunOptions::default()).await;

    assert_eq!(report.removed, vec![Slug::from("hello")]);
    assert_eq!(report.deletions.deleted, 2);
    assert!(fx.fake().file("content/posts/hello/index.md").is_none());
    assert!(fx.fake().file("content/posts/hello/logo.png").is_none());
    assert!(fx.fake().file("content/posts/Road-Trip/index.md").is_some());
    assert!(!fx.manifest().posts.contains_key(&Slug::from("hello")));
}

#[tokio::test]
async fn deletion_skips_files_already_gone() {
    let fx = Fixture::new();
    fx.publish(PublishScope::All, RunOptions::default()).await;
    fx.fake().remove("content/posts/hello/logo.png");

    fs::remove_file(fx.root().join("Posts/hello.md")).unwrap();
    let report = fx.publish(PublishScope::All, RunOptions::default()).await;

    assert_eq!(report.deletions.deleted, 1);
    assert_eq!(report.deletions.absent, 1);
    assert!(report.deletions.failed.is_empty());
}

#[tokio::test]
async fn entries_outside_the_content_root_are_never_deleted() {
    let fx = Fixture::new();
    fx.fake().insert("README.md", b"keep me".to_vec());
    let hostile = r#"{"version":1,"lastPublish":"2026-01-01T00:00:00Z","posts":{
        "evil":{"vaultPath":"x.md","repoPath":"README.md","assets":["content/posts/../../README.md"],"contentSha":"x"}}}"#;
    fx.fake().insert(MANIFEST, hostile.as_bytes().to_vec());

    let report = fx.publish(PublishScope::All, RunOptions::default()).await;

    assert_eq!(report.removed, vec![Slug::from("evil")]);
    assert_eq!(report.refused_deletions.len(), 2);
    assert_eq!(report.deletions.deleted, 0);
    assert_eq!(fx.fake().text("README.md").as_deref(), Some("keep me"));
}

#[tokio::test]
async fn corrupt_manifest_is_treated_as_empty() {
    let fx = Fixture::new();
    fx.fake().insert(MANIFEST, b"not json".to_vec());

    let report = fx.publish(PublishScope::All, RunOptions::default()).await;

    assert_eq!(report.count(PostState::Uploaded), 2);
    assert_eq!(fx.manifest().posts.len(), 2);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let fx = Fixture::new();
    fx.publish(PublishScope::All, RunOptions::default()).await;
    fs::remove_file(fx.root().join("Posts/hello.md")).unwrap();
    fs::write(fx.root().join("Posts/Road Trip/index.md"), "# Road trip, edited\n").unwrap();
    fx.fake().reset_counters();

    let report = fx
        .publish(
            PublishScope::All,
            RunOptions {
                dry_run: true,
                ..RunOptions::default()
            },
        )
        .await;

    assert_eq!(report.count(PostState::WouldPublish), 1);
    assert_eq!(
        report.planned_deletions,
        vec!["content/posts/hello/index.md", "content/posts/hello/logo.png"]
    );
    assert!(report.manifest.is_none());
    assert_eq!(fx.fake().puts(), 0);
    assert_eq!(fx.fake().deletes(), 0);
}

#[tokio::test]
async fn cancelled_run_skips_deletions_but_saves() {
    let fx = Fixture::new();
    fx.publish(PublishScope::All, RunOptions::default()).await;
    fs::remove_file(fx.root().join("Posts/hello.md")).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = fx
        .publish(
            PublishScope::All,
            RunOptions {
                dry_run: false,
                cancel,
            },
        )
        .await;

    assert!(report.cancelled);
    assert!(report.posts.is_empty());
    assert_eq!(fx.fake().deletes(), 0);
    assert!(report.manifest.is_some());
    assert_eq!(fx.manifest().posts.len(), 2);
}

#[tokio::test]
async fn single_document_run_keeps_other_posts() {
    let fx = Fixture::new();
    fx.publish(PublishScope::All, RunOptions::default()).await;
    fs::write(fx.root().join("Posts/hello.md"), "# Hello again\n").unwrap();
    fs::remove_file(fx.root().join("Posts/Road Trip/index.md")).unwrap();

    let report = fx
        .publish(
            PublishScope::Document(PathBuf::from("Posts/hello.md")),
            RunOptions::default(),
        )
        .await;

    assert_eq!(report.posts.len(), 1);
    assert_eq!(report.posts[0].state, PostState::Uploaded);
    assert_eq!(fx.fake().deletes(), 0);
    let manifest = fx.manifest();
    assert!(manifest.posts.contains_key(&Slug::from("Road-Trip")));
    assert!(manifest.posts[&Slug::from("hello")].assets.is_empty());
}

#[tokio::test]
async fn duplicate_slugs_reject_the_later_document() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.root().join("Posts/hello")).unwrap();
    fs::write(fx.root().join("Posts/hello/index.md"), "# Other hello\n").unwrap();

    let report = fx.publish(PublishScope::All, RunOptions::default()).await;

    let hello: Vec<_> = report
        .posts
        .iter()
        .filter(|p| p.slug == Slug::from("hello"))
        .collect();
    assert_eq!(hello.len(), 2);
    assert_eq!(hello.iter().filter(|p| p.is_failed()).count(), 1);
    assert!(report.has_failures());
}

#[tokio::test]
async fn status_classifies_posts() {
    let fx = Fixture::new();
    fx.publish(PublishScope::All, RunOptions::default()).await;
    fs::write(fx.root().join("Posts/hello.md"), "# Hello, changed\n").unwrap();
    fs::remove_file(fx.root().join("Posts/Road Trip/index.md")).unwrap();
    fs::write(fx.root().join("Posts/fresh.md"), "# Fresh\n").unwrap();
    fx.fake().reset_counters();

    let vault = FsVault::open(fx.root()).unwrap();
    let report = status(&context(&vault, &fx.store)).await.expect("status");

    let by_slug = |slug: &str| {
        report
            .entries
            .iter()
            .find(|e| e.slug.as_str() == slug)
            .map(|e| e.status)
    };
    assert_eq!(by_slug("fresh"), Some(PostStatus::New));
    assert_eq!(by_slug("hello"), Some(PostStatus::Modified));
    assert_eq!(by_slug("Road-Trip"), Some(PostStatus::Removed));
    assert!(report.is_dirty());
    assert_eq!(fx.fake().puts(), 0);
}

#[tokio::test]
async fn status_after_publish_is_current() {
    let fx = Fixture::new();
    fx.publish(PublishScope::All, RunOptions::default()).await;

    let vault = FsVault::open(fx.root()).unwrap();
    let report = status(&context(&vault, &fx.store)).await.expect("status");

    assert_eq!(report.count(PostStatus::Current), 2);
    assert!(!report.is_dirty());
    assert!(report.last_publish.is_some());
}

#[tokio::test]
async fn diff_shows_local_edits_against_published_text() {
    let fx = Fixture::new();
    fx.publish(PublishScope::All, RunOptions::default()).await;
    let vault = FsVault::open(fx.root()).unwrap();
    let ctx = context(&vault, &fx.store);

    let clean = diff_post(&ctx, Path::new("Posts/hello.md")).await.unwrap();
    assert!(clean.is_empty());

    fs::write(
        fx.root().join("Posts/hello.md"),
        "# Hello\n\n![logo](../Attachments/logo.png)\nmore\n",
    )
    .unwrap();
    let edited = diff_post(&ctx, Path::new("Posts/hello.md")).await.unwrap();
    assert!(edited.unified_diff.contains("--- a/content/posts/hello/index.md"));
    assert!(edited.unified_diff.contains("+++ b/content/posts/hello/index.md"));
    assert!(edited.unified_diff.contains("+more"));
}

#[tokio::test]
async fn diff_of_unpublished_post_is_against_empty_text() {
    let fx = Fixture::new();
    let vault = FsVault::open(fx.root()).unwrap();
    let ctx = context(&vault, &fx.store);

    let diff = diff_post(&ctx, Path::new("Posts/hello.md")).await.unwrap();
    assert!(diff.unpublished);
    assert!(diff.unified_diff.contains("+# Hello"));
}

#[tokio::test]
async fn colliding_image_names_upload_once_and_stay_idempotent() {
    let fx = Fixture::new();
    fs::write(fx.root().join("Posts/p.md"), "![[a b.png]] ![[a-b.png]]\n").unwrap();
    fs::write(fx.root().join("Attachments/a b.png"), b"first").unwrap();
    fs::write(fx.root().join("Attachments/a-b.png"), b"second").unwrap();

    let first = fx.publish(PublishScope::All, RunOptions::default()).await;
    let post = first
        .posts
        .iter()
        .find(|p| p.slug == Slug::from("p"))
        .expect("post p");
    assert_eq!(post.assets_uploaded, 1);
    assert_eq!(post.warnings.len(), 1);
    assert_eq!(
        fx.fake()
            .put_paths()
            .iter()
            .filter(|p| p.as_str() == "content/posts/p/a-b.png")
            .count(),
        1
    );
    assert_eq!(fx.fake().file("content/posts/p/a-b.png").as_deref(), Some(b"first".as_slice()));
    assert_eq!(
        fx.fake().text("content/posts/p/index.md").as_deref(),
        Some("![](a-b.png) ![[a-b.png]]\n")
    );

    fx.fake().reset_counters();
    let second = fx.publish(PublishScope::All, RunOptions::default()).await;
    assert!(second.posts.iter().all(|p| p.assets_uploaded == 0));
    assert_eq!(fx.fake().put_paths(), vec![MANIFEST.to_string()]);
    assert_eq!(fx.fake().file("content/posts/p/a-b.png").as_deref(), Some(b"first".as_slice()));
}

#[tokio::test]
async fn single_document_scope_rejects_files_outside_posts() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.root().join("Private")).unwrap();
    fs::write(fx.root().join("Private/diary.md"), "# Dear diary\n").unwrap();
    let vault = FsVault::open(fx.root()).unwrap();
    let ctx = context(&vault, &fx.store);

    for path in ["Private/diary.md", "Attachments/logo.png", "Posts/Road Trip/index.md"] {
        let scope = PublishScope::Document(PathBuf::from(path));
        let result = run(&ctx, scope, RunOptions::default()).await;
        if path.starts_with("Posts/") {
            assert!(result.is_ok(), "{path}: {:?}", result.err());
        } else {
            assert!(result.is_err(), "{path} must be refused");
        }
    }

    let paths = fx.fake().paths();
    assert!(!paths.iter().any(|p| p.starts_with("content/posts/diary")));
    assert!(!paths.iter().any(|p| p.starts_with("content/posts/logo")));
    assert!(!fx.manifest().posts.contains_key(&Slug::from("diary")));
}
