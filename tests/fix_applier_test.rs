use seopilot::error::PipelineWarning;
use seopilot::fix_applier::{CodeFixApplier, FixOutcome};
use seopilot::models::{CodeFix, FixAction};
use seopilot::source::{FsTree, MemoryTree, SourceTree};
use std::fs;

fn fix(action: FixAction, file: &str) -> CodeFix {
    CodeFix {
        issue_id: format!("missing-meta-title:/{}", file),
        file: file.to_string(),
        action,
        search: None,
        replace: None,
        content: None,
        description: "test fix".to_string(),
    }
}

fn modify(file: &str, search: &str, replace: &str) -> CodeFix {
    CodeFix {
        search: Some(search.to_string()),
        replace: Some(replace.to_string()),
        ..fix(FixAction::Modify, file)
    }
}

fn create(file: &str, content: &str) -> CodeFix {
    CodeFix {
        content: Some(content.to_string()),
        ..fix(FixAction::Create, file)
    }
}

#[tokio::test]
async fn test_missing_anchor_leaves_file_untouched() {
    let mut tree = MemoryTree::new().with_file("a.tsx", "export default function A() {}\n");

    let report = CodeFixApplier::new()
        .apply_all(&mut tree, &[modify("a.tsx", "MISSING", "X")])
        .await;

    assert!(report.applied.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(
        report.warnings(),
        vec![&PipelineWarning::MutationAnchorNotFound {
            path: "a.tsx".to_string()
        }]
    );
    assert_eq!(tree.get("a.tsx"), Some("export default function A() {}\n"));
}

#[tokio::test]
async fn test_modify_replaces_first_occurrence_only() {
    let mut tree = MemoryTree::new().with_file("page.tsx", "title: 'Old'\ntitle: 'Old'\n");

    let outcome = CodeFixApplier::new()
        .apply(&mut tree, &modify("page.tsx", "title: 'Old'", "title: 'New'"))
        .await
        .unwrap();

    assert_eq!(outcome, FixOutcome::Modified);
    assert_eq!(tree.get("page.tsx"), Some("title: 'New'\ntitle: 'Old'\n"));
}

#[tokio::test]
async fn test_reapplying_a_modify_is_a_no_op() {
    let mut tree = MemoryTree::new().with_file("page.tsx", "title: 'Old'\n");
    let fix = modify("page.tsx", "title: 'Old'", "title: 'New'");
    let applier = CodeFixApplier::new();

    assert_eq!(applier.apply(&mut tree, &fix).await, Ok(FixOutcome::Modified));
    assert_eq!(
        applier.apply(&mut tree, &fix).await,
        Err(PipelineWarning::MutationAnchorNotFound {
            path: "page.tsx".to_string()
        })
    );
    assert_eq!(tree.get("page.tsx"), Some("title: 'New'\n"));
}

#[tokio::test]
async fn test_modify_missing_file() {
    let mut tree = MemoryTree::new();
    let warning = CodeFixApplier::new()
        .apply(&mut tree, &modify("gone.tsx", "a", "b"))
        .await
        .unwrap_err();
    assert_eq!(
        warning,
        PipelineWarning::MutationTargetMissing {
            path: "gone.tsx".to_string()
        }
    );
}

#[tokio::test]
async fn test_invalid_fixes_are_rejected() {
    let mut tree = MemoryTree::new().with_file("a.tsx", "content");
    let applier = CodeFixApplier::new();

    let empty_create = applier.apply(&mut tree, &create("new.tsx", "")).await.unwrap_err();
    assert!(matches!(empty_create, PipelineWarning::InvalidFix { .. }));

    let no_search = applier.apply(&mut tree, &fix(FixAction::Modify, "a.tsx")).await.unwrap_err();
    assert!(matches!(no_search, PipelineWarning::InvalidFix { .. }));

    assert!(!tree.exists("new.tsx").await);
    assert_eq!(tree.get("a.tsx"), Some("content"));
}

#[tokio::test]
async fn test_create_and_delete() {
    let mut tree = MemoryTree::new().with_file("public/old-sitemap.xml", "<urlset/>");
    let applier = CodeFixApplier::new();

    let report = applier
        .apply_all(
            &mut tree,
            &[
                create("public/robots.txt", "User-agent: *\nAllow: /\n"),
                fix(FixAction::Delete, "public/old-sitemap.xml"),
                fix(FixAction::Delete, "public/never-existed.xml"),
            ],
        )
        .await;

    let outcomes: Vec<FixOutcome> = report.applied.iter().map(|a| a.outcome).collect();
    assert_eq!(
        outcomes,
        vec![FixOutcome::Created, FixOutcome::Deleted, FixOutcome::AlreadyAbsent]
    );
    assert!(report.skipped.is_empty());
    assert_eq!(tree.get("public/robots.txt"), Some("User-agent: *\nAllow: /\n"));
    assert_eq!(tree.get("public/old-sitemap.xml"), None);
}

#[tokio::test]
async fn test_unsafe_paths_are_refused() {
    let mut tree = MemoryTree::new();
    let applier = CodeFixApplier::new();

    for path in ["../outside.txt", "/etc/passwd", ""] {
        let warning = applier.apply(&mut tree, &create(path, "x")).await.unwrap_err();
        assert!(matches!(warning, PipelineWarning::UnsafePath { .. }), "{} was not refused", path);
    }
}

#[tokio::test]
async fn test_danger_zones_are_refused() {
    let mut tree = MemoryTree::new()
        .with_file("lib/db.ts", "export const db = {}")
        .with_file("app/page.tsx", "export default function Page() {}");
    let applier = CodeFixApplier::new().with_danger_zones(vec!["lib".to_string(), "package.json".to_string()]);

    let report = applier
        .apply_all(
            &mut tree,
            &[
                modify("lib/db.ts", "{}", "null"),
                create("package.json", "{}"),
                modify("app/page.tsx", "Page()", "Home()"),
            ],
        )
        .await;

    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].fix.file, "app/page.tsx");
    assert!(report
        .warnings()
        .iter()
        .all(|w| matches!(w, PipelineWarning::DangerZone { .. })));
    assert_eq!(tree.get("lib/db.ts"), Some("export const db = {}"));
    // A sibling that merely shares the prefix is not protected
    assert!(
        applier
            .apply(&mut tree, &create("library/notes.md", "# notes"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_one_bad_fix_does_not_stop_the_batch() {
    let mut tree = MemoryTree::new().with_file("a.tsx", "A").with_file("b.tsx", "B");

    let report = CodeFixApplier::new()
        .apply_all(
            &mut tree,
            &[modify("a.tsx", "nope", "x"), modify("b.tsx", "B", "BB")],
        )
        .await;

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.applied.len(), 1);
    assert_eq!(tree.get("b.tsx"), Some("BB"));
}

#[tokio::test]
async fn test_applies_to_real_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("app")).unwrap();
    fs::write(dir.path().join("app/page.tsx"), "export const metadata = { title: 'Old' }\n").unwrap();

    let mut tree = FsTree::new(dir.path());
    let report = CodeFixApplier::new()
        .apply_all(
            &mut tree,
            &[
                modify("app/page.tsx", "'Old'", "'New'"),
                create("app/sitemap.ts", "export default function sitemap() { return [] }\n"),
            ],
        )
        .await;

    assert_eq!(report.applied.len(), 2);
    assert_eq!(
        fs::read_to_string(dir.path().join("app/page.tsx")).unwrap(),
        "export const metadata = { title: 'New' }\n"
    );
    assert!(dir.path().join("app/sitemap.ts").exists());
}
