//! Two-pass bidirectional synchronization: decision table, rename
//! detection, conflict resolution and dry-run semantics.

mod testenv;

use std::path::Path;

use orang::context::{CancelToken, SearchContext, TerminationReason};
use orang::filter::FileSystemFilter;
use orang::ops::{DialogResult, ScriptedPrompt};
use orang::output::{DisplayOptions, HighlightMode, Printer};
use orang::sync::{CompareOptions, ConflictResolution, SyncOp};
use orang::walk::{SearchTarget, WalkOptions};

use testenv::TestEnv;

fn sync(
    left: &Path,
    right: &Path,
    conflict: ConflictResolution,
    compare: CompareOptions,
    dry_run: bool,
    answers: Vec<DialogResult>,
) -> SearchContext {
    let filter = FileSystemFilter::default();
    let walk_options = WalkOptions {
        search_target: SearchTarget::All,
        recurse: true,
        max_depth: None,
        follow_symlinks: false,
        default_encoding: encoding_rs::UTF_8,
    };
    let mut ctx = SearchContext::new(CancelToken::default(), 0);
    let printer = Printer::new(HighlightMode::None, DisplayOptions::default());
    let mut op = SyncOp::new(
        printer,
        conflict,
        compare,
        dry_run,
        Box::new(ScriptedPrompt::new(answers)),
    );
    op.run(left, right, &filter, None, &walk_options, &mut ctx)
        .unwrap();
    ctx
}

fn sync_default(left: &Path, right: &Path) -> SearchContext {
    sync(
        left,
        right,
        ConflictResolution::LeftWins,
        CompareOptions::default(),
        false,
        Vec::new(),
    )
}

#[test]
fn left_only_files_are_copied_to_the_right() {
    let left = TestEnv::new(&["docs"], &[("docs/a.txt", "A"), ("b.txt", "B")]);
    let right = TestEnv::new(&[], &[]);

    let ctx = sync_default(left.root(), right.root());

    assert_eq!(right.read("docs/a.txt"), "A");
    assert_eq!(right.read("b.txt"), "B");
    // docs/ plus two files appear on the right.
    assert_eq!(ctx.telemetry.added_count, 3);
    assert_eq!(ctx.telemetry.deleted_count, 0);
}

#[test]
fn right_only_files_are_removed_in_the_second_pass() {
    let left = TestEnv::new(&[], &[("common.txt", "C")]);
    let right = TestEnv::new(&[], &[("common.txt", "C"), ("extra.txt", "E")]);
    // Identical mtimes make the common pair equal under the default compare.
    left.set_mtime("common.txt", 1_600_000_000);
    right.set_mtime("common.txt", 1_600_000_000);

    let ctx = sync_default(left.root(), right.root());

    assert!(right.exists("common.txt"));
    assert!(!right.exists("extra.txt"));
    assert_eq!(ctx.telemetry.deleted_count, 1);
    assert_eq!(ctx.telemetry.added_count, 0);
    assert_eq!(ctx.telemetry.updated_count, 0);
}

#[test]
fn rename_detection_renames_instead_of_copy_and_delete() {
    let left = TestEnv::new(&["docs"], &[("docs/foo.txt", "same bytes")]);
    let right = TestEnv::new(&["docs"], &[("docs/bar.txt", "same bytes")]);
    left.set_mtime("docs/foo.txt", 1_650_000_000);
    right.set_mtime("docs/bar.txt", 1_650_000_000);

    let ctx = sync(
        left.root(),
        right.root(),
        ConflictResolution::LeftWins,
        CompareOptions::parse("content,modified-time").unwrap(),
        false,
        Vec::new(),
    );

    assert!(right.exists("docs/foo.txt"));
    assert!(!right.exists("docs/bar.txt"));
    assert_eq!(right.read("docs/foo.txt"), "same bytes");
    assert_eq!(ctx.telemetry.renamed_count, 1);
    assert_eq!(ctx.telemetry.added_count, 0);
    assert_eq!(ctx.telemetry.updated_count, 0);
    assert_eq!(ctx.telemetry.deleted_count, 0);
}

#[test]
fn ambiguous_rename_candidates_fall_back_to_copy() {
    let left = TestEnv::new(&[], &[("f.txt", "dup")]);
    let right = TestEnv::new(&[], &[("c1.txt", "dup"), ("c2.txt", "dup")]);
    left.set_mtime("f.txt", 1_650_000_000);
    right.set_mtime("c1.txt", 1_650_000_000);
    right.set_mtime("c2.txt", 1_650_000_000);

    let ctx = sync_default(left.root(), right.root());

    // Two byte-equal candidates: rename would be a guess, so copy wins and
    // the second pass clears the leftovers.
    assert_eq!(ctx.telemetry.renamed_count, 0);
    assert_eq!(ctx.telemetry.added_count, 1);
    assert_eq!(ctx.telemetry.deleted_count, 2);
    assert!(right.exists("f.txt"));
    assert!(!right.exists("c1.txt"));
    assert!(!right.exists("c2.txt"));
}

#[test]
fn newer_side_wins_on_mtime_conflict() {
    let left = TestEnv::new(&[], &[("a.txt", "left version")]);
    let right = TestEnv::new(&[], &[("a.txt", "right version")]);
    left.set_mtime("a.txt", 1_704_153_600); // 2024-01-02
    right.set_mtime("a.txt", 1_704_067_200); // 2024-01-01

    let ctx = sync_default(left.root(), right.root());

    assert_eq!(right.read("a.txt"), "left version");
    assert_eq!(ctx.telemetry.updated_count, 1);
    assert_eq!(ctx.telemetry.added_count, 0);
    assert_eq!(ctx.telemetry.deleted_count, 0);
}

#[test]
fn newer_side_wins_even_against_the_policy() {
    let left = TestEnv::new(&[], &[("a.txt", "older left")]);
    let right = TestEnv::new(&[], &[("a.txt", "newer right")]);
    left.set_mtime("a.txt", 1_704_067_200);
    right.set_mtime("a.txt", 1_704_153_600);

    let ctx = sync_default(left.root(), right.root());

    // LeftWins does not override the mtime verdict.
    assert_eq!(left.read("a.txt"), "newer right");
    assert_eq!(right.read("a.txt"), "newer right");
    assert_eq!(ctx.telemetry.updated_count, 1);
}

#[test]
fn sync_converges_after_one_run() {
    let left = TestEnv::new(&["d"], &[("d/x.txt", "X"), ("y.txt", "Y")]);
    let right = TestEnv::new(&[], &[("z.txt", "Z")]);

    sync_default(left.root(), right.root());
    let ctx = sync_default(left.root(), right.root());

    assert_eq!(ctx.telemetry.added_count, 0);
    assert_eq!(ctx.telemetry.updated_count, 0);
    assert_eq!(ctx.telemetry.deleted_count, 0);
    assert_eq!(ctx.telemetry.renamed_count, 0);
}

#[test]
fn policy_resolves_same_mtime_conflicts() {
    let left = TestEnv::new(&[], &[("p.txt", "LLL")]);
    let right = TestEnv::new(&[], &[("p.txt", "RRRR")]);
    left.set_mtime("p.txt", 1_650_000_000);
    right.set_mtime("p.txt", 1_650_000_000);

    let ctx = sync(
        left.root(),
        right.root(),
        ConflictResolution::RightWins,
        CompareOptions::default(),
        false,
        Vec::new(),
    );

    assert_eq!(left.read("p.txt"), "RRRR");
    assert_eq!(right.read("p.txt"), "RRRR");
    assert_eq!(ctx.telemetry.updated_count, 1);
}

#[test]
fn ask_no_prefers_the_other_side() {
    let left = TestEnv::new(&[], &[("p.txt", "LLL")]);
    let right = TestEnv::new(&[], &[("p.txt", "RRRR")]);
    left.set_mtime("p.txt", 1_650_000_000);
    right.set_mtime("p.txt", 1_650_000_000);

    let ctx = sync(
        left.root(),
        right.root(),
        ConflictResolution::Ask,
        CompareOptions::default(),
        false,
        vec![DialogResult::No],
    );

    assert_eq!(left.read("p.txt"), "RRRR");
    assert_eq!(ctx.telemetry.updated_count, 1);
}

#[test]
fn ask_yes_to_all_mutates_the_live_policy() {
    let left = TestEnv::new(&[], &[("a.txt", "LA"), ("b.txt", "LB")]);
    let right = TestEnv::new(&[], &[("a.txt", "RAA"), ("b.txt", "RBB")]);
    for rel in ["a.txt", "b.txt"] {
        left.set_mtime(rel, 1_650_000_000);
        right.set_mtime(rel, 1_650_000_000);
    }

    // A single scripted answer: the second conflict must not prompt again.
    let ctx = sync(
        left.root(),
        right.root(),
        ConflictResolution::Ask,
        CompareOptions::default(),
        false,
        vec![DialogResult::YesToAll],
    );

    assert_eq!(right.read("a.txt"), "LA");
    assert_eq!(right.read("b.txt"), "LB");
    assert_eq!(ctx.telemetry.updated_count, 2);
}

#[test]
fn ask_cancel_terminates_the_sync() {
    let left = TestEnv::new(&[], &[("a.txt", "LA")]);
    let right = TestEnv::new(&[], &[("a.txt", "RAA")]);
    left.set_mtime("a.txt", 1_650_000_000);
    right.set_mtime("a.txt", 1_650_000_000);

    let ctx = sync(
        left.root(),
        right.root(),
        ConflictResolution::Ask,
        CompareOptions::default(),
        false,
        vec![DialogResult::Cancel],
    );

    assert_eq!(ctx.termination, TerminationReason::Canceled);
    assert_eq!(left.read("a.txt"), "LA");
    assert_eq!(right.read("a.txt"), "RAA");
}

#[test]
fn kind_mismatch_is_resolved_towards_the_left() {
    let left = TestEnv::new(&["x"], &[("x/child.txt", "payload")]);
    let right = TestEnv::new(&[], &[("x", "i am a file")]);

    let ctx = sync_default(left.root(), right.root());

    assert!(right.path("x").is_dir());
    assert_eq!(right.read("x/child.txt"), "payload");
    assert_eq!(ctx.telemetry.deleted_count, 1);
    assert!(ctx.telemetry.added_count >= 2);
}

#[test]
fn dry_run_sync_reports_without_touching_either_side() {
    let left = TestEnv::new(&["d"], &[("d/new.txt", "N"), ("conflict.txt", "L")]);
    let right = TestEnv::new(&[], &[("conflict.txt", "RR"), ("stale.txt", "S")]);
    left.set_mtime("conflict.txt", 1_704_153_600);
    right.set_mtime("conflict.txt", 1_704_067_200);

    let left_before = left.snapshot();
    let right_before = right.snapshot();

    let ctx = sync(
        left.root(),
        right.root(),
        ConflictResolution::LeftWins,
        CompareOptions::default(),
        true,
        Vec::new(),
    );

    assert_eq!(left.snapshot(), left_before);
    assert_eq!(right.snapshot(), right_before);
    // d, d/new.txt added; conflict.txt updated; stale.txt deleted.
    assert_eq!(ctx.telemetry.added_count, 2);
    assert_eq!(ctx.telemetry.updated_count, 1);
    assert_eq!(ctx.telemetry.deleted_count, 1);
}

#[test]
fn content_compare_detects_equal_files_with_different_mtimes() {
    let left = TestEnv::new(&[], &[("same.txt", "identical")]);
    let right = TestEnv::new(&[], &[("same.txt", "identical")]);
    left.set_mtime("same.txt", 1_650_000_000);
    right.set_mtime("same.txt", 1_660_000_000);

    let ctx = sync(
        left.root(),
        right.root(),
        ConflictResolution::LeftWins,
        CompareOptions::parse("content,size").unwrap(),
        false,
        Vec::new(),
    );

    // Equal under the chosen comparison: nothing to do.
    assert_eq!(ctx.telemetry.updated_count, 0);
    assert_eq!(ctx.telemetry.added_count, 0);
    assert_eq!(ctx.telemetry.deleted_count, 0);
}
