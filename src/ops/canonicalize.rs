//! Fileop canonicalization (spec §4.5): reduces a commit's fileop list to
//! a minimal equivalent sequence by iterating pairwise adjacency
//! reductions to a fixed point, then sorting into git-fast-export
//! canonical order.

use std::sync::Mutex;

use bstr::BString;

use crate::log::WarningSink;
use crate::model::{FileOp, FileRef, Manifest};

static COVERAGE: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

fn record(case: &'static str) {
    COVERAGE.lock().unwrap().push(case);
}

/// Every reduction case fired since the process started (or since the
/// last `reset_coverage_for_test`), for test observability (spec §4.5).
pub fn coverage() -> Vec<&'static str> {
    COVERAGE.lock().unwrap().clone()
}

#[cfg(test)]
pub fn reset_coverage_for_test() {
    COVERAGE.lock().unwrap().clear();
}

fn ancestor_exists(manifest: &Manifest, path: &BString) -> bool {
    manifest.contains_key(path)
}

/// Reduces `fileops` given the commit's first-parent `manifest` (used to
/// decide whether a path existed before this commit, the "ancestor"
/// check the table in spec §4.5 refers to).
pub fn canonicalize_fileops(fileops: Vec<FileOp>, manifest: &Manifest, warnings: &WarningSink) -> Vec<FileOp> {
    let mut ops = truncate_before_deleteall(fileops);
    loop {
        let reduced = reduce_once(&ops, manifest, warnings);
        match reduced {
            Some(next) => ops = next,
            None => break,
        }
    }
    sort_canonical(ops)
}

fn truncate_before_deleteall(fileops: Vec<FileOp>) -> Vec<FileOp> {
    if let Some(last_deleteall) = fileops.iter().rposition(|op| matches!(op, FileOp::DeleteAll)) {
        fileops[last_deleteall..].to_vec()
    } else {
        fileops
    }
}

fn paths_intersect(a: &FileOp, b: &FileOp) -> bool {
    matches!(a, FileOp::DeleteAll) || matches!(b, FileOp::DeleteAll) || a.paths().iter().any(|pa| b.paths().contains(pa))
}

fn reduce_once(ops: &[FileOp], manifest: &Manifest, warnings: &WarningSink) -> Option<Vec<FileOp>> {
    for i in 0..ops.len().saturating_sub(1) {
        let left = &ops[i];
        let right = &ops[i + 1];
        if !paths_intersect(left, right) {
            continue;
        }
        if let Some(replacement) = reduce_pair(left, right, manifest, warnings) {
            let mut next = Vec::with_capacity(ops.len());
            next.extend_from_slice(&ops[..i]);
            next.extend(replacement);
            next.extend_from_slice(&ops[i + 2..]);
            return Some(next);
        }
    }
    None
}

fn reduce_pair(left: &FileOp, right: &FileOp, manifest: &Manifest, warnings: &WarningSink) -> Option<Vec<FileOp>> {
    match (left, right) {
        (FileOp::Modify { path: pa, .. }, FileOp::Modify { path: pb, .. }) if pa == pb => {
            record("M-M-clique");
            Some(vec![right.clone()])
        }
        (FileOp::Modify { path, .. }, FileOp::Delete { path: dpath }) if path == dpath => {
            if ancestor_exists(manifest, path) {
                record("M-D-keep-D");
                Some(vec![right.clone()])
            } else {
                record("M-D-drop-both");
                Some(vec![])
            }
        }
        (FileOp::Modify { mode, file_ref, path }, FileOp::Rename { src, tgt }) if path == src => {
            if ancestor_exists(manifest, src) {
                record("M-R-keep-rename-and-modify");
                Some(vec![
                    FileOp::Rename { src: src.clone(), tgt: tgt.clone() },
                    FileOp::Modify { mode: *mode, file_ref: file_ref.clone(), path: tgt.clone() },
                ])
            } else {
                record("M-R-collapse-to-modify");
                Some(vec![FileOp::Modify { mode: *mode, file_ref: file_ref.clone(), path: tgt.clone() }])
            }
        }
        (FileOp::Delete { path: dpath }, FileOp::Delete { path: dpath2 }) if dpath == dpath2 => {
            record("D-D-keep-left");
            Some(vec![left.clone()])
        }
        (FileOp::Delete { path: dpath }, FileOp::Modify { path, .. }) if dpath == path => {
            record("D-M-undoes-delete");
            Some(vec![right.clone()])
        }
        (FileOp::Delete { path }, FileOp::Rename { src, tgt: _ }) if path == src => {
            warnings.warn(format!("rename of path '{src}' deleted earlier in the same commit, dropping rename"));
            record("D-R-warn-drop-rename");
            Some(vec![left.clone()])
        }
        (FileOp::Rename { tgt, .. }, FileOp::Delete { path }) if tgt == path => {
            record("R-D-collapse-to-delete-src");
            if let FileOp::Rename { src, .. } = left {
                Some(vec![FileOp::Delete { path: src.clone() }])
            } else {
                unreachable!()
            }
        }
        (FileOp::Rename { src, .. }, FileOp::Delete { path }) if src == path => {
            warnings.warn(format!("delete of rename source '{path}' after the rename already moved it, dropping delete"));
            record("R-D-warn-drop-delete");
            Some(vec![left.clone()])
        }
        (FileOp::Rename { src: a, tgt: b }, FileOp::Rename { src: b2, tgt: c }) if b == b2 => {
            record("R-R-chain");
            Some(vec![FileOp::Rename { src: a.clone(), tgt: c.clone() }])
        }
        (FileOp::Copy { tgt, .. }, FileOp::Delete { path }) if tgt == path => {
            record("C-D-undo-copy");
            Some(vec![])
        }
        (FileOp::Copy { src, tgt }, FileOp::Rename { src: rsrc, tgt: rtgt }) if tgt == rsrc && src != rtgt => {
            record("C-R-collapse-to-copy");
            Some(vec![FileOp::Copy { src: src.clone(), tgt: rtgt.clone() }])
        }
        _ => None,
    }
}

/// git-fast-export canonical order: renames last, each group sorted
/// lexicographically with a sentinel suffix so `a/b/c` sorts before
/// `a/b` before `a`.
fn sort_canonical(mut ops: Vec<FileOp>) -> Vec<FileOp> {
    ops.sort_by(|a, b| {
        let a_is_rename = matches!(a, FileOp::Rename { .. });
        let b_is_rename = matches!(b, FileOp::Rename { .. });
        a_is_rename.cmp(&b_is_rename).then_with(|| sort_key(a).cmp(&sort_key(b)))
    });
    ops
}

fn sort_key(op: &FileOp) -> Vec<u8> {
    let path = op.paths().into_iter().next().cloned().unwrap_or_default();
    let mut key = path.to_vec();
    key.push(0xFF);
    key
}

/// True if `reference` is the literal inline marker rather than a blob
/// mark (used by callers checking invariant P2's `ref != "inline"`).
pub fn is_inline(reference: &FileRef) -> bool {
    matches!(reference, FileRef::Inline(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BString;

    fn modify(path: &str, blob_mark: &str) -> FileOp {
        FileOp::Modify { mode: 0o100644, file_ref: FileRef::Mark(blob_mark.to_string()), path: BString::from(path) }
    }

    #[test]
    fn rename_composition_collapses_to_empty() {
        // spec §8.2 S2: M a, R a b, M b, D b → empty.
        let ops = vec![
            modify("a", ":1"),
            FileOp::Rename { src: BString::from("a"), tgt: BString::from("b") },
            modify("b", ":2"),
            FileOp::Delete { path: BString::from("b") },
        ];
        let manifest = Manifest::new();
        let warnings = WarningSink::new(true);
        let result = canonicalize_fileops(ops, &manifest, &warnings);
        assert!(result.is_empty(), "expected empty fileop list, got {result:?}");
    }

    #[test]
    fn deleteall_truncates_preceding_ops() {
        let ops = vec![modify("a", ":1"), FileOp::DeleteAll, modify("b", ":2")];
        let manifest = Manifest::new();
        let warnings = WarningSink::new(true);
        let result = canonicalize_fileops(ops, &manifest, &warnings);
        assert_eq!(result, vec![FileOp::DeleteAll, modify("b", ":2")]);
    }

    #[test]
    fn canonical_sort_orders_deeper_paths_first_and_renames_last() {
        let ops = vec![
            modify("a", ":1"),
            modify("a/b", ":2"),
            FileOp::Rename { src: BString::from("x"), tgt: BString::from("y") },
        ];
        let sorted = sort_canonical(ops);
        assert_eq!(sorted[0].paths(), vec![&BString::from("a/b")]);
        assert_eq!(sorted[1].paths(), vec![&BString::from("a")]);
        assert!(matches!(sorted[2], FileOp::Rename { .. }));
    }

    #[test]
    fn delete_then_modify_undoes_the_delete() {
        let ops = vec![FileOp::Delete { path: BString::from("a") }, modify("a", ":1")];
        let manifest = Manifest::new();
        let warnings = WarningSink::new(true);
        let result = canonicalize_fileops(ops, &manifest, &warnings);
        assert_eq!(result, vec![modify("a", ":1")]);
    }

    #[test]
    fn delete_then_rename_of_the_deleted_path_drops_only_the_rename() {
        let ops = vec![
            FileOp::Delete { path: BString::from("a") },
            FileOp::Rename { src: BString::from("a"), tgt: BString::from("b") },
        ];
        let manifest = Manifest::new();
        let warnings = WarningSink::new(true);
        let result = canonicalize_fileops(ops, &manifest, &warnings);
        assert_eq!(result, vec![FileOp::Delete { path: BString::from("a") }]);
    }

    #[test]
    fn modify_delete_with_ancestor_keeps_delete() {
        let mut manifest = Manifest::new();
        manifest.insert(
            BString::from("a"),
            crate::model::ManifestEntry { mode: 0o100644, file_ref: FileRef::Mark(":0".to_string()) },
        );
        let ops = vec![modify("a", ":1"), FileOp::Delete { path: BString::from("a") }];
        let warnings = WarningSink::new(true);
        let result = canonicalize_fileops(ops, &manifest, &warnings);
        assert_eq!(result, vec![FileOp::Delete { path: BString::from("a") }]);
    }
}
