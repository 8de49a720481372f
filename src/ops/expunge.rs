//! Path expunge (spec §4.4.3): walks selected commits moving every
//! fileop touching a matched path into a parallel *expunged* repository,
//! and synthesizing a `Delete` in the source where the path was only
//! inherited so the final tree genuinely loses the content.

use crate::containers::OrderedIntSet;
use crate::log::WarningSink;
use crate::model::{Commit, Event, EventIndex, FileOp};
use crate::ops::canonicalize::canonicalize_fileops;
use crate::ops::tagify;
use crate::repository::Repository;

/// Removes every fileop (and synthesizes compensating deletes) whose
/// path satisfies `matches`, for each commit in `selection`, moving the
/// matched fileops into a freshly built repository of the same name plus
/// an `-expunges` suffix (spec §6.4). Tagifies newly-emptied commits in
/// the source unless `notagify`. Runs blob GC on the source afterward.
pub fn expunge<F>(
    repo: &mut Repository,
    selection: &OrderedIntSet,
    matches: F,
    notagify: bool,
    warnings: &WarningSink,
) -> anyhow::Result<Repository>
where
    F: Fn(&[u8]) -> bool,
{
    let mut targets: Vec<EventIndex> = selection.sorted().into_iter().map(|i| i as usize).collect();
    targets.sort_unstable();

    let mut expunged = Repository::new(format!("{}-expunges", repo.name));
    let mut emptied = Vec::new();

    let _span = tracing::info_span!("expunge_walk").entered();
    for &idx in &targets {
        if crate::log::abort_requested() {
            break;
        }
        if expunge_commit(repo, idx, &matches, &mut expunged, warnings)? {
            emptied.push(idx);
        }
    }

    repo.gc_blobs();
    if !notagify && !emptied.is_empty() {
        let emptied_set = OrderedIntSet::from_iter(emptied.into_iter().map(|i| i as i64));
        tagify::tagify(repo, &emptied_set, tagify::TagifyOptions::default(), warnings)?;
    }
    Ok(expunged)
}

/// Returns whether the commit's fileop list became empty.
fn expunge_commit<F>(repo: &mut Repository, idx: EventIndex, matches: &F, expunged: &mut Repository, warnings: &WarningSink) -> anyhow::Result<bool>
where
    F: Fn(&[u8]) -> bool,
{
    let parent = repo.event(idx).and_then(Event::as_commit).and_then(|c| c.first_parent());
    let parent_manifest = match parent {
        Some(p) => repo.manifest_of(p),
        None => Default::default(),
    };

    let Some(Event::Commit(commit)) = repo.event(idx) else { return Ok(false) };
    let branch = commit.branch.clone();
    let committer = commit.committer.clone();
    let comment = commit.comment.clone();
    let legacy_id = commit.legacy_id.clone();
    let original = commit.fileops.clone();

    let mut kept = Vec::with_capacity(original.len());
    let mut moved = Vec::new();
    for op in original {
        let hit = match &op {
            FileOp::Modify { path, .. } | FileOp::Delete { path } | FileOp::Note { path, .. } => matches(path),
            FileOp::Rename { src, tgt } => {
                if matches(tgt) {
                    true
                } else if matches(src) {
                    moved.push(FileOp::Delete { path: src.clone() });
                    kept.push(FileOp::Delete { path: src.clone() });
                    continue;
                } else {
                    false
                }
            }
            FileOp::Copy { src, tgt } => matches(tgt) || matches(src),
            FileOp::DeleteAll => false,
        };
        if hit {
            moved.push(op);
        } else {
            kept.push(op);
        }
    }

    if !kept.iter().any(|op| matches!(op, FileOp::DeleteAll)) {
        for path in parent_manifest.keys() {
            if matches(path) {
                kept.push(FileOp::Delete { path: path.clone() });
            }
        }
    }

    if !moved.is_empty() {
        let mut shadow = Commit::new(branch, committer);
        shadow.comment = comment;
        shadow.legacy_id = legacy_id;
        shadow.fileops = moved;
        expunged.push(Event::Commit(shadow));
    }

    let canonical = canonicalize_fileops(kept, &parent_manifest, warnings);
    let became_empty = canonical.is_empty();
    if let Some(Event::Commit(commit)) = repo.event_mut(idx) {
        commit.fileops = canonical;
        commit.invalidate_manifest();
    }
    repo.invalidate_manifest_chain(idx);
    Ok(became_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribution, Commit, Date, FileRef};
    use bstr::BString;

    fn attr() -> Attribution {
        Attribution::new("U", "u@x", Date::new(0, 0))
    }

    #[test]
    fn expunge_moves_matched_path_to_expunged_repo() {
        let mut repo = Repository::new("r");
        let mut c1 = Commit::new("refs/heads/master", attr());
        c1.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("secret")), path: BString::from("creds.txt") });
        c1.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("x")), path: BString::from("a.txt") });
        let i1 = repo.push(Event::Commit(c1));

        let mut c2 = Commit::new("refs/heads/master", attr());
        c2.parents.push(i1);
        c2.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("y")), path: BString::from("a.txt") });
        let i2 = repo.push(Event::Commit(c2));
        repo.reindex_children();

        let selection = OrderedIntSet::from_iter(vec![i1 as i64, i2 as i64]);
        let warnings = WarningSink::new(true);
        let expunged = expunge(&mut repo, &selection, |p| p == b"creds.txt", true, &warnings).unwrap();

        let manifest = repo.manifest_of(i2);
        assert!(!manifest.contains_key(&BString::from("creds.txt")));
        assert!(manifest.contains_key(&BString::from("a.txt")));
        assert_eq!(expunged.name, "r-expunges");
        assert_eq!(expunged.len(), 1);
    }
}
