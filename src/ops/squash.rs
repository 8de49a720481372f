//! Squash and delete (spec §4.4): removes commits from the selection,
//! pushing their fileop effect forward into each child so the resulting
//! tree states are unchanged for everything downstream, then splices
//! children onto the deleted commit's own parents.

use std::collections::HashSet;

use crate::containers::OrderedIntSet;
use crate::log::WarningSink;
use crate::model::{Event, EventIndex, FileOp};
use crate::ops::canonicalize::canonicalize_fileops;
use crate::repository::Repository;

/// Whether a deleted commit's fileops are pushed into its children
/// (`Squash`) or simply dropped (`Delete`, used when the caller knows
/// the commit's content changes are unwanted, e.g. a broken cvs2svn
/// artifact).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Squash,
    Delete,
}

/// Removes every commit in `selection`, in ascending index order so a
/// chain of adjacent deletions each sees its predecessor already
/// spliced out.
pub fn delete_commits(repo: &mut Repository, selection: &OrderedIntSet, mode: DeleteMode, warnings: &WarningSink) -> anyhow::Result<()> {
    let mut targets: Vec<EventIndex> = selection.sorted().into_iter().map(|i| i as usize).collect();
    targets.retain(|&i| matches!(repo.event(i), Some(Event::Commit(_))));

    let _span = tracing::info_span!("squash_delete_commits").entered();
    for &target in &targets {
        if crate::log::abort_requested() {
            return Ok(());
        }
        splice_one(repo, target, mode, warnings)?;
    }

    let removed: HashSet<EventIndex> = targets.into_iter().collect();
    repo.remove_events(&removed);
    repo.reindex_children();
    Ok(())
}

fn splice_one(repo: &mut Repository, target: EventIndex, mode: DeleteMode, warnings: &WarningSink) -> anyhow::Result<()> {
    let (target_parents, target_fileops, children) = {
        let Some(Event::Commit(c)) = repo.event(target) else { return Ok(()) };
        (c.parents.clone(), c.fileops.clone(), c.children.clone())
    };

    for &child in &children {
        if let Some(Event::Commit(c)) = repo.event_mut(child) {
            // Whether `target` was specifically this child's *first* parent,
            // not merely one of several (spec §4.4.1's pushforward only
            // applies along the first-parent edge). Captured before the
            // splice below replaces `target` in `c.parents`.
            let was_first_parent = c.parents.first() == Some(&target);
            let was_only_parent = was_first_parent && c.parents.len() == 1;

            let pos = c.parents.iter().position(|&p| p == target);
            if let Some(pos) = pos {
                c.parents.splice(pos..pos + 1, target_parents.iter().copied());
                let mut seen = HashSet::new();
                c.parents.retain(|p| seen.insert(*p));
            }
            if mode == DeleteMode::Squash && was_first_parent {
                let mut merged = target_fileops.clone();
                merged.extend(c.fileops.drain(..));
                if was_only_parent && target_parents.is_empty() {
                    // Child loses its only parent and becomes a root: its
                    // fileops can no longer rely on an inherited tree, so
                    // the pushed-forward state must be declared from empty.
                    merged.insert(0, FileOp::DeleteAll);
                }
                c.fileops = merged;
            }
            c.invalidate_manifest();
        }
    }

    for tag_or_reset in collect_attachments(repo, target) {
        redirect_attachment(repo, tag_or_reset, target, &children, &target_parents);
    }

    for &child in &children {
        let parent_manifest = repo
            .event(child)
            .and_then(Event::as_commit)
            .and_then(|c| c.first_parent())
            .map(|p| repo.manifest_of(p))
            .unwrap_or_default();
        if let Some(Event::Commit(c)) = repo.event_mut(child) {
            let ops = std::mem::take(&mut c.fileops);
            c.fileops = canonicalize_fileops(ops, &parent_manifest, warnings);
        }
    }

    repo.invalidate_manifest_chain(target);
    Ok(())
}

fn collect_attachments(repo: &Repository, target: EventIndex) -> Vec<EventIndex> {
    repo.event(target).and_then(Event::as_commit).map(|c| c.attachments.clone()).unwrap_or_default()
}

/// Default policy is tagforward (spec §4.4.1): an attached Tag/Reset
/// moves to the deleted commit's first child; only if it has none does
/// it fall back to the first parent.
fn redirect_attachment(repo: &mut Repository, attachment: EventIndex, target: EventIndex, children: &[EventIndex], target_parents: &[EventIndex]) {
    let target_mark = repo.event(target).and_then(Event::as_commit).and_then(|c| c.mark.clone());
    let new_committish = children
        .first()
        .or_else(|| target_parents.first())
        .and_then(|&p| repo.event(p))
        .and_then(Event::as_commit)
        .and_then(|c| c.mark.clone());
    if let Some(event) = repo.event_mut(attachment) {
        match event {
            Event::Tag(t) => {
                if Some(t.committish.clone()) == target_mark {
                    if let Some(new) = &new_committish {
                        t.committish = new.clone();
                    }
                }
            }
            Event::Reset(r) => {
                if r.committish == target_mark {
                    r.committish = new_committish.clone();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribution, Commit, Date, FileOp, FileRef};
    use bstr::BString;

    fn attr() -> Attribution {
        Attribution::new("U", "u@x", Date::new(0, 0))
    }

    #[test]
    fn squash_pushes_fileops_into_child_and_relinks() {
        // spec §8.2 S1: squash pushforward.
        let mut repo = Repository::new("r");
        let mut c1 = Commit::new("refs/heads/master", attr());
        c1.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("x")), path: BString::from("a") });
        let i1 = repo.push(Event::Commit(c1));

        let mut c2 = Commit::new("refs/heads/master", attr());
        c2.parents.push(i1);
        c2.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("y")), path: BString::from("b") });
        let i2 = repo.push(Event::Commit(c2));
        repo.reindex_children();

        let selection = OrderedIntSet::from_iter(vec![i1 as i64]);
        let warnings = WarningSink::new(true);
        delete_commits(&mut repo, &selection, DeleteMode::Squash, &warnings).unwrap();

        assert_eq!(repo.len(), 1);
        let Event::Commit(survivor) = &repo.events()[0] else { panic!("expected commit") };
        assert!(survivor.parents.is_empty());
        // spec §8.2 S1: survivor becomes a root, so its pushed-forward
        // fileops open with a DeleteAll before replaying c1's then c2's ops.
        assert_eq!(
            survivor.fileops,
            vec![
                FileOp::DeleteAll,
                FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("x")), path: BString::from("a") },
                FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("y")), path: BString::from("b") },
            ]
        );
        let manifest = repo.manifest_of(0);
        assert!(manifest.contains_key(&BString::from("a")));
        assert!(manifest.contains_key(&BString::from("b")));
        let _ = i2;
    }

    #[test]
    fn squash_does_not_prepend_deleteall_when_child_keeps_a_parent() {
        // Child's only parent is deleted, but that parent itself had a
        // parent, so the child is re-rooted onto it rather than becoming
        // parentless — no DeleteAll should be synthesized.
        let mut repo = Repository::new("r");
        let mut c0 = Commit::new("refs/heads/master", attr());
        c0.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("root")), path: BString::from("r") });
        let i0 = repo.push(Event::Commit(c0));

        let mut c1 = Commit::new("refs/heads/master", attr());
        c1.parents.push(i0);
        c1.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("x")), path: BString::from("a") });
        let i1 = repo.push(Event::Commit(c1));

        let mut c2 = Commit::new("refs/heads/master", attr());
        c2.parents.push(i1);
        c2.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("y")), path: BString::from("b") });
        repo.push(Event::Commit(c2));
        repo.reindex_children();

        let selection = OrderedIntSet::from_iter(vec![i1 as i64]);
        let warnings = WarningSink::new(true);
        delete_commits(&mut repo, &selection, DeleteMode::Squash, &warnings).unwrap();

        let Event::Commit(survivor) = &repo.events()[1] else { panic!("expected commit") };
        assert!(!survivor.fileops.contains(&FileOp::DeleteAll));
    }

    #[test]
    fn delete_mode_drops_fileops() {
        let mut repo = Repository::new("r");
        let mut c1 = Commit::new("refs/heads/master", attr());
        c1.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("x")), path: BString::from("a") });
        let i1 = repo.push(Event::Commit(c1));
        let mut c2 = Commit::new("refs/heads/master", attr());
        c2.parents.push(i1);
        repo.push(Event::Commit(c2));
        repo.reindex_children();

        let selection = OrderedIntSet::from_iter(vec![i1 as i64]);
        let warnings = WarningSink::new(true);
        delete_commits(&mut repo, &selection, DeleteMode::Delete, &warnings).unwrap();
        let manifest = repo.manifest_of(0);
        assert!(!manifest.contains_key(&BString::from("a")));
    }
}
