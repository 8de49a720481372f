//! Reparent (spec §4.4.6): replaces the last selected commit's parents
//! with the lowest-indexed through second-to-last selected commits, in
//! order, optionally reconstructing its tree content under the new
//! first parent.

use crate::error::CommandError;
use crate::log::WarningSink;
use crate::model::{Event, EventIndex, FileOp};
use crate::ops::canonicalize::canonicalize_fileops;
use crate::ops::reorder::topo_sort;
use crate::repository::Repository;

#[derive(Clone, Copy, Default)]
pub struct ReparentOptions {
    /// Skip the tree-content reconstruction; the commit's fileops are
    /// left as-is and now apply relative to the new first parent.
    pub rebase: bool,
}

/// `selection` is already in the order the caller wants applied: all but
/// the last element become the new parent list (in that order) of the
/// last element.
pub fn reparent(repo: &mut Repository, selection: &[EventIndex], options: ReparentOptions, warnings: &WarningSink) -> anyhow::Result<()> {
    if selection.len() < 2 {
        return Err(CommandError::new("reparent: selection must name at least a target and one new parent").into());
    }
    let (new_parents, rest) = selection.split_at(selection.len() - 1);
    let target = rest[0];

    let old_manifest = repo.manifest_of(target);

    if let Some(Event::Commit(c)) = repo.event_mut(target) {
        c.parents = new_parents.to_vec();
        c.invalidate_manifest();
    }

    if !options.rebase {
        let new_first_parent_manifest = match new_parents.first() {
            Some(&p) => repo.manifest_of(p),
            None => Default::default(),
        };
        let mut reconstructive = vec![FileOp::DeleteAll];
        for (path, entry) in &old_manifest {
            reconstructive.push(FileOp::Modify { mode: entry.mode, file_ref: entry.file_ref.clone(), path: path.clone() });
        }
        if let Some(Event::Commit(c)) = repo.event_mut(target) {
            reconstructive.extend(c.fileops.drain(..));
            c.fileops = reconstructive;
        }
        if let Some(Event::Commit(c)) = repo.event_mut(target) {
            let ops = std::mem::take(&mut c.fileops);
            c.fileops = canonicalize_fileops(ops, &new_first_parent_manifest, warnings);
            c.invalidate_manifest();
        }
    }

    repo.reindex_children();
    repo.invalidate_manifest_chain(target);
    topo_sort(repo);
    Ok(())
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
    fn reparent_reconstructs_tree_under_new_parent() {
        let mut repo = Repository::new("r");
        let mut old_parent = Commit::new("refs/heads/master", attr());
        old_parent.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Inline(BString::from("x")), path: BString::from("a") });
        let old_idx = repo.push(Event::Commit(old_parent));

        let new_parent = Commit::new("refs/heads/other", attr());
        let new_idx = repo.push(Event::Commit(new_parent));

        let mut target = Commit::new("refs/heads/master", attr());
        target.parents.push(old_idx);
        let target_idx = repo.push(Event::Commit(target));
        repo.reindex_children();

        let warnings = WarningSink::new(true);
        reparent(&mut repo, &[new_idx, target_idx], ReparentOptions::default(), &warnings).unwrap();

        let manifest = repo.manifest_of(target_idx);
        assert!(manifest.contains_key(&BString::from("a")));
    }
}
