//! Cut, unite, and graft (spec §4.4.4): operations that split a
//! repository in two or stitch repositories together.

use std::collections::{HashMap, HashSet};

use crate::containers::OrderedStringSet;
use crate::error::CommandError;
use crate::log::WarningSink;
use crate::model::{Event, EventIndex, FileOp};
use crate::repository::Repository;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Early,
    Late,
}

/// Splits `repo` at the parent/child edge `(parent, child)` into two new
/// repositories by two-colour graph flood: `parent`'s ancestors are
/// "early", `child`'s descendants are "late". Fails if any event would
/// need both colours.
pub fn cut(repo: &Repository, parent: EventIndex, child: EventIndex) -> anyhow::Result<(Repository, Repository)> {
    let child_commit = repo
        .event(child)
        .and_then(Event::as_commit)
        .ok_or_else(|| CommandError::new("cut: child is not a commit"))?;
    if !child_commit.parents.contains(&parent) {
        return Err(CommandError::new("cut: not a parent/child edge").into());
    }

    let mut color: HashMap<EventIndex, Side> = HashMap::new();
    let mut stack = vec![parent];
    while let Some(i) = stack.pop() {
        if color.contains_key(&i) {
            continue;
        }
        color.insert(i, Side::Early);
        if let Some(c) = repo.event(i).and_then(Event::as_commit) {
            stack.extend(c.parents.iter().copied());
        }
    }

    let mut late_seen = HashSet::new();
    let mut stack = vec![child];
    while let Some(i) = stack.pop() {
        if !late_seen.insert(i) {
            continue;
        }
        if let Some(c) = repo.event(i).and_then(Event::as_commit) {
            stack.extend(c.children.iter().copied());
        }
    }
    for i in &late_seen {
        if color.contains_key(i) {
            return Err(CommandError::new("cut: impossible, an event is reachable from both sides").into());
        }
        color.insert(*i, Side::Late);
    }

    let mark_to_index: HashMap<&str, EventIndex> = repo
        .events()
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.mark().map(|m| (m, i)))
        .collect();

    for (i, event) in repo.events().iter().enumerate() {
        if color.contains_key(&i) {
            continue;
        }
        let inferred = match event {
            Event::Blob(b) => b.mark.as_deref().and_then(|m| commit_side_referencing_blob(repo, m, &color)).or(None),
            Event::Tag(t) => mark_to_index.get(t.committish.as_str()).and_then(|idx| color.get(idx).copied()),
            Event::Reset(r) => r
                .committish
                .as_deref()
                .and_then(|c| mark_to_index.get(c))
                .and_then(|idx| color.get(idx).copied()),
            _ => None,
        };
        if let Some(side) = inferred {
            color.insert(i, side);
        }
    }

    let mut early = Repository::new(format!("{}-early", repo.name));
    let mut late = Repository::new(format!("{}-late", repo.name));
    let mut early_remap: HashMap<EventIndex, EventIndex> = HashMap::new();
    let mut late_remap: HashMap<EventIndex, EventIndex> = HashMap::new();

    for (i, event) in repo.events().iter().enumerate() {
        match color.get(&i) {
            Some(Side::Early) => {
                early_remap.insert(i, early.push(event.clone()));
            }
            Some(Side::Late) => {
                late_remap.insert(i, late.push(event.clone()));
            }
            None => {
                if let Event::Passthrough(p) = event {
                    if p.is_front_matter {
                        early_remap.insert(i, early.push(event.clone()));
                        late_remap.insert(i, late.push(event.clone()));
                    }
                }
            }
        }
    }

    remap_indices(&mut early, &early_remap);
    remap_indices(&mut late, &late_remap);
    early.reindex_children();
    late.reindex_children();
    Ok((early, late))
}

fn commit_side_referencing_blob(repo: &Repository, blob_mark: &str, color: &HashMap<EventIndex, Side>) -> Option<Side> {
    for (i, event) in repo.events().iter().enumerate() {
        if let Event::Commit(c) = event {
            let refs_blob = c.fileops.iter().any(|op| match op {
                FileOp::Modify { file_ref, .. } | FileOp::Note { file_ref, .. } => file_ref.to_string() == blob_mark,
                _ => false,
            });
            if refs_blob {
                if let Some(side) = color.get(&i) {
                    return Some(*side);
                }
            }
        }
    }
    None
}

fn remap_indices(repo: &mut Repository, remap: &HashMap<EventIndex, EventIndex>) {
    for event in repo.events_mut() {
        if let Event::Commit(c) = event {
            c.parents = c.parents.iter().filter_map(|p| remap.get(p).copied()).collect();
            c.children.clear();
        }
    }
}

/// Sorted by earliest-commit timestamp, uniquifies marks and (on
/// collision) branch/tag names using each repo's own name as
/// disambiguator, then concatenates and grafts each non-first repo's
/// root at the latest prior commit strictly earlier than the root.
pub fn unite(mut repos: Vec<Repository>, prune: bool, warnings: &WarningSink) -> anyhow::Result<Repository> {
    if repos.is_empty() {
        return Err(CommandError::new("unite: no repositories given").into());
    }
    repos.sort_by_key(earliest_commit_timestamp);

    let mut iter = repos.into_iter();
    let mut base = iter.next().unwrap();
    let mut known_branches = OrderedStringSet::new();
    for c in base.events().iter().filter_map(|e| e.as_commit()) {
        known_branches.insert(c.branch.clone());
    }

    for mut guest in iter {
        let disambiguator = guest.name.clone();
        for event in guest.events_mut() {
            if let Event::Commit(c) = event {
                if known_branches.contains(&c.branch) {
                    c.branch = format!("{}-{}", c.branch, disambiguator);
                }
            }
        }
        for event in guest.events() {
            if let Event::Commit(c) = event {
                known_branches.insert(c.branch.clone());
            }
        }

        let guest_root_time = earliest_commit_timestamp(&guest);
        let graft_point = latest_commit_before(&base, guest_root_time);
        let new_indices = base.absorb(guest);
        if let Some(&first_new) = new_indices.first() {
            if let Some(graft_at) = graft_point {
                let parent_manifest = base.manifest_of(graft_at);
                if let Some(Event::Commit(c)) = base.event_mut(first_new) {
                    if c.parents.is_empty() {
                        c.parents.push(graft_at);
                        if prune {
                            let mut deletes: Vec<FileOp> = parent_manifest.keys().map(|p| FileOp::Delete { path: p.clone() }).collect();
                            deletes.extend(c.fileops.drain(..));
                            c.fileops = deletes;
                        }
                        c.invalidate_manifest();
                    }
                }
            } else {
                warnings.warn("unite: no prior commit found to graft onto, leaving root unparented");
            }
        }
        base.reindex_children();
    }
    Ok(base)
}

/// Absorbs `guest` into `base`, linking its root(s) as children of
/// `graft_point` (or leaving them to resolve against existing marks via
/// Callouts when no graft point is given).
pub fn graft(base: &mut Repository, guest: Repository, graft_point: Option<EventIndex>) -> anyhow::Result<()> {
    let new_indices = base.absorb(guest);
    if let Some(graft_at) = graft_point {
        for &idx in &new_indices {
            if let Some(Event::Commit(c)) = base.event(idx) {
                if c.parents.is_empty() {
                    if let Some(Event::Commit(c)) = base.event_mut(idx) {
                        c.parents.push(graft_at);
                        c.invalidate_manifest();
                    }
                }
            }
        }
    }
    base.reindex_children();
    Ok(())
}

fn earliest_commit_timestamp(repo: &Repository) -> i64 {
    repo.events().iter().filter_map(|e| e.as_commit()).map(|c| c.committer.date.timestamp).min().unwrap_or(i64::MAX)
}

fn latest_commit_before(repo: &Repository, timestamp: i64) -> Option<EventIndex> {
    repo.events()
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.as_commit().map(|c| (i, c.committer.date.timestamp)))
        .filter(|&(_, t)| t < timestamp)
        .max_by_key(|&(_, t)| t)
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribution, Commit, Date};

    fn attr(t: i64) -> Attribution {
        Attribution::new("U", "u@x", Date::new(t, 0))
    }

    fn linear_repo(name: &str, base_time: i64) -> Repository {
        let mut repo = Repository::new(name);
        let i1 = repo.push(Event::Commit(Commit::new("refs/heads/master", attr(base_time))));
        let mut c2 = Commit::new("refs/heads/master", attr(base_time + 10));
        c2.parents.push(i1);
        repo.push(Event::Commit(c2));
        repo.reindex_children();
        repo
    }

    #[test]
    fn cut_splits_at_edge() {
        let repo = linear_repo("r", 0);
        let (early, late) = cut(&repo, 0, 1).unwrap();
        assert_eq!(early.len(), 1);
        assert_eq!(late.len(), 1);
    }

    #[test]
    fn cut_rejects_non_edge() {
        let repo = linear_repo("r", 0);
        assert!(cut(&repo, 1, 0).is_err());
    }

    #[test]
    fn unite_grafts_later_repo_onto_earlier() {
        let r1 = linear_repo("first", 0);
        let r2 = linear_repo("second", 100);
        let warnings = WarningSink::new(true);
        let united = unite(vec![r2, r1], false, &warnings).unwrap();
        assert_eq!(united.len(), 4);
    }
}
