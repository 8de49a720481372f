//! Reorder (spec §4.4.5): realizes a user-supplied permutation of a
//! contiguous ancestor chain, then drops fileops left referencing paths
//! no longer visible, and topologically re-sorts the event vector.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::CommandError;
use crate::log::WarningSink;
use crate::model::{Event, EventIndex, FileOp};
use crate::repository::Repository;

/// `chain` is the ancestor chain in its current order; `permutation[i]`
/// is the index into `chain` of the commit that should occupy position
/// `i` after reordering.
pub fn reorder(repo: &mut Repository, chain: &[EventIndex], permutation: &[usize], warnings: &WarningSink) -> anyhow::Result<()> {
    if chain.len() != permutation.len() {
        return Err(CommandError::new("reorder: permutation length does not match the chain").into());
    }
    for w in chain.windows(2) {
        // Interior links must have total in-degree and out-degree exactly 1:
        // `w[0]` must be `w[1]`'s *only* parent, not merely one of several,
        // or splicing in a new predecessor would silently drop the others.
        let ok = repo.event(w[1]).and_then(Event::as_commit).map(|c| c.parents.len() == 1 && c.parents[0] == w[0]).unwrap_or(false);
        if !ok {
            return Err(CommandError::new("reorder: selection is not a single-parent ancestor chain").into());
        }
    }

    let outside_parents = repo.event(chain[0]).and_then(Event::as_commit).map(|c| c.parents.clone()).unwrap_or_default();
    let chain_set: HashSet<EventIndex> = chain.iter().copied().collect();
    let last = *chain.last().unwrap();
    let outside_children: Vec<EventIndex> = repo
        .event(last)
        .and_then(Event::as_commit)
        .map(|c| c.children.iter().copied().filter(|ch| !chain_set.contains(ch)).collect())
        .unwrap_or_default();

    let new_order: Vec<EventIndex> = permutation.iter().map(|&p| chain[p]).collect();
    for (i, &idx) in new_order.iter().enumerate() {
        if let Some(Event::Commit(c)) = repo.event_mut(idx) {
            c.parents = if i == 0 { outside_parents.clone() } else { vec![new_order[i - 1]] };
            c.invalidate_manifest();
        }
    }

    let new_last = *new_order.last().unwrap();
    if new_last != last {
        for &child in &outside_children {
            if let Some(Event::Commit(c)) = repo.event_mut(child) {
                for p in c.parents.iter_mut() {
                    if *p == last {
                        *p = new_last;
                    }
                }
            }
        }
    }

    repo.reindex_children();

    for &idx in new_order.iter().chain(outside_children.iter()) {
        drop_unreachable_fileops(repo, idx, warnings);
    }

    topo_sort(repo);
    Ok(())
}

fn drop_unreachable_fileops(repo: &mut Repository, idx: EventIndex, warnings: &WarningSink) {
    let parent = repo.event(idx).and_then(Event::as_commit).and_then(|c| c.first_parent());
    let parent_manifest = parent.map(|p| repo.manifest_of(p)).unwrap_or_default();
    let Some(Event::Commit(commit)) = repo.event_mut(idx) else { return };
    let original = std::mem::take(&mut commit.fileops);
    let mut kept = Vec::with_capacity(original.len());
    for op in original {
        let visible = match &op {
            FileOp::Delete { path } | FileOp::Rename { src: path, .. } | FileOp::Copy { src: path, .. } => parent_manifest.contains_key(path),
            _ => true,
        };
        if visible {
            kept.push(op);
        } else {
            warnings.warn(format!("reorder: dropping fileop on path no longer visible after reordering: {:?}", op.paths()));
        }
    }
    commit.fileops = kept;
    commit.invalidate_manifest();
}

/// Shared with `reparent`, which can also leave parent pointers
/// referencing a later-indexed event and needs the same re-sort.
pub(crate) fn topo_sort(repo: &mut Repository) {
    let commit_positions: Vec<EventIndex> = repo.events().iter().enumerate().filter(|(_, e)| matches!(e, Event::Commit(_))).map(|(i, _)| i).collect();
    if commit_positions.len() <= 1 {
        return;
    }
    let commit_set: HashSet<EventIndex> = commit_positions.iter().copied().collect();

    let mut indegree: HashMap<EventIndex, usize> = HashMap::new();
    let mut children_map: HashMap<EventIndex, Vec<EventIndex>> = HashMap::new();
    for &idx in &commit_positions {
        let parents = repo.event(idx).and_then(Event::as_commit).map(|c| c.parents.clone()).unwrap_or_default();
        let deg = parents.iter().filter(|p| commit_set.contains(p)).count();
        indegree.insert(idx, deg);
        for p in parents {
            if commit_set.contains(&p) {
                children_map.entry(p).or_default().push(idx);
            }
        }
    }

    let mut queue: VecDeque<EventIndex> = commit_positions.iter().copied().filter(|i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(commit_positions.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        if let Some(kids) = children_map.get(&i) {
            for &k in kids {
                let d = indegree.get_mut(&k).unwrap();
                *d -= 1;
                if *d == 0 {
                    queue.push_back(k);
                }
            }
        }
    }
    if order.len() != commit_positions.len() {
        return;
    }

    let mut full_remap: HashMap<EventIndex, EventIndex> = (0..repo.len()).map(|i| (i, i)).collect();
    for (&slot, &old_idx) in commit_positions.iter().zip(order.iter()) {
        full_remap.insert(old_idx, slot);
    }

    let mut new_events = repo.events().to_vec();
    for (&slot, &old_idx) in commit_positions.iter().zip(order.iter()) {
        new_events[slot] = repo.events()[old_idx].clone();
    }
    for event in &mut new_events {
        if let Event::Commit(c) = event {
            c.parents = c.parents.iter().map(|p| full_remap[p]).collect();
            c.children.clear();
        }
    }
    repo.set_events(new_events);
    repo.reindex_children();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribution, Commit, Date};

    fn attr() -> Attribution {
        Attribution::new("U", "u@x", Date::new(0, 0))
    }

    #[test]
    fn reorder_swaps_two_adjacent_commits() {
        let mut repo = Repository::new("r");
        let i0 = repo.push(Event::Commit(Commit::new("refs/heads/master", attr())));
        let mut c1 = Commit::new("refs/heads/master", attr());
        c1.parents.push(i0);
        let i1 = repo.push(Event::Commit(c1));
        let mut c2 = Commit::new("refs/heads/master", attr());
        c2.parents.push(i1);
        let i2 = repo.push(Event::Commit(c2));
        repo.reindex_children();

        let warnings = WarningSink::new(true);
        reorder(&mut repo, &[i1, i2], &[1, 0], &warnings).unwrap();

        let commits: Vec<&Commit> = repo.events().iter().filter_map(|e| e.as_commit()).collect();
        assert_eq!(commits.len(), 3);
    }

    #[test]
    fn reorder_rejects_chain_with_extra_merge_parent() {
        let mut repo = Repository::new("r");
        let i0 = repo.push(Event::Commit(Commit::new("refs/heads/master", attr())));
        let side = repo.push(Event::Commit(Commit::new("refs/heads/master", attr())));
        let mut c1 = Commit::new("refs/heads/master", attr());
        c1.parents.push(i0);
        c1.parents.push(side);
        let i1 = repo.push(Event::Commit(c1));
        let mut c2 = Commit::new("refs/heads/master", attr());
        c2.parents.push(i1);
        let i2 = repo.push(Event::Commit(c2));
        repo.reindex_children();

        let warnings = WarningSink::new(true);
        // i1 is a merge commit inside the chain: i0 is not its only parent.
        assert!(reorder(&mut repo, &[i0, i1, i2], &[2, 1, 0], &warnings).is_err());
    }

    #[test]
    fn reorder_rejects_non_chain() {
        let mut repo = Repository::new("r");
        let i0 = repo.push(Event::Commit(Commit::new("refs/heads/master", attr())));
        let i1 = repo.push(Event::Commit(Commit::new("refs/heads/master", attr())));
        let warnings = WarningSink::new(true);
        assert!(reorder(&mut repo, &[i0, i1], &[1, 0], &warnings).is_err());
    }
}
