//! Tagify (spec §4.4.7): converts empty commits into lightweight
//! annotated tags, splicing their children onto their own parents.

use std::collections::HashSet;

use crate::containers::OrderedIntSet;
use crate::log::WarningSink;
use crate::model::{Event, EventIndex, FileOp, Tag};
use crate::ops::canonicalize::canonicalize_fileops;
use crate::repository::Repository;

#[derive(Clone, Copy, Default)]
pub struct TagifyOptions {
    /// Relax the single-parent constraint so merge commits are eligible too.
    pub tagify_merges: bool,
    /// Also tagify a branch-tip commit whose fileops are entirely `deleteall`.
    pub tipdeletes: bool,
    /// Canonicalize first so trivially-empty commits (e.g. a no-op rename
    /// chain) are detected.
    pub canonicalize: bool,
}

pub fn tagify(repo: &mut Repository, selection: &OrderedIntSet, options: TagifyOptions, warnings: &WarningSink) -> anyhow::Result<()> {
    let mut candidates: Vec<EventIndex> = selection.sorted().into_iter().map(|i| i as usize).collect();
    candidates.sort_unstable();

    if options.canonicalize {
        for &idx in &candidates {
            let parent = repo.event(idx).and_then(Event::as_commit).and_then(|c| c.first_parent());
            let parent_manifest = parent.map(|p| repo.manifest_of(p)).unwrap_or_default();
            if let Some(Event::Commit(c)) = repo.event_mut(idx) {
                let ops = std::mem::take(&mut c.fileops);
                c.fileops = canonicalize_fileops(ops, &parent_manifest, warnings);
                c.invalidate_manifest();
            }
        }
    }

    let mut used_names: HashSet<String> = repo.events().iter().filter_map(|e| e.as_tag()).map(|t| t.name.clone()).collect();

    let mut removed = HashSet::new();
    let _span = tracing::info_span!("tagify_walk").entered();
    for &idx in &candidates {
        if crate::log::abort_requested() {
            break;
        }
        let Some(Event::Commit(commit)) = repo.event(idx) else { continue };
        let is_empty = commit.fileops.is_empty();
        let is_tipdelete = options.tipdeletes && commit.children.is_empty() && !commit.fileops.is_empty()
            && commit.fileops.iter().all(|op| matches!(op, FileOp::DeleteAll));
        let parent_count_ok = commit.parents.len() <= 1 || options.tagify_merges;
        if !parent_count_ok || !(is_empty || is_tipdelete) {
            continue;
        }

        let prefix = if is_tipdelete { format!("tipdelete-{}", commit.branch) } else { "emptycommit".to_string() };
        let suffix = commit.legacy_id.clone().or_else(|| commit.mark.clone()).unwrap_or_else(|| idx.to_string());
        let mut name = format!("{prefix}-{suffix}");
        while used_names.contains(&name) {
            name.push_str("-displaced");
        }
        used_names.insert(name.clone());

        let target = commit.first_parent().and_then(|p| repo.event(p)).and_then(Event::as_commit).and_then(|c| c.mark.clone());
        let Some(target) = target else {
            warnings.warn(format!("tagify: commit at index {idx} has no resolvable parent mark, skipping"));
            continue;
        };

        let tag = Tag {
            name,
            committish: target,
            tagger: commit.committer.clone(),
            comment: commit.comment.clone(),
            legacy_id: commit.legacy_id.clone(),
        };
        repo.push(Event::Tag(tag));
        splice_out(repo, idx);
        removed.insert(idx);
    }

    repo.remove_events(&removed);
    repo.reindex_children();
    Ok(())
}

fn splice_out(repo: &mut Repository, target: EventIndex) {
    let (parents, children) = {
        let Some(Event::Commit(c)) = repo.event(target) else { return };
        (c.parents.clone(), c.children.clone())
    };
    for &child in &children {
        if let Some(Event::Commit(c)) = repo.event_mut(child) {
            if let Some(pos) = c.parents.iter().position(|&p| p == target) {
                c.parents.splice(pos..pos + 1, parents.iter().copied());
                let mut seen = HashSet::new();
                c.parents.retain(|p| seen.insert(*p));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribution, Commit, Date};

    fn attr() -> Attribution {
        Attribution::new("U", "u@x", Date::new(0, 0))
    }

    #[test]
    fn empty_commit_becomes_tag_pointing_at_parent() {
        let mut repo = Repository::new("r");
        let mut c1 = Commit::new("refs/heads/master", attr());
        c1.mark = Some(":1".to_string());
        let i1 = repo.push(Event::Commit(c1));

        let mut c2 = Commit::new("refs/heads/master", attr());
        c2.parents.push(i1);
        c2.mark = Some(":2".to_string());
        let i2 = repo.push(Event::Commit(c2));
        repo.reindex_children();

        let selection = OrderedIntSet::from_iter(vec![i2 as i64]);
        let warnings = WarningSink::new(true);
        tagify(&mut repo, &selection, TagifyOptions::default(), &warnings).unwrap();

        let tags: Vec<_> = repo.events().iter().filter_map(|e| e.as_tag()).collect();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].committish, ":1".to_string());
        assert!(tags[0].name.starts_with("emptycommit-"));
    }
}
