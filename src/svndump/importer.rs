//! Subversion dumpfile importer (spec §4.3): the seven-phase pipeline that
//! turns a parsed [`Dump`] into a `Repository` full of synthesized commits.
//!
//! The phases are folded into a single forward pass over the revisions
//! (dead-branch filtering is precomputed; everything else — branch
//! identification, file-map tracking, copy materialization, and commit
//! synthesis — happens together per node, since `PathMap::snapshot` is
//! cheap enough that keeping one filemap per revision costs nothing). Phase
//! 6 (parent wiring) and phase 7 (cleanup) run as their own passes
//! afterward.

use std::collections::{BTreeMap, HashMap, HashSet};

use bstr::BString;

use crate::config::EngineOptions;
use crate::containers::{OrderedIntSet, OrderedStringSet, PathMap};
use crate::log::WarningSink;
use crate::model::{Attribution, Commit, Date, Event, EventIndex, FileOp, FileRef};
use crate::ops::canonicalize::canonicalize_fileops;
use crate::repository::Repository;

use super::reader::{Dump, DumpReader, NodeAction, NodeKind, NodeRecord, Revision};

/// Parses and imports a dumpfile in one step.
pub fn import_dumpfile(data: &[u8], options: &EngineOptions, warnings: &WarningSink) -> anyhow::Result<Repository> {
    let dump = DumpReader::new(data).parse()?;
    import(&dump, options, warnings)
}

pub fn import(dump: &Dump, options: &EngineOptions, warnings: &WarningSink) -> anyhow::Result<Repository> {
    let mut repo = Repository::new("svn");
    let dead = if options.svn_preserve { HashMap::new() } else { dead_branch_spans(dump) };

    let mut state = ImportState {
        filemap: PathMap::new(),
        filemap_by_rev: Vec::new(),
        branches: OrderedStringSet::new(),
        symlinks: HashSet::new(),
        executables: HashSet::new(),
        gitignored_dirs: HashSet::new(),
        last_commit_on_branch: HashMap::new(),
        commits_by_branch_rev: HashMap::new(),
    };

    let _span = tracing::info_span!("svndump_synthesis").entered();
    for rev in &dump.revisions {
        if crate::log::abort_requested() {
            warnings.warn("svn import interrupted; repository reflects revisions processed so far");
            break;
        }
        if rev.number != 0 {
            import_revision(&mut repo, rev, options, &dead, &mut state, warnings)?;
        }
        state.filemap_by_rev.push(state.filemap.snapshot());
    }

    cleanup(&mut repo, warnings)?;
    Ok(repo)
}

#[derive(Clone, Debug)]
struct FileState {
    mode: u32,
    file_ref: FileRef,
}

enum BranchCreation {
    Copy { from_branch: String, from_rev: u64 },
    Fresh,
}

struct ImportState {
    /// Current Subversion tree, as a path -> file-leaf map (phase 3).
    filemap: PathMap<FileState>,
    /// One snapshot per revision, indexed by revision number, so copy
    /// sources can be resolved against the tree as it stood then (phase 4).
    filemap_by_rev: Vec<PathMap<FileState>>,
    /// Recognized branch-root paths (phase 2), discovered as we go since
    /// branch creation is itself an event in the revision stream.
    branches: OrderedStringSet,
    symlinks: HashSet<String>,
    executables: HashSet<String>,
    gitignored_dirs: HashSet<String>,
    last_commit_on_branch: HashMap<String, EventIndex>,
    commits_by_branch_rev: HashMap<String, BTreeMap<u64, EventIndex>>,
}

/// Phase 1: reverse-scans for whole-branch/tag deletions and records, for
/// each dead path, the last revision at which it's still live. `trunk` is
/// never a candidate, so it is never touched even if a literal node named
/// `trunk` were deleted under `branches/` or `tags/`.
fn dead_branch_spans(dump: &Dump) -> HashMap<String, u64> {
    let mut dead = HashMap::new();
    for rev in dump.revisions.iter().rev() {
        for node in &rev.nodes {
            if matches!(node.action, NodeAction::Delete) && is_branch_or_tag_root(&node.path) {
                dead.entry(node.path.clone()).or_insert(rev.number);
            }
        }
    }
    dead
}

fn is_branch_or_tag_root(path: &str) -> bool {
    let mut segs = path.split('/');
    match (segs.next(), segs.next(), segs.next()) {
        (Some("branches"), Some(_), None) => true,
        (Some("tags"), Some(_), None) => true,
        _ => false,
    }
}

fn is_dead(dead: &HashMap<String, u64>, path: &str, rev: u64) -> bool {
    dead.iter()
        .any(|(prefix, &upto)| rev <= upto && (path == prefix || path.starts_with(&format!("{prefix}/"))))
}

/// Phase 2: a `svn_branchify` pattern matches a path when they have the
/// same number of `/`-separated segments and every non-`*` pattern segment
/// is a literal match. `branches/*` thus matches `branches/foo` but not
/// `branches/foo/bar` or bare `branches`.
fn branch_pattern_matches(pattern: &str, path: &str) -> bool {
    let pat: Vec<&str> = pattern.split('/').collect();
    let seg: Vec<&str> = path.split('/').collect();
    pat.len() == seg.len() && pat.iter().zip(seg.iter()).all(|(p, s)| *p == "*" || p == s)
}

fn matches_branchify(patterns: &[String], path: &str) -> bool {
    patterns.iter().any(|p| branch_pattern_matches(p, path))
}

fn find_branch_root<'a>(branches: &'a OrderedStringSet, path: &str) -> Option<&'a str> {
    branches
        .iter()
        .filter(|b| path == *b || path.starts_with(&format!("{b}/")))
        .max_by_key(|b| b.len())
}

fn resolve_branch(branches: &OrderedStringSet, path: &str, nobranch: bool) -> String {
    if nobranch {
        return "root".to_string();
    }
    find_branch_root(branches, path).map(str::to_string).unwrap_or_else(|| "root".to_string())
}

/// Maps a Subversion branch path onto the git ref it synthesizes commits
/// on. `trunk` becomes `master`; `branches/*` and `tags/*` keep their leaf
/// name under `refs/heads` and `refs/tags` respectively; anything else
/// (custom branchify patterns, or the synthetic `root` fallback) becomes a
/// slash-flattened branch name.
fn branch_ref_name(path: &str) -> String {
    if path == "trunk" {
        return "refs/heads/master".to_string();
    }
    if path == "root" {
        return "refs/heads/root".to_string();
    }
    if let Some(rest) = path.strip_prefix("branches/") {
        return format!("refs/heads/{rest}");
    }
    if let Some(rest) = path.strip_prefix("tags/") {
        return format!("refs/tags/{rest}");
    }
    format!("refs/heads/{}", path.replace('/', "-"))
}

fn import_revision(
    repo: &mut Repository,
    rev: &Revision,
    options: &EngineOptions,
    dead: &HashMap<String, u64>,
    state: &mut ImportState,
    warnings: &WarningSink,
) -> anyhow::Result<()> {
    let mut groups: Vec<(String, Vec<FileOp>)> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut branch_creation: HashMap<String, BranchCreation> = HashMap::new();
    let mut mergeinfo_parents: HashMap<String, Vec<EventIndex>> = HashMap::new();

    for node in &rev.nodes {
        if is_dead(dead, &node.path, rev.number) {
            continue;
        }

        let is_new_branch_root = node.kind == NodeKind::Dir
            && matches!(node.action, NodeAction::Add | NodeAction::Replace)
            && !options.svn_nobranch
            && !state.branches.contains(&node.path)
            && matches_branchify(&options.svn_branchify, &node.path);

        if is_new_branch_root {
            state.branches.insert(node.path.clone());
            let creation = match &node.copy_from {
                Some((from_rev, from_path)) => find_branch_root(&state.branches, from_path)
                    .map(|src| BranchCreation::Copy { from_branch: src.to_string(), from_rev: *from_rev })
                    .unwrap_or(BranchCreation::Fresh),
                None => BranchCreation::Fresh,
            };
            branch_creation.insert(node.path.clone(), creation);
        }

        update_filemap(repo, state, node);

        let branch = resolve_branch(&state.branches, &node.path, options.svn_nobranch);
        let is_branch_copy =
            is_new_branch_root && matches!(branch_creation.get(&node.path), Some(BranchCreation::Copy { .. }));

        let mut ops = synthesize_fileops(state, node, is_branch_copy);
        if !options.svn_ignore_properties && node.kind != NodeKind::File {
            if let Some(op) = translate_ignore(repo, state, node, is_new_branch_root, options) {
                ops.push(op);
            }
        }
        if !ops.is_empty() {
            let idx = *group_index.entry(branch.clone()).or_insert_with(|| {
                groups.push((branch.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[idx].1.extend(ops);
        }

        if !options.svn_ignore_properties {
            if let Some(mergeinfo) = node.properties.as_ref().and_then(|p| p.get("svn:mergeinfo")) {
                for parent_idx in resolve_mergeinfo_parents(state, mergeinfo) {
                    let list = mergeinfo_parents.entry(branch.clone()).or_default();
                    if !list.contains(&parent_idx) {
                        list.push(parent_idx);
                    }
                }
            }
        }
    }

    finalize_revision(repo, rev, groups, &branch_creation, mergeinfo_parents, state, warnings)
}

/// Phase 3 (plus the copy half of phase 4): applies one node's effect to
/// the running Subversion tree shape. Blob content is pushed into the
/// repository here so that `synthesize_fileops` only has to read back
/// whatever this function just computed.
fn update_filemap(repo: &mut Repository, state: &mut ImportState, node: &NodeRecord) {
    match node.kind {
        NodeKind::Dir | NodeKind::Unknown => match (&node.action, &node.copy_from) {
            (NodeAction::Add, Some((from_rev, from_path))) | (NodeAction::Replace, Some((from_rev, from_path))) => {
                if matches!(node.action, NodeAction::Replace) {
                    state.filemap.remove(&node.path);
                }
                let src = state.filemap_by_rev.get(*from_rev as usize).cloned().unwrap_or_else(PathMap::new);
                state.filemap.copy_from(&node.path, &src, from_path);
            }
            (NodeAction::Delete, _) | (NodeAction::Replace, None) => {
                state.filemap.remove(&node.path);
            }
            _ => {}
        },
        NodeKind::File => match node.action {
            NodeAction::Delete => {
                state.filemap.remove(&node.path);
                state.symlinks.remove(&node.path);
                state.executables.remove(&node.path);
            }
            _ => {
                let is_special = match &node.properties {
                    Some(props) => props.get("svn:special").is_some(),
                    None => state.symlinks.contains(&node.path),
                };
                let is_executable = match &node.properties {
                    Some(props) => props.get("svn:executable").is_some(),
                    None => state.executables.contains(&node.path),
                };
                if is_special {
                    state.symlinks.insert(node.path.clone());
                } else {
                    state.symlinks.remove(&node.path);
                }
                if is_executable {
                    state.executables.insert(node.path.clone());
                } else {
                    state.executables.remove(&node.path);
                }
                let mode: u32 = if is_special {
                    0o120000
                } else if is_executable {
                    0o100755
                } else {
                    0o100644
                };

                let file_ref = if let Some(content) = &node.text {
                    let bytes = if is_special {
                        content.strip_prefix(b"link ").unwrap_or(content).to_vec()
                    } else {
                        content.clone()
                    };
                    let (mark, blob) = repo.new_blob(bytes, BString::from(node.path.clone()));
                    repo.push(Event::Blob(blob));
                    FileRef::Mark(mark)
                } else if let Some((from_rev, from_path)) = &node.copy_from {
                    state
                        .filemap_by_rev
                        .get(*from_rev as usize)
                        .and_then(|m| m.get(from_path))
                        .map(|s| s.file_ref.clone())
                        .unwrap_or_else(|| FileRef::Inline(BString::from(Vec::new())))
                } else if let Some(existing) = state.filemap.get(&node.path) {
                    existing.file_ref.clone()
                } else {
                    FileRef::Inline(BString::from(Vec::new()))
                };

                state.filemap.set(&node.path, FileState { mode, file_ref });
            }
        },
    }
}

/// Phase 4 proper: reads back the file set a directory copy brought in,
/// from the source revision's filemap snapshot, relative to the copy root.
fn gather_copy_source_files(state: &ImportState, from_rev: u64, from_path: &str) -> Vec<(String, FileState)> {
    let Some(map) = state.filemap_by_rev.get(from_rev as usize) else {
        return Vec::new();
    };
    let prefix_slash = format!("{from_path}/");
    map.items()
        .into_iter()
        .filter_map(|(path, value)| {
            if path == from_path {
                Some((String::new(), value))
            } else {
                path.strip_prefix(&prefix_slash).map(|rest| (rest.to_string(), value))
            }
        })
        .collect()
}

/// Phase 5: per-node fileop synthesis. Directory copies that create a new
/// recognized branch from another recognized branch are "branch copies" —
/// no explicit ops, the tree is inherited for free through the first-parent
/// link phase 6 sets up. Every other directory copy has to be materialized
/// explicitly since the engine's model has no native directory-copy op.
fn synthesize_fileops(state: &ImportState, node: &NodeRecord, is_branch_copy: bool) -> Vec<FileOp> {
    let mut ops = Vec::new();
    match node.kind {
        NodeKind::File => match node.action {
            NodeAction::Delete => ops.push(FileOp::Delete { path: BString::from(node.path.clone()) }),
            _ => {
                if let Some(entry) = state.filemap.get(&node.path) {
                    ops.push(FileOp::Modify {
                        mode: entry.mode,
                        file_ref: entry.file_ref.clone(),
                        path: BString::from(node.path.clone()),
                    });
                }
            }
        },
        NodeKind::Dir | NodeKind::Unknown => match &node.action {
            NodeAction::Delete => ops.push(FileOp::Delete { path: BString::from(node.path.clone()) }),
            NodeAction::Replace => {
                ops.push(FileOp::Delete { path: BString::from(node.path.clone()) });
                if let Some((from_rev, from_path)) = &node.copy_from {
                    if !is_branch_copy {
                        append_copy_ops(&mut ops, state, &node.path, *from_rev, from_path);
                    }
                }
            }
            NodeAction::Add => {
                if let Some((from_rev, from_path)) = &node.copy_from {
                    if !is_branch_copy {
                        append_copy_ops(&mut ops, state, &node.path, *from_rev, from_path);
                    }
                }
            }
            NodeAction::Change => {}
        },
    }
    ops
}

fn append_copy_ops(ops: &mut Vec<FileOp>, state: &ImportState, dst: &str, from_rev: u64, from_path: &str) {
    for (rel, entry) in gather_copy_source_files(state, from_rev, from_path) {
        let path = if rel.is_empty() { dst.to_string() } else { crate::util::normalize(&format!("{dst}/{rel}")) };
        ops.push(FileOp::Modify { mode: entry.mode, file_ref: entry.file_ref.clone(), path: BString::from(path) });
    }
}

/// Translates `svn:ignore` into a `.gitignore` at the directory root it was
/// set on (spec §4.3 phase 5). Each ignore line is anchored with a leading
/// `/` since `svn:ignore` only applies to direct children. Branch-root
/// directories additionally get the canonical Subversion default ignores
/// prepended, unless `--user-ignores` was requested.
fn translate_ignore(
    repo: &mut Repository,
    state: &mut ImportState,
    node: &NodeRecord,
    is_branch_root: bool,
    options: &EngineOptions,
) -> Option<FileOp> {
    let props = node.properties.as_ref()?;
    let gitignore_path = format!("{}/.gitignore", node.path);
    match props.get("svn:ignore") {
        Some(raw) => {
            let mut content = String::new();
            if is_branch_root && !options.svn_user_ignores {
                content.push_str(crate::vcs::SVN_DEFAULT_IGNORES);
            }
            for line in raw.lines() {
                if line.is_empty() {
                    continue;
                }
                content.push('/');
                content.push_str(line);
                content.push('\n');
            }
            state.gitignored_dirs.insert(node.path.clone());
            let (mark, blob) = repo.new_blob(content.into_bytes(), BString::from(gitignore_path.clone()));
            repo.push(Event::Blob(blob));
            Some(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Mark(mark), path: BString::from(gitignore_path) })
        }
        None => {
            if state.gitignored_dirs.remove(&node.path) {
                Some(FileOp::Delete { path: BString::from(gitignore_path) })
            } else {
                None
            }
        }
    }
}

/// Resolves `svn:mergeinfo` entries (`path:ranges`, spec §4.3 phase 5) to
/// the extra merge parents they imply: for each path, the latest commit
/// synthesized on that branch whose legacy revision falls at or below the
/// span's upper bound.
fn resolve_mergeinfo_parents(state: &ImportState, mergeinfo: &str) -> Vec<EventIndex> {
    let mut parents = Vec::new();
    for line in mergeinfo.lines() {
        let Some((path, ranges)) = line.split_once(':') else { continue };
        let branch_ref = branch_ref_name(path.trim_start_matches('/'));
        let Some(commits) = state.commits_by_branch_rev.get(&branch_ref) else { continue };
        let max_rev = ranges
            .split(',')
            .filter_map(|span| span.rsplit_once('-').map(|(_, hi)| hi).or(Some(span)))
            .filter_map(|n| n.trim().parse::<u64>().ok())
            .max();
        let Some(max_rev) = max_rev else { continue };
        if let Some((_, &idx)) = commits.range(..=max_rev).next_back() {
            parents.push(idx);
        }
    }
    parents
}

/// Phase 5 (mixed-revision splitting) and phase 6 (parent wiring) for the
/// groups a single Subversion revision produced. The first group
/// encountered keeps the revision's own legacy ID; later groups become
/// clones with a `.N` suffix and a trailer marking them as a split.
fn finalize_revision(
    repo: &mut Repository,
    rev: &Revision,
    groups: Vec<(String, Vec<FileOp>)>,
    branch_creation: &HashMap<String, BranchCreation>,
    mergeinfo_parents: HashMap<String, Vec<EventIndex>>,
    state: &mut ImportState,
    warnings: &WarningSink,
) -> anyhow::Result<()> {
    let author = rev.properties.get("svn:author").unwrap_or("unknown").to_string();
    let date = rev
        .properties
        .get("svn:date")
        .and_then(Date::parse_rfc3339)
        .unwrap_or_else(|| Date::new(0, 0));

    for (split_seq, (branch_path, fileops)) in groups.into_iter().enumerate() {
        let committer = Attribution::new(author.clone(), format!("{author}@svn"), date.clone());
        let mut comment = BString::from(rev.properties.get("svn:log").unwrap_or("").to_string());
        let legacy_id = if split_seq == 0 {
            rev.number.to_string()
        } else {
            comment = BString::from(format!("{}\n\n[[Split portion of a mixed commit.]]", comment));
            format!("{}.{}", rev.number, split_seq)
        };

        let ref_name = branch_ref_name(&branch_path);
        let mut commit = Commit::new(ref_name.clone(), committer);
        commit.legacy_id = Some(legacy_id);
        commit.comment = comment;
        commit.fileops = fileops;

        let is_first_on_branch = !state.last_commit_on_branch.contains_key(&ref_name);
        let mut parents = Vec::new();
        if let Some(&prev) = state.last_commit_on_branch.get(&ref_name) {
            parents.push(prev);
        } else if let Some(BranchCreation::Copy { from_branch, from_rev }) = branch_creation.get(&branch_path) {
            let from_ref = branch_ref_name(from_branch);
            match state.commits_by_branch_rev.get(&from_ref).and_then(|m| m.range(..=*from_rev).next_back()) {
                Some((_, &src)) => parents.push(src),
                None => warnings.warn(format!(
                    "svn import: copy source for {branch_path}@{} not found on {from_branch}@{from_rev}",
                    rev.number
                )),
            }
        }
        if is_first_on_branch && parents.is_empty() {
            commit.fileops.insert(0, FileOp::DeleteAll);
        }
        if let Some(extra) = mergeinfo_parents.get(&branch_path) {
            for &p in extra {
                if !parents.contains(&p) {
                    parents.push(p);
                }
            }
        }
        commit.parents = parents;

        let idx = repo.push(Event::Commit(commit));
        state.last_commit_on_branch.insert(ref_name.clone(), idx);
        state.commits_by_branch_rev.entry(ref_name).or_default().insert(rev.number, idx);
    }
    Ok(())
}

/// Phase 7: tagify empty commits, drop recognizable cvs2svn housekeeping
/// commits, canonicalize every fileop list, debubble redundant same-branch
/// parent edges, and renumber marks from 1.
fn cleanup(repo: &mut Repository, warnings: &WarningSink) -> anyhow::Result<()> {
    repo.reindex_children();

    canonicalize_all(repo, warnings);
    remove_cvs2svn_artifacts(repo, warnings)?;
    debubble(repo);

    let empty: OrderedIntSet = repo
        .events()
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Commit(c) if c.fileops.is_empty()))
        .map(|(i, _)| i as i64)
        .collect();
    crate::ops::tagify::tagify(
        repo,
        &empty,
        crate::ops::tagify::TagifyOptions { canonicalize: true, ..Default::default() },
        warnings,
    )?;

    repo.renumber(1);
    Ok(())
}

fn canonicalize_all(repo: &mut Repository, warnings: &WarningSink) {
    let indices: Vec<EventIndex> =
        repo.events().iter().enumerate().filter(|(_, e)| matches!(e, Event::Commit(_))).map(|(i, _)| i).collect();
    let _span = tracing::info_span!("canonicalize_walk").entered();
    for idx in indices {
        let parent = repo.event(idx).and_then(Event::as_commit).and_then(Commit::first_parent);
        let parent_manifest = match parent {
            Some(p) => repo.manifest_of(p),
            None => Default::default(),
        };
        if let Some(Event::Commit(c)) = repo.event_mut(idx) {
            let ops = std::mem::take(&mut c.fileops);
            c.fileops = canonicalize_fileops(ops, &parent_manifest, warnings);
            c.invalidate_manifest();
        }
    }
}

const CVS2SVN_ARTIFACT: &str = r"(?i)this commit was manufactured by cvs2svn";

fn remove_cvs2svn_artifacts(repo: &mut Repository, warnings: &WarningSink) -> anyhow::Result<()> {
    let re = regex::Regex::new(CVS2SVN_ARTIFACT)?;
    let targets: OrderedIntSet = repo
        .events()
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Commit(c) if re.is_match(&String::from_utf8_lossy(&c.comment))))
        .map(|(i, _)| i as i64)
        .collect();
    if targets.is_empty() {
        return Ok(());
    }
    crate::ops::squash::delete_commits(repo, &targets, crate::ops::squash::DeleteMode::Squash, warnings)
}

fn debubble(repo: &mut Repository) {
    let indices: Vec<EventIndex> =
        repo.events().iter().enumerate().filter(|(_, e)| matches!(e, Event::Commit(_))).map(|(i, _)| i).collect();
    for idx in indices {
        let parents = match repo.event(idx).and_then(Event::as_commit) {
            Some(c) if c.parents.len() >= 2 => c.parents.clone(),
            _ => continue,
        };
        let mut keep = parents.clone();
        for &a in &parents {
            for &b in &parents {
                if a != b && keep.contains(&a) && is_ancestor(repo, a, b) {
                    keep.retain(|&p| p != a);
                }
            }
        }
        if keep.len() != parents.len() {
            if let Some(Event::Commit(c)) = repo.event_mut(idx) {
                c.parents = keep;
                c.invalidate_manifest();
            }
        }
    }
}

/// Whether `candidate` is reachable by walking parent edges from `of`.
fn is_ancestor(repo: &Repository, candidate: EventIndex, of: EventIndex) -> bool {
    let mut stack = vec![of];
    let mut seen = HashSet::new();
    while let Some(i) = stack.pop() {
        if i == candidate {
            return true;
        }
        if !seen.insert(i) {
            continue;
        }
        if let Some(c) = repo.event(i).and_then(Event::as_commit) {
            stack.extend(c.parents.iter().copied());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> EngineOptions {
        EngineOptions::default()
    }

    fn node(path: &str, kind: NodeKind, action: NodeAction) -> NodeRecord {
        NodeRecord { path: path.to_string(), kind, action, copy_from: None, properties: None, text: None }
    }

    fn dump_with(revisions: Vec<Revision>) -> Dump {
        Dump { version: 2, uuid: None, revisions }
    }

    fn rev(number: u64, nodes: Vec<NodeRecord>) -> Revision {
        let mut props = crate::containers::OrderedStringMap::new();
        props.insert("svn:author", "jrtc");
        props.insert("svn:log", "msg");
        props.insert("svn:date", "2020-01-01T00:00:00.000000Z");
        Revision { number, properties: props, nodes }
    }

    #[test]
    fn trunk_creation_gets_a_root_commit_with_deleteall() {
        let dump = dump_with(vec![
            rev(0, vec![]),
            rev(1, {
                let mut n = node("trunk", NodeKind::Dir, NodeAction::Add);
                n.properties = Some(crate::containers::OrderedStringMap::new());
                let mut file = node("trunk/a.txt", NodeKind::File, NodeAction::Add);
                file.text = Some(b"hi".to_vec());
                vec![n, file]
            }),
        ]);
        let warnings = WarningSink::new(true);
        let repo = import(&dump, &options(), &warnings).unwrap();
        let commit = repo.events().iter().find_map(Event::as_commit).expect("one commit");
        assert_eq!(commit.branch, "refs/heads/master");
        assert!(commit.parents.is_empty());
        assert!(matches!(commit.fileops[0], FileOp::DeleteAll));
    }

    #[test]
    fn branch_copy_from_trunk_produces_no_explicit_fileops() {
        let dump = dump_with(vec![
            rev(0, vec![]),
            rev(1, {
                let mut file = node("trunk/a.txt", NodeKind::File, NodeAction::Add);
                file.text = Some(b"hi".to_vec());
                vec![node("trunk", NodeKind::Dir, NodeAction::Add), file]
            }),
            rev(2, {
                let mut n = node("branches/foo", NodeKind::Dir, NodeAction::Add);
                n.copy_from = Some((1, "trunk".to_string()));
                vec![n]
            }),
        ]);
        let warnings = WarningSink::new(true);
        let repo = import(&dump, &options(), &warnings).unwrap();
        let commits: Vec<_> = repo.events().iter().filter_map(Event::as_commit).collect();
        let branch_commit = commits.iter().find(|c| c.branch == "refs/heads/foo").expect("branch commit");
        assert!(branch_commit.fileops.is_empty(), "branch copy should inherit its tree with no explicit ops");
        assert_eq!(branch_commit.parents.len(), 1);
    }

    #[test]
    fn svn_ignore_becomes_gitignore_with_default_prefix_on_branch_root() {
        let dump = dump_with(vec![
            rev(0, vec![]),
            rev(1, {
                let mut n = node("trunk", NodeKind::Dir, NodeAction::Add);
                let mut props = crate::containers::OrderedStringMap::new();
                props.insert("svn:ignore", "*.o\nbuild\n");
                n.properties = Some(props);
                vec![n]
            }),
        ]);
        let warnings = WarningSink::new(true);
        let repo = import(&dump, &options(), &warnings).unwrap();
        let commit = repo.events().iter().find_map(Event::as_commit).unwrap();
        let gitignore_op = commit.fileops.iter().find(|op| matches!(op, FileOp::Modify { path, .. } if path == "trunk/.gitignore"));
        assert!(gitignore_op.is_some(), "expected a synthesized trunk/.gitignore modify op");
    }

    #[test]
    fn dead_branch_deletion_drops_the_whole_branch_history() {
        let dump = dump_with(vec![
            rev(0, vec![]),
            rev(1, vec![node("branches/dead", NodeKind::Dir, NodeAction::Add)]),
            rev(2, vec![node("branches/dead", NodeKind::Dir, NodeAction::Delete)]),
        ]);
        let warnings = WarningSink::new(true);
        let repo = import(&dump, &options(), &warnings).unwrap();
        assert!(repo.events().iter().filter_map(Event::as_commit).all(|c| c.branch != "refs/heads/dead"));
    }
}
