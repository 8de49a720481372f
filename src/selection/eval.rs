//! Evaluator for the selection-set sublanguage (spec §4.6). An `Expr`
//! compiles to a pure function over `(state = event vector, preselection)`;
//! composition narrows the preselection rather than recomputing from
//! scratch, so `A & B` evaluates `B` already restricted to `A`'s result.

use regex::Regex;

use crate::containers::OrderedIntSet;
use crate::model::{Event, EventIndex, FileOp};
use crate::repository::Repository;

use super::parser::{Expr, PathMatcher};

pub fn evaluate(expr: &Expr, repo: &mut Repository, preselection: &OrderedIntSet) -> anyhow::Result<OrderedIntSet> {
    match expr {
        Expr::All => Ok(preselection.clone()),
        Expr::Int(n) => {
            let idx = (*n - 1).max(0) as i64;
            Ok(singleton_if_in(idx, preselection, repo.len()))
        }
        Expr::Last => {
            let idx = repo.len() as i64 - 1;
            Ok(singleton_if_in(idx, preselection, repo.len()))
        }
        Expr::Range(lo, hi) => {
            let lo = eval_index(lo, repo)?;
            let hi = eval_index(hi, repo)?;
            let mut set = OrderedIntSet::new();
            for i in lo..=hi {
                if preselection.contains(i) {
                    set.insert(i);
                }
            }
            Ok(set)
        }
        Expr::Mark(n) => {
            let mark = format!(":{n}");
            match repo.index_of_mark(&mark) {
                Some(idx) => Ok(singleton_if_in(idx as i64, preselection, repo.len())),
                None => Ok(OrderedIntSet::new()),
            }
        }
        Expr::Named(name, ordinal) => {
            let full = match ordinal {
                Some(k) => format!("{name}#{k}"),
                None => name.clone(),
            };
            let matches = repo.named(&full);
            let mut set = OrderedIntSet::new();
            for idx in matches {
                if preselection.contains(idx as i64) {
                    set.insert(idx as i64);
                }
            }
            Ok(set)
        }
        Expr::Regex(pattern, flags) => {
            let re = Regex::new(pattern).map_err(|e| anyhow::anyhow!("bad selection regex /{pattern}/: {e}"))?;
            let mut set = OrderedIntSet::new();
            for idx in preselection.iter() {
                if matches_regex_fields(repo, idx as usize, &re, flags) {
                    set.insert(idx);
                }
            }
            Ok(set)
        }
        Expr::PathSet(matcher) => {
            let mut set = OrderedIntSet::new();
            for idx in preselection.iter() {
                if let Some(Event::Commit(c)) = repo.event(idx as usize) {
                    if commit_touches_path(c, matcher)? {
                        set.insert(idx);
                    }
                }
            }
            Ok(set)
        }
        Expr::Visibility(flag) => {
            let mut set = OrderedIntSet::new();
            for idx in preselection.iter() {
                if matches_visibility(repo, idx as usize, *flag) {
                    set.insert(idx);
                }
            }
            Ok(set)
        }
        Expr::Union(a, b) => {
            let sa = evaluate(a, repo, preselection)?;
            let sb = evaluate(b, repo, preselection)?;
            Ok(sa.union(&sb))
        }
        Expr::Intersect(a, b) => {
            let sa = evaluate(a, repo, preselection)?;
            evaluate(b, repo, &sa)
        }
        Expr::Complement(a) => {
            let sa = evaluate(a, repo, preselection)?;
            Ok(preselection.subtract(&sa))
        }
        Expr::Neighborhood(a) => {
            let sa = evaluate(a, repo, preselection)?;
            Ok(neighborhood(repo, &sa, preselection))
        }
        Expr::Call(name, arg) => {
            let sa = evaluate(arg, repo, preselection)?;
            evaluate_function(name, repo, &sa, preselection)
        }
    }
}

fn singleton_if_in(idx: i64, preselection: &OrderedIntSet, len: usize) -> OrderedIntSet {
    let mut set = OrderedIntSet::new();
    if idx >= 0 && (idx as usize) < len && preselection.contains(idx) {
        set.insert(idx);
    }
    set
}

fn eval_index(expr: &Expr, repo: &mut Repository) -> anyhow::Result<i64> {
    match expr {
        Expr::Int(n) => Ok(*n - 1),
        Expr::Last => Ok(repo.len() as i64 - 1),
        Expr::Mark(n) => {
            let mark = format!(":{n}");
            repo.index_of_mark(&mark)
                .map(|i| i as i64)
                .ok_or_else(|| anyhow::anyhow!("unknown mark :{n}"))
        }
        other => anyhow::bail!("expected an event index in range endpoint, found {other:?}"),
    }
}

fn matches_regex_fields(repo: &Repository, idx: usize, re: &Regex, flags: &str) -> bool {
    let Some(event) = repo.event(idx) else { return false };
    let check_attribution = |name: &[u8], email: &[u8]| -> bool {
        re.is_match(&String::from_utf8_lossy(name)) || re.is_match(&String::from_utf8_lossy(email))
    };
    if flags.is_empty() {
        return re.is_match(&String::from_utf8_lossy(event.comment()));
    }
    let mut matched = false;
    for flag in flags.chars() {
        matched |= match (event, flag) {
            (Event::Commit(c), 'c') => re.is_match(&String::from_utf8_lossy(&c.comment)),
            (Event::Commit(c), 'a') => c.authors.iter().any(|a| check_attribution(&a.name, &a.email)),
            (Event::Commit(c), 'C') => check_attribution(&c.committer.name, &c.committer.email),
            (Event::Tag(t), 'b') => {
                // tags follow the committish (target commit) for field searches.
                if let Some((_, target)) = find_commit_by_mark(repo, &t.committish) {
                    check_attribution(&target.committer.name, &target.committer.email)
                } else {
                    false
                }
            }
            (_, 'r') => re.is_match(&String::from_utf8_lossy(event.comment())),
            _ => false,
        };
    }
    matched
}

fn find_commit_by_mark<'a>(repo: &'a Repository, mark: &str) -> Option<(EventIndex, &'a crate::model::Commit)> {
    repo.events().iter().enumerate().find_map(|(i, e)| match e {
        Event::Commit(c) if c.mark.as_deref() == Some(mark) => Some((i, c)),
        _ => None,
    })
}

fn commit_touches_path(commit: &crate::model::Commit, matcher: &PathMatcher) -> anyhow::Result<bool> {
    for op in &commit.fileops {
        for path in op.paths() {
            let path_str = path.to_string();
            let hit = match matcher {
                PathMatcher::Literal(p) => &path_str == p,
                PathMatcher::Regex(pattern, _flags) => {
                    Regex::new(pattern).map_err(|e| anyhow::anyhow!("bad path regex /{pattern}/: {e}"))?.is_match(&path_str)
                }
            };
            if hit {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn matches_visibility(repo: &Repository, idx: usize, flag: char) -> bool {
    let Some(event) = repo.event(idx) else { return false };
    match flag {
        'B' => matches!(event, Event::Blob(_)),
        'C' => matches!(event, Event::Commit(_)),
        'T' => matches!(event, Event::Tag(_)),
        'R' => matches!(event, Event::Reset(_)),
        'P' => matches!(event, Event::Passthrough(_)),
        'O' => matches!(event, Event::Commit(c) if c.parents.is_empty()),
        'H' => matches!(event, Event::Commit(c) if c.children.is_empty()),
        'U' => matches!(event, Event::Commit(c) if c.parents.iter().any(|&p| matches!(repo.event(p), Some(Event::Callout(_))))),
        'Z' => matches!(event, Event::Commit(c) if c.fileops.is_empty()),
        'M' => matches!(event, Event::Commit(c) if c.parents.len() > 1),
        'F' => matches!(event, Event::Commit(c) if c.children.len() > 1),
        'L' => matches!(event, Event::Commit(c) if !c.comment.is_empty() && !c.comment.ends_with(b"\n")),
        'I' => !event.is_decodable(),
        'D' => matches!(event, Event::Commit(c) if !c.fileops.is_empty() && c.fileops.iter().all(|op| matches!(op, FileOp::Delete { .. } | FileOp::DeleteAll))),
        'N' => matches!(event, Event::Commit(c) if c.legacy_id.is_some()),
        _ => false,
    }
}

/// `?`: add immediate parents/children, resolve tag/reset targets, add
/// commits whose fileops reference a blob in the set; remove the blobs
/// themselves; then sort (spec §4.6).
fn neighborhood(repo: &mut Repository, set: &OrderedIntSet, preselection: &OrderedIntSet) -> OrderedIntSet {
    let mut out = set.clone();
    let mut blob_marks = std::collections::HashSet::new();
    for idx in set.iter() {
        match repo.event(idx as usize) {
            Some(Event::Commit(c)) => {
                for &p in &c.parents {
                    out.insert(p as i64);
                }
                for &ch in &c.children {
                    out.insert(ch as i64);
                }
            }
            Some(Event::Tag(t)) => {
                if let Some((i, _)) = find_commit_by_mark(repo, &t.committish) {
                    out.insert(i as i64);
                }
            }
            Some(Event::Reset(r)) => {
                if let Some(committish) = &r.committish {
                    if let Some((i, _)) = find_commit_by_mark(repo, committish) {
                        out.insert(i as i64);
                    }
                }
            }
            Some(Event::Blob(b)) => {
                if let Some(mark) = &b.mark {
                    blob_marks.insert(mark.clone());
                }
            }
            _ => {}
        }
    }
    if !blob_marks.is_empty() {
        for (i, event) in repo.events().iter().enumerate() {
            if let Event::Commit(c) = event {
                let touches = c.fileops.iter().any(|op| match op {
                    FileOp::Modify { file_ref, .. } | FileOp::Note { file_ref, .. } => {
                        matches!(file_ref, crate::model::FileRef::Mark(m) if blob_marks.contains(m))
                    }
                    _ => false,
                });
                if touches {
                    out.insert(i as i64);
                }
            }
        }
    }
    out = out.subtract(&OrderedIntSet::from_iter(set.iter().filter(|&i| matches!(repo.event(i as usize), Some(Event::Blob(_))))));
    let mut filtered = OrderedIntSet::new();
    for i in out.sorted() {
        if preselection.contains(i) {
            filtered.insert(i);
        }
    }
    filtered
}

fn evaluate_function(
    name: &str,
    repo: &mut Repository,
    arg: &OrderedIntSet,
    preselection: &OrderedIntSet,
) -> anyhow::Result<OrderedIntSet> {
    match name {
        "min" => Ok(arg.min().map(OrderedIntSet::from_iter_one).unwrap_or_default()),
        "max" => Ok(arg.max().map(OrderedIntSet::from_iter_one).unwrap_or_default()),
        "amp" => {
            // amplify: include everything between min and max of the set.
            let (Some(lo), Some(hi)) = (arg.min(), arg.max()) else {
                return Ok(OrderedIntSet::new());
            };
            let mut out = OrderedIntSet::new();
            for i in lo..=hi {
                if preselection.contains(i) {
                    out.insert(i);
                }
            }
            Ok(out)
        }
        "pre" => Ok(relatives(repo, arg, preselection, Direction::Parents, 1)),
        "suc" => Ok(relatives(repo, arg, preselection, Direction::Children, 1)),
        "anc" => Ok(relatives(repo, arg, preselection, Direction::Parents, usize::MAX)),
        "dsc" => Ok(relatives(repo, arg, preselection, Direction::Children, usize::MAX)),
        "srt" => Ok(OrderedIntSet::from_iter(arg.sorted())),
        "rev" => Ok(OrderedIntSet::from_iter(arg.sorted().into_iter().rev())),
        "chn" => Ok(arg.clone()),
        "par" => Ok(relatives(repo, arg, preselection, Direction::Parents, 1)),
        other => anyhow::bail!("unknown selection function @{other}"),
    }
}

enum Direction {
    Parents,
    Children,
}

fn relatives(repo: &Repository, seeds: &OrderedIntSet, preselection: &OrderedIntSet, dir: Direction, depth: usize) -> OrderedIntSet {
    let mut out = OrderedIntSet::new();
    let mut frontier: Vec<i64> = seeds.iter().collect();
    let mut visited: std::collections::HashSet<i64> = frontier.iter().copied().collect();
    let mut remaining = depth;
    while remaining > 0 && !frontier.is_empty() {
        let mut next = Vec::new();
        for idx in &frontier {
            if let Some(Event::Commit(c)) = repo.event(*idx as usize) {
                let links: &[EventIndex] = match dir {
                    Direction::Parents => &c.parents,
                    Direction::Children => &c.children,
                };
                for &l in links {
                    let l = l as i64;
                    if visited.insert(l) && preselection.contains(l) {
                        out.insert(l);
                        next.push(l);
                    }
                }
            }
        }
        frontier = next;
        remaining = remaining.saturating_sub(1);
    }
    out
}

impl OrderedIntSet {
    fn from_iter_one(v: i64) -> Self {
        let mut s = OrderedIntSet::new();
        s.insert(v);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribution, Commit, Date};

    fn attr() -> Attribution {
        Attribution::new("U", "u@x", Date::new(0, 0))
    }

    fn sample_repo() -> Repository {
        let mut repo = Repository::new("r");
        let mut c1 = Commit::new("refs/heads/master", attr());
        c1.mark = Some(":1".to_string());
        let i1 = repo.push(Event::Commit(c1));
        let mut c2 = Commit::new("refs/heads/master", attr());
        c2.mark = Some(":2".to_string());
        c2.parents.push(i1);
        repo.push(Event::Commit(c2));
        repo.reindex_children();
        repo
    }

    fn all(repo: &Repository) -> OrderedIntSet {
        OrderedIntSet::from_iter((0..repo.len() as i64).collect::<Vec<_>>())
    }

    #[test]
    fn integer_literal_selects_one_origin_index() {
        let mut repo = sample_repo();
        let pre = all(&repo);
        let expr = Expr::Int(1);
        let result = evaluate(&expr, &mut repo, &pre).unwrap();
        assert_eq!(result.sorted(), vec![0]);
    }

    #[test]
    fn dollar_selects_last_event() {
        let mut repo = sample_repo();
        let pre = all(&repo);
        let result = evaluate(&Expr::Last, &mut repo, &pre).unwrap();
        assert_eq!(result.sorted(), vec![1]);
    }

    #[test]
    fn complement_is_relative_to_preselection() {
        let mut repo = sample_repo();
        let pre = all(&repo);
        let result = evaluate(&Expr::Complement(Box::new(Expr::Int(1))), &mut repo, &pre).unwrap();
        assert_eq!(result.sorted(), vec![1]);
    }

    #[test]
    fn mark_reference_resolves_index() {
        let mut repo = sample_repo();
        let pre = all(&repo);
        let result = evaluate(&Expr::Mark(2), &mut repo, &pre).unwrap();
        assert_eq!(result.sorted(), vec![1]);
    }

    #[test]
    fn neighborhood_adds_adjacent_commits() {
        let mut repo = sample_repo();
        let pre = all(&repo);
        let result = evaluate(&Expr::Neighborhood(Box::new(Expr::Int(1))), &mut repo, &pre).unwrap();
        assert_eq!(result.sorted(), vec![0, 1]);
    }

    #[test]
    fn neighborhood_always_drops_blobs_from_the_set() {
        let mut repo = Repository::new("r");
        let (mark, blob) = repo.new_blob(b"x".to_vec(), bstr::BString::from("a"));
        let blob_idx = repo.push(Event::Blob(blob));
        let mut c1 = Commit::new("refs/heads/master", attr());
        c1.mark = Some(":1".to_string());
        c1.fileops.push(FileOp::Modify {
            mode: 0o100644,
            file_ref: crate::model::FileRef::Mark(mark),
            path: bstr::BString::from("a"),
        });
        repo.push(Event::Commit(c1));
        repo.reindex_children();

        // Preselecting the blob itself means `!preselection.contains(i)`
        // would be false, which previously let it survive the subtract.
        let pre = all(&repo);
        let seed = OrderedIntSet::from_iter(vec![blob_idx as i64]);
        let result = neighborhood(&mut repo, &seed, &pre);
        assert!(!result.sorted().contains(&(blob_idx as i64)));
    }

    #[test]
    fn max_function_returns_highest_index() {
        let mut repo = sample_repo();
        let pre = all(&repo);
        let result = evaluate(&Expr::Call("max".to_string(), Box::new(Expr::All)), &mut repo, &pre).unwrap();
        assert_eq!(result.sorted(), vec![1]);
    }
}
