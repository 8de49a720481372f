//! The event arena and its bookkeeping (spec §3.8/§3.9/§4.7): mark
//! allocation, the mark/name caches, manifest memoization, and the
//! sequence-mutation hook every structural operation must call.

use std::collections::HashMap;
use std::path::PathBuf;

use bstr::BString;

use crate::containers::OrderedStringSet;
use crate::model::{
    Attribution, Blob, BlobSource, Commit, Event, EventIndex, FileOp, FileRef, Manifest, ManifestEntry, Mark,
};

/// Owns the event vector plus the derived structures spec §3.8 names:
/// mark index, name cache, assignments, preserve-set, VCS hint list, and
/// UUID. `scratch_dir` is kept for API parity with spec §3.8 but unused:
/// this build never spills blob content to disk (see DESIGN.md).
pub struct Repository {
    pub name: String,
    events: Vec<Event>,
    /// `mark → index`; `None` means invalid and must be rebuilt (spec §3.9
    /// invariant 5 — caches either reflect the vector or are marked
    /// invalid, never silently stale).
    mark_index: Option<HashMap<Mark, EventIndex>>,
    /// Named index sets persisted across commands until invalidated by a
    /// sequence mutation (spec §3.8).
    pub assignments: HashMap<String, crate::containers::OrderedIntSet>,
    /// Paths restored after rebuild (spec §3.8/§6.3).
    pub preserve: OrderedStringSet,
    /// VCS types suggested by cookies/content, plus whether that hint is
    /// strong (spec §3.8).
    pub vcs_hints: Vec<String>,
    pub strong_hint: bool,
    pub uuid: Option<String>,
    pub scratch_dir: PathBuf,
    mark_counter: i64,
    blob_seq: u64,
}

impl Repository {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Repository {
            scratch_dir: PathBuf::from(format!(".rs{}-{}", std::process::id(), name)),
            name,
            events: Vec::new(),
            mark_index: Some(HashMap::new()),
            assignments: HashMap::new(),
            preserve: OrderedStringSet::new(),
            vcs_hints: Vec::new(),
            strong_hint: false,
            uuid: None,
            mark_counter: 0,
            blob_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event(&self, index: EventIndex) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn event_mut(&mut self, index: EventIndex) -> Option<&mut Event> {
        self.events.get_mut(index)
    }

    pub fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    /// Wholesale replacement of the event vector, used by operations
    /// (reorder) that must renumber indices throughout.
    pub fn set_events(&mut self, events: Vec<Event>) {
        self.events = events;
        self.sequence_mutated();
    }

    pub fn push(&mut self, event: Event) -> EventIndex {
        let index = self.events.len();
        self.events.push(event);
        self.sequence_mutated();
        index
    }

    /// The hook every structural mutation must call (spec §4.4 preamble):
    /// invalidates the mark index and (conservatively) all assignments,
    /// since an index shift anywhere can move what an assignment names.
    /// The name cache is recomputed on demand in `named`.
    pub fn sequence_mutated(&mut self) {
        self.mark_index = None;
    }

    /// As `sequence_mutated`, but keeps assignments intact — used by
    /// mutations the caller knows do not reorder or remove events (e.g.
    /// in-place fileop edits during canonicalize).
    pub fn sequence_mutated_preserving_assignments(&mut self) {
        self.mark_index = None;
    }

    fn ensure_mark_index(&mut self) {
        if self.mark_index.is_some() {
            return;
        }
        let mut index = HashMap::new();
        for (i, event) in self.events.iter().enumerate() {
            if let Some(mark) = event.mark() {
                index.insert(mark.to_string(), i);
            }
        }
        self.mark_index = Some(index);
    }

    pub fn index_of_mark(&mut self, mark: &str) -> Option<EventIndex> {
        self.ensure_mark_index();
        self.mark_index.as_ref().unwrap().get(mark).copied()
    }

    /// Monotonic counter; returns `:N` with N = ++counter (spec §4.7).
    pub fn newmark(&mut self) -> Mark {
        self.mark_counter += 1;
        format!(":{}", self.mark_counter)
    }

    pub fn next_blob_seq(&mut self) -> u64 {
        self.blob_seq += 1;
        self.blob_seq
    }

    /// Reassigns marks `:origin`, `:origin+1`, … in event order and
    /// rewrites every reference. At most one trailing `done` passthrough
    /// is kept (spec §4.7).
    pub fn renumber(&mut self, origin: i64) {
        let mut remap: HashMap<Mark, Mark> = HashMap::new();
        let mut counter = origin;
        for event in &mut self.events {
            let old = match event {
                Event::Blob(b) => b.mark.clone(),
                Event::Commit(c) => c.mark.clone(),
                _ => None,
            };
            if let Some(old) = old {
                let new = format!(":{counter}");
                counter += 1;
                remap.insert(old, new.clone());
                match event {
                    Event::Blob(b) => b.mark = Some(new),
                    Event::Commit(c) => c.mark = Some(new),
                    _ => {}
                }
            }
        }
        for event in &mut self.events {
            rewrite_refs(event, &remap);
        }
        self.mark_counter = counter - 1;

        let mut seen_done = false;
        self.events.retain(|event| {
            if let Event::Passthrough(p) = event {
                if p.text.trim() == "done" {
                    if seen_done {
                        return false;
                    }
                    seen_done = true;
                }
            }
            true
        });
        self.sequence_mutated();
    }

    /// Moves all events of `other` into `self`, preserving front-matter
    /// contiguity and remapping marks and parent/child indices (spec
    /// §4.7, used by unite/graft). Blobs carry their content inline in
    /// this build (see `BlobSource` and DESIGN.md), so there is no spill
    /// file to relocate.
    pub fn absorb(&mut self, other: Repository) -> Vec<EventIndex> {
        let offset = self.events.len() as i64;
        let mut remap: HashMap<Mark, Mark> = HashMap::new();
        let mut new_indices = Vec::with_capacity(other.events.len());
        let mut events = other.events;
        for event in &mut events {
            let old = match event {
                Event::Blob(b) => b.mark.clone(),
                Event::Commit(c) => c.mark.clone(),
                _ => None,
            };
            if let Some(old) = old {
                let new = self.newmark();
                remap.insert(old, new.clone());
                match event {
                    Event::Blob(b) => b.mark = Some(new),
                    Event::Commit(c) => c.mark = Some(new),
                    _ => {}
                }
            }
        }
        for event in &mut events {
            rewrite_refs(event, &remap);
            if let Event::Commit(c) = event {
                for p in &mut c.parents {
                    *p += offset as usize;
                }
                for ch in &mut c.children {
                    *ch += offset as usize;
                }
            }
        }
        for event in events {
            new_indices.push(self.events.len());
            self.events.push(event);
        }
        self.sequence_mutated();
        new_indices
    }

    /// Rebuilds every commit's `children` list from the authoritative
    /// `parents` lists (spec §9: forward parent list is authority,
    /// children is a derived index rebuilt when stale).
    pub fn reindex_children(&mut self) {
        let mut children: HashMap<EventIndex, Vec<EventIndex>> = HashMap::new();
        for (i, event) in self.events.iter().enumerate() {
            if let Event::Commit(c) = event {
                for &p in &c.parents {
                    children.entry(p).or_default().push(i);
                }
            }
        }
        for (i, event) in self.events.iter_mut().enumerate() {
            if let Event::Commit(c) = event {
                c.children = children.remove(&i).unwrap_or_default();
            }
        }
    }

    /// Search order: legacy-ID, branch name, tag name, assignments,
    /// action-stamp, date/action-stamp prefix with optional `#k` ordinal
    /// (spec §4.7). Returns every matching index for the caller to
    /// disambiguate with `#k`.
    pub fn named(&mut self, name: &str) -> Vec<EventIndex> {
        let (base, ordinal) = match name.rsplit_once('#') {
            Some((b, k)) if k.chars().all(|c| c.is_ascii_digit()) && !k.is_empty() => (b, k.parse::<usize>().ok()),
            _ => (name, None),
        };

        let mut matches: Vec<EventIndex> = Vec::new();

        for (i, event) in self.events.iter().enumerate() {
            if let Event::Commit(c) = event {
                if c.legacy_id.as_deref() == Some(base) {
                    matches.push(i);
                }
            }
        }
        if matches.is_empty() {
            for (i, event) in self.events.iter().enumerate() {
                if let Event::Commit(c) = event {
                    if c.branch == base {
                        matches.push(i);
                    }
                }
            }
        }
        if matches.is_empty() {
            for (i, event) in self.events.iter().enumerate() {
                if let Event::Tag(t) = event {
                    if t.name == base {
                        matches.push(i);
                    }
                }
            }
        }
        if matches.is_empty() {
            if let Some(set) = self.assignments.get(base) {
                matches.extend(set.iter().map(|v| v as usize));
            }
        }
        if matches.is_empty() {
            for (i, event) in self.events.iter().enumerate() {
                if let Event::Commit(c) = event {
                    if action_stamp(c) == base || action_stamp(c).starts_with(base) {
                        matches.push(i);
                    }
                }
            }
        }

        if let Some(k) = ordinal {
            if k >= 1 && k <= matches.len() {
                return vec![matches[k - 1]];
            }
            return Vec::new();
        }
        matches
    }

    /// Derives a commit's manifest from its first parent's manifest plus
    /// its own fileops, memoizing the result (spec §3.3). Any ancestor
    /// whose manifest is still cached is reused; callers must have called
    /// `invalidate_manifest` (transitively) on any mutated commit first.
    pub fn manifest_of(&mut self, index: EventIndex) -> Manifest {
        if let Some(Event::Commit(c)) = self.events.get(index) {
            if let Some(m) = &c.manifest {
                return m.clone();
            }
        }
        let mut manifest = match self.events.get(index).and_then(Event::as_commit).and_then(Commit::first_parent) {
            Some(parent) => self.manifest_of(parent),
            None => Manifest::new(),
        };
        if let Some(Event::Commit(c)) = self.events.get(index) {
            let fileops = c.fileops.clone();
            apply_fileops_to_manifest(&mut manifest, &fileops);
        }
        if let Some(Event::Commit(c)) = self.events.get_mut(index) {
            c.manifest = Some(manifest.clone());
        }
        manifest
    }

    /// Invalidates a commit's manifest and every descendant's, following
    /// `children` (spec §3.3: "invalidates its manifest and all
    /// descendant manifests"). Requires `children` to be current; callers
    /// should `reindex_children` first if parents changed this mutation.
    pub fn invalidate_manifest_chain(&mut self, start: EventIndex) {
        let mut stack = vec![start];
        let mut seen = std::collections::HashSet::new();
        while let Some(i) = stack.pop() {
            if !seen.insert(i) {
                continue;
            }
            if let Some(Event::Commit(c)) = self.events.get_mut(i) {
                c.manifest = None;
                stack.extend(c.children.iter().copied());
            }
        }
    }

    /// Removes Blobs with no remaining `M`/`N` reference among live
    /// commits (spec §3.9 invariant 6, §4.4.1 step 5).
    pub fn gc_blobs(&mut self) {
        let mut referenced: std::collections::HashSet<Mark> = std::collections::HashSet::new();
        for event in &self.events {
            if let Event::Commit(c) = event {
                for op in &c.fileops {
                    let file_ref = match op {
                        FileOp::Modify { file_ref, .. } | FileOp::Note { file_ref, .. } => Some(file_ref),
                        _ => None,
                    };
                    if let Some(FileRef::Mark(m)) = file_ref {
                        referenced.insert(m.clone());
                    }
                }
            }
        }
        self.events.retain(|event| match event {
            Event::Blob(b) => match &b.mark {
                Some(m) => referenced.contains(m),
                None => false,
            },
            _ => true,
        });
        self.sequence_mutated();
    }

    /// Removes the events at `indices` and remaps every surviving
    /// parent/children/attachments reference into the shrunk index space
    /// (spec §4.4 preamble: structural operations must keep these in
    /// sync). Callers that need a removed commit's parents spliced onto
    /// its children must do that reparenting before calling this — it
    /// only prunes references to removed indices, it does not invent new
    /// edges. Returns the old→new map; removed indices are absent.
    pub fn remove_events(&mut self, indices: &std::collections::HashSet<EventIndex>) -> HashMap<EventIndex, EventIndex> {
        let mut remap = HashMap::new();
        let mut kept = Vec::with_capacity(self.events.len());
        for (i, event) in std::mem::take(&mut self.events).into_iter().enumerate() {
            if indices.contains(&i) {
                continue;
            }
            remap.insert(i, kept.len());
            kept.push(event);
        }
        for event in &mut kept {
            if let Event::Commit(c) = event {
                c.parents = c.parents.iter().filter_map(|p| remap.get(p).copied()).collect();
                c.children = c.children.iter().filter_map(|ch| remap.get(ch).copied()).collect();
                c.attachments = c.attachments.iter().filter_map(|a| remap.get(a).copied()).collect();
            }
        }
        self.events = kept;
        let mut remapped_assignments = HashMap::new();
        for (name, set) in self.assignments.drain() {
            let new_set: crate::containers::OrderedIntSet =
                set.iter().filter_map(|v| remap.get(&(v as usize)).map(|&n| n as i64)).collect();
            remapped_assignments.insert(name, new_set);
        }
        self.assignments = remapped_assignments;
        self.sequence_mutated();
        remap
    }

    pub fn new_blob(&mut self, content: Vec<u8>, path: BString) -> (Mark, Blob) {
        let mark = self.newmark();
        let size = content.len() as u64;
        let blob = Blob {
            mark: Some(mark.clone()),
            blobseq: self.next_blob_seq(),
            pathlist: vec![path],
            size,
            source: BlobSource::Inline(content),
        };
        (mark, blob)
    }
}

/// `RFC3339!email` plus optional `#ordinal` (spec GLOSSARY "action
/// stamp").
pub fn action_stamp(commit: &Commit) -> String {
    format!("{}!{}", commit.committer.date.to_rfc3339(), commit.committer.email)
}

fn apply_fileops_to_manifest(manifest: &mut Manifest, fileops: &[FileOp]) {
    for op in fileops {
        match op {
            FileOp::Modify { mode, file_ref, path } => {
                manifest.insert(path.clone(), ManifestEntry { mode: *mode, file_ref: file_ref.clone() });
            }
            FileOp::Delete { path } => {
                let prefix = {
                    let mut p = path.to_vec();
                    p.push(b'/');
                    p
                };
                manifest.remove(path);
                manifest.retain(|k, _| !k.starts_with(&prefix[..]));
            }
            FileOp::Rename { src, tgt } => {
                let moved: Vec<_> = manifest
                    .iter()
                    .filter(|(k, _)| k.as_slice() == src.as_slice() || k.starts_with(format!("{src}/").as_bytes()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                for (k, v) in moved {
                    manifest.remove(&k);
                    let suffix = &k.as_slice()[src.len()..];
                    let mut new_key = tgt.to_vec();
                    new_key.extend_from_slice(suffix);
                    manifest.insert(BString::from(new_key), v);
                }
            }
            FileOp::Copy { src, tgt } => {
                let copied: Vec<_> = manifest
                    .iter()
                    .filter(|(k, _)| k.as_slice() == src.as_slice() || k.starts_with(format!("{src}/").as_bytes()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                for (k, v) in copied {
                    let suffix = &k.as_slice()[src.len()..];
                    let mut new_key = tgt.to_vec();
                    new_key.extend_from_slice(suffix);
                    manifest.insert(BString::from(new_key), v);
                }
            }
            FileOp::Note { .. } => {}
            FileOp::DeleteAll => manifest.clear(),
        }
    }
}

fn rewrite_refs(event: &mut Event, remap: &HashMap<Mark, Mark>) {
    match event {
        Event::Commit(c) => {
            for op in &mut c.fileops {
                match op {
                    FileOp::Modify { file_ref, .. } | FileOp::Note { file_ref, .. } => {
                        if let FileRef::Mark(m) = file_ref {
                            if let Some(new) = remap.get(m) {
                                *m = new.clone();
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Event::Tag(t) => {
            if let Some(new) = remap.get(&t.committish) {
                t.committish = new.clone();
            }
        }
        Event::Reset(r) => {
            if let Some(committish) = &mut r.committish {
                if let Some(new) = remap.get(committish) {
                    *committish = new.clone();
                }
            }
        }
        _ => {}
    }
}

/// Used only so `Attribution`/email-free construction in tests reads
/// naturally; not part of the spec's public surface.
#[cfg(test)]
fn attr(name: &str) -> Attribution {
    Attribution::new(name, format!("{name}@x"), crate::model::Date::new(0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Commit, Event};

    #[test]
    fn newmark_is_monotonic() {
        let mut repo = Repository::new("r");
        assert_eq!(repo.newmark(), ":1");
        assert_eq!(repo.newmark(), ":2");
    }

    #[test]
    fn mark_index_resolves_after_push() {
        let mut repo = Repository::new("r");
        let mut c = Commit::new("refs/heads/master", attr("U"));
        c.mark = Some(":1".to_string());
        let idx = repo.push(Event::Commit(c));
        assert_eq!(repo.index_of_mark(":1"), Some(idx));
    }

    #[test]
    fn renumber_rewrites_fileop_refs() {
        let mut repo = Repository::new("r");
        let blob = Blob {
            mark: Some(":5".to_string()),
            blobseq: 1,
            pathlist: vec![],
            size: 0,
            source: BlobSource::Inline(vec![]),
        };
        repo.push(Event::Blob(blob));
        let mut c = Commit::new("refs/heads/master", attr("U"));
        c.mark = Some(":9".to_string());
        c.fileops.push(FileOp::Modify {
            mode: 0o100644,
            file_ref: FileRef::Mark(":5".to_string()),
            path: BString::from("a"),
        });
        repo.push(Event::Commit(c));
        repo.renumber(1);
        let Event::Commit(c2) = &repo.events()[1] else { panic!() };
        assert_eq!(c2.mark.as_deref(), Some(":2"));
        let FileOp::Modify { file_ref, .. } = &c2.fileops[0] else { panic!() };
        assert_eq!(*file_ref, FileRef::Mark(":1".to_string()));
    }

    #[test]
    fn manifest_accumulates_across_parent_chain() {
        let mut repo = Repository::new("r");
        let mut c1 = Commit::new("refs/heads/master", attr("U"));
        c1.fileops.push(FileOp::Modify {
            mode: 0o100644,
            file_ref: FileRef::Inline(BString::from("x")),
            path: BString::from("a"),
        });
        let i1 = repo.push(Event::Commit(c1));
        let mut c2 = Commit::new("refs/heads/master", attr("U"));
        c2.parents.push(i1);
        c2.fileops.push(FileOp::Delete { path: BString::from("a") });
        c2.fileops.push(FileOp::Modify {
            mode: 0o100644,
            file_ref: FileRef::Inline(BString::from("y")),
            path: BString::from("b"),
        });
        let i2 = repo.push(Event::Commit(c2));
        let manifest = repo.manifest_of(i2);
        assert!(!manifest.contains_key(&BString::from("a")));
        assert!(manifest.contains_key(&BString::from("b")));
    }

    #[test]
    fn gc_blobs_removes_unreferenced() {
        let mut repo = Repository::new("r");
        let blob = Blob {
            mark: Some(":1".to_string()),
            blobseq: 1,
            pathlist: vec![],
            size: 0,
            source: BlobSource::Inline(vec![]),
        };
        repo.push(Event::Blob(blob));
        repo.gc_blobs();
        assert_eq!(repo.len(), 0);
    }
}
