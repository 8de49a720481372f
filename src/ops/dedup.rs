//! Dedup (spec §4.4.8): hashes every blob's content within a selection,
//! and rewrites references to a duplicate onto whichever mark was seen
//! first, then garbage-collects the now-unreferenced blobs.

use std::collections::HashMap;

use crate::containers::OrderedIntSet;
use crate::model::{Event, FileOp, FileRef, Mark};
use crate::repository::Repository;

pub fn dedup(repo: &mut Repository, selection: &OrderedIntSet) -> anyhow::Result<()> {
    let mut canonical_by_hash: HashMap<gix::ObjectId, Mark> = HashMap::new();
    let mut rewrite: HashMap<Mark, Mark> = HashMap::new();

    for idx in selection.sorted() {
        let idx = idx as usize;
        let Some(Event::Blob(blob)) = repo.event(idx) else { continue };
        let Some(mark) = &blob.mark else { continue };
        let hash = content_hash(blob)?;
        match canonical_by_hash.entry(hash) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                rewrite.insert(mark.clone(), entry.get().clone());
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(mark.clone());
            }
        }
    }

    if rewrite.is_empty() {
        return Ok(());
    }

    for event in repo.events_mut() {
        if let Event::Commit(c) = event {
            for op in &mut c.fileops {
                if let FileOp::Modify { file_ref, .. } | FileOp::Note { file_ref, .. } = op {
                    if let FileRef::Mark(m) = file_ref {
                        if let Some(canonical) = rewrite.get(m) {
                            *m = canonical.clone();
                        }
                    }
                }
            }
            c.invalidate_manifest();
        }
    }

    repo.gc_blobs();
    Ok(())
}

/// Hashes a blob's actual content, per spec §4.4.8 ("hash every Blob's
/// content") — never a proxy for it. `Inline` is the only variant this
/// build's parsers ever produce; `Spill` is read from disk in case a
/// caller outside this build's parsers constructs one. `Stream` has no
/// accessible source buffer to read from in this build (see DESIGN.md),
/// so it is rejected outright rather than hashed by its offset/length,
/// which would silently let unrelated blobs collide or fail to dedup.
fn content_hash(blob: &crate::model::Blob) -> anyhow::Result<gix::ObjectId> {
    let mut hasher = gix::hash::hasher(gix::hash::Kind::Sha1);
    match &blob.source {
        crate::model::BlobSource::Inline(bytes) => {
            hasher.update(bytes);
        }
        crate::model::BlobSource::Spill { path, compressed } => {
            let raw = std::fs::read(path)?;
            if *compressed {
                anyhow::bail!("cannot dedup gzip-compressed spill file {}: decompression is not implemented", path.display());
            }
            hasher.update(&raw);
        }
        crate::model::BlobSource::Stream { .. } => {
            anyhow::bail!("cannot dedup a Stream-backed blob: no source buffer is retained to read its content from");
        }
    }
    Ok(hasher.try_finalize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribution, Blob, BlobSource, Commit, Date};

    fn attr() -> Attribution {
        Attribution::new("U", "u@x", Date::new(0, 0))
    }

    #[test]
    fn dedup_rewrites_duplicate_blob_references() {
        let mut repo = Repository::new("r");
        let b1 = Blob { mark: Some(":1".to_string()), blobseq: 1, pathlist: vec![], size: 1, source: BlobSource::Inline(vec![b'x']) };
        let b2 = Blob { mark: Some(":2".to_string()), blobseq: 2, pathlist: vec![], size: 1, source: BlobSource::Inline(vec![b'x']) };
        let i1 = repo.push(Event::Blob(b1));
        let i2 = repo.push(Event::Blob(b2));
        let mut c = Commit::new("refs/heads/master", attr());
        c.fileops.push(FileOp::Modify { mode: 0o100644, file_ref: FileRef::Mark(":2".to_string()), path: bstr::BString::from("a") });
        repo.push(Event::Commit(c));

        let selection = OrderedIntSet::from_iter(vec![i1 as i64, i2 as i64]);
        dedup(&mut repo, &selection).unwrap();

        assert_eq!(repo.len(), 2, "duplicate blob should be garbage collected");
        let commit = repo.events().iter().find_map(Event::as_commit).unwrap();
        let FileOp::Modify { file_ref, .. } = &commit.fileops[0] else { panic!() };
        assert_eq!(*file_ref, FileRef::Mark(":1".to_string()));
    }
}
