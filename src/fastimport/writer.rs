//! Fast-import stream serializer (spec §4.2). Emits events in vector
//! order; `data` sections always use the counted form.

use std::collections::HashSet;
use std::io::Write;

use crate::model::{Event, EventIndex, FileOp};
use crate::repository::Repository;

/// Style flags the preferred VCS is consulted for (spec §4.2).
#[derive(Clone, Copy, Debug, Default)]
pub struct StyleFlags {
    pub nl_after_comment: bool,
    pub no_nl_after_commit: bool,
    pub export_progress: bool,
    pub import_defaults: bool,
}

pub struct FastImportWriter<W: Write> {
    out: W,
    style: StyleFlags,
}

impl<W: Write> FastImportWriter<W> {
    pub fn new(out: W, style: StyleFlags) -> Self {
        FastImportWriter { out, style }
    }

    /// Writes the whole repository in vector order.
    pub fn write_all(&mut self, repo: &Repository) -> anyhow::Result<()> {
        let full: HashSet<EventIndex> = (0..repo.len()).collect();
        self.write_subset(repo, &full)
    }

    /// Writes only the events in `selection`. Precedes a commit with a
    /// synthetic `reset <branch>^0` whenever it begins a branch segment
    /// not yet materialized in this write, and emits callouts whose
    /// target is outside the selection as their action-stamp cookie
    /// (spec §4.2's subset-export contract).
    pub fn write_subset(&mut self, repo: &Repository, selection: &HashSet<EventIndex>) -> anyhow::Result<()> {
        let mut realized_branches: HashSet<String> = HashSet::new();
        for (index, event) in repo.events().iter().enumerate() {
            if !selection.contains(&index) {
                continue;
            }
            match event {
                Event::Blob(b) => self.write_blob(b)?,
                Event::Commit(c) => {
                    let starts_branch_segment = c.parents.iter().all(|p| !selection.contains(p));
                    if starts_branch_segment && !realized_branches.contains(&c.branch) {
                        writeln!(self.out, "reset {}", c.branch)?;
                        writeln!(self.out, "from {}^0", c.branch)?;
                    }
                    realized_branches.insert(c.branch.clone());
                    self.write_commit(repo, c, selection)?;
                }
                Event::Tag(t) => self.write_tag(t)?,
                Event::Reset(r) => self.write_reset(r)?,
                Event::Passthrough(p) => {
                    writeln!(self.out, "{}", p.text)?;
                }
                Event::Callout(c) => {
                    writeln!(self.out, "{}", c.action_stamp)?;
                }
            }
            if self.style.export_progress {
                writeln!(self.out, "progress {index}")?;
            }
        }
        Ok(())
    }

    fn write_blob(&mut self, blob: &crate::model::Blob) -> anyhow::Result<()> {
        writeln!(self.out, "blob")?;
        if let Some(mark) = &blob.mark {
            writeln!(self.out, "mark {mark}")?;
        }
        self.write_data(blob_content(blob))?;
        Ok(())
    }

    fn write_commit(&mut self, repo: &Repository, commit: &crate::model::Commit, selection: &HashSet<EventIndex>) -> anyhow::Result<()> {
        writeln!(self.out, "commit {}", commit.branch)?;
        if let Some(legacy_id) = &commit.legacy_id {
            writeln!(self.out, "#legacy-id {legacy_id}")?;
        }
        if let Some(mark) = &commit.mark {
            writeln!(self.out, "mark {mark}")?;
        }
        for author in &commit.authors {
            writeln!(self.out, "author {} {}", author.format_name_email(), author.date.to_fastimport())?;
        }
        writeln!(
            self.out,
            "committer {} {}",
            commit.committer.format_name_email(),
            commit.committer.date.to_fastimport()
        )?;
        self.write_data(&commit.comment)?;
        if self.style.nl_after_comment {
            writeln!(self.out)?;
        }
        for (i, &parent) in commit.parents.iter().enumerate() {
            let keyword = if i == 0 { "from" } else { "merge" };
            let reference = parent_reference(repo, parent, selection);
            writeln!(self.out, "{keyword} {reference}")?;
        }
        for (key, value) in commit.properties.iter() {
            writeln!(self.out, "property {key} {} {value}", value.len())?;
        }
        for op in &commit.fileops {
            self.write_fileop(op)?;
        }
        if !self.style.no_nl_after_commit {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn write_fileop(&mut self, op: &FileOp) -> anyhow::Result<()> {
        match op {
            FileOp::Modify { mode, file_ref, path } => {
                writeln!(self.out, "M {:06o} {} {}", mode, file_ref, quote_path(path))?;
            }
            FileOp::Delete { path } => writeln!(self.out, "D {}", quote_path(path))?,
            FileOp::Rename { src, tgt } => writeln!(self.out, "R {} {}", quote_path(src), quote_path(tgt))?,
            FileOp::Copy { src, tgt } => writeln!(self.out, "C {} {}", quote_path(src), quote_path(tgt))?,
            FileOp::Note { file_ref, path } => writeln!(self.out, "N {} {}", file_ref, quote_path(path))?,
            FileOp::DeleteAll => writeln!(self.out, "deleteall")?,
        }
        Ok(())
    }

    fn write_tag(&mut self, tag: &crate::model::Tag) -> anyhow::Result<()> {
        writeln!(self.out, "tag {}", tag.name)?;
        if let Some(legacy_id) = &tag.legacy_id {
            writeln!(self.out, "#legacy-id {legacy_id}")?;
        }
        writeln!(self.out, "from {}", tag.committish)?;
        writeln!(self.out, "tagger {} {}", tag.tagger.format_name_email(), tag.tagger.date.to_fastimport())?;
        self.write_data(&tag.comment)?;
        Ok(())
    }

    fn write_reset(&mut self, reset: &crate::model::Reset) -> anyhow::Result<()> {
        writeln!(self.out, "reset {}", reset.branch_ref)?;
        if let Some(committish) = &reset.committish {
            writeln!(self.out, "from {committish}")?;
        }
        Ok(())
    }

    fn write_data(&mut self, content: &[u8]) -> anyhow::Result<()> {
        writeln!(self.out, "data {}", content.len())?;
        self.out.write_all(content)?;
        writeln!(self.out)?;
        Ok(())
    }
}

fn blob_content(blob: &crate::model::Blob) -> &[u8] {
    match &blob.source {
        crate::model::BlobSource::Inline(bytes) => bytes,
        _ => b"",
    }
}

/// For a subset export, a parent outside the selection is emitted as its
/// action-stamp cookie rather than a mark (spec §4.2).
fn parent_reference(repo: &Repository, parent: EventIndex, selection: &HashSet<EventIndex>) -> String {
    if selection.contains(&parent) {
        if let Some(Event::Commit(c)) = repo.event(parent) {
            if let Some(mark) = &c.mark {
                return mark.clone();
            }
        }
    }
    if let Some(Event::Commit(c)) = repo.event(parent) {
        return crate::repository::action_stamp(c);
    }
    if let Some(Event::Callout(c)) = repo.event(parent) {
        return c.action_stamp.clone();
    }
    String::new()
}

fn quote_path(path: &bstr::BString) -> String {
    let needs_quoting = path.iter().any(|&b| b == b' ' || b == b'"' || b == b'\\');
    if !needs_quoting {
        return path.to_string();
    }
    let mut out = String::from("\"");
    for &b in path.iter() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            _ => out.push(b as char),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribution, Commit, Date};

    #[test]
    fn write_commit_uses_counted_data() {
        let mut repo = Repository::new("r");
        let mut commit = Commit::new("refs/heads/master", Attribution::new("U", "u@x", Date::new(100, 0)));
        commit.mark = Some(":1".to_string());
        commit.comment = bstr::BString::from("hello");
        repo.push(Event::Commit(commit));

        let mut buf = Vec::new();
        let mut writer = FastImportWriter::new(&mut buf, StyleFlags::default());
        writer.write_all(&repo).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("data 5\nhello\n"));
        assert!(!text.contains("data <<"));
    }

    #[test]
    fn quote_path_escapes_spaces() {
        let p = bstr::BString::from("a b.txt");
        assert_eq!(quote_path(&p), "\"a b.txt\"");
    }
}
