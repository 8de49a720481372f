//! Lossless fast-import stream parser (spec §4.2). Parses a complete
//! stream already read into memory into a `Repository`'s event vector.
//! `parse_into` takes the whole input as an in-memory `&[u8]`, so by the
//! time parsing starts the file is already fully resident — there is no
//! open seek stream left to defer reads against. Blob content is
//! therefore always materialized as `BlobSource::Inline`; see
//! DESIGN.md's scope-cuts section for why `Stream`/`Spill` are not
//! implemented.

use bstr::{BString, ByteSlice};

use crate::containers::OrderedStringMap;
use crate::error::ParseError;
use crate::model::{
    Attribution, Blob, BlobSource, Commit, Date, Event, FileOp, FileRef, Mark, Passthrough, Reset, Tag,
};
use crate::repository::Repository;

pub struct FastImportReader<'a> {
    lines: Vec<&'a [u8]>,
    pos: usize,
    blob_seq: u64,
    /// Parent marks for each parsed commit, keyed by that commit's event
    /// index, since parent marks may only be resolvable to arena indices
    /// once the whole vector (and its mark index) exists.
    pending_parents: Vec<(usize, Vec<Mark>)>,
}

impl<'a> FastImportReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut lines = split_lines(data);
        if lines.last() == Some(&&b""[..]) {
            lines.pop();
        }
        FastImportReader { lines, pos: 0, blob_seq: 0, pending_parents: Vec::new() }
    }

    pub fn parse_into(mut self, repo: &mut Repository) -> anyhow::Result<()> {
        let _span = tracing::info_span!("fastimport_parse").entered();
        while let Some(line) = self.peek() {
            if crate::log::abort_requested() {
                break;
            }
            if line.starts_with(b"feature") || line.starts_with(b"option") || line.starts_with(b"#") {
                repo.push(Event::Passthrough(Passthrough {
                    text: to_text(line),
                    is_front_matter: true,
                }));
                self.advance();
                continue;
            }
            if line.trim_ascii() == b"done" {
                repo.push(Event::Passthrough(Passthrough { text: "done".to_string(), is_front_matter: false }));
                self.advance();
                continue;
            }
            if line.starts_with(b"blob") {
                self.advance();
                let blob = self.parse_blob()?;
                repo.push(Event::Blob(blob));
            } else if line.starts_with(b"commit ") {
                let branch = to_text(&line[b"commit ".len()..]);
                self.advance();
                let (commit, parents) = self.parse_commit(branch)?;
                let index = repo.push(Event::Commit(commit));
                if !parents.is_empty() {
                    self.pending_parents.push((index, parents));
                }
            } else if line.starts_with(b"reset ") {
                let branch_ref = to_text(&line[b"reset ".len()..]);
                self.advance();
                let committish = self.maybe_line_prefixed("from ").map(|s| s.to_string());
                repo.push(Event::Reset(Reset { branch_ref, committish }));
            } else if line.starts_with(b"tag ") {
                let name = to_text(&line[b"tag ".len()..]);
                self.advance();
                let tag = self.parse_tag(name)?;
                repo.push(Event::Tag(tag));
            } else {
                repo.push(Event::Passthrough(Passthrough { text: to_text(line), is_front_matter: false }));
                self.advance();
            }
        }
        for (index, parent_marks) in &self.pending_parents {
            let mut resolved = Vec::with_capacity(parent_marks.len());
            for mark in parent_marks {
                let parent_index = repo
                    .index_of_mark(mark)
                    .ok_or_else(|| ParseError::new(0, format!("unknown parent mark {mark}")))?;
                resolved.push(parent_index);
            }
            if let Some(Event::Commit(c)) = repo.event_mut(*index) {
                c.parents = resolved;
            }
        }
        repo.reindex_children();
        Ok(())
    }

    fn peek(&self) -> Option<&'a [u8]> {
        self.lines.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<&'a [u8]> {
        let line = self.lines.get(self.pos).copied();
        self.pos += 1;
        line
    }

    fn maybe_line_prefixed(&mut self, prefix: &str) -> Option<String> {
        match self.peek() {
            Some(line) if line.starts_with(prefix.as_bytes()) => {
                self.advance();
                Some(to_text(&line[prefix.len()..]))
            }
            _ => None,
        }
    }

    fn err(&self, message: impl Into<String>) -> anyhow::Error {
        ParseError::new(self.pos + 1, message).into()
    }

    fn parse_blob(&mut self) -> anyhow::Result<Blob> {
        let mark = self.maybe_line_prefixed("mark ");
        let data_line = self.advance().ok_or_else(|| self.err("expected 'data' after blob"))?;
        let content = self.parse_data(data_line)?;
        self.blob_seq += 1;
        Ok(Blob {
            mark,
            blobseq: self.blob_seq,
            pathlist: Vec::new(),
            size: content.len() as u64,
            source: BlobSource::Inline(content),
        })
    }

    fn parse_data(&mut self, data_line: &'a [u8]) -> anyhow::Result<Vec<u8>> {
        let rest = data_line.strip_prefix(b"data ").ok_or_else(|| self.err("expected 'data' line"))?;
        if let Some(delim) = rest.strip_prefix(b"<<") {
            let delim = delim.to_vec();
            let mut out = Vec::new();
            loop {
                let line = self.advance().ok_or_else(|| self.err("unterminated here-doc data"))?;
                if line == delim.as_slice() {
                    break;
                }
                out.extend_from_slice(line);
                out.push(b'\n');
            }
            Ok(out)
        } else {
            let n: usize = std::str::from_utf8(rest)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| self.err("invalid data length"))?;
            // Counted data may embed newlines; reconstruct it from the
            // original joined-by-newline line stream.
            let mut out = Vec::with_capacity(n);
            while out.len() < n {
                if !out.is_empty() {
                    out.push(b'\n');
                }
                let line = self.advance().ok_or_else(|| self.err("data section shorter than declared length"))?;
                out.extend_from_slice(line);
            }
            out.truncate(n);
            Ok(out)
        }
    }

    fn parse_commit(&mut self, branch: String) -> anyhow::Result<(Commit, Vec<Mark>)> {
        let legacy_id = self.maybe_line_prefixed("#legacy-id ");
        let mark = self.maybe_line_prefixed("mark ");
        let mut authors = Vec::new();
        while let Some(line) = self.peek() {
            if line.starts_with(b"author ") {
                authors.push(parse_attribution(&line[b"author ".len()..]).map_err(|e| self.err(e))?);
                self.advance();
            } else {
                break;
            }
        }
        let committer_line = self.advance().ok_or_else(|| self.err("expected 'committer' line"))?;
        let committer_rest = committer_line
            .strip_prefix(b"committer ")
            .ok_or_else(|| self.err("expected 'committer' line"))?;
        let committer = parse_attribution(committer_rest).map_err(|e| self.err(e))?;
        let data_line = self.advance().ok_or_else(|| self.err("expected 'data' after committer"))?;
        let comment = BString::from(self.parse_data(data_line)?);

        let mut parents: Vec<Mark> = Vec::new();
        if let Some(from) = self.maybe_line_prefixed("from ") {
            parents.push(from);
        }
        while let Some(m) = self.maybe_line_prefixed("merge ") {
            parents.push(m);
        }

        let mut properties = OrderedStringMap::new();
        let mut fileops = Vec::new();
        while let Some(line) = self.peek() {
            if line.starts_with(b"property ") {
                let (key, value) = parse_property(&line[b"property ".len()..]).map_err(|e| self.err(e))?;
                properties.insert(key, value);
                self.advance();
            } else if let Some(op) = self.try_parse_fileop(line)? {
                fileops.push(op);
                self.advance();
            } else {
                break;
            }
        }

        let mut commit = Commit::new(branch, committer);
        commit.mark = mark;
        commit.legacy_id = legacy_id;
        commit.authors = authors;
        commit.comment = comment;
        commit.properties = properties;
        commit.fileops = fileops;
        Ok((commit, parents))
    }

    fn try_parse_fileop(&self, line: &'a [u8]) -> anyhow::Result<Option<FileOp>> {
        if let Some(rest) = line.strip_prefix(b"M ") {
            let mut parts = rest.splitn(3, |b| *b == b' ');
            let mode = parts.next().ok_or_else(|| self.err("M: missing mode"))?;
            let mode = std::str::from_utf8(mode).ok().and_then(|s| u32::from_str_radix(s, 8).ok()).ok_or_else(|| self.err("M: bad mode"))?;
            let reference = parts.next().ok_or_else(|| self.err("M: missing ref"))?;
            let path = parts.next().ok_or_else(|| self.err("M: missing path"))?;
            let file_ref = if reference == b"inline" {
                FileRef::Inline(BString::from(Vec::new()))
            } else {
                FileRef::Mark(to_text(reference))
            };
            return Ok(Some(FileOp::Modify { mode, file_ref, path: unquote_path(path) }));
        }
        if let Some(rest) = line.strip_prefix(b"D ") {
            return Ok(Some(FileOp::Delete { path: unquote_path(rest) }));
        }
        if let Some(rest) = line.strip_prefix(b"R ") {
            let (src, tgt) = split_two_paths(rest).ok_or_else(|| self.err("R: expected two paths"))?;
            return Ok(Some(FileOp::Rename { src, tgt }));
        }
        if let Some(rest) = line.strip_prefix(b"C ") {
            let (src, tgt) = split_two_paths(rest).ok_or_else(|| self.err("C: expected two paths"))?;
            return Ok(Some(FileOp::Copy { src, tgt }));
        }
        if let Some(rest) = line.strip_prefix(b"N ") {
            let mut parts = rest.splitn(2, |b| *b == b' ');
            let reference = parts.next().ok_or_else(|| self.err("N: missing ref"))?;
            let path = parts.next().ok_or_else(|| self.err("N: missing path"))?;
            let file_ref = if reference == b"inline" {
                FileRef::Inline(BString::from(Vec::new()))
            } else {
                FileRef::Mark(to_text(reference))
            };
            return Ok(Some(FileOp::Note { file_ref, path: unquote_path(path) }));
        }
        if line.trim_ascii() == b"deleteall" {
            return Ok(Some(FileOp::DeleteAll));
        }
        Ok(None)
    }

    fn parse_tag(&mut self, name: String) -> anyhow::Result<Tag> {
        let legacy_id = self.maybe_line_prefixed("#legacy-id ");
        let committish = self
            .maybe_line_prefixed("from ")
            .ok_or_else(|| self.err("tag: expected 'from' line"))?;
        let tagger_line = self.advance().ok_or_else(|| self.err("tag: expected 'tagger' line"))?;
        let tagger_rest = tagger_line.strip_prefix(b"tagger ").ok_or_else(|| self.err("tag: expected 'tagger' line"))?;
        let tagger = parse_attribution(tagger_rest).map_err(|e| self.err(e))?;
        let data_line = self.advance().ok_or_else(|| self.err("tag: expected 'data'"))?;
        let comment = BString::from(self.parse_data(data_line)?);
        Ok(Tag { name, committish, tagger, comment, legacy_id })
    }
}

fn parse_attribution(rest: &[u8]) -> Result<Attribution, String> {
    let text = rest.to_str_lossy();
    let (name_email, date_str) = text.rsplit_once('>').ok_or("expected '<email>' in attribution")?;
    let (name, email) = name_email.split_once('<').ok_or("expected '<' in attribution")?;
    let date = Date::parse_fastimport(date_str).ok_or("bad date in attribution")?;
    Ok(Attribution::new(name.trim().to_string(), email.to_string(), date))
}

fn parse_property(rest: &[u8]) -> Result<(String, String), String> {
    let text = rest.to_str_lossy();
    let mut parts = text.splitn(3, ' ');
    let name = parts.next().ok_or("property: missing name")?.to_string();
    let len: usize = parts.next().ok_or("property: missing length")?.parse().map_err(|_| "property: bad length")?;
    let value = parts.next().unwrap_or("");
    Ok((name, value.chars().take(len).collect()))
}

fn unquote_path(raw: &[u8]) -> BString {
    let raw = raw.trim_ascii();
    if raw.len() >= 2 && raw[0] == b'"' && raw[raw.len() - 1] == b'"' {
        let inner = &raw[1..raw.len() - 1];
        let mut out = Vec::with_capacity(inner.len());
        let mut chars = inner.iter().copied();
        while let Some(c) = chars.next() {
            if c == b'\\' {
                match chars.next() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'\\') => out.push(b'\\'),
                    Some(b'"') => out.push(b'"'),
                    Some(other) => out.push(other),
                    None => {}
                }
            } else {
                out.push(c);
            }
        }
        BString::from(out)
    } else {
        BString::from(raw.to_vec())
    }
}

fn split_two_paths(rest: &[u8]) -> Option<(BString, BString)> {
    if rest.first() == Some(&b'"') {
        let end = rest.iter().skip(1).position(|&b| b == b'"')? + 1;
        let src = unquote_path(&rest[..=end]);
        let remainder = rest[end + 1..].trim_ascii_start();
        return Some((src, unquote_path(remainder)));
    }
    let space = rest.iter().position(|&b| b == b' ')?;
    Some((unquote_path(&rest[..space]), unquote_path(&rest[space + 1..])))
}

fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    data.split(|&b| b == b'\n').collect()
}

fn to_text(bytes: &[u8]) -> String {
    bytes.to_str_lossy().trim_end_matches('\r').to_string()
}
