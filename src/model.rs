//! Event payloads and their invariants (spec §3.2–§3.6): the tagged union
//! `Event` and the value types that make it up. Cross-event references are
//! represented two ways at once, deliberately: by mark (the wire-visible
//! `:<n>` string, used while parsing and serializing) and by arena index
//! (`EventIndex`, used once a stream is loaded into a `Repository`) per
//! spec §9's guidance to store the forward parent list as an index into
//! the event arena rather than a reference-counted pointer.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use bstr::BString;
use chrono::{DateTime, FixedOffset, TimeZone};

/// Index into a `Repository`'s event vector. Stable only until the next
/// structural mutation (spec §3.9 invariant 5).
pub type EventIndex = usize;

/// A wire-visible mark, `:<n>`. Interned as an owned string rather than a
/// bare integer because callouts embed an action-stamp cookie in the same
/// slot (spec §3.1/§3.5).
pub type Mark = String;

/// Attribution = (fullname, email, Date) (spec §3.6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribution {
    pub name: BString,
    pub email: BString,
    pub date: Date,
}

impl Attribution {
    pub fn new(name: impl Into<BString>, email: impl Into<BString>, date: Date) -> Self {
        Attribution {
            name: name.into(),
            email: email.into(),
            date,
        }
    }

    /// `Full Name <email>`, the form used on `author`/`committer`/`tagger`
    /// lines and as the left half of an action stamp.
    pub fn format_name_email(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// Date = (instant, zone-or-offset). Internal precision is one second;
/// equality is instant+offset string equality (spec §3.6), i.e. two dates
/// with the same instant but different UTC offsets are NOT equal, because
/// the offset is part of what a round-trip must reproduce byte-for-byte.
#[derive(Clone, Copy, Debug)]
pub struct Date {
    /// Unix timestamp in whole seconds.
    pub timestamp: i64,
    /// Offset from UTC in minutes, positive east.
    pub offset_minutes: i32,
}

impl PartialEq for Date {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.offset_minutes == other.offset_minutes
    }
}
impl Eq for Date {}

impl Date {
    pub fn new(timestamp: i64, offset_minutes: i32) -> Self {
        Date { timestamp, offset_minutes }
    }

    fn fixed_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_minutes * 60).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    /// The fast-import "seconds offset" form: `<unix-seconds> <+/-HHMM>`.
    pub fn to_fastimport(&self) -> String {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.abs();
        format!("{} {}{:02}{:02}", self.timestamp, sign, abs / 60, abs % 60)
    }

    pub fn parse_fastimport(s: &str) -> Option<Self> {
        let (secs, off) = s.trim().rsplit_once(' ')?;
        let timestamp: i64 = secs.trim().parse().ok()?;
        let offset_minutes = parse_offset(off)?;
        Some(Date { timestamp, offset_minutes })
    }

    pub fn to_rfc3339(&self) -> String {
        self.fixed_offset()
            .timestamp_opt(self.timestamp, 0)
            .single()
            .map(|d| d.to_rfc3339())
            .unwrap_or_default()
    }

    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        let dt = DateTime::parse_from_rfc3339(s).ok()?;
        Some(Date {
            timestamp: dt.timestamp(),
            offset_minutes: dt.offset().local_minus_utc() / 60,
        })
    }

    pub fn parse_rfc1123z(s: &str) -> Option<Self> {
        let dt = DateTime::parse_from_rfc2822(s).ok()?;
        Some(Date {
            timestamp: dt.timestamp(),
            offset_minutes: dt.offset().local_minus_utc() / 60,
        })
    }

    /// The `git log` default format: `Wed Sep 17 12:34:56 2025 +0200`.
    pub fn to_gitlog(&self) -> String {
        self.fixed_offset()
            .timestamp_opt(self.timestamp, 0)
            .single()
            .map(|d| d.format("%a %b %e %H:%M:%S %Y %z").to_string())
            .unwrap_or_default()
    }

    pub fn parse_gitlog(s: &str) -> Option<Self> {
        let dt = DateTime::parse_from_str(s.trim(), "%a %b %e %H:%M:%S %Y %z").ok()?;
        Some(Date {
            timestamp: dt.timestamp(),
            offset_minutes: dt.offset().local_minus_utc() / 60,
        })
    }
}

fn parse_offset(s: &str) -> Option<i32> {
    let s = s.trim();
    if s.len() != 5 {
        return None;
    }
    let sign = match &s[0..1] {
        "+" => 1,
        "-" => -1,
        _ => return None,
    };
    let hours: i32 = s[1..3].parse().ok()?;
    let mins: i32 = s[3..5].parse().ok()?;
    Some(sign * (hours * 60 + mins))
}

/// Either a blob mark reference or inline content, the two legal forms of
/// a FileOp's `ref` field (spec §3.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileRef {
    Mark(Mark),
    Inline(BString),
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRef::Mark(m) => write!(f, "{m}"),
            FileRef::Inline(_) => write!(f, "inline"),
        }
    }
}

/// A FileOp: one element of a commit's tree mutation (spec §3.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOp {
    Modify { mode: u32, file_ref: FileRef, path: BString },
    Delete { path: BString },
    Rename { src: BString, tgt: BString },
    Copy { src: BString, tgt: BString },
    Note { file_ref: FileRef, path: BString },
    DeleteAll,
}

impl FileOp {
    /// Path(s) this fileop mentions, for path-set membership (spec §4.6's
    /// `[path]` selector) and for canonicalization's adjacency analysis.
    pub fn paths(&self) -> Vec<&BString> {
        match self {
            FileOp::Modify { path, .. } | FileOp::Delete { path } | FileOp::Note { path, .. } => vec![path],
            FileOp::Rename { src, tgt } | FileOp::Copy { src, tgt } => vec![src, tgt],
            FileOp::DeleteAll => vec![],
        }
    }

    pub fn kind_letter(&self) -> char {
        match self {
            FileOp::Modify { .. } => 'M',
            FileOp::Delete { .. } => 'D',
            FileOp::Rename { .. } => 'R',
            FileOp::Copy { .. } => 'C',
            FileOp::Note { .. } => 'N',
            FileOp::DeleteAll => 'X',
        }
    }
}

/// One entry of a commit's memoized manifest (spec §3.3): a path's mode
/// and content source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub mode: u32,
    pub file_ref: FileRef,
}

/// path → {mode, blob-mark or inline content}, derived from the first
/// parent's manifest plus this commit's fileops applied in order.
pub type Manifest = BTreeMap<BString, ManifestEntry>;

/// Exactly one of an offset+length into a seekable source, or an owned
/// spill file (spec §3.2). Only `Inline` is ever constructed by this
/// build's parsers (see DESIGN.md for why `Stream`/`Spill` are not); the
/// variants stay part of the type so code that matches on `BlobSource`
/// is exhaustive against the full spec'd shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlobSource {
    /// Offset and length into the fast-import file this repository was
    /// parsed from. Never constructed by this build.
    Stream { offset: u64, length: u64 },
    /// Owned on-disk spill file under the repository's scratch directory,
    /// path derived from `blobseq`. `compressed` records whether it was
    /// written gzip-compressed (the `compressblobs` option, spec §4.2).
    /// Never constructed by this build.
    Spill { path: PathBuf, compressed: bool },
    /// Materialized in memory — the only case this build produces,
    /// whether parsed from a stream or synthesized by a surgical
    /// operation (e.g. a generated `.gitignore`).
    Inline(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub mark: Option<Mark>,
    pub blobseq: u64,
    pub pathlist: Vec<BString>,
    pub size: u64,
    pub source: BlobSource,
}

impl Blob {
    pub fn push_path(&mut self, path: BString) {
        if !self.pathlist.contains(&path) {
            self.pathlist.push(path);
        }
    }
}

/// Annotated tag (spec §3.5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub committish: Mark,
    pub tagger: Attribution,
    pub comment: BString,
    pub legacy_id: Option<String>,
}

/// Branch-ref assignment (spec §3.5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reset {
    pub branch_ref: String,
    pub committish: Option<Mark>,
}

/// Any stream line the parser did not recognize; carried verbatim (spec
/// §3.5). `is_front_matter` marks `feature`/`option`/`#`-comment lines
/// that must stay contiguous at the start of the event vector (spec §3.9
/// invariant 4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Passthrough {
    pub text: String,
    pub is_front_matter: bool,
}

/// Placeholder for an external commit referenced by action-stamp; has
/// only a synthetic mark containing `!` (spec §3.5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Callout {
    pub action_stamp: String,
}

/// A commit (spec §3.3). Parent/child links are the only cyclic structure
/// in the model and are stored as arena indices (spec §9), not smart
/// pointers: `parents` is authoritative, `children` is a derived index
/// that must be rebuilt (via `Repository::reindex_children`) whenever it
/// is marked stale.
#[derive(Clone, Debug)]
pub struct Commit {
    pub mark: Option<Mark>,
    pub branch: String,
    pub comment: BString,
    pub committer: Attribution,
    pub authors: Vec<Attribution>,
    pub fileops: Vec<FileOp>,
    pub properties: crate::containers::OrderedStringMap,
    pub legacy_id: Option<String>,
    pub parents: Vec<EventIndex>,
    pub children: Vec<EventIndex>,
    /// Indices of Tag/Reset events whose `committish` equals this commit's
    /// mark (spec §3.3's "attachments").
    pub attachments: Vec<EventIndex>,
    /// Memoized manifest; `None` means invalid and must be recomputed.
    pub manifest: Option<Manifest>,
    pub delete_me: bool,
}

impl Commit {
    pub fn new(branch: impl Into<String>, committer: Attribution) -> Self {
        Commit {
            mark: None,
            branch: branch.into(),
            comment: BString::from(Vec::new()),
            committer,
            authors: Vec::new(),
            fileops: Vec::new(),
            properties: crate::containers::OrderedStringMap::new(),
            legacy_id: None,
            parents: Vec::new(),
            children: Vec::new(),
            attachments: Vec::new(),
            manifest: None,
            delete_me: false,
        }
    }

    pub fn invalidate_manifest(&mut self) {
        self.manifest = None;
    }

    pub fn first_parent(&self) -> Option<EventIndex> {
        self.parents.first().copied()
    }
}

/// Every event exposes an identifying mark, a comment/text, and a
/// "delete me" scratch flag (spec §3.1).
#[derive(Clone, Debug)]
pub enum Event {
    Blob(Blob),
    Commit(Commit),
    Tag(Tag),
    Reset(Reset),
    Passthrough(Passthrough),
    Callout(Callout),
}

impl Event {
    pub fn mark(&self) -> Option<&str> {
        match self {
            Event::Blob(b) => b.mark.as_deref(),
            Event::Commit(c) => c.mark.as_deref(),
            Event::Tag(_) | Event::Reset(_) | Event::Passthrough(_) => None,
            Event::Callout(c) => Some(&c.action_stamp),
        }
    }

    pub fn comment(&self) -> &[u8] {
        match self {
            Event::Commit(c) => c.comment.as_ref(),
            Event::Tag(t) => t.comment.as_ref(),
            Event::Passthrough(p) => p.text.as_bytes(),
            _ => b"",
        }
    }

    pub fn delete_me(&self) -> bool {
        matches!(self, Event::Commit(c) if c.delete_me)
    }

    pub fn set_delete_me(&mut self, value: bool) {
        if let Event::Commit(c) = self {
            c.delete_me = value;
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            Event::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_commit_mut(&mut self) -> Option<&mut Commit> {
        match self {
            Event::Commit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Event::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_blob_mut(&mut self) -> Option<&mut Blob> {
        match self {
            Event::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Event::Tag(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_reset(&self) -> Option<&Reset> {
        match self {
            Event::Reset(r) => Some(r),
            _ => None,
        }
    }

    /// A "CommitLike": either a real Commit or a Callout placeholder
    /// (spec §3.1). Returns the mark either way.
    pub fn is_commit_like(&self) -> bool {
        matches!(self, Event::Commit(_) | Event::Callout(_))
    }

    pub fn is_decodable(&self) -> bool {
        match self {
            Event::Commit(c) => std::str::from_utf8(&c.comment).is_ok(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_fastimport_round_trip() {
        let d = Date::new(1_700_000_000, 120);
        let s = d.to_fastimport();
        assert_eq!(Date::parse_fastimport(&s), Some(d));
    }

    #[test]
    fn date_negative_offset() {
        let d = Date::new(100, -330);
        assert_eq!(d.to_fastimport(), "100 -0530");
    }

    #[test]
    fn date_equality_requires_same_offset() {
        let a = Date::new(100, 0);
        let b = Date::new(100, 60);
        assert_ne!(a, b);
    }

    #[test]
    fn date_rfc3339_round_trip() {
        let d = Date::new(1_700_000_000, 0);
        let s = d.to_rfc3339();
        let parsed = Date::parse_rfc3339(&s).unwrap();
        assert_eq!(parsed.timestamp, d.timestamp);
    }

    #[test]
    fn fileop_paths() {
        let op = FileOp::Rename {
            src: BString::from("a"),
            tgt: BString::from("b"),
        };
        assert_eq!(op.paths(), vec![&BString::from("a"), &BString::from("b")]);
    }

    #[test]
    fn commit_manifest_starts_invalid() {
        let attr = Attribution::new("U", "u@x", Date::new(0, 0));
        let commit = Commit::new("refs/heads/master", attr);
        assert!(commit.manifest.is_none());
    }
}
