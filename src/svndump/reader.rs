//! Subversion dumpfile grammar parser (spec §6.2): turns the byte stream
//! into a sequence of revision records, each with a property block and a
//! list of node records, without interpreting any of it yet. Property and
//! text blocks are read by their declared byte length rather than by line,
//! since both may contain arbitrary bytes including embedded newlines.

use std::collections::HashMap;

use crate::containers::OrderedStringMap;
use crate::error::ParseError;

#[derive(Clone, Debug)]
pub struct Dump {
    pub version: u32,
    pub uuid: Option<String>,
    pub revisions: Vec<Revision>,
}

#[derive(Clone, Debug)]
pub struct Revision {
    pub number: u64,
    pub properties: OrderedStringMap,
    pub nodes: Vec<NodeRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
    /// `Node-kind` omitted, as svn dumps do for most `delete` actions.
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeAction {
    Add,
    Change,
    Delete,
    Replace,
}

#[derive(Clone, Debug)]
pub struct NodeRecord {
    pub path: String,
    pub kind: NodeKind,
    pub action: NodeAction,
    pub copy_from: Option<(u64, String)>,
    /// `None` means the node's properties were not restated this revision;
    /// `Some(empty map)` means a property block was present but cleared
    /// everything (svn still emits an empty `PROPS-END`-only block).
    pub properties: Option<OrderedStringMap>,
    pub text: Option<Vec<u8>>,
}

pub struct DumpReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DumpReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        DumpReader { data, pos: 0 }
    }

    pub fn parse(mut self) -> anyhow::Result<Dump> {
        let version = self.parse_version_header()?;
        self.skip_blank_lines();
        let uuid = self.maybe_parse_uuid();
        self.skip_blank_lines();

        let mut revisions = Vec::new();
        let _span = tracing::info_span!("svndump_parse").entered();
        loop {
            self.skip_blank_lines();
            if self.at_eof() {
                break;
            }
            if crate::log::abort_requested() {
                break;
            }
            revisions.push(self.parse_revision()?);
        }
        Ok(Dump { version, uuid, revisions })
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek_line(&self) -> &'a [u8] {
        let end = self.data[self.pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| self.pos + p)
            .unwrap_or(self.data.len());
        &self.data[self.pos..end]
    }

    fn read_line(&mut self) -> &'a [u8] {
        let line = self.peek_line();
        self.pos += line.len();
        if self.pos < self.data.len() {
            self.pos += 1;
        }
        line
    }

    fn skip_blank_lines(&mut self) {
        while !self.at_eof() && self.peek_line().is_empty() {
            self.read_line();
        }
    }

    fn read_bytes(&mut self, n: usize) -> anyhow::Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(ParseError::new(0, "unexpected end of dumpfile").into());
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn parse_version_header(&mut self) -> anyhow::Result<u32> {
        let text = to_text(self.read_line());
        let rest = text
            .strip_prefix("SVN-fs-dump-format-version: ")
            .ok_or_else(|| ParseError::new(1, "expected dumpfile version header"))?;
        rest.trim()
            .parse::<u32>()
            .map_err(|_| ParseError::new(1, "bad dumpfile version").into())
    }

    fn maybe_parse_uuid(&mut self) -> Option<String> {
        let peek = to_text(self.peek_line());
        let uuid = peek.strip_prefix("UUID: ").map(str::to_string);
        if uuid.is_some() {
            self.read_line();
        }
        uuid
    }

    fn parse_header_block(&mut self) -> anyhow::Result<HashMap<String, String>> {
        let mut headers = HashMap::new();
        while !self.at_eof() {
            let line = self.read_line();
            if line.is_empty() {
                break;
            }
            // A `#reposurgeon-read-options:` directive may appear among the
            // headers (spec §6.2); it carries no structural meaning here.
            if line.starts_with(b" #") {
                continue;
            }
            let text = to_text(line);
            let (k, v) = text
                .split_once(": ")
                .ok_or_else(|| ParseError::new(0, format!("malformed header line: {text:?}")))?;
            headers.insert(k.to_string(), v.to_string());
        }
        Ok(headers)
    }

    fn parse_revision(&mut self) -> anyhow::Result<Revision> {
        let line = to_text(self.read_line());
        let rest = line
            .strip_prefix("Revision-number: ")
            .ok_or_else(|| ParseError::new(0, format!("expected 'Revision-number:', got {line:?}")))?;
        let number: u64 = rest.trim().parse().map_err(|_| ParseError::new(0, "bad revision number"))?;

        let headers = self.parse_header_block()?;
        let properties = match prop_len(&headers) {
            0 => OrderedStringMap::new(),
            n => parse_properties(self.read_bytes(n)?)?,
        };

        let mut nodes = Vec::new();
        loop {
            self.skip_blank_lines();
            if self.at_eof() || !self.peek_line().starts_with(b"Node-path: ") {
                break;
            }
            nodes.push(self.parse_node()?);
        }
        Ok(Revision { number, properties, nodes })
    }

    fn parse_node(&mut self) -> anyhow::Result<NodeRecord> {
        let line = self.read_line();
        let path = to_text(&line[b"Node-path: ".len()..]);
        let headers = self.parse_header_block()?;

        let kind = match headers.get("Node-kind").map(String::as_str) {
            Some("file") => NodeKind::File,
            Some("dir") => NodeKind::Dir,
            _ => NodeKind::Unknown,
        };
        let action = match headers.get("Node-action").map(String::as_str) {
            Some("add") => NodeAction::Add,
            Some("change") => NodeAction::Change,
            Some("delete") => NodeAction::Delete,
            Some("replace") => NodeAction::Replace,
            other => return Err(ParseError::new(0, format!("unknown Node-action: {other:?}")).into()),
        };
        let copy_from = match (headers.get("Node-copyfrom-rev"), headers.get("Node-copyfrom-path")) {
            (Some(rev), Some(path)) => Some((
                rev.trim().parse::<u64>().map_err(|_| ParseError::new(0, "bad copyfrom-rev"))?,
                path.clone(),
            )),
            _ => None,
        };

        let properties = match (headers.contains_key("Prop-content-length"), prop_len(&headers)) {
            (true, 0) => Some(OrderedStringMap::new()),
            (true, n) => Some(parse_properties(self.read_bytes(n)?)?),
            (false, _) => None,
        };
        let text = match headers.get("Text-content-length").and_then(|s| s.trim().parse::<usize>().ok()) {
            Some(n) => Some(self.read_bytes(n)?.to_vec()),
            None => None,
        };

        Ok(NodeRecord { path, kind, action, copy_from, properties, text })
    }
}

fn prop_len(headers: &HashMap<String, String>) -> usize {
    headers.get("Prop-content-length").and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

/// Parses a `K <len>\n<key>\nV <len>\n<value>\n` property block terminated
/// by `PROPS-END` (spec §6.2). `D <len>\n<key>\n` deletion records, used by
/// delta dumps, are recognized and skipped.
fn parse_properties(bytes: &[u8]) -> anyhow::Result<OrderedStringMap> {
    let mut map = OrderedStringMap::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let line_end_pos = line_end(bytes, pos);
        let line = &bytes[pos..line_end_pos];
        if line == b"PROPS-END" {
            break;
        }
        if let Some(rest) = line.strip_prefix(b"K ") {
            let klen = parse_len(rest)?;
            let key_start = line_end_pos + 1;
            let key = String::from_utf8_lossy(&bytes[key_start..key_start + klen]).into_owned();
            let vpos = key_start + klen + 1;
            let vline_end = line_end(bytes, vpos);
            let vline = &bytes[vpos..vline_end];
            let vrest = vline
                .strip_prefix(b"V ")
                .ok_or_else(|| anyhow::anyhow!("malformed property value header"))?;
            let vlen = parse_len(vrest)?;
            let val_start = vline_end + 1;
            let value = String::from_utf8_lossy(&bytes[val_start..val_start + vlen]).into_owned();
            map.insert(key, value);
            pos = val_start + vlen + 1;
        } else if let Some(rest) = line.strip_prefix(b"D ") {
            let klen = parse_len(rest)?;
            pos = line_end_pos + 1 + klen + 1;
        } else {
            return Err(anyhow::anyhow!("malformed property record: {:?}", String::from_utf8_lossy(line)));
        }
    }
    Ok(map)
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..].iter().position(|&b| b == b'\n').map(|p| from + p).unwrap_or(bytes.len())
}

fn parse_len(rest: &[u8]) -> anyhow::Result<usize> {
    std::str::from_utf8(rest)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| anyhow::anyhow!("bad length field"))
}

fn to_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end_matches('\r').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dump() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"SVN-fs-dump-format-version: 2\n\n");
        out.extend_from_slice(b"UUID: abc-123\n\n");

        let r0_props = b"K 7\nsvn:log\nV 0\n\nK 10\nsvn:author\nV 0\n\nPROPS-END\n";
        out.extend_from_slice(format!("Revision-number: 0\nProp-content-length: {}\nContent-length: {}\n\n", r0_props.len(), r0_props.len()).as_bytes());
        out.extend_from_slice(r0_props);
        out.push(b'\n');

        let r1_props = b"K 7\nsvn:log\nV 5\nhello\nK 10\nsvn:author\nV 4\njrtc\nPROPS-END\n";
        out.extend_from_slice(format!("Revision-number: 1\nProp-content-length: {}\nContent-length: {}\n\n", r1_props.len(), r1_props.len()).as_bytes());
        out.extend_from_slice(r1_props);
        out.push(b'\n');

        out.extend_from_slice(b"Node-path: trunk\nNode-kind: dir\nNode-action: add\nProp-content-length: 10\nContent-length: 10\n\n");
        out.extend_from_slice(b"PROPS-END\n");
        out.push(b'\n');

        let content = b"hello world";
        out.extend_from_slice(
            format!(
                "Node-path: trunk/file1\nNode-kind: file\nNode-action: add\nText-content-length: {}\nProp-content-length: 10\nContent-length: {}\n\n",
                content.len(),
                10 + content.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(b"PROPS-END\n");
        out.extend_from_slice(content);
        out.push(b'\n');

        out
    }

    #[test]
    fn parses_version_and_uuid() {
        let dump = DumpReader::new(&sample_dump()).parse().unwrap();
        assert_eq!(dump.version, 2);
        assert_eq!(dump.uuid.as_deref(), Some("abc-123"));
        assert_eq!(dump.revisions.len(), 2);
    }

    #[test]
    fn parses_revision_properties_and_nodes() {
        let dump = DumpReader::new(&sample_dump()).parse().unwrap();
        let r1 = &dump.revisions[1];
        assert_eq!(r1.number, 1);
        assert_eq!(r1.properties.get("svn:log"), Some("hello"));
        assert_eq!(r1.properties.get("svn:author"), Some("jrtc"));
        assert_eq!(r1.nodes.len(), 2);
        assert_eq!(r1.nodes[0].path, "trunk");
        assert_eq!(r1.nodes[0].kind, NodeKind::Dir);
        assert_eq!(r1.nodes[1].path, "trunk/file1");
        assert_eq!(r1.nodes[1].text.as_deref(), Some(&b"hello world"[..]));
    }
}
