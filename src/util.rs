//! Small helpers shared across modules, adapted from the teacher's
//! `util.rs`. Only the pieces this engine actually reaches for are kept.

use itertools::Itertools as _;

/// Consumes an iterator to the end to check if it is non-empty and all
/// elements are equal. Used by manifest/attachment code that wants "do all
/// of these agree" without writing the loop out each time.
pub trait IterSingleUnique<T> {
    fn single_unique(self) -> Option<T>;
}

impl<I, T> IterSingleUnique<T> for I
where
    I: IntoIterator<Item = T>,
    T: PartialEq,
{
    fn single_unique(self) -> Option<T> {
        let mut iter = self.into_iter();
        let first = iter.next()?;
        for item in iter {
            if item != first {
                return None;
            }
        }
        Some(first)
    }
}

/// Normalize a path in the abstract, without filesystem access: collapse
/// `.` segments and resolve `..` against preceding segments. Used by the
/// Subversion importer when composing synthesized paths from copy
/// sources, and by the path-set selector when matching literal paths.
///
/// ```
/// assert_eq!(gitsurgeon::util::normalize("A/b/../C"), "A/C");
/// assert_eq!(gitsurgeon::util::normalize("B/D"), "B/D");
/// assert_eq!(gitsurgeon::util::normalize("E//./F"), "E/F");
/// ```
pub fn normalize(p: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for part in p.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            stack.pop();
        } else {
            stack.push(part);
        }
    }
    stack.into_iter().join("/")
}

/// Removes trailing LF or CRLF from a string.
///
/// ```
/// use gitsurgeon::util::trim_newline_suffix;
///
/// assert_eq!(trim_newline_suffix("foo"), "foo");
/// assert_eq!(trim_newline_suffix("foo\n"), "foo");
/// assert_eq!(trim_newline_suffix("foo\r\n"), "foo");
/// ```
pub fn trim_newline_suffix(line: &str) -> &str {
    let Some(line) = line.strip_suffix('\n') else {
        return line;
    };
    line.strip_suffix('\r').unwrap_or(line)
}

/// Removes trailing LF or CRLF from a byte string.
pub fn trim_bytes_newline_suffix(s: &[u8]) -> &[u8] {
    let Some(s) = s.strip_suffix(b"\n") else {
        return s;
    };
    s.strip_suffix(b"\r").unwrap_or(s)
}

/// Returns true if the given value is the default value for the type.
/// Handy with `#[serde(skip_serializing_if = "is_default")]`.
pub fn is_default<T: Default + PartialEq>(t: &T) -> bool {
    *t == Default::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_unique_variants() {
        assert_eq!(Vec::<i32>::new().single_unique(), None);
        assert_eq!(vec![1].single_unique(), Some(1));
        assert_eq!(vec![1, 1, 1].single_unique(), Some(1));
        assert_eq!(vec![1, 2, 1].single_unique(), None);
    }

    #[test]
    fn normalize_examples() {
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("../a"), "a");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn trim_newline_variants() {
        assert_eq!(trim_newline_suffix("foo\r\n"), "foo");
        assert_eq!(trim_bytes_newline_suffix(b"foo\n"), b"foo");
    }
}
