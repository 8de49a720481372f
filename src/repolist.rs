//! A named collection of repositories plus the currently chosen one (spec
//! §3.8), the host for cross-repository operations like unite/graft.

use crate::repository::Repository;

pub struct RepositoryList {
    repos: Vec<Repository>,
    current: Option<usize>,
}

impl RepositoryList {
    pub fn new() -> Self {
        RepositoryList { repos: Vec::new(), current: None }
    }

    pub fn add(&mut self, repo: Repository) -> usize {
        let index = self.repos.len();
        self.repos.push(repo);
        if self.current.is_none() {
            self.current = Some(index);
        }
        index
    }

    pub fn by_name(&self, name: &str) -> Option<&Repository> {
        self.repos.iter().find(|r| r.name == name)
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Repository> {
        self.repos.iter_mut().find(|r| r.name == name)
    }

    pub fn current(&self) -> Option<&Repository> {
        self.current.and_then(|i| self.repos.get(i))
    }

    pub fn current_mut(&mut self) -> Option<&mut Repository> {
        self.current.and_then(move |i| self.repos.get_mut(i))
    }

    pub fn select(&mut self, name: &str) -> bool {
        if let Some(i) = self.repos.iter().position(|r| r.name == name) {
            self.current = Some(i);
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Repository> {
        let pos = self.repos.iter().position(|r| r.name == name)?;
        let removed = self.repos.remove(pos);
        self.current = match self.current {
            Some(i) if i == pos => self.repos.first().map(|_| 0),
            Some(i) if i > pos => Some(i - 1),
            other => other,
        };
        Some(removed)
    }

    pub fn names(&self) -> Vec<&str> {
        self.repos.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Picks a fresh name derived from `base` by appending one of the
    /// reserved suffixes (`-early`, `-late`, `-expunges`) spec §6.4
    /// reserves for cut/expunge, falling back to a numeric suffix if that
    /// name is already taken.
    pub fn fresh_name(&self, base: &str, suffix: &str) -> String {
        let candidate = format!("{base}-{suffix}");
        if self.by_name(&candidate).is_none() {
            return candidate;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{suffix}{n}");
            if self.by_name(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

impl Default for RepositoryList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sets_current_to_first() {
        let mut list = RepositoryList::new();
        list.add(Repository::new("a"));
        assert_eq!(list.current().unwrap().name, "a");
    }

    #[test]
    fn remove_current_falls_back() {
        let mut list = RepositoryList::new();
        list.add(Repository::new("a"));
        list.add(Repository::new("b"));
        list.select("a");
        list.remove("a");
        assert_eq!(list.current().unwrap().name, "b");
    }

    #[test]
    fn fresh_name_avoids_collisions() {
        let mut list = RepositoryList::new();
        list.add(Repository::new("proj-early"));
        assert_eq!(list.fresh_name("proj", "early"), "proj-early2");
    }
}
