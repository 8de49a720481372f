//! The VCS driver interface (spec §6.3), realized as data only: command
//! templates are strings the core never executes (spec §1 scopes the
//! actual process-spawning out — "only the interface is in scope").

use regex::Regex;

/// Everything the core needs to know about a target VCS to hint at
/// defaults and recognize legacy-reference cookies, without ever shelling
/// out itself (spec §6.3).
#[derive(Clone)]
pub struct VcsDriver {
    pub name: &'static str,
    /// Characteristic subdirectory used to detect a checkout (e.g. `.git`).
    pub subdirectory: &'static str,
    /// May contain `${tempfile}` or `${basename}`.
    pub exporter_template: &'static str,
    pub importer_template: &'static str,
    pub initializer_template: &'static str,
    pub checkout_template: Option<&'static str>,
    pub default_ignore_blob: &'static str,
    pub ignorename: &'static str,
    pub prenuke: &'static [&'static str],
    pub preserve: &'static [&'static str],
    /// Regexes recognizing legacy reference cookies (`$Id$`, `r12345`,
    /// etc.) embedded in commit comments.
    pub legacy_cookie_patterns: &'static [&'static str],
}

impl VcsDriver {
    pub fn legacy_cookie_regexes(&self) -> Vec<Regex> {
        self.legacy_cookie_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    }
}

pub const GIT: VcsDriver = VcsDriver {
    name: "git",
    subdirectory: ".git",
    exporter_template: "git fast-export --all",
    importer_template: "git fast-import",
    initializer_template: "git init --bare ${basename}",
    checkout_template: Some("git checkout"),
    default_ignore_blob: "",
    ignorename: ".gitignore",
    prenuke: &[".git/hooks"],
    preserve: &[".git/config"],
    legacy_cookie_patterns: &[r"\$Id:?\s*([0-9a-f]+)"],
};

pub const HG: VcsDriver = VcsDriver {
    name: "hg",
    subdirectory: ".hg",
    exporter_template: "hg fast-export",
    importer_template: "hg fastimport ${tempfile}",
    initializer_template: "hg init ${basename}",
    checkout_template: Some("hg update"),
    default_ignore_blob: "syntax: glob\n",
    ignorename: ".hgignore",
    prenuke: &[".hg/hgrc"],
    preserve: &[".hg/hgrc"],
    legacy_cookie_patterns: &[r"changeset:\s*(\d+):([0-9a-f]+)"],
};

pub const BZR: VcsDriver = VcsDriver {
    name: "bzr",
    subdirectory: ".bzr",
    exporter_template: "bzr fast-export ${basename}",
    importer_template: "bzr fast-import ${tempfile}",
    initializer_template: "bzr init ${basename}",
    checkout_template: None,
    default_ignore_blob: "",
    ignorename: ".bzrignore",
    prenuke: &[],
    preserve: &[],
    legacy_cookie_patterns: &[r"revno:\s*(\d+)"],
};

pub const SVN: VcsDriver = VcsDriver {
    name: "svn",
    subdirectory: ".svn",
    exporter_template: "svnadmin dump ${basename}",
    importer_template: "",
    initializer_template: "svnadmin create ${basename}",
    checkout_template: Some("svn checkout"),
    default_ignore_blob: "",
    ignorename: ".gitignore",
    prenuke: &[],
    preserve: &[],
    legacy_cookie_patterns: &[r"\br(\d+)\b", r"\$Revision:?\s*(\d+)\s*\$"],
};

/// Looks up a built-in driver by name.
pub fn by_name(name: &str) -> Option<VcsDriver> {
    match name {
        "git" => Some(GIT),
        "hg" | "mercurial" => Some(HG),
        "bzr" | "bazaar" => Some(BZR),
        "svn" | "subversion" => Some(SVN),
        _ => None,
    }
}

/// Subversion's canonical default ignore patterns, prepended to
/// synthesized `.gitignore`s on branch roots unless `--user-ignores`
/// (spec §4.3 phase 5).
pub const SVN_DEFAULT_IGNORES: &str = "*.o\n*.lo\n*.la\n#*#\n.*.rej\n*.rej\n.*~\n*~\n.#*\n.DS_Store\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_name_resolves_aliases() {
        assert_eq!(by_name("mercurial").unwrap().name, "hg");
        assert!(by_name("nonexistent").is_none());
    }

    #[test]
    fn svn_legacy_cookie_matches_revision_reference() {
        let driver = SVN;
        let regexes = driver.legacy_cookie_regexes();
        assert!(regexes.iter().any(|r| r.is_match("see r12345 for details")));
    }
}
