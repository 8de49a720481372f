//! Selection-set sublanguage (spec §4.6): compiles a small query language
//! into a function over the event vector.

pub mod eval;
pub mod lexer;
pub mod parser;

use crate::containers::OrderedIntSet;
use crate::repository::Repository;

/// Parses and evaluates `expr` against every event in `repo` (an implicit
/// preselection of the whole vector). This is the entry point the CLI and
/// surgical operations use.
pub fn select(expr: &str, repo: &mut Repository) -> anyhow::Result<OrderedIntSet> {
    let ast = parser::Parser::parse(expr)?;
    let full = OrderedIntSet::from_iter((0..repo.len() as i64).collect::<Vec<_>>());
    eval::evaluate(&ast, repo, &full)
}

/// As `select`, but narrowed to an explicit preselection — used when an
/// operation wants to run a follow-up selector over a set it already
/// computed.
pub fn select_within(expr: &str, repo: &mut Repository, preselection: &OrderedIntSet) -> anyhow::Result<OrderedIntSet> {
    let ast = parser::Parser::parse(expr)?;
    eval::evaluate(&ast, repo, preselection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribution, Commit, Date, Event};

    #[test]
    fn select_empty_expression_yields_everything() {
        let mut repo = Repository::new("r");
        repo.push(Event::Commit(Commit::new(
            "refs/heads/master",
            Attribution::new("U", "u@x", Date::new(0, 0)),
        )));
        let set = select("", &mut repo).unwrap();
        assert_eq!(set.sorted(), vec![0]);
    }
}
