//! Surgical operations (spec §4.4): the editing primitives a session
//! applies to a loaded `Repository`. Each submodule implements one verb;
//! `canonicalize` underlies most of the others, since every fileop-list
//! mutation must be re-reduced to canonical form before it is trusted.

pub mod canonicalize;
pub mod cut_unite_graft;
pub mod dedup;
pub mod expunge;
pub mod reorder;
pub mod reparent;
pub mod squash;
pub mod tagify;

pub use canonicalize::canonicalize_fileops;
pub use cut_unite_graft::{cut, graft, unite};
pub use dedup::dedup;
pub use expunge::expunge;
pub use reorder::reorder;
pub use reparent::{reparent, ReparentOptions};
pub use squash::{delete_commits, DeleteMode};
pub use tagify::{tagify, TagifyOptions};
