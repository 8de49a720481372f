//! Subversion dumpfile import. [`reader`] parses the dumpfile grammar into
//! revision/node records; [`importer`] replays them through the seven-phase
//! pipeline (branch identification, file-map tracking, copy
//! materialization, commit synthesis, parent wiring, and cleanup) that
//! turns them into fast-import events.

pub mod importer;
pub mod reader;

pub use importer::{import, import_dumpfile};
pub use reader::{Dump, DumpReader};
