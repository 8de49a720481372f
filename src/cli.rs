//! Command line argument definition (spec §4.9's ambient realization of the
//! excluded interactive command interpreter): a non-interactive,
//! single-shot front end over the engine — parse, optionally apply one
//! surgical operation to one selection, reserialize.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;

use crate::config::EngineOptions;
use crate::containers::OrderedIntSet;
use crate::log::WarningSink;
use crate::model::EventIndex;
use crate::repository::Repository;

const ABOUT: &str = "Interactive surgical editor for version-control repository histories, \
minus the interactive part: convert, select, and apply one operation at a time.";

#[derive(Parser, Debug)]
#[command(name = "gitsurgeon", about = ABOUT)]
pub struct Cli {
    #[clap(flatten)]
    pub log_level: LogLevelArg,

    /// Collect warnings instead of aborting on the first one.
    #[arg(long, global = true)]
    pub relax: bool,

    /// TOML config file (svn_branchify, svn_preserve, canonicalize_crlf, ...).
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Warn;

#[derive(Args, Debug)]
#[group(multiple = false)]
pub struct LogLevelArg {
    /// Use `-v` for info or `-vv` for debug messages.
    #[arg(long, short = 'v', global = true, default_value = "0", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use `-q` to also hide error messages.
    #[arg(long, short = 'q', global = true, default_value = "0", action = clap::ArgAction::Count)]
    quiet: u8,
}

impl LogLevelArg {
    pub fn value(&self) -> anyhow::Result<log::LevelFilter> {
        let levels = log::LevelFilter::iter().collect_vec();
        let mut level_i16 = levels
            .iter()
            .find_position(|level| *level == &DEFAULT_LOG_LEVEL)
            .expect("default log level must be valid")
            .0 as i16;
        level_i16 += self.verbose as i16;
        level_i16 -= self.quiet as i16;
        if level_i16 < 0 {
            anyhow::bail!("too quiet a log level");
        } else if level_i16 as usize >= levels.len() {
            anyhow::bail!("too verbose a log level");
        }
        Ok(levels[level_i16 as usize])
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum InputFormat {
    FastImport,
    SvnDump,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum Op {
    Squash,
    Delete,
    Dedup,
    Tagify,
    Expunge,
    Reparent,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse one format and reserialize as a fast-import stream.
    Convert(Convert),
    /// Parse, apply one surgical operation to one selection, and reserialize.
    Apply(Apply),
    /// Parse and print the event numbers a selection expression matches.
    Select(Select),
}

#[derive(Args, Debug)]
pub struct Convert {
    pub input: PathBuf,
    #[arg(long, value_enum)]
    pub from: InputFormat,
    #[arg(long)]
    pub to: PathBuf,
}

#[derive(Args, Debug)]
pub struct Apply {
    pub input: PathBuf,
    #[arg(long, value_enum)]
    pub from: InputFormat,
    #[arg(long)]
    pub select: String,
    #[arg(long, value_enum)]
    pub op: Op,
    #[arg(long)]
    pub to: PathBuf,
    /// Regex for `--op expunge`'s path match.
    #[arg(long)]
    pub pattern: Option<String>,
    /// `--op reparent`'s "leave fileops as-is" flag.
    #[arg(long)]
    pub rebase: bool,
    /// `--op expunge`'s "skip tagifying newly-emptied commits" flag.
    #[arg(long)]
    pub notagify: bool,
}

#[derive(Args, Debug)]
pub struct Select {
    pub input: PathBuf,
    #[arg(long, value_enum)]
    pub from: InputFormat,
    #[arg(long)]
    pub select: String,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    crate::log::set_level(cli.log_level.value()?);
    let options = match &cli.config {
        Some(path) => EngineOptions::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineOptions::default(),
    };
    let warnings = WarningSink::new(cli.relax || options.relax);

    match &cli.command {
        Commands::Convert(args) => {
            let repo = load_repo(&args.input, args.from, &options, &warnings)?;
            write_repo(&repo, &args.to)?;
        }
        Commands::Apply(args) => {
            let mut repo = load_repo(&args.input, args.from, &options, &warnings)?;
            let selection = crate::selection::select(&args.select, &mut repo)?;
            apply_op(&mut repo, args, &selection, &warnings)?;
            write_repo(&repo, &args.to)?;
        }
        Commands::Select(args) => {
            let mut repo = load_repo(&args.input, args.from, &options, &warnings)?;
            let selection = crate::selection::select(&args.select, &mut repo)?;
            for idx in selection.sorted() {
                println!("{idx}");
            }
        }
    }

    for message in warnings.messages() {
        eprintln!("warning: {message}");
    }
    Ok(())
}

fn load_repo(path: &Path, format: InputFormat, options: &EngineOptions, warnings: &WarningSink) -> anyhow::Result<Repository> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    match format {
        InputFormat::FastImport => {
            let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("repo").to_string();
            let mut repo = Repository::new(name);
            crate::fastimport::reader::FastImportReader::new(&data).parse_into(&mut repo)?;
            Ok(repo)
        }
        InputFormat::SvnDump => crate::svndump::import_dumpfile(&data, options, warnings),
    }
}

fn write_repo(repo: &Repository, to: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(to).with_context(|| format!("creating {}", to.display()))?;
    let mut writer =
        crate::fastimport::writer::FastImportWriter::new(file, crate::fastimport::writer::StyleFlags::default());
    writer.write_all(repo)
}

fn apply_op(repo: &mut Repository, args: &Apply, selection: &OrderedIntSet, warnings: &WarningSink) -> anyhow::Result<()> {
    match args.op {
        Op::Squash => crate::ops::delete_commits(repo, selection, crate::ops::DeleteMode::Squash, warnings),
        Op::Delete => crate::ops::delete_commits(repo, selection, crate::ops::DeleteMode::Delete, warnings),
        Op::Dedup => crate::ops::dedup(repo, selection),
        Op::Tagify => crate::ops::tagify(repo, selection, crate::ops::TagifyOptions::default(), warnings),
        Op::Expunge => {
            let pattern = args.pattern.as_deref().context("--op expunge requires --pattern")?;
            let re = regex::Regex::new(pattern)?;
            // The shadow repository of expunged content is a separate
            // artifact this single-shot command has nowhere to write; a
            // future `--expunge-to` flag could hand it a second `--to`.
            let _shadow = crate::ops::expunge(
                repo,
                selection,
                |path: &[u8]| re.is_match(&String::from_utf8_lossy(path)),
                args.notagify,
                warnings,
            )?;
            Ok(())
        }
        Op::Reparent => {
            let chain: Vec<EventIndex> = selection.sorted().into_iter().map(|i| i as usize).collect();
            crate::ops::reparent(repo, &chain, crate::ops::ReparentOptions { rebase: args.rebase }, warnings)
        }
    }
}
