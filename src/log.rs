//! Ambient logging and the process-wide abort flag (spec §5). Leveled
//! messages go through the `log` facade; `tracing` spans wrap the
//! suspension-point loops named in spec §5 so a trace collector can see
//! where time is spent without the core caring who's listening.

use colored::Colorize as _;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

static GLOBAL_LOGGER: OnceLock<GlobalLogger> = OnceLock::new();

/// Installs the process-wide logger. Idempotent beyond the first call:
/// later calls are no-ops so tests can call it freely.
pub fn init() {
    if GLOBAL_LOGGER.get().is_some() {
        return;
    }
    let logger = GlobalLogger {
        level: Mutex::new(log::LevelFilter::Info),
    };
    if GLOBAL_LOGGER.set(logger).is_ok() {
        let global = GLOBAL_LOGGER.get().unwrap();
        let _ = log::set_logger(global);
        log::set_max_level(log::LevelFilter::Trace);
    }
    // Separate from the `log` facade above: a `tracing` subscriber for the
    // suspension-point spans below, silent unless `RUST_LOG` is set, so a
    // trace collector can attach without the core caring who's listening.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn set_level(level: log::LevelFilter) {
    init();
    *GLOBAL_LOGGER.get().unwrap().level.lock().unwrap() = level;
}

struct GlobalLogger {
    level: Mutex<log::LevelFilter>,
}

impl log::Log for GlobalLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= *self.level.lock().unwrap()
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{}: {}", level_colored(record.level()), record.args());
        }
    }

    fn flush(&self) {}
}

fn level_colored(level: log::Level) -> colored::ColoredString {
    let s = level.as_str();
    match level {
        log::Level::Error => s.red().bold(),
        log::Level::Warn => s.yellow().bold(),
        log::Level::Info => s.green(),
        log::Level::Debug => s.blue(),
        log::Level::Trace => s.into(),
    }
}

/// The engine's single concurrency primitive (spec §5): a process-wide
/// abort flag set by a signal handler and polled at every suspension
/// point (between events in the parse loops, between revisions in the
/// Subversion synthesis loop, between commits in squash/expunge/
/// canonicalize walks).
static ABORT_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Registers a SIGINT/SIGTERM handler that sets the abort flag. Safe to
/// call more than once; later registrations are ignored.
pub fn install_abort_handler() -> anyhow::Result<()> {
    // SIGTERM and SIGINT both request a clean stop at the next poll point.
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGINT, || {
            ABORT_REQUESTED.store(true, Ordering::SeqCst);
        })?;
        signal_hook::low_level::register(signal_hook::consts::SIGTERM, || {
            ABORT_REQUESTED.store(true, Ordering::SeqCst);
        })?;
    }
    Ok(())
}

pub fn abort_requested() -> bool {
    ABORT_REQUESTED.load(Ordering::SeqCst)
}

/// Test-only: resets the abort flag so tests don't leak state into each
/// other.
#[cfg(test)]
pub fn reset_abort_for_test() {
    ABORT_REQUESTED.store(false, Ordering::SeqCst);
}

/// A cooperative interruption: `Interrupted` means the abort flag was
/// observed set partway through a bulk loop. Callers that built a
/// replacement repository (expunge, cut) must discard it on this variant
/// per spec §5's cancellation semantics.
pub enum InterruptedError {
    Normal(anyhow::Error),
    Interrupted,
}

impl From<anyhow::Error> for InterruptedError {
    fn from(err: anyhow::Error) -> Self {
        InterruptedError::Normal(err)
    }
}

pub type InterruptedResult<T> = Result<T, InterruptedError>;

/// Accumulates warnings raised by `croak` during a bulk operation so that
/// quiet/script mode can flush them at the end instead of interleaving
/// with other output, per spec §7's warning semantics.
#[derive(Clone, Default)]
pub struct WarningSink {
    messages: Arc<Mutex<Vec<String>>>,
    /// In non-interactive (script) mode a warning sets the abort flag
    /// unless `relax` was requested, so a script halts on first complaint.
    relax: bool,
}

impl WarningSink {
    pub fn new(relax: bool) -> Self {
        WarningSink {
            messages: Arc::new(Mutex::new(Vec::new())),
            relax,
        }
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.messages.lock().unwrap().push(message);
        if !self.relax {
            ABORT_REQUESTED.store(true, Ordering::SeqCst);
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_sink_collects_messages() {
        let sink = WarningSink::new(true);
        sink.warn("first");
        sink.warn("second");
        assert_eq!(sink.messages(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn warning_sink_sets_abort_unless_relaxed() {
        reset_abort_for_test();
        let sink = WarningSink::new(false);
        sink.warn("oops");
        assert!(abort_requested());
        reset_abort_for_test();
    }
}
