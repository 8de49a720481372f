//! The four error kinds the engine distinguishes (spec §7). Library code
//! mostly returns `anyhow::Result<T>` for day to day propagation, wrapping
//! one of these typed errors at the point a precondition actually fails so
//! that callers (the CLI, tests) can `downcast_ref` to tell them apart.

/// Malformed fast-import or Subversion input. Carries the 1-based input
/// line number where parsing gave up, when known.
#[derive(thiserror::Error, Debug)]
#[error("parse error at line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        ParseError {
            line,
            message: message.into(),
        }
    }
}

/// A surgical operation's precondition failed: bad selection, unknown
/// mark, conflicting policy options. The repository is left as it was
/// entering the command.
#[derive(thiserror::Error, Debug)]
#[error("command error: {0}")]
pub struct CommandError(pub String);

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        CommandError(message.into())
    }
}

/// An external VCS helper misbehaved while extracting a repository.
#[derive(thiserror::Error, Debug)]
#[error("extractor error: {0}")]
pub struct ExtractorError(pub String);

/// A malformed RFC822-style update stream.
#[derive(thiserror::Error, Debug)]
#[error("msgbox error: {0}")]
pub struct MsgboxError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_formats_with_line() {
        let err = ParseError::new(42, "expected 'commit' line");
        assert_eq!(err.to_string(), "parse error at line 42: expected 'commit' line");
    }

    #[test]
    fn command_error_downcastable_from_anyhow() {
        let err: anyhow::Error = CommandError::new("unknown mark :7").into();
        let command_err = err.downcast_ref::<CommandError>();
        assert!(command_err.is_some());
    }
}
