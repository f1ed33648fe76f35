// ABOUTME: Error types for tokenization, parsing, and script execution failures

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ScriptError {
    /// Unrecognized character sequence at a source position
    #[error("lexical error at {line}:{col}: unrecognized input near '{near}'")]
    Lexical { line: usize, col: usize, near: String },

    /// The grammar matched no rule for the current token sequence
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Unbalanced if/endif or loop/endloop structure
    #[error("structural error: {0}")]
    Structural(String),

    /// Evaluation-time failure: non-numeric arithmetic, bad index, division by zero
    #[error("{0}")]
    Semantic(String),

    /// Network failure, timeout, DNS failure
    #[error("I/O error: {0}")]
    Io(String),

    /// An assert/expect statement evaluated to false
    #[error("assertion failed: {check}: expected {expected}, got {actual}")]
    AssertionFailed {
        check: String,
        expected: String,
        actual: String,
    },

    /// break/continue raised where no loop can consume it
    #[error("'{0}' outside of a loop")]
    StrayControlFlow(String),

    /// Wraps any error with the script line it occurred on
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<ScriptError>,
    },
}

impl ScriptError {
    pub fn syntax(message: impl Into<String>) -> Self {
        ScriptError::Syntax(message.into())
    }

    pub fn structural(message: impl Into<String>) -> Self {
        ScriptError::Structural(message.into())
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        ScriptError::Semantic(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        ScriptError::Io(message.into())
    }

    pub fn assertion(
        check: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        ScriptError::AssertionFailed {
            check: check.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Attach a script line number unless one is already attached.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            ScriptError::AtLine { .. } => self,
            other => ScriptError::AtLine {
                line,
                source: Box::new(other),
            },
        }
    }

    /// True for the assert/expect family, which is the only statement kind
    /// allowed to fail an otherwise well-formed script.
    pub fn is_assertion_failure(&self) -> bool {
        match self {
            ScriptError::AssertionFailed { .. } => true,
            ScriptError::AtLine { source, .. } => source.is_assertion_failure(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_line_prefixes_message() {
        let err = ScriptError::semantic("division by zero").at_line(7);
        assert_eq!(format!("{}", err), "line 7: division by zero");
    }

    #[test]
    fn test_at_line_does_not_double_wrap() {
        let err = ScriptError::syntax("bad token").at_line(3).at_line(9);
        assert_eq!(format!("{}", err), "line 3: syntax error: bad token");
    }

    #[test]
    fn test_assertion_failure_detection() {
        let err = ScriptError::assertion("status", "200", "404");
        assert!(err.is_assertion_failure());
        assert!(err.clone().at_line(2).is_assertion_failure());
        assert!(!ScriptError::semantic("x").is_assertion_failure());
    }

    #[test]
    fn test_assertion_message_shape() {
        let err = ScriptError::assertion("status", "200", "500");
        assert_eq!(
            format!("{}", err),
            "assertion failed: status: expected 200, got 500"
        );
    }
}
