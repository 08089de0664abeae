//! Error types for needle.

use thiserror::Error;

/// Compiler error taxonomy. The bracketed prefixes match what visitors
/// print when accumulating diagnostics.
#[derive(Debug, Error)]
pub enum NeedleError {
    /// XML shape, identifier rules, duplicated names, invalid durations,
    /// invalidation targets that are missing or uncached.
    #[error("[InvalidConfig] {0}")]
    InvalidConfig(String),

    /// The SQL parser rejected a statement.
    #[error("[ParseError] {0}")]
    Parse(String),

    /// Statement shape outside the supported subset.
    #[error("[NotSupported] {0}")]
    NotSupported(String),

    /// Semantic failure during normalization.
    #[error("[InvalidExpr] {0}")]
    InvalidExpr(String),

    /// Conflicting or un-inferable types.
    #[error("[TypeCheck] {0}")]
    TypeCheck(String),

    /// The compiler's own invariant was violated.
    #[error("[CompilerError] {0}")]
    Compiler(String),

    /// Several accumulated errors, one per line.
    #[error("{0}")]
    Many(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl NeedleError {
    /// Merge accumulated visitor errors into a single error, one message
    /// per line, preserving order.
    pub fn merge(errs: Vec<NeedleError>) -> NeedleError {
        let msg = errs
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        NeedleError::Many(msg)
    }
}

impl From<sqlparser::parser::ParserError> for NeedleError {
    fn from(e: sqlparser::parser::ParserError) -> Self {
        NeedleError::Parse(e.to_string())
    }
}

/// Result type alias for needle operations.
pub type NeedleResult<T> = Result<T, NeedleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NeedleError::InvalidExpr("ambiguous expression: username".into());
        assert_eq!(
            err.to_string(),
            "[InvalidExpr] ambiguous expression: username"
        );
    }

    #[test]
    fn test_merge_keeps_order() {
        let merged = NeedleError::merge(vec![
            NeedleError::NotSupported("subquery".into()),
            NeedleError::TypeCheck("In type mismatch".into()),
        ]);
        assert_eq!(
            merged.to_string(),
            "[NotSupported] subquery\n[TypeCheck] In type mismatch"
        );
    }
}
