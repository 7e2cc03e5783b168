use thiserror::Error;

/// Main error type for extraction operations
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("No functions matched the selection criteria")]
    EmptySelection,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExtractError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Stable identifier of the error kind, reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Parse { .. } => "parse",
            Self::EmptySelection => "empty_selection",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(ExtractError::Config("x".into()).kind(), "config");
        assert_eq!(ExtractError::parse(3, "bad").kind(), "parse");
        assert_eq!(ExtractError::EmptySelection.kind(), "empty_selection");
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ExtractError::from(io).kind(), "io");
    }

    #[test]
    fn test_parse_error_mentions_line() {
        let err = ExtractError::parse(42, "unterminated function body");
        assert_eq!(
            err.to_string(),
            "Parse error at line 42: unterminated function body"
        );
    }
}
