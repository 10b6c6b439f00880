use thiserror::Error;

/// Fatal load-time failures. The analyzer is either fully constructed or not
/// constructed at all; none of these can occur after initialization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataFormatError {
    #[error("could not read input: {0}")]
    UnreadableInput(String),
    #[error("missing required column: {0}")]
    MissingColumn(String),
    #[error("row {row}: unparseable order date '{value}'")]
    BadOrderDate { row: usize, value: String },
    #[error("row {row}: {message}")]
    BadRow { row: usize, message: String },
}
