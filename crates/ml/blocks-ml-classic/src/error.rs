use thiserror::Error;

/// Result type for ML operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ML operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter value: {0}")]
    InvalidParameter(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("dataset rows have inconsistent length: row 0 has {expected} fields, row {row} has {got}")]
    ShapeMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("dataset entry at row {row}, column {col} is not 0 or 1: {value}")]
    NonBinaryEntry { row: usize, col: usize, value: u8 },

    #[error("dataset has no rows")]
    EmptyDataset,

    #[error("malformed tree serialization: {0}")]
    MalformedSerialization(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_error_messages() {
        let err = Error::ShapeMismatch {
            row: 3,
            expected: 2,
            got: 3,
        };
        assert_eq!(
            err.to_string(),
            "dataset rows have inconsistent length: row 0 has 2 fields, row 3 has 3"
        );

        let err = Error::NonBinaryEntry {
            row: 1,
            col: 0,
            value: 7,
        };
        assert_eq!(
            err.to_string(),
            "dataset entry at row 1, column 0 is not 0 or 1: 7"
        );

        assert_eq!(Error::EmptyDataset.to_string(), "dataset has no rows");

        let err = Error::MalformedSerialization("unbalanced parens".to_string());
        assert_eq!(
            err.to_string(),
            "malformed tree serialization: unbalanced parens"
        );
    }
}