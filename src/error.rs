//! Error types for the wash trade detector

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wash trade detector
#[derive(Error, Debug)]
pub enum Error {
    // Ingestion errors
    #[error("Trade table is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Malformed trade row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Unknown trader address: {0}")]
    UnknownTrader(String),

    // Detection errors
    #[error("Cluster not registered: {0}")]
    UnknownCluster(String),

    #[error("Cluster detection cancelled while peeling token {token}")]
    Cancelled { token: String },

    // Serialization errors
    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error means the input ledger itself is unusable
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::MissingColumns(_) | Error::MalformedRow { .. } | Error::UnknownTrader(_)
        )
    }
}

// Conversion from csv errors
impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message() {
        let err = Error::MissingColumns(vec!["token".to_string(), "cut".to_string()]);
        assert_eq!(
            err.to_string(),
            "Trade table is missing required columns: token, cut"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn test_input_error_classification() {
        let errors = vec![
            Error::MissingColumns(vec!["cut".to_string()]),
            Error::MalformedRow {
                line: 3,
                reason: "bad amount".to_string(),
            },
            Error::UnknownTrader("0xabc".to_string()),
            Error::UnknownCluster("deadbeef".to_string()),
            Error::Cancelled {
                token: "0xabc".to_string(),
            },
            Error::Csv("broken".to_string()),
            Error::Serialization("broken".to_string()),
            Error::Io("broken".to_string()),
            Error::Internal("broken".to_string()),
        ];

        for err in errors {
            let input = match &err {
                Error::MissingColumns(_) | Error::MalformedRow { .. } | Error::UnknownTrader(_) => true,
                Error::UnknownCluster(_)
                | Error::Cancelled { .. }
                | Error::Csv(_)
                | Error::Serialization(_)
                | Error::Io(_)
                | Error::Internal(_) => false,
            };
            assert_eq!(err.is_input_error(), input, "{}", err);
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn test_cancelled_is_not_input_error() {
        let err = Error::Cancelled {
            token: "0xabc".to_string(),
        };
        assert!(!err.is_input_error());
    }
}
