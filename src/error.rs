use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading and reshaping accessibility tables.
#[derive(Error, Debug)]
pub enum AccessError {
    /// A required input file does not exist.
    #[error("Input file not found: {0}")]
    MissingFile(PathBuf),

    /// A file exists but could not be opened or read.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV document could not be parsed.
    #[error("Failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A column the loader depends on is absent from the header.
    #[error("Column {column} not found in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// None of the four income tier columns could be located.
    #[error("No income tier columns recognised in {0}")]
    NoTierColumns(PathBuf),

    /// More than one column matches the same tier and no year disambiguates them.
    #[error("Ambiguous {tier} columns in {path}: {candidates:?}")]
    AmbiguousTierColumn {
        path: PathBuf,
        tier: String,
        candidates: Vec<String>,
    },

    /// A block geocode is too short to carry a tract prefix.
    #[error("Geocode '{0}' is shorter than 11 characters")]
    InvalidGeocode(String),

    /// A numeric cell could not be parsed.
    #[error("Invalid number '{value}' in column {column} of {path} (row {row})")]
    InvalidNumber {
        path: PathBuf,
        row: u64,
        column: String,
        value: String,
    },

    /// A JSON document could not be produced.
    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Caller-supplied settings are inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, AccessError>;

impl AccessError {
    /// Maps an I/O error on `path` to [`AccessError::MissingFile`] when the
    /// file is absent and [`AccessError::FileRead`] otherwise.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            AccessError::MissingFile(path)
        } else {
            AccessError::FileRead { path, source }
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        AccessError::Csv {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_not_found_is_missing_file() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = AccessError::from_io("/data/wac.csv", io_err);
        assert!(matches!(err, AccessError::MissingFile(_)));
        assert_eq!(err.to_string(), "Input file not found: /data/wac.csv");
    }

    #[test]
    fn test_from_io_other_kind_is_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = AccessError::from_io("/data/wac.csv", io_err);
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_error_display_no_tier_columns() {
        let err = AccessError::NoTierColumns(PathBuf::from("rac.csv"));
        assert_eq!(err.to_string(), "No income tier columns recognised in rac.csv");
    }

    #[test]
    fn test_error_display_invalid_number() {
        let err = AccessError::InvalidNumber {
            path: PathBuf::from("wac.csv"),
            row: 3,
            column: "C000".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid number 'abc' in column C000 of wac.csv (row 3)"
        );
    }
}
