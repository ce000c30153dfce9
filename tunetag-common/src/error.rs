//! Library-side errors shared by the tunetag crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the library database and the config file
///
/// Request validation lives with the service that owns the request, so
/// there is no input-error variant here.
#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the database folder
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or unparsable config file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Song, album or playlist absent from the library
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored row that cannot be decoded, or a store failure
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_folder(path: &std::path::Path) -> Result<()> {
        std::fs::create_dir(path)?;
        Ok(())
    }

    #[test]
    fn test_io_failure_converts_with_question_mark() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_folder(&dir.path().join("missing/parent")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("IO error: "));
    }

    #[test]
    fn test_not_found_message_names_the_resource() {
        let err = Error::NotFound("Album al-1".to_string());
        assert_eq!(err.to_string(), "Not found: Album al-1");
    }
}
