// Error Handling
//
// *La Gestion des Erreurs* (The Error Management) - CLI error types and user-facing hints

use leprocesseur::ProcessorError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, PasserelleError>;

/// Errors surfaced by the `leserie` front end
#[derive(Debug, Error)]
pub enum PasserelleError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong
        message: String,
        /// How to fix it
        suggestion: Option<String>,
    },

    /// I/O errors with context
    #[error("I/O error: {context} (path: {path:?})")]
    Io {
        /// What was being done
        context: String,
        /// Path involved
        path: Option<PathBuf>,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The script could not be processed at all
    #[error("Script error in {path:?}: {message}")]
    Script {
        /// Script path
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// The processor failed outside any single command
    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),
}

impl PasserelleError {
    /// Create a config error
    pub fn config_error(message: impl Into<String>, suggestion: Option<String>) -> Self {
        PasserelleError::Config {
            message: message.into(),
            suggestion,
        }
    }

    /// Create an I/O error
    pub fn io_error(
        context: impl Into<String>,
        path: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        PasserelleError::Io {
            context: context.into(),
            path,
            source,
        }
    }

    /// Create a script error
    pub fn script_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PasserelleError::Script {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Get a suggestion for fixing the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            PasserelleError::Config { suggestion, .. } => suggestion.clone(),
            PasserelleError::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => Some("Check that the path exists.".to_string()),
                std::io::ErrorKind::PermissionDenied => {
                    Some("Check file permissions.".to_string())
                }
                _ => None,
            },
            PasserelleError::Script { .. } => {
                Some("Run `leserie check` to see per-line problems.".to_string())
            }
            PasserelleError::Processor(ProcessorError::WorkerPanicked) => {
                Some("This is a software defect; report the script that triggered it.".to_string())
            }
            PasserelleError::Processor(_) => None,
        }
    }
}

/// Format an error for display, with its suggestion on a second line
pub fn format_error(error: &PasserelleError) -> String {
    match error.suggestion() {
        Some(suggestion) => format!("Error: {error}\nSuggestion: {suggestion}"),
        None => format!("Error: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_keeps_suggestion() {
        let err = PasserelleError::config_error("bad level", Some("Use info".to_string()));
        assert_eq!(err.suggestion().as_deref(), Some("Use info"));
        assert!(format_error(&err).contains("Suggestion: Use info"));
    }

    #[test]
    fn test_missing_file_suggestion() {
        let err = PasserelleError::io_error(
            "reading script",
            Some(PathBuf::from("x.leserie")),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.suggestion().is_some_and(|s| s.contains("exists")));
        assert!(err.to_string().contains("reading script"));
    }

    #[test]
    fn test_processor_error_converts() {
        let err: PasserelleError = ProcessorError::WorkerPanicked.into();
        assert!(matches!(err, PasserelleError::Processor(_)));
        assert!(err.suggestion().is_some());
    }
}
