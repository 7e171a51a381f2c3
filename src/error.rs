use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the generator core
pub type Result<T> = std::result::Result<T, Error>;

/// Error types raised while turning declarations into a Swagger document
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// More than one declaration matched a type name
    #[error("Multiple matching declarations found for type '{name}'")]
    AmbiguousName { name: String },

    /// No declaration matched a type name
    #[error("No matching declaration found for type '{name}'")]
    MissingDeclaration { name: String },

    /// A type expression the resolver cannot model
    #[error("Unsupported type: {description}")]
    UnsupportedType { description: String },

    /// An index signature whose key is not a string
    #[error("Only string indexers are supported (type '{name}' is indexed by {found})")]
    NonStringIndexer { name: String, found: String },

    /// Failure while resolving the members of a named reference type
    #[error("Error resolving type '{name}': {source}")]
    Resolution {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// Invalid controller or method modeling, located as `Controller.method`
    #[error("{message} in '{location}'")]
    Endpoint { location: String, message: String },

    /// Source file could not be lowered into declarations
    #[error("Parse error in {}: {message}", file.display())]
    Parse { file: PathBuf, message: String },

    /// Strict-mode OpenAPI 3 conversion failure
    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Builds an endpoint error for the given controller/method location.
    pub fn endpoint(location: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Endpoint {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Wraps `self` so the message names the type being resolved.
    ///
    /// Already-wrapped errors are passed through to keep the innermost type name.
    pub fn resolving(self, name: &str) -> Self {
        match self {
            Error::Resolution { .. } => self,
            other => Error::Resolution {
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_error_message() {
        let err = Error::endpoint("PeopleController.get", "Duplicated verb annotation");
        assert_eq!(
            err.to_string(),
            "Duplicated verb annotation in 'PeopleController.get'"
        );
    }

    #[test]
    fn test_resolution_keeps_innermost_name() {
        let err = Error::MissingDeclaration {
            name: "Ghost".to_string(),
        }
        .resolving("Inner")
        .resolving("Outer");

        match err {
            Error::Resolution { name, source } => {
                assert_eq!(name, "Inner");
                assert!(matches!(*source, Error::MissingDeclaration { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
