//! Error types for registry operations and factory failures.

use std::error::Error as StdError;

use thiserror::Error;

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The identifier is already bound to a different factory and the registry
    /// rejects conflicting registrations.
    #[error("identifier '{id}' is already bound to a different factory")]
    RegistrationConflict { id: String },

    /// A registration was attempted with an empty identifier list.
    #[error("no identifiers given for factory registration")]
    NoIdentifiers,

    /// An identifier was the empty string.
    #[error("invalid identifier '{id}'")]
    InvalidIdentifier { id: String },

    /// The factory bound to the identifier failed to produce an instance.
    #[error("factory for '{id}' failed: {source}")]
    Factory {
        id: String,
        #[source]
        source: FactoryError,
    },

    /// An adapter factory returned an adapter of a different type than requested.
    #[error("adapter for '{id}' is not of type {type_name}")]
    TypeMismatch { id: String, type_name: &'static str },
}

/// Failure raised by a factory while producing an instance.
///
/// Factories are foreign code, so the error carries a message and optionally the
/// underlying cause.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FactoryError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl FactoryError {
    /// Creates an error with a message and no underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying error, using its display text as the message.
    pub fn from_source(source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Wraps an underlying error with a custom message.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_conflict_display() {
        let err = RegistryError::RegistrationConflict { id: "a".into() };
        assert_eq!(
            err.to_string(),
            "identifier 'a' is already bound to a different factory"
        );
    }

    #[test]
    fn test_no_identifiers_display() {
        let err = RegistryError::NoIdentifiers;
        assert_eq!(err.to_string(), "no identifiers given for factory registration");
    }

    #[test]
    fn test_factory_display_includes_cause() {
        let err = RegistryError::Factory {
            id: "login".into(),
            source: FactoryError::new("template missing"),
        };
        assert_eq!(err.to_string(), "factory for 'login' failed: template missing");
    }

    #[test]
    fn test_factory_error_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = FactoryError::with_source("could not load widget", io);
        assert_eq!(err.to_string(), "could not load widget");
        assert_eq!(err.source().unwrap().to_string(), "no such file");

        let err = RegistryError::Factory {
            id: "w".into(),
            source: err,
        };
        let cause = err.source().unwrap();
        assert_eq!(cause.to_string(), "could not load widget");
    }

    #[test]
    fn test_factory_error_from_source_uses_display() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = FactoryError::from_source(io);
        assert_eq!(err.message(), "boom");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_trait() {
        let err: &dyn StdError = &RegistryError::InvalidIdentifier { id: String::new() };
        assert_eq!(err.to_string(), "invalid identifier ''");
    }
}
