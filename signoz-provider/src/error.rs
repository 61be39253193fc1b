//! Crate error type.

use std::fmt;

use thiserror::Error;

use crate::clients::{is_not_found, ApiError};
use crate::store::StoreError;

/// Step of a reconcile cycle an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Observe,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Connect => "connect",
            Operation::Observe => "observe",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Coarse classification used for logging and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Credential,
    NotFound,
    RemoteApi,
    ReferenceResolution,
    UnsupportedConfiguration,
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no providerConfig specified")]
    NoProviderConfig,

    #[error("cannot get providerConfig {0}")]
    ProviderConfigNotFound(String),

    #[error("cannot extract credentials: {0}")]
    CredentialExtraction(String),

    #[error("cannot unmarshal signoz credentials as JSON: {0}")]
    CredentialDecode(#[source] serde_json::Error),

    #[error("secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("key {key} not found in secret {namespace}/{name}")]
    SecretKeyNotFound {
        namespace: String,
        name: String,
        key: String,
    },

    #[error(transparent)]
    Remote(#[from] ApiError),

    #[error("cannot resolve channel reference {reference}: {reason}")]
    ReferenceResolution { reference: String, reason: String },

    #[error("unsupported channel type: {0}")]
    UnsupportedConfiguration(String),

    #[error("external name annotation is not set")]
    MissingExternalName,

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("reconcile cancelled")]
    Cancelled,

    #[error("cannot {operation}: {source}")]
    Operation {
        operation: Operation,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn during(self, operation: Operation) -> Self {
        match self {
            // Keep the innermost operation.
            e @ Error::Operation { .. } => e,
            e => Error::Operation {
                operation,
                source: Box::new(e),
            },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Error::NoProviderConfig
            | Error::ProviderConfigNotFound(_)
            | Error::MissingExternalName => ErrorClass::Configuration,
            Error::CredentialExtraction(_)
            | Error::CredentialDecode(_)
            | Error::SecretNotFound { .. }
            | Error::SecretKeyNotFound { .. } => ErrorClass::Credential,
            Error::Remote(e) if is_not_found(e) => ErrorClass::NotFound,
            Error::Remote(_) => ErrorClass::RemoteApi,
            Error::ReferenceResolution { .. } => ErrorClass::ReferenceResolution,
            Error::UnsupportedConfiguration(_) => ErrorClass::UnsupportedConfiguration,
            Error::Store(_) | Error::Cancelled => ErrorClass::Internal,
            Error::Operation { source, .. } => source.class(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Operation { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_delegates_through_operation() {
        let err = Error::UnsupportedConfiguration("carrier-pigeon".to_string())
            .during(Operation::Create);
        assert_eq!(err.class(), ErrorClass::UnsupportedConfiguration);
        assert!(err.to_string().starts_with("cannot create: "));
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_remote_not_found_class() {
        let err = Error::Remote(ApiError::Status {
            status: 404,
            body: String::new(),
        });
        assert_eq!(err.class(), ErrorClass::NotFound);

        let err = Error::Remote(ApiError::Status {
            status: 503,
            body: "unavailable".to_string(),
        });
        assert_eq!(err.class(), ErrorClass::RemoteApi);
    }

    #[test]
    fn test_during_keeps_innermost_operation() {
        let err = Error::Cancelled
            .during(Operation::Observe)
            .during(Operation::Update);
        assert!(matches!(
            err,
            Error::Operation {
                operation: Operation::Observe,
                ..
            }
        ));
        assert!(err.is_cancelled());
    }
}
