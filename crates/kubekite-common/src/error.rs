//! Error types for kubekite
//!
//! Errors carry structured context (template path, config field, resource
//! kind) so operators can tell a broken template apart from a flaky API server.

use thiserror::Error;

/// Main error type for kubekite operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The Job template could not be read or understood
    #[error("job template error [{path}]: {message}")]
    Template {
        /// Where the template came from (file path or "inline")
        path: String,
        /// Description of what's wrong
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Invalid manager configuration
    #[error("configuration error for {field}: {message}")]
    Config {
        /// Offending configuration field
        field: String,
        /// Description of what's invalid
        message: String,
    },
}

impl Error {
    /// Create a template error for an inline (not file backed) template
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            path: "inline".to_string(),
            message: msg.into(),
        }
    }

    /// Create a template error for a template loaded from `path`
    pub fn template_at(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Template {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a configuration error for a field
    pub fn config(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Template, config and serialization errors need an operator to fix
    /// something. Kubernetes errors are retryable unless the API answered 4xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Template { .. } => false,
            Error::Serialization { .. } => false,
            Error::Config { .. } => false,
        }
    }

    /// Whether this wraps a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 404)
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Template { path, .. } => Some(path),
            Error::Serialization { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "Testing".to_string(),
            code,
        })
    }

    /// Story: a broken template at boot names the file it came from
    #[test]
    fn story_template_errors_point_at_the_file() {
        let err = Error::template_at("/etc/kubekite/job.yaml", "no containers");
        assert!(err.to_string().contains("/etc/kubekite/job.yaml"));
        assert!(err.to_string().contains("no containers"));
        assert_eq!(err.context(), Some("/etc/kubekite/job.yaml"));
        assert!(!err.is_retryable());

        let err = Error::template("empty document");
        assert_eq!(err.context(), Some("inline"));
    }

    #[test]
    fn story_kubernetes_errors_classified_by_status() {
        let err: Error = api_error(503).into();
        assert!(err.is_retryable());
        assert!(!err.is_not_found());

        let err: Error = api_error(404).into();
        assert!(!err.is_retryable());
        assert!(err.is_not_found());

        let err: Error = api_error(409).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_config_error_names_field() {
        let err = Error::config("org", "must not be empty");
        assert_eq!(
            err.to_string(),
            "configuration error for org: must not be empty"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_serialization_for_kind() {
        let err = Error::serialization_for_kind("Job", "missing field 'spec'");
        match &err {
            Error::Serialization { kind, .. } => assert_eq!(kind.as_deref(), Some("Job")),
            _ => panic!("Expected Serialization variant"),
        }
        assert_eq!(err.context(), Some("Job"));
        assert!(err.to_string().contains("missing field 'spec'"));
        assert!(!err.is_retryable());
    }
}
