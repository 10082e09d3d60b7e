// Error types for converter backends

use thiserror::Error;

/// Failure reported by the in-process toolkit binding.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ToolkitError {
    message: String,
}

impl ToolkitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why the in-process binding could not be loaded at startup
#[derive(Debug, Clone, Error)]
pub enum BindingLoadError {
    /// The binding is simply not present; falling back is expected
    #[error("toolkit binding not installed: {0}")]
    NotInstalled(String),

    /// The binding is present but failed to initialise
    #[error("toolkit binding found but could not be loaded: {0}")]
    Broken(String),
}

#[derive(Debug, Error)]
pub enum ConvertError {
    /// Format could not be inferred from a file name
    #[error("{0}")]
    UnresolvableFormat(String),

    /// Invalid combination of arguments supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Path-based read yielded zero molecules
    #[error("Cannot read file '{0}'; file does not contain any molecules")]
    EmptyInput(String),

    /// The binding could not parse the input
    #[error("Failed to parse file '{input}'")]
    ParseFailed {
        input: String,
        #[source]
        source: ToolkitError,
    },

    /// Any other failure inside the binding
    #[error("Toolkit error: {0}")]
    Toolkit(#[from] ToolkitError),

    /// The external tool exited with a non-zero status
    #[error("{program} exited with {}", describe_status(*status))]
    ExternalProcessFailure {
        program: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The external tool exited cleanly but converted nothing
    #[error("{program} command did not appear to complete successfully{}", describe_errors(errors))]
    ConversionFailed {
        program: String,
        errors: Vec<String>,
        stderr: String,
    },

    /// Format listing output could not be parsed
    #[error("Failed to parse format listing: {0}")]
    MalformedCatalogOutput(String),

    /// Executable or binding not available
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The external tool did not finish in time
    #[error("{program} timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn describe_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(": {}", errors.join("; "))
    }
}

impl ConvertError {
    /// Captured standard error of the external tool, if this error carries one
    pub fn captured_stderr(&self) -> Option<&str> {
        match self {
            Self::ExternalProcessFailure { stderr, .. } | Self::ConversionFailed { stderr, .. } => {
                Some(stderr)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_failure_mentions_exit_code() {
        let err = ConvertError::ExternalProcessFailure {
            program: "obabel".to_string(),
            status: Some(2),
            stdout: String::new(),
            stderr: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "obabel exited with exit code 2");
        assert_eq!(err.captured_stderr(), Some("boom"));
    }

    #[test]
    fn conversion_failure_lists_toolkit_errors() {
        let err = ConvertError::ConversionFailed {
            program: "obabel".to_string(),
            errors: vec!["Problems reading an XYZ file".to_string()],
            stderr: "0 molecules converted".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "obabel command did not appear to complete successfully: Problems reading an XYZ file"
        );
    }

    #[test]
    fn parse_failure_keeps_toolkit_source() {
        let err = ConvertError::ParseFailed {
            input: "benzene.cml".to_string(),
            source: ToolkitError::new("bad atom array"),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("bad atom array"));
    }
}
