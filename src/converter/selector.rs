// Backend selection - in-process binding vs obabel executable

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ConvertError;

/// Format the binding cannot round-trip reliably; always handled by obabel
const BINDING_EXCLUDED_FORMATS: &[&str] = &["cdx"];

/// Concrete converter implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Toolkit loaded into this process
    InProcessBinding,
    /// `obabel` run as a subprocess
    SubprocessExecutable,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProcessBinding => write!(f, "binding"),
            Self::SubprocessExecutable => write!(f, "executable"),
        }
    }
}

/// User preference for backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Binding when loaded, obabel otherwise (and for cdx)
    #[default]
    Auto,
    /// Force the in-process binding
    Binding,
    /// Force the obabel executable
    Executable,
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Binding => write!(f, "binding"),
            Self::Executable => write!(f, "executable"),
        }
    }
}

impl FromStr for BackendPreference {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "binding" | "pybel" => Ok(Self::Binding),
            "executable" | "obabel" => Ok(Self::Executable),
            other => Err(ConvertError::InvalidArgument(format!(
                "unknown backend '{}' (expected auto, binding or executable)",
                other
            ))),
        }
    }
}

/// Choose the converter for an input format.
pub fn select_backend(format: &str, binding_available: bool) -> BackendKind {
    let excluded = BINDING_EXCLUDED_FORMATS
        .iter()
        .any(|code| format.eq_ignore_ascii_case(code));

    if !binding_available || excluded {
        BackendKind::SubprocessExecutable
    } else {
        BackendKind::InProcessBinding
    }
}

/// Apply a user preference on top of [`select_backend`].
pub fn resolve_backend(
    preference: BackendPreference,
    format: &str,
    binding_available: bool,
) -> Result<BackendKind, ConvertError> {
    match preference {
        BackendPreference::Auto => Ok(select_backend(format, binding_available)),
        BackendPreference::Executable => Ok(BackendKind::SubprocessExecutable),
        BackendPreference::Binding if binding_available => Ok(BackendKind::InProcessBinding),
        BackendPreference::Binding => Err(ConvertError::ToolNotFound(
            "in-process toolkit binding is not loaded".to_string(),
        )),
    }
}
