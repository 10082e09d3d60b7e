// Common data models for converters

use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::ConvertError;
use super::registry::resolve_type;

/// Name used for inputs that did not come from a file path
pub const IN_MEMORY_INPUT_NAME: &str = "(file loaded from memory)";

/// Lowercase format shortcode ("xyz", "cml", "cdx", "tmol", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormatId(String);

impl FormatId {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is(&self, code: &str) -> bool {
        self.0.eq_ignore_ascii_case(code)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormatId {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Where the molecule to convert comes from
pub enum InputSource {
    /// Open handle, read fully into memory on first use
    Handle(Box<dyn Read + Send>),
    /// In-memory file contents
    Buffer(Vec<u8>),
    /// Path to a file on disk
    Path(PathBuf),
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handle(_) => f.write_str("Handle(..)"),
            Self::Buffer(buf) => write!(f, "Buffer({} bytes)", buf.len()),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

/// An input source together with its (resolved) format
#[derive(Debug)]
pub struct InputDescriptor {
    source: InputSource,
    format: FormatId,
}

impl InputDescriptor {
    /// Wrap a file path; the format is inferred from the name when not given.
    pub fn from_path(path: impl Into<PathBuf>, format: Option<&str>) -> Result<Self, ConvertError> {
        let path = path.into();
        let format = match format {
            Some(code) => FormatId::new(code),
            // allow_missing is false, so a value is always present on success
            None => resolve_type(Some(&path), false)?.unwrap_or_else(|| FormatId::new("")),
        };
        Ok(Self {
            source: InputSource::Path(path),
            format,
        })
    }

    pub fn from_buffer(buffer: impl Into<Vec<u8>>, format: &str) -> Self {
        Self {
            source: InputSource::Buffer(buffer.into()),
            format: FormatId::new(format),
        }
    }

    pub fn from_reader(reader: impl Read + Send + 'static, format: &str) -> Self {
        Self {
            source: InputSource::Handle(Box::new(reader)),
            format: FormatId::new(format),
        }
    }

    pub fn format(&self) -> &FormatId {
        &self.format
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            InputSource::Path(path) => Some(path),
            _ => None,
        }
    }

    /// A descriptive name of the input, even when converting from memory
    pub fn name(&self) -> String {
        match &self.source {
            InputSource::Path(path) => path.display().to_string(),
            _ => IN_MEMORY_INPUT_NAME.to_string(),
        }
    }

    /// In-memory contents of a handle or buffer input; `None` for path inputs.
    ///
    /// A handle is drained on the first call and kept as a buffer afterwards.
    pub(crate) fn load_bytes(&mut self) -> Result<Option<&[u8]>, ConvertError> {
        if let InputSource::Handle(reader) = &mut self.source {
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer)?;
            self.source = InputSource::Buffer(buffer);
        }

        match &self.source {
            InputSource::Buffer(buffer) => Ok(Some(buffer.as_slice())),
            _ => Ok(None),
        }
    }
}

/// Per-conversion options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Generate 3D coordinates; `None` lets the backend pick its default
    pub gen3d: Option<bool>,
    /// Add hydrogens before writing
    pub add_hydrogens: bool,
    /// Total charge override
    pub charge: Option<i32>,
    /// Total spin multiplicity override (1 or greater)
    pub multiplicity: Option<u32>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            gen3d: None,
            add_hydrogens: true,
            charge: None,
            multiplicity: None,
        }
    }
}

impl ConvertOptions {
    pub fn with_gen3d(mut self, gen3d: Option<bool>) -> Self {
        self.gen3d = gen3d;
        self
    }

    pub fn with_add_hydrogens(mut self, enabled: bool) -> Self {
        self.add_hydrogens = enabled;
        self
    }

    pub fn with_charge(mut self, charge: Option<i32>) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_multiplicity(mut self, multiplicity: Option<u32>) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConvertError> {
        if self.multiplicity == Some(0) {
            return Err(ConvertError::InvalidArgument(
                "multiplicity must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutput {
    /// Converted file contents (no output path was given)
    Content(Vec<u8>),
    /// Converted file was written to this path
    Written(PathBuf),
}

impl ConversionOutput {
    pub fn into_content(self) -> Option<Vec<u8>> {
        match self {
            Self::Content(bytes) => Some(bytes),
            Self::Written(_) => None,
        }
    }

    /// Lossy text view of in-memory content
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Content(bytes) => Some(String::from_utf8_lossy(bytes)),
            Self::Written(_) => None,
        }
    }
}
