// Converter trait definition

use std::path::Path;

use async_trait::async_trait;

use super::errors::ConvertError;
use super::models::{ConversionOutput, ConvertOptions, FormatId, InputDescriptor};
use super::registry::resolve_type;

/// Format that can only be rendered into a file
pub const IMAGE_FORMAT: &str = "png";

/// Trait for converter backend implementations
#[async_trait]
pub trait Converter: Send {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// The input wrapped by this converter
    fn input(&self) -> &InputDescriptor;

    /// Convert the wrapped input to `output_format`.
    ///
    /// Without an explicit format, it is taken from the extension of
    /// `output_path`. Returns the converted content when no `output_path` is
    /// given, otherwise writes the file and returns its path.
    async fn convert(
        &mut self,
        output_format: Option<&str>,
        output_path: Option<&Path>,
        options: &ConvertOptions,
    ) -> Result<ConversionOutput, ConvertError>;
}

/// Checks shared by every backend before converting.
pub(crate) fn resolve_output_format(
    output_format: Option<&str>,
    output_path: Option<&Path>,
) -> Result<FormatId, ConvertError> {
    let format = match output_format.filter(|f| !f.trim().is_empty()) {
        Some(code) => FormatId::new(code),
        None => resolve_type(output_path, false)?
            .ok_or_else(|| ConvertError::UnresolvableFormat("no output format given".to_string()))?,
    };

    if format.is(IMAGE_FORMAT) && output_path.is_none() {
        return Err(ConvertError::InvalidArgument(format!(
            "an output file is required when converting to {}",
            IMAGE_FORMAT
        )));
    }

    Ok(format)
}
