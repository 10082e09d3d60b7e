// Format registry - resolves format shortcodes from file names

use std::path::Path;

use super::errors::ConvertError;
use super::models::FormatId;

/// Extensionless file names recognised by convention
const SPECIAL_FILE_NAMES: &[(&str, &str)] = &[
    // Turbomole coordinate file
    ("coord", "tmol"),
];

/// Get the format of a file from its name.
///
/// The lowercased extension is used when present; otherwise a few well-known
/// file names are recognised. With `allow_missing` an unrecognised (or absent)
/// name yields `Ok(None)` instead of an error.
pub fn resolve_type(
    file_name: Option<&Path>,
    allow_missing: bool,
) -> Result<Option<FormatId>, ConvertError> {
    let Some(path) = file_name else {
        return missing(allow_missing, || {
            "Could not automatically determine file format; no file name was given".to_string()
        });
    };

    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        if !extension.is_empty() {
            return Ok(Some(FormatId::new(extension)));
        }
    }

    let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
    if let Some((_, code)) = SPECIAL_FILE_NAMES.iter().find(|(special, _)| *special == name) {
        return Ok(Some(FormatId::new(code)));
    }

    missing(allow_missing, || {
        format!(
            "Could not determine file format of file '{}'; the file does not have an extension and is not recognised",
            path.display()
        )
    })
}

fn missing(
    allow_missing: bool,
    message: impl FnOnce() -> String,
) -> Result<Option<FormatId>, ConvertError> {
    if allow_missing {
        Ok(None)
    } else {
        Err(ConvertError::UnresolvableFormat(message()))
    }
}
