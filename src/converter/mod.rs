// Converter module - chemical format conversion through Open Babel

pub mod backends;
pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod models;
pub mod orchestrator;
#[cfg(feature = "binding")]
pub mod pybel;
pub mod registry;
pub mod selector;
pub mod toolkit;
pub mod tools;
pub mod traits;
pub mod utils;

#[cfg(test)]
mod testing;

pub use catalog::{Direction, FormatCache, FormatCatalog, FormatTable};
pub use config::{ConverterConfig, Loader};
pub use errors::{BindingLoadError, ConvertError, ToolkitError};
pub use models::{ConversionOutput, ConvertOptions, FormatId, InputDescriptor};
pub use orchestrator::{ConverterOrchestrator, ServiceStatus};
pub use registry::resolve_type;
pub use selector::{select_backend, BackendKind, BackendPreference};
pub use traits::Converter;
