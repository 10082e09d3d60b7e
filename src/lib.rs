pub mod converter;

pub use converter::{
    resolve_type, select_backend, BackendKind, BackendPreference, ConversionOutput,
    ConvertError, ConvertOptions, Converter, ConverterConfig, ConverterOrchestrator, Direction,
    FormatCatalog, FormatId, InputDescriptor,
};
