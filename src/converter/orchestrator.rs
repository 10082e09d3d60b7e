// Converter orchestrator - backend selection and converter construction
//
// Strategy:
// 1. Resolve the input type from the file name when no hint is given
// 2. Binding preferred when loaded (fast, dimension-aware)
// 3. cdx always goes to obabel unless the user forced the binding

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backends::{BindingConverter, ObabelConverter, ObabelSettings};
use super::catalog::{BindingFormats, FormatCache, FormatCatalog, ObabelFormats};
use super::config::ConverterConfig;
use super::errors::ConvertError;
use super::models::{ConvertOptions, FormatId, InputDescriptor};
use super::selector::{resolve_backend, select_backend, BackendKind, BackendPreference};
use super::toolkit::{self, MoleculeToolkit};
use super::tools::{ToolInfo, ToolManager};
use super::traits::Converter;

/// Backend availability report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub binding_available: bool,
    pub binding_name: Option<String>,
    pub executable: ToolInfo,
    pub preference: BackendPreference,
    /// Backend used for a typical (non-cdx) input
    pub recommended_backend: BackendKind,
}

/// Builds converters and catalogs from configuration
pub struct ConverterOrchestrator {
    config: ConverterConfig,
    binding: Option<Arc<dyn MoleculeToolkit>>,
    cache: Arc<FormatCache>,
}

impl ConverterOrchestrator {
    /// Uses the process-wide binding (if detected) and the shared format cache.
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config,
            binding: toolkit::binding(),
            cache: FormatCache::shared(),
        }
    }

    pub fn with_binding(mut self, binding: Option<Arc<dyn MoleculeToolkit>>) -> Self {
        self.binding = binding;
        self
    }

    pub fn with_cache(mut self, cache: Arc<FormatCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn binding_available(&self) -> bool {
        self.binding.is_some()
    }

    /// Options seeded from configuration
    pub fn default_options(&self) -> ConvertOptions {
        ConvertOptions::default().with_add_hydrogens(self.config.add_hydrogens)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.config.obabel.timeout()
    }

    /// The configured obabel resolved the same way `status()` reports it;
    /// left as configured when it cannot be found.
    pub fn obabel_executable(&self) -> OsString {
        ToolManager::new(self.config.obabel.executable.as_str())
            .locate()
            .map(PathBuf::into_os_string)
            .unwrap_or_else(|| OsString::from(&self.config.obabel.executable))
    }

    fn obabel_settings(&self) -> ObabelSettings {
        ObabelSettings::default()
            .with_executable(self.obabel_executable())
            .with_timeout(self.timeout())
            .with_clear_babel_libdir(self.config.obabel.clear_babel_libdir)
    }

    /// Backend that would handle `format`
    pub fn backend_for(&self, format: &FormatId) -> Result<BackendKind, ConvertError> {
        resolve_backend(self.config.backend, format.as_str(), self.binding_available())
    }

    /// Wrap `input` in the converter chosen for its format.
    pub fn open(&self, input: InputDescriptor) -> Result<Box<dyn Converter>, ConvertError> {
        let backend = self.backend_for(input.format())?;
        log::debug!(
            "Using {} backend for '{}' ({})",
            backend,
            input.name(),
            input.format()
        );

        match (backend, &self.binding) {
            (BackendKind::InProcessBinding, Some(toolkit)) => {
                Ok(Box::new(BindingConverter::new(Arc::clone(toolkit), input)))
            }
            (BackendKind::InProcessBinding, None) => Err(ConvertError::ToolNotFound(
                "in-process toolkit binding is not loaded".to_string(),
            )),
            (BackendKind::SubprocessExecutable, _) => {
                Ok(Box::new(ObabelConverter::new(self.obabel_settings(), input)))
            }
        }
    }

    /// Open a file, inferring its format from the name when `format` is None.
    pub fn open_path(
        &self,
        path: impl AsRef<Path>,
        format: Option<&str>,
    ) -> Result<Box<dyn Converter>, ConvertError> {
        let input = InputDescriptor::from_path(path.as_ref(), format)?;
        self.open(input)
    }

    /// Catalog of the backend conversions would use
    pub fn catalog(&self) -> Box<dyn FormatCatalog> {
        match (&self.binding, self.config.backend) {
            (Some(toolkit), BackendPreference::Auto | BackendPreference::Binding) => {
                Box::new(BindingFormats::new(Arc::clone(toolkit)))
            }
            _ => Box::new(
                ObabelFormats::new(self.obabel_executable(), Arc::clone(&self.cache))
                    .with_timeout(self.timeout()),
            ),
        }
    }

    /// Get availability status
    pub fn status(&self) -> ServiceStatus {
        let available = self.binding_available();
        ServiceStatus {
            binding_available: available,
            binding_name: self.binding.as_ref().map(|t| t.name().to_string()),
            executable: ToolManager::new(self.config.obabel.executable.as_str()).get_tool_info(),
            preference: self.config.backend,
            recommended_backend: match self.config.backend {
                BackendPreference::Auto => select_backend("", available),
                BackendPreference::Binding => BackendKind::InProcessBinding,
                BackendPreference::Executable => BackendKind::SubprocessExecutable,
            },
        }
    }
}

impl Default for ConverterOrchestrator {
    fn default() -> Self {
        Self::new(ConverterConfig::default())
    }
}
