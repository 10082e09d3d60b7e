// In-process toolkit binding - capability traits and load-once detection
//
// The binding is optional. With the `binding` feature the pybel toolkit is
// tried once at startup through `detect_binding`; the outcome is recorded in
// process-wide state and consumed by backend selection as a plain
// availability fact.

use std::path::Path;
use std::sync::{Arc, RwLock};

use super::catalog::FormatTable;
use super::errors::{BindingLoadError, ToolkitError};

/// A molecular structure loaded by the toolkit
pub trait Molecule: Send {
    /// Coordinate dimensionality (0-3)
    fn dimension(&self) -> u8;

    fn set_total_charge(&mut self, charge: i32);

    fn set_total_spin_multiplicity(&mut self, multiplicity: u32);

    /// Generate 3D coordinates (local geometry optimisation)
    fn generate_3d(&mut self) -> Result<(), ToolkitError>;

    fn add_hydrogens(&mut self) -> Result<(), ToolkitError>;

    /// Serialize to memory
    fn write(&self, format: &str) -> Result<Vec<u8>, ToolkitError>;

    /// Serialize to a file
    fn write_file(&self, format: &str, path: &Path, overwrite: bool) -> Result<(), ToolkitError>;

    /// Render a 2D depiction image to a file
    fn draw(&self, path: &Path) -> Result<(), ToolkitError>;
}

pub type MoleculeIter<'a> = Box<dyn Iterator<Item = Result<Box<dyn Molecule>, ToolkitError>> + 'a>;

/// Operations exposed by an in-process molecular toolkit
pub trait MoleculeToolkit: Send + Sync {
    /// Name of the binding (for logging)
    fn name(&self) -> &'static str;

    /// Parse a single molecule from memory
    fn read_string(&self, format: &str, data: &[u8]) -> Result<Box<dyn Molecule>, ToolkitError>;

    /// Stream the molecules of a file
    fn read_file<'a>(&'a self, format: &str, path: &Path) -> Result<MoleculeIter<'a>, ToolkitError>;

    fn input_formats(&self) -> FormatTable;

    fn output_formats(&self) -> FormatTable;

    /// Toggle the toolkit's own diagnostic log
    fn set_logging(&self, enabled: bool);
}

/// Keeps the toolkit's diagnostic log disabled while alive
pub struct LogSuppression<'a> {
    toolkit: &'a dyn MoleculeToolkit,
}

impl<'a> LogSuppression<'a> {
    pub fn new(toolkit: &'a dyn MoleculeToolkit) -> Self {
        toolkit.set_logging(false);
        Self { toolkit }
    }
}

impl Drop for LogSuppression<'_> {
    fn drop(&mut self) {
        self.toolkit.set_logging(true);
    }
}

lazy_static::lazy_static! {
    static ref BINDING: RwLock<Option<Arc<dyn MoleculeToolkit>>> = RwLock::new(None);
}

/// Try to load the binding and record the outcome.
///
/// Returns whether a binding is now available. A missing binding is expected
/// and only logged at debug level; a binding that is present but broken is
/// logged as an error. Either way callers fall back to the executable.
pub fn detect_binding<F>(loader: F) -> bool
where
    F: FnOnce() -> Result<Arc<dyn MoleculeToolkit>, BindingLoadError>,
{
    let loaded = match loader() {
        Ok(toolkit) => {
            log::debug!("Loaded in-process toolkit binding '{}'", toolkit.name());
            Some(toolkit)
        }
        Err(e @ BindingLoadError::NotInstalled(_)) => {
            log::debug!("{}; falling back to obabel executable", e);
            None
        }
        Err(e @ BindingLoadError::Broken(_)) => {
            log::error!("{}; falling back to obabel executable", e);
            None
        }
    };

    let available = loaded.is_some();
    match BINDING.write() {
        Ok(mut slot) => *slot = loaded,
        Err(poisoned) => *poisoned.into_inner() = loaded,
    }
    available
}

/// The binding recorded by [`detect_binding`], if any
pub fn binding() -> Option<Arc<dyn MoleculeToolkit>> {
    match BINDING.read() {
        Ok(slot) => slot.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub fn binding_available() -> bool {
    binding().is_some()
}

/// Loader for the binding this build was compiled with, for [`detect_binding`]
#[cfg(feature = "binding")]
pub fn load_default_binding() -> Result<Arc<dyn MoleculeToolkit>, BindingLoadError> {
    let toolkit = super::pybel::PybelToolkit::load()?;
    Ok(Arc::new(toolkit))
}

#[cfg(not(feature = "binding"))]
pub fn load_default_binding() -> Result<Arc<dyn MoleculeToolkit>, BindingLoadError> {
    Err(BindingLoadError::NotInstalled(
        "built without the `binding` feature".to_string(),
    ))
}
