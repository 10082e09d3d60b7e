// pybel toolkit - Open Babel's Python bindings loaded in process
//
// Compiled only with the `binding` feature. Every call attaches to the
// embedded interpreter; molecules hold their pybel object between calls.

use std::path::Path;

use pyo3::exceptions::PyModuleNotFoundError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyIterator, PyModule};

use super::catalog::FormatTable;
use super::errors::{BindingLoadError, ToolkitError};
use super::toolkit::{Molecule, MoleculeIter, MoleculeToolkit};

pub const PYBEL_MODULE: &str = "openbabel.pybel";

fn toolkit_error(err: PyErr) -> ToolkitError {
    ToolkitError::new(err.to_string())
}

/// Open Babel through `openbabel.pybel`
pub struct PybelToolkit {
    module: Py<PyModule>,
}

impl PybelToolkit {
    pub fn load() -> Result<Self, BindingLoadError> {
        Self::load_module(PYBEL_MODULE)
    }

    /// A missing module means the bindings are not installed; any other
    /// import failure means they are installed but broken.
    pub(crate) fn load_module(name: &str) -> Result<Self, BindingLoadError> {
        Python::attach(|py| match py.import(name) {
            Ok(module) => Ok(Self {
                module: module.unbind(),
            }),
            Err(err) if err.is_instance_of::<PyModuleNotFoundError>(py) => {
                Err(BindingLoadError::NotInstalled(err.to_string()))
            }
            Err(err) => Err(BindingLoadError::Broken(err.to_string())),
        })
    }

    fn format_table(&self, attr: &str) -> FormatTable {
        Python::attach(|py| {
            self.module
                .bind(py)
                .getattr(attr)
                .and_then(|table| table.extract::<FormatTable>())
                .unwrap_or_else(|e| {
                    log::warn!("Could not read pybel.{}: {}", attr, e);
                    FormatTable::new()
                })
        })
    }
}

impl MoleculeToolkit for PybelToolkit {
    fn name(&self) -> &'static str {
        "pybel"
    }

    fn read_string(&self, format: &str, data: &[u8]) -> Result<Box<dyn Molecule>, ToolkitError> {
        let text = String::from_utf8_lossy(data);
        Python::attach(|py| {
            let mol = self
                .module
                .bind(py)
                .call_method1("readstring", (format, &*text))
                .map_err(toolkit_error)?;
            Ok(Box::new(PybelMolecule { mol: mol.unbind() }) as Box<dyn Molecule>)
        })
    }

    fn read_file<'a>(&'a self, format: &str, path: &Path) -> Result<MoleculeIter<'a>, ToolkitError> {
        let path = path.to_string_lossy().into_owned();
        let iter = Python::attach(|py| {
            self.module
                .bind(py)
                .call_method1("readfile", (format, path))
                .and_then(|mols| mols.try_iter())
                .map(Bound::unbind)
        })
        .map_err(toolkit_error)?;
        Ok(Box::new(PybelMolecules { iter }))
    }

    fn input_formats(&self) -> FormatTable {
        self.format_table("informats")
    }

    fn output_formats(&self) -> FormatTable {
        self.format_table("outformats")
    }

    fn set_logging(&self, enabled: bool) {
        let method = if enabled { "StartLogging" } else { "StopLogging" };
        let result = Python::attach(|py| {
            self.module
                .bind(py)
                .getattr("ob")?
                .getattr("obErrorLog")?
                .call_method0(method)
                .map(drop)
        });
        if let Err(e) = result {
            log::debug!("obErrorLog.{} failed: {}", method, e);
        }
    }
}

/// Lazily pulls molecules out of a `pybel.readfile` generator
struct PybelMolecules {
    iter: Py<PyIterator>,
}

impl Iterator for PybelMolecules {
    type Item = Result<Box<dyn Molecule>, ToolkitError>;

    fn next(&mut self) -> Option<Self::Item> {
        Python::attach(|py| {
            let mut iter = self.iter.bind(py).clone();
            iter.next().map(|item| {
                item.map(|mol| Box::new(PybelMolecule { mol: mol.unbind() }) as Box<dyn Molecule>)
                    .map_err(toolkit_error)
            })
        })
    }
}

/// A `pybel.Molecule`
pub struct PybelMolecule {
    mol: Py<PyAny>,
}

impl PybelMolecule {
    fn call_obmol(&self, method: &str, value: i64) -> PyResult<()> {
        Python::attach(|py| {
            self.mol
                .bind(py)
                .getattr("OBMol")?
                .call_method1(method, (value,))
                .map(drop)
        })
    }

    fn call0(&self, method: &str) -> Result<(), ToolkitError> {
        Python::attach(|py| self.mol.bind(py).call_method0(method).map(drop))
            .map_err(toolkit_error)
    }
}

impl Molecule for PybelMolecule {
    fn dimension(&self) -> u8 {
        Python::attach(|py| {
            self.mol
                .bind(py)
                .getattr("dim")
                .and_then(|dim| dim.extract::<u8>())
                .unwrap_or(0)
        })
    }

    fn set_total_charge(&mut self, charge: i32) {
        if let Err(e) = self.call_obmol("SetTotalCharge", i64::from(charge)) {
            log::warn!("Could not set total charge: {}", e);
        }
    }

    fn set_total_spin_multiplicity(&mut self, multiplicity: u32) {
        if let Err(e) = self.call_obmol("SetTotalSpinMultiplicity", i64::from(multiplicity)) {
            log::warn!("Could not set spin multiplicity: {}", e);
        }
    }

    fn generate_3d(&mut self) -> Result<(), ToolkitError> {
        self.call0("localopt")
    }

    fn add_hydrogens(&mut self) -> Result<(), ToolkitError> {
        self.call0("addh")
    }

    fn write(&self, format: &str) -> Result<Vec<u8>, ToolkitError> {
        Python::attach(|py| {
            let out = self.mol.bind(py).call_method1("write", (format,))?;
            match out.extract::<String>() {
                Ok(text) => Ok(text.into_bytes()),
                Err(_) => out.extract::<Vec<u8>>(),
            }
        })
        .map_err(toolkit_error)
    }

    fn write_file(&self, format: &str, path: &Path, overwrite: bool) -> Result<(), ToolkitError> {
        let path = path.to_string_lossy().into_owned();
        Python::attach(|py| {
            let kwargs = PyDict::new(py);
            kwargs.set_item("overwrite", overwrite)?;
            self.mol
                .bind(py)
                .call_method("write", (format, path), Some(&kwargs))
                .map(drop)
        })
        .map_err(toolkit_error)
    }

    fn draw(&self, path: &Path) -> Result<(), ToolkitError> {
        let path = path.to_string_lossy().into_owned();
        // show=False; write() produces broken png output
        Python::attach(|py| self.mol.bind(py).call_method1("draw", (false, path)).map(drop))
            .map_err(toolkit_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pybel() -> Option<PybelToolkit> {
        match PybelToolkit::load() {
            Ok(toolkit) => Some(toolkit),
            Err(e) => {
                eprintln!("{}; skipping", e);
                None
            }
        }
    }

    #[test]
    fn test_missing_module_is_not_installed() {
        let err = PybelToolkit::load_module("molconvert_no_such_module").err().unwrap();
        assert!(matches!(err, BindingLoadError::NotInstalled(_)));
    }

    #[test]
    fn test_failing_import_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("molconvert_broken_toolkit.py"),
            "raise RuntimeError('symbol lookup error')\n",
        )
        .unwrap();
        Python::attach(|py| {
            py.import("sys")
                .and_then(|sys| sys.getattr("path"))
                .and_then(|path| {
                    path.call_method1("insert", (0, dir.path().to_string_lossy().into_owned()))
                })
                .unwrap();
        });

        let err = PybelToolkit::load_module("molconvert_broken_toolkit").err().unwrap();
        match err {
            BindingLoadError::Broken(message) => assert!(message.contains("symbol lookup error")),
            other => panic!("Expected Broken, got {:?}", other),
        }
    }

    #[test]
    fn test_reads_and_writes_through_pybel() {
        let Some(toolkit) = pybel() else { return };
        let xyz = std::fs::read(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/Benzene.xyz"),
        )
        .unwrap();

        let mol = toolkit.read_string("xyz", &xyz).unwrap();
        assert_eq!(mol.dimension(), 3);
        let cml = String::from_utf8(mol.write("cml").unwrap()).unwrap();
        assert!(cml.contains("<molecule"));

        assert!(toolkit.input_formats().contains_key("xyz"));
        assert!(toolkit.output_formats().contains_key("cml"));
    }

    #[test]
    fn test_reads_file_lazily() {
        let Some(toolkit) = pybel() else { return };
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/Benzene.cml");

        let mut mols = toolkit.read_file("cml", &path).unwrap();
        assert!(mols.next().unwrap().is_ok());
    }
}
