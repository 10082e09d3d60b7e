// Test doubles shared by converter unit tests

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::catalog::FormatTable;
use super::errors::ToolkitError;
use super::toolkit::{Molecule, MoleculeIter, MoleculeToolkit};

lazy_static::lazy_static! {
    static ref PROCESS_LOCK: Mutex<()> = Mutex::new(());
}

/// Serializes tests that write scripts and spawn processes.
///
/// Executing a freshly written script while another test thread forks can
/// fail with ETXTBSY.
pub fn process_lock() -> MutexGuard<'static, ()> {
    PROCESS_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Writes an executable `/bin/sh` script standing in for obabel.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

type Journal = Arc<Mutex<Vec<String>>>;

/// In-memory toolkit understanding a toy format: one molecule per
/// non-empty line, written as `dim=<n>`.
pub struct FakeToolkit {
    logging: Arc<AtomicBool>,
    journal: Journal,
}

impl FakeToolkit {
    pub fn new() -> Self {
        Self {
            logging: Arc::new(AtomicBool::new(true)),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging.load(Ordering::SeqCst)
    }

    /// Calls made so far, oldest first
    pub fn calls(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        let logging = if self.logging_enabled() { "on" } else { "off" };
        self.journal
            .lock()
            .unwrap()
            .push(format!("{} [log {}]", call, logging));
    }

    fn parse(&self, line: &str) -> Result<Box<dyn Molecule>, ToolkitError> {
        let dimension = line
            .trim()
            .strip_prefix("dim=")
            .and_then(|d| d.parse::<u8>().ok())
            .ok_or_else(|| ToolkitError::new(format!("unreadable molecule '{}'", line.trim())))?;
        Ok(Box::new(FakeMolecule {
            dimension,
            charge: None,
            multiplicity: None,
            hydrogens: false,
            journal: Arc::clone(&self.journal),
        }))
    }
}

impl MoleculeToolkit for FakeToolkit {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn read_string(&self, format: &str, data: &[u8]) -> Result<Box<dyn Molecule>, ToolkitError> {
        self.record(format!("read_string {}", format));
        self.parse(&String::from_utf8_lossy(data))
    }

    fn read_file<'a>(&'a self, format: &str, path: &Path) -> Result<MoleculeIter<'a>, ToolkitError> {
        self.record(format!("read_file {}", format));
        let text = fs::read_to_string(path).map_err(|e| ToolkitError::new(e.to_string()))?;
        let lines: Vec<String> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect();
        Ok(Box::new(lines.into_iter().map(move |line| self.parse(&line))))
    }

    fn input_formats(&self) -> FormatTable {
        FormatTable::from([
            ("cml".to_string(), "Chemical Markup Language".to_string()),
            ("xyz".to_string(), "XYZ cartesian coordinates format".to_string()),
        ])
    }

    fn output_formats(&self) -> FormatTable {
        FormatTable::from([
            ("png".to_string(), "PNG 2D depiction".to_string()),
            ("xyz".to_string(), "XYZ cartesian coordinates format".to_string()),
        ])
    }

    fn set_logging(&self, enabled: bool) {
        self.logging.store(enabled, Ordering::SeqCst);
    }
}

pub struct FakeMolecule {
    dimension: u8,
    charge: Option<i32>,
    multiplicity: Option<u32>,
    hydrogens: bool,
    journal: Journal,
}

impl FakeMolecule {
    fn render(&self, format: &str) -> String {
        format!(
            "{} dim={} charge={:?} mult={:?} h={}\n",
            format, self.dimension, self.charge, self.multiplicity, self.hydrogens
        )
    }

    fn record(&self, call: &str) {
        self.journal.lock().unwrap().push(call.to_string());
    }
}

impl Molecule for FakeMolecule {
    fn dimension(&self) -> u8 {
        self.dimension
    }

    fn set_total_charge(&mut self, charge: i32) {
        self.record("set_total_charge");
        self.charge = Some(charge);
    }

    fn set_total_spin_multiplicity(&mut self, multiplicity: u32) {
        self.record("set_total_spin_multiplicity");
        self.multiplicity = Some(multiplicity);
    }

    fn generate_3d(&mut self) -> Result<(), ToolkitError> {
        self.record("generate_3d");
        self.dimension = 3;
        Ok(())
    }

    fn add_hydrogens(&mut self) -> Result<(), ToolkitError> {
        self.record("add_hydrogens");
        self.hydrogens = true;
        Ok(())
    }

    fn write(&self, format: &str) -> Result<Vec<u8>, ToolkitError> {
        self.record("write");
        Ok(self.render(format).into_bytes())
    }

    fn write_file(&self, format: &str, path: &Path, overwrite: bool) -> Result<(), ToolkitError> {
        self.record("write_file");
        if !overwrite && path.exists() {
            return Err(ToolkitError::new("refusing to overwrite"));
        }
        fs::write(path, self.render(format)).map_err(|e| ToolkitError::new(e.to_string()))
    }

    fn draw(&self, path: &Path) -> Result<(), ToolkitError> {
        self.record("draw");
        fs::write(path, b"\x89PNG").map_err(|e| ToolkitError::new(e.to_string()))
    }
}
