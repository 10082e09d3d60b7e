// Tool manager - locates the obabel executable and reports its version

use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(r"Open Babel\s+(\S+)").unwrap();
}

/// Install prefixes checked when `PATH` has no match
const COMMON_PREFIXES: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInfo {
    pub name: String,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

pub struct ToolManager {
    executable: String,
}

impl ToolManager {
    /// `executable` is a bare program name or a path.
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn get_tool_info(&self) -> ToolInfo {
        let path = self.locate();
        let version = path.as_deref().and_then(get_version);

        ToolInfo {
            name: self.executable.clone(),
            is_available: path.is_some(),
            version,
            path,
        }
    }

    /// Resolve the executable to a path, or None if it is not installed.
    pub fn locate(&self) -> Option<PathBuf> {
        let configured = Path::new(&self.executable);

        // An explicit path is used as is.
        if configured.components().count() > 1 {
            return configured.is_file().then(|| configured.to_path_buf());
        }

        // 1. Try PATH, which is what a bare program name runs through
        match which::which(&self.executable) {
            Ok(path) => return Some(path),
            Err(e) => log::debug!("{} not found on PATH: {}", self.executable, e),
        }

        // 2. Try common paths (PATH is often minimal for launched apps)
        COMMON_PREFIXES
            .iter()
            .map(|prefix| Path::new(prefix).join(&self.executable))
            .find(|candidate| candidate.is_file())
    }
}

/// Run `<path> -V` and pull the version number out of its banner.
pub fn get_version(path: &Path) -> Option<String> {
    match Command::new(path).arg("-V").output() {
        Ok(output) if output.status.success() => {
            parse_version(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            log::debug!("{} -V exited with {}", path.display(), output.status);
            None
        }
        Err(e) => {
            log::debug!("Failed to run {} -V: {}", path.display(), e);
            None
        }
    }
}

/// Version from a banner like `Open Babel 3.1.0 -- Oct 21 2020 -- 21:56:47`
fn parse_version(banner: &str) -> Option<String> {
    VERSION_RE
        .captures(banner)
        .map(|caps| caps[1].to_string())
        .or_else(|| {
            let line = banner.lines().next()?.trim();
            (!line.is_empty()).then(|| line.to_string())
        })
}
