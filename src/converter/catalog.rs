// Format catalog - formats each backend can read and write

use std::collections::{BTreeMap, HashMap};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::ConvertError;
use super::toolkit::MoleculeToolkit;
use super::utils::{run_output_with_timeout, ProcessInvocation};

/// Format shortcode -> human-readable description
pub type FormatTable = BTreeMap<String, String>;

/// Whether a format is read or written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for format catalog implementations
#[async_trait]
pub trait FormatCatalog: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Supported formats in one direction; `refresh` drops any cached table first
    async fn formats(&self, direction: Direction, refresh: bool) -> Result<FormatTable, ConvertError>;

    async fn readable_formats(&self, refresh: bool) -> Result<FormatTable, ConvertError> {
        self.formats(Direction::Read, refresh).await
    }

    async fn writable_formats(&self, refresh: bool) -> Result<FormatTable, ConvertError> {
        self.formats(Direction::Write, refresh).await
    }
}

/// Tables are cached per executable and direction
type CacheKey = (OsString, Direction);

/// Cached format tables, keyed by the executable that produced them.
///
/// The generation counter increases on every invalidation so callers can tell
/// whether a table they hold is stale.
#[derive(Debug, Default)]
pub struct FormatCache {
    tables: Mutex<HashMap<CacheKey, Arc<FormatTable>>>,
    generation: AtomicU64,
}

lazy_static::lazy_static! {
    static ref SHARED_CACHE: Arc<FormatCache> = Arc::new(FormatCache::new());
}

impl FormatCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache used when no explicit cache is injected
    pub fn shared() -> Arc<FormatCache> {
        Arc::clone(&SHARED_CACHE)
    }

    pub fn get(&self, executable: &OsStr, direction: Direction) -> Option<Arc<FormatTable>> {
        self.lock()
            .get(&(executable.to_os_string(), direction))
            .cloned()
    }

    pub fn insert(
        &self,
        executable: &OsStr,
        direction: Direction,
        table: FormatTable,
    ) -> Arc<FormatTable> {
        let table = Arc::new(table);
        self.lock()
            .insert((executable.to_os_string(), direction), Arc::clone(&table));
        table
    }

    pub fn invalidate(&self, executable: &OsStr, direction: Direction) {
        self.lock().remove(&(executable.to_os_string(), direction));
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<FormatTable>>> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Parse `obabel -L formats` output.
///
/// Each non-empty line looks like `xyz -- XYZ cartesian coordinates format`.
pub fn parse_format_listing(stdout: &str) -> Result<FormatTable, ConvertError> {
    let mut formats = FormatTable::new();

    for (index, line) in stdout.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let (code, description) = line.split_once("--").ok_or_else(|| {
            ConvertError::MalformedCatalogOutput(format!(
                "line {} has no '--' separator: '{}'",
                index + 1,
                line
            ))
        })?;
        formats.insert(code.trim().to_string(), description.trim().to_string());
    }

    Ok(formats)
}

/// Formats reported by the in-process binding
pub struct BindingFormats {
    toolkit: Arc<dyn MoleculeToolkit>,
}

impl BindingFormats {
    pub fn new(toolkit: Arc<dyn MoleculeToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl FormatCatalog for BindingFormats {
    fn name(&self) -> &'static str {
        self.toolkit.name()
    }

    async fn formats(&self, direction: Direction, _refresh: bool) -> Result<FormatTable, ConvertError> {
        // The binding keeps these tables in memory already.
        Ok(match direction {
            Direction::Read => self.toolkit.input_formats(),
            Direction::Write => self.toolkit.output_formats(),
        })
    }
}

/// Formats reported by `obabel -L formats`, cached per direction
pub struct ObabelFormats {
    executable: OsString,
    cache: Arc<FormatCache>,
    timeout: Option<Duration>,
}

impl ObabelFormats {
    pub fn new(executable: impl AsRef<OsStr>, cache: Arc<FormatCache>) -> Self {
        Self {
            executable: executable.as_ref().to_os_string(),
            cache,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn cache(&self) -> &Arc<FormatCache> {
        &self.cache
    }

    async fn run(&self, direction: Direction) -> Result<FormatTable, ConvertError> {
        let invocation = ProcessInvocation::new(
            &self.executable,
            vec!["-L".into(), "formats".into(), direction.as_str().into()],
        )
        .with_timeout(self.timeout);
        log::debug!("Listing formats: {}", invocation.command_line());

        let program = invocation.program_name();
        let output = run_output_with_timeout(invocation).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            return Err(ConvertError::ExternalProcessFailure {
                program,
                status: output.status.code(),
                stdout: stdout.into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        parse_format_listing(&stdout)
    }
}

#[async_trait]
impl FormatCatalog for ObabelFormats {
    fn name(&self) -> &'static str {
        "obabel"
    }

    async fn formats(&self, direction: Direction, refresh: bool) -> Result<FormatTable, ConvertError> {
        if refresh {
            self.cache.invalidate(&self.executable, direction);
        }

        if let Some(table) = self.cache.get(&self.executable, direction) {
            return Ok(table.as_ref().clone());
        }

        // Cache miss
        let table = self.run(direction).await?;
        Ok(self
            .cache
            .insert(&self.executable, direction, table)
            .as_ref()
            .clone())
    }
}
