// Obabel converter - runs the `obabel` executable
//
// Advantages:
// - Only needs Open Babel installed, no binding in this process
// - Handles cdx, which the binding round-trips badly
//
// Disadvantages:
// - Cannot see dimensionality ahead of time, so 3D generation is opt-in
// - No charge/multiplicity overrides
// - Exit codes are unreliable; stderr has to be inspected

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::converter::diagnostics::analyze_output;
use crate::converter::errors::ConvertError;
use crate::converter::models::{ConversionOutput, ConvertOptions, FormatId, InputDescriptor};
use crate::converter::traits::{resolve_output_format, Converter};
use crate::converter::utils::{run_output_with_timeout, ProcessInvocation};

/// Default name of the executable
pub const OBABEL_EXECUTABLE: &str = "obabel";

/// Library search path variable that confuses bundled deployments
pub const BABEL_LIBDIR: &str = "BABEL_LIBDIR";

/// Input format that is always 2D, so 3D generation defaults on
const ALWAYS_2D_FORMAT: &str = "cdx";

/// How obabel is run
#[derive(Debug, Clone)]
pub struct ObabelSettings {
    pub executable: OsString,
    pub timeout: Option<Duration>,
    /// Drop BABEL_LIBDIR from the child environment for cdx inputs
    pub clear_babel_libdir: bool,
}

impl Default for ObabelSettings {
    fn default() -> Self {
        Self {
            executable: OsString::from(OBABEL_EXECUTABLE),
            timeout: None,
            clear_babel_libdir: false,
        }
    }
}

impl ObabelSettings {
    pub fn with_executable(mut self, executable: impl AsRef<OsStr>) -> Self {
        self.executable = executable.as_ref().to_os_string();
        self
    }

    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn with_clear_babel_libdir(mut self, enabled: bool) -> Self {
        self.clear_babel_libdir = enabled;
        self
    }
}

/// Converter that shells out to obabel
pub struct ObabelConverter {
    settings: ObabelSettings,
    input: InputDescriptor,
}

impl ObabelConverter {
    pub fn new(settings: ObabelSettings, input: InputDescriptor) -> Self {
        Self { settings, input }
    }

    /// 3D generation default when the caller did not choose
    fn default_gen3d(&self) -> bool {
        self.input.format().is(ALWAYS_2D_FORMAT)
    }

    /// Build command arguments
    pub(crate) fn build_args(
        &self,
        output_format: &FormatId,
        output_path: Option<&Path>,
        gen3d: bool,
        add_hydrogens: bool,
    ) -> Vec<OsString> {
        let mut args = Vec::new();

        // Handle and buffer inputs arrive on stdin instead.
        if let Some(path) = self.input.path() {
            args.push(path.as_os_str().to_os_string());
        }

        args.push("-o".into());
        args.push(output_format.as_str().into());
        args.push("-i".into());
        args.push(self.input.format().as_str().into());

        if gen3d {
            args.push("--gen3D".into());
        }

        if add_hydrogens {
            args.push("-h".into());
        }

        if let Some(path) = output_path {
            args.push("-O".into());
            args.push(path.as_os_str().to_os_string());
        }

        args
    }

    fn warn_unsupported(&self, options: &ConvertOptions) {
        if let Some(charge) = options.charge {
            log::warn!(
                "Unable to set charge '{}' of molecule loaded from file '{}' with obabel converter",
                charge,
                self.input.name()
            );
        }
        if let Some(multiplicity) = options.multiplicity {
            log::warn!(
                "Unable to set multiplicity '{}' of molecule loaded from file '{}' with obabel converter",
                multiplicity,
                self.input.name()
            );
        }
    }
}

#[async_trait]
impl Converter for ObabelConverter {
    fn name(&self) -> &'static str {
        OBABEL_EXECUTABLE
    }

    fn input(&self) -> &InputDescriptor {
        &self.input
    }

    async fn convert(
        &mut self,
        output_format: Option<&str>,
        output_path: Option<&Path>,
        options: &ConvertOptions,
    ) -> Result<ConversionOutput, ConvertError> {
        let output_format = resolve_output_format(output_format, output_path)?;
        options.validate()?;

        let gen3d = options.gen3d.unwrap_or_else(|| self.default_gen3d());
        self.warn_unsupported(options);

        let args = self.build_args(&output_format, output_path, gen3d, options.add_hydrogens);
        if gen3d {
            log::warn!(
                "Generating 3D coordinates from file '{}'; this will scramble atom coordinates",
                self.input.name()
            );
        }

        let stdin = self.input.load_bytes()?.map(<[u8]>::to_vec);
        let mut invocation = ProcessInvocation::new(&self.settings.executable, args)
            .with_stdin(stdin)
            .with_timeout(self.settings.timeout);
        if self.settings.clear_babel_libdir && self.input.format().is(ALWAYS_2D_FORMAT) {
            invocation = invocation.with_env_removed(BABEL_LIBDIR);
        }

        log::debug!("Running: {}", invocation.command_line());
        let program = invocation.program_name();
        let output = run_output_with_timeout(invocation).await?;
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ConvertError::ExternalProcessFailure {
                program,
                status: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr,
            });
        }

        // obabel exits 0 even when it converted nothing.
        let diagnostics = analyze_output(&stderr);
        for warning in diagnostics.warnings() {
            log::debug!("obabel warning: {}", warning.summary());
        }
        if diagnostics.is_failure() {
            return Err(ConvertError::ConversionFailed {
                program,
                errors: diagnostics.errors().map(|m| m.summary()).collect(),
                stderr,
            });
        }
        if let Some(count) = diagnostics.converted {
            log::debug!("obabel converted {} molecule(s) from '{}'", count, self.input.name());
        }

        Ok(match output_path {
            Some(path) => ConversionOutput::Written(path.to_path_buf()),
            None => ConversionOutput::Content(output.stdout),
        })
    }
}
