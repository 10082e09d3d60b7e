use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use molconvert_lib::converter::{BackendPreference, Direction};

#[derive(Parser)]
#[command(
    name = "molconvert",
    about = "Convert chemical structure files through Open Babel",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file layered over the defaults and user config
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert a structure file
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// List readable or writable formats
    Formats(FormatsArgs),

    /// Show which backends are available
    Status(StatusArgs),
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Input file (stdin if omitted or '-', requires --in-format)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Input format (taken from the file extension when omitted)
    #[arg(short = 'i', long = "in-format", value_name = "FMT")]
    pub in_format: Option<String>,

    /// Output format (taken from --output when omitted)
    #[arg(short = 'o', long = "out-format", value_name = "FMT")]
    pub out_format: Option<String>,

    /// Output file (stdout if omitted)
    #[arg(short = 'O', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Converter backend
    #[arg(long, value_name = "BACKEND", value_parser = parse_backend)]
    pub backend: Option<BackendPreference>,

    /// Kill obabel after this many seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(flatten)]
    pub molecule: MoleculeOptions,
}

impl ConvertArgs {
    /// Input file, or None when reading stdin
    pub fn input_path(&self) -> Option<&Path> {
        self.input.as_deref().filter(|path| path.as_os_str() != "-")
    }
}

/// Molecule normalization options.
#[derive(Args)]
#[command(next_help_heading = "Molecule Options")]
pub struct MoleculeOptions {
    /// Generate 3D coordinates (backend default when neither flag is given)
    #[arg(long, overrides_with = "no_gen3d")]
    pub gen3d: bool,

    /// Never generate 3D coordinates
    #[arg(long, overrides_with = "gen3d")]
    pub no_gen3d: bool,

    /// Total charge of the molecule
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    pub charge: Option<i32>,

    /// Total spin multiplicity of the molecule
    #[arg(long, value_name = "N")]
    pub multiplicity: Option<u32>,

    /// Do not add hydrogens
    #[arg(long)]
    pub no_hydrogens: bool,
}

impl MoleculeOptions {
    pub fn gen3d(&self) -> Option<bool> {
        match (self.gen3d, self.no_gen3d) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args)]
pub struct FormatsArgs {
    /// Which table to list
    #[arg(value_enum, default_value = "read")]
    pub direction: DirectionArg,

    /// Ignore cached tables
    #[arg(long)]
    pub refresh: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    Read,
    Write,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Read => Direction::Read,
            DirectionArg::Write => Direction::Write,
        }
    }
}

fn parse_backend(s: &str) -> Result<BackendPreference, String> {
    s.parse().map_err(|e| format!("{}", e))
}

pub fn parse() -> Cli {
    Cli::parse()
}
