use std::io::{self, IsTerminal, Write};

use anyhow::{bail, Context, Result};

use molconvert_lib::converter::{
    ConversionOutput, ConverterConfig, ConverterOrchestrator, FormatCatalog, InputDescriptor,
    Loader,
};

use crate::cli::{Cli, Command, ConvertArgs, FormatsArgs, StatusArgs};

pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let orchestrator = ConverterOrchestrator::new(config);

    match cli.command {
        Command::Convert(args) => run_convert(&orchestrator, args).await,
        Command::Formats(args) => run_formats(&orchestrator, args).await,
        Command::Status(args) => run_status(&orchestrator, args),
    }
}

fn load_config(cli: &Cli) -> Result<ConverterConfig> {
    let mut loader = Loader::standard(cli.config.as_deref());

    // Command-line flags win over every file and the environment.
    if let Command::Convert(args) = &cli.command {
        if let Some(backend) = args.backend {
            loader = loader.set_override("backend", backend.to_string())?;
        }
        if let Some(secs) = args.timeout {
            let secs = i64::try_from(secs).context("--timeout is out of range")?;
            loader = loader.set_override("obabel.timeout_seconds", secs)?;
        }
        if args.molecule.no_hydrogens {
            loader = loader.set_override("add_hydrogens", false)?;
        }
    }

    let config = loader.build().context("Failed to load configuration")?;
    log::debug!("Configuration: {:?}", config);
    Ok(config)
}

async fn run_convert(orchestrator: &ConverterOrchestrator, args: ConvertArgs) -> Result<()> {
    let input = match args.input_path() {
        Some(path) => InputDescriptor::from_path(path, args.in_format.as_deref())?,
        None => {
            let Some(format) = args.in_format.as_deref() else {
                bail!("Reading from stdin requires an input format (-i FMT)");
            };
            if io::stdin().is_terminal() {
                bail!("No input file specified and stdin is a terminal.\n\nUsage: molconvert convert <INPUT> or pipe data via stdin.");
            }
            InputDescriptor::from_reader(io::stdin(), format)
        }
    };

    let name = input.name();
    let mut converter = orchestrator.open(input)?;
    log::info!("Converting '{}' with {}", name, converter.name());

    let options = orchestrator
        .default_options()
        .with_gen3d(args.molecule.gen3d())
        .with_charge(args.molecule.charge)
        .with_multiplicity(args.molecule.multiplicity);

    let output = converter
        .convert(args.out_format.as_deref(), args.output.as_deref(), &options)
        .await
        .with_context(|| format!("Failed to convert '{}'", name))?;

    match output {
        ConversionOutput::Content(bytes) => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
        ConversionOutput::Written(path) => {
            log::info!("Wrote {}", path.display());
        }
    }

    Ok(())
}

async fn run_formats(orchestrator: &ConverterOrchestrator, args: FormatsArgs) -> Result<()> {
    let catalog: Box<dyn FormatCatalog> = orchestrator.catalog();
    let direction = args.direction.into();
    let table = catalog
        .formats(direction, args.refresh)
        .await
        .with_context(|| format!("Failed to list {} formats from {}", direction, catalog.name()))?;

    let mut stdout = io::stdout().lock();
    if args.json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&table)?)?;
    } else {
        for (code, description) in &table {
            writeln!(stdout, "{} -- {}", code, description)?;
        }
    }
    Ok(())
}

fn run_status(orchestrator: &ConverterOrchestrator, args: StatusArgs) -> Result<()> {
    let status = orchestrator.status();
    let mut stdout = io::stdout().lock();

    if args.json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&status)?)?;
        return Ok(());
    }

    match &status.binding_name {
        Some(name) => writeln!(stdout, "binding:    {} (loaded)", name)?,
        None => writeln!(stdout, "binding:    not available")?,
    }

    let exe = &status.executable;
    match (&exe.path, &exe.version) {
        (Some(path), Some(version)) => {
            writeln!(stdout, "executable: {} {} ({})", exe.name, version, path.display())?
        }
        (Some(path), None) => writeln!(stdout, "executable: {} ({})", exe.name, path.display())?,
        _ => writeln!(stdout, "executable: {} not found", exe.name)?,
    }

    writeln!(stdout, "preference: {}", status.preference)?;
    writeln!(stdout, "backend:    {}", status.recommended_backend)?;
    Ok(())
}
