use std::io::{self, Write};
use std::process::ExitCode;

use molconvert_lib::converter::toolkit::{detect_binding, load_default_binding};

mod cli;
mod commands;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();
    init_logging(cli.verbose);

    let binding = detect_binding(load_default_binding);
    log::info!(
        "In-process toolkit {}",
        if binding { "loaded" } else { "unavailable; using obabel" }
    );

    match commands::dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print_error(err: &anyhow::Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error: {}", err);
    for cause in err.chain().skip(1) {
        let _ = writeln!(stderr, "  caused by: {}", cause);
    }
}
