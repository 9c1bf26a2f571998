use anyhow::{Context, Result};
use jobshell::{Config, Interpreter};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Diagnostics go to stderr; RUST_LOG overrides the default level.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config: Config = argh::from_env();
    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("jobshell: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<()> {
    match &config.batch {
        Some(path) => Interpreter::batch(config).run_batch(path),
        None => {
            Interpreter::interactive(config)
                .context("cannot set up job control")?
                .repl()?;
            Ok(())
        }
    }
}
