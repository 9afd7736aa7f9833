use std::fs::OpenOptions;

use anyhow::{Context, Result};
use clap::Parser;
use scmp_pfc::{arch::Arch, cli::Cli, config::FilterConfig, generator};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = FilterConfig::from_file(&args.filter)
        .with_context(|| format!("Failed to load filter {}", args.filter.display()))?;

    let arch = match &args.arch {
        Some(name) => Arch::from_name(name)?,
        None => config.arch()?,
    };
    let db = config
        .build_for(arch)
        .with_context(|| format!("Invalid filter {}", args.filter.display()))?;

    match &args.output {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            generator::generate(&db, &file)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            generator::generate(&db, std::io::stdout()).context("Failed to write to stdout")?;
        }
    }

    Ok(())
}
