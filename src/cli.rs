//! CLI argument parsing for scmp-pfc

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "scmp-pfc")]
#[command(version)]
#[command(about = "Render seccomp filter descriptions as pseudo filter code", long_about = None)]
pub struct Cli {
    /// Filter description file (TOML, or JSON with a .json extension)
    #[arg(value_name = "FILTER")]
    pub filter: PathBuf,

    /// Override the architecture named in the description (e.g. x86, x86_64, aarch64)
    #[arg(short = 'a', long = "arch", value_name = "ARCH")]
    pub arch: Option<String>,

    /// Append the pseudo filter code to FILE instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
