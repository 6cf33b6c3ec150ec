use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "daefix")]
#[command(about = "Fixes joint names and root rotations of COLLADA (.dae) exports", long_about = None)]
#[command(after_help = "Unless specified, the output file is <INFILE stem>-fixed.<ext>")]
struct Cli {
    /// The input file path
    infile: PathBuf,
    /// The output file path
    outfile: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    daefix::run(&cli.infile, cli.outfile)?;

    Ok(())
}
