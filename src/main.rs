use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use envmerge::commands::merge;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "envmerge")]
#[command(about = "Merge conda environment files into one consolidated environment", long_about = None)]
#[command(version)]
struct Cli {
    /// Environment files to merge; later files take precedence for
    /// scalar fields such as `name`
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Strip build strings from package pins
    /// (`name=version=build` becomes `name=version`)
    #[arg(long)]
    remove_builds: bool,
}

fn main() -> ExitCode {
    // Diagnostics go to stderr so stdout stays valid YAML
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = merge::execute(&cli.files, cli.remove_builds) {
        eprintln!("{} {err:#}", "✗".red().bold());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
