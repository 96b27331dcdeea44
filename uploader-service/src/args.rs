use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Uploads option settlement prices to pricing endpoints", long_about = None)]
pub struct Args {
    /// Configuration file (TOML, JSON or YAML). Values can be overridden with
    /// UPLOADER__* environment variables.
    #[arg(long, default_value = "uploader.toml")]
    pub config: PathBuf,

    /// Run a single upload cycle, wait for deliveries and exit
    #[arg(long)]
    pub once: bool,

    /// Seconds between upload cycles, overriding the configured interval
    #[arg(long)]
    pub polling_interval_secs: Option<u64>,
}
