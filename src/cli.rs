use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ytx-server",
    about = "YouTube transcript HTTP service with multi-strategy fallback",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Address to bind (overrides HOST and config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides PORT and config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
