pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dslink")]
#[command(about = "Manage a DSLink identity and connect it to a broker")]
pub struct Args {
    /// Identity key file (defaults to ./.dslink.key)
    #[arg(long, global = true)]
    pub key: Option<PathBuf>,

    /// Default log level; RUST_LOG overrides it per target
    #[arg(long, global = true, default_value = "info")]
    pub log_level: tracing::Level,

    /// Also write daily log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
