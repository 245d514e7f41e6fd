// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Connect, Id, Keygen, Version};
use dslink::logging::{init_logging, LogSettings};

command_enum! {
    (Connect, Connect),
    (Id, Id),
    (Keygen, Keygen),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let guards = init_logging(&LogSettings {
        level: args.log_level,
        dir: args.log_dir.clone(),
    });
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "dslink starting");

    let ctx = cli::op::OpContext::new(args.key);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    // flush the non-blocking writers before exiting
    drop(guards);
    std::process::exit(code);
}
