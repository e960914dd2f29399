use std::path::PathBuf;

use clap::Parser;

use lanferry_daemon::{process, Config};

#[derive(Debug, Parser)]
#[command(name = "lanferry", about = "LAN file ferry daemon")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(2);
        }
    };

    process::spawn_service(config).await;
}
