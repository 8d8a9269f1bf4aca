use clap::Parser;
use tracing_subscriber::EnvFilter;

use ytdwn::cli::{self, Cli};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    if let Err(err) = cli::run(args).await {
        eprintln!("✗ Error: {}", err);
        std::process::exit(1);
    }
}
