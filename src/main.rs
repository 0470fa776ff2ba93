//! campusfetch CLI - cached access to the campus platform API

use clap::Parser;

use campusfetch::cli::{self, CacheCommands, Cli, Commands, GlobalOptions};
use campusfetch::error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// `--debug` wins over RUST_LOG; otherwise RUST_LOG, then warn
fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

async fn run(cli: Cli) -> Result<()> {
    let globals = GlobalOptions::from_cli(&cli);
    log::debug!("Global options: {:?}", globals);

    match cli.command {
        Commands::Get(args) => cli::get::run(&globals, args).await,
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Status => cli::cache::status(&globals).await,
            CacheCommands::Clear => cli::cache::clear(&globals).await,
            CacheCommands::Path => cli::cache::path(&globals),
            CacheCommands::Evict { pattern } => cli::cache::evict(&globals, &pattern).await,
        },
        Commands::Version => {
            println!("campusfetch version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
