use clap::{Parser, Subcommand};

mod utils;

mod verify;
use verify::VerifyCli;

mod debug;
use debug::DebugCli;

#[derive(Parser)]
#[command(name = "ta-verify")]
#[command(version = "0.1.0")]
struct TaVerifyCli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Verify(VerifyCli),
    #[command(subcommand)]
    Debug(DebugCli),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let cli = TaVerifyCli::parse();
    match &cli.command {
        Commands::Verify(cli) => cli.run(),
        Commands::Debug(cli) => cli.run(),
    }
}
