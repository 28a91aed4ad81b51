use clap::Parser;

use eolica_runtime::adapter::inbound::cli::command::{Cli, Commands};
use eolica_runtime::adapter::inbound::cli::{check, run};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::Check(arg) => check::execute(&arg.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
