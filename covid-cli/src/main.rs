//! COVID CLI - Command line tool for the John Hopkins county case pipeline.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "covid-cli",
    version,
    about = "COVID-19 county case data toolkit"
)]
struct Cli {
    #[command(subcommand)]
    command: covid_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    covid_cmd::run(cli.command).await
}
