mod app;
mod cli;
mod domain;
mod infra;
#[cfg(test)]
mod test_support;
mod transport;
mod usecases;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    app::run(cli)
}
