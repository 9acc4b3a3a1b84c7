//! Developer CLI for the blockforge layers.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}
