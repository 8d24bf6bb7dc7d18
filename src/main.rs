//! Command-line tool for inspecting and converting inline discussion blocks.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
