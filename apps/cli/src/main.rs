//! FrameContext CLI: build and inspect embed context bundles.
//!
//! The host side builds a bundle for an element of a saved page and hands it
//! to an embed process through the channel variable; the embed side decodes
//! whatever arrives in that variable.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
