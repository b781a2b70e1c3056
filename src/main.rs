//! # tabula entry point
//!
//! ```text
//! main()
//!   ├─> parse CLI arguments (clap)
//!   ├─> load settings (.env + environment)
//!   ├─> install logging
//!   └─> run the command; `serve` when none is given
//! ```
//!
//! ```bash
//! DATASET_PATH=data/sales.csv tabula            # serve on 127.0.0.1:8000
//! tabula serve --port 9000
//! tabula profile describe --file data/sales.csv
//! ```

#![expect(clippy::print_stdout)] // `profile` prints its JSON report

mod cli;

use anyhow::Result;
use clap::Parser as _;
use tabula::config::Settings;
use tabula::logging;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let settings = Settings::load()?;
    logging::init(&settings)?;

    let command = cli.command.unwrap_or(cli::Commands::Serve {
        bind: None,
        port: None,
    });
    cli::run_command(command, settings)
}
