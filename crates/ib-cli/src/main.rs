// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::Result;
use clap::Parser;
use ib_cli::{Cli, run};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr (or --log-file) so stdout stays machine-readable
    cli.logging.init("ib-cli")?;

    let mut stdout = std::io::stdout();
    run(cli, &mut stdout).await
}
