#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use trust_governance_cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = run_cli(cli)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
