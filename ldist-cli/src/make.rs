use std::path::PathBuf;

use clap::Args;
use eyre::Result;
use ldist_lib::config::OperationContext;

#[derive(Args)]
pub struct MakeCmd {
    /// Directory containing the rockspec to build (defaults to the cwd).
    directory: Option<PathBuf>,
}

pub fn run(ctx: &mut OperationContext, cmd: MakeCmd) -> Result<()> {
    let dir = cmd.directory.unwrap_or(std::env::current_dir()?);
    let package = ldist_lib::operations::make(ctx, &dir)?;
    println!("installed {package}");
    Ok(())
}
