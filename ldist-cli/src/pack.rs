use std::path::PathBuf;

use clap::Args;
use eyre::Result;
use ldist_lib::config::OperationContext;
use ldist_lib::package::PackageName;

#[derive(Args)]
pub struct PackCmd {
    /// Name of the installed package to re-export.
    package: PackageName,

    /// Directory to write the packed rock into (defaults to the cwd).
    #[arg(long)]
    destination: Option<PathBuf>,
}

pub fn run(ctx: &mut OperationContext, cmd: PackCmd) -> Result<()> {
    let destination = cmd.destination.unwrap_or(std::env::current_dir()?);
    let out = ldist_lib::operations::pack(ctx, &cmd.package, &destination)?;
    println!("packed {}", out.display());
    Ok(())
}
