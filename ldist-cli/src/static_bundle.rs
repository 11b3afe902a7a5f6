use std::path::PathBuf;

use clap::Args;
use eyre::Result;
use ldist_lib::config::OperationContext;
use ldist_lib::package::PackageRef;

#[derive(Args)]
pub struct StaticCmd {
    /// Packages the static bundle must include.
    #[arg(required = true)]
    packages: Vec<PackageRef>,

    /// Directory to write the static build tree into (defaults to the cwd).
    #[arg(long)]
    destination: Option<PathBuf>,
}

pub fn run(ctx: &mut OperationContext, cmd: StaticCmd) -> Result<()> {
    let destination = cmd.destination.unwrap_or(std::env::current_dir()?);
    let out = ldist_lib::operations::static_bundle(ctx, &cmd.packages, &destination)?;
    println!("static bundle written to {}", out.display());
    Ok(())
}
