use clap::Args;
use eyre::Result;
use ldist_lib::config::OperationContext;
use ldist_lib::package::PackageRef;

#[derive(Args)]
pub struct FetchCmd {
    /// Packages to fetch into a staging directory, without building them.
    #[arg(required = true)]
    packages: Vec<PackageRef>,
}

pub fn run(ctx: &mut OperationContext, cmd: FetchCmd) -> Result<()> {
    let staged = ldist_lib::operations::fetch(ctx, &cmd.packages)?;
    for (name, dir) in staged.iter() {
        println!("{name} -> {}", dir.display());
    }
    Ok(())
}
