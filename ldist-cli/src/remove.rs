use clap::Args;
use eyre::Result;
use ldist_lib::config::OperationContext;
use ldist_lib::package::PackageName;

#[derive(Args)]
pub struct RemoveCmd {
    /// Names of installed packages to remove.
    #[arg(required = true)]
    packages: Vec<PackageName>,
}

pub fn run(ctx: &mut OperationContext, cmd: RemoveCmd) -> Result<()> {
    ldist_lib::operations::remove(ctx, &cmd.packages)?;
    for name in &cmd.packages {
        println!("removed {name}");
    }
    Ok(())
}
