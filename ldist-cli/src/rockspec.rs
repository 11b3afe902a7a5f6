use clap::Args;
use eyre::Result;
use ldist_lib::config::OperationContext;
use ldist_lib::package::PackageRef;

#[derive(Args)]
pub struct RockspecCmd {
    /// Package whose rockspec should be printed.
    package: PackageRef,
}

pub fn run(ctx: &mut OperationContext, cmd: RockspecCmd) -> Result<()> {
    let spec = ldist_lib::operations::get_rockspec(ctx, &cmd.package)?;
    println!("{spec:#?}");
    Ok(())
}
