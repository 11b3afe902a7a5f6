use clap::Args;
use eyre::Result;
use ldist_lib::config::OperationContext;
use ldist_lib::package::PackageRef;

#[derive(Args)]
pub struct InstallCmd {
    /// Packages to install, e.g. `xml`, `"xml ~> 1.8"`, `"xml >= 1.0"`.
    #[arg(required = true)]
    packages: Vec<PackageRef>,
}

pub fn run(ctx: &mut OperationContext, cmd: InstallCmd) -> Result<()> {
    let installed = ldist_lib::operations::install(ctx, &cmd.packages)?;
    for package in &installed {
        println!("installed {package}");
    }
    Ok(())
}
