mod fetch;
mod install;
mod list;
mod make;
mod pack;
mod remove;
mod rockspec;
mod static_bundle;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use eyre::Result;
use ldist_lib::config::{Config, ConfigOverrides};

#[derive(Parser)]
#[command(name = "ldist", about = "A package manager for Lua", version)]
struct Cli {
    /// Path to a config file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `root_dir`.
    #[arg(long, global = true)]
    root_dir: Option<PathBuf>,

    /// Print verbose diagnostics.
    #[arg(long, global = true)]
    debug: bool,

    /// Write a markdown activity report after the operation completes.
    #[arg(long, global = true)]
    report: bool,

    /// Disable progress bars.
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and install one or more packages.
    Install(install::InstallCmd),
    /// Build and install the rockspec found in a local directory.
    Make(make::MakeCmd),
    /// Remove one or more installed packages.
    Remove(remove::RemoveCmd),
    /// List installed packages.
    List(list::ListCmd),
    /// Fetch package source into a staging directory without building it.
    Fetch(fetch::FetchCmd),
    /// Re-export an installed package as a redistributable rock.
    Pack(pack::PackCmd),
    /// Assemble a statically-linked build tree for a set of targets.
    Static(static_bundle::StaticCmd),
    /// Print the rockspec for a package without installing it.
    Rockspec(rockspec::RockspecCmd),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        root_dir: cli.root_dir.clone(),
        debug: Some(cli.debug),
        report: Some(cli.report),
        no_progress: Some(cli.no_progress),
        ..Default::default()
    };

    let result = run(cli, overrides);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<ldist_lib::LdistError>()
                .map(|e| e.exit_code())
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli, overrides: ConfigOverrides) -> Result<()> {
    let config = Config::load(cli.config.as_deref(), overrides)?;
    let report_enabled = config.report;
    let mut ctx = ldist_lib::config::OperationContext::new(config);

    let (name, outcome) = match cli.command {
        Command::Install(cmd) => ("install", install::run(&mut ctx, cmd)),
        Command::Make(cmd) => ("make", make::run(&mut ctx, cmd)),
        Command::Remove(cmd) => ("remove", remove::run(&mut ctx, cmd)),
        Command::List(cmd) => ("list", list::run(&ctx, cmd)),
        Command::Fetch(cmd) => ("fetch", fetch::run(&mut ctx, cmd)),
        Command::Pack(cmd) => ("pack", pack::run(&mut ctx, cmd)),
        Command::Static(cmd) => ("static", static_bundle::run(&mut ctx, cmd)),
        Command::Rockspec(cmd) => ("rockspec", rockspec::run(&mut ctx, cmd)),
    };

    if report_enabled {
        if let Ok(path) = ctx.report.flush(name, &std::env::current_dir()?) {
            eprintln!("activity report written to {}", path.display());
        }
    }

    outcome
}
