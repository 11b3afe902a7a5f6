use clap::Args;
use eyre::Result;
use ldist_lib::config::OperationContext;
use text_trees::{FormatCharacters, StringTreeNode, TreeFormatting};

#[derive(Args)]
pub struct ListCmd {
    #[arg(long)]
    porcelain: bool,
}

pub fn run(ctx: &OperationContext, cmd: ListCmd) -> Result<()> {
    let installed = ldist_lib::operations::list(ctx)?;

    if cmd.porcelain {
        println!("{}", serde_json::to_string(&installed)?);
        return Ok(());
    }

    let formatting = TreeFormatting::dir_tree(FormatCharacters::box_chars());
    let mut tree = StringTreeNode::new("installed".to_string());
    for package in &installed {
        tree.push(package.to_string());
    }
    println!("{}", tree.to_string_with_format(&formatting)?);
    Ok(())
}
