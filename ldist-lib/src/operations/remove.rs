//! `remove`: deletes an installed package's record and any of its files no
//! longer shared with another installed package.

use crate::config::OperationContext;
use crate::error::LdistError;
use crate::package::PackageName;

use super::{deploy_layout, load_installed_set, save_installed_set};

pub fn remove(ctx: &mut OperationContext, names: &[PackageName]) -> Result<(), LdistError> {
    let layout = deploy_layout(ctx);
    let mut installed_set = load_installed_set(ctx)?;

    for name in names {
        let to_delete = installed_set.remove(name).map_err(|e| {
            ctx.report.log_failure("remove", name.to_string(), &e);
            e
        })?;
        for rel in &to_delete {
            let path = layout.root().join(rel);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        ctx.report.log_ok("remove", name.to_string());
        save_installed_set(ctx, &installed_set)?;
    }

    Ok(())
}
