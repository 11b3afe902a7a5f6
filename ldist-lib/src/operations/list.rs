//! `list`: returns every installed package, in install order.

use crate::config::OperationContext;
use crate::error::LdistError;
use crate::package::Package;

use super::load_installed_set;

pub fn list(ctx: &OperationContext) -> Result<Vec<Package>, LdistError> {
    let installed_set = load_installed_set(ctx)?;
    Ok(installed_set.iter().cloned().collect())
}
