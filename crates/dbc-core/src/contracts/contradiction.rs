//! Build-time rejection of conditions that can never hold

use crate::fold::evaluate;
use crate::parser::ast::Expr;
use crate::printer::expr_to_string;
use crate::scope::ScopeChain;
use crate::{Error, Result};

use super::{ContractKind, ContractSite};

/// Fail with `ContractAlwaysFails` when `condition` folds to a falsy constant
pub fn check(
    kind: ContractKind,
    site: &ContractSite,
    condition: &Expr,
    scope: &ScopeChain,
) -> Result<()> {
    if evaluate(condition, scope).is_always_falsy() {
        return Err(Error::ContractAlwaysFails {
            kind,
            site: site.clone(),
            condition: expr_to_string(condition),
        });
    }
    Ok(())
}
