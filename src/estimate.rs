use crate::error::{CipError, Result};
use crate::ledger::Ledger;

/// Resolves a project's estimated full funding cost in whole dollars.
///
/// A published estimate always wins. Without one, the estimate is the largest
/// `allotted + proposed` the total ledger reaches in any year, scaled from ledger
/// units by `multiplier`. An empty ledger yields zero.
pub fn resolve_est_cost(published: Option<u64>, total_funding: &Ledger, multiplier: u64) -> Result<u64> {
    match published {
        Some(cost) => Ok(cost),
        None => derived_est_cost(total_funding, multiplier),
    }
}

pub fn derived_est_cost(total_funding: &Ledger, multiplier: u64) -> Result<u64> {
    let mut peak = 0i64;
    for (year, entry) in total_funding {
        let planned = entry.planned_total().ok_or_else(|| {
            CipError::AmountOverflow(format!("planned total for {}", year))
        })?;
        peak = peak.max(planned);
    }

    u64::try_from(peak)
        .unwrap_or(0)
        .checked_mul(multiplier)
        .ok_or_else(|| CipError::AmountOverflow(format!("estimated cost {} x {}", peak, multiplier)))
}
