use crate::error::{CipError, Result};
use crate::schema::{FiscalYear, YearlySnapshot};
use std::collections::BTreeMap;

/// Total proposed funding by year, as one budget cycle published it.
pub type ProposedView = BTreeMap<FiscalYear, u64>;

/// One [`ProposedView`] per budget cycle, keyed `FY<snapshot year>`.
pub type CipHistory = BTreeMap<FiscalYear, ProposedView>;

/// Sums the proposed funding of every phase in a single snapshot.
pub fn proposed_view(snapshot: &YearlySnapshot) -> Result<ProposedView> {
    let mut view = ProposedView::new();
    for phase in &snapshot.funding_by_phase {
        for (year, amount) in &phase.proposed_funding {
            let sum = view.entry(*year).or_insert(0);
            *sum = sum.checked_add(*amount).ok_or_else(|| {
                CipError::AmountOverflow(format!(
                    "{} proposal for {} in the {} plan",
                    snapshot.project_no, year, snapshot.fiscal_year
                ))
            })?;
        }
    }
    Ok(view)
}

/// How the plan for a project looked in each budget cycle.
///
/// Views are never merged across snapshots: each one reflects only what its own
/// cycle proposed.
pub fn track_history(snapshots: &[YearlySnapshot]) -> Result<CipHistory> {
    let mut history = CipHistory::new();
    for snapshot in snapshots {
        history.insert(snapshot.fiscal_year, proposed_view(snapshot)?);
    }
    Ok(history)
}
