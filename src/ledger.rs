use crate::error::{CipError, Result};
use crate::schema::FiscalYear;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running funding position of a line item (or of the whole project) in one
/// fiscal year, in thousands of dollars.
///
/// Signed on purpose: `spent` is derived as `allotted - balance` and goes negative
/// when a table reports more balance than allotments. Such entries are reported by
/// the auditor instead of being clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LedgerEntry {
    #[schemars(description = "Cumulative funds allotted as of the start of the year")]
    pub allotted: i64,
    #[schemars(description = "Cumulative funds spent or committed")]
    pub spent: i64,
    #[schemars(description = "Funding proposed for this year")]
    pub proposed: i64,
}

impl LedgerEntry {
    pub fn new(allotted: i64, spent: i64, proposed: i64) -> Self {
        Self {
            allotted,
            spent,
            proposed,
        }
    }

    /// Allotted funds plus this year's proposal: what the project expects to have
    /// by the end of the year. `None` on overflow.
    pub fn planned_total(&self) -> Option<i64> {
        self.allotted.checked_add(self.proposed)
    }

    pub fn checked_add(&self, rhs: &LedgerEntry) -> Option<LedgerEntry> {
        Some(LedgerEntry {
            allotted: self.allotted.checked_add(rhs.allotted)?,
            spent: self.spent.checked_add(rhs.spent)?,
            proposed: self.proposed.checked_add(rhs.proposed)?,
        })
    }

    pub fn is_inconsistent(&self) -> bool {
        self.spent > self.allotted || self.spent < 0
    }
}

pub type Ledger = BTreeMap<FiscalYear, LedgerEntry>;

/// Elementwise sum of ledgers.
///
/// Every year present in at least one ledger appears in the result; a ledger
/// without that year contributes zero. Years absent from all inputs stay absent.
pub fn sum_ledgers<'a, I>(ledgers: I) -> Result<Ledger>
where
    I: IntoIterator<Item = &'a Ledger>,
{
    let mut total = Ledger::new();
    for ledger in ledgers {
        for (year, entry) in ledger {
            let sum = total.entry(*year).or_default();
            *sum = sum
                .checked_add(entry)
                .ok_or_else(|| CipError::AmountOverflow(format!("total funding for {}", year)))?;
        }
    }
    Ok(total)
}
