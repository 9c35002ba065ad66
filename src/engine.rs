use crate::error::{CipError, Result};
use crate::ledger::{sum_ledgers, Ledger, LedgerEntry};
use crate::line_items::LineItemKey;
use crate::schema::{FiscalYear, FundingDimension, LineItemSnapshot, YearlySnapshot};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-line-item ledgers of both funding tables plus the project total.
///
/// `total_funding` is the sum of the phase ledgers only. The source ledgers are
/// kept for drill-down; the two tables are not guaranteed to reconcile, so they
/// are never cross-checked or averaged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CumulativeFunding {
    pub funding_by_phase: BTreeMap<LineItemKey, Ledger>,
    pub funding_by_source: BTreeMap<LineItemKey, Ledger>,
    pub total_funding: Ledger,
}

impl CumulativeFunding {
    pub fn ledgers(&self, dimension: FundingDimension) -> &BTreeMap<LineItemKey, Ledger> {
        match dimension {
            FundingDimension::Phase => &self.funding_by_phase,
            FundingDimension::Source => &self.funding_by_source,
        }
    }
}

/// Builds running ledgers from a project's yearly snapshots.
///
/// Each snapshot contributes the entry for its own fiscal year. The snapshot
/// published in `final_year` is additionally projected forward through its
/// proposed figures, up to `projection_horizon` years and never past `last_year`.
pub struct LedgerBuilder {
    final_year: FiscalYear,
    projection_horizon: u32,
    last_year: FiscalYear,
}

impl LedgerBuilder {
    pub fn new(final_year: FiscalYear, projection_horizon: u32, last_year: FiscalYear) -> Self {
        Self {
            final_year,
            projection_horizon,
            last_year,
        }
    }

    /// Ledger for one line item, given its rows in ascending fiscal-year order.
    ///
    /// Later rows overwrite earlier ones for the same year. Years before the
    /// item's first row are left absent.
    pub fn build_line_item<'a, I>(&self, rows: I) -> Result<Ledger>
    where
        I: IntoIterator<Item = (FiscalYear, &'a LineItemSnapshot)>,
    {
        let mut ledger = Ledger::new();
        for (year, item) in rows {
            self.record(&mut ledger, year, item)?;
        }
        Ok(ledger)
    }

    /// Ledgers for every line item of one funding table.
    ///
    /// A label repeated within one snapshot overwrites the earlier row for that
    /// year; the auditor reports it.
    pub fn build_dimension(
        &self,
        snapshots: &[YearlySnapshot],
        dimension: FundingDimension,
    ) -> Result<BTreeMap<LineItemKey, Ledger>> {
        let mut rows: BTreeMap<LineItemKey, Vec<(FiscalYear, &LineItemSnapshot)>> =
            BTreeMap::new();

        for snapshot in snapshots {
            for item in snapshot.line_items(dimension) {
                let key = LineItemKey::normalize(&item.name).ok_or_else(|| {
                    CipError::EmptyLineItemLabel {
                        project_no: snapshot.project_no.clone(),
                        fiscal_year: snapshot.fiscal_year,
                        dimension,
                    }
                })?;
                rows.entry(key)
                    .or_default()
                    .push((snapshot.fiscal_year, item));
            }
        }

        let mut ledgers = BTreeMap::new();
        for (key, item_rows) in rows {
            ledgers.insert(key, self.build_line_item(item_rows)?);
        }
        Ok(ledgers)
    }

    pub fn build(&self, snapshots: &[YearlySnapshot]) -> Result<CumulativeFunding> {
        let funding_by_phase = self.build_dimension(snapshots, FundingDimension::Phase)?;
        let funding_by_source = self.build_dimension(snapshots, FundingDimension::Source)?;
        let total_funding = sum_ledgers(funding_by_phase.values())?;

        Ok(CumulativeFunding {
            funding_by_phase,
            funding_by_source,
            total_funding,
        })
    }

    fn record(&self, ledger: &mut Ledger, year: FiscalYear, item: &LineItemSnapshot) -> Result<()> {
        let overflow = |what: String| {
            CipError::AmountOverflow(format!("'{}' {}", item.name.trim(), what))
        };

        let mut allotted = to_signed(item, "Allotments", item.prior_funding.allotments)?;
        let balance = to_signed(item, "Balance", item.prior_funding.balance)?;
        let spent = allotted
            .checked_sub(balance)
            .ok_or_else(|| overflow(format!("spent in {}", year)))?;
        let mut proposed = to_signed(item, &year.key(), item.proposed_for(year))?;

        ledger.insert(year, LedgerEntry::new(allotted, spent, proposed));

        if year != self.final_year {
            return Ok(());
        }

        // a horizon too large to add is bounded by last_year alone
        let horizon_end = year
            .checked_offset(self.projection_horizon)
            .map_or(self.last_year, |end| end.min(self.last_year));
        for offset in 1..=(horizon_end.year() - year.year()) {
            let projected_year = year.offset(offset);
            allotted = allotted
                .checked_add(proposed)
                .ok_or_else(|| overflow(format!("allotted in {}", projected_year)))?;
            proposed = to_signed(item, &projected_year.key(), item.proposed_for(projected_year))?;
            ledger.insert(projected_year, LedgerEntry::new(allotted, spent, proposed));
        }
        Ok(())
    }
}

/// Extends `last_year` to the latest year the final snapshot's phase table
/// proposes any funding for.
pub fn planned_last_year(final_snapshot: &YearlySnapshot, last_year: FiscalYear) -> FiscalYear {
    final_snapshot
        .funding_by_phase
        .iter()
        .flat_map(|item| item.proposed_funding.iter())
        .filter(|(_, amount)| **amount > 0)
        .map(|(year, _)| *year)
        .fold(last_year, FiscalYear::max)
}

fn to_signed(item: &LineItemSnapshot, column: &str, amount: u64) -> Result<i64> {
    i64::try_from(amount).map_err(|_| CipError::MalformedAmount {
        field: format!("{} {}", item.name.trim(), column),
        value: amount.to_string(),
    })
}
