use crate::engine::CumulativeFunding;
use crate::ledger::Ledger;
use crate::line_items::{find_near_duplicates, LineItemKey};
use crate::schema::{FiscalYear, FundingDimension, YearlySnapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Which ledger a warning refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ledger", rename_all = "snake_case")]
pub enum LedgerScope {
    LineItem {
        dimension: FundingDimension,
        line_item: LineItemKey,
    },
    Total,
}

impl fmt::Display for LedgerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerScope::LineItem {
                dimension,
                line_item,
            } => write!(f, "{} '{}'", dimension, line_item),
            LedgerScope::Total => f.write_str("total funding"),
        }
    }
}

/// Data-quality findings. None of them stop a project from being published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// A line item published earlier is absent from a later cycle. It contributes
    /// nothing to that cycle.
    MissingLineItem {
        dimension: FundingDimension,
        line_item: LineItemKey,
        fiscal_year: FiscalYear,
    },
    /// Spent exceeds allotted, or is negative because balance exceeds allotments.
    InconsistentLedger {
        scope: LedgerScope,
        fiscal_year: FiscalYear,
        allotted: i64,
        spent: i64,
    },
    /// Spending went backwards between two published cycles.
    SpentDecreased {
        scope: LedgerScope,
        fiscal_year: FiscalYear,
        previous: i64,
        current: i64,
    },
    NearDuplicateLabel {
        dimension: FundingDimension,
        canonical: LineItemKey,
        variant: LineItemKey,
    },
    /// The same label appears twice in one table; the later row was kept.
    DuplicateLineItem {
        dimension: FundingDimension,
        line_item: LineItemKey,
        fiscal_year: FiscalYear,
    },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::MissingLineItem {
                dimension,
                line_item,
                fiscal_year,
            } => write!(f, "{} '{}' missing from {}", dimension, line_item, fiscal_year),
            DataQualityWarning::InconsistentLedger {
                scope,
                fiscal_year,
                allotted,
                spent,
            } => write!(
                f,
                "{} in {}: spent {} against allotted {}",
                scope, fiscal_year, spent, allotted
            ),
            DataQualityWarning::SpentDecreased {
                scope,
                fiscal_year,
                previous,
                current,
            } => write!(
                f,
                "{} in {}: spent fell from {} to {}",
                scope, fiscal_year, previous, current
            ),
            DataQualityWarning::NearDuplicateLabel {
                dimension,
                canonical,
                variant,
            } => write!(
                f,
                "{} labels '{}' and '{}' differ only in case or punctuation",
                dimension, canonical, variant
            ),
            DataQualityWarning::DuplicateLineItem {
                dimension,
                line_item,
                fiscal_year,
            } => write!(
                f,
                "{} '{}' listed more than once in {}",
                dimension, line_item, fiscal_year
            ),
        }
    }
}

/// Checks a project's snapshots and finished ledgers for data-quality problems.
pub struct LedgerAuditor<'a> {
    snapshots: &'a [YearlySnapshot],
}

impl<'a> LedgerAuditor<'a> {
    pub fn new(snapshots: &'a [YearlySnapshot]) -> Self {
        Self { snapshots }
    }

    pub fn audit(&self, funding: &CumulativeFunding) -> Vec<DataQualityWarning> {
        let mut warnings = Vec::new();

        for dimension in FundingDimension::ALL {
            self.check_presence(dimension, &mut warnings);
            self.check_labels(dimension, funding.ledgers(dimension), &mut warnings);
            for (line_item, ledger) in funding.ledgers(dimension) {
                let scope = LedgerScope::LineItem {
                    dimension,
                    line_item: line_item.clone(),
                };
                self.check_ledger(&scope, ledger, &mut warnings);
            }
        }
        self.check_ledger(&LedgerScope::Total, &funding.total_funding, &mut warnings);

        warnings
    }

    fn check_presence(&self, dimension: FundingDimension, warnings: &mut Vec<DataQualityWarning>) {
        let mut seen: BTreeSet<LineItemKey> = BTreeSet::new();

        for snapshot in self.snapshots {
            let mut present: BTreeSet<LineItemKey> = BTreeSet::new();
            for item in snapshot.line_items(dimension) {
                let Some(key) = LineItemKey::normalize(&item.name) else {
                    continue;
                };
                if !present.insert(key.clone()) {
                    warnings.push(DataQualityWarning::DuplicateLineItem {
                        dimension,
                        line_item: key,
                        fiscal_year: snapshot.fiscal_year,
                    });
                }
            }

            for missing in seen.difference(&present) {
                warnings.push(DataQualityWarning::MissingLineItem {
                    dimension,
                    line_item: missing.clone(),
                    fiscal_year: snapshot.fiscal_year,
                });
            }
            seen.extend(present);
        }
    }

    fn check_labels(
        &self,
        dimension: FundingDimension,
        ledgers: &BTreeMap<LineItemKey, Ledger>,
        warnings: &mut Vec<DataQualityWarning>,
    ) {
        for (canonical, variant) in find_near_duplicates(ledgers.keys()) {
            warnings.push(DataQualityWarning::NearDuplicateLabel {
                dimension,
                canonical,
                variant,
            });
        }
    }

    /// Overspending is checked on every entry; monotonic spending only on the
    /// years that were actually published (projected years freeze `spent`).
    fn check_ledger(&self, scope: &LedgerScope, ledger: &Ledger, warnings: &mut Vec<DataQualityWarning>) {
        for (year, entry) in ledger {
            if entry.is_inconsistent() {
                warnings.push(DataQualityWarning::InconsistentLedger {
                    scope: scope.clone(),
                    fiscal_year: *year,
                    allotted: entry.allotted,
                    spent: entry.spent,
                });
            }
        }

        let published: BTreeSet<FiscalYear> = self.snapshots.iter().map(|s| s.fiscal_year).collect();
        let realized: Vec<_> = ledger
            .iter()
            .filter(|(year, _)| published.contains(*year))
            .collect();
        for pair in realized.windows(2) {
            let (_, previous) = pair[0];
            let (year, current) = pair[1];
            if current.spent < previous.spent {
                warnings.push(DataQualityWarning::SpentDecreased {
                    scope: scope.clone(),
                    fiscal_year: *year,
                    previous: previous.spent,
                    current: current.spent,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LedgerBuilder;
    use crate::schema::{LineItemSnapshot, PriorFunding, ProjectDetails};

    fn fy(year: i32) -> FiscalYear {
        FiscalYear::new(year)
    }

    fn item(name: &str, allotments: u64, balance: u64) -> LineItemSnapshot {
        LineItemSnapshot {
            name: name.to_string(),
            prior_funding: PriorFunding {
                allotments,
                balance,
                ..Default::default()
            },
            proposed_funding: Default::default(),
        }
    }

    fn snapshot(year: i32, phases: Vec<LineItemSnapshot>) -> YearlySnapshot {
        YearlySnapshot {
            fiscal_year: fy(year),
            project_no: "HT-12".to_string(),
            details: ProjectDetails::default(),
            funding_by_phase: phases,
            funding_by_source: vec![],
        }
    }

    fn audit(snapshots: &[YearlySnapshot]) -> Vec<DataQualityWarning> {
        let funding = LedgerBuilder::new(fy(2017), 5, fy(2017)).build(snapshots).unwrap();
        LedgerAuditor::new(snapshots).audit(&funding)
    }

    #[test]
    fn test_clean_project_has_no_warnings() {
        let snapshots = vec![
            snapshot(2016, vec![item("Design", 100, 40)]),
            snapshot(2017, vec![item("Design", 100, 20)]),
        ];
        assert!(audit(&snapshots).is_empty());
    }

    #[test]
    fn test_balance_above_allotments_is_inconsistent() {
        let warnings = audit(&[snapshot(2017, vec![item("Design", 10, 25)])]);

        // line item and total
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| matches!(
            w,
            DataQualityWarning::InconsistentLedger { spent: -15, allotted: 10, .. }
        )));
    }

    #[test]
    fn test_dropped_item_is_reported_missing() {
        let snapshots = vec![
            snapshot(2015, vec![item("Design", 10, 0), item("Equipment", 5, 5)]),
            snapshot(2016, vec![item("Design", 10, 0)]),
        ];
        let warnings = audit(&snapshots);
        assert_eq!(
            warnings,
            vec![DataQualityWarning::MissingLineItem {
                dimension: FundingDimension::Phase,
                line_item: LineItemKey::normalize("Equipment").unwrap(),
                fiscal_year: fy(2016),
            }]
        );
    }

    #[test]
    fn test_spent_decrease_and_duplicates() {
        let snapshots = vec![
            snapshot(2015, vec![item("Design", 100, 0)]),
            snapshot(2016, vec![item("Design", 100, 50), item("design", 1, 0)]),
            snapshot(2017, vec![item("Design", 100, 50), item("design", 1, 0), item("design", 1, 0)]),
        ];
        let warnings = audit(&snapshots);

        assert!(warnings.iter().any(|w| matches!(
            w,
            DataQualityWarning::SpentDecreased { scope: LedgerScope::LineItem { .. }, previous: 100, current: 50, .. }
        )));
        assert!(warnings.iter().any(|w| matches!(w, DataQualityWarning::NearDuplicateLabel { .. })));
        assert!(warnings.iter().any(|w| matches!(
            w,
            DataQualityWarning::DuplicateLineItem { fiscal_year, .. } if *fiscal_year == fy(2017)
        )));
    }

    #[test]
    fn test_warning_display() {
        let warning = DataQualityWarning::InconsistentLedger {
            scope: LedgerScope::Total,
            fiscal_year: fy(2016),
            allotted: 10,
            spent: 12,
        };
        assert_eq!(warning.to_string(), "total funding in FY2016: spent 12 against allotted 10");
    }
}
