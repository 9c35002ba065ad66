use crate::config::PipelineConfig;
use crate::error::{CipError, Result};
use crate::line_items::LineItemKey;
use crate::schema::{
    FiscalYear, FundingDimension, LineItemSnapshot, Milestones, ProjectDetails, YearlySnapshot,
};

/// The merged view of a project before funding is aggregated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDraft {
    pub project_no: String,
    pub details: ProjectDetails,
    pub first_year: FiscalYear,
    pub latest_year: FiscalYear,
    pub active: bool,
}

impl ProjectDraft {
    pub fn start(snapshot: &YearlySnapshot, final_year: FiscalYear) -> Self {
        Self {
            project_no: snapshot.project_no.clone(),
            details: merge_details(ProjectDetails::default(), &snapshot.details),
            first_year: snapshot.fiscal_year,
            latest_year: snapshot.fiscal_year,
            active: snapshot.fiscal_year == final_year,
        }
    }

    /// Folds a newer snapshot into the draft, returning the updated draft.
    ///
    /// Per-field policy:
    /// - descriptive fields: latest non-empty value wins, blanks never erase
    /// - `first_year`: earliest snapshot year seen
    /// - `latest_year`: most recent snapshot year seen
    /// - `active`: set once any snapshot belongs to the final fiscal year
    pub fn merge(self, snapshot: &YearlySnapshot, final_year: FiscalYear) -> Self {
        Self {
            project_no: self.project_no,
            details: merge_details(self.details, &snapshot.details),
            first_year: self.first_year.min(snapshot.fiscal_year),
            latest_year: self.latest_year.max(snapshot.fiscal_year),
            active: self.active || snapshot.fiscal_year == final_year,
        }
    }
}

/// Latest-non-empty-wins merge of descriptive fields.
pub fn merge_details(current: ProjectDetails, newer: &ProjectDetails) -> ProjectDetails {
    ProjectDetails {
        title: pick_text(current.title, &newer.title),
        image: pick_text(current.image, &newer.image),
        agency: pick_text(current.agency, &newer.agency),
        implementing_agency: pick_text(current.implementing_agency, &newer.implementing_agency),
        ward: pick_text(current.ward, &newer.ward),
        location: pick_text(current.location, &newer.location),
        facility: pick_text(current.facility, &newer.facility),
        status: pick_text(current.status, &newer.status),
        description: pick_text(current.description, &newer.description),
        justification: pick_text(current.justification, &newer.justification),
        progress_assessment: pick_text(current.progress_assessment, &newer.progress_assessment),
        related_projects: pick_text(current.related_projects, &newer.related_projects),
        milestones: pick_milestones(current.milestones, &newer.milestones),
        est_cost: newer.est_cost.or(current.est_cost),
        useful_life: newer.useful_life.or(current.useful_life),
    }
}

fn pick_text(current: Option<String>, newer: &Option<String>) -> Option<String> {
    match newer {
        Some(value) if !value.trim().is_empty() => Some(value.clone()),
        _ => current,
    }
}

fn pick_milestones(current: Option<Milestones>, newer: &Option<Milestones>) -> Option<Milestones> {
    match newer {
        Some(value) if *value != Milestones::default() => Some(value.clone()),
        _ => current,
    }
}

/// Sorts a project's snapshots by fiscal year and rejects inputs the aggregation
/// cannot interpret: duplicate years, years outside the run, empty line-item
/// labels, and proposed years outside a snapshot's look-ahead window.
pub fn prepare_snapshots(
    project_no: &str,
    mut snapshots: Vec<YearlySnapshot>,
    config: &PipelineConfig,
) -> Result<Vec<YearlySnapshot>> {
    if snapshots.is_empty() {
        return Err(CipError::NoSnapshots(project_no.to_string()));
    }

    snapshots.sort_by_key(|s| s.fiscal_year);

    for pair in snapshots.windows(2) {
        if pair[0].fiscal_year == pair[1].fiscal_year {
            return Err(CipError::DuplicateSnapshot {
                project_no: project_no.to_string(),
                fiscal_year: pair[0].fiscal_year,
            });
        }
    }

    for snapshot in &snapshots {
        if !config.covers(snapshot.fiscal_year) {
            return Err(CipError::SnapshotOutOfRange {
                project_no: project_no.to_string(),
                fiscal_year: snapshot.fiscal_year,
                first_year: config.first_fiscal_year,
                final_year: config.final_fiscal_year,
            });
        }

        let window = snapshot.fiscal_year..=config.horizon_end(snapshot.fiscal_year)?;
        for dimension in FundingDimension::ALL {
            for item in snapshot.line_items(dimension) {
                if LineItemKey::normalize(&item.name).is_none() {
                    return Err(CipError::EmptyLineItemLabel {
                        project_no: project_no.to_string(),
                        fiscal_year: snapshot.fiscal_year,
                        dimension,
                    });
                }
                check_amounts(item)?;
                if let Some(year) = item.proposed_funding.keys().find(|y| !window.contains(*y)) {
                    return Err(CipError::ProposedYearOutOfRange {
                        project_no: project_no.to_string(),
                        line_item: item.name.clone(),
                        fiscal_year: snapshot.fiscal_year,
                        year: *year,
                    });
                }
            }
        }
    }

    Ok(snapshots)
}

/// Ledgers are signed, so every figure must fit in an `i64`.
fn check_amounts(item: &LineItemSnapshot) -> Result<()> {
    let prior = &item.prior_funding;
    let cells = [
        ("Allotments", prior.allotments),
        ("Spent", prior.spent),
        ("Enc/ID-Adv", prior.enc_id_adv),
        ("Pre-Enc", prior.pre_enc),
        ("Balance", prior.balance),
    ]
    .into_iter()
    .map(|(column, amount)| (column.to_string(), amount))
    .chain(
        item.proposed_funding
            .iter()
            .map(|(year, amount)| (year.key(), *amount)),
    );

    for (column, amount) in cells {
        if i64::try_from(amount).is_err() {
            return Err(CipError::MalformedAmount {
                field: format!("{} {}", item.name.trim(), column),
                value: amount.to_string(),
            });
        }
    }
    Ok(())
}

/// Folds ascending snapshots into one draft.
pub fn fold_snapshots(snapshots: &[YearlySnapshot], final_year: FiscalYear) -> Option<ProjectDraft> {
    let (first, rest) = snapshots.split_first()?;
    Some(
        rest.iter()
            .fold(ProjectDraft::start(first, final_year), |draft, snapshot| {
                draft.merge(snapshot, final_year)
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LineItemSnapshot, MilestoneDates, PriorFunding};
    use std::collections::BTreeMap;

    fn fy(year: i32) -> FiscalYear {
        FiscalYear::new(year)
    }

    fn snapshot(year: i32, details: ProjectDetails) -> YearlySnapshot {
        YearlySnapshot {
            fiscal_year: fy(year),
            project_no: "GM1-01".to_string(),
            details,
            funding_by_phase: vec![],
            funding_by_source: vec![],
        }
    }

    fn text(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_latest_non_empty_wins() {
        let snapshots = vec![
            snapshot(
                2012,
                ProjectDetails {
                    title: text("Old Title"),
                    agency: text("DGS"),
                    ward: text("3"),
                    est_cost: Some(900_000),
                    ..Default::default()
                },
            ),
            snapshot(
                2013,
                ProjectDetails {
                    title: text("New Title"),
                    agency: text("   "),
                    ..Default::default()
                },
            ),
            snapshot(
                2014,
                ProjectDetails {
                    status: text("Ongoing"),
                    ..Default::default()
                },
            ),
        ];

        let draft = fold_snapshots(&snapshots, fy(2017)).unwrap();
        assert_eq!(draft.details.title.as_deref(), Some("New Title"));
        assert_eq!(draft.details.agency.as_deref(), Some("DGS"));
        assert_eq!(draft.details.ward.as_deref(), Some("3"));
        assert_eq!(draft.details.status.as_deref(), Some("Ongoing"));
        assert_eq!(draft.details.est_cost, Some(900_000));
        assert_eq!(draft.first_year, fy(2012));
        assert_eq!(draft.latest_year, fy(2014));
        assert!(!draft.active);
    }

    #[test]
    fn test_active_iff_present_in_final_year() {
        let snapshots = vec![
            snapshot(2016, ProjectDetails::default()),
            snapshot(2017, ProjectDetails::default()),
        ];
        assert!(fold_snapshots(&snapshots, fy(2017)).unwrap().active);
        assert!(!fold_snapshots(&snapshots[..1], fy(2017)).unwrap().active);
        assert!(fold_snapshots(&[], fy(2017)).is_none());
    }

    #[test]
    fn test_empty_milestones_do_not_erase() {
        let scheduled = Milestones {
            design_start: MilestoneDates {
                projected: text("10/01/15"),
                actual: None,
            },
            ..Default::default()
        };
        let merged = merge_details(
            ProjectDetails {
                milestones: Some(scheduled.clone()),
                ..Default::default()
            },
            &ProjectDetails {
                milestones: Some(Milestones::default()),
                ..Default::default()
            },
        );
        assert_eq!(merged.milestones, Some(scheduled));
    }

    #[test]
    fn test_prepare_sorts_and_validates() {
        let config = PipelineConfig::new(fy(2010), fy(2017));
        let prepared = prepare_snapshots(
            "GM1-01",
            vec![
                snapshot(2016, ProjectDetails::default()),
                snapshot(2011, ProjectDetails::default()),
            ],
            &config,
        )
        .unwrap();
        assert_eq!(prepared[0].fiscal_year, fy(2011));

        let duplicate = prepare_snapshots(
            "GM1-01",
            vec![
                snapshot(2016, ProjectDetails::default()),
                snapshot(2016, ProjectDetails::default()),
            ],
            &config,
        );
        assert!(matches!(duplicate, Err(CipError::DuplicateSnapshot { .. })));

        let late = prepare_snapshots("GM1-01", vec![snapshot(2018, ProjectDetails::default())], &config);
        assert!(matches!(late, Err(CipError::SnapshotOutOfRange { .. })));

        let none = prepare_snapshots("GM1-01", vec![], &config);
        assert!(matches!(none, Err(CipError::NoSnapshots(_))));
    }

    #[test]
    fn test_prepare_rejects_proposals_outside_window() {
        let config = PipelineConfig::new(fy(2010), fy(2017));
        let mut proposed = BTreeMap::new();
        proposed.insert(fy(2014), 10u64);
        let mut bad = snapshot(2015, ProjectDetails::default());
        bad.funding_by_phase.push(LineItemSnapshot {
            name: "Design".to_string(),
            prior_funding: PriorFunding::default(),
            proposed_funding: proposed,
        });

        let result = prepare_snapshots("GM1-01", vec![bad], &config);
        assert!(matches!(
            result,
            Err(CipError::ProposedYearOutOfRange { year, .. }) if year == fy(2014)
        ));
    }

    #[test]
    fn test_prepare_rejects_amounts_beyond_signed_range() {
        let config = PipelineConfig::new(fy(2010), fy(2017));
        let mut bad = snapshot(2016, ProjectDetails::default());
        bad.funding_by_phase.push(LineItemSnapshot {
            name: "Construction".to_string(),
            prior_funding: PriorFunding {
                allotments: i64::MAX as u64 + 1,
                ..Default::default()
            },
            proposed_funding: BTreeMap::new(),
        });

        let result = prepare_snapshots("GM1-01", vec![bad], &config);
        assert!(matches!(
            result,
            Err(CipError::MalformedAmount { ref field, ref value })
                if field == "Construction Allotments" && value == "9223372036854775808"
        ));
    }
}
