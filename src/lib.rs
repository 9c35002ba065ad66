//! # CIP Funding History
//!
//! A library for folding yearly capital-improvement-plan (CIP) snapshots into one
//! record per project, with running funding ledgers and a history of how the plan
//! changed between budget cycles.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: one budget cycle's page for a project, with its funding-by-phase
//!   and funding-by-source tables
//! - **Ledger**: per fiscal year `{allotted, spent, proposed}` for a line item or the total
//! - **Projection**: the final cycle's snapshot extends its ledgers forward using its
//!   own proposed figures; earlier cycles only contribute their own year
//! - **CIP History**: each cycle's proposed funding by year, never merged across cycles
//! - **Warnings**: data-quality findings (overspent ledgers, dropped or near-duplicate
//!   line items) attached to a project instead of failing it
//!
//! ## Example
//!
//! ```rust,ignore
//! use cip_funding_history::*;
//!
//! let config = PipelineConfig::new(FiscalYear::new(2010), FiscalYear::new(2017));
//! let pages: Vec<RawPage> = serde_json::from_str(&std::fs::read_to_string("data.json")?)?;
//!
//! let report = process_pages(&config, &pages)?;
//! for flagged in report.flagged_projects() {
//!     println!("check {}", flagged);
//! }
//!
//! write_project_documents("app/data/projects", &report.projects())?;
//! write_summary("app/data/summary.json", &report.summaries())?;
//! write_warnings("app/data/warnings.json", &report.warnings_by_project())?;
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod export;
pub mod geocode;
pub mod history;
pub mod ingestion;
pub mod ledger;
pub mod line_items;
pub mod merger;
pub mod schema;
pub mod summary;
pub mod utils;

pub use audit::{DataQualityWarning, LedgerAuditor, LedgerScope};
pub use config::PipelineConfig;
pub use engine::{planned_last_year, CumulativeFunding, LedgerBuilder};
pub use error::{CipError, Result};
pub use estimate::{derived_est_cost, resolve_est_cost};
pub use export::{write_project_documents, write_snapshot_dump, write_summary, write_warnings};
pub use geocode::{resolve_location, Coordinates, Geocoder, NoGeocoder, StaticGeocoder};
pub use history::{proposed_view, track_history, CipHistory, ProposedView};
pub use ingestion::*;
pub use ledger::{sum_ledgers, Ledger, LedgerEntry};
pub use line_items::{find_near_duplicates, LineItemKey};
pub use merger::{fold_snapshots, merge_details, prepare_snapshots, ProjectDraft};
pub use schema::*;
pub use summary::{summarize, ProjectSummary};
pub use utils::*;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A published project record, serialized as the per-project JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub project_no: String,
    /// Latest non-empty descriptive fields. `est_cost` is always resolved here,
    /// either published or derived from the total ledger.
    #[serde(flatten)]
    pub details: ProjectDetails,
    /// Present in the run's final fiscal year.
    pub active: bool,
    pub first_year: i32,
    /// Last year with any planned funding; may run past the last published cycle.
    pub last_year: i32,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub cumulative_funding: CumulativeFunding,
    pub cip_history: CipHistory,
}

impl Project {
    pub fn est_cost(&self) -> u64 {
        self.details.est_cost.unwrap_or(0)
    }

    pub fn with_coordinates(self, coordinates: Option<Coordinates>) -> Self {
        Self {
            lat: coordinates.map(|c| c.lat),
            lon: coordinates.map(|c| c.lon),
            ..self
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedProject {
    pub project: Project,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug)]
pub struct ProjectFailure {
    pub project_no: String,
    pub error: CipError,
}

/// Outcome of a full run. Failed projects and rejected pages are listed
/// alongside the projects that made it through.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub processed: Vec<ProcessedProject>,
    pub failures: Vec<ProjectFailure>,
    pub rejected_pages: Vec<IngestFailure>,
}

impl PipelineReport {
    pub fn projects(&self) -> Vec<Project> {
        self.processed.iter().map(|p| p.project.clone()).collect()
    }

    pub fn project(&self, project_no: &str) -> Option<&ProcessedProject> {
        self.processed
            .iter()
            .find(|p| p.project.project_no == project_no)
    }

    pub fn summaries(&self) -> Vec<ProjectSummary> {
        summarize(self.processed.iter().map(|p| &p.project))
    }

    /// Project numbers carrying at least one data-quality warning.
    pub fn flagged_projects(&self) -> Vec<&str> {
        self.processed
            .iter()
            .filter(|p| !p.warnings.is_empty())
            .map(|p| p.project.project_no.as_str())
            .collect()
    }

    /// Warnings of every flagged project, keyed by project number.
    pub fn warnings_by_project(&self) -> BTreeMap<&str, &[DataQualityWarning]> {
        self.processed
            .iter()
            .filter(|p| !p.warnings.is_empty())
            .map(|p| (p.project.project_no.as_str(), p.warnings.as_slice()))
            .collect()
    }

    pub fn warning_count(&self) -> usize {
        self.processed.iter().map(|p| p.warnings.len()).sum()
    }
}

pub struct CipProcessor;

impl CipProcessor {
    pub fn process(config: &PipelineConfig, snapshots: Vec<YearlySnapshot>) -> Result<PipelineReport> {
        Self::process_with_geocoder(config, snapshots, &NoGeocoder)
    }

    /// Runs every project independently. A project that cannot be aggregated is
    /// recorded as a failure and the run continues.
    pub fn process_with_geocoder(
        config: &PipelineConfig,
        snapshots: Vec<YearlySnapshot>,
        geocoder: &dyn Geocoder,
    ) -> Result<PipelineReport> {
        config.validate()?;

        info!(
            "Processing {} snapshots for {} through {}",
            snapshots.len(),
            config.first_fiscal_year,
            config.final_fiscal_year
        );

        let mut report = PipelineReport::default();

        for (project_no, group) in group_by_project(snapshots) {
            match Self::process_project(config, &project_no, group) {
                Ok(mut processed) => {
                    let coordinates =
                        resolve_location(geocoder, processed.project.details.location.as_deref());
                    processed.project = processed.project.with_coordinates(coordinates);

                    for warning in &processed.warnings {
                        warn!("Project {}: {}", project_no, warning);
                    }
                    report.processed.push(processed);
                }
                Err(error) => {
                    warn!("Project {} failed: {}", project_no, error);
                    report.failures.push(ProjectFailure { project_no, error });
                }
            }
        }

        info!(
            "Processed {} projects ({} flagged, {} failed)",
            report.processed.len(),
            report.flagged_projects().len(),
            report.failures.len()
        );

        Ok(report)
    }

    pub fn process_project(
        config: &PipelineConfig,
        project_no: &str,
        snapshots: Vec<YearlySnapshot>,
    ) -> Result<ProcessedProject> {
        let snapshots = prepare_snapshots(project_no, snapshots, config)?;
        let draft = fold_snapshots(&snapshots, config.final_fiscal_year)
            .ok_or_else(|| CipError::NoSnapshots(project_no.to_string()))?;

        let mut last_year = draft.latest_year;
        if draft.active {
            if let Some(final_snapshot) = snapshots.last() {
                last_year = planned_last_year(final_snapshot, last_year);
            }
        }

        let builder = LedgerBuilder::new(config.final_fiscal_year, config.projection_horizon, last_year);
        let cumulative_funding = builder.build(&snapshots)?;
        let cip_history = track_history(&snapshots)?;

        let mut details = draft.details;
        let est_cost = resolve_est_cost(
            details.est_cost,
            &cumulative_funding.total_funding,
            config.cost_multiplier,
        )?;
        if details.est_cost.is_none() {
            debug!("Project {}: no published estimate, derived {}", project_no, est_cost);
        }
        details.est_cost = Some(est_cost);

        let warnings = LedgerAuditor::new(&snapshots).audit(&cumulative_funding);

        debug!(
            "Project {}: {} snapshots, {}..={}, {} phase and {} source line items",
            project_no,
            snapshots.len(),
            draft.first_year,
            last_year,
            cumulative_funding.funding_by_phase.len(),
            cumulative_funding.funding_by_source.len()
        );

        Ok(ProcessedProject {
            project: Project {
                project_no: draft.project_no,
                details,
                active: draft.active,
                first_year: draft.first_year.year(),
                last_year: last_year.year(),
                lat: None,
                lon: None,
                cumulative_funding,
                cip_history,
            },
            warnings,
        })
    }
}

pub fn process_snapshots(config: &PipelineConfig, snapshots: Vec<YearlySnapshot>) -> Result<PipelineReport> {
    CipProcessor::process(config, snapshots)
}

/// Ingests scraped pages and runs the aggregation over every page that validated.
pub fn process_pages(config: &PipelineConfig, pages: &[RawPage]) -> Result<PipelineReport> {
    let ingested = ingest_pages(pages);
    let mut report = CipProcessor::process(config, ingested.snapshots)?;
    report.rejected_pages = ingested.rejected;
    Ok(report)
}
