use crate::ledger::{Ledger, LedgerEntry};
use crate::utils::{fiscal_year_containing, FISCAL_YEAR_END_MONTH};
use crate::Project;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryFunding {
    pub total_funding: Ledger,
}

/// The listing/search view of a project: a field selection, no computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project_no: String,
    pub title: Option<String>,
    pub agency: Option<String>,
    pub implementing_agency: Option<String>,
    pub ward: Option<String>,
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub est_cost: u64,
    pub active: bool,
    pub first_year: i32,
    pub last_year: i32,
    pub cumulative_funding: SummaryFunding,
}

impl ProjectSummary {
    pub fn from_project(project: &Project) -> Self {
        Self {
            project_no: project.project_no.clone(),
            title: project.details.title.clone(),
            agency: project.details.agency.clone(),
            implementing_agency: project.details.implementing_agency.clone(),
            ward: project.details.ward.clone(),
            location: project.details.location.clone(),
            lat: project.lat,
            lon: project.lon,
            est_cost: project.est_cost(),
            active: project.active,
            first_year: project.first_year,
            last_year: project.last_year,
            cumulative_funding: SummaryFunding {
                total_funding: project.cumulative_funding.total_funding.clone(),
            },
        }
    }

    /// Total funding position in the fiscal year containing `date`.
    pub fn funding_as_of(&self, date: NaiveDate) -> Option<&LedgerEntry> {
        let year = fiscal_year_containing(date, FISCAL_YEAR_END_MONTH);
        self.cumulative_funding.total_funding.get(&year)
    }
}

pub fn summarize<'a, I>(projects: I) -> Vec<ProjectSummary>
where
    I: IntoIterator<Item = &'a Project>,
{
    projects.into_iter().map(ProjectSummary::from_project).collect()
}
