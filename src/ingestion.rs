use crate::error::{CipError, Result};
use crate::schema::{
    FiscalYear, LineItemSnapshot, Milestones, PriorFunding, ProjectDetails, YearlySnapshot,
};
use crate::utils::{expand_two_digit_year, parse_amount, parse_fiscal_year, parse_optional_amount};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A funding table row as the page scraper captured it: every figure still text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLineItem {
    pub label: String,
    /// Column name (`Allotments`, `Spent`, `Enc/ID-Adv`, `Pre-Enc`, `Balance`) to cell text.
    #[serde(default)]
    pub prior_funding: BTreeMap<String, String>,
    /// `FY<yyyy>` to cell text.
    #[serde(default)]
    pub proposed_funding: BTreeMap<String, String>,
}

/// One project page of one budget book, as scraped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPage {
    /// Budget cycle, either two-digit (`17`) or four-digit (`2017`).
    pub cip_fy: u32,
    pub project_no: Option<String>,
    pub title: Option<String>,
    pub image: Option<String>,
    pub agency: Option<String>,
    pub implementing_agency: Option<String>,
    pub ward: Option<String>,
    pub location: Option<String>,
    pub facility: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub justification: Option<String>,
    pub progress_assessment: Option<String>,
    pub related_projects: Option<String>,
    pub milestones: Option<Milestones>,
    pub est_cost: Option<String>,
    pub useful_life: Option<String>,
    pub funding_by_phase: Vec<RawLineItem>,
    pub funding_by_source: Vec<RawLineItem>,
}

#[derive(Debug)]
pub struct IngestFailure {
    /// Position of the page in the input.
    pub index: usize,
    pub project_no: Option<String>,
    pub error: CipError,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub snapshots: Vec<YearlySnapshot>,
    pub rejected: Vec<IngestFailure>,
}

pub fn fiscal_year_of_page(cip_fy: u32) -> Result<FiscalYear> {
    if cip_fy < 100 {
        Ok(expand_two_digit_year(cip_fy))
    } else {
        let year = i32::try_from(cip_fy)
            .map_err(|_| CipError::InvalidFiscalYear(cip_fy.to_string()))?;
        FiscalYear::try_new(year)
    }
}

pub fn parse_raw_line_item(raw: &RawLineItem) -> Result<LineItemSnapshot> {
    let cell = |column: &str| -> Result<u64> {
        let field = format!("{} {}", raw.label.trim(), column);
        parse_amount(&field, raw.prior_funding.get(column).map(String::as_str).unwrap_or(""))
    };

    let prior_funding = PriorFunding {
        allotments: cell("Allotments")?,
        spent: cell("Spent")?,
        enc_id_adv: cell("Enc/ID-Adv")?,
        pre_enc: cell("Pre-Enc")?,
        balance: cell("Balance")?,
    };

    let mut proposed_funding = BTreeMap::new();
    for (key, value) in &raw.proposed_funding {
        let year = parse_fiscal_year(key)?;
        let field = format!("{} {}", raw.label.trim(), year);
        proposed_funding.insert(year, parse_amount(&field, value)?);
    }

    Ok(LineItemSnapshot {
        name: raw.label.clone(),
        prior_funding,
        proposed_funding,
    })
}

/// Useful life is printed as free text ("25", "25 years"); the leading number is
/// kept and anything without one is treated as absent.
fn parse_useful_life(raw: Option<&str>) -> Option<u32> {
    let digits: String = raw?
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn parse_raw_page(page: &RawPage) -> Result<YearlySnapshot> {
    let fiscal_year = fiscal_year_of_page(page.cip_fy)?;

    let project_no = page
        .project_no
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(CipError::MissingProjectNo { fiscal_year })?
        .to_string();

    let est_cost = parse_optional_amount("Estimated Full Funding Cost", page.est_cost.as_deref())?;
    let useful_life = parse_useful_life(page.useful_life.as_deref());
    if useful_life.is_none() && page.useful_life.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        debug!(
            "Project {} ({}): unreadable useful life '{}'",
            project_no,
            fiscal_year,
            page.useful_life.as_deref().unwrap_or_default()
        );
    }

    let funding_by_phase = page
        .funding_by_phase
        .iter()
        .map(parse_raw_line_item)
        .collect::<Result<Vec<_>>>()?;
    let funding_by_source = page
        .funding_by_source
        .iter()
        .map(parse_raw_line_item)
        .collect::<Result<Vec<_>>>()?;

    Ok(YearlySnapshot {
        fiscal_year,
        project_no,
        details: ProjectDetails {
            title: page.title.clone(),
            image: page.image.clone(),
            agency: page.agency.clone(),
            implementing_agency: page.implementing_agency.clone(),
            ward: page.ward.clone(),
            location: page.location.clone(),
            facility: page.facility.clone(),
            status: page.status.clone(),
            description: page.description.clone(),
            justification: page.justification.clone(),
            progress_assessment: page.progress_assessment.clone(),
            related_projects: page.related_projects.clone(),
            milestones: page.milestones.clone(),
            est_cost,
            useful_life,
        },
        funding_by_phase,
        funding_by_source,
    })
}

/// Validates every page independently; a rejected page never blocks the others.
pub fn ingest_pages(pages: &[RawPage]) -> IngestReport {
    let mut report = IngestReport::default();

    for (index, page) in pages.iter().enumerate() {
        match parse_raw_page(page) {
            Ok(snapshot) => report.snapshots.push(snapshot),
            Err(error) => {
                warn!("Rejected page #{} ({:?}): {}", index, page.project_no, error);
                report.rejected.push(IngestFailure {
                    index,
                    project_no: page.project_no.clone(),
                    error,
                });
            }
        }
    }

    debug!(
        "Ingested {} pages, rejected {}",
        report.snapshots.len(),
        report.rejected.len()
    );
    report
}

/// Groups snapshots by project number, each group in ascending fiscal-year order.
pub fn group_by_project(snapshots: Vec<YearlySnapshot>) -> BTreeMap<String, Vec<YearlySnapshot>> {
    let mut projects: BTreeMap<String, Vec<YearlySnapshot>> = BTreeMap::new();
    for snapshot in snapshots {
        projects
            .entry(snapshot.project_no.clone())
            .or_default()
            .push(snapshot);
    }
    for group in projects.values_mut() {
        group.sort_by_key(|s| s.fiscal_year);
    }
    projects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_item(label: &str, prior: &[(&str, &str)], proposed: &[(&str, &str)]) -> RawLineItem {
        RawLineItem {
            label: label.to_string(),
            prior_funding: prior
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            proposed_funding: proposed
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn page(cip_fy: u32, project_no: &str) -> RawPage {
        RawPage {
            cip_fy,
            project_no: Some(project_no.to_string()),
            title: Some("Fire Station Renovation".to_string()),
            est_cost: Some("$2,400,000".to_string()),
            useful_life: Some("30 years".to_string()),
            funding_by_phase: vec![raw_item(
                "Construction",
                &[("Allotments", "1,200"), ("Spent", "300"), ("Balance", "900")],
                &[("FY2017", "500"), ("FY2018", "-")],
            )],
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_raw_page() {
        let snapshot = parse_raw_page(&page(17, " FR0-LF239 ")).unwrap();

        assert_eq!(snapshot.fiscal_year, FiscalYear::new(2017));
        assert_eq!(snapshot.project_no, "FR0-LF239");
        assert_eq!(snapshot.details.est_cost, Some(2_400_000));
        assert_eq!(snapshot.details.useful_life, Some(30));

        let construction = &snapshot.funding_by_phase[0];
        assert_eq!(construction.prior_funding.allotments, 1200);
        assert_eq!(construction.prior_funding.balance, 900);
        assert_eq!(construction.prior_funding.pre_enc, 0);
        assert_eq!(construction.proposed_for(FiscalYear::new(2017)), 500);
        assert_eq!(construction.proposed_for(FiscalYear::new(2018)), 0);
    }

    #[test]
    fn test_malformed_amount_rejects_page_only() {
        let mut bad = page(2016, "FR0-LF239");
        bad.funding_by_phase[0]
            .prior_funding
            .insert("Balance".to_string(), "(900)".to_string());

        let report = ingest_pages(&[bad, page(2017, "FR0-LF239"), RawPage::default()]);

        assert_eq!(report.snapshots.len(), 1);
        assert_eq!(report.rejected.len(), 2);
        assert!(matches!(
            report.rejected[0].error,
            CipError::MalformedAmount { .. }
        ));
        assert_eq!(report.rejected[1].index, 2);
        assert!(matches!(
            report.rejected[1].error,
            CipError::MissingProjectNo { .. }
        ));
    }

    #[test]
    fn test_group_by_project_orders_years() {
        let snapshots = vec![
            parse_raw_page(&page(17, "B")).unwrap(),
            parse_raw_page(&page(15, "A")).unwrap(),
            parse_raw_page(&page(15, "B")).unwrap(),
        ];
        let grouped = group_by_project(snapshots);

        assert_eq!(grouped.keys().cloned().collect::<Vec<_>>(), vec!["A", "B"]);
        let years: Vec<_> = grouped["B"].iter().map(|s| s.fiscal_year.year()).collect();
        assert_eq!(years, vec![2015, 2017]);
    }

    #[test]
    fn test_useful_life_text() {
        assert_eq!(parse_useful_life(Some("15")), Some(15));
        assert_eq!(parse_useful_life(Some(" 40 yrs")), Some(40));
        assert_eq!(parse_useful_life(Some("N/A")), None);
        assert_eq!(parse_useful_life(None), None);
    }
}
