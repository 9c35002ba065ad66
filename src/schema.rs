use crate::error::{CipError, Result};
use crate::utils::parse_fiscal_year;
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A budget fiscal year, persisted as `FY<yyyy>` (e.g. `FY2017`).
///
/// Ordering is numeric, so `BTreeMap<FiscalYear, _>` iterates chronologically and
/// serializes deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiscalYear(i32);

impl FiscalYear {
    pub const fn new(year: i32) -> Self {
        Self(year)
    }

    /// Validating constructor: only 4-digit years can be written as `FY<yyyy>` keys.
    pub fn try_new(year: i32) -> Result<Self> {
        if !(1000..=9999).contains(&year) {
            return Err(CipError::InvalidFiscalYear(format!(
                "{} is not a 4-digit year",
                year
            )));
        }
        Ok(Self(year))
    }

    pub const fn year(self) -> i32 {
        self.0
    }

    pub const fn offset(self, years: i32) -> Self {
        Self(self.0 + years)
    }

    /// `self + years`, or `None` when the result does not fit.
    pub fn checked_offset(self, years: u32) -> Option<Self> {
        let years = i32::try_from(years).ok()?;
        self.0.checked_add(years).map(Self)
    }

    pub fn key(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FY{:04}", self.0)
    }
}

impl FromStr for FiscalYear {
    type Err = CipError;

    fn from_str(s: &str) -> Result<Self> {
        parse_fiscal_year(s)
    }
}

impl Serialize for FiscalYear {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

struct FiscalYearVisitor;

impl<'de> Visitor<'de> for FiscalYearVisitor {
    type Value = FiscalYear;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a fiscal year key such as \"FY2017\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<FiscalYear, E> {
        parse_fiscal_year(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<FiscalYear, E> {
        let year = i32::try_from(v).map_err(E::custom)?;
        FiscalYear::try_new(year).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<FiscalYear, E> {
        let year = i32::try_from(v).map_err(E::custom)?;
        FiscalYear::try_new(year).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for FiscalYear {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(FiscalYearVisitor)
    }
}

impl JsonSchema for FiscalYear {
    fn schema_name() -> String {
        "FiscalYear".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        let mut schema = <String as JsonSchema>::json_schema(gen).into_object();
        schema.string().pattern = Some("^FY[0-9]{4}$".to_string());
        schema.metadata().description =
            Some("Fiscal year key, 'FY' followed by a 4-digit year".to_string());
        schema.into()
    }
}

/// The two funding tables every CIP page carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FundingDimension {
    Phase,
    Source,
}

impl FundingDimension {
    pub const ALL: [FundingDimension; 2] = [FundingDimension::Phase, FundingDimension::Source];
}

impl fmt::Display for FundingDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundingDimension::Phase => f.write_str("phase"),
            FundingDimension::Source => f.write_str("source"),
        }
    }
}

/// The "prior funding" columns of a funding table row, in thousands of dollars.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PriorFunding {
    #[serde(rename = "Allotments")]
    #[schemars(description = "Cumulative amount allotted to the line item before the snapshot year")]
    pub allotments: u64,

    #[serde(rename = "Spent")]
    pub spent: u64,

    #[serde(rename = "Enc/ID-Adv")]
    #[schemars(description = "Encumbered and intra-district advances")]
    pub enc_id_adv: u64,

    #[serde(rename = "Pre-Enc")]
    pub pre_enc: u64,

    #[serde(rename = "Balance")]
    #[schemars(description = "Unspent remainder of the allotments")]
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LineItemSnapshot {
    #[schemars(
        description = "Phase or source label as printed, fragments of multi-line labels joined by spaces"
    )]
    pub name: String,

    pub prior_funding: PriorFunding,

    #[schemars(
        description = "Proposed funding in thousands of dollars for the snapshot year and the following years"
    )]
    pub proposed_funding: BTreeMap<FiscalYear, u64>,
}

impl LineItemSnapshot {
    pub fn proposed_for(&self, year: FiscalYear) -> u64 {
        self.proposed_funding.get(&year).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MilestoneDates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Milestones {
    pub environmental_approvals: MilestoneDates,
    pub design_start: MilestoneDates,
    pub design_complete: MilestoneDates,
    pub construction_start: MilestoneDates,
    pub construction_complete: MilestoneDates,
    pub closeout: MilestoneDates,
}

/// Descriptive project fields. Opaque to the funding aggregation; carried through
/// the merge with latest-non-empty-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProjectDetails {
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
    #[schemars(description = "Estimated full funding cost in whole dollars")]
    pub est_cost: Option<u64>,
    #[schemars(description = "Useful life of the project in years")]
    pub useful_life: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct YearlySnapshot {
    #[schemars(description = "The budget cycle this page was published in")]
    pub fiscal_year: FiscalYear,

    pub project_no: String,

    #[serde(flatten)]
    pub details: ProjectDetails,

    #[serde(default)]
    pub funding_by_phase: Vec<LineItemSnapshot>,

    #[serde(default)]
    pub funding_by_source: Vec<LineItemSnapshot>,
}

impl YearlySnapshot {
    pub fn line_items(&self, dimension: FundingDimension) -> &[LineItemSnapshot] {
        match dimension {
            FundingDimension::Phase => &self.funding_by_phase,
            FundingDimension::Source => &self.funding_by_source,
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Vec<YearlySnapshot>)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
