use crate::error::{CipError, Result};
use crate::schema::FiscalYear;
use crate::utils::fiscal_years_between;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_first_fiscal_year() -> FiscalYear {
    FiscalYear::new(2010)
}

fn default_final_fiscal_year() -> FiscalYear {
    FiscalYear::new(2017)
}

fn default_projection_horizon() -> u32 {
    5
}

fn default_cost_multiplier() -> u64 {
    1000
}

/// Run-wide parameters of the aggregation.
///
/// The final fiscal year is supplied here rather than inferred from the data: it
/// decides which projects are active and which snapshot is projected forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    #[serde(default = "default_first_fiscal_year")]
    #[schemars(description = "Earliest budget cycle included in the run")]
    pub first_fiscal_year: FiscalYear,

    #[serde(default = "default_final_fiscal_year")]
    #[schemars(description = "Most recent budget cycle; its snapshots are projected forward")]
    pub final_fiscal_year: FiscalYear,

    #[serde(default = "default_projection_horizon")]
    #[schemars(description = "Number of years each snapshot proposes funding for beyond its own")]
    pub projection_horizon: u32,

    #[serde(default = "default_cost_multiplier")]
    #[schemars(description = "Factor converting ledger amounts (thousands) into whole dollars")]
    pub cost_multiplier: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            first_fiscal_year: default_first_fiscal_year(),
            final_fiscal_year: default_final_fiscal_year(),
            projection_horizon: default_projection_horizon(),
            cost_multiplier: default_cost_multiplier(),
        }
    }
}

impl PipelineConfig {
    pub fn new(first_fiscal_year: FiscalYear, final_fiscal_year: FiscalYear) -> Self {
        Self {
            first_fiscal_year,
            final_fiscal_year,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        FiscalYear::try_new(self.first_fiscal_year.year())?;
        FiscalYear::try_new(self.final_fiscal_year.year())?;

        if self.final_fiscal_year < self.first_fiscal_year {
            return Err(CipError::InvalidConfig(format!(
                "final_fiscal_year {} precedes first_fiscal_year {}",
                self.final_fiscal_year, self.first_fiscal_year
            )));
        }
        if self.projection_horizon == 0 {
            return Err(CipError::InvalidConfig(
                "projection_horizon must be at least 1".to_string(),
            ));
        }
        let reaches_four_digits = self
            .final_fiscal_year
            .checked_offset(self.projection_horizon)
            .is_some_and(|end| end.year() <= 9999);
        if !reaches_four_digits {
            return Err(CipError::InvalidConfig(format!(
                "projection_horizon {} carries {} past FY9999",
                self.projection_horizon, self.final_fiscal_year
            )));
        }
        if self.cost_multiplier == 0 {
            return Err(CipError::InvalidConfig(
                "cost_multiplier must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fiscal_years(&self) -> Vec<FiscalYear> {
        fiscal_years_between(self.first_fiscal_year, self.final_fiscal_year)
    }

    pub fn covers(&self, year: FiscalYear) -> bool {
        (self.first_fiscal_year..=self.final_fiscal_year).contains(&year)
    }

    /// Last year a snapshot published in `year` proposes funding for.
    pub fn horizon_end(&self, year: FiscalYear) -> Result<FiscalYear> {
        year.checked_offset(self.projection_horizon).ok_or_else(|| {
            CipError::InvalidConfig(format!(
                "projection_horizon {} overflows {}",
                self.projection_horizon, year
            ))
        })
    }
}
