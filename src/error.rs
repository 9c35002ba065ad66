use crate::schema::{FiscalYear, FundingDimension};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CipError {
    #[error("Malformed amount in {field}: '{value}' is not a non-negative whole number")]
    MalformedAmount { field: String, value: String },

    #[error("Invalid fiscal year: {0}")]
    InvalidFiscalYear(String),

    #[error("Project {project_no} ({fiscal_year}) has a {dimension} line item with an empty label")]
    EmptyLineItemLabel {
        project_no: String,
        fiscal_year: FiscalYear,
        dimension: FundingDimension,
    },

    #[error("Snapshot for {fiscal_year} has no project number")]
    MissingProjectNo { fiscal_year: FiscalYear },

    #[error("Project {project_no} has more than one snapshot for {fiscal_year}")]
    DuplicateSnapshot {
        project_no: String,
        fiscal_year: FiscalYear,
    },

    #[error("Project {project_no} has a snapshot for {fiscal_year}, outside the run {first_year}..={final_year}")]
    SnapshotOutOfRange {
        project_no: String,
        fiscal_year: FiscalYear,
        first_year: FiscalYear,
        final_year: FiscalYear,
    },

    #[error("Project {0} has no snapshots")]
    NoSnapshots(String),

    #[error("Project {project_no} line item '{line_item}' in {fiscal_year} proposes funding for {year}, outside the snapshot window")]
    ProposedYearOutOfRange {
        project_no: String,
        line_item: String,
        fiscal_year: FiscalYear,
        year: FiscalYear,
    },

    #[error("Amount overflow while computing {0}")]
    AmountOverflow(String),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("Project number '{0}' cannot be used as a document name")]
    InvalidProjectNo(String),

    #[error("Geocoding error: {0}")]
    Geocoding(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CipError>;
