use crate::audit::DataQualityWarning;
use crate::error::{CipError, Result};
use crate::schema::YearlySnapshot;
use crate::summary::ProjectSummary;
use crate::Project;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of a project's document: `<project_no>.json`.
pub fn document_file_name(project_no: &str) -> Result<String> {
    let valid = !project_no.is_empty()
        && !project_no.starts_with('.')
        && project_no
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(CipError::InvalidProjectNo(project_no.to_string()));
    }
    Ok(format!("{}.json", project_no))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Writes one document per project into `dir`, creating it if needed.
pub fn write_project_documents(dir: impl AsRef<Path>, projects: &[Project]) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(projects.len());
    for project in projects {
        let path = dir.join(document_file_name(&project.project_no)?);
        write_json(&path, project)?;
        written.push(path);
    }

    info!("Wrote {} project documents to {}", written.len(), dir.display());
    Ok(written)
}

pub fn write_summary(path: impl AsRef<Path>, summaries: &[ProjectSummary]) -> Result<()> {
    write_json(path.as_ref(), summaries)
}

/// Data-quality warnings keyed by project number, for review alongside the documents.
pub fn write_warnings(
    path: impl AsRef<Path>,
    warnings: &BTreeMap<&str, &[DataQualityWarning]>,
) -> Result<()> {
    let count: usize = warnings.values().map(|w| w.len()).sum();
    write_json(path.as_ref(), warnings)?;
    info!("Wrote {} warnings for {} projects", count, warnings.len());
    Ok(())
}

/// The raw intermediate dump of every validated snapshot.
pub fn write_snapshot_dump(path: impl AsRef<Path>, snapshots: &[YearlySnapshot]) -> Result<()> {
    write_json(path.as_ref(), snapshots)
}
