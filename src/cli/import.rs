//! Import subcommand for the timely CLI
//!
//! Loads course assignments exported from the course site and applies them
//! to one user's classes.

use crate::types::ImportRecord;
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

/// Arguments for the import subcommand
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// User the assignments belong to
    #[arg(short, long)]
    pub user: String,

    /// JSON file holding a list of assignment records
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Read a JSON array of import records.
pub fn read_records(path: &Path) -> Result<Vec<ImportRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading import file {}", path.display()))?;
    let records = serde_json::from_str(&content)
        .with_context(|| format!("parsing import file {}", path.display()))?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_records_with_optional_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"title": "HW 1", "class_id": 1, "due_date": "2020-10-18", "external_id": 77}},
                {{"title": "HW 2", "class_id": 1, "due_date": "2020-10-25", "due_time": "23:59:00",
                  "link": "https://example.edu/hw2", "external_id": 78, "completed": true}}]"#
        )
        .unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].completed);
        assert_eq!(records[0].link, None);
        assert!(records[1].completed);
        assert_eq!(records[1].external_id, 78);
    }

    #[test]
    fn malformed_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = read_records(file.path()).unwrap_err();
        assert!(err.to_string().contains("parsing import file"));
    }
}
