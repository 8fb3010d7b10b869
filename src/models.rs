use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// One normalized sheet row: field name → scalar value. Key order is the
/// header order of the source sheet (serde_json `preserve_order`), so the
/// emitted JSON matches the spreadsheet column order. When two headers
/// sanitize to the same field name the later column wins.
pub type Record = serde_json::Map<String, Value>;

/// Ordered collection of Records produced from one source file.
pub type Dataset = Vec<Record>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Employees,
    Activities,
}

impl DatasetKind {
    pub fn label(&self) -> &'static str {
        match self {
            DatasetKind::Employees => "employees",
            DatasetKind::Activities => "activities",
        }
    }

    pub fn output_filename(&self) -> &'static str {
        match self {
            DatasetKind::Employees => "employees.json",
            DatasetKind::Activities => "activities.json",
        }
    }
}

/// True when every value in the record is the empty string. Such rows are
/// filler in the source sheets and are dropped from the output.
pub fn is_blank_record(record: &Record) -> bool {
    record
        .values()
        .all(|value| matches!(value, Value::String(s) if s.is_empty()))
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceFiles {
    pub employees: String,
    pub activities: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStats {
    pub total: usize,
    pub male: usize,
    pub female: usize,
    pub other: usize,
    pub male_percentage: String,
    pub female_percentage: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityStats {
    pub total: usize,
}

/// Summary written to `stats.json` once both datasets exist. Field order
/// matches the file format consumed by the mobile app.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStats {
    pub conversion_date: String,
    pub source_files: SourceFiles,
    pub output_location: String,
    pub employees: EmployeeStats,
    pub activities: ActivityStats,
    pub notes: Vec<String>,
}

/// What a completed batch run produced; `None` from the pipeline means an
/// early abort on a fatal precondition.
#[derive(Debug)]
pub struct RunSummary {
    pub employees: Dataset,
    pub activities: Dataset,
    pub stats: ConversionStats,
    pub employees_path: PathBuf,
    pub activities_path: Option<PathBuf>,
    pub stats_path: Option<PathBuf>,
    pub mirrored_files: usize,
}
