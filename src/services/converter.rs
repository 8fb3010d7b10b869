use calamine::Data;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ConverterConfig;
use crate::error::AppError;
use crate::models::{is_blank_record, Dataset, DatasetKind, Record, RunSummary};
use crate::services::excel::{load_sheet_rows, normalize};
use crate::services::stats;

/// The three files the batch run produces and mirrors.
pub const OUTPUT_FILES: [&str; 3] = ["employees.json", "activities.json", "stats.json"];

/// Zip header-derived field names with data rows into Records. Cells beyond
/// the header width are ignored, short rows pad with empty strings, and rows
/// whose values are all empty are dropped. Returns the dataset plus the
/// number of SEXE cells that hit the default-to-male fallback.
pub fn build_dataset(rows: &[Vec<Data>]) -> (Dataset, usize) {
    let Some(header_row) = rows.first() else {
        return (Vec::new(), 0);
    };

    let headers: Vec<String> = header_row.iter().map(normalize::field_name).collect();

    let mut fallbacks = 0;
    let mut dataset = Vec::new();

    for row in &rows[1..] {
        let mut record = Record::new();
        for (idx, field) in headers.iter().enumerate() {
            let (value, fallback) = match row.get(idx) {
                Some(cell) => normalize::normalize_cell(field, cell),
                None => (Value::String(String::new()), false),
            };
            if fallback {
                fallbacks += 1;
            }
            // Colliding field names: the later column overwrites the earlier.
            record.insert(field.clone(), value);
        }
        if !is_blank_record(&record) {
            dataset.push(record);
        }
    }

    (dataset, fallbacks)
}

/// One-shot Excel → JSON batch job. Steps run strictly in sequence; each
/// conversion failure is logged and downgraded to an empty dataset so the
/// run can still finish, except for the fatal preconditions in `run`.
pub struct ExcelConverter {
    config: ConverterConfig,
}

impl ExcelConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    fn check_source_files(&self) -> bool {
        let sources = [
            (&self.config.employees_source, "employees"),
            (&self.config.activities_source, "activities"),
        ];

        let mut all_present = true;
        for (path, label) in sources {
            if path.is_file() {
                let size_kb = fs::metadata(path).map(|m| m.len() / 1024).unwrap_or(0);
                tracing::info!("{} source found: {} ({} KB)", label, path.display(), size_kb);
            } else {
                tracing::error!("{} source missing: {}", label, path.display());
                all_present = false;
            }
        }
        all_present
    }

    /// Convert one workbook into a Dataset. Never propagates: a failure for
    /// one dataset must not abort the overall run.
    pub fn convert_file(&self, path: &Path, kind: DatasetKind) -> Dataset {
        tracing::info!("Converting {} from {}", kind.label(), path.display());
        match self.try_convert(path, kind) {
            Ok(dataset) => {
                tracing::info!("{} valid {} records extracted", dataset.len(), kind.label());
                dataset
            }
            Err(e) => {
                tracing::error!("Conversion failed for {}: {}", kind.label(), e);
                Vec::new()
            }
        }
    }

    fn try_convert(&self, path: &Path, kind: DatasetKind) -> Result<Dataset, AppError> {
        let rows = load_sheet_rows(path)?;
        tracing::info!("{} rows read from {}", rows.len(), path.display());

        if rows.len() < 2 {
            tracing::warn!("{} sheet is empty or header-only", kind.label());
            return Ok(Vec::new());
        }

        let (dataset, fallbacks) = build_dataset(&rows);
        if fallbacks > 0 {
            // Compatibility default inherited from the legacy feed; usually a
            // sign of data-entry errors in the source sheet.
            tracing::warn!(
                "{} SEXE value(s) in {} did not match a known code and defaulted to 1 (male)",
                fallbacks,
                kind.label()
            );
        }
        Ok(dataset)
    }

    /// Serialize `value` as 2-space-indented JSON under the output directory.
    /// Returns `None` on failure; callers must not proceed to dependent steps.
    pub fn save_json<T: Serialize>(&self, value: &T, filename: &str) -> Option<PathBuf> {
        let output_path = self.config.json_output_dir.join(filename);
        match try_save(value, &output_path) {
            Ok(()) => {
                let size_kb = fs::metadata(&output_path).map(|m| m.len() / 1024).unwrap_or(0);
                tracing::info!("Saved {} ({} KB)", output_path.display(), size_kb);
                Some(output_path)
            }
            Err(e) => {
                tracing::error!("Failed to save {}: {}", filename, e);
                None
            }
        }
    }

    /// Best-effort copy of the output files to the mirror directory for the
    /// frontend build; missing sources are skipped.
    pub fn mirror_outputs(&self) -> usize {
        let dest_dir = &self.config.mirror_output_dir;
        if let Err(e) = fs::create_dir_all(dest_dir) {
            tracing::error!("Failed to create mirror directory {}: {}", dest_dir.display(), e);
            return 0;
        }

        let mut copied = 0;
        for file in OUTPUT_FILES {
            let source = self.config.json_output_dir.join(file);
            if !source.is_file() {
                tracing::warn!("{} not found in output directory, skipped", file);
                continue;
            }
            match fs::copy(&source, dest_dir.join(file)) {
                Ok(_) => {
                    copied += 1;
                    tracing::info!("Mirrored {} to {}", file, dest_dir.display());
                }
                Err(e) => tracing::error!("Failed to mirror {}: {}", file, e),
            }
        }

        tracing::info!("{}/{} output files mirrored", copied, OUTPUT_FILES.len());
        copied
    }

    /// Run the whole batch: check sources, convert and persist employees,
    /// convert and persist activities, compute and persist stats, mirror.
    /// `None` means an early abort on a fatal precondition (missing sources,
    /// zero employee records or a failed employee persist).
    pub fn run(&self) -> Option<RunSummary> {
        let start = Instant::now();
        tracing::info!(
            "Starting Excel to JSON conversion (output: {})",
            self.config.json_output_dir.display()
        );

        if !self.check_source_files() {
            tracing::error!("Conversion aborted: Excel source files are missing");
            return None;
        }

        let employees = self.convert_file(&self.config.employees_source, DatasetKind::Employees);
        let employees_path = self.save_json(&employees, DatasetKind::Employees.output_filename());
        let employees_path = match employees_path {
            Some(path) if !employees.is_empty() => path,
            _ => {
                tracing::error!("Conversion aborted: no employee records were converted");
                return None;
            }
        };

        let activities = self.convert_file(&self.config.activities_source, DatasetKind::Activities);
        let activities_path =
            self.save_json(&activities, DatasetKind::Activities.output_filename());
        if activities.is_empty() {
            tracing::warn!("No activity records were converted");
        }

        let stats = stats::compute_stats(&employees, &activities, &self.config);
        let stats_path = self.save_json(&stats, "stats.json");

        let mirrored_files = self.mirror_outputs();

        tracing::info!(
            "Conversion finished in {:.2?}: {} employees, {} activities",
            start.elapsed(),
            employees.len(),
            activities.len()
        );

        Some(RunSummary {
            employees,
            activities,
            stats,
            employees_path,
            activities_path,
            stats_path,
            mirrored_files,
        })
    }
}

fn try_save<T: Serialize>(value: &T, path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::WriteError(format!("create {}: {}", parent.display(), e)))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .map_err(|e| AppError::WriteError(format!("write {}: {}", path.display(), e)))?;
    Ok(())
}
