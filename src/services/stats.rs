use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::config::ConverterConfig;
use crate::models::{ActivityStats, ConversionStats, Dataset, EmployeeStats, Record, SourceFiles};

fn sexe_code(record: &Record) -> Option<i64> {
    record.get("SEXE").and_then(Value::as_i64)
}

fn percentage(count: usize, total: usize) -> String {
    if total == 0 {
        "0".to_string()
    } else {
        format!("{:.1}", count as f64 / total as f64 * 100.0)
    }
}

/// Summarize both datasets. Pure function of its inputs apart from the
/// generation timestamp; "other" covers records whose SEXE is neither 1 nor
/// 2, including records with no SEXE field at all.
pub fn compute_stats(
    employees: &Dataset,
    activities: &Dataset,
    config: &ConverterConfig,
) -> ConversionStats {
    let total = employees.len();
    let male = employees.iter().filter(|r| sexe_code(r) == Some(1)).count();
    let female = employees.iter().filter(|r| sexe_code(r) == Some(2)).count();
    let other = total - male - female;

    ConversionStats {
        conversion_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        source_files: SourceFiles {
            employees: config.employees_source.display().to_string(),
            activities: config.activities_source.display().to_string(),
        },
        output_location: config.json_output_dir.display().to_string(),
        employees: EmployeeStats {
            total,
            male,
            female,
            other,
            male_percentage: percentage(male, total),
            female_percentage: percentage(female, total),
        },
        activities: ActivityStats {
            total: activities.len(),
        },
        notes: vec![
            "SEXE: 1 = Homme, 2 = Femme".to_string(),
            "Format de date: YYYY-MM-DD".to_string(),
            "Conversion automatique Excel → JSON".to_string(),
        ],
    }
}
