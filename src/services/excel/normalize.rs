use calamine::Data;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

/// Days between the spreadsheet epoch (1899-12-30) and the Unix epoch.
const EXCEL_UNIX_OFFSET_DAYS: i64 = 25569;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Date formats accepted when a date-typed column carries a plain string.
const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Derive a field name from a header cell. Textual headers are trimmed,
/// internal whitespace runs become a single underscore, anything outside
/// `[A-Za-z0-9_]` is stripped and the result is upper-cased. Non-textual
/// headers are synthesized as `COLONNE_<value>`.
pub fn field_name(cell: &Data) -> String {
    match cell {
        Data::String(s) => s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_uppercase(),
        other => format!("COLONNE_{}", other.to_string().to_uppercase()),
    }
}

fn is_sex_column(field: &str) -> bool {
    field.contains("SEXE")
}

fn is_date_column(field: &str) -> bool {
    field.contains("DATE") || field.contains("NAISS")
}

/// Render a float the way the source JSON did: integral values without a
/// fractional part (CIN, MATRICULE and SEXE codes are stored as floats by
/// the workbook but must serialize as plain integers).
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()))
    }
}

/// Normalize a SEXE cell to 1 (male) or 2 (female). Returns the value plus a
/// flag marking the legacy fallback: any unrecognized non-blank value maps
/// to 1 for compatibility with the historical feed, and callers count how
/// often that happens because it usually masks a data-entry error.
pub fn normalize_sex(cell: &Data) -> (Value, bool) {
    match cell {
        Data::Int(i) => (Value::from(*i), false),
        Data::Float(f) => (number_value(*f), false),
        Data::String(s) => {
            let trimmed = s.trim();
            match trimmed {
                "1" => (Value::from(1), false),
                "2" => (Value::from(2), false),
                _ => match trimmed.to_lowercase().as_str() {
                    "m" | "masculin" | "homme" => (Value::from(1), false),
                    "f" | "feminin" | "femme" => (Value::from(2), false),
                    _ => (Value::from(1), true),
                },
            }
        }
        _ => (Value::from(1), true),
    }
}

/// Decode a spreadsheet serial day count into a date-time. Never fails:
/// non-finite or out-of-range serials clamp to the Unix epoch so row
/// processing stays total.
pub fn excel_serial_to_datetime(serial: f64) -> NaiveDateTime {
    if !serial.is_finite() {
        return NaiveDateTime::UNIX_EPOCH;
    }

    let days = (serial.floor() as i64).saturating_sub(EXCEL_UNIX_OFFSET_DAYS);
    let date = days
        .checked_mul(86_400)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.naive_utc().date())
        .unwrap_or_else(|| NaiveDateTime::UNIX_EPOCH.date());

    // Small bias keeps values like 0.9999999 from losing a second to float
    // truncation, matching the historical converter.
    let fractional_day = serial - serial.floor() + 0.0000001;
    let seconds = ((SECONDS_PER_DAY * fractional_day).floor() as u32).min(86_399);
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or(NaiveTime::MIN);

    date.and_time(time)
}

pub fn format_date(datetime: &NaiveDateTime) -> String {
    datetime.format("%Y-%m-%d").to_string()
}

fn parse_date_string(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    for format in DATE_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime);
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Normalize a cell in a DATE/NAISS column to a `YYYY-MM-DD` string.
/// Unparseable strings keep their trimmed original form.
pub fn normalize_date(cell: &Data) -> Value {
    match cell {
        Data::DateTime(dt) => Value::String(format_date(&excel_serial_to_datetime(dt.as_f64()))),
        Data::Float(f) => Value::String(format_date(&excel_serial_to_datetime(*f))),
        Data::Int(i) => Value::String(format_date(&excel_serial_to_datetime(*i as f64))),
        Data::String(s) | Data::DateTimeIso(s) => match parse_date_string(s) {
            Some(datetime) => Value::String(format_date(&datetime)),
            None => Value::String(s.trim().to_string()),
        },
        other => Value::String(other.to_string().trim().to_string()),
    }
}

/// Columns with no special rule: strings are trimmed, numbers pass through.
fn normalize_plain(cell: &Data) -> Value {
    match cell {
        Data::String(s) => Value::String(s.trim().to_string()),
        Data::Float(f) => number_value(*f),
        Data::Int(i) => Value::from(*i),
        other => Value::String(other.to_string().trim().to_string()),
    }
}

/// Normalize one cell according to its column. Returns the value and whether
/// the SEXE fallback path was taken.
pub fn normalize_cell(field: &str, cell: &Data) -> (Value, bool) {
    let blank = match cell {
        Data::Empty => true,
        Data::String(s) if s.is_empty() => true,
        _ => false,
    };
    if blank {
        return (Value::String(String::new()), false);
    }

    if is_sex_column(field) {
        normalize_sex(cell)
    } else if is_date_column(field) {
        (normalize_date(cell), false)
    } else {
        (normalize_plain(cell), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_name_sanitizes_whitespace_and_symbols() {
        assert_eq!(field_name(&Data::String("  Date de naissance ".into())), "DATE_DE_NAISSANCE");
        assert_eq!(field_name(&Data::String("Nom/Prénom (agent)".into())), "NOMPRNOM_AGENT");
        assert_eq!(field_name(&Data::String("matricule".into())), "MATRICULE");
    }

    #[test]
    fn field_name_never_contains_whitespace_or_lowercase() {
        for raw in ["a b\tc", "  x  y  ", "déjà vu!", "A-B-C"] {
            let name = field_name(&Data::String(raw.into()));
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'),
                "unexpected character in {:?}", name);
        }
    }

    #[test]
    fn non_textual_header_is_synthesized() {
        assert_eq!(field_name(&Data::Float(5.0)), "COLONNE_5");
        assert_eq!(field_name(&Data::Empty), "COLONNE_");
    }

    #[test]
    fn sex_codes_normalize_to_one_or_two() {
        for cell in [
            Data::Float(1.0),
            Data::String("1".into()),
            Data::String("M".into()),
            Data::String("Masculin".into()),
            Data::String("homme".into()),
            Data::String("HOMME".into()),
        ] {
            let (value, fallback) = normalize_sex(&cell);
            assert_eq!(value, Value::from(1), "cell {:?}", cell);
            assert!(!fallback);
        }

        for cell in [
            Data::Float(2.0),
            Data::String("2".into()),
            Data::String("F".into()),
            Data::String("Feminin".into()),
            Data::String("femme".into()),
        ] {
            let (value, fallback) = normalize_sex(&cell);
            assert_eq!(value, Value::from(2), "cell {:?}", cell);
            assert!(!fallback);
        }
    }

    #[test]
    fn unrecognized_sex_value_falls_back_to_male_and_is_counted() {
        let (value, fallback) = normalize_sex(&Data::String("X".into()));
        assert_eq!(value, Value::from(1));
        assert!(fallback);

        let (value, fallback) = normalize_sex(&Data::Bool(true));
        assert_eq!(value, Value::from(1));
        assert!(fallback);
    }

    #[test]
    fn numeric_sex_values_pass_through_unchanged() {
        let (value, fallback) = normalize_sex(&Data::Float(3.0));
        assert_eq!(value, Value::from(3));
        assert!(!fallback);
    }

    #[test]
    fn serial_42370_is_new_years_2016() {
        let decoded = excel_serial_to_datetime(42_370.0);
        assert_eq!(format_date(&decoded), "2016-01-01");
    }

    #[test]
    fn serial_decoding_is_deterministic() {
        for serial in [0.0, 1.5, 25_569.0, 42_370.25, 60_000.999] {
            assert_eq!(
                excel_serial_to_datetime(serial),
                excel_serial_to_datetime(serial),
            );
        }
    }

    #[test]
    fn invalid_serials_never_panic() {
        excel_serial_to_datetime(f64::NAN);
        excel_serial_to_datetime(f64::INFINITY);
        excel_serial_to_datetime(-1.0e18);
        assert_eq!(
            excel_serial_to_datetime(f64::NAN),
            NaiveDateTime::UNIX_EPOCH
        );
    }

    #[test]
    fn serial_fraction_carries_time_of_day() {
        // 0.5 of a day is noon.
        let decoded = excel_serial_to_datetime(25_569.5);
        assert_eq!(decoded.format("%Y-%m-%d %H:%M:%S").to_string(), "1970-01-01 12:00:00");
    }

    #[test]
    fn date_strings_parse_or_pass_through() {
        assert_eq!(
            normalize_date(&Data::String("2016-01-01".into())),
            Value::String("2016-01-01".into())
        );
        assert_eq!(
            normalize_date(&Data::String("15/03/1988".into())),
            Value::String("1988-03-15".into())
        );
        assert_eq!(
            normalize_date(&Data::String("  pas une date  ".into())),
            Value::String("pas une date".into())
        );
    }

    #[test]
    fn blank_cells_are_empty_for_every_column() {
        for field in ["SEXE", "DATE_NAISS", "NOM"] {
            let (value, fallback) = normalize_cell(field, &Data::Empty);
            assert_eq!(value, Value::String(String::new()));
            assert!(!fallback);

            let (value, _) = normalize_cell(field, &Data::String(String::new()));
            assert_eq!(value, Value::String(String::new()));
        }
    }

    #[test]
    fn plain_columns_trim_strings_and_keep_numbers() {
        let (value, _) = normalize_cell("NOM", &Data::String("  Ali  ".into()));
        assert_eq!(value, Value::String("Ali".into()));

        let (value, _) = normalize_cell("MATRICULE", &Data::Float(12045.0));
        assert_eq!(value, Value::from(12045));

        let (value, _) = normalize_cell("TAUX", &Data::Float(0.75));
        assert_eq!(value, Value::from(0.75));
    }

    #[test]
    fn date_column_dispatch_handles_serial_numbers() {
        let (value, _) = normalize_cell("DATE_NAISS", &Data::Float(42_370.0));
        assert_eq!(value, Value::String("2016-01-01".into()));
    }
}
