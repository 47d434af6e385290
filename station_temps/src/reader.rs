//! Semicolon-delimited two-column temperature logs (`timestamp;temperature`)
//! with comma decimals, as exported by the station data loggers.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{TempError, UploadedFile};

/// Cell contents treated as a missing value rather than as data.
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const ISO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %I:%M:%S%.f %p",
    "%Y-%m-%d %I:%M %p",
    "%Y/%m/%d %I:%M:%S%.f %p",
    "%Y/%m/%d %I:%M %p",
];

const ISO_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Time-of-day suffixes after a numeric date, 24-hour forms first.
const NUMERIC_TIME_FORMATS: &[&str] = &[
    " %H:%M:%S%.f",
    " %H:%M",
    " %I:%M:%S%.f %p",
    " %I:%M %p",
];

/// Field order for numeric dates such as `01/02/2025`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    #[default]
    MonthFirst,
    DayFirst,
}

impl DateOrder {
    fn other(self) -> Self {
        match self {
            DateOrder::MonthFirst => DateOrder::DayFirst,
            DateOrder::DayFirst => DateOrder::MonthFirst,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    pub date_order: DateOrder,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TemperatureRecord {
    pub timestamp: Option<NaiveDateTime>,
    pub temperature: f64,
}

/// Parse one uploaded log into records, in file order.
///
/// The first row is a header and must have exactly two columns. Timestamps
/// that cannot be parsed become `None`; a temperature that cannot be parsed
/// fails the whole file.
pub fn read_temperature_csv(
    file: &UploadedFile,
    options: &ReaderOptions,
) -> Result<Vec<TemperatureRecord>, TempError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(file.bytes.as_slice());

    let columns = reader.byte_headers()?.len();
    if columns != 2 {
        return Err(TempError::MalformedInput(format!(
            "expected 2 columns, found {columns}"
        )));
    }

    let mut records = Vec::new();
    for (idx, result) in reader.byte_records().enumerate() {
        let row = idx + 1;
        let record = result?;
        if record.len() > 2 {
            return Err(TempError::MalformedInput(format!(
                "row {row}: expected 2 fields, found {}",
                record.len()
            )));
        }
        let timestamp = record
            .get(0)
            .map(String::from_utf8_lossy)
            .and_then(|raw| parse_timestamp(&raw, options.date_order));
        let raw_temp = record
            .get(1)
            .map(String::from_utf8_lossy)
            .unwrap_or(Cow::Borrowed(""));
        let temperature = parse_temperature(&raw_temp, row)?;
        records.push(TemperatureRecord {
            timestamp,
            temperature,
        });
    }

    debug!(
        "read {} rows from '{}' ({} without timestamp)",
        records.len(),
        file.name,
        records.iter().filter(|r| r.timestamp.is_none()).count()
    );
    Ok(records)
}

fn is_missing(value: &str) -> bool {
    MISSING_TOKENS.contains(&value)
}

/// Comma-decimal temperature; missing cells read as NaN.
pub fn parse_temperature(raw: &str, row: usize) -> Result<f64, TempError> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return Ok(f64::NAN);
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| TempError::InvalidTemperature {
            row,
            value: raw.to_string(),
        })
}

/// Permissive timestamp parsing; anything unrecognised is `None`.
pub fn parse_timestamp(raw: &str, order: DateOrder) -> Option<NaiveDateTime> {
    let text = raw.trim();
    if is_missing(text) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if !leads_with_year(text) {
        return parse_numeric_date(text, order).or_else(|| parse_numeric_date(text, order.other()));
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in ISO_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in ISO_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// `YYYY-` or `YYYY/`; short leading numbers would otherwise parse as tiny years.
fn leads_with_year(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() > 4 && bytes[..4].iter().all(u8::is_ascii_digit) && matches!(bytes[4], b'-' | b'/')
}

fn parse_numeric_date(text: &str, order: DateOrder) -> Option<NaiveDateTime> {
    for sep in ['/', '-', '.'] {
        // Two-digit years first: `%Y` would also accept "25" as year 25.
        for year in ["%y", "%Y"] {
            let date_fmt = match order {
                DateOrder::MonthFirst => format!("%m{sep}%d{sep}{year}"),
                DateOrder::DayFirst => format!("%d{sep}%m{sep}{year}"),
            };
            for time_fmt in NUMERIC_TIME_FORMATS {
                let fmt = format!("{date_fmt}{time_fmt}");
                if let Ok(dt) = NaiveDateTime::parse_from_str(text, &fmt) {
                    return Some(dt);
                }
            }
            if let Ok(date) = NaiveDate::parse_from_str(text, &date_fmt) {
                return date.and_hms_opt(0, 0, 0);
            }
        }
    }
    None
}
