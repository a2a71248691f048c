//! Observation table ingest.
//!
//! Expected columns: `id`, `redshift`, one flux column per active filter and
//! optionally one `<filter>_err` column per filter. A filter without an error
//! column gets zero errors, which the error adjustment later turns into a pure
//! systematic error.
//!
//! Rows that cannot be parsed are skipped and reported; a missing required
//! column fails the whole read (exit code 2).

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{FilterSet, Observation};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationTable {
    pub observations: Vec<Observation>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// Filters read without an error column.
    pub missing_error_columns: Vec<String>,
}

pub fn read_observations(path: &Path, filters: &FilterSet) -> Result<ObservationTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open observations '{}': {e}", path.display())))?;
    read_observations_from(file, filters)
}

pub fn read_observations_from<R: Read>(input: R, filters: &FilterSet) -> Result<ObservationTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read observation headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let id_col = require_column(&header_map, "id")?;
    let z_col = require_column(&header_map, "redshift")?;
    let flux_cols = filters
        .names()
        .map(|name| require_column(&header_map, name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut missing_error_columns = Vec::new();
    let err_cols: Vec<Option<usize>> = filters
        .names()
        .map(|name| {
            let col = header_map.get(&normalize_header_name(&format!("{name}_err"))).copied();
            if col.is_none() {
                missing_error_columns.push(name.to_string());
            }
            col
        })
        .collect();
    for name in &missing_error_columns {
        warn!(filter = %name, "no error column; using zero errors");
    }

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let id = record.get(id_col).unwrap_or("").to_string();
        let parsed = parse_row(&record, z_col, &flux_cols, &err_cols, filters);
        match parsed {
            Ok((redshift, fluxes, errors)) if !id.is_empty() => observations.push(Observation {
                id,
                redshift,
                fluxes,
                errors,
            }),
            Ok(_) => row_errors.push(RowError {
                line,
                id: None,
                message: "missing id".to_string(),
            }),
            Err(message) => row_errors.push(RowError {
                line,
                id: (!id.is_empty()).then_some(id),
                message,
            }),
        }
    }

    info!(
        rows = rows_read,
        used = observations.len(),
        skipped = row_errors.len(),
        "observations loaded"
    );

    Ok(ObservationTable {
        observations,
        row_errors,
        rows_read,
        missing_error_columns,
    })
}

type ParsedRow = (f64, Vec<f64>, Vec<f64>);

fn parse_row(
    record: &StringRecord,
    z_col: usize,
    flux_cols: &[usize],
    err_cols: &[Option<usize>],
    filters: &FilterSet,
) -> Result<ParsedRow, String> {
    let redshift = parse_f64(record, z_col, "redshift")?;
    if redshift < 0.0 {
        return Err(format!("negative redshift {redshift}"));
    }

    let mut fluxes = Vec::with_capacity(flux_cols.len());
    let mut errors = Vec::with_capacity(flux_cols.len());
    for ((name, &flux_col), err_col) in filters.names().zip(flux_cols).zip(err_cols) {
        fluxes.push(parse_f64(record, flux_col, name)?);
        errors.push(match err_col {
            Some(col) => parse_f64(record, *col, &format!("{name}_err"))?,
            None => 0.0,
        });
    }
    Ok((redshift, fluxes, errors))
}

fn parse_f64(record: &StringRecord, col: usize, name: &str) -> Result<f64, String> {
    let raw = record.get(col).unwrap_or("");
    if raw.is_empty() {
        return Err(format!("missing value for '{name}'"));
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("invalid number '{raw}' for '{name}'"))?;
    if !value.is_finite() {
        return Err(format!("non-finite value for '{name}'"));
    }
    Ok(value)
}

pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

/// Headers match exactly after trimming: filter names are case-sensitive
/// (Johnson `U` and SDSS `u` are different columns).
pub(crate) fn normalize_header_name(name: &str) -> String {
    // Strip a UTF-8 BOM on the first header.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

pub(crate) fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column '{name}'.")))
}
