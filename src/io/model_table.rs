//! Pre-computed model table ingest.
//!
//! One row per `(parameter set, redshift)`: a `redshift` column, one column per
//! grid parameter, one flux column per active filter and one column per
//! analysed variable. The table is loaded into a [`MemoryModelStore`]; unlike
//! observations, a malformed model row fails the whole read.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::info;

use crate::domain::{Model, ModelVariable, ParameterSet, RunConfig};
use crate::error::AppError;
use crate::io::observations::{build_header_map, require_column};
use crate::models::{MemoryModelStore, ModelStore};

#[derive(Debug, Clone)]
pub struct ModelTable {
    pub store: MemoryModelStore,
    pub rows_read: usize,
}

pub fn read_model_table(path: &Path, config: &RunConfig) -> Result<ModelTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model table '{}': {e}", path.display())))?;
    read_model_table_from(file, config)
}

pub fn read_model_table_from<R: Read>(input: R, config: &RunConfig) -> Result<ModelTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read model table headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let z_col = require_column(&header_map, "redshift")?;
    let param_cols = config
        .parameters
        .iter()
        .map(|axis| Ok((axis.name.as_str(), require_column(&header_map, &axis.name)?)))
        .collect::<Result<Vec<_>, AppError>>()?;
    let flux_cols = config
        .filters
        .iter()
        .map(|name| require_column(&header_map, name))
        .collect::<Result<Vec<_>, _>>()?;
    let var_cols = config
        .analysed_variables
        .iter()
        .map(|name| Ok((name.as_str(), require_column(&header_map, name)?)))
        .collect::<Result<Vec<_>, AppError>>()?;

    let mut store = MemoryModelStore::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;
        let record = result.map_err(|e| AppError::new(2, format!("Model table line {line}: {e}")))?;
        let field = |col: usize, name: &str| parse_field(&record, col, name, line);

        let mut params = ParameterSet::new();
        for &(name, col) in &param_cols {
            params.insert(name, field(col, name)?);
        }
        let fluxes = flux_cols
            .iter()
            .zip(&config.filters)
            .map(|(&col, name)| field(col, name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut variables = BTreeMap::new();
        for &(name, col) in &var_cols {
            let value = field(col, name)?;
            let variable = if config.is_mass_proportional(name) {
                ModelVariable::mass_proportional(value)
            } else {
                ModelVariable::intrinsic(value)
            };
            variables.insert(name.to_string(), variable);
        }

        store.put(Model {
            params,
            redshift: field(z_col, "redshift")?,
            fluxes,
            variables,
        });
    }

    info!(rows = rows_read, models = store.len(), "model table loaded");
    Ok(ModelTable { store, rows_read })
}

fn parse_field(record: &StringRecord, col: usize, name: &str, line: usize) -> Result<f64, AppError> {
    let raw = record.get(col).unwrap_or("");
    let value: f64 = raw.parse().map_err(|_| {
        AppError::new(
            2,
            format!("Model table line {line}: invalid number '{raw}' for '{name}'."),
        )
    })?;
    if !value.is_finite() {
        return Err(AppError::new(
            2,
            format!("Model table line {line}: non-finite value for '{name}'."),
        ));
    }
    Ok(value)
}
