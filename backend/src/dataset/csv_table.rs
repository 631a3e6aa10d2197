use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::files::{CSV_EXTENSIONS, is_plain_file_name, list_dir_files};

/// Rows considered by the correlation heatmap.
pub const HEATMAP_ROW_LIMIT: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("name required")]
    MissingName,
    #[error("invalid file name: {0}")]
    InvalidName(String),
    #[error("file not found")]
    NotFound(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row} has {found} fields, expected {expected}")]
    Malformed {
        row: usize,
        found: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CsvTable {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

/// A parsed CSV: header plus cells, `None` for empty cells.
struct RawTable {
    columns: Vec<String>,
    cells: Vec<Vec<Option<String>>>,
}

impl RawTable {
    fn column(&self, index: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.cells.iter().map(move |row| row[index].as_deref())
    }

    /// Integer columns with gaps are widened to floats.
    fn column_kind(&self, index: usize) -> ColumnKind {
        let mut has_gap = false;
        let mut all_int = true;
        for cell in self.column(index) {
            match cell {
                None => has_gap = true,
                Some(value) => {
                    if value.parse::<i64>().is_err() {
                        all_int = false;
                        if value.parse::<f64>().is_err() {
                            return ColumnKind::Text;
                        }
                    }
                }
            }
        }
        if all_int && !has_gap {
            ColumnKind::Integer
        } else {
            ColumnKind::Float
        }
    }

    fn numeric_column(&self, index: usize) -> Vec<Option<f64>> {
        self.column(index)
            .map(|cell| cell.and_then(|v| v.parse::<f64>().ok()).filter(|v| !v.is_nan()))
            .collect()
    }
}

pub fn list_csv_files(data_dir: &Path) -> Vec<String> {
    list_dir_files(data_dir, CSV_EXTENSIONS)
}

pub fn resolve_csv(data_dir: &Path, name: Option<&str>) -> Result<PathBuf, DatasetError> {
    let name = name.map(str::trim).filter(|n| !n.is_empty()).ok_or(DatasetError::MissingName)?;
    if !is_plain_file_name(name) {
        return Err(DatasetError::InvalidName(name.to_string()));
    }
    let path = data_dir.join(name);
    if !path.is_file() {
        return Err(DatasetError::NotFound(name.to_string()));
    }
    Ok(path)
}

fn read_raw(path: &Path, limit: Option<usize>) -> Result<RawTable, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut cells = Vec::new();
    for (index, record) in reader.records().enumerate() {
        if limit.is_some_and(|max| index >= max) {
            break;
        }
        let record = record?;
        if record.len() > columns.len() {
            return Err(DatasetError::Malformed {
                row: index + 1,
                found: record.len(),
                expected: columns.len(),
            });
        }
        let row = (0..columns.len())
            .map(|i| {
                record
                    .get(i)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_owned)
            })
            .collect();
        cells.push(row);
    }

    Ok(RawTable { columns, cells })
}

/// Reads up to `limit` rows as JSON records. Numeric columns become
/// numbers and empty cells become `""`.
pub fn read_table(path: &Path, limit: Option<usize>) -> Result<CsvTable, DatasetError> {
    let raw = read_raw(path, limit)?;
    let kinds: Vec<ColumnKind> = (0..raw.columns.len()).map(|i| raw.column_kind(i)).collect();

    let rows = raw
        .cells
        .iter()
        .map(|row| {
            raw.columns
                .iter()
                .zip(row.iter().zip(kinds.iter()))
                .map(|(column, (cell, kind))| (column.clone(), cell_value(cell.as_deref(), *kind)))
                .collect::<Map<String, Value>>()
        })
        .collect();

    Ok(CsvTable {
        columns: raw.columns,
        rows,
    })
}

fn cell_value(cell: Option<&str>, kind: ColumnKind) -> Value {
    let Some(raw) = cell else {
        return Value::String(String::new());
    };
    match kind {
        ColumnKind::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        ColumnKind::Float => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Value::from(v),
            _ => Value::String(String::new()),
        },
        ColumnKind::Text => Value::String(raw.to_string()),
    }
}

/// Pairwise Pearson correlation of the numeric columns over the first
/// `limit` rows. Undefined coefficients are reported as 0.
pub fn correlation(path: &Path, limit: usize) -> Result<CorrelationMatrix, DatasetError> {
    let raw = read_raw(path, Some(limit))?;
    let numeric: Vec<usize> = (0..raw.columns.len())
        .filter(|i| raw.column_kind(*i).is_numeric())
        .collect();

    let series: Vec<Vec<Option<f64>>> = numeric.iter().map(|i| raw.numeric_column(*i)).collect();
    let matrix = series
        .iter()
        .map(|a| series.iter().map(|b| pearson(a, b).unwrap_or(0.0)).collect())
        .collect();

    Ok(CorrelationMatrix {
        columns: numeric.iter().map(|i| raw.columns[*i].clone()).collect(),
        matrix,
    })
}

/// Pearson coefficient over rows where both values are present.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let r = cov / (var_x * var_y).sqrt();
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}
