use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Column (0-indexed) of the block-average table holding the liquid density.
pub const DEFAULT_DENSITY_COLUMN: usize = 10;

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: TrajectoryParseErrorKind,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrajectoryParseErrorKind {
    #[error("Record has {found} columns, column {column} was requested")]
    MissingColumn { column: usize, found: usize },
    #[error("Invalid float format in column {column} (value: '{value}')")]
    InvalidFloat { column: usize, value: String },
    #[error("Non-finite value in column {column} (value: '{value}')")]
    NonFinite { column: usize, value: String },
}

/// Returns `true` for lines that carry no snapshot: blanks, comments, and
/// column headers (any line whose first token is not a number).
fn is_header(line: &str) -> bool {
    match line.split_whitespace().next() {
        None => true,
        Some(first) => first.starts_with('#') || first.parse::<f64>().is_err(),
    }
}

/// Reads the value of `column` from every snapshot record, in file order.
pub fn read_observable(reader: impl BufRead, column: usize) -> Result<Vec<f64>, TrajectoryError> {
    let mut samples = Vec::new();
    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        if is_header(&line) {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let raw = fields.get(column).ok_or_else(|| TrajectoryError::Parse {
            line: line_num + 1,
            kind: TrajectoryParseErrorKind::MissingColumn {
                column,
                found: fields.len(),
            },
        })?;
        let value = raw.parse::<f64>().map_err(|_| TrajectoryError::Parse {
            line: line_num + 1,
            kind: TrajectoryParseErrorKind::InvalidFloat {
                column,
                value: raw.to_string(),
            },
        })?;
        if !value.is_finite() {
            return Err(TrajectoryError::Parse {
                line: line_num + 1,
                kind: TrajectoryParseErrorKind::NonFinite {
                    column,
                    value: raw.to_string(),
                },
            });
        }
        samples.push(value);
    }
    Ok(samples)
}

pub fn read_observable_from_path(path: &Path, column: usize) -> Result<Vec<f64>, TrajectoryError> {
    let file = File::open(path)?;
    read_observable(BufReader::new(file), column)
}
