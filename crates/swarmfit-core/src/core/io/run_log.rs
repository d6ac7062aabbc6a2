use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

const HEADER: [&str; 7] = [
    "iteration",
    "position",
    "parameters",
    "densities",
    "velocity",
    "best_position",
    "cost",
];

#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error for '{path}': {source}", path = path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

/// One evaluated leader particle at one iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLogRecord {
    pub iteration: usize,
    pub position: String,
    pub parameters: String,
    pub densities: String,
    pub velocity: String,
    pub best_position: String,
    pub cost: f64,
}

impl RunLogRecord {
    pub fn new(
        iteration: usize,
        position: &[f64],
        parameters: &[f64],
        densities: &[f64],
        velocity: &[f64],
        best_position: &[f64],
        cost: f64,
    ) -> Self {
        Self {
            iteration,
            position: format_vector(position),
            parameters: format_vector(parameters),
            densities: format_vector(densities),
            velocity: format_vector(velocity),
            best_position: format_vector(best_position),
            cost,
        }
    }
}

/// Renders a vector as `[a b c]`, keeping each record a single CSV field.
pub fn format_vector(values: &[f64]) -> String {
    let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", joined.join(" "))
}

/// Append-only CSV log of every leader evaluation in a run.
pub struct RunLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl RunLog {
    /// Opens `path` for appending, writing the header only if the file is new or empty.
    pub fn open(path: &Path) -> Result<Self, RunLogError> {
        let io_err = |source| RunLogError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        let is_empty = file.metadata().map_err(io_err)?.len() == 0;

        let mut log = Self {
            path: path.to_path_buf(),
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file),
        };
        if is_empty {
            log.writer
                .write_record(HEADER)
                .map_err(|source| log.csv_err(source))?;
            log.flush()?;
        }
        Ok(log)
    }

    pub fn append(&mut self, record: &RunLogRecord) -> Result<(), RunLogError> {
        self.writer
            .serialize(record)
            .map_err(|source| self.csv_err(source))?;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), RunLogError> {
        self.writer.flush().map_err(|source| RunLogError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn csv_err(&self, source: csv::Error) -> RunLogError {
        RunLogError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample_record(iteration: usize, cost: f64) -> RunLogRecord {
        RunLogRecord::new(
            iteration,
            &[0.25, 0.5],
            &[125.0, 14.0],
            &[0.78, 0.74],
            &[0.1, -0.05],
            &[0.2, 0.5],
            cost,
        )
    }

    #[test]
    fn vectors_render_as_bracketed_space_separated_values() {
        assert_eq!(format_vector(&[0.25, 14.0, -0.1]), "[0.25 14 -0.1]");
        assert_eq!(format_vector(&[]), "[]");
    }

    #[test]
    fn new_file_gets_a_header_and_one_row_per_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");

        let mut log = RunLog::open(&path).unwrap();
        log.append(&sample_record(0, 0.42)).unwrap();
        log.append(&sample_record(1, 0.17)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "iteration,position,parameters,densities,velocity,best_position,cost"
        );
        assert_eq!(
            lines[1],
            "0,[0.25 0.5],[125 14],[0.78 0.74],[0.1 -0.05],[0.2 0.5],0.42"
        );
    }

    #[test]
    fn reopening_appends_without_repeating_the_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");

        RunLog::open(&path)
            .unwrap()
            .append(&sample_record(0, 1.0))
            .unwrap();
        RunLog::open(&path)
            .unwrap()
            .append(&sample_record(1, 0.5))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("iteration,").count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn unwritable_location_is_an_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("data.csv");
        assert!(matches!(RunLog::open(&path), Err(RunLogError::Io { .. })));
    }
}
