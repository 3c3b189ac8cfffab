//! Append-only CSV result file.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::report::{ResultRow, COLUMNS};

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("cannot open result file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write to result file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub struct ResultSink {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl ResultSink {
    /// Open `path` for appending. A new or empty file gets the header row first.
    pub fn open(path: &Path) -> Result<Self, OutputError> {
        let open_err = |source| OutputError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;
        let needs_header = file.metadata().map_err(open_err)?.len() == 0;

        let mut sink = Self {
            path: path.to_path_buf(),
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file),
        };

        if needs_header {
            tracing::debug!(path = %path.display(), "writing result header");
            if let Err(source) = sink.writer.write_record(COLUMNS) {
                return Err(sink.write_err(source));
            }
            if let Err(source) = sink.writer.flush() {
                return Err(sink.write_err(source.into()));
            }
        }

        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_rows(&mut self, rows: &[ResultRow]) -> Result<(), OutputError> {
        for row in rows {
            self.writer
                .serialize(row)
                .map_err(|source| self.write_err(source))?;
        }
        self.writer
            .flush()
            .map_err(|source| self.write_err(source.into()))
    }

    fn write_err(&self, source: csv::Error) -> OutputError {
        OutputError::Write {
            path: self.path.clone(),
            source,
        }
    }
}
