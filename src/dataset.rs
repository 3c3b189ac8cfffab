//! CSV test data: rows loaded from `--tests`, handed out round-robin, and
//! substituted into URL/POST templates through `%index%` placeholders.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("cannot read test data from {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One line of test data. The `test` result column is its fields joined with `|`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestRow(Vec<String>);

impl TestRow {
    pub fn new(fields: Vec<String>) -> Self {
        Self(fields)
    }

    pub fn joined(&self) -> String {
        self.0.join("|")
    }

    /// Replace every `%i%` in `template` with field `i`. Placeholders whose
    /// index is out of range are left untouched.
    pub fn substitute(&self, template: &str) -> String {
        placeholder_regex()
            .replace_all(template, |caps: &Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| self.0.get(idx))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"%(\d+)%").expect("placeholder pattern is valid"))
}

/// Read a headerless CSV file. Rows may have differing lengths.
pub fn load_rows(path: &Path) -> Result<Vec<TestRow>, DatasetError> {
    let csv_err = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(TestRow::new(record.iter().map(str::to_string).collect()));
    }

    tracing::info!(count = rows.len(), "loaded {} tests", rows.len());
    Ok(rows)
}

/// Round-robin over the loaded rows, starting `skip` rows in.
#[derive(Debug)]
pub struct TestCycle {
    rows: Vec<TestRow>,
    counter: usize,
}

impl TestCycle {
    pub fn new(rows: Vec<TestRow>, skip: usize) -> Self {
        Self { rows, counter: skip }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn next_row(&mut self) -> TestRow {
        if self.rows.is_empty() {
            return TestRow::default();
        }

        let row = self.rows[self.counter % self.rows.len()].clone();
        self.counter = self.counter.wrapping_add(1);
        row
    }
}
