//! Turns `ab` stdout into result rows.
//!
//! Timing comes from the mean column of the "Connection Times (ms)" table.
//! Single-client runs are executed with `-v 2`, so every response header block
//! is printed and becomes one row; concurrent runs produce one summary row.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::dataset::TestRow;

pub const COLUMNS: [&str; 9] = [
    "timestamp",
    "status",
    "connect",
    "processing",
    "waiting",
    "total",
    "response",
    "completed/failed",
    "test",
];

const TIMESTAMP_FORMAT: &str = "%a, %-d %b %Y %H:%M:%S GMT";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Replace each literal `\n` (backslash, n) in a user supplied pattern with a
/// group matching either line ending `ab` may print.
pub fn adjust_newlines(pattern: &str) -> String {
    pattern.replace(r"\n", r"(?:\r\n|\n)")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Valid,
    Invalid,
    Failed,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Valid => "valid",
            Verdict::Invalid => "invalid",
            Verdict::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timing {
    pub connect: Option<String>,
    pub processing: Option<String>,
    pub waiting: Option<String>,
    pub total: Option<String>,
}

impl Timing {
    pub fn parse(output: &str) -> Self {
        let patterns = timing_regexes();
        Self {
            connect: first_capture(&patterns[0], output),
            processing: first_capture(&patterns[1], output),
            waiting: first_capture(&patterns[2], output),
            total: first_capture(&patterns[3], output),
        }
    }
}

fn timing_regexes() -> &'static [Regex; 4] {
    static TIMING: OnceLock<[Regex; 4]> = OnceLock::new();
    TIMING.get_or_init(|| {
        ["Connect", "Processing", "Waiting", "Total"].map(|label| {
            Regex::new(&format!(r"\n{label}:\s+\d+\s+(\d+)\s")).expect("timing pattern is valid")
        })
    })
}

struct SummaryPatterns {
    complete: Regex,
    failed: Regex,
    date: Regex,
    status: Regex,
}

fn summary_patterns() -> &'static SummaryPatterns {
    static PATTERNS: OnceLock<SummaryPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SummaryPatterns {
        complete: Regex::new(r"\nComplete requests:\s+(\d+)").expect("complete pattern is valid"),
        failed: Regex::new(r"\nFailed requests:\s+(\d+)").expect("failed pattern is valid"),
        date: Regex::new(r"\nDate: ([^\r\n]+)").expect("date pattern is valid"),
        status: Regex::new(r"\nHTTP/1\.1 (\d{3}) ").expect("status pattern is valid"),
    })
}

fn first_capture(regex: &Regex, haystack: &str) -> Option<String> {
    regex
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

/// One CSV line in the result file, in `COLUMNS` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub timestamp: String,
    pub status: Option<String>,
    pub connect: Option<String>,
    pub processing: Option<String>,
    pub waiting: Option<String>,
    pub total: Option<String>,
    pub response: Option<Verdict>,
    #[serde(rename = "completed/failed")]
    pub completed_failed: Option<String>,
    pub test: String,
}

impl ResultRow {
    fn with_timing(timestamp: String, timing: &Timing, test: &TestRow) -> Self {
        Self {
            timestamp,
            status: None,
            connect: timing.connect.clone(),
            processing: timing.processing.clone(),
            waiting: timing.waiting.clone(),
            total: timing.total.clone(),
            response: None,
            completed_failed: None,
            test: test.joined(),
        }
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        write!(
            f,
            "{},{},{},{},{},{},{},{},{}",
            self.timestamp,
            opt(&self.status),
            opt(&self.connect),
            opt(&self.processing),
            opt(&self.waiting),
            opt(&self.total),
            self.response.map(|v| v.to_string()).unwrap_or_default(),
            opt(&self.completed_failed),
            self.test
        )
    }
}

#[derive(Debug, Clone)]
pub struct ReportParser {
    /// A full response: status line, headers, blank line, then the expected text.
    response: Regex,
    /// The expected text alone, captured as group 1.
    expected: Regex,
    valid: Option<Regex>,
}

impl ReportParser {
    pub fn new(expect: Option<&str>, valid: Option<&str>) -> Result<Self, regex::Error> {
        let content = adjust_newlines(expect.unwrap_or_default());
        let response = Regex::new(&format!(
            r"(?m)\nHTTP/1\.1 \d{{3}} .+(?s:.)+?(?:\r\n|\n){{2}}{content}"
        ))?;
        let expected = Regex::new(&format!("(?m)({content})"))?;
        let valid = valid
            .map(|pattern| Regex::new(&format!("(?m){}", adjust_newlines(pattern))))
            .transpose()?;

        Ok(Self {
            response,
            expected,
            valid,
        })
    }

    pub fn parse(
        &self,
        output: &str,
        clients: u32,
        tries: u32,
        test: &TestRow,
        now: DateTime<Utc>,
    ) -> Vec<ResultRow> {
        let timing = Timing::parse(output);
        let stamp = format_timestamp(now);

        if clients > 1 {
            let row = self.concurrent_row(output, &timing, test, stamp);
            tracing::info!(target: "thagomizer::result", "result: {row}");
            return vec![row];
        }

        let mut rows = Vec::new();
        for (idx, found) in self.response.find_iter(output).enumerate() {
            let block = found.as_str();
            tracing::trace!(target: "thagomizer::result", index = idx, "match: {}", block.trim());

            let patterns = summary_patterns();
            let mut row = ResultRow::with_timing(
                first_capture(&patterns.date, block).unwrap_or_else(|| stamp.clone()),
                &timing,
                test,
            );
            row.status = first_capture(&patterns.status, block);
            row.response = self.verdict(block);

            tracing::info!(target: "thagomizer::result", "result: {row}");
            rows.push(row);
        }

        let expected = (clients as usize).saturating_mul(tries as usize);
        while rows.len() < expected {
            let mut row = ResultRow::with_timing(stamp.clone(), &timing, test);
            if self.valid.is_some() {
                row.response = Some(Verdict::Failed);
            }
            tracing::error!(target: "thagomizer::result", "failed: {row}");
            rows.push(row);
        }

        rows
    }

    fn concurrent_row(
        &self,
        output: &str,
        timing: &Timing,
        test: &TestRow,
        stamp: String,
    ) -> ResultRow {
        let patterns = summary_patterns();
        let mut row = ResultRow::with_timing(stamp, timing, test);
        row.completed_failed = match (
            first_capture(&patterns.complete, output),
            first_capture(&patterns.failed, output),
        ) {
            (Some(complete), Some(failed)) => Some(format!("{complete}/{failed}")),
            _ => None,
        };
        row
    }

    fn verdict(&self, block: &str) -> Option<Verdict> {
        let valid = self.valid.as_ref()?;
        let found = first_capture(&self.expected, block)?;
        Some(if valid.is_match(&found) {
            Verdict::Valid
        } else {
            Verdict::Invalid
        })
    }
}
