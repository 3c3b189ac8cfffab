//! Validated run configuration built from the parsed command line.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::ab::{AbRequest, PostBody};
use crate::dataset::TestRow;
use crate::report::ReportParser;
use crate::Cli;

pub const MAX_TRIES: u32 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("you must specify a URL to hit (--url)")]
    MissingUrl,
    #[error("--clients must be at least 1")]
    NoClients,
    #[error("--tries must be between 1 and {max}, got {0}", max = MAX_TRIES)]
    Tries(u32),
    #[error("--delay must be a non-negative number of seconds, got {0}")]
    Delay(f64),
    #[error("--delay requires --until")]
    DelayWithoutUntil,
    #[error(
        "cannot parse --until value {0:?}; expected RFC 3339, RFC 2822 or YYYY-MM-DD[ HH:MM[:SS]]"
    )]
    Until(String),
    #[error("invalid --expect/--valid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub clients: u32,
    pub tries: u32,
    pub delay: Duration,
    pub until: Option<DateTime<Utc>>,
    pub url: String,
    pub post: Option<String>,
    pub post_type: String,
    pub headers: Vec<String>,
    pub tests: Option<PathBuf>,
    pub skip: usize,
    pub output: Option<PathBuf>,
    pub ab_program: PathBuf,
    pub parser: ReportParser,
}

impl RunOptions {
    pub fn from_cli(cli: &Cli) -> Result<Self, OptionsError> {
        let url = cli
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(OptionsError::MissingUrl)?
            .to_string();

        if cli.clients == 0 {
            return Err(OptionsError::NoClients);
        }
        if cli.tries == 0 || cli.tries > MAX_TRIES {
            return Err(OptionsError::Tries(cli.tries));
        }
        if !cli.delay.is_finite() || cli.delay < 0.0 {
            return Err(OptionsError::Delay(cli.delay));
        }

        let until = cli.until.as_deref().map(parse_deadline).transpose()?;
        if cli.delay > 0.0 && until.is_none() {
            return Err(OptionsError::DelayWithoutUntil);
        }

        let delay =
            Duration::try_from_secs_f64(cli.delay).map_err(|_| OptionsError::Delay(cli.delay))?;
        let parser = ReportParser::new(cli.expect.as_deref(), cli.valid.as_deref())?;

        Ok(Self {
            clients: cli.clients,
            tries: cli.tries,
            delay,
            until,
            url,
            post: cli.post.clone(),
            post_type: cli.post_type.clone(),
            headers: cli.headers.as_deref().map(split_headers).unwrap_or_default(),
            tests: cli.tests.clone(),
            skip: cli.skip,
            output: cli.output.clone(),
            ab_program: cli.ab.clone(),
            parser,
        })
    }

    /// The invocation for one run, with `row` substituted into the URL and POST templates.
    pub fn request_for(&self, row: &TestRow) -> AbRequest {
        AbRequest {
            clients: self.clients,
            tries: self.tries,
            url: row.substitute(&self.url),
            post: self.post.as_deref().map(|body| PostBody {
                body: row.substitute(body),
                content_type: self.post_type.clone(),
            }),
            headers: self.headers.clone(),
        }
    }
}

/// Headers arrive as one argument separated by the two characters `\n`.
pub fn split_headers(raw: &str) -> Vec<String> {
    raw.split(r"\n")
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_deadline(raw: &str) -> Result<DateTime<Utc>, OptionsError> {
    let value = raw.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Ok(at.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| OptionsError::Until(raw.to_string()))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| OptionsError::Until(raw.to_string()))
}
