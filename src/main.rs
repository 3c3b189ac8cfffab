//! thagomizer: repeatable Apache Bench runs.
//!
//!   thagomizer -U <url> [-c clients] [-t tries] [-o results.csv]
//!   thagomizer -U <url> --tests data.csv --post 'id=%0%' -u <deadline> -d <secs>

mod ab;
mod dataset;
mod logging;
mod options;
mod output;
mod report;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

// ─── Help text ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = "\
PLACEHOLDERS:
    --url and --post may contain %0%, %1%, ... which are replaced with the
    fields of the current --tests row. Rows are used round-robin, one per run,
    starting after --skip rows.

OUTPUT:
    --output appends one CSV line per response (single client) or one summary
    line per run (--clients > 1):
      timestamp,status,connect,processing,waiting,total,response,completed/failed,test

ENVIRONMENT:
    Every option can be set as THAGOMIZER_<OPTION>, e.g. THAGOMIZER_URL,
    THAGOMIZER_OUTPUT, THAGOMIZER_AB, THAGOMIZER_LOG_LEVEL.

EXAMPLES:
    thagomizer -U http://localhost:8080/health -t 20 -o health.csv
    thagomizer -U http://localhost:8080/login --tests users.csv \\
        --post 'user=%0%&pass=%1%' -e 'token' --valid '\"token\":\"\\w+\"'
    thagomizer -U http://localhost:8080/ -c 10 -t 100 -u '2030-01-01 18:00' -d 60";

// ─── CLI definition ───────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "thagomizer",
    version,
    about = "thagomizer: repeat Apache Bench runs and collect the results as CSV",
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// The number of concurrent clients
    #[arg(short = 'c', long, env = "THAGOMIZER_CLIENTS", default_value_t = 1)]
    pub clients: u32,

    /// The number of tries per client (max 10000)
    #[arg(short = 't', long, env = "THAGOMIZER_TRIES", default_value_t = 10)]
    pub tries: u32,

    /// Repeat the check after this many seconds (requires --until)
    #[arg(short = 'd', long, env = "THAGOMIZER_DELAY", default_value_t = 0.0)]
    pub delay: f64,

    /// Stop repeating once this time is reached
    #[arg(short = 'u', long, env = "THAGOMIZER_UNTIL")]
    pub until: Option<String>,

    /// Body of the POST request, with %index% placeholders
    #[arg(long, env = "THAGOMIZER_POST")]
    pub post: Option<String>,

    /// Content type of the POST body
    #[arg(
        long,
        env = "THAGOMIZER_POST_TYPE",
        default_value = "application/x-www-form-urlencoded"
    )]
    pub post_type: String,

    /// The URL to hit, with %index% placeholders
    #[arg(short = 'U', long, env = "THAGOMIZER_URL")]
    pub url: Option<String>,

    /// Headers to send, separated by a literal \n
    #[arg(long, env = "THAGOMIZER_HEADERS")]
    pub headers: Option<String>,

    /// CSV file with test data
    #[arg(long, env = "THAGOMIZER_TESTS")]
    pub tests: Option<PathBuf>,

    /// Number of test rows to skip
    #[arg(long, env = "THAGOMIZER_SKIP", default_value_t = 0)]
    pub skip: usize,

    /// A regex the response must contain (a literal \n matches any line ending)
    #[arg(short = 'e', long, env = "THAGOMIZER_EXPECT")]
    pub expect: Option<String>,

    /// A regex deciding whether the expected part of the response is valid
    #[arg(long, env = "THAGOMIZER_VALID")]
    pub valid: Option<String>,

    /// CSV file the results are appended to
    #[arg(short = 'o', long, env = "THAGOMIZER_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Path to the ab binary
    #[arg(long, env = "THAGOMIZER_AB", default_value = "ab")]
    pub ab: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "THAGOMIZER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "THAGOMIZER_LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("error: cannot initialise logging: {err:#}");
        return ExitCode::FAILURE;
    }

    let opts = match options::RunOptions::from_cli(&cli) {
        Ok(opts) => opts,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("error: cannot start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = rt.block_on(run(opts)) {
        eprintln!("error: {err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn run(opts: options::RunOptions) -> anyhow::Result<()> {
    let mut runner = runner::Runner::prepare(opts)?;
    runner.run().await
}
