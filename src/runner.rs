//! Drives `ab`: one run, or the repeater loop until the `--until` deadline.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::dataset::{self, TestCycle};
use crate::options::RunOptions;
use crate::output::ResultSink;
use crate::report::ResultRow;

pub struct Runner {
    options: RunOptions,
    tests: TestCycle,
    sink: Option<ResultSink>,
}

impl Runner {
    /// Load test data and open the result file, when configured.
    pub fn prepare(options: RunOptions) -> Result<Self> {
        let rows = match &options.tests {
            Some(path) => {
                tracing::info!(
                    target: "thagomizer::tests",
                    "loading test data from: {}",
                    path.display()
                );
                dataset::load_rows(path)?
            }
            None => Vec::new(),
        };

        let sink = match &options.output {
            Some(path) => {
                tracing::info!(
                    target: "thagomizer::output",
                    "saving results to: {}",
                    path.display()
                );
                Some(ResultSink::open(path)?)
            }
            None => None,
        };

        let tests = TestCycle::new(rows, options.skip);
        if options.tests.is_some() && tests.is_empty() {
            tracing::warn!(target: "thagomizer::tests", "test data file has no rows");
        }

        Ok(Self {
            tests,
            options,
            sink,
        })
    }

    pub async fn run_once(&mut self) -> Result<Vec<ResultRow>> {
        tracing::info!("running the test");

        let test = self.tests.next_row();
        let request = self.options.request_for(&test);
        let command = request.to_command(&self.options.ab_program)?;
        let output = command.run().await?;

        let rows = self.options.parser.parse(
            &output.stdout,
            self.options.clients,
            self.options.tries,
            &test,
            Utc::now(),
        );

        if let Some(sink) = self.sink.as_mut() {
            sink.write_rows(&rows)
                .with_context(|| format!("recording results for test {:?}", test.joined()))?;
        }

        Ok(rows)
    }

    /// Run once, or keep running with `delay` between runs until the deadline
    /// passes or the process is interrupted. The first failed run ends the loop.
    pub async fn run(&mut self) -> Result<()> {
        let Some(deadline) = self.options.until else {
            self.run_once().await?;
            self.log_saved();
            return Ok(());
        };

        tracing::info!("repeating the test until: {}", deadline.to_rfc3339());

        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);
        let mut interrupt_armed = true;
        let mut runs: u64 = 0;

        loop {
            tokio::select! {
                result = self.run_once() => {
                    result.with_context(|| format!("run {} failed", runs + 1))?;
                    runs += 1;
                }
                signal = &mut interrupt, if interrupt_armed => {
                    match signal {
                        Ok(()) => {
                            tracing::warn!(runs, "interrupted, stopping");
                            break;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "cannot listen for ctrl-c");
                            interrupt_armed = false;
                            continue;
                        }
                    }
                }
            }

            tracing::info!("sleeping for {} seconds", self.options.delay.as_secs_f64());
            if Utc::now() >= deadline {
                tracing::info!(runs, "deadline reached");
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.delay) => {}
                signal = &mut interrupt, if interrupt_armed => {
                    match signal {
                        Ok(()) => {
                            tracing::warn!(runs, "interrupted, stopping");
                            break;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "cannot listen for ctrl-c");
                            interrupt_armed = false;
                        }
                    }
                }
            }
        }

        self.log_saved();
        Ok(())
    }

    fn log_saved(&self) {
        if let Some(sink) = &self.sink {
            tracing::info!(
                target: "thagomizer::output",
                "results saved to: {}",
                sink.path().display()
            );
        }
    }
}
