#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub fn thagomizer_bin() -> &'static str {
    env!("CARGO_BIN_EXE_thagomizer")
}

pub const CONNECTION_TIMES: &str = "\
Connection Times (ms)
              min  mean[+/-sd] median   max
Connect:        0    1   0.4      1       2
Processing:     3    7   2.1      6      12
Waiting:        2    5   1.9      5      10
Total:          4    8   2.2      7      13
";

/// What the fake `ab` prints on stdout.
pub enum AbScript {
    /// `-v 2` style output with one header block per `(status, body)`.
    Verbose(Vec<(u16, String)>),
    /// Summary of a concurrent run.
    Concurrent { complete: u32, failed: u32 },
}

impl AbScript {
    fn stdout(&self) -> String {
        let mut out = String::from("This is ApacheBench, Version 2.3 <$Revision: 1903618 $>\n\n");
        match self {
            AbScript::Verbose(responses) => {
                for (idx, (status, body)) in responses.iter().enumerate() {
                    out.push_str("LOG: header received:\n");
                    out.push_str(&format!(
                        "HTTP/1.1 {status} OK\r\nDate: Mon, 4 Mar 2024 10:00:0{idx} GMT\r\n\
                         Content-Type: text/plain\r\n\r\n{body}\n"
                    ));
                    out.push_str(&format!("LOG: Response code = {status}\n"));
                }
                out.push_str("..done\n\n");
            }
            AbScript::Concurrent { complete, failed } => {
                out.push_str(&format!(
                    "Concurrency Level:      4\n\
                     Complete requests:      {complete}\n\
                     Failed requests:        {failed}\n\n"
                ));
            }
        }
        out.push_str(CONNECTION_TIMES);
        out
    }
}

/// A shell script standing in for `ab`. Every invocation appends its
/// arguments to `calls.log` and any POST body to `bodies.log`, then prints the
/// canned output from `stdout.txt`.
pub struct FakeAb {
    pub dir: PathBuf,
    pub program: PathBuf,
}

#[cfg(unix)]
pub fn fake_ab(dir: &Path, script: AbScript) -> FakeAb {
    fake_ab_exiting(dir, script, 0)
}

/// Like [`fake_ab`], but the script exits with `code` after printing its output.
#[cfg(unix)]
pub fn fake_ab_exiting(dir: &Path, script: AbScript, code: i32) -> FakeAb {
    use std::os::unix::fs::PermissionsExt;

    let dir = dir.join("fake-ab");
    std::fs::create_dir_all(&dir).expect("create fake ab dir");
    std::fs::write(dir.join("stdout.txt"), script.stdout()).expect("write canned output");

    let program = dir.join("ab");
    let content = format!(
        "#!/bin/sh\n\
         dir='{dir}'\n\
         printf '%s\\n' \"$*\" >> \"$dir/calls.log\"\n\
         prev=''\n\
         for arg in \"$@\"; do\n\
         \x20 if [ \"$prev\" = '-p' ]; then cat \"$arg\" >> \"$dir/bodies.log\"; printf '\\n' >> \"$dir/bodies.log\"; fi\n\
         \x20 prev=\"$arg\"\n\
         done\n\
         cat \"$dir/stdout.txt\"\n\
         exit {code}\n",
        dir = dir.display()
    );
    std::fs::write(&program, content).expect("write fake ab");
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake ab");

    FakeAb { dir, program }
}

impl FakeAb {
    pub fn program_str(&self) -> &str {
        self.program.to_str().expect("utf-8 path")
    }

    /// One line per invocation, arguments joined by spaces.
    pub fn calls(&self) -> Vec<String> {
        read_lines(&self.dir.join("calls.log"))
    }

    pub fn bodies(&self) -> Vec<String> {
        read_lines(&self.dir.join("bodies.log"))
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Run thagomizer with a clean `THAGOMIZER_*` environment.
pub fn run_thagomizer(args: &[&str]) -> Output {
    run_thagomizer_with_env(args, &[])
}

pub fn run_thagomizer_with_env(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(thagomizer_bin());
    for (key, _) in std::env::vars() {
        if key.starts_with("THAGOMIZER_") {
            cmd.env_remove(key);
        }
    }
    cmd.args(args);
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.output().expect("run thagomizer")
}

/// Parse a result file into records, header included.
pub fn read_results(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .expect("open results");
    reader
        .records()
        .map(|r| r.expect("csv record").iter().map(str::to_string).collect())
        .collect()
}

pub fn assert_ok(output: &Output, context: &str) {
    assert!(
        output.status.success(),
        "{context} failed (status {:?})\nstdout:\n{}\nstderr:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
