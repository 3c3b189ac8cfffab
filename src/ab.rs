//! Building and running the `ab` command line.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tempfile::NamedTempFile;

#[derive(Debug, thiserror::Error)]
pub enum AbError {
    #[error("failed to write POST body to a temporary file: {0}")]
    BodyFile(#[source] std::io::Error),
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostBody {
    pub body: String,
    pub content_type: String,
}

/// One benchmark invocation, with test data already substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbRequest {
    pub clients: u32,
    pub tries: u32,
    pub url: String,
    pub post: Option<PostBody>,
    pub headers: Vec<String>,
}

impl AbRequest {
    pub fn to_command(&self, program: &Path) -> Result<AbCommand, AbError> {
        let mut args: Vec<String> = Vec::new();

        if self.clients == 1 {
            args.extend([String::from("-v"), String::from("2")]);
        }

        if self.clients > 1 {
            args.extend([String::from("-c"), self.clients.to_string()]);
        }

        if self.tries > 1 || self.clients > 1 {
            let total = u64::from(self.clients) * u64::from(self.tries);
            args.extend([String::from("-n"), total.to_string()]);
        }

        let mut body_file = None;
        if let Some(post) = &self.post {
            let mut file = NamedTempFile::new().map_err(AbError::BodyFile)?;
            file.write_all(post.body.as_bytes()).map_err(AbError::BodyFile)?;
            file.flush().map_err(AbError::BodyFile)?;

            args.push("-p".into());
            args.push(file.path().to_string_lossy().into_owned());
            args.push("-T".into());
            args.push(post.content_type.clone());
            body_file = Some(file);
        }

        for header in &self.headers {
            args.push("-H".into());
            args.push(header.clone());
        }

        args.push(self.url.clone());

        Ok(AbCommand {
            program: program.to_path_buf(),
            args,
            _body_file: body_file,
        })
    }
}

/// A ready-to-run command. The POST body file lives as long as this value.
#[derive(Debug)]
pub struct AbCommand {
    program: PathBuf,
    args: Vec<String>,
    _body_file: Option<NamedTempFile>,
}

#[derive(Debug)]
pub struct AbOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl AbCommand {
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Shell-like rendering for logs. Not meant to be pasted into a shell verbatim.
    pub fn display(&self) -> String {
        let mut parts = vec![quote_arg(&self.program.to_string_lossy())];
        parts.extend(self.args().iter().map(|arg| quote_arg(arg)));
        parts.join(" ")
    }

    pub async fn run(&self) -> Result<AbOutput, AbError> {
        tracing::info!(target: "thagomizer::ab", "command: {}", self.display());

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| AbError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let result = AbOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.status.success() {
            tracing::warn!(
                target: "thagomizer::ab",
                status = ?result.status.code(),
                "ab exited unsuccessfully: {}",
                result.stderr.trim()
            );
        }

        Ok(result)
    }
}

fn quote_arg(arg: &str) -> String {
    if arg.contains(' ') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(clients: u32, tries: u32) -> AbRequest {
        AbRequest {
            clients,
            tries,
            url: "http://example.test/api".into(),
            post: None,
            headers: Vec::new(),
        }
    }

    #[test]
    fn single_client_runs_verbose() {
        let cmd = request(1, 5).to_command(Path::new("ab")).expect("command");
        assert_eq!(cmd.args(), ["-v", "2", "-n", "5", "http://example.test/api"]);
    }

    #[test]
    fn single_try_omits_request_count() {
        let cmd = request(1, 1).to_command(Path::new("ab")).expect("command");
        assert_eq!(cmd.args(), ["-v", "2", "http://example.test/api"]);
    }

    #[test]
    fn concurrent_clients_multiply_requests() {
        let cmd = request(4, 25).to_command(Path::new("ab")).expect("command");
        assert_eq!(cmd.args(), ["-c", "4", "-n", "100", "http://example.test/api"]);
    }

    #[test]
    fn post_body_is_written_to_a_file() {
        let mut req = request(1, 1);
        req.post = Some(PostBody {
            body: "user=alice".into(),
            content_type: "application/x-www-form-urlencoded".into(),
        });
        req.headers = vec!["X-Token: abc".into(), "Accept: */*".into()];

        let cmd = req.to_command(Path::new("/usr/bin/ab")).expect("command");
        let args = cmd.args();
        let p = args.iter().position(|a| a == "-p").expect("-p present");
        let body = std::fs::read_to_string(&args[p + 1]).expect("read body file");
        assert_eq!(body, "user=alice");
        assert_eq!(args[p + 2], "-T");
        assert_eq!(args[p + 3], "application/x-www-form-urlencoded");
        assert_eq!(
            &args[p + 4..],
            ["-H", "X-Token: abc", "-H", "Accept: */*", "http://example.test/api"]
        );
    }

    #[test]
    fn body_file_is_removed_with_the_command() {
        let mut req = request(1, 1);
        req.post = Some(PostBody {
            body: "{}".into(),
            content_type: "application/json".into(),
        });
        let cmd = req.to_command(Path::new("ab")).expect("command");
        let path = PathBuf::from(&cmd.args()[3]);
        assert!(path.exists());
        drop(cmd);
        assert!(!path.exists());
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let mut req = request(1, 1);
        req.headers = vec![r#"X-Note: say "hi""#.into()];
        let cmd = req.to_command(Path::new("ab")).expect("command");
        assert_eq!(
            cmd.display(),
            r#"ab -v 2 -H "X-Note: say \"hi\"" http://example.test/api"#
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cmd = request(1, 1)
            .to_command(&temp.path().join("no-such-ab"))
            .expect("command");
        let err = cmd.run().await.expect_err("spawn must fail");
        assert!(matches!(err, AbError::Spawn { .. }), "unexpected error: {err}");
    }
}
