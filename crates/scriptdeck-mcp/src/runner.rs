//! Script Runner
//!
//! Runs one manifest script through the package manager and captures its
//! stdout and stderr into a single buffer in the order bytes arrive.
//!
//! The call never fails: spawn errors and wait errors are written into the
//! output text. Callers cannot tell a failed launch from a script that printed
//! an error and exited non-zero without reading the text. This is a known
//! limitation of script tools.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::ToolsCallResponse;

pub const DEFAULT_PACKAGE_MANAGER: &str = "npm";

const READ_CHUNK: usize = 8 * 1024;

/// How long to keep collecting output after the script exits. Background
/// processes that inherited the pipes can hold them open indefinitely.
const OUTPUT_GRACE: Duration = Duration::from_millis(100);

/// Captured output and exit code of one script run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub output: Vec<u8>,
    /// `None` when the process never started or was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ProcessOutcome {
    /// Output as text, or a placeholder naming the exit code when empty.
    pub fn into_text(self) -> String {
        if self.output.is_empty() {
            let code = self
                .exit_code
                .map_or_else(|| "unknown".to_string(), |c| c.to_string());
            return format!("(script exited with code {}, no output)", code);
        }

        match String::from_utf8(self.output) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

/// Launches `<program> [leading args] run <script> [-- args...]`.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    program: String,
    leading_args: Vec<String>,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PACKAGE_MANAGER)
    }
}

impl ScriptRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Build a runner from a whitespace-separated command line such as
    /// `"pnpm"` or `"corepack yarn"`. Blank input falls back to npm.
    pub fn from_command_line(command_line: &str) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        match parts.next() {
            Some(program) => Self {
                program,
                leading_args: parts.collect(),
            },
            None => Self::default(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments passed to the package manager for `script`.
    pub fn command_args(&self, script: &str, args: &[String]) -> Vec<String> {
        let mut argv = self.leading_args.clone();
        argv.push("run".to_string());
        argv.push(script.to_string());
        if !args.is_empty() {
            argv.push("--".to_string());
            argv.extend(args.iter().cloned());
        }
        argv
    }

    /// Run `script` in `cwd` and shape the result as a single text block.
    pub async fn run(&self, cwd: &Path, script: &str, args: &[String]) -> ToolsCallResponse {
        ToolsCallResponse::text(self.execute(cwd, script, args).await.into_text())
    }

    pub async fn execute(&self, cwd: &Path, script: &str, args: &[String]) -> ProcessOutcome {
        let argv = self.command_args(script, args);
        let program = resolve_program(&self.program);
        info!(script = %script, program = %program, cwd = %cwd.display(), "Running script");

        // stdin is closed: on the stdio transport our own stdin carries protocol traffic.
        let spawned = Command::new(&program)
            .args(&argv)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(script = %script, error = %e, "Failed to start script");
                return ProcessOutcome {
                    output: format!("[scriptdeck] failed to start `{} {}`: {}\n", program, argv.join(" "), e)
                        .into_bytes(),
                    exit_code: None,
                };
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, tx.clone())));
        }
        drop(tx);

        // The call resolves on exit, not on pipe close.
        let mut output = Vec::new();
        let status = loop {
            tokio::select! {
                Some(chunk) = rx.recv() => output.extend_from_slice(&chunk),
                status = child.wait() => break status,
            }
        };

        while let Ok(Some(chunk)) = tokio::time::timeout(OUTPUT_GRACE, rx.recv()).await {
            output.extend_from_slice(&chunk);
        }
        for pump in pumps {
            pump.abort();
        }

        let exit_code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(script = %script, error = %e, "Failed to wait for script");
                output.extend_from_slice(format!("[scriptdeck] failed to wait for script: {}\n", e).as_bytes());
                None
            }
        };

        debug!(script = %script, exit_code = ?exit_code, bytes = output.len(), "Script finished");
        ProcessOutcome { output, exit_code }
    }
}

/// Forward chunks from one pipe until it closes.
async fn pump<R>(mut pipe: R, tx: mpsc::UnboundedSender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(format!("[scriptdeck] failed to read script output: {}\n", e).into_bytes());
                break;
            }
        }
    }
}

/// npm, pnpm and yarn are `.cmd` shims on Windows and are not found without the extension.
#[cfg(windows)]
fn resolve_program(program: &str) -> String {
    match program {
        "npm" | "pnpm" | "yarn" | "npx" => format!("{}.cmd", program),
        other => other.to_string(),
    }
}

#[cfg(not(windows))]
fn resolve_program(program: &str) -> String {
    program.to_string()
}
