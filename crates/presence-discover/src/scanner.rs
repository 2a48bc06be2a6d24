//! Scan strategy trait and external tool runner.
//!
//! Each strategy shells out to one tool via `tokio::process::Command`,
//! bounded by a timeout, and parses its line-oriented stdout.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use presence_core::{DiscoveredDevice, ScanTool};
use tokio::process::Command;

use crate::error::ScanFailure;

/// One way of discovering devices on the local network.
#[async_trait]
pub trait ScanStrategy: Send + Sync {
    /// The tool this strategy reports devices under.
    fn tool(&self) -> ScanTool;

    /// Run the scan. An empty `Ok` means the tool ran but saw nothing.
    async fn scan(&self) -> Result<Vec<DiscoveredDevice>, ScanFailure>;
}

/// A fully-specified external command.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: &str, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command and return its stdout.
    ///
    /// The child is killed if the timeout elapses.
    pub async fn run(&self) -> Result<String, ScanFailure> {
        let start = Instant::now();

        tracing::debug!(
            command = %format!("{} {}", self.program, self.args.join(" ")),
            "Running scan tool"
        );

        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ScanFailure::ToolNotFound {
                    program: self.program.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ScanFailure::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanFailure::ToolFailed {
                program: self.program.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.chars().take(200).collect(),
            });
        }

        tracing::debug!(
            program = %self.program,
            duration_ms = start.elapsed().as_millis(),
            "Scan tool finished"
        );

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// True if `s` is six hex pairs joined by `:` or `-`.
pub(crate) fn looks_like_mac(s: &str) -> bool {
    let octets: Vec<&str> = s.split([':', '-']).collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}
