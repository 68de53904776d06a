//! Command Runner — abstract subprocess invocation
//!
//! Recovery actions and custom checks both shell out. The runner is a trait
//! so tests can script outcomes instead of spawning processes. Failures of
//! any kind (spawn error, non-zero exit, timeout) fold into an unsuccessful
//! outcome; nothing here ever propagates a crash into the check cycle.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

/// Result of running one external command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub elapsed: Duration,
    /// Combined stdout/stderr tail, or an error description.
    pub output: String,
}

impl CommandOutcome {
    fn failure(elapsed: Duration, output: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed,
            output: output.into(),
        }
    }
}

/// Trait for subprocess execution, injectable for tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through the shell, bounded by `timeout`.
    async fn run(&self, command: &str, timeout: Duration) -> CommandOutcome;
}

/// Production runner: `sh -c <command>` via tokio, output captured.
pub struct ShellRunner;

/// Longest output tail kept in a `CommandOutcome` (bytes).
const MAX_CAPTURED_OUTPUT: usize = 2048;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, timeout: Duration) -> CommandOutcome {
        let started = Instant::now();

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(std::process::Stdio::null())
            .output();

        match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                if !output.stderr.is_empty() {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&String::from_utf8_lossy(&output.stderr));
                }
                if text.len() > MAX_CAPTURED_OUTPUT {
                    let cut = text
                        .char_indices()
                        .take_while(|&(i, _)| i < MAX_CAPTURED_OUTPUT)
                        .last()
                        .map_or(0, |(i, c)| i + c.len_utf8());
                    text.truncate(cut);
                }
                let elapsed = started.elapsed();
                debug!(
                    command,
                    success = output.status.success(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Command finished"
                );
                CommandOutcome {
                    success: output.status.success(),
                    elapsed,
                    output: text.trim_end().to_string(),
                }
            }
            Ok(Err(e)) => {
                CommandOutcome::failure(started.elapsed(), format!("failed to spawn: {e}"))
            }
            Err(_) => CommandOutcome::failure(
                started.elapsed(),
                format!("timed out after {}s", timeout.as_secs()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exit_zero_is_success() {
        let outcome = ShellRunner.run("true", Duration::from_secs(5)).await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let outcome = ShellRunner.run("false", Duration::from_secs(5)).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn output_is_captured() {
        let outcome = ShellRunner.run("echo hello", Duration::from_secs(5)).await;
        assert!(outcome.success);
        assert_eq!(outcome.output, "hello");
    }

    #[tokio::test]
    async fn timeout_folds_into_failure() {
        let outcome = ShellRunner.run("sleep 5", Duration::from_millis(100)).await;
        assert!(!outcome.success);
        assert!(outcome.output.contains("timed out"));
    }
}
