use std::future::Future;
use tokio::process::Command;

/// Result of one external command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Zero exit status
    pub success: bool,
    /// stdout followed by stderr, trailing whitespace removed
    pub output: String,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { success: true, output: output.into() }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self { success: false, output: output.into() }
    }
}

/// Runs command lines on behalf of the engine: the process-table query and
/// the start/stop commands of targets.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command_line: &str) -> impl Future<Output = CommandOutput> + Send;
}

/// Runs command lines through `sh -c`.
#[derive(Debug, Default, Clone)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    async fn run(&self, command_line: &str) -> CommandOutput {
        log::debug!("Running: {}", command_line);
        match Command::new("sh").arg("-c").arg(command_line).output().await {
            Ok(out) => {
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                CommandOutput {
                    success: out.status.success(),
                    output: text.trim_end().to_string(),
                }
            }
            Err(e) => CommandOutput::failed(format!("failed to spawn sh: {}", e)),
        }
    }
}
