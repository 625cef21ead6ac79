use crate::models::{TargetConfig, TargetKind};

/// Start and stop command lines of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPair {
    pub start: String,
    pub stop: String,
}

/// Builds the start/stop commands for a target. `pid` is the process id the
/// target currently has, if any.
pub fn command_pair(config: &TargetConfig, pid: Option<u32>) -> CommandPair {
    CommandPair {
        start: start_command(config),
        stop: stop_command(config, pid),
    }
}

fn start_command(config: &TargetConfig) -> String {
    match config.kind {
        TargetKind::Application | TargetKind::Helper => format!(
            "open{}{} {}",
            if config.open_background { " -g" } else { "" },
            if config.restore_state { "" } else { " -F" },
            shell_escape(&config.path)
        ),
        TargetKind::Daemon => format!(
            "launchctl submit -l {} -- {} {}",
            shell_escape(&config.process_name),
            shell_escape(&config.path),
            shell_escape(&config.start_args)
        ),
        TargetKind::SystemLoad => always_fails("start not supported"),
    }
}

fn stop_command(config: &TargetConfig, pid: Option<u32>) -> String {
    let force = match config.kind {
        TargetKind::Helper => true,
        TargetKind::Daemon => false,
        _ => config.force_quit,
    };
    if force {
        return match pid {
            Some(pid) => format!("kill {}", pid),
            None => always_fails("no process id known"),
        };
    }
    match config.kind {
        TargetKind::Application => format!(
            "osascript -e {}",
            shell_escape(&format!(
                "tell application \"{}\" to quit",
                config.process_name.replace('"', "\\\"")
            ))
        ),
        TargetKind::Daemon => format!("launchctl remove {}", shell_escape(&config.process_name)),
        TargetKind::Helper | TargetKind::SystemLoad => always_fails("stop not supported"),
    }
}

/// Command that prints `message` and exits non-zero, so a missing command
/// surfaces as a failure with a reason instead of a silent no-op.
fn always_fails(message: &str) -> String {
    format!("echo {}; false", shell_escape(message))
}

/// Escape a string for safe use in a shell command.
///
/// Plain words are returned bare; anything else is wrapped in single quotes
/// with embedded single quotes written as `'\''`.
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '%' | ':' | '='))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}
