use regex::Regex;

use crate::models::{ProcessRow, TargetKind};
use crate::services::row_parser::parse_row;
use crate::services::snapshot::ProcessTableSnapshot;

/// How a target is recognised in the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRule {
    ExactPid(u32),
    /// Application by name, ignoring the `-psn_…` session suffix the OS may append
    NamePattern(String),
    /// Helper by name with any number of trailing dash flags
    HelperPattern(String),
    /// Daemon by name followed by its exact startup arguments
    DaemonPattern { name: String, args: String },
}

impl IdentityRule {
    /// Rule for a target given its kind and cached pid. `None` for kinds that
    /// are not backed by a process.
    pub fn for_target(kind: TargetKind, pid: Option<u32>, name: &str, args: &str) -> Option<Self> {
        if let Some(pid) = pid {
            return kind.is_process_backed().then_some(Self::ExactPid(pid));
        }
        match kind {
            TargetKind::Application => Some(Self::NamePattern(name.to_string())),
            TargetKind::Helper => Some(Self::HelperPattern(name.to_string())),
            TargetKind::Daemon => Some(Self::DaemonPattern {
                name: name.to_string(),
                args: args.to_string(),
            }),
            TargetKind::SystemLoad => None,
        }
    }

    fn expression(&self) -> String {
        match self {
            Self::ExactPid(pid) => format!(r"^ *{} ", pid),
            Self::NamePattern(name) => {
                format!(r"^.*[0-9] {}( -psn_[0-9_]*)?$", regex::escape(name))
            }
            Self::HelperPattern(name) => format!(r"^.*[0-9] {} ?( -.+)*$", regex::escape(name)),
            Self::DaemonPattern { name, args } => format!(
                r"^.*[0-9] {} ?{}$",
                regex::escape(name),
                regex::escape(args)
            ),
        }
    }

    pub fn compile(self) -> Result<CompiledRule, regex::Error> {
        let regex = Regex::new(&self.expression())?;
        Ok(CompiledRule { rule: self, regex })
    }
}

/// An identity rule together with its compiled expression.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: IdentityRule,
    regex: Regex,
}

/// Outcome of looking a target up in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Found(ProcessRow),
    NotFound,
    /// The cached pid is gone; retry with the target's pattern rule
    StalePid,
}

impl CompiledRule {
    /// First row of the snapshot that matches and parses. Several instances
    /// with the same name are not told apart.
    pub fn find(&self, snapshot: &ProcessTableSnapshot) -> MatchOutcome {
        let hit = snapshot
            .lines()
            .filter(|line| self.regex.is_match(line))
            .find_map(parse_row);

        match (hit, &self.rule) {
            (Some(row), _) => MatchOutcome::Found(row),
            (None, IdentityRule::ExactPid(_)) => MatchOutcome::StalePid,
            (None, _) => MatchOutcome::NotFound,
        }
    }
}
