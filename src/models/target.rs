use serde::{Deserialize, Serialize};
use std::fmt;

/// What a watched target is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Application,
    Helper,
    Daemon,
    /// Aggregate CPU/memory over the whole process table, no on/off concept.
    #[serde(rename = "sysload")]
    SystemLoad,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Helper => "helper",
            Self::Daemon => "daemon",
            Self::SystemLoad => "sysload",
        }
    }

    pub fn is_process_backed(self) -> bool {
        !matches!(self, Self::SystemLoad)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Host-owned configuration of one watched target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Host-assigned stable identifier
    pub id: String,
    pub kind: TargetKind,
    /// Display name, also used in log lines
    pub name: String,
    /// Name the process shows up under in the process table
    #[serde(default)]
    pub process_name: String,
    /// Bundle or executable path used to start the target
    #[serde(default)]
    pub path: String,
    /// Arguments for daemons; also part of the daemon's identity pattern
    #[serde(default)]
    pub start_args: String,
    #[serde(default)]
    pub force_quit: bool,
    #[serde(default = "default_true")]
    pub open_background: bool,
    #[serde(default)]
    pub restore_state: bool,
}

impl TargetConfig {
    /// Fills implied values so the rest of the engine can rely on them.
    pub fn normalize(mut self) -> Self {
        if self.process_name.is_empty() {
            self.process_name = self.name.clone();
        }
        match self.kind {
            TargetKind::Application => {
                if let Some(stripped) = self.process_name.strip_suffix(".app") {
                    self.process_name = stripped.to_string();
                }
                if !self.path.is_empty() && !self.path.ends_with(".app") {
                    self.path.push_str(".app");
                }
            }
            // helpers have no graceful quit
            TargetKind::Helper => self.force_quit = true,
            // killing a daemon would leave its launchd job submitted
            TargetKind::Daemon => self.force_quit = false,
            TargetKind::SystemLoad => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: TargetKind) -> TargetConfig {
        TargetConfig {
            id: "t1".to_string(),
            kind,
            name: "Safari".to_string(),
            process_name: String::new(),
            path: "/Applications/Safari".to_string(),
            start_args: String::new(),
            force_quit: false,
            open_background: true,
            restore_state: false,
        }
    }

    #[test]
    fn test_normalize_application() {
        let c = config(TargetKind::Application).normalize();
        assert_eq!(c.process_name, "Safari");
        assert_eq!(c.path, "/Applications/Safari.app");
        assert!(!c.force_quit);
    }

    #[test]
    fn test_normalize_helper_forces_quit() {
        let c = config(TargetKind::Helper).normalize();
        assert!(c.force_quit);
        assert_eq!(c.path, "/Applications/Safari");
    }

    #[test]
    fn test_application_name_with_bundle_suffix() {
        let mut c = config(TargetKind::Application);
        c.name = "Safari.app".to_string();
        let c = c.normalize();
        assert_eq!(c.process_name, "Safari");
        assert_eq!(c.name, "Safari.app");

        let mut c = config(TargetKind::Application);
        c.process_name = "Mail.app".to_string();
        assert_eq!(c.normalize().process_name, "Mail");
    }

    #[test]
    fn test_normalize_daemon_never_force_quits() {
        let mut c = config(TargetKind::Daemon);
        c.force_quit = true;
        let c = c.normalize();
        assert!(!c.force_quit);
        assert_eq!(c.path, "/Applications/Safari");
    }

    #[test]
    fn test_deserialize_defaults() {
        let c: TargetConfig = serde_json::from_str(
            r#"{"id": "load", "kind": "sysload", "name": "System Load"}"#,
        )
        .unwrap();
        assert_eq!(c.kind, TargetKind::SystemLoad);
        assert!(c.open_background);
        assert!(!c.restore_state);
    }
}
