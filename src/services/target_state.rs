use std::time::Duration;
use thiserror::Error;

use crate::models::{
    LoadFields, ObservableFields, ProcessFields, ProcessRow, TargetConfig, TargetKind, UpdateReport,
};
use crate::services::aggregate::{sum_column, CPU_COLUMN, MEM_COLUMN};
use crate::services::commands::command_pair;
use crate::services::derive::{derive_fields, normalize_cpu};
use crate::services::identity::{CompiledRule, IdentityRule, MatchOutcome};
use crate::services::runner::CommandRunner;
use crate::services::snapshot::ProcessTableSnapshot;

/// Pause between a successful start/stop and re-reading the process table.
pub const SETTLE_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{action} not supported for \"{target}\"")]
    Unsupported { target: String, action: &'static str },

    #[error("command failed: {command}: {output}")]
    CommandFailed { command: String, output: String },
}

/// Runtime state of one watched target.
///
/// Process-backed targets cache the pid of the process they matched last and
/// look it up by pid while it lasts; the name pattern is used when no pid is
/// known or the cached one went away. The compiled rule is rebuilt only when
/// `rule_dirty` is set.
#[derive(Debug)]
pub struct TargetState {
    config: TargetConfig,
    pid: Option<u32>,
    rule: Option<CompiledRule>,
    rule_dirty: bool,
    /// Snapshot generation the current `matched` row was taken from
    matched_generation: u64,
    matched: Option<ProcessRow>,
    published: ObservableFields,
}

impl TargetState {
    pub fn new(config: TargetConfig) -> Self {
        let published = match config.kind {
            TargetKind::SystemLoad => ObservableFields::Load(LoadFields::default()),
            _ => ObservableFields::Process(ProcessFields::off(String::new())),
        };
        Self {
            config,
            pid: None,
            rule: None,
            rule_dirty: true,
            matched_generation: 0,
            matched: None,
            published,
        }
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> TargetKind {
        self.config.kind
    }

    pub fn fields(&self) -> &ObservableFields {
        &self.published
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// `None` for kinds without an on/off concept.
    pub fn on_state(&self) -> Option<bool> {
        match &self.published {
            ObservableFields::Process(fields) => Some(fields.on_off),
            ObservableFields::Load(_) => None,
        }
    }

    /// Rule the next lookup will use.
    pub fn identity_rule(&self) -> Option<IdentityRule> {
        IdentityRule::for_target(
            self.config.kind,
            self.pid,
            &self.config.process_name,
            &self.config.start_args,
        )
    }

    fn compiled_rule(&mut self) -> Option<&CompiledRule> {
        if self.rule_dirty || self.rule.is_none() {
            self.rule = match self.identity_rule().map(IdentityRule::compile) {
                Some(Ok(rule)) => Some(rule),
                Some(Err(e)) => {
                    log::error!("\"{}\" invalid identity pattern: {}", self.config.name, e);
                    None
                }
                None => None,
            };
            self.rule_dirty = false;
        }
        self.rule.as_ref()
    }

    fn lookup(&mut self, snapshot: &ProcessTableSnapshot) -> MatchOutcome {
        self.compiled_rule()
            .map(|rule| rule.find(snapshot))
            .unwrap_or(MatchOutcome::NotFound)
    }

    /// Looks the target up again if the snapshot changed since last time.
    fn rematch(&mut self, snapshot: &ProcessTableSnapshot) {
        if snapshot.generation() == self.matched_generation {
            return;
        }
        self.matched_generation = snapshot.generation();

        let mut outcome = self.lookup(snapshot);
        if outcome == MatchOutcome::StalePid {
            log::debug!(
                "\"{}\" pid {:?} is gone, matching by name",
                self.config.name,
                self.pid
            );
            self.pid = None;
            self.rule_dirty = true;
            outcome = self.lookup(snapshot);
        }

        self.matched = match outcome {
            MatchOutcome::Found(row) => {
                if self.pid != Some(row.pid) {
                    self.pid = Some(row.pid);
                    self.rule_dirty = true;
                }
                Some(row)
            }
            MatchOutcome::NotFound | MatchOutcome::StalePid => {
                if self.pid.take().is_some() {
                    self.rule_dirty = true;
                }
                None
            }
        };
    }

    fn next_process_fields(
        &mut self,
        snapshot: &ProcessTableSnapshot,
        cpu_divisor: f64,
        force_stats: bool,
    ) -> ProcessFields {
        self.rematch(snapshot);
        let prev = match &self.published {
            ObservableFields::Process(fields) => fields.clone(),
            ObservableFields::Load(_) => ProcessFields::off(String::new()),
        };

        let on = self.matched.is_some();
        if force_stats || on != prev.on_off {
            derive_fields(self.matched.as_ref(), cpu_divisor, &prev.last_start)
        } else {
            prev
        }
    }

    fn next_load_fields(
        &self,
        snapshot: &ProcessTableSnapshot,
        cpu_divisor: f64,
        force_stats: bool,
    ) -> LoadFields {
        if !force_stats {
            return match &self.published {
                ObservableFields::Load(fields) => fields.clone(),
                ObservableFields::Process(_) => LoadFields::default(),
            };
        }

        let sum = |column| {
            sum_column(snapshot.raw(), column).unwrap_or_else(|e| {
                log::error!("\"{}\" could not sum column {}: {}", self.config.name, column, e);
                0.0
            })
        };
        LoadFields::new(normalize_cpu(sum(CPU_COLUMN), cpu_divisor), sum(MEM_COLUMN))
    }

    /// Recomputes the target against `snapshot` and returns the fields that
    /// changed since the previous call.
    ///
    /// Full stats are derived only when `force_stats` is set or the on/off
    /// state flipped; otherwise the previous values are kept.
    pub fn update(
        &mut self,
        snapshot: &ProcessTableSnapshot,
        cpu_divisor: f64,
        force_stats: bool,
    ) -> UpdateReport {
        let next = if self.config.kind.is_process_backed() {
            ObservableFields::Process(self.next_process_fields(snapshot, cpu_divisor, force_stats))
        } else {
            ObservableFields::Load(self.next_load_fields(snapshot, cpu_divisor, force_stats))
        };
        self.publish(next)
    }

    fn publish(&mut self, next: ObservableFields) -> UpdateReport {
        let mut report = UpdateReport::default();
        match (&next, &self.published) {
            (ObservableFields::Process(next), ObservableFields::Process(prev)) => {
                report.changes = next.changes_from(prev);
                if next.on_off != prev.on_off {
                    report.on_off = Some(next.on_off);
                    log::info!("\"{}\" {}", self.config.name, if next.on_off { "on" } else { "off" });
                }
                if next.status.text() != prev.status.text() {
                    report.status_icon = Some(next.status.icon());
                }
                if next.process_id != prev.process_id {
                    self.rule_dirty = true;
                }
            }
            (ObservableFields::Load(next), ObservableFields::Load(prev)) => {
                report.changes = next.changes_from(prev);
            }
            _ => {}
        }

        if !report.is_empty() && log::log_enabled!(log::Level::Debug) {
            log::debug!("updating states on \"{}\":", self.config.name);
            for change in &report.changes {
                log::debug!("{:>16}: {}", change.key, change.value);
            }
        }

        self.published = next;
        report
    }

    /// Starts or stops the target's process and re-reads its state.
    ///
    /// Does nothing when the target is already in the desired state. A failed
    /// command is reported once and not retried.
    pub async fn set_on_state<R: CommandRunner>(
        &mut self,
        desired: bool,
        runner: &R,
        snapshot: &mut ProcessTableSnapshot,
        cpu_divisor: f64,
    ) -> Result<UpdateReport, ControlError> {
        let action = if desired { "on" } else { "off" };
        let Some(current) = self.on_state() else {
            log::error!("{} command not supported for \"{}\"", action, self.config.name);
            return Err(ControlError::Unsupported {
                target: self.config.name.clone(),
                action,
            });
        };
        if current == desired {
            return Ok(UpdateReport::default());
        }

        let pair = command_pair(&self.config, self.pid);
        let command = if desired { pair.start } else { pair.stop };
        let result = runner.run(&command).await;

        if !result.success {
            log::error!(
                "failed to {} {} \"{}\": {}",
                if desired { "launch" } else { "quit" },
                self.config.kind,
                self.config.name,
                result.output
            );
            return Err(ControlError::CommandFailed {
                command,
                output: result.output,
            });
        }

        log::info!(
            "{} {} \"{}\"",
            if desired { "launching" } else { "quitting" },
            self.config.kind,
            self.config.name
        );
        snapshot.mark_stale();
        self.rule_dirty = true;
        tokio::time::sleep(SETTLE_DELAY).await;
        snapshot.refresh(runner).await;
        Ok(self.update(snapshot, cpu_divisor, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StatusIcon, StateValue};
    use crate::models::observed::{KEY_ON_OFF, KEY_PERCENT_CPU, KEY_PROCESS_ID};
    use crate::services::runner::testing::ScriptedRunner;
    use crate::services::row_parser::parse_row;
    use crate::services::runner::{CommandOutput, ShellRunner};
    use crate::services::snapshot::DEFAULT_PS_COMMAND;

    const HEADER: &str = "  PID STAT  %CPU %MEM STARTED                      ELAPSED COMMAND";
    const SAFARI_412: &str =
        "  412 S     12.0  3.0 Mon Oct  7 09:12:33 2024   1-02:03:04 Safari -psn_0_4121";
    const SAFARI_300: &str =
        "  300 S      1.0  1.0 Mon Oct  7 10:00:00 2024   1-01:15:37 Safari";
    const SAFARI_900: &str =
        "  900 T      0.0  2.0 Tue Oct  8 11:00:00 2024        05:00 Safari";
    const LAUNCHD: &str =
        "    1 Ss     0.0  0.1 Mon Sep 30 08:00:00 2024   18-01:00:00 launchd";

    fn table(rows: &[&str]) -> String {
        std::iter::once(HEADER)
            .chain(rows.iter().copied())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app() -> TargetState {
        TargetState::new(
            TargetConfig {
                id: "safari".to_string(),
                kind: TargetKind::Application,
                name: "Safari".to_string(),
                process_name: String::new(),
                path: "/Applications/Safari".to_string(),
                start_args: String::new(),
                force_quit: false,
                open_background: true,
                restore_state: false,
            }
            .normalize(),
        )
    }

    fn sysload() -> TargetState {
        TargetState::new(TargetConfig {
            id: "load".to_string(),
            kind: TargetKind::SystemLoad,
            name: "System Load".to_string(),
            process_name: String::new(),
            path: String::new(),
            start_args: String::new(),
            force_quit: false,
            open_background: true,
            restore_state: false,
        })
    }

    fn load<'a>(snapshot: &'a mut ProcessTableSnapshot, rows: &[&str]) -> &'a ProcessTableSnapshot {
        snapshot.set_text(&table(rows));
        snapshot
    }

    fn value_of(report: &UpdateReport, key: &str) -> Option<StateValue> {
        report.changes.iter().find(|c| c.key == key).map(|c| c.value.clone())
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_yields_no_changes() {
        let runner = ScriptedRunner::new().with_table(&table(&[LAUNCHD, SAFARI_412]));
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        let mut target = app();

        snapshot.refresh(&runner).await;
        assert!(!target.update(&snapshot, 1.0, false).is_empty());

        snapshot.mark_stale();
        snapshot.refresh(&runner).await;
        assert!(target.update(&snapshot, 1.0, false).is_empty());
    }

    #[test]
    fn test_turning_on_derives_full_stats_without_force() {
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        let mut target = app();
        let report = target.update(load(&mut snapshot, &[SAFARI_412]), 4.0, false);

        assert_eq!(report.on_off, Some(true));
        assert_eq!(report.status_icon, Some(StatusIcon::SensorOn));
        assert_eq!(value_of(&report, KEY_PROCESS_ID), Some(StateValue::Text("412".into())));
        assert_eq!(value_of(&report, KEY_PERCENT_CPU), Some(StateValue::Float(3.0)));
        assert_eq!(target.on_state(), Some(true));
    }

    #[test]
    fn test_known_pid_is_preferred_over_name() {
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        let mut target = app();
        target.update(load(&mut snapshot, &[SAFARI_412]), 1.0, true);
        assert_eq!(target.identity_rule(), Some(IdentityRule::ExactPid(412)));

        // another instance listed first would win a name match
        let report = target.update(load(&mut snapshot, &[SAFARI_300, SAFARI_412]), 1.0, true);
        assert_eq!(value_of(&report, KEY_PROCESS_ID), None);
        assert_eq!(target.pid(), Some(412));
    }

    #[test]
    fn test_restarted_process_is_found_by_name() {
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        let mut target = app();
        target.update(load(&mut snapshot, &[SAFARI_412]), 1.0, true);

        let report = target.update(load(&mut snapshot, &[LAUNCHD, SAFARI_900]), 1.0, true);
        assert_eq!(value_of(&report, KEY_PROCESS_ID), Some(StateValue::Text("900".into())));
        assert_eq!(report.status_icon, Some(StatusIcon::Stopped));
        assert_eq!(report.on_off, None);
        assert_eq!(target.identity_rule(), Some(IdentityRule::ExactPid(900)));
    }

    #[test]
    fn test_exited_process_turns_off() {
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        let mut target = app();
        target.update(load(&mut snapshot, &[SAFARI_412]), 1.0, true);

        let report = target.update(load(&mut snapshot, &[LAUNCHD]), 1.0, false);
        assert_eq!(report.on_off, Some(false));
        assert_eq!(report.status_icon, Some(StatusIcon::SensorOff));
        assert_eq!(value_of(&report, KEY_PROCESS_ID), Some(StateValue::Text(String::new())));
        assert_eq!(target.pid(), None);
        assert_eq!(target.identity_rule(), Some(IdentityRule::NamePattern("Safari".into())));
        match target.fields() {
            ObservableFields::Process(fields) => {
                assert_eq!(fields.last_start, "2024-10-07 09:12:33");
                assert_eq!(fields.percent_cpu, 0.0);
            }
            other => panic!("unexpected fields {:?}", other),
        }
    }

    #[test]
    fn test_stats_are_held_until_forced() {
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        let mut target = app();
        target.update(load(&mut snapshot, &[SAFARI_412]), 1.0, true);

        let busier = SAFARI_412.replace("12.0", "50.0");
        assert!(target.update(load(&mut snapshot, &[busier.as_str()]), 1.0, false).is_empty());

        let report = target.update(load(&mut snapshot, &[busier.as_str()]), 1.0, true);
        assert_eq!(value_of(&report, KEY_PERCENT_CPU), Some(StateValue::Float(50.0)));
    }

    #[test]
    fn test_system_load_sums_table() {
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        let rows = [
            "    1 Ss    10.0  1.0 Mon Sep 30 08:00:00 2024   18-01:00:00 launchd",
            "  412 S      5.5  2.0 Mon Oct  7 09:12:33 2024   1-02:03:04 Safari",
            "  500 S      0.0  0.5 Mon Oct  7 09:13:00 2024   1-02:02:37 Dropbox",
        ];
        let mut target = sysload();
        let report = target.update(load(&mut snapshot, &rows), 2.0, true);

        assert_eq!(value_of(&report, KEY_PERCENT_CPU), Some(StateValue::Float(7.75)));
        assert_eq!(target.on_state(), None);
        match target.fields() {
            ObservableFields::Load(fields) => {
                assert_eq!(fields.percent_cpu, 7.75);
                assert_eq!(fields.percent_mem, 3.5);
            }
            other => panic!("unexpected fields {:?}", other),
        }
    }

    #[test]
    fn test_system_load_degrades_to_zero() {
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        let mut target = sysload();
        target.update(load(&mut snapshot, &[LAUNCHD]), 1.0, true);
        snapshot.set_text("");
        target.update(&snapshot, 1.0, true);
        match target.fields() {
            ObservableFields::Load(fields) => assert_eq!(fields.display_state, "0.0% | 0.0%"),
            other => panic!("unexpected fields {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_turning_on_running_app_is_noop() {
        let runner = ScriptedRunner::new().with_table(&table(&[SAFARI_412]));
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        snapshot.refresh(&runner).await;
        let mut target = app();
        target.update(&snapshot, 1.0, true);

        let report = target.set_on_state(true, &runner, &mut snapshot, 1.0).await.unwrap();
        assert!(report.is_empty());
        assert!(runner.control_calls().is_empty());
        assert!(!snapshot.is_stale());
    }

    #[tokio::test]
    async fn test_quit_application() {
        let runner = ScriptedRunner::new().with_table(&table(&[LAUNCHD, SAFARI_412]));
        runner.reply("osascript", CommandOutput::ok(""), Some(&table(&[LAUNCHD])));
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        snapshot.refresh(&runner).await;
        let mut target = app();
        target.update(&snapshot, 1.0, true);

        let report = target.set_on_state(false, &runner, &mut snapshot, 1.0).await.unwrap();
        assert_eq!(
            runner.control_calls(),
            vec!["osascript -e 'tell application \"Safari\" to quit'".to_string()]
        );
        assert_eq!(report.on_off, Some(false));
        assert_eq!(value_of(&report, KEY_ON_OFF), Some(StateValue::Bool(false)));
        assert_eq!(snapshot.generation(), 2);
    }

    #[tokio::test]
    async fn test_failed_launch_is_reported() {
        let runner = ScriptedRunner::new().with_table(&table(&[LAUNCHD]));
        runner.reply("open", CommandOutput::failed("LSOpenURLsWithRole() failed"), None);
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        snapshot.refresh(&runner).await;
        let mut target = app();
        target.update(&snapshot, 1.0, true);

        let err = target.set_on_state(true, &runner, &mut snapshot, 1.0).await.unwrap_err();
        match err {
            ControlError::CommandFailed { command, output } => {
                assert_eq!(command, "open -g -F /Applications/Safari.app");
                assert_eq!(output, "LSOpenURLsWithRole() failed");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(runner.control_calls().len(), 1);
        assert_eq!(target.on_state(), Some(false));
    }

    #[tokio::test]
    async fn test_force_quit_without_pid_fails() {
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        let mut target = app();
        target.config.force_quit = true;
        target.update(load(&mut snapshot, &[LAUNCHD, SAFARI_412]), 1.0, true);
        assert_eq!(target.on_state(), Some(true));
        target.pid = None;

        let err = target
            .set_on_state(false, &ShellRunner, &mut snapshot, 1.0)
            .await
            .unwrap_err();
        match err {
            ControlError::CommandFailed { command, output } => {
                assert_eq!(command, "echo 'no process id known'; false");
                assert_eq!(output, "no process id known");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(target.on_state(), Some(true));
        assert!(!snapshot.is_stale());
    }

    #[test]
    fn test_fixture_rows_parse() {
        for row in [LAUNCHD, SAFARI_300, SAFARI_412, SAFARI_900] {
            assert!(parse_row(row).is_some(), "unparseable fixture: {row}");
        }
    }

    #[tokio::test]
    async fn test_system_load_cannot_be_switched() {
        let runner = ScriptedRunner::new();
        let mut snapshot = ProcessTableSnapshot::new(DEFAULT_PS_COMMAND);
        let mut target = sysload();
        let err = target.set_on_state(true, &runner, &mut snapshot, 1.0).await.unwrap_err();
        assert!(matches!(err, ControlError::Unsupported { action: "on", .. }));
        assert!(runner.calls().is_empty());
    }
}
