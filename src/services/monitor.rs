use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::{TargetConfig, UpdateReport};
use crate::services::runner::CommandRunner;
use crate::services::snapshot::ProcessTableSnapshot;
use crate::services::target_state::{ControlError, TargetState};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("target '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Control(#[from] ControlError),
}

/// Every registered target plus the snapshot they are matched against.
///
/// Targets are kept in id order so a cycle always visits them the same way.
pub struct Monitor<R> {
    runner: R,
    snapshot: ProcessTableSnapshot,
    targets: BTreeMap<String, TargetState>,
    cpu_divisor: f64,
}

impl<R: CommandRunner> Monitor<R> {
    pub fn new(runner: R, ps_command: &str, cpu_divisor: f64) -> Self {
        Self {
            runner,
            snapshot: ProcessTableSnapshot::new(ps_command),
            targets: BTreeMap::new(),
            cpu_divisor,
        }
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn cpu_divisor(&self) -> f64 {
        self.cpu_divisor
    }

    pub fn snapshot(&self) -> &ProcessTableSnapshot {
        &self.snapshot
    }

    pub fn target(&self, id: &str) -> Option<&TargetState> {
        self.targets.get(id)
    }

    pub fn targets(&self) -> impl Iterator<Item = &TargetState> {
        self.targets.values()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Registers (or replaces) a target and brings its state up to date.
    pub async fn create_target(&mut self, config: TargetConfig) -> UpdateReport {
        let config = config.normalize();
        let id = config.id.clone();
        log::debug!("Registering {} \"{}\" as '{}'", config.kind, config.name, id);

        if self.targets.insert(id.clone(), TargetState::new(config)).is_some() {
            log::info!("Replaced target '{}'", id);
        }

        self.snapshot.refresh(&self.runner).await;
        match self.targets.get_mut(&id) {
            Some(target) => target.update(&self.snapshot, self.cpu_divisor, true),
            None => UpdateReport::default(),
        }
    }

    pub fn remove_target(&mut self, id: &str) -> Option<TargetState> {
        let removed = self.targets.remove(id);
        if let Some(target) = &removed {
            log::debug!("Removed {} \"{}\"", target.kind(), target.name());
        }
        removed
    }

    /// Updates one target against the current snapshot.
    pub fn update(&mut self, id: &str, force_stats: bool) -> Result<UpdateReport, MonitorError> {
        let target = self
            .targets
            .get_mut(id)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;
        Ok(target.update(&self.snapshot, self.cpu_divisor, force_stats))
    }

    pub fn on_state(&self, id: &str) -> Result<Option<bool>, MonitorError> {
        self.targets
            .get(id)
            .map(TargetState::on_state)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))
    }

    pub async fn set_on_state(&mut self, id: &str, desired: bool) -> Result<UpdateReport, MonitorError> {
        let Self {
            runner,
            snapshot,
            targets,
            cpu_divisor,
        } = self;
        let target = targets
            .get_mut(id)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;
        Ok(target
            .set_on_state(desired, runner, snapshot, *cpu_divisor)
            .await?)
    }

    pub async fn toggle(&mut self, id: &str) -> Result<UpdateReport, MonitorError> {
        let current = self.on_state(id)?;
        self.set_on_state(id, !current.unwrap_or(false)).await
    }

    /// Re-reads the process table right away and fully updates one target.
    pub async fn request_status(&mut self, id: &str) -> Result<UpdateReport, MonitorError> {
        let target = self
            .targets
            .get_mut(id)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;
        log::info!("\"{}\" status update", target.name());
        self.snapshot.mark_stale();
        self.snapshot.refresh(&self.runner).await;
        Ok(target.update(&self.snapshot, self.cpu_divisor, true))
    }

    /// One reconciliation pass: a single process-table fetch shared by every
    /// target.
    pub async fn run_cycle(&mut self, force_stats: bool) -> Vec<(String, UpdateReport)> {
        self.snapshot.mark_stale();
        self.snapshot.refresh(&self.runner).await;

        let mut reports = Vec::new();
        for (id, target) in self.targets.iter_mut() {
            let report = target.update(&self.snapshot, self.cpu_divisor, force_stats);
            if !report.is_empty() {
                reports.push((id.clone(), report));
            }
        }
        reports
    }
}
