use std::time::Instant;

use crate::services::runner::CommandRunner;

/// Process listing in the column layout the row parser expects.
pub const DEFAULT_PS_COMMAND: &str = "ps -awxc -opid,state,pcpu,pmem,lstart,etime,args";

/// Raw process-table text shared by every target during one cycle.
///
/// Freshness is tracked with the `stale` flag and a generation counter that
/// advances on every successful fetch, never by comparing clock readings.
#[derive(Debug)]
pub struct ProcessTableSnapshot {
    command: String,
    raw: String,
    generation: u64,
    fetched_at: Option<Instant>,
    stale: bool,
}

impl ProcessTableSnapshot {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            raw: String::new(),
            generation: 0,
            fetched_at: None,
            stale: true,
        }
    }

    /// Snapshot holding fixed text, already fresh.
    #[cfg(test)]
    pub fn from_text(raw: &str) -> Self {
        let mut snapshot = Self::new(DEFAULT_PS_COMMAND);
        snapshot.store(raw.to_string());
        snapshot
    }

    /// Replaces the text as if a new listing had been fetched.
    #[cfg(test)]
    pub fn set_text(&mut self, raw: &str) {
        self.store(raw.to_string());
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Fetches a new listing if the snapshot is stale. On failure the previous
    /// text is kept and the snapshot stays stale.
    pub async fn refresh<R: CommandRunner>(&mut self, runner: &R) {
        if !self.stale {
            return;
        }
        let result = runner.run(&self.command).await;
        if result.success {
            self.store(result.output);
        } else {
            log::error!("Process table query failed: {}", result.output);
        }
    }

    fn store(&mut self, raw: String) {
        self.raw = raw;
        self.generation += 1;
        self.fetched_at = Some(Instant::now());
        self.stale = false;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fetched_at(&self) -> Option<Instant> {
        self.fetched_at
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.raw.lines()
    }
}
