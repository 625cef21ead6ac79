use prometheus::{register_gauge_vec_with_registry, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use sysinfo::System;

use crate::models::{ObservableFields, TargetKind};
use crate::services::{SideTask, TargetState};

pub struct MetricsRegistry {
    registry: Registry,
    hostname: String,

    pub target_up: GaugeVec,
    pub target_pid_info: GaugeVec,
    pub target_cpu_percent: GaugeVec,
    pub target_memory_percent: GaugeVec,
    pub target_elapsed_seconds: GaugeVec,
    pub target_last_push_timestamp: GaugeVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();
        let hostname = System::host_name().unwrap_or_else(|| "unknown".to_string());

        // target id, kind, hostname
        let common_labels = &["target", "kind", "hostname"];

        let target_up = register_gauge_vec_with_registry!(
            Opts::new("watched_target_up", "Target process is running (1) or not (0)"),
            common_labels,
            registry
        ).unwrap();

        let target_pid_info = register_gauge_vec_with_registry!(
            Opts::new("watched_target_pid_info", "Process id currently matched for the target"),
            &["target", "pid", "hostname"],
            registry
        ).unwrap();

        let target_cpu_percent = register_gauge_vec_with_registry!(
            Opts::new("watched_target_cpu_percent", "Normalized CPU usage percentage"),
            common_labels,
            registry
        ).unwrap();

        let target_memory_percent = register_gauge_vec_with_registry!(
            Opts::new("watched_target_memory_percent", "Memory usage percentage"),
            common_labels,
            registry
        ).unwrap();

        let target_elapsed_seconds = register_gauge_vec_with_registry!(
            Opts::new("watched_target_elapsed_seconds", "Seconds since the target process started"),
            common_labels,
            registry
        ).unwrap();

        let target_last_push_timestamp = register_gauge_vec_with_registry!(
            Opts::new("watched_target_last_push_timestamp_seconds", "Unix timestamp of the last stats push"),
            common_labels,
            registry
        ).unwrap();

        Self {
            registry,
            hostname,
            target_up,
            target_pid_info,
            target_cpu_percent,
            target_memory_percent,
            target_elapsed_seconds,
            target_last_push_timestamp,
        }
    }

    pub fn render(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Sets every gauge of one target from its published fields.
    pub fn publish_target(&self, id: &str, kind: TargetKind, fields: &ObservableFields, now: u64) {
        let labels = &[id, kind.as_str(), self.hostname.as_str()];

        match fields {
            ObservableFields::Process(f) => {
                self.target_up
                    .with_label_values(labels)
                    .set(if f.on_off { 1.0 } else { 0.0 });
                self.target_cpu_percent.with_label_values(labels).set(f.percent_cpu);
                self.target_memory_percent.with_label_values(labels).set(f.percent_mem);
                self.target_elapsed_seconds
                    .with_label_values(labels)
                    .set(f.elapsed_secs as f64);
            }
            ObservableFields::Load(f) => {
                self.target_cpu_percent.with_label_values(labels).set(f.percent_cpu);
                self.target_memory_percent.with_label_values(labels).set(f.percent_mem);
            }
        }

        self.target_last_push_timestamp
            .with_label_values(labels)
            .set(now as f64);
    }

    pub fn set_pid(&self, id: &str, pid: &str) {
        self.target_pid_info
            .with_label_values(&[id, pid, self.hostname.as_str()])
            .set(1.0);
    }

    pub fn remove_pid(&self, id: &str, pid: &str) {
        let _ = self
            .target_pid_info
            .remove_label_values(&[id, pid, self.hostname.as_str()]);
    }

    pub fn reset_target_metrics(&self, id: &str, kind: TargetKind, pid: Option<u32>) {
        let labels = &[id, kind.as_str(), self.hostname.as_str()];

        let _ = self.target_up.remove_label_values(labels);
        let _ = self.target_cpu_percent.remove_label_values(labels);
        let _ = self.target_memory_percent.remove_label_values(labels);
        let _ = self.target_elapsed_seconds.remove_label_values(labels);
        let _ = self.target_last_push_timestamp.remove_label_values(labels);
        if let Some(pid) = pid {
            self.remove_pid(id, &pid.to_string());
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    pub static ref METRICS: Arc<MetricsRegistry> = Arc::new(MetricsRegistry::new());
}

/// Side task that pushes every target's fields into a metrics registry.
pub struct MetricsPublisher {
    metrics: Arc<MetricsRegistry>,
    /// pid label last published per target id
    pids: HashMap<String, String>,
}

impl MetricsPublisher {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            metrics,
            pids: HashMap::new(),
        }
    }
}

impl SideTask for MetricsPublisher {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn run(&mut self, targets: &[&TargetState]) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut seen = HashMap::new();
        for target in targets {
            let id = target.config().id.as_str();
            self.metrics.publish_target(id, target.kind(), target.fields(), now);

            if let ObservableFields::Process(fields) = target.fields() {
                if !fields.process_id.is_empty() {
                    seen.insert(id.to_string(), fields.process_id.clone());
                }
            }
        }

        // drop pid series that no longer apply
        for (id, pid) in &self.pids {
            if seen.get(id) != Some(pid) {
                self.metrics.remove_pid(id, pid);
            }
        }
        for (id, pid) in &seen {
            self.metrics.set_pid(id, pid);
        }
        self.pids = seen;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetConfig;
    use crate::services::snapshot::ProcessTableSnapshot;

    fn safari() -> TargetState {
        TargetState::new(
            TargetConfig {
                id: "safari".to_string(),
                kind: TargetKind::Application,
                name: "Safari".to_string(),
                process_name: String::new(),
                path: String::new(),
                start_args: String::new(),
                force_quit: false,
                open_background: true,
                restore_state: false,
            }
            .normalize(),
        )
    }

    #[test]
    fn test_publisher_tracks_pid_series() {
        let metrics = Arc::new(MetricsRegistry::new());
        let mut publisher = MetricsPublisher::new(metrics.clone());
        let mut target = safari();

        let mut snapshot = ProcessTableSnapshot::from_text(
            "  412 S     12.0  3.0 Mon Oct  7 09:12:33 2024   1-02:03:04 Safari",
        );
        target.update(&snapshot, 1.0, true);
        publisher.run(&[&target]);

        let text = metrics.render().unwrap();
        assert!(text.contains("watched_target_up{"));
        assert!(text.contains("pid=\"412\""));

        snapshot.set_text("");
        target.update(&snapshot, 1.0, true);
        publisher.run(&[&target]);

        let text = metrics.render().unwrap();
        assert!(!text.contains("pid=\"412\""));
        assert!(publisher.pids.is_empty());
    }

    #[test]
    fn test_reset_removes_series() {
        let metrics = MetricsRegistry::new();
        let target = safari();
        metrics.publish_target("safari", TargetKind::Application, target.fields(), 1);
        metrics.set_pid("safari", "7");
        assert!(metrics.render().unwrap().contains("target=\"safari\""));

        metrics.reset_target_metrics("safari", TargetKind::Application, Some(7));
        assert!(!metrics.render().unwrap().contains("target=\"safari\""));
    }
}
