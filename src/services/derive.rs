use crate::models::{ProcessFields, ProcessRow};

pub const LAST_START_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Turns a matched row (or its absence) into the fields published for a
/// process-backed target. `last_start` is what to keep showing when off.
pub fn derive_fields(row: Option<&ProcessRow>, cpu_divisor: f64, last_start: &str) -> ProcessFields {
    let Some(row) = row else {
        return ProcessFields::off(last_start.to_string());
    };

    ProcessFields {
        on_off: true,
        process_id: row.pid.to_string(),
        status: row.state,
        last_start: row.started.format(LAST_START_FORMAT).to_string(),
        elapsed_time: row.elapsed.as_str().to_string(),
        elapsed_secs: row.elapsed.total_seconds(),
        percent_cpu: normalize_cpu(row.cpu_percent, cpu_divisor),
        percent_mem: row.mem_percent,
    }
}

/// Scales a cumulative multi-core CPU reading. A non-positive divisor is
/// treated as 1.
pub fn normalize_cpu(cpu_percent: f64, divisor: f64) -> f64 {
    if divisor > 0.0 {
        cpu_percent / divisor
    } else {
        cpu_percent
    }
}
