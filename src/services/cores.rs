use clap::ValueEnum;
use serde::Serialize;
use sysinfo::System;

/// How cumulative CPU readings are scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivisorMode {
    /// Report CPU as `ps` does, 100% per busy core
    One,
    /// Divide by the physical core count so 100% means every core is busy
    Cores,
}

impl DivisorMode {
    pub fn divisor(self) -> f64 {
        match self {
            Self::One => 1.0,
            Self::Cores => physical_core_count(),
        }
    }
}

/// Physical core count of the host, 1.0 when it cannot be determined.
pub fn physical_core_count() -> f64 {
    match System::physical_core_count() {
        Some(n) if n > 0 => n as f64,
        _ => {
            log::warn!("Could not determine physical core count, using 1");
            1.0
        }
    }
}
