pub mod aggregate;
pub mod commands;
pub mod cores;
pub mod derive;
pub mod identity;
pub mod monitor;
pub mod reconcile;
pub mod row_parser;
pub mod runner;
pub mod snapshot;
pub mod target_state;

pub use cores::DivisorMode;
pub use monitor::{Monitor, MonitorError};
pub use reconcile::{run_loop, Cadence, SideTask};
pub use runner::{CommandOutput, CommandRunner, ShellRunner};
pub use snapshot::DEFAULT_PS_COMMAND;
pub use target_state::{ControlError, TargetState};
