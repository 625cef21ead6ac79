pub mod observed;
pub mod process;
pub mod target;

pub use observed::{LoadFields, ObservableFields, ProcessFields, StateValue, UpdateReport};
pub use process::{ElapsedTime, ProcessRow, StateCode, StatusIcon};
pub use target::{TargetConfig, TargetKind};
