use serde::Serialize;

use crate::models::process::{StateCode, StatusIcon};

pub const KEY_ON_OFF: &str = "onOffState";
pub const KEY_PROCESS_ID: &str = "process_id";
pub const KEY_PROCESS_STATUS: &str = "process_status";
pub const KEY_LAST_START: &str = "last_start";
pub const KEY_ELAPSED_TIME: &str = "elapsed_time";
pub const KEY_ELAPSED_SECS: &str = "elapsed_secs";
pub const KEY_PERCENT_CPU: &str = "percent_cpu";
pub const KEY_PERCENT_MEM: &str = "percent_mem";
pub const KEY_DISPLAY_STATE: &str = "displayState";

/// Value of one published field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(u64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for StateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// One field whose value differs from what the host last saw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub key: &'static str,
    pub value: StateValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<u8>,
}

impl StateChange {
    fn plain(key: &'static str, value: StateValue) -> Self {
        Self {
            key,
            value,
            ui_value: None,
            decimal_places: None,
        }
    }

    fn percent(key: &'static str, value: f64) -> Self {
        Self {
            key,
            value: StateValue::Float(value),
            ui_value: Some(format!("{}%", value)),
            decimal_places: Some(1),
        }
    }

    fn seconds(key: &'static str, value: u64) -> Self {
        Self {
            key,
            value: StateValue::Int(value),
            ui_value: Some(format!("{} sec", value)),
            decimal_places: None,
        }
    }
}

/// Observable state of an application, helper or daemon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessFields {
    #[serde(rename = "onOffState")]
    pub on_off: bool,
    /// Empty when the target is off
    pub process_id: String,
    #[serde(rename = "process_status", serialize_with = "serialize_status")]
    pub status: StateCode,
    pub last_start: String,
    pub elapsed_time: String,
    pub elapsed_secs: u64,
    pub percent_cpu: f64,
    pub percent_mem: f64,
}

fn serialize_status<S: serde::Serializer>(status: &StateCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(status.text())
}

impl ProcessFields {
    /// Fields of a target with no process. `last_start` survives so the host
    /// keeps showing when the process last ran.
    pub fn off(last_start: String) -> Self {
        Self {
            on_off: false,
            process_id: String::new(),
            status: StateCode::Off,
            last_start,
            elapsed_time: String::new(),
            elapsed_secs: 0,
            percent_cpu: 0.0,
            percent_mem: 0.0,
        }
    }

    pub fn changes_from(&self, prev: &Self) -> Vec<StateChange> {
        let mut changes = Vec::new();
        if self.on_off != prev.on_off {
            changes.push(StateChange::plain(KEY_ON_OFF, StateValue::Bool(self.on_off)));
        }
        if self.process_id != prev.process_id {
            changes.push(StateChange::plain(
                KEY_PROCESS_ID,
                StateValue::Text(self.process_id.clone()),
            ));
        }
        if self.status.text() != prev.status.text() {
            changes.push(StateChange::plain(
                KEY_PROCESS_STATUS,
                StateValue::Text(self.status.text().to_string()),
            ));
        }
        if self.last_start != prev.last_start {
            changes.push(StateChange::plain(
                KEY_LAST_START,
                StateValue::Text(self.last_start.clone()),
            ));
        }
        if self.elapsed_time != prev.elapsed_time {
            changes.push(StateChange::plain(
                KEY_ELAPSED_TIME,
                StateValue::Text(self.elapsed_time.clone()),
            ));
        }
        if self.elapsed_secs != prev.elapsed_secs {
            changes.push(StateChange::seconds(KEY_ELAPSED_SECS, self.elapsed_secs));
        }
        if self.percent_cpu != prev.percent_cpu {
            changes.push(StateChange::percent(KEY_PERCENT_CPU, self.percent_cpu));
        }
        if self.percent_mem != prev.percent_mem {
            changes.push(StateChange::percent(KEY_PERCENT_MEM, self.percent_mem));
        }
        changes
    }
}

/// Observable state of a system-load target.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct LoadFields {
    pub percent_cpu: f64,
    pub percent_mem: f64,
    #[serde(rename = "displayState")]
    pub display_state: String,
}

impl LoadFields {
    pub fn new(percent_cpu: f64, percent_mem: f64) -> Self {
        Self {
            percent_cpu,
            percent_mem,
            display_state: format!("{:.1}% | {:.1}%", percent_cpu, percent_mem),
        }
    }

    pub fn changes_from(&self, prev: &Self) -> Vec<StateChange> {
        let mut changes = Vec::new();
        if self.percent_cpu != prev.percent_cpu {
            changes.push(StateChange::percent(KEY_PERCENT_CPU, self.percent_cpu));
        }
        if self.percent_mem != prev.percent_mem {
            changes.push(StateChange::percent(KEY_PERCENT_MEM, self.percent_mem));
        }
        if self.display_state != prev.display_state {
            changes.push(StateChange::plain(
                KEY_DISPLAY_STATE,
                StateValue::Text(self.display_state.clone()),
            ));
        }
        changes
    }
}

/// Published fields of a target, one shape per kind family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObservableFields {
    Process(ProcessFields),
    Load(LoadFields),
}

/// Result of one [`TargetState::update`](crate::services::TargetState::update) call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateReport {
    pub changes: Vec<StateChange>,
    /// Set when the status changed and the host should swap the status icon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_icon: Option<StatusIcon>,
    /// Set when the on/off state flipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_off: Option<bool>,
}

impl UpdateReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
