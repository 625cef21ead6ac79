use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Primary process state letter as reported by `ps`.
///
/// `Off` is synthetic: it never appears in a row and stands for "no process found".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StateCode {
    Idle,
    Running,
    Sleeping,
    Stopped,
    Waiting,
    Zombie,
    Off,
}

/// Icon hint the host shows next to a target's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIcon {
    Paused,
    SensorOn,
    Stopped,
    SensorTripped,
    SensorOff,
}

impl StateCode {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'I' => Some(Self::Idle),
            'R' => Some(Self::Running),
            'S' => Some(Self::Sleeping),
            'T' => Some(Self::Stopped),
            'U' => Some(Self::Waiting),
            'Z' => Some(Self::Zombie),
            'X' => Some(Self::Off),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Idle => 'I',
            Self::Running => 'R',
            Self::Sleeping => 'S',
            Self::Stopped => 'T',
            Self::Waiting => 'U',
            Self::Zombie => 'Z',
            Self::Off => 'X',
        }
    }

    /// Status text published to the host. Sleeping counts as running.
    pub fn text(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running | Self::Sleeping => "running",
            Self::Stopped => "stopped",
            Self::Waiting => "waiting",
            Self::Zombie => "zombie",
            Self::Off => "off",
        }
    }

    pub fn icon(self) -> StatusIcon {
        match self {
            Self::Idle | Self::Waiting => StatusIcon::Paused,
            Self::Running | Self::Sleeping => StatusIcon::SensorOn,
            Self::Stopped => StatusIcon::Stopped,
            Self::Zombie => StatusIcon::SensorTripped,
            Self::Off => StatusIcon::SensorOff,
        }
    }
}

/// `ps` elapsed time, `[[dd-]hh:]mm:ss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElapsedTime {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    raw: String,
}

impl ElapsedTime {
    pub fn parse(text: &str) -> Option<Self> {
        let raw = text.trim();
        let (days, clock) = match raw.split_once('-') {
            Some((d, rest)) => (d.parse().ok()?, rest),
            None => (0, raw),
        };

        let parts = clock
            .split(':')
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        let (hours, minutes, seconds) = match parts.as_slice() {
            [h, m, s] => (*h, *m, *s),
            [m, s] => (0, *m, *s),
            _ => return None,
        };

        Some(Self {
            days,
            hours,
            minutes,
            seconds,
            raw: raw.to_string(),
        })
    }

    pub fn total_seconds(&self) -> u64 {
        self.days * 86_400 + self.hours * 3_600 + self.minutes * 60 + self.seconds
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// One parsed process-table row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub pid: u32,
    pub state: StateCode,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub started: NaiveDateTime,
    pub elapsed: ElapsedTime,
    pub command: String,
}

/// Renders the row back in the `ps` column layout it was parsed from.
impl fmt::Display for ProcessRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>5} {:<4} {:>5} {:>5} {}   {:>11} {}",
            self.pid,
            self.state.letter(),
            self.cpu_percent,
            self.mem_percent,
            self.started.format("%a %b %e %H:%M:%S %Y"),
            self.elapsed.as_str(),
            self.command
        )
    }
}
