use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{ElapsedTime, ProcessRow, StateCode};

lazy_static! {
    /// pid, state(+modifiers), %cpu, %mem, lstart, etime, args.
    ///
    /// lstart is free-form text, so it ends where a run of three or more
    /// spaces precedes the right-aligned etime column.
    static ref ROW_RE: Regex = Regex::new(
        r"^ *([0-9]+) +([IRSTUZ])[sA-Z+<>]* +([0-9.,]+) +([0-9.,]+) +(.+?)   +([0-9:-]+) +(.+)$"
    )
    .expect("process row regex");
}

/// `lstart` layouts accepted after collapsing runs of whitespace.
const START_FORMATS: &[&str] = &["%a %b %d %H:%M:%S %Y", "%a %d %b %H:%M:%S %Y"];

/// Parses one process-table row. Returns `None` for anything that does not
/// fit the column layout, including the header line.
pub fn parse_row(line: &str) -> Option<ProcessRow> {
    let caps = ROW_RE.captures(line.trim_end())?;

    let pid = caps[1].parse().ok()?;
    let state = caps[2].chars().next().and_then(StateCode::from_letter)?;
    let cpu_percent = parse_decimal(&caps[3])?;
    let mem_percent = parse_decimal(&caps[4])?;
    let started = parse_start_time(&caps[5])?;
    let elapsed = ElapsedTime::parse(&caps[6])?;

    Some(ProcessRow {
        pid,
        state,
        cpu_percent,
        mem_percent,
        started,
        elapsed,
        command: caps[7].trim().to_string(),
    })
}

/// Accepts both `.` and `,` as decimal separator.
pub fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().replace(',', ".").parse().ok()
}

pub fn parse_start_time(text: &str) -> Option<NaiveDateTime> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    START_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&collapsed, fmt).ok())
}
