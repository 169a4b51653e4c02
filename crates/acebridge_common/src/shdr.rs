//! SHDR framing for MTConnect agents.
//!
//! A frame is a single line `timestamp|name|value|name|value...`. The agent
//! keeps the connection alive with `* PING`, answered by `* PONG <ms>`.

use crate::observation::ObservationValue;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write;
use std::time::Duration;

const PING: &str = "* PING";

/// Format a frame timestamp (UTC, microsecond precision)
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Render a value so it cannot break the frame structure
pub fn encode_value(value: &ObservationValue) -> String {
    value
        .to_string()
        .chars()
        .map(|c| if matches!(c, '|' | '\r' | '\n') { ' ' } else { c })
        .collect()
}

/// Build one newline-terminated frame. Returns `None` when there is nothing to send.
pub fn frame<'a, I>(at: DateTime<Utc>, items: I) -> Option<String>
where
    I: IntoIterator<Item = (&'a str, &'a ObservationValue)>,
{
    let mut line = timestamp(at);
    let mut any = false;
    for (name, value) in items {
        let _ = write!(line, "|{}|{}", name, encode_value(value));
        any = true;
    }
    if !any {
        return None;
    }
    line.push('\n');
    Some(line)
}

/// Whether an agent line is a heartbeat request
pub fn is_ping(line: &str) -> bool {
    line.trim_start().starts_with(PING)
}

/// Heartbeat reply advertising the expected ping interval
pub fn pong(heartbeat: Duration) -> String {
    format!("* PONG {}\n", heartbeat.as_millis())
}
