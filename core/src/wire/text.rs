use chrono::{DateTime, TimeZone};
use std::fmt::Display;

/// Timestamp written on every log and network line, millisecond precision.
pub fn line_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%Y/%m/%d %H:%M:%S%.3f").to_string()
}

/// Compact stamp naming one producer run's log file.
pub fn session_stamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%Y%m%d%H%M%S").to_string()
}

/// Shortest round-trip decimal, with `.0` kept on integral values.
///
/// Agrees with Python's `str(float)` for magnitudes between `1e-4` and
/// `1e16`, which covers every bearing. Outside that range Python switches
/// to exponent form (`1e+20`) while this keeps positional digits.
pub fn format_angle(angle: f64) -> String {
    let mut text = angle.to_string();
    if angle.is_finite() && !text.contains('.') {
        text.push_str(".0");
    }
    text
}
