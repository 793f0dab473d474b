use crate::prelude::Measurement;

/// Result of decoding one inbound datagram.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedDatagram {
    pub measurements: Vec<Measurement>,
    /// Non-blank lines that did not form a measurement.
    pub discarded: usize,
}

/// Parses a single `<timestamp>,<angle>` record.
///
/// Returns `None` for anything that is not exactly a timestamp and a finite
/// number separated by the first comma.
pub fn parse_line(line: &str) -> Option<Measurement> {
    let (timestamp, angle) = line.trim().split_once(',')?;
    let angle: f64 = angle.trim().parse().ok()?;
    if !angle.is_finite() {
        return None;
    }
    Some(Measurement::new(timestamp.trim(), angle))
}

/// Decodes a raw datagram that may hold several newline-separated records.
pub fn parse_datagram(buf: &[u8]) -> ParsedDatagram {
    let text = decode_lossless(buf);
    let mut parsed = ParsedDatagram::default();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match parse_line(line) {
            Some(measurement) => parsed.measurements.push(measurement),
            None => {
                log::trace!("discarding malformed ingress line {:?}", line);
                parsed.discarded += 1;
            }
        }
    }
    parsed
}

// Invalid UTF-8 sequences are dropped rather than replaced.
fn decode_lossless(buf: &[u8]) -> String {
    let mut text = String::with_capacity(buf.len());
    for chunk in buf.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}
