use crate::prelude::Measurement;
use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;

/// Idle frame pushed to viewers so intermediaries keep the stream open.
pub const KEEPALIVE_FRAME: &str = "data: {}\n\n";

/// One unit pushed down a viewer's event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Data(Measurement),
    KeepAlive,
}

impl Frame {
    /// Renders the frame as `data: <json>\n\n`.
    pub fn encode(&self) -> serde_json::Result<String> {
        match self {
            Frame::Data(measurement) => {
                let json = to_spaced_json(measurement)?;
                Ok(format!("data: {json}\n\n"))
            }
            Frame::KeepAlive => Ok(KEEPALIVE_FRAME.to_string()),
        }
    }
}

/// Serialises with `", "` and `": "` separators, the layout existing viewers
/// and log tooling already consume. Floats go through serde_json's own
/// shortest form, so very large magnitudes print as `1e20` rather than
/// Python's `1e+20`; bearings never get there.
pub fn to_spaced_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::with_capacity(64);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8(buf)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()))
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}
