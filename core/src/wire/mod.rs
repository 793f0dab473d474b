//! Text formats shared by the relay and the producer: ingress records,
//! server-sent-event frames and the timestamp/angle renderings used in logs.

pub mod frame;
pub mod ingress;
pub mod text;

pub use frame::{Frame, KEEPALIVE_FRAME};
pub use ingress::{parse_datagram, parse_line, ParsedDatagram};
pub use text::{format_angle, line_timestamp, session_stamp};
