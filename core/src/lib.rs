//! Relay core and producer-side plumbing for the DOA radar pipeline.
//!
//! Measurements enter the relay as UDP text records, are fanned out through a
//! subscriber registry to every live viewer session, and are logged and
//! forwarded on the producer side by the session log and the forwarders.

pub mod forwarder;
pub mod prelude;
pub mod relay;
pub mod telemetry;
pub mod wire;

pub use prelude::{DoaError, DoaResult, Measurement};
