//! The fan-out relay: UDP ingress, the subscriber registry and per-viewer
//! sessions.

pub mod ingress;
pub mod registry;
pub mod session;

pub use ingress::{IngressListener, DEFAULT_MAX_DATAGRAM};
pub use registry::{
    BroadcastReport, SubscriberId, SubscriberRegistry, Subscription, DEFAULT_QUEUE_CAPACITY,
};
pub use session::{Session, DEFAULT_KEEPALIVE};
