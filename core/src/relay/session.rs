use crate::relay::registry::{SubscriberId, SubscriberRegistry, Subscription};
use crate::wire::Frame;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Idle interval after which a keep-alive frame is pushed.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(15);

/// One viewer's delivery lifecycle, from registration to teardown.
///
/// The session owns its subscription outright; dropping the session (viewer
/// gone, write failed, task cancelled) unregisters it.
pub struct Session {
    subscription: Subscription,
    keepalive: Duration,
}

impl Session {
    pub fn open(registry: &Arc<SubscriberRegistry>, keepalive: Duration) -> Self {
        Self {
            subscription: registry.register(),
            keepalive,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.subscription.id()
    }

    /// Waits for the next measurement, or yields a keep-alive once the idle
    /// interval passes. `None` means the registry evicted this session.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        match timeout(self.keepalive, self.subscription.recv()).await {
            Ok(Some(measurement)) => Some(Frame::Data(measurement)),
            Ok(None) => None,
            Err(_) => Some(Frame::KeepAlive),
        }
    }
}
