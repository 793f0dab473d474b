use serde::Serialize;
use std::sync::Mutex;

/// Running counters for the relay's ingress and fan-out paths.
pub struct RelayMetrics {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub datagrams: u64,
    pub accepted: u64,
    pub discarded: u64,
    pub broadcasts: u64,
    pub deliveries: u64,
    pub evictions: u64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_datagram(&self, accepted: usize, discarded: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.datagrams += 1;
            metrics.accepted += accepted as u64;
            metrics.discarded += discarded as u64;
        }
    }

    pub fn record_broadcast(&self, delivered: usize, evicted: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.broadcasts += 1;
            metrics.deliveries += delivered as u64;
            metrics.evictions += evicted as u64;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}
