use crate::generator::profile::DoaGenerator;
use chrono::Local;
use doacore::forwarder::Forwarder;
use doacore::telemetry::SessionLog;
use doacore::wire::{format_angle, line_timestamp};
use doacore::{DoaError, DoaResult};
use log::{debug, error, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// What happened to one measurement on each of the two output paths.
#[derive(Debug)]
pub struct SaveOutcome {
    pub log_error: Option<DoaError>,
    pub forward_error: Option<DoaError>,
}

impl SaveOutcome {
    pub fn is_clean(&self) -> bool {
        self.log_error.is_none() && self.forward_error.is_none()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub emitted: u64,
    pub log_failures: u64,
    pub forward_failures: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &SaveOutcome) {
        self.emitted += 1;
        if outcome.is_clean() {
            return;
        }
        if outcome.log_error.is_some() {
            self.log_failures += 1;
        }
        if outcome.forward_error.is_some() {
            self.forward_failures += 1;
        }
    }
}

/// Logs and forwards every measurement. The two paths are independent: a
/// failure on one never skips the other.
pub struct Runner {
    log: SessionLog,
    forwarder: Forwarder,
}

impl Runner {
    pub fn new(log: SessionLog, forwarder: Forwarder) -> Self {
        Self { log, forwarder }
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub async fn save_doa(&self, angle: f64, result: &str) -> SaveOutcome {
        let timestamp = line_timestamp(&Local::now());
        self.save_doa_at(&timestamp, angle, result).await
    }

    async fn save_doa_at(&self, timestamp: &str, angle: f64, result: &str) -> SaveOutcome {
        let log_error = self
            .log
            .append_measurement(timestamp, angle, result)
            .err();
        if let Some(err) = &log_error {
            error!("session log write failed: {}", err);
        }

        let line = format!("{timestamp}, {}", format_angle(angle));
        let forward_error = self.forwarder.forward(&line).await.err();
        if let Some(err) = &forward_error {
            warn!("forwarding {:?} failed: {}", line, err);
            let label = self.forwarder.error_label();
            if let Err(log_err) = self.log.annotate_send_error(timestamp, label, err) {
                debug!("could not annotate send failure: {}", log_err);
            }
        }

        SaveOutcome {
            log_error,
            forward_error,
        }
    }

    /// Emits one generated angle per `period` until `count` is reached or
    /// `stop` resolves.
    pub async fn run<F>(
        &self,
        generator: &mut DoaGenerator,
        period: Duration,
        result: &str,
        count: Option<u64>,
        stop: F,
    ) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = RunSummary::default();

        while count.map_or(true, |limit| summary.emitted < limit) {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    let angle = generator.next_angle();
                    debug!("generated doa {}", format_angle(angle));
                    let outcome = self.save_doa(angle, result).await;
                    summary.record(&outcome);
                }
            }
        }
        summary
    }

    /// Drains the forwarder's queue before returning.
    pub async fn shutdown(self, deadline: Duration) -> DoaResult<()> {
        self.forwarder.shutdown(deadline).await
    }
}
