use crate::generator::profile::GeneratorConfig;
use anyhow::{bail, Context};
use doacore::forwarder::{Destination, ForwarderConfig, TrustPolicy, DEFAULT_RETRY_BACKOFF};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProducerConfig {
    pub log_dir: PathBuf,
    pub destination: Destination,
    /// Explicit trust policy for `tls://` destinations. When unset, a CA
    /// file selects strict verification and no CA file selects accept-any.
    pub trust: Option<TrustPolicy>,
    pub tls_ca_file: Option<PathBuf>,
    pub retry_backoff_ms: u64,
    pub drain_timeout_secs: u64,
    pub result_label: String,
    pub generator: GeneratorConfig,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            destination: Destination::default(),
            trust: None,
            tls_ca_file: None,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF.as_millis() as u64,
            drain_timeout_secs: 5,
            result_label: "test".into(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl ProducerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading producer config {}", path_ref.display()))?;
        let config: ProducerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing producer config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Defaults, then the optional YAML file, then `DOA_*` variables.
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DOA_LOG_DIR") {
            self.log_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("DOA_DESTINATION") {
            self.destination = value
                .parse()
                .with_context(|| format!("DOA_DESTINATION={value}"))?;
        }
        if let Some(value) = lookup("DOA_TLS_CA_FILE") {
            self.tls_ca_file = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("DOA_TLS_TRUST") {
            self.trust = Some(
                value
                    .parse()
                    .with_context(|| format!("DOA_TLS_TRUST={value}"))?,
            );
        }
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retry_backoff_ms == 0 {
            bail!("retry_backoff_ms must be positive");
        }
        if self.result_label.contains(['\n', '\r']) {
            bail!("result_label must be a single line");
        }
        self.generator.validate()
    }

    pub fn trust_policy(&self) -> TrustPolicy {
        TrustPolicy::resolve(self.trust.clone(), self.tls_ca_file.clone())
    }

    pub fn forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            destination: self.destination.clone(),
            trust: self.trust_policy(),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}
