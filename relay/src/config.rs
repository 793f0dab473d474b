use anyhow::{bail, Context};
use doacore::relay::{DEFAULT_KEEPALIVE, DEFAULT_MAX_DATAGRAM, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub ingress_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub keepalive_secs: u64,
    pub queue_capacity: usize,
    pub max_datagram: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ingress_addr: SocketAddr::from(([127, 0, 0, 1], 2222)),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 6688)),
            keepalive_secs: DEFAULT_KEEPALIVE.as_secs(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_datagram: DEFAULT_MAX_DATAGRAM,
        }
    }
}

impl RelayConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading relay config {}", path_ref.display()))?;
        let config: RelayConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing relay config {}", path_ref.display()))?;
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
        if let Some(value) = lookup("DOA_INGRESS_ADDR") {
            self.ingress_addr = value
                .parse()
                .with_context(|| format!("DOA_INGRESS_ADDR={value}"))?;
        }
        if let Some(value) = lookup("DOA_HTTP_ADDR") {
            self.http_addr = value
                .parse()
                .with_context(|| format!("DOA_HTTP_ADDR={value}"))?;
        }
        if let Some(value) = lookup("DOA_KEEPALIVE_SECS") {
            self.keepalive_secs = value
                .parse()
                .with_context(|| format!("DOA_KEEPALIVE_SECS={value}"))?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.keepalive_secs == 0 {
            bail!("keepalive_secs must be at least 1");
        }
        if self.queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }
        if self.max_datagram == 0 {
            bail!("max_datagram must be at least 1");
        }
        Ok(())
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_deployment_constants() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.ingress_addr.to_string(), "127.0.0.1:2222");
        assert_eq!(cfg.http_addr.to_string(), "0.0.0.0:6688");
        assert_eq!(cfg.keepalive(), Duration::from_secs(15));
        cfg.validate().unwrap();
    }

    #[test]
    fn config_load_reads_partial_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"http_addr: 127.0.0.1:8080\nqueue_capacity: 16\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = RelayConfig::load(&path).unwrap();
        assert_eq!(cfg.http_addr.port(), 8080);
        assert_eq!(cfg.queue_capacity, 16);
        assert_eq!(cfg.ingress_addr.port(), 2222);
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("DOA_INGRESS_ADDR", "0.0.0.0:3333"),
            ("DOA_KEEPALIVE_SECS", "5"),
        ]
        .into_iter()
        .collect();
        let cfg = RelayConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.ingress_addr.port(), 3333);
        assert_eq!(cfg.keepalive_secs, 5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(RelayConfig::default()
            .with_overrides(|key| (key == "DOA_HTTP_ADDR").then(|| "nowhere".to_string()))
            .is_err());

        let cfg = RelayConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
