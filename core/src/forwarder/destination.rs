use crate::prelude::DoaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Udp,
    Tcp,
    Tls,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Udp => "udp",
            Scheme::Tcp => "tcp",
            Scheme::Tls => "tls",
        }
    }
}

/// Where the producer sends its lines, e.g. `tls://127.0.0.1:6677/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Destination {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Destination {
    /// `host:port`, with IPv6 hosts bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            scheme: Scheme::Udp,
            host: "127.0.0.1".into(),
            port: 6677,
            path: "/".into(),
        }
    }
}

impl FromStr for Destination {
    type Err = DoaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| DoaError::Config(format!("destination {s:?}: {why}"));

        let (scheme, rest) = s
            .trim()
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "udp" => Scheme::Udp,
            "tcp" => Scheme::Tcp,
            "tls" => Scheme::Tls,
            _ => return Err(invalid("scheme must be udp, tcp or tls")),
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port.parse().map_err(|_| invalid("port is not a number"))?;

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}

impl TryFrom<String> for Destination {
    type Error = DoaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Destination> for String {
    fn from(value: Destination) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme.as_str(), self.authority(), self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_scheme() {
        let udp: Destination = "udp://127.0.0.1:6677".parse().unwrap();
        assert_eq!(udp, Destination::default());

        let tls: Destination = "TLS://relay.local:6677/".parse().unwrap();
        assert_eq!(tls.scheme, Scheme::Tls);
        assert_eq!(tls.host, "relay.local");
        assert_eq!(tls.path, "/");

        let tcp: Destination = "tcp://[::1]:9000/feed".parse().unwrap();
        assert_eq!(tcp.host, "::1");
        assert_eq!(tcp.authority(), "[::1]:9000");
        assert_eq!(tcp.to_string(), "tcp://[::1]:9000/feed");
    }

    #[test]
    fn rejects_incomplete_destinations() {
        assert!("127.0.0.1:6677".parse::<Destination>().is_err());
        assert!("http://127.0.0.1:6677".parse::<Destination>().is_err());
        assert!("udp://127.0.0.1".parse::<Destination>().is_err());
        assert!("udp://:6677".parse::<Destination>().is_err());
        assert!("udp://host:99999".parse::<Destination>().is_err());
    }
}
