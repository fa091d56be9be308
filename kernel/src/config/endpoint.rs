// Store Endpoint
//
// Accepted forms, each optionally prefixed by `scheme://`:
//   host
//   host:port
//   host/namespace
//   host:port/namespace
//
// An IPv6 host is written in brackets (`[::1]:8091/orders`). A bare IPv6
// literal without a port (`::1`) is also taken as a host.

use std::fmt;
use std::net::Ipv6Addr;

use super::ConfigError;

/// Port used when the endpoint does not name one.
pub const DEFAULT_PORT: u16 = 8091;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub namespace: String,
}

impl Endpoint {
    /// Parse an endpoint. A namespace path overrides `default_namespace`;
    /// a blank path does not.
    pub fn parse(raw: &str, default_namespace: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason,
        };

        let trimmed = raw.trim();
        let rest = trimmed
            .split_once("://")
            .map_or(trimmed, |(_, rest)| rest);

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, Some(path)),
            None => (rest, None),
        };

        let (host, port) = split_host_port(authority).map_err(invalid)?;
        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| invalid("port must be a number between 1 and 65535"))?,
            None => DEFAULT_PORT,
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let namespace = path
            .map(|p| p.trim_matches(|c| c == '/' || c == ' '))
            .filter(|p| !p.is_empty())
            .unwrap_or(default_namespace.trim());

        if namespace.is_empty() {
            return Err(invalid("missing namespace"));
        }
        if namespace.contains('/') {
            return Err(invalid("namespace must be a single path segment"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            namespace: namespace.to_string(),
        })
    }
}

/// Split `host[:port]`, with IPv6 hosts either bracketed or bare.
fn split_host_port(authority: &str) -> Result<(&str, Option<&str>), &'static str> {
    if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed.split_once(']').ok_or("unclosed `[` in host")?;
        if host.parse::<Ipv6Addr>().is_err() {
            return Err("bracketed host must be an IPv6 address");
        }
        return match after {
            "" => Ok((host, None)),
            _ => after
                .strip_prefix(':')
                .map(|port| (host, Some(port)))
                .ok_or("unexpected text after `]`"),
        };
    }

    match authority.split_once(':') {
        None => Ok((authority, None)),
        Some((host, port)) if !port.contains(':') => Ok((host, Some(port))),
        Some(_) if authority.parse::<Ipv6Addr>().is_ok() => Ok((authority, None)),
        Some(_) => Err("IPv6 host with a port must be bracketed"),
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}/{}", self.host, self.port, self.namespace)
        } else {
            write!(f, "{}:{}/{}", self.host, self.port, self.namespace)
        }
    }
}
