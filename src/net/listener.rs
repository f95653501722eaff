//! TCP listener binding.
//!
//! # Responsibilities
//! - Check `host:port` bind addresses before anything starts
//! - Resolve and bind the listener
//!
//! # Design Decisions
//! - An empty host binds every interface, like `":8080"` in most servers
//! - IPv6 hosts use the bracketed form `"[::1]:8080"`
//! - Host names are resolved; the first address that binds wins

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::TcpListener;

use crate::error::{Error, Result};

/// Split `address` into host and port.
pub fn split_host_port(address: &str) -> Result<(String, u16)> {
    let invalid = |reason: &str| Error::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port"))?;

    let host = match host.strip_prefix('[') {
        Some(rest) => rest
            .strip_suffix(']')
            .ok_or_else(|| invalid("missing ']' in address"))?,
        None if host.contains(':') => return Err(invalid("too many colons in address")),
        None => host,
    };
    if host.contains(['[', ']']) {
        return Err(invalid("unexpected bracket in address"));
    }

    let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
    Ok((host.to_string(), port))
}

/// Bind a TCP listener on `address`.
pub async fn bind(address: &str) -> Result<TcpListener> {
    let (host, port) = split_host_port(address)?;

    let candidates: Vec<SocketAddr> = if host.is_empty() {
        vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)]
    } else if let Ok(ip) = host.parse::<IpAddr>() {
        vec![SocketAddr::new(ip, port)]
    } else {
        tokio::net::lookup_host((host.as_str(), port)).await?.collect()
    };

    let mut last_err = None;
    for addr in candidates {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::info!(address = %listener.local_addr()?, "Listener bound");
                return Ok(listener);
            }
            Err(e) => {
                tracing::debug!(address = %addr, error = %e, "Bind attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(e) => Error::from(e),
        None => Error::InvalidAddress {
            address: address.to_string(),
            reason: "host resolved to no addresses".to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port(":8080").unwrap(), (String::new(), 8080));
        assert_eq!(
            split_host_port("127.0.0.1:0").unwrap(),
            ("127.0.0.1".to_string(), 0)
        );
        assert_eq!(split_host_port("[::1]:443").unwrap(), ("::1".to_string(), 443));
        assert_eq!(
            split_host_port("localhost:80").unwrap(),
            ("localhost".to_string(), 80)
        );
    }

    #[test]
    fn test_invalid_addresses() {
        for address in ["", "8080", "host:", "host:http", "::1:80", "[::1:80", "a:70000"] {
            let err = split_host_port(address).unwrap_err();
            assert!(
                matches!(err, Error::InvalidAddress { .. }),
                "{address:?} gave {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
