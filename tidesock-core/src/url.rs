//! `ws`/`wss` URL parsing
//!
//! The endpoint accepts URLs of the form `scheme://host[:port]`; the request
//! path travels separately. Anything after the authority is ignored here.

use crate::error::{Result, UrlError};

/// URL scheme, which selects the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain TCP
    Ws,
    /// TLS
    Wss,
}

impl Scheme {
    /// Default port for the scheme
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Ws => 80,
            Scheme::Wss => 443,
        }
    }

    /// True when the scheme requires TLS
    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Wss)
    }
}

/// A parsed WebSocket URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsUrl {
    /// Scheme (`ws` or `wss`)
    pub scheme: Scheme,
    /// Host name or address (brackets stripped for IPv6 literals)
    pub host: String,
    /// Port, defaulted from the scheme when absent
    pub port: u16,
}

impl WsUrl {
    /// Parse `scheme://host[:port]`.
    pub fn parse(input: &str) -> Result<Self> {
        let (scheme_str, rest) = input
            .split_once("://")
            .ok_or_else(|| UrlError::InvalidFormat(input.to_string()))?;

        let scheme = match scheme_str {
            "ws" => Scheme::Ws,
            "wss" => Scheme::Wss,
            other => return Err(UrlError::UnsupportedScheme(other.to_string()).into()),
        };

        // Authority ends at the first '/'; a trailing path is tolerated and
        // ignored since the request path is supplied separately.
        let authority = match rest.find('/') {
            Some(i) => &rest[..i],
            None => rest,
        };
        if authority.is_empty() {
            return Err(UrlError::MissingHost.into());
        }

        let (host, port_str) = if let Some(bracketed) = authority.strip_prefix('[') {
            // IPv6 literal: [::1] or [::1]:8080
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| UrlError::InvalidFormat(input.to_string()))?;
            let port_str = match after.strip_prefix(':') {
                Some(p) => Some(p),
                None if after.is_empty() => None,
                None => return Err(UrlError::InvalidFormat(input.to_string()).into()),
            };
            (host, port_str)
        } else {
            match authority.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        if host.is_empty() {
            return Err(UrlError::MissingHost.into());
        }

        let port = match port_str {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| UrlError::InvalidPort(p.to_string()))?,
            None => scheme.default_port(),
        };

        Ok(WsUrl {
            scheme,
            host: host.to_string(),
            port,
        })
    }

    /// Host formatted for use as an address component (IPv6 re-bracketed).
    pub fn host_for_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_basic() {
        let url = WsUrl::parse("ws://example.com").unwrap();
        assert_eq!(url.scheme, Scheme::Ws);
        assert_eq!(url.host, "example.com");
        assert_eq!(url.port, 80);
        assert!(!url.scheme.is_secure());
    }

    #[test]
    fn test_parse_secure_with_port() {
        let url = WsUrl::parse("wss://example.com:8443").unwrap();
        assert_eq!(url.scheme, Scheme::Wss);
        assert_eq!(url.port, 8443);
        assert!(url.scheme.is_secure());
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(WsUrl::parse("ws://h").unwrap().port, 80);
        assert_eq!(WsUrl::parse("wss://h").unwrap().port, 443);
    }

    #[test]
    fn test_trailing_path_ignored() {
        let url = WsUrl::parse("ws://example.com:9001/some/path").unwrap();
        assert_eq!(url.host, "example.com");
        assert_eq!(url.port, 9001);
    }

    #[test]
    fn test_ipv6_literal() {
        let url = WsUrl::parse("ws://[::1]:9001").unwrap();
        assert_eq!(url.host, "::1");
        assert_eq!(url.port, 9001);
        assert_eq!(url.host_for_addr(), "[::1]");

        let url = WsUrl::parse("wss://[2001:db8::2]").unwrap();
        assert_eq!(url.host, "2001:db8::2");
        assert_eq!(url.port, 443);
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            WsUrl::parse("http://example.com"),
            Err(Error::Url(UrlError::UnsupportedScheme(_)))
        ));
        assert!(matches!(
            WsUrl::parse("example.com"),
            Err(Error::Url(UrlError::InvalidFormat(_)))
        ));
        assert!(matches!(
            WsUrl::parse("ws://"),
            Err(Error::Url(UrlError::MissingHost))
        ));
        assert!(matches!(
            WsUrl::parse("ws://host:notaport"),
            Err(Error::Url(UrlError::InvalidPort(_)))
        ));
    }
}
