//! Client identity extraction.
//!
//! The identity is a plain string: either the first hop listed in a trusted
//! forwarding header or the host part of the transport peer address. It is not
//! validated here; the classifier treats anything unparseable as external.

use axum::http::{HeaderMap, HeaderName};

/// Resolves the client identity of a request.
#[derive(Debug, Clone, Default)]
pub struct ClientIdentity {
    header: Option<HeaderName>,
}

impl ClientIdentity {
    /// Trust `header` when present. `None` uses the peer address only.
    pub fn new(header: Option<HeaderName>) -> Self {
        Self { header }
    }

    /// Build from the configured header name; an empty name disables header trust.
    pub fn from_header_name(name: &str) -> Result<Self, axum::http::header::InvalidHeaderName> {
        if name.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self::new(Some(HeaderName::from_bytes(name.as_bytes())?)))
    }

    pub fn header(&self) -> Option<&HeaderName> {
        self.header.as_ref()
    }

    /// Resolve the identity from request headers and the raw peer address.
    pub fn resolve(&self, headers: &HeaderMap, peer: &str) -> String {
        if let Some(name) = &self.header {
            // Undecodable bytes are decoded lossily, never skipped.
            if let Some(value) = headers.get(name).filter(|v| !v.is_empty()) {
                let value = String::from_utf8_lossy(value.as_bytes());
                let first = value.split(',').next().unwrap_or(&value);
                return first.trim().to_string();
            }
        }

        split_host(peer).unwrap_or(peer).to_string()
    }
}

/// Host part of a `host:port` or `[v6]:port` address.
///
/// Returns `None` when the address does not have that shape, including bare
/// IPv6 addresses.
pub fn split_host(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        tail.strip_prefix(':')?;
        return Some(host);
    }

    let (host, _port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return None;
    }
    Some(host)
}
