//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI and `Host` to the upstream target
//! - Strip hop-by-hop headers in both directions
//! - Append the transport peer to `X-Forwarded-For`
//! - Tunnel protocol upgrades (WebSocket and friends) byte-for-byte
//! - Answer `502 Bad Gateway` when the upstream cannot be reached
//!
//! Bodies are streamed, never buffered. `https://` upstreams are verified
//! against the webpki root store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{CONNECTION, HOST, UPGRADE};
use axum::http::uri::{Authority, Scheme};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper::upgrade::OnUpgrade;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use thiserror::Error;

use crate::http::request::request_id;
use crate::observability::metrics;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that describe a single transport hop and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Invalid upstream URL {0:?}: {1}")]
    InvalidUrl(String, String),
    #[error("Unsupported upstream scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("Upstream URL {0:?} has no host")]
    MissingHost(String),
    #[error("TLS client setup failed: {0}")]
    Tls(#[from] rustls::Error),
}

/// The single upstream all admitted traffic goes to.
#[derive(Debug, Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
    host: HeaderValue,
}

impl Upstream {
    pub fn parse(target: &str) -> Result<Self, UpstreamError> {
        let url = url::Url::parse(target)
            .map_err(|e| UpstreamError::InvalidUrl(target.to_string(), e.to_string()))?;

        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(UpstreamError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| UpstreamError::MissingHost(target.to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let invalid = |reason: String| UpstreamError::InvalidUrl(target.to_string(), reason);
        Ok(Self {
            scheme,
            host: HeaderValue::from_str(&authority).map_err(|e| invalid(e.to_string()))?,
            authority: authority
                .parse::<Authority>()
                .map_err(|e| invalid(e.to_string()))?,
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::HTTPS
    }

    fn uri_for(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = original
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

/// Reverse proxy to one upstream.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    upstream: Arc<Upstream>,
}

impl Forwarder {
    pub fn new(upstream: Upstream) -> Result<Self, UpstreamError> {
        let client = Client::builder(TokioExecutor::new()).build(https_connector()?);
        tracing::debug!(
            authority = %upstream.authority(),
            tls = upstream.is_tls(),
            "Upstream client ready"
        );
        Ok(Self {
            client,
            upstream: Arc::new(upstream),
        })
    }

    /// Forward `request` and return the upstream's response.
    pub async fn forward(&self, mut request: Request<Body>) -> Response {
        let start = Instant::now();
        let request_id = request_id(request.headers()).to_string();
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        let upgrade = upgrade_protocol(request.headers());
        let client_upgrade = upgrade.as_ref().map(|_| hyper::upgrade::on(&mut request));

        let (parts, body) = request.into_parts();
        tracing::debug!(
            request_id = %request_id,
            method = %parts.method,
            path = %parts.uri.path(),
            upgrade = ?upgrade,
            "Proxying request"
        );

        let uri = match self.upstream.uri_for(&parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Cannot build upstream URI");
                return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
            }
        };

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        if let Some(protocol) = &upgrade {
            headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
            headers.insert(UPGRADE, protocol.clone());
        }
        headers.insert(HOST, self.upstream.host.clone());
        if let Some(peer) = peer {
            append_forwarded_for(&mut headers, &peer.ip().to_string());
        }

        let mut outgoing = Request::new(body);
        *outgoing.method_mut() = parts.method;
        *outgoing.uri_mut() = uri;
        *outgoing.headers_mut() = headers;

        let mut response = match self.client.request(outgoing).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Upstream error");
                metrics::record_upstream(StatusCode::BAD_GATEWAY.as_u16(), start);
                return (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response();
            }
        };

        let status = response.status();
        metrics::record_upstream(status.as_u16(), start);

        if status == StatusCode::SWITCHING_PROTOCOLS {
            let Some(client_upgrade) = client_upgrade else {
                tracing::warn!(request_id = %request_id, "Upstream switched protocols unasked");
                return (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response();
            };
            let protocol = response.headers().get(UPGRADE).cloned();
            let upstream_upgrade = hyper::upgrade::on(&mut response);
            tokio::spawn(tunnel(client_upgrade, upstream_upgrade, request_id));

            strip_hop_by_hop(response.headers_mut());
            response
                .headers_mut()
                .insert(CONNECTION, HeaderValue::from_static("Upgrade"));
            if let Some(protocol) = protocol {
                response.headers_mut().insert(UPGRADE, protocol);
            }
        } else {
            strip_hop_by_hop(response.headers_mut());
        }

        let (parts, body) = response.into_parts();
        Response::from_parts(parts, Body::new(body))
    }
}

/// Connector for both plain and TLS upstreams, pinned to the ring provider.
fn https_connector() -> Result<HttpsConnector<HttpConnector>, rustls::Error> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .build())
}

/// Catch-all handler behind the gate.
pub async fn proxy_handler(State(forwarder): State<Forwarder>, request: Request<Body>) -> Response {
    forwarder.forward(request).await
}

/// Splice the two upgraded connections until either side closes.
async fn tunnel(client: OnUpgrade, upstream: OnUpgrade, request_id: String) {
    match tokio::try_join!(client, upstream) {
        Ok((client, upstream)) => {
            let mut client = TokioIo::new(client);
            let mut upstream = TokioIo::new(upstream);
            match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
                Ok((sent, received)) => tracing::debug!(
                    request_id = %request_id,
                    bytes_sent = sent,
                    bytes_received = received,
                    "Upgraded connection closed"
                ),
                Err(e) => tracing::debug!(request_id = %request_id, error = %e, "Upgraded connection error"),
            }
        }
        Err(e) => tracing::warn!(request_id = %request_id, error = %e, "Protocol upgrade failed"),
    }
}

/// The requested protocol when `Connection` carries the `upgrade` token.
fn upgrade_protocol(headers: &HeaderMap) -> Option<HeaderValue> {
    let wants_upgrade = connection_tokens(headers).any(|token| token.eq_ignore_ascii_case("upgrade"));
    if wants_upgrade {
        headers.get(UPGRADE).cloned()
    } else {
        None
    }
}

fn connection_tokens(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = connection_tokens(headers)
        .map(str::to_ascii_lowercase)
        .collect();
    for name in &listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: &str) {
    let value = {
        let prior: Vec<&str> = headers
            .get_all(&X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if prior.is_empty() {
            client.to_string()
        } else {
            format!("{}, {}", prior.join(", "), client)
        }
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_upstream() {
        let upstream = Upstream::parse("http://localhost:8080").unwrap();
        assert_eq!(upstream.authority().as_str(), "localhost:8080");
        assert_eq!(upstream.host, "localhost:8080");

        let upstream = Upstream::parse("http://backend.internal/").unwrap();
        assert_eq!(upstream.authority().as_str(), "backend.internal");
    }

    #[test]
    fn parse_https_upstream() {
        let upstream = Upstream::parse("https://api.example.com").unwrap();
        assert!(upstream.is_tls());
        assert_eq!(upstream.authority().as_str(), "api.example.com");
        assert_eq!(upstream.host, "api.example.com");

        let upstream = Upstream::parse("https://api.example.com:8443/base").unwrap();
        assert_eq!(upstream.authority().as_str(), "api.example.com:8443");
        let uri = upstream.uri_for(&"/v1/items".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "https://api.example.com:8443/v1/items");

        assert!(!Upstream::parse("http://localhost:8080").unwrap().is_tls());
    }

    #[test]
    fn forwarder_builds_for_tls_upstream() {
        let upstream = Upstream::parse("https://api.example.com").unwrap();
        assert!(Forwarder::new(upstream).is_ok());
    }

    #[test]
    fn parse_upstream_rejects_other_schemes() {
        assert!(matches!(
            Upstream::parse("ftp://files.example.com"),
            Err(UpstreamError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Upstream::parse("not a url"),
            Err(UpstreamError::InvalidUrl(..))
        ));
    }

    #[test]
    fn uri_keeps_path_and_query() {
        let upstream = Upstream::parse("http://127.0.0.1:9000").unwrap();
        let original: Uri = "/api/items?page=2".parse().unwrap();
        let uri = upstream.uri_for(&original).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:9000/api/items?page=2");

        let absolute: Uri = "http://public.example.com/x".parse().unwrap();
        let uri = upstream.uri_for(&absolute).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:9000/x");
    }

    #[test]
    fn strips_hop_by_hop_and_connection_listed_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, X-Session-Hint"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session-hint", HeaderValue::from_static("abc"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("accept").unwrap(), "*/*");
    }

    #[test]
    fn detects_upgrade_requests() {
        let mut headers = HeaderMap::new();
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        assert!(upgrade_protocol(&headers).is_none());

        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        assert_eq!(upgrade_protocol(&headers).unwrap(), "websocket");
    }

    #[test]
    fn forwarded_for_appends() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.1.1.1");
        assert_eq!(headers.get(&X_FORWARDED_FOR).unwrap(), "10.1.1.1");

        headers.append(&X_FORWARDED_FOR, HeaderValue::from_static("198.51.100.2"));
        append_forwarded_for(&mut headers, "127.0.0.1");
        assert_eq!(
            headers.get(&X_FORWARDED_FOR).unwrap(),
            "10.1.1.1, 198.51.100.2, 127.0.0.1"
        );
        assert_eq!(headers.get_all(&X_FORWARDED_FOR).iter().count(), 1);
    }
}
