use axum::{
    extract::{connect_info::ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::state::AppState;

const LOOPBACK: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

/// Resolves the client address for a request.
///
/// `X-Forwarded-For` and `X-Real-IP` are only honoured when the socket peer
/// is one of `trusted_proxies`; anyone else could rotate them freely. In a
/// forwarded chain the right-most hop that is not itself a trusted proxy is
/// the client. Without connect info the peer is taken to be loopback.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trusted_proxies: &[IpAddr]) -> IpAddr {
    let peer = peer.unwrap_or(LOOPBACK);
    if !trusted_proxies.contains(&peer) {
        return peer;
    }

    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        let hops: Vec<IpAddr> = h.split(',').filter_map(|hop| hop.trim().parse().ok()).collect();
        if let Some(ip) = hops.iter().rev().find(|ip| !trusted_proxies.contains(ip)).or(hops.first()) {
            return *ip;
        }
    }
    if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
        if let Ok(ip) = h.trim().parse::<IpAddr>() {
            return ip;
        }
    }
    peer
}

/// Client IP extractor for handlers. Never rejects.
#[derive(Clone, Copy, Debug)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(client_ip(&parts.headers, peer, &state.config.server.trusted_proxies)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        headers
    }

    #[test]
    fn headers_from_untrusted_peer_are_ignored() {
        let peer = IpAddr::from([192, 0, 2, 1]);
        assert_eq!(client_ip(&forwarded(), Some(peer), &[]), peer);
        assert_eq!(client_ip(&forwarded(), None, &[]), LOOPBACK);
    }

    #[test]
    fn trusted_proxy_forwards_client() {
        let proxy = IpAddr::from([10, 0, 0, 2]);
        let trusted = [proxy, IpAddr::from([10, 0, 0, 1])];
        // 10.0.0.1 is a trusted hop, so the client is the entry before it
        assert_eq!(client_ip(&forwarded(), Some(proxy), &trusted), IpAddr::from([203, 0, 113, 7]));
    }

    #[test]
    fn trusted_proxy_with_spoofed_prefix() {
        let proxy = IpAddr::from([10, 0, 0, 2]);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 198.51.100.9"));
        assert_eq!(client_ip(&headers, Some(proxy), &[proxy]), IpAddr::from([198, 51, 100, 9]));
    }

    #[test]
    fn real_ip_then_peer() {
        let proxy = IpAddr::from([10, 0, 0, 2]);
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, Some(proxy), &[proxy]), IpAddr::from([198, 51, 100, 2]));
        assert_eq!(client_ip(&HeaderMap::new(), Some(proxy), &[proxy]), proxy);
    }
}
