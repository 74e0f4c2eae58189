//! SSRF validation for outbound callback URLs.
//!
//! Grounded in `rust/common/dns`'s `PublicIPv4Resolver`/`InternalClient`:
//! resolution happens on a blocking thread via `ToSocketAddrs`, same as
//! `PublicIPv4Resolver::resolve`. Unlike that resolver (IPv4-only, silently
//! drops IPv6), this validator must classify both families explicitly,
//! since the disallowed-range table below covers IPv6 loopback,
//! unique-local, and link-local too — ported from `original_source/src/app/
//! callback.py`'s `_PRIVATE_NETWORKS` table.
//!
//! Deliberately does not cache: the validator is called twice per delivery
//! cycle (once at acceptance, once immediately before each POST) and a
//! cache would defeat the DNS-rebinding defence that's the point of the
//! second call.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

use url::Url;

use crate::error::SsrfError;

/// Stateless validator; cheap to clone and share across the acceptance
/// handler and the deliverer.
#[derive(Debug, Clone, Copy)]
pub struct SsrfValidator {
    allow_private_callbacks: bool,
}

impl SsrfValidator {
    pub fn new(allow_private_callbacks: bool) -> Self {
        Self {
            allow_private_callbacks,
        }
    }

    /// Validate a callback URL: scheme, hostname presence, and (unless
    /// `allow_private_callbacks`) every resolved address.
    pub async fn validate(&self, url: &str) -> Result<(), SsrfError> {
        let parsed = Url::parse(url).map_err(|_| SsrfError::MissingHostname)?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SsrfError::InvalidScheme(parsed.scheme().to_owned()));
        }

        let host = parsed.host_str().ok_or(SsrfError::MissingHostname)?.to_owned();
        let port = parsed.port_or_known_default().unwrap_or(80);

        if self.allow_private_callbacks {
            return Ok(());
        }

        let addrs = resolve(host.clone(), port).await?;
        for addr in &addrs {
            if is_disallowed(addr.ip()) {
                return Err(SsrfError::DisallowedAddress(addr.ip().to_string()));
            }
        }

        Ok(())
    }
}

/// Resolve `host:port` on a blocking thread, mirroring
/// `PublicIPv4Resolver::resolve`'s use of `spawn_blocking` around the
/// stdlib's synchronous resolver.
async fn resolve(host: String, port: u16) -> Result<Vec<SocketAddr>, SsrfError> {
    let host_for_error = host.clone();
    let task = tokio::task::spawn_blocking(move || (host.as_str(), port).to_socket_addrs());

    match task.await {
        Ok(Ok(iter)) => Ok(iter.collect()),
        Ok(Err(io_err)) => Err(SsrfError::ResolutionFailed {
            host: host_for_error,
            reason: io_err.to_string(),
        }),
        Err(join_err) => Err(SsrfError::ResolutionFailed {
            host: host_for_error,
            reason: join_err.to_string(),
        }),
    }
}

/// Reject any address in these ranges unless private callbacks are
/// explicitly allowed.
fn is_disallowed(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_disallowed_v4(v4),
        IpAddr::V6(v6) => is_disallowed_v6(v6),
    }
}

fn is_disallowed_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() // 127.0.0.0/8
        || ip.is_private() // 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
        || ip.is_link_local() // 169.254.0.0/16
        || ip.octets()[0] == 0 // 0.0.0.0/8, "this network"
}

fn is_disallowed_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() {
        return true; // ::1/128
    }
    let seg = ip.segments();
    let is_unique_local = (seg[0] & 0xfe00) == 0xfc00; // fc00::/7
    let is_link_local = (seg[0] & 0xffc0) == 0xfe80; // fe80::/10
    is_unique_local || is_link_local
}
