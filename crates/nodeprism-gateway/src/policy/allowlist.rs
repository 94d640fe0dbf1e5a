//! IP allow-list compilation and matching.
//!
//! Entries are literal IP strings or CIDR ranges. Literal entries match by
//! exact string comparison against the resolved client address; entries
//! containing `/` additionally match any address inside the range. Entries
//! that look like CIDR but do not parse never match.

use std::net::IpAddr;

use ipnet::IpNet;

/// Immutable allow-list. Empty means "allow everyone".
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    entries: Vec<String>,
    nets: Vec<IpNet>,
}

impl AllowList {
    pub fn new(entries: Vec<String>) -> Self {
        let nets = entries
            .iter()
            .filter(|e| e.contains('/'))
            .filter_map(|e| match e.parse::<IpNet>() {
                Ok(net) => Some(net),
                Err(err) => {
                    tracing::debug!(entry = %e, err = %err, "allowlist entry is not a valid CIDR, skipped");
                    None
                }
            })
            .collect();
        Self { entries, nets }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Admission test for an already-resolved client address string.
    pub fn allows(&self, ip: &str) -> bool {
        if self.entries.iter().any(|e| e == ip) {
            return true;
        }
        match ip.parse::<IpAddr>() {
            // IPv4-mapped IPv6 clients match IPv4 ranges.
            Ok(addr) => {
                let addr = addr.to_canonical();
                self.nets.iter().any(|n| n.contains(&addr))
            }
            Err(_) => false,
        }
    }
}

/// Host part of a `host:port` remote address, brackets stripped for IPv6.
///
/// Returns `None` when the string is not a well-formed `host:port`
/// (missing port, unbracketed IPv6, stray brackets).
pub fn split_host_port(addr: &str) -> Option<&str> {
    let (host, _port) = addr.rsplit_once(':')?;
    if let Some(inner) = host.strip_prefix('[') {
        let inner = inner.strip_suffix(']')?;
        if inner.contains('[') || inner.contains(']') {
            return None;
        }
        return Some(inner);
    }
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return None;
    }
    Some(host)
}

/// Client address used for admission: the host of `remote`, or `remote`
/// itself when it cannot be split.
pub fn resolve_client_ip(remote: &str) -> &str {
    split_host_port(remote).unwrap_or(remote)
}
