//! `push "route …"` directives pushed to clients.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use crate::editor::ConfigLineEditor;
use crate::error::StoreError;
use crate::store::Mutation;

/// Lines appended by a successful route addition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAdded {
    pub comment: Option<String>,
    pub route: String,
}

/// `push "route a.b.c.0 255.255.255.0"` for the /24 containing `ip`.
pub fn subnet_route_line(ip: Ipv4Addr) -> String {
    let [a, b, c, _] = ip.octets();
    format!("push \"route {a}.{b}.{c}.0 255.255.255.0\"")
}

/// `push "route <ip> 255.255.255.255"`.
pub fn host_route_line(ip: Ipv4Addr) -> String {
    format!("push \"route {ip} 255.255.255.255\"")
}

/// First IPv4 address `host` resolves to.
pub fn resolve_ipv4(host: &str) -> Result<Ipv4Addr, StoreError> {
    let addrs = (host, 0).to_socket_addrs().map_err(|source| StoreError::Resolve {
        host: host.to_string(),
        source,
    })?;
    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| StoreError::NoIpv4 {
            host: host.to_string(),
        })
}

impl ConfigLineEditor<'_> {
    /// Push the /24 subnet of `ip`, preceded by `#<comment>` if given.
    pub fn add_subnet_route(
        &self,
        ip: Ipv4Addr,
        comment: Option<&str>,
    ) -> Result<RouteAdded, StoreError> {
        let route = subnet_route_line(ip);
        self.add_route(&[route.clone()], route, comment)
    }

    /// Push a single host route for `ip`, preceded by `#<label>`.
    ///
    /// An existing route for the surrounding /24 also counts as a duplicate.
    pub fn add_host_route(&self, label: &str, ip: Ipv4Addr) -> Result<RouteAdded, StoreError> {
        let route = host_route_line(ip);
        self.add_route(&[route.clone(), subnet_route_line(ip)], route, Some(label))
    }

    fn add_route(
        &self,
        covering: &[String],
        route: String,
        comment: Option<&str>,
    ) -> Result<RouteAdded, StoreError> {
        let comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| format!("#{c}"));

        let added = self.store.transaction(|lines| {
            if let Some(existing) = lines
                .iter()
                .find(|line| covering.iter().any(|r| line.contains(r.as_str())))
            {
                return Err(StoreError::DuplicateRoute {
                    existing: existing.trim().to_string(),
                });
            }
            lines.extend(comment.clone());
            lines.push(route.clone());
            Ok(Mutation::Changed(RouteAdded {
                comment: comment.clone(),
                route: route.clone(),
            }))
        })?;
        tracing::info!(route = %added.route, "route added");
        Ok(added)
    }
}
