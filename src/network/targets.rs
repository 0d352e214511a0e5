//! Broadcast targets and local addresses, read from the host's interfaces.

use std::collections::{BTreeSet, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use ipnetwork::Ipv4Network;
use pnet::datalink;

/// Directed broadcast address of every up, non-loopback IPv4 interface.
pub fn interface_broadcasts() -> Vec<Ipv4Addr> {
    datalink::interfaces()
        .into_iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .flat_map(|iface| {
            iface.ips.into_iter().filter_map(|ip| match ip.ip() {
                IpAddr::V4(ipv4) if ip.prefix() < 31 => Ipv4Network::new(ipv4, ip.prefix())
                    .ok()
                    .map(|network| network.broadcast()),
                _ => None,
            })
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every address bound to a local interface, loopback included.
pub fn local_addresses() -> HashSet<IpAddr> {
    let mut addresses: HashSet<IpAddr> = datalink::interfaces()
        .into_iter()
        .flat_map(|iface| iface.ips.into_iter().map(|ip| ip.ip()))
        .collect();
    addresses.insert(IpAddr::V4(Ipv4Addr::LOCALHOST));
    addresses
}

/// Configured targets on `port`, or every interface broadcast address when none are given.
pub fn resolve(configured: &[IpAddr], port: u16) -> Vec<SocketAddr> {
    if configured.is_empty() {
        let broadcasts = interface_broadcasts();
        if broadcasts.is_empty() {
            return vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port)];
        }
        return broadcasts
            .into_iter()
            .map(|ip| SocketAddr::new(IpAddr::V4(ip), port))
            .collect();
    }
    configured
        .iter()
        .map(|ip| SocketAddr::new(*ip, port))
        .collect()
}
