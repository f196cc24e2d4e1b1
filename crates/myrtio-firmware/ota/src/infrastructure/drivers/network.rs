use core::net::{IpAddr, SocketAddr};

use embassy_net::{IpAddress, Stack, dns::DnsQueryType};

/// Resolves a hostname to an IP address
pub(crate) async fn resolve_host(stack: Stack<'static>, host: &str) -> Result<IpAddress, ()> {
    if let Ok(ip) = host.parse::<embassy_net::Ipv4Address>() {
        return Ok(IpAddress::Ipv4(ip));
    }

    let Ok(addresses) = stack.dns_query(host, DnsQueryType::A).await else {
        return Err(());
    };

    addresses.first().copied().ok_or(())
}

pub(crate) fn to_core_ip(address: IpAddress) -> Option<IpAddr> {
    match address {
        IpAddress::Ipv4(ip) => Some(IpAddr::V4(ip)),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// Only IPv4 is enabled in the stack.
pub(crate) fn to_endpoint(remote: SocketAddr) -> Option<(IpAddress, u16)> {
    match remote.ip() {
        IpAddr::V4(ip) => Some((IpAddress::Ipv4(ip), remote.port())),
        IpAddr::V6(_) => None,
    }
}
