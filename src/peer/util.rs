use std::net::IpAddr;

/// Every address bound to a local network interface, loopback included.
pub fn get_ip_addresses() -> Vec<IpAddr> {
    let mut ip_addresses = vec![];

    for interfaces in get_if_addrs::get_if_addrs() {
        for interface in interfaces {
            ip_addresses.push(interface.ip());
        }
    }

    ip_addresses
}

/// Drop the addresses a peer could never be reached on.
pub fn get_reachable_ip_addresses(ip_addresses: Vec<IpAddr>) -> Vec<IpAddr> {
    ip_addresses
        .into_iter()
        .filter(|ip_address| !ip_address.is_unspecified() && !ip_address.is_multicast())
        .collect::<Vec<IpAddr>>()
}
