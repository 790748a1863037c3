use std::net::Ipv4Addr;

/// First non-loopback IPv4 address of this host, from OS interface
/// enumeration.
///
/// This is the address a server advertises to the registry; a host
/// without one cannot be reached by peers, so callers treat `None` as
/// fatal.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let addrs = match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            log::error!("failed to enumerate interface addresses: {}", e);
            return None;
        }
    };
    for ifaddr in addrs {
        let Some(storage) = ifaddr.address else { continue };
        if let Some(sin) = storage.as_sockaddr_in() {
            let ip = sin.ip();
            if !ip.is_loopback() {
                return Some(ip);
            }
        }
    }
    None
}
