use std::ffi::CString;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::Error;

pub const MDNS_PORT: u16 = 5353;
pub const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

/// Opens a non-blocking IPv4 multicast socket bound to `0.0.0.0:5353`,
/// joined to `224.0.0.251` via `local_addr`.
pub fn open_v4(local_addr: Ipv4Addr) -> Result<UdpSocket, Error> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(not(target_os = "windows"))]
    socket.set_reuse_port(true)?;
    socket.set_multicast_ttl_v4(255)?;
    socket.set_nonblocking(true)?;

    let bind_addr: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT);
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v4(&MDNS_GROUP_V4, &local_addr)?;
    socket.set_multicast_if_v4(&local_addr)?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

/// Opens a non-blocking IPv6 multicast socket bound to `[::]:5353`, joined
/// to `ff02::fb` scoped to the interface named `if_name`.
pub fn open_v6(if_name: &str) -> Result<UdpSocket, Error> {
    let if_index = interface_index(if_name)?;

    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(not(target_os = "windows"))]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;

    let bind_addr: SocketAddrV6 = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, MDNS_PORT, 0, 0);
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v6(&MDNS_GROUP_V6, if_index)?;
    socket.set_multicast_if_v6(if_index)?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

fn interface_index(if_name: &str) -> Result<u32, Error> {
    let name = CString::new(if_name).map_err(|_| Error::NoSuchInterface(if_name.to_owned()))?;
    // SAFETY: `name` is a valid NUL-terminated C string for the duration of the call.
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        Err(Error::NoSuchInterface(if_name.to_owned()))
    } else {
        Ok(index)
    }
}

pub fn group_addr_v4() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(MDNS_GROUP_V4, MDNS_PORT))
}

pub fn group_addr_v6() -> SocketAddr {
    SocketAddr::V6(SocketAddrV6::new(MDNS_GROUP_V6, MDNS_PORT, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_addresses_match_spec_endpoints() {
        assert_eq!(group_addr_v4().to_string(), "224.0.0.251:5353");
        assert_eq!(group_addr_v6().to_string(), "[ff02::fb]:5353");
    }
}
