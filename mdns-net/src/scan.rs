use std::net::{Ipv4Addr, Ipv6Addr};

/// One system interface's worth of non-loopback addresses, as reported by
/// the OS. Built fresh on every reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedInterface {
    pub name: String,
    pub ipv4: Vec<(Ipv4Addr, u8)>,
    pub ipv6: Vec<(Ipv6Addr, u8)>,
}

/// Enumerates up, non-loopback interfaces and their addresses.
///
/// `if-addrs` doesn't report a "multicast-capable" flag directly; every
/// non-loopback interface it returns is treated as multicast-capable,
/// which holds for the overwhelming majority of real NICs and keeps this
/// crate from reaching for a raw-socket ioctl just to check one bit.
pub fn scan() -> std::io::Result<Vec<ScannedInterface>> {
    let mut by_name: Vec<ScannedInterface> = Vec::new();

    for iface in if_addrs::get_if_addrs()? {
        if iface.is_loopback() {
            continue;
        }

        let entry = match by_name.iter_mut().find(|found| found.name == iface.name) {
            Some(found) => found,
            None => {
                by_name.push(ScannedInterface {
                    name: iface.name.clone(),
                    ipv4: Vec::new(),
                    ipv6: Vec::new(),
                });
                by_name.last_mut().expect("just pushed")
            }
        };

        match iface.addr {
            if_addrs::IfAddr::V4(v4) => {
                entry.ipv4.push((v4.ip, prefix_len_v4(v4.netmask)));
            }
            if_addrs::IfAddr::V6(v6) => {
                entry.ipv6.push((v6.ip, prefix_len_v6(v6.netmask)));
            }
        }
    }

    Ok(by_name)
}

fn prefix_len_v4(mask: Ipv4Addr) -> u8 {
    u32::from(mask).count_ones() as u8
}

fn prefix_len_v6(mask: Ipv6Addr) -> u8 {
    u128::from(mask).count_ones() as u8
}
