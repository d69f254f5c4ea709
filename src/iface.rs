//! Local interface address lookup.
//!
//! Source-address specifiers of the form `if:<interface>` need one usable
//! address of the requested family from the named interface. IPv6
//! link-local addresses are skipped; neither the pinger nor the HTTP
//! client can bind them without a scope id.

use std::net::{IpAddr, Ipv6Addr};

use anyhow::{Context, bail};
use if_addrs::get_if_addrs;

use crate::AddressFamily;

/// Find one usable address of the given family on the named interface.
pub fn lookup_addr(name: &str, family: AddressFamily) -> anyhow::Result<IpAddr> {
    let addrs = get_if_addrs().context("failed to enumerate network interfaces")?;

    for if_addr in addrs {
        if if_addr.name != name {
            continue;
        }
        match (family, if_addr.ip()) {
            (AddressFamily::V4, ip @ IpAddr::V4(_)) => return Ok(ip),
            (AddressFamily::V6, ip @ IpAddr::V6(v6)) if !is_link_local(v6) => return Ok(ip),
            _ => {}
        }
    }

    bail!("no usable {family} address found on interface {name}")
}

fn is_link_local(addr: Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xffc0) == 0xfe80
}
