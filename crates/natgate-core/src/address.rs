//! Network matching between a contained machine and its gateway.
//!
//! Two machines are assumed to share a private network when their IPv4
//! address strings share the longest leading run of characters. This is a
//! lexical comparison of dotted-decimal text, not a netmask computation:
//! `10.0.3.1` and `10.0.130.1` only share `"10.0."`, and two unrelated
//! networks with similar leading digits can outrank the real one. Routing
//! decisions depend on this ranking, so keep it as is.

use tracing::debug;

use crate::error::{NatError, NatResult};
use crate::model::{Address, AddressScope, Machine};

/// Length in bytes of the common leading run of `a` and `b`.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

fn candidates(machine: &Machine) -> impl Iterator<Item = &Address> {
    machine
        .addresses
        .iter()
        .filter(|addr| addr.is_ipv4() && !addr.is_loopback())
}

/// Pick the `(host, gateway)` address pair most likely on the same network.
///
/// Ties keep the first pair seen, iterating host addresses in the outer loop.
pub fn match_networks(host: &Machine, gateway: &Machine) -> NatResult<(String, String)> {
    let mut best: Option<(usize, &str, &str)> = None;
    for host_addr in candidates(host) {
        for gw_addr in candidates(gateway) {
            let len = common_prefix_len(&host_addr.value, &gw_addr.value);
            if len > best.map_or(0, |(l, _, _)| l) {
                best = Some((len, host_addr.value.as_str(), gw_addr.value.as_str()));
            }
        }
    }

    match best {
        Some((len, host_addr, gw_addr)) => {
            debug!(
                host = %host.id,
                gateway = %gateway.id,
                host_addr,
                gw_addr,
                prefix_len = len,
                "matched networks"
            );
            Ok((host_addr.to_string(), gw_addr.to_string()))
        }
        None => Err(NatError::NoCommonNetwork {
            host: host.id.clone(),
            gateway: gateway.id.clone(),
        }),
    }
}

/// Select the address to reach a machine from outside.
///
/// Prefers the first public address, then falls back to the first
/// cloud-local or unknown one. Machine-local addresses never qualify.
pub fn select_public_address(addresses: &[Address]) -> Option<&str> {
    addresses
        .iter()
        .find(|a| a.scope == AddressScope::Public)
        .or_else(|| {
            addresses
                .iter()
                .find(|a| matches!(a.scope, AddressScope::CloudLocal | AddressScope::Unknown))
        })
        .map(|a| a.value.as_str())
}
