//! Shared proptest strategies for in-crate tests.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use proptest::prelude::*;

pub(crate) fn arb_ipv4() -> impl Strategy<Value = Ipv4Addr> {
    any::<u32>().prop_map(Ipv4Addr::from)
}

pub(crate) fn arb_ipv6() -> impl Strategy<Value = Ipv6Addr> {
    any::<u128>().prop_map(Ipv6Addr::from)
}

pub(crate) fn arb_ip() -> impl Strategy<Value = IpAddr> {
    prop_oneof![
        arb_ipv4().prop_map(IpAddr::V4),
        arb_ipv6().prop_map(IpAddr::V6),
    ]
}

/// Header-ish noise: address text mixed with junk tokens, empty slots and
/// stray whitespace.
pub(crate) fn arb_header_token() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_ip().prop_map(|ip| ip.to_string()),
        Just(String::new()),
        Just("unknown".to_string()),
        Just("_hidden".to_string()),
        prop::string::string_regex("[0-9.]{1,15}").unwrap(),
        prop::string::string_regex("[ \\t]{0,3}[0-9a-f:]{2,20}[ \\t]{0,3}").unwrap(),
    ]
}
