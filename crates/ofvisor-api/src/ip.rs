// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use super::ApiError;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// An IPv4 address. Serialized in dotted-quad form.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(from = "core::net::Ipv4Addr", into = "core::net::Ipv4Addr")]
#[repr(C)]
pub struct Ipv4Addr {
    inner: [u8; 4],
}

impl Ipv4Addr {
    pub const ANY_ADDR: Self = Self { inner: [0; 4] };
    pub const LOCAL_BCAST: Self = Self { inner: [255; 4] };

    /// Return the bytes of the address.
    #[inline]
    pub fn bytes(&self) -> [u8; 4] {
        self.inner
    }

    pub const fn from_const(bytes: [u8; 4]) -> Self {
        Self { inner: bytes }
    }

    pub const fn is_multicast(&self) -> bool {
        matches!(self.inner[0], 224..240)
    }
}

impl From<core::net::Ipv4Addr> for Ipv4Addr {
    fn from(ip4: core::net::Ipv4Addr) -> Self {
        Self { inner: ip4.octets() }
    }
}

impl From<Ipv4Addr> for core::net::Ipv4Addr {
    fn from(ip4: Ipv4Addr) -> Self {
        Self::from(ip4.inner)
    }
}

impl From<smoltcp::wire::Ipv4Address> for Ipv4Addr {
    fn from(smolip4: smoltcp::wire::Ipv4Address) -> Self {
        let bytes = smolip4.as_bytes();
        Self::from([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl From<Ipv4Addr> for u32 {
    fn from(ip: Ipv4Addr) -> u32 {
        u32::from_be_bytes(ip.bytes())
    }
}

impl From<u32> for Ipv4Addr {
    fn from(val: u32) -> Self {
        Self { inner: val.to_be_bytes() }
    }
}

impl From<[u8; 4]> for Ipv4Addr {
    fn from(bytes: [u8; 4]) -> Self {
        Self { inner: bytes }
    }
}

impl FromStr for Ipv4Addr {
    type Err = ApiError;

    fn from_str(val: &str) -> Result<Self, Self::Err> {
        val.parse::<core::net::Ipv4Addr>().map(Self::from).map_err(|_| {
            ApiError::Malformed { kind: "IPv4 address", val: val.to_string() }
        })
    }
}

impl Display for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.inner[0], self.inner[1], self.inner[2], self.inner[3],
        )
    }
}

// There's no reason to view an Ipv4Addr as its raw array, so just
// present it in a human-friendly manner.
impl Debug for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Ipv4Addr {{ inner: {self} }}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_convert() {
        let ip: Ipv4Addr = "10.0.0.5".parse().unwrap();
        assert_eq!(ip.bytes(), [10, 0, 0, 5]);
        assert_eq!(u32::from(ip), 0x0A00_0005);
        assert_eq!(Ipv4Addr::from(0x0A00_0005u32), ip);
        assert_eq!(ip.to_string(), "10.0.0.5");
        assert!("10.0.0".parse::<Ipv4Addr>().is_err());
        assert!("224.0.0.1".parse::<Ipv4Addr>().unwrap().is_multicast());
    }

    #[test]
    fn serde_dotted_quad() {
        let ip = Ipv4Addr::from_const([10, 0, 0, 5]);
        assert_eq!(serde_json::to_string(&ip).unwrap(), "\"10.0.0.5\"");
        let back: Ipv4Addr = serde_json::from_str("\"10.0.0.5\"").unwrap();
        assert_eq!(back, ip);
        assert!(serde_json::from_str::<Ipv4Addr>("\"10.0.0\"").is_err());
    }
}
