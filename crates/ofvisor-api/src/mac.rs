// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use super::ApiError;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::ops::Deref;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// A MAC address.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Hash,
)]
pub struct MacAddr {
    inner: [u8; 6],
}

impl MacAddr {
    pub const BROADCAST: Self = Self { inner: [0xFF; 6] };
    pub const ZERO: Self = Self { inner: [0x00; 6] };

    /// Return the bytes of the MAC address.
    #[inline]
    pub fn bytes(&self) -> [u8; 6] {
        self.inner
    }

    pub const fn from_const(bytes: [u8; 6]) -> Self {
        Self { inner: bytes }
    }

    /// Build a MAC from the low 48 bits of `val`, most significant
    /// octet first.
    pub const fn from_u64(val: u64) -> Self {
        let b = val.to_be_bytes();
        Self { inner: [b[2], b[3], b[4], b[5], b[6], b[7]] }
    }

    pub const fn to_u64(&self) -> u64 {
        let b = self.inner;
        u64::from_be_bytes([0, 0, b[0], b[1], b[2], b[3], b[4], b[5]])
    }

    pub const fn is_multicast(&self) -> bool {
        self.inner[0] & 0x01 != 0
    }
}

impl From<smoltcp::wire::EthernetAddress> for MacAddr {
    fn from(addr: smoltcp::wire::EthernetAddress) -> Self {
        Self { inner: addr.0 }
    }
}

impl From<MacAddr> for smoltcp::wire::EthernetAddress {
    fn from(addr: MacAddr) -> Self {
        Self(addr.bytes())
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        Self { inner: bytes }
    }
}

impl From<&[u8; 6]> for MacAddr {
    fn from(bytes: &[u8; 6]) -> Self {
        Self { inner: *bytes }
    }
}

impl AsRef<[u8]> for MacAddr {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl Deref for MacAddr {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FromStr for MacAddr {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed =
            || ApiError::Malformed { kind: "MAC address", val: s.to_string() };

        let octets = s
            .split(':')
            .map(|o| u8::from_str_radix(o, 16).map_err(|_| malformed()))
            .collect::<Result<Vec<u8>, _>>()?;

        let inner: [u8; 6] = octets.try_into().map_err(|_| malformed())?;
        Ok(MacAddr { inner })
    }
}

impl Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.inner[0],
            self.inner[1],
            self.inner[2],
            self.inner[3],
            self.inner[4],
            self.inner[5]
        )
    }
}

// There's no reason to view the MAC address as its raw array, so just
// present it in a human-friendly manner.
impl Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MacAddr {{ inner: {self} }}")
    }
}
