// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Identifiers for tenants, links, flows, switches and ports.

use super::ApiError;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// A tenant of the hypervisor.
///
/// Only the low 24 bits are usable, as the tenant id travels inside
/// the link tag written into packet headers.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct TenantId(u32);

impl TenantId {
    pub const MAX: u32 = (1 << 24) - 1;

    pub fn new(val: u32) -> Result<Self, ApiError> {
        if val > Self::MAX {
            return Err(ApiError::TenantOutOfRange(val));
        }

        Ok(Self(val))
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for TenantId {
    type Error = ApiError;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        Self::new(val)
    }
}

impl From<TenantId> for u32 {
    fn from(id: TenantId) -> u32 {
        id.0
    }
}

impl Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tenant-scoped virtual link identifier.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct LinkId(u16);

impl LinkId {
    pub const fn new(val: u16) -> Self {
        Self(val)
    }

    pub const fn value(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u32> for LinkId {
    type Error = ApiError;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        u16::try_from(val).map(Self).map_err(|_| ApiError::LinkOutOfRange(val))
    }
}

impl Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one (source, destination) MAC pair of a tenant while it
/// is multiplexed over a virtual link.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct FlowId(u32);

impl FlowId {
    pub const fn new(val: u32) -> Self {
        Self(val)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An OpenFlow datapath id; names both physical and virtual switches.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Dpid(pub u64);

impl Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// A port on a physical switch.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct PhysPort {
    pub dpid: Dpid,
    pub port: u16,
}

impl PhysPort {
    pub const fn new(dpid: u64, port: u16) -> Self {
        Self { dpid: Dpid(dpid), port }
    }
}

impl Display for PhysPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.dpid, self.port)
    }
}

/// A port on a virtual switch.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct VirtPort {
    pub dpid: Dpid,
    pub port: u16,
}

impl VirtPort {
    pub const fn new(dpid: u64, port: u16) -> Self {
        Self { dpid: Dpid(dpid), port }
    }
}

impl Display for VirtPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}/{}", self.dpid, self.port)
    }
}
