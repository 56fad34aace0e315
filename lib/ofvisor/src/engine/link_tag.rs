// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Tagging of tenant traffic as it crosses a virtual link.
//!
//! Many tenants, and many flows of one tenant, share the physical
//! path beneath a virtual link. While on that path a packet carries a
//! [`LinkTag`] in its Ethernet addresses, which lets the switches
//! along the path and the far endpoint tell the traffic apart:
//!
//! ```text
//! dl_src = 02 | tenant[23:0] | link[15:0]
//! dl_dst = 02 | 00           | flow[31:0]
//! ```
//!
//! The leading octet marks a locally administered unicast address.
//! The tenant's own addresses are restored when the packet leaves
//! the link.

use super::flow_id::MacPair;
use super::flow_match::FlowMatch;
use super::flow_match::Wildcards;
use super::ofp::Action;
use crate::api::ApiError;
use crate::api::FlowId;
use crate::api::LinkId;
use crate::api::MacAddr;
use crate::api::TenantId;
use core::fmt;
use core::fmt::Display;
use thiserror::Error;

/// The first octet of both tagged addresses.
pub const LINK_TAG_MARKER: u8 = 0x02;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum LinkTagError {
    #[error("{0} does not carry a link tag")]
    NotTagged(MacAddr),

    #[error("reserved bits set in {0}")]
    Reserved(MacAddr),

    #[error("bad tenant in link tag: {0}")]
    Tenant(#[from] ApiError),

    #[error("actions do not set both Ethernet addresses")]
    Incomplete,
}

/// The (tenant, link, flow) triple carried by a packet on a virtual
/// link.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LinkTag {
    pub tenant: TenantId,
    pub link: LinkId,
    pub flow: FlowId,
}

impl LinkTag {
    pub fn new(tenant: TenantId, link: LinkId, flow: FlowId) -> Self {
        Self { tenant, link, flow }
    }

    /// The (source, destination) addresses carrying this tag.
    pub fn encode(&self) -> MacPair {
        let src = (u64::from(LINK_TAG_MARKER) << 40)
            | (u64::from(self.tenant.value()) << 16)
            | u64::from(self.link.value());
        let dst = (u64::from(LINK_TAG_MARKER) << 40)
            | u64::from(self.flow.value());
        MacPair::new(MacAddr::from_u64(src), MacAddr::from_u64(dst))
    }

    /// Recover the tag from a tagged address pair.
    pub fn decode(src: MacAddr, dst: MacAddr) -> Result<Self, LinkTagError> {
        for mac in [src, dst] {
            if mac.bytes()[0] != LINK_TAG_MARKER {
                return Err(LinkTagError::NotTagged(mac));
            }
        }

        if dst.bytes()[1] != 0 {
            return Err(LinkTagError::Reserved(dst));
        }

        let src = src.to_u64();
        let tenant = TenantId::new(((src >> 16) & 0xff_ffff) as u32)?;
        let link = LinkId::new((src & 0xffff) as u16);
        let flow = FlowId::new((dst.to_u64() & 0xffff_ffff) as u32);
        Ok(Self { tenant, link, flow })
    }

    /// Recover the tag from the last Ethernet address rewrites in
    /// `actions`.
    pub fn from_actions(actions: &[Action]) -> Result<Self, LinkTagError> {
        let mut src = None;
        let mut dst = None;
        for act in actions {
            match act {
                Action::SetDlSrc(mac) => src = Some(*mac),
                Action::SetDlDst(mac) => dst = Some(*mac),
                _ => {}
            }
        }

        match (src, dst) {
            (Some(src), Some(dst)) => Self::decode(src, dst),
            _ => Err(LinkTagError::Incomplete),
        }
    }

    /// The rewrites that tag a packet as it enters the link.
    pub fn set_link_fields(&self) -> Vec<Action> {
        let pair = self.encode();
        vec![Action::SetDlSrc(pair.src), Action::SetDlDst(pair.dst)]
    }

    /// The rewrites that restore the tenant's addresses `orig` as the
    /// packet leaves a link.
    pub fn unset_link_fields(orig: &MacPair) -> Vec<Action> {
        vec![Action::SetDlSrc(orig.src), Action::SetDlDst(orig.dst)]
    }

    /// Narrow `m` to packets carrying this tag.
    pub fn tag_match(&self, m: &mut FlowMatch) {
        let pair = self.encode();
        m.dl_src = pair.src;
        m.dl_dst = pair.dst;
        m.wildcards.remove(Wildcards::DL_SRC | Wildcards::DL_DST);
    }
}

impl Display for LinkTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant, self.link, self.flow)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tag(tenant: u32, link: u16, flow: u32) -> LinkTag {
        LinkTag::new(
            TenantId::new(tenant).unwrap(),
            LinkId::new(link),
            FlowId::new(flow),
        )
    }

    #[test]
    fn layout() {
        let pair = tag(0x0a0b0c, 0x0102, 0xdeadbeef).encode();
        assert_eq!(pair.src.bytes(), [0x02, 0x0a, 0x0b, 0x0c, 0x01, 0x02]);
        assert_eq!(pair.dst.bytes(), [0x02, 0x00, 0xde, 0xad, 0xbe, 0xef]);
        assert!(!pair.src.is_multicast());
        assert!(!pair.dst.is_multicast());
    }

    #[test]
    fn round_trip_extremes() {
        for t in [
            tag(0, 0, 0),
            tag(1, 1, 1),
            tag(TenantId::MAX, u16::MAX, u32::MAX),
            tag(0x123456, 0x8000, 0x8000_0001),
        ] {
            let pair = t.encode();
            assert_eq!(LinkTag::decode(pair.src, pair.dst), Ok(t));
            assert_eq!(LinkTag::from_actions(&t.set_link_fields()), Ok(t));
        }
    }

    #[test]
    fn round_trip_field_bounds() {
        for tenant in [0, TenantId::MAX] {
            for link in [0, u16::MAX] {
                for flow in [1, u32::MAX] {
                    let t = tag(tenant, link, flow);
                    let pair = t.encode();
                    assert_eq!(LinkTag::decode(pair.src, pair.dst), Ok(t));
                    assert_eq!(pair.src.bytes()[0], LINK_TAG_MARKER);
                    assert_eq!(pair.dst.bytes()[..2], [LINK_TAG_MARKER, 0]);
                }
            }
        }
    }

    #[test]
    fn decode_rejects_untagged() {
        let host: MacAddr = "a8:40:25:00:00:01".parse().unwrap();
        let pair = tag(1, 2, 3).encode();
        assert_eq!(
            LinkTag::decode(host, pair.dst),
            Err(LinkTagError::NotTagged(host))
        );

        let reserved = MacAddr::from([0x02, 0x01, 0, 0, 0, 3]);
        assert_eq!(
            LinkTag::decode(pair.src, reserved),
            Err(LinkTagError::Reserved(reserved))
        );
    }

    #[test]
    fn from_actions_needs_both() {
        let acts = vec![Action::SetDlSrc(tag(1, 2, 3).encode().src)];
        assert_eq!(LinkTag::from_actions(&acts), Err(LinkTagError::Incomplete));
    }

    #[test]
    fn unset_restores_original() {
        let orig = MacPair::new(
            "a8:40:25:00:00:01".parse().unwrap(),
            "a8:40:25:00:00:02".parse().unwrap(),
        );
        assert_eq!(
            LinkTag::unset_link_fields(&orig),
            vec![Action::SetDlSrc(orig.src), Action::SetDlDst(orig.dst)]
        );
    }

    #[test]
    fn tag_match_sets_exact_macs() {
        let t = tag(7, 1, 9);
        let mut m = FlowMatch::default();
        t.tag_match(&mut m);
        assert_eq!(LinkTag::decode(m.dl_src, m.dl_dst), Ok(t));
        assert!(!m.wildcards.contains(Wildcards::DL_SRC));
        assert!(!m.wildcards.contains(Wildcards::DL_DST));
    }
}
