// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Tenant topologies shared by the integration tests.
//!
//! Every topology belongs to tenant 1, whose three hosts are
//! [`H1_MAC`]/[`H1_IP`] through [`H3_MAC`]/[`H3_IP`].
//!
//! The simple topology: two single-switch virtual switches joined by
//! a virtual link that crosses physical switch 3.
//!
//! ```text
//!   vs1 (phys 1)                         vs2 (phys 2)
//!   1 edge 1/1 --- H1                    1 edge 2/1 --- H3
//!   2 edge 1/2 --- H2
//!   3 link 1/3 -- 3/1 [phys 3] 3/2 -- 2/2 link 2
//! ```
//!
//! The aggregate topology: one virtual switch over physical switches
//! 1, 2 and 3, linked to a simple switch on physical switch 4.
//!
//! ```text
//!   big (phys 1, 2, 3)                   vs4 (phys 4)
//!   1 edge 1/1                           1 edge 4/1
//!   2 edge 2/1                           2 link 4/2
//!   3 link 2/5 ----------------------------- 4/2
//!   4 edge 1/2
//! ```
//!
//! Routes within `big`: 1<->2 and 1<->3 go 1/3 -> 3/1, 3/2 -> 2/3 (and
//! back); 4->2 leaves by its own ingress port, 1/2 -> 2/4.

use super::*;
use ofvisor::engine::route::PhysLink;
use ofvisor::engine::route::PhysPath;
use ofvisor::engine::switch::PortKind;
use ofvisor::engine::switch::SwitchBuilder;

pub const H1_MAC: MacAddr = MacAddr::from_const([0xA8, 0x40, 0x25, 0, 0, 1]);
pub const H2_MAC: MacAddr = MacAddr::from_const([0xA8, 0x40, 0x25, 0, 0, 2]);
pub const H3_MAC: MacAddr = MacAddr::from_const([0xA8, 0x40, 0x25, 0, 0, 3]);
pub const H1_IP: Ipv4Addr = Ipv4Addr::from_const([192, 168, 0, 1]);
pub const H2_IP: Ipv4Addr = Ipv4Addr::from_const([192, 168, 0, 2]);
pub const H3_IP: Ipv4Addr = Ipv4Addr::from_const([192, 168, 0, 3]);

pub const VS1: Dpid = Dpid(0x0100);
pub const VS2: Dpid = Dpid(0x0200);
pub const BIG: Dpid = Dpid(0x0300);
pub const VS4: Dpid = Dpid(0x0400);

pub fn tenant() -> TenantId {
    TenantId::new(1).unwrap()
}

pub fn phys(dpid: u64, port: u16) -> PhysPort {
    PhysPort::new(dpid, port)
}

/// A path through the given hops, each `((dpid, port), (dpid, port))`.
pub fn path(hops: &[((u64, u16), (u64, u16))]) -> PhysPath {
    let links = hops
        .iter()
        .map(|(a, b)| PhysLink::new(phys(a.0, a.1), phys(b.0, b.1)))
        .collect();
    PhysPath::new(links).unwrap()
}

/// A UDP frame from H1 to H3.
pub fn h1_to_h3() -> Vec<u8> {
    udp_frame(H1_MAC, H3_MAC, H1_IP, H3_IP, 5353, 7777, b"ofvisor")
}

/// A UDP frame from H1 to H2.
pub fn h1_to_h2() -> Vec<u8> {
    udp_frame(H1_MAC, H2_MAC, H1_IP, H2_IP, 5353, 7777, b"ofvisor")
}

fn add_hosts(net: &VirtualNetwork) {
    for mac in [H1_MAC, H2_MAC, H3_MAC] {
        net.add_host(mac);
    }
}

impl Harness {
    /// A harness over the simple topology.
    pub fn simple() -> Self {
        let h = Self::new(HvCfg::default());
        add_hosts(&h.net);

        let mut vs1 = SwitchBuilder::simple(tenant(), VS1, Dpid(1));
        vs1.add_port(1, phys(1, 1), PortKind::Edge)
            .unwrap()
            .add_port(2, phys(1, 2), PortKind::Edge)
            .unwrap()
            .add_port(3, phys(1, 3), PortKind::Link)
            .unwrap();
        h.net.add_switch(vs1.create(&h.cfg));

        let mut vs2 = SwitchBuilder::simple(tenant(), VS2, Dpid(2));
        vs2.add_port(1, phys(2, 1), PortKind::Edge)
            .unwrap()
            .add_port(2, phys(2, 2), PortKind::Link)
            .unwrap();
        h.net.add_switch(vs2.create(&h.cfg));

        let a = VirtPort { dpid: VS1, port: 3 };
        let b = VirtPort { dpid: VS2, port: 2 };
        h.net
            .add_link(
                LinkId::new(1),
                a,
                b,
                path(&[((1, 3), (3, 1)), ((3, 2), (2, 2))]),
            )
            .unwrap();
        h.net
            .add_link(
                LinkId::new(1),
                b,
                a,
                path(&[((2, 2), (3, 2)), ((3, 1), (1, 3))]),
            )
            .unwrap();
        h
    }

    /// A harness over the aggregate topology.
    pub fn aggregate() -> Self {
        Self::aggregate_with(HvCfg::default())
    }

    pub fn aggregate_with(cfg: HvCfg) -> Self {
        let h = Self::new(cfg);
        add_hosts(&h.net);

        let via_3 = || path(&[((1, 3), (3, 1)), ((3, 2), (2, 3))]);
        let back_3 = || path(&[((2, 3), (3, 2)), ((3, 1), (1, 3))]);

        let mut big =
            SwitchBuilder::aggregate(tenant(), BIG, [Dpid(1), Dpid(2), Dpid(3)]);
        big.add_port(1, phys(1, 1), PortKind::Edge)
            .unwrap()
            .add_port(2, phys(2, 1), PortKind::Edge)
            .unwrap()
            .add_port(3, phys(2, 5), PortKind::Link)
            .unwrap()
            .add_port(4, phys(1, 2), PortKind::Edge)
            .unwrap();
        big.add_route(1, 2, via_3())
            .unwrap()
            .add_route(2, 1, back_3())
            .unwrap()
            .add_route(1, 3, via_3())
            .unwrap()
            .add_route(3, 1, back_3())
            .unwrap()
            .add_route(4, 2, path(&[((1, 2), (2, 4))]))
            .unwrap();
        h.net.add_switch(big.create(&h.cfg));

        let mut vs4 = SwitchBuilder::simple(tenant(), VS4, Dpid(4));
        vs4.add_port(1, phys(4, 1), PortKind::Edge)
            .unwrap()
            .add_port(2, phys(4, 2), PortKind::Link)
            .unwrap();
        h.net.add_switch(vs4.create(&h.cfg));

        let a = VirtPort { dpid: BIG, port: 3 };
        let b = VirtPort { dpid: VS4, port: 2 };
        h.net
            .add_link(LinkId::new(2), a, b, path(&[((2, 5), (4, 2))]))
            .unwrap();
        h.net
            .add_link(LinkId::new(2), b, a, path(&[((4, 2), (2, 5))]))
            .unwrap();
        h
    }
}
