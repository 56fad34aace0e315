// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Integration tests.
//!
//! Each test hands a tenant PACKET_OUT to the devirtualizer and then
//! checks what was sent to the physical switches, what was sent back
//! to the tenant controller, and what was logged.

use common::*;
use ofvisor::engine::addr::AddressMapper;
use ofvisor::engine::resource::ResourceError;
use ofvisor::engine::xid::XidMap;
use ofvisor_test_utils as common;

fn send(h: &Harness, dpid: Dpid, msg: PacketOut) -> Outcome {
    h.dv.devirtualize_packet_out(&h.switch(dpid), msg)
}

/// The rewrites every in-band PACKET_OUT of `data` starts with.
fn rewrites(h: &Harness, src: Ipv4Addr, dst: Ipv4Addr) -> Vec<Action> {
    vec![
        Action::SetNwDst(h.phys_ip(dst)),
        Action::SetNwSrc(h.phys_ip(src)),
    ]
}

#[test]
fn unknown_buffer_id_dropped() {
    let h = Harness::simple();
    let msg = PacketOut::new(7, 99, 1, vec![Action::output(2)], vec![]);

    assert_eq!(
        send(&h, VS1, msg),
        Outcome::Dropped { reason: DropReason::UnknownBuffer(99) }
    );
    assert!(h.log.contains(LogLevel::Error, "unknown buffer id 99"));
    assert!(h.south.is_empty());
    assert!(h.north.is_empty());
}

#[test]
fn short_inline_data_rejected() {
    let h = Harness::simple();
    let data = vec![0u8; ETHER_HDR_LEN];
    let msg =
        PacketOut::new(7, BUFFER_ID_NONE, 1, vec![Action::output(2)], data);

    assert_eq!(
        send(&h, VS1, msg),
        Outcome::Rejected { code: BadRequestCode::BadLen }
    );
    assert!(h.south.is_empty());

    let errs = h.north.errors();
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].xid, 7);
    assert_eq!(errs[0].kind, ErrorKind::BadRequest(BadRequestCode::BadLen));
    assert_eq!(errs[0].data, vec![0u8; ETHER_HDR_LEN]);
    assert_eq!(h.north.sent()[0].1, VS1);
    assert_eq!(h.log.count(LogLevel::Error), 1);
}

#[test]
fn fifteen_bytes_is_enough() {
    let h = Harness::simple();
    let data = opaque_frame(H1_MAC, H2_MAC, ETHER_HDR_LEN + 1);
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(2)],
        data.clone(),
    );

    assert_eq!(send(&h, VS1, msg), Outcome::Forwarded);
    let pos = h.south.packet_outs();
    assert_eq!(pos.len(), 1);

    // Nothing to rewrite in a frame that isn't IP.
    assert_eq!(pos[0].1.actions, vec![Action::output(2)]);
    assert_eq!(pos[0].1.data, data);
}

#[test]
fn edge_to_edge_in_band() {
    let h = Harness::simple();
    let data = h1_to_h2();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(2)],
        data.clone(),
    );

    assert_eq!(send(&h, VS1, msg), Outcome::Forwarded);

    let pos = h.south.packet_outs();
    assert_eq!(pos.len(), 1);
    let (dpid, po) = &pos[0];
    assert_eq!(*dpid, Dpid(1));
    assert_eq!(po.in_port, 1);
    assert_eq!(po.buffer_id, BUFFER_ID_NONE);
    assert_eq!(po.data, data);

    let mut expected = rewrites(&h, H1_IP, H2_IP);
    expected.extend([
        Action::SetNwSrc(H1_IP),
        Action::SetNwDst(H2_IP),
        Action::output(2),
    ]);
    assert_eq!(po.actions, expected);
    assert_eq!(po.actions_len, 40);
    assert_eq!(po.length, 16 + 40 + data.len() as u16);
    assert_ne!(h.phys_ip(H1_IP), H1_IP);
    assert!(h.north.is_empty());
}

#[test]
fn wildcarded_addresses_not_rewritten() {
    let h = Harness::simple();
    let data = opaque_frame(H1_MAC, H2_MAC, 60);
    let msg = PacketOut::new(
        1,
        BUFFER_ID_NONE,
        1,
        vec![Action::SetVlanVid(12), Action::output(2)],
        data,
    );

    assert_eq!(send(&h, VS1, msg), Outcome::Forwarded);
    let po = &h.south.packet_outs()[0].1;
    assert_eq!(po.actions, vec![Action::SetVlanVid(12), Action::output(2)]);
    assert_eq!(po.actions_len, 16);
}

#[test]
fn buffered_packet_adopted() {
    let h = Harness::simple();
    let sw = h.switch(VS1);

    let mut cause = PacketIn::new(h1_to_h2(), 1);
    cause.buffer_id = 0x55;
    let vid = sw.buffers().add(cause);

    let msg = PacketOut::new(3, vid, 1, vec![Action::output(2)], vec![]);
    assert_eq!(h.dv.devirtualize_packet_out(&sw, msg), Outcome::Forwarded);

    let po = &h.south.packet_outs()[0].1;
    assert_eq!(po.buffer_id, 0x55);
    assert!(po.data.is_empty());
    assert_eq!(&po.actions[..2], &rewrites(&h, H1_IP, H2_IP)[..]);

    // The buffer may be referenced again.
    assert!(sw.buffers().get(vid).is_some());
}

#[test]
fn unbuffered_cause_attached() {
    let h = Harness::simple();
    let sw = h.switch(VS1);

    let vid = sw.buffers().add(PacketIn::new(h1_to_h2(), 1));
    let msg = PacketOut::new(3, vid, 1, vec![Action::output(2)], vec![]);
    assert_eq!(h.dv.devirtualize_packet_out(&sw, msg), Outcome::Forwarded);

    let po = &h.south.packet_outs()[0].1;
    assert_eq!(po.buffer_id, BUFFER_ID_NONE);
    assert_eq!(po.data, h1_to_h2());
    assert_eq!(po.length, 16 + 40 + h1_to_h2().len() as u16);
}

#[test]
fn flood_skips_ingress() {
    let h = Harness::simple();
    let data = h1_to_h3();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(OFPP_FLOOD)],
        data.clone(),
    );

    assert_eq!(send(&h, VS1, msg), Outcome::Forwarded);

    // Port 2 is output in band.
    let pos = h.south.packet_outs();
    assert_eq!(pos.len(), 1);
    let mut expected = rewrites(&h, H1_IP, H3_IP);
    expected.extend([
        Action::SetNwSrc(H1_IP),
        Action::SetNwDst(H3_IP),
        Action::output(2),
    ]);
    assert_eq!(pos[0].1.actions, expected);

    // Port 3 leads over the link to vs2, whose controller sees the
    // packet arrive on its end of the link.
    let pis = h.north.packet_ins();
    assert_eq!(pis.len(), 1);
    let (dpid, pi) = &pis[0];
    assert_eq!(*dpid, VS2);
    assert_eq!(pi.in_port, 2);
    assert_eq!(pi.buffer_id, BUFFER_ID_NONE);
    assert_eq!(pi.reason, PacketInReason::NoMatch);
    assert_eq!(pi.data, data);
    assert_eq!(h.north.sent()[0].0, tenant());
}

#[test]
fn all_includes_ingress() {
    let h = Harness::simple();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(OFPP_ALL)],
        h1_to_h3(),
    );

    assert_eq!(send(&h, VS1, msg), Outcome::Forwarded);

    let unrewrite = [Action::SetNwSrc(H1_IP), Action::SetNwDst(H3_IP)];
    let mut expected = rewrites(&h, H1_IP, H3_IP);
    expected.extend(unrewrite.clone());
    expected.push(Action::output(1));
    expected.extend(unrewrite);
    expected.push(Action::output(2));

    let po = &h.south.packet_outs()[0].1;
    assert_eq!(po.actions, expected);
    assert_eq!(h.north.packet_ins().len(), 1);
}

#[test]
fn link_only_is_not_in_band() {
    let h = Harness::simple();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(3)],
        h1_to_h3(),
    );

    assert_eq!(
        send(&h, VS1, msg),
        Outcome::Dropped { reason: DropReason::NotInBand }
    );

    // The out-of-band delivery stands.
    assert_eq!(h.north.packet_ins().len(), 1);
    assert!(h.south.is_empty());
    assert!(h.log.contains(LogLevel::Note, "dropping PACKET_OUT 7"));
}

#[test]
fn reserved_output_port_yields_nothing() {
    let h = Harness::simple();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(OFPP_CONTROLLER)],
        h1_to_h2(),
    );

    assert_eq!(
        send(&h, VS1, msg),
        Outcome::Dropped { reason: DropReason::NotInBand }
    );
    assert!(h.log.contains(LogLevel::Warn, "not supported"));
    assert!(h.south.is_empty());
    assert!(h.north.is_empty());
}

#[test]
fn unknown_in_port_dropped() {
    let h = Harness::simple();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        OFPP_CONTROLLER,
        vec![Action::SetNwTos(4)],
        h1_to_h2(),
    );

    assert_eq!(
        send(&h, VS1, msg),
        Outcome::Dropped { reason: DropReason::UnknownPort(OFPP_CONTROLLER) }
    );
    assert!(h.south.is_empty());
}

#[test]
fn aggregate_member_sent_directly() {
    let h = Harness::aggregate();
    let data = h1_to_h3();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(2)],
        data.clone(),
    );

    // Port 2 sits on physical switch 2, so the packet goes straight
    // there and nothing is left for switch 1.
    assert_eq!(
        send(&h, BIG, msg),
        Outcome::Dropped { reason: DropReason::NotInBand }
    );

    let pos = h.south.packet_outs();
    assert_eq!(pos.len(), 1);
    let (dpid, po) = &pos[0];
    assert_eq!(*dpid, Dpid(2));
    assert_eq!(po.xid, 0);
    assert_eq!(po.in_port, 3);
    assert_eq!(po.actions, vec![Action::output(1)]);
    assert_eq!(po.data, data);
    assert!(h.log.contains(LogLevel::Note, "sent straight to"));
}

#[test]
fn aggregate_all() {
    let h = Harness::aggregate();
    let data = h1_to_h3();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(OFPP_ALL)],
        data.clone(),
    );

    assert_eq!(send(&h, BIG, msg), Outcome::Forwarded);

    // Port 2 first, out of band, then the rest in band on switch 1.
    let pos = h.south.packet_outs();
    assert_eq!(pos.len(), 2);
    assert_eq!(pos[0].0, Dpid(2));
    assert_eq!(pos[0].1.actions, vec![Action::output(1)]);

    let unrewrite = [Action::SetNwSrc(H1_IP), Action::SetNwDst(H3_IP)];
    let mut expected = rewrites(&h, H1_IP, H3_IP);
    expected.extend(unrewrite.clone());
    expected.push(Action::output(1));
    expected.extend(unrewrite);
    expected.push(Action::output(2));
    assert_eq!(pos[1].0, Dpid(1));
    assert_eq!(pos[1].1.in_port, 1);
    assert_eq!(pos[1].1.actions, expected);

    // Port 3 is attached to the link to vs4.
    let pis = h.north.packet_ins();
    assert_eq!(pis.len(), 1);
    assert_eq!(pis[0].0, VS4);
    assert_eq!(pis[0].1.in_port, 2);
}

#[test]
fn enqueue_denied() {
    let h = Harness::simple();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::Enqueue { port: 2, queue_id: 1 }],
        h1_to_h2(),
    );

    assert_eq!(
        send(&h, VS1, msg),
        Outcome::Denied { reason: DenyReason::Queue { port: 2, queue_id: 1 } }
    );

    let errs = h.north.errors();
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].xid, 7);
    assert_eq!(errs[0].kind, ErrorKind::BadAction(BadActionCode::BadQueue));
    assert!(h.south.is_empty());
    assert_eq!(h.log.count(LogLevel::Warn), 1);
}

#[test]
fn foreign_mac_denied() {
    let h = Harness::simple();
    let foreign = MacAddr::from_const([0x02, 0, 0, 0, 0, 9]);
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::SetDlDst(foreign), Action::output(2)],
        h1_to_h2(),
    );

    assert_eq!(
        send(&h, VS1, msg),
        Outcome::Denied { reason: DenyReason::ForeignMac(foreign) }
    );
    assert_eq!(
        h.north.errors()[0].kind,
        ErrorKind::BadAction(BadActionCode::BadArgument)
    );
    assert!(h.south.is_empty());
}

#[test]
fn host_mac_and_ip_rewrites_allowed() {
    let h = Harness::simple();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![
            Action::SetDlDst(H3_MAC),
            Action::SetNwDst(H3_IP),
            Action::output(2),
        ],
        h1_to_h2(),
    );

    assert_eq!(send(&h, VS1, msg), Outcome::Forwarded);
    let po = &h.south.packet_outs()[0].1;
    assert_eq!(po.actions[2], Action::SetDlDst(H3_MAC));
    assert_eq!(po.actions[3], Action::SetNwDst(h.phys_ip(H3_IP)));
}

#[test]
fn failure_aborts_whole_message() {
    let h = Harness::simple();
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(2), Action::Enqueue { port: 2, queue_id: 0 }],
        h1_to_h2(),
    );

    assert!(matches!(send(&h, VS1, msg), Outcome::Denied { .. }));
    assert!(h.south.is_empty());
}

#[test]
fn xid_translated_per_connection() {
    let mut h = Harness::simple();
    let xids = Arc::new(XidMap::new(h.cfg.xid_window));
    h.dv = h.dv.with_xids(xids.clone());

    for _ in 0..2 {
        let msg = PacketOut::new(
            42,
            BUFFER_ID_NONE,
            1,
            vec![Action::output(2)],
            h1_to_h2(),
        );
        assert_eq!(send(&h, VS1, msg), Outcome::Forwarded);
    }

    let pos = h.south.packet_outs();
    let (a, b) = (pos[0].1.xid, pos[1].1.xid);
    assert_ne!(a, b);
    assert_eq!(xids.untranslate(Dpid(1), a), Some((42, VS1)));
    assert_eq!(xids.untranslate(Dpid(1), b), Some((42, VS1)));
}

#[test]
fn unknown_tenant_dropped() {
    let h = Harness::simple();
    h.dv.map().remove(tenant());
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(2)],
        h1_to_h2(),
    );

    assert_eq!(
        send(&h, VS1, msg),
        Outcome::Dropped { reason: DropReason::UnknownTenant(tenant()) }
    );
    assert!(h.log.contains(LogLevel::Warn, "no such tenant"));
}

/// A mapper with no physical addresses left.
struct NoAddrs;

impl AddressMapper for NoAddrs {
    fn physical_ip(
        &self,
        _tenant: TenantId,
        _ip: Ipv4Addr,
    ) -> Result<Ipv4Addr, ResourceError> {
        Err(ResourceError::Exhausted)
    }

    fn virtual_ip(&self, _phys: Ipv4Addr) -> Option<(TenantId, Ipv4Addr)> {
        None
    }
}

#[test]
fn physical_addresses_exhausted() {
    let mut h = Harness::simple();
    h.dv = h.dv.with_addrs(Arc::new(NoAddrs));
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::output(2)],
        h1_to_h2(),
    );

    assert_eq!(
        send(&h, VS1, msg),
        Outcome::Dropped { reason: DropReason::AddrsExhausted }
    );
    assert!(h.log.contains(LogLevel::Error, "resource exhausted"));
    assert!(h.south.is_empty());
}

#[test]
fn tenant_ip_rewrite_needs_address() {
    let mut h = Harness::simple();
    h.dv = h.dv.with_addrs(Arc::new(NoAddrs));
    let msg = PacketOut::new(
        7,
        BUFFER_ID_NONE,
        1,
        vec![Action::SetNwDst(H3_IP), Action::output(2)],
        opaque_frame(H1_MAC, H2_MAC, 60),
    );

    assert_eq!(
        send(&h, VS1, msg),
        Outcome::Dropped { reason: DropReason::AddrsExhausted }
    );
    assert!(h.log.contains(LogLevel::Error, "no physical address for"));
}
