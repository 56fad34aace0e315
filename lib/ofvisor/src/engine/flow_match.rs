// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! OpenFlow 1.0 matches, and the context a match is virtualized in.

use crate::api::Ipv4Addr;
use crate::api::MacAddr;
use bitflags::bitflags;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use smoltcp::wire::ArpPacket;
use smoltcp::wire::EthernetFrame;
use smoltcp::wire::Icmpv4Packet;
use smoltcp::wire::IpProtocol;
use smoltcp::wire::Ipv4Packet;
use smoltcp::wire::TcpPacket;
use smoltcp::wire::UdpPacket;

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_ARP: u16 = 0x0806;
pub const ETHER_TYPE_VLAN: u16 = 0x8100;

/// The `dl_vlan` value of an untagged frame.
pub const VLAN_NONE: u16 = 0xffff;

const NW_SRC_SHIFT: u32 = 8;
const NW_DST_SHIFT: u32 = 14;

bitflags! {
    /// Fields of a [`FlowMatch`] which are ignored when matching.
    ///
    /// The network address fields are not single bits: each is a
    /// 6-bit count of low-order address bits to ignore, and any
    /// count of 32 or more wildcards the whole address.
    #[derive(
        Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq,
        Serialize,
    )]
    pub struct Wildcards: u32 {
        const IN_PORT = 1 << 0;
        const DL_VLAN = 1 << 1;
        const DL_SRC = 1 << 2;
        const DL_DST = 1 << 3;
        const DL_TYPE = 1 << 4;
        const NW_PROTO = 1 << 5;
        const TP_SRC = 1 << 6;
        const TP_DST = 1 << 7;
        const NW_SRC_MASK = 0x3f << NW_SRC_SHIFT;
        const NW_SRC_ALL = 32 << NW_SRC_SHIFT;
        const NW_DST_MASK = 0x3f << NW_DST_SHIFT;
        const NW_DST_ALL = 32 << NW_DST_SHIFT;
        const DL_VLAN_PCP = 1 << 20;
        const NW_TOS = 1 << 21;
        const ALL = (1 << 22) - 1;
    }
}

impl Wildcards {
    /// Number of low-order `nw_src` bits ignored.
    pub const fn nw_src_bits(&self) -> u32 {
        (self.bits() & Self::NW_SRC_MASK.bits()) >> NW_SRC_SHIFT
    }

    /// Number of low-order `nw_dst` bits ignored.
    pub const fn nw_dst_bits(&self) -> u32 {
        (self.bits() & Self::NW_DST_MASK.bits()) >> NW_DST_SHIFT
    }

    pub const fn is_nw_src_wildcarded(&self) -> bool {
        self.nw_src_bits() >= 32
    }

    pub const fn is_nw_dst_wildcarded(&self) -> bool {
        self.nw_dst_bits() >= 32
    }

    /// Set the number of ignored `nw_src` bits, saturating at 32.
    pub fn set_nw_src_bits(&mut self, bits: u32) {
        let bits = bits.min(32) << NW_SRC_SHIFT;
        *self = Self::from_bits_retain(
            (self.bits() & !Self::NW_SRC_MASK.bits()) | bits,
        );
    }

    /// Set the number of ignored `nw_dst` bits, saturating at 32.
    pub fn set_nw_dst_bits(&mut self, bits: u32) {
        let bits = bits.min(32) << NW_DST_SHIFT;
        *self = Self::from_bits_retain(
            (self.bits() & !Self::NW_DST_MASK.bits()) | bits,
        );
    }
}

/// An OpenFlow 1.0 match.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FlowMatch {
    pub wildcards: Wildcards,
    pub in_port: u16,
    pub dl_src: MacAddr,
    pub dl_dst: MacAddr,
    pub dl_vlan: u16,
    pub dl_vlan_pcp: u8,
    pub dl_type: u16,
    pub nw_tos: u8,
    pub nw_proto: u8,
    pub nw_src: Ipv4Addr,
    pub nw_dst: Ipv4Addr,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl Default for FlowMatch {
    /// Match everything.
    fn default() -> Self {
        Self {
            wildcards: Wildcards::ALL,
            in_port: 0,
            dl_src: MacAddr::ZERO,
            dl_dst: MacAddr::ZERO,
            dl_vlan: 0,
            dl_vlan_pcp: 0,
            dl_type: 0,
            nw_tos: 0,
            nw_proto: 0,
            nw_src: Ipv4Addr::ANY_ADDR,
            nw_dst: Ipv4Addr::ANY_ADDR,
            tp_src: 0,
            tp_dst: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// The frame is too short to hold an Ethernet header.
    Truncated,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated Ethernet frame"),
        }
    }
}

impl FlowMatch {
    /// Build the exact match describing `pkt` as it arrived on
    /// `in_port`.
    ///
    /// Only the Ethernet header is required. Any header past it that
    /// is absent or can't be parsed leaves its fields wildcarded.
    pub fn from_packet(pkt: &[u8], in_port: u16) -> Result<Self, ParseError> {
        let eth =
            EthernetFrame::new_checked(pkt).map_err(|_| ParseError::Truncated)?;

        let mut m = Self {
            wildcards: Wildcards::NW_TOS
                | Wildcards::NW_PROTO
                | Wildcards::NW_SRC_ALL
                | Wildcards::NW_DST_ALL
                | Wildcards::TP_SRC
                | Wildcards::TP_DST,
            in_port,
            dl_src: MacAddr::from(eth.src_addr()),
            dl_dst: MacAddr::from(eth.dst_addr()),
            dl_vlan: VLAN_NONE,
            ..Default::default()
        };

        let mut ether_type = u16::from(eth.ethertype());
        let mut payload = eth.payload();

        if ether_type == ETHER_TYPE_VLAN {
            if payload.len() < 4 {
                m.wildcards |= Wildcards::DL_TYPE;
                return Ok(m);
            }

            let tci = u16::from_be_bytes([payload[0], payload[1]]);
            m.dl_vlan = tci & 0x0fff;
            m.dl_vlan_pcp = (tci >> 13) as u8;
            ether_type = u16::from_be_bytes([payload[2], payload[3]]);
            payload = &payload[4..];
        }

        m.dl_type = ether_type;

        match ether_type {
            ETHER_TYPE_IPV4 => m.load_ipv4(payload),
            ETHER_TYPE_ARP => m.load_arp(payload),
            _ => {}
        }

        Ok(m)
    }

    fn load_ipv4(&mut self, payload: &[u8]) {
        let Ok(ip) = Ipv4Packet::new_checked(payload) else {
            return;
        };

        self.nw_src = Ipv4Addr::from(ip.src_addr());
        self.nw_dst = Ipv4Addr::from(ip.dst_addr());
        self.nw_tos = ip.dscp() << 2;
        self.nw_proto = u8::from(ip.next_header());
        self.wildcards.remove(Wildcards::NW_TOS | Wildcards::NW_PROTO);
        self.wildcards.set_nw_src_bits(0);
        self.wildcards.set_nw_dst_bits(0);

        // Only the first fragment carries the transport header.
        if ip.frag_offset() != 0 {
            return;
        }

        let ports = match ip.next_header() {
            IpProtocol::Tcp => TcpPacket::new_checked(ip.payload())
                .ok()
                .map(|tcp| (tcp.src_port(), tcp.dst_port())),
            IpProtocol::Udp => UdpPacket::new_checked(ip.payload())
                .ok()
                .map(|udp| (udp.src_port(), udp.dst_port())),
            IpProtocol::Icmp => {
                Icmpv4Packet::new_checked(ip.payload()).ok().map(|icmp| {
                    let ty = u8::from(icmp.msg_type());
                    (u16::from(ty), u16::from(icmp.msg_code()))
                })
            }
            _ => None,
        };

        if let Some((src, dst)) = ports {
            self.tp_src = src;
            self.tp_dst = dst;
            self.wildcards.remove(Wildcards::TP_SRC | Wildcards::TP_DST);
        }
    }

    fn load_arp(&mut self, payload: &[u8]) {
        let Ok(arp) = ArpPacket::new_checked(payload) else {
            return;
        };

        let spa = arp.source_protocol_addr();
        let tpa = arp.target_protocol_addr();
        if spa.len() != 4 || tpa.len() != 4 {
            return;
        }

        // The low byte of the ARP opcode is matched as nw_proto.
        self.nw_proto = (u16::from(arp.operation()) & 0xff) as u8;
        self.nw_src = Ipv4Addr::from([spa[0], spa[1], spa[2], spa[3]]);
        self.nw_dst = Ipv4Addr::from([tpa[0], tpa[1], tpa[2], tpa[3]]);
        self.wildcards.remove(Wildcards::NW_PROTO);
        self.wildcards.set_nw_src_bits(0);
        self.wildcards.set_nw_dst_bits(0);
    }

    pub fn is_nw_src_exact(&self) -> bool {
        self.wildcards.nw_src_bits() == 0
    }

    pub fn is_nw_dst_exact(&self) -> bool {
        self.wildcards.nw_dst_bits() == 0
    }
}

impl Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let wc = self.wildcards;
        write!(f, "in_port={}", self.in_port)?;
        if !wc.contains(Wildcards::DL_SRC) {
            write!(f, ",dl_src={}", self.dl_src)?;
        }
        if !wc.contains(Wildcards::DL_DST) {
            write!(f, ",dl_dst={}", self.dl_dst)?;
        }
        if !wc.contains(Wildcards::DL_TYPE) {
            write!(f, ",dl_type=0x{:04x}", self.dl_type)?;
        }
        if !wc.is_nw_src_wildcarded() {
            write!(f, ",nw_src={}/{}", self.nw_src, 32 - wc.nw_src_bits())?;
        }
        if !wc.is_nw_dst_wildcarded() {
            write!(f, ",nw_dst={}/{}", self.nw_dst, 32 - wc.nw_dst_bits())?;
        }
        if !wc.contains(Wildcards::TP_SRC) {
            write!(f, ",tp_src={}", self.tp_src)?;
        }
        if !wc.contains(Wildcards::TP_DST) {
            write!(f, ",tp_dst={}", self.tp_dst)?;
        }
        Ok(())
    }
}

/// What a [`VirtMatch`] is being virtualized for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MatchCtx {
    /// A persistent rule, identified by its cookie in the virtual
    /// switch's flow table.
    FlowMod { cookie: u64 },

    /// A one-shot send of the given packet.
    PacketOut { data: Vec<u8> },
}

/// A tenant-visible match plus the context it is evaluated in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VirtMatch {
    pub fmatch: FlowMatch,
    pub ctx: MatchCtx,
}

impl VirtMatch {
    pub fn flow_mod(fmatch: FlowMatch, cookie: u64) -> Self {
        Self { fmatch, ctx: MatchCtx::FlowMod { cookie } }
    }

    pub fn packet_out(fmatch: FlowMatch, data: Vec<u8>) -> Self {
        Self { fmatch, ctx: MatchCtx::PacketOut { data } }
    }

    pub fn in_port(&self) -> u16 {
        self.fmatch.in_port
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn eth(ether_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut pkt = vec![
            0xa8, 0x40, 0x25, 0x00, 0x00, 0x02, // dst
            0xa8, 0x40, 0x25, 0x00, 0x00, 0x01, // src
        ];
        pkt.extend_from_slice(&ether_type.to_be_bytes());
        pkt.extend_from_slice(payload);
        pkt
    }

    fn ipv4_udp() -> Vec<u8> {
        let mut ip = vec![
            0x45, 0xb8, 0x00, 0x1c, // ver/ihl, tos (dscp 46), total len 28
            0x00, 0x00, 0x00, 0x00, // id, flags/frag
            0x40, 0x11, 0x00, 0x00, // ttl, proto udp, checksum
            10, 0, 0, 1, // src
            10, 0, 0, 2, // dst
        ];
        ip.extend_from_slice(&[0x04, 0xd2, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00]);
        ip
    }

    #[test]
    fn nw_bits() {
        let mut wc = Wildcards::ALL;
        assert!(wc.is_nw_src_wildcarded());
        assert!(wc.is_nw_dst_wildcarded());
        assert_eq!(wc.nw_src_bits(), 63);

        wc.set_nw_src_bits(0);
        assert!(!wc.is_nw_src_wildcarded());
        assert!(wc.is_nw_dst_wildcarded());
        assert!(wc.contains(Wildcards::NW_TOS));

        wc.set_nw_dst_bits(8);
        assert_eq!(wc.nw_dst_bits(), 8);
        assert!(!wc.is_nw_dst_wildcarded());

        wc.set_nw_dst_bits(40);
        assert_eq!(wc.nw_dst_bits(), 32);
        assert!(wc.is_nw_dst_wildcarded());
    }

    #[test]
    fn parse_udp() {
        let m = FlowMatch::from_packet(&eth(ETHER_TYPE_IPV4, &ipv4_udp()), 4)
            .unwrap();
        assert_eq!(m.in_port, 4);
        assert_eq!(m.dl_src, "a8:40:25:00:00:01".parse().unwrap());
        assert_eq!(m.dl_type, ETHER_TYPE_IPV4);
        assert_eq!(m.dl_vlan, VLAN_NONE);
        assert_eq!(m.nw_src, "10.0.0.1".parse().unwrap());
        assert_eq!(m.nw_dst, "10.0.0.2".parse().unwrap());
        assert_eq!(m.nw_proto, 17);
        assert_eq!(m.nw_tos, 0xb8);
        assert_eq!((m.tp_src, m.tp_dst), (1234, 53));
        assert!(m.is_nw_src_exact());
        assert!(m.is_nw_dst_exact());
        assert!(!m.wildcards.contains(Wildcards::TP_SRC));
    }

    #[test]
    fn parse_vlan_tagged() {
        let mut payload = vec![0x60, 0x0a]; // pcp 3, vid 10
        payload.extend_from_slice(&ETHER_TYPE_IPV4.to_be_bytes());
        payload.extend_from_slice(&ipv4_udp());
        let m = FlowMatch::from_packet(&eth(ETHER_TYPE_VLAN, &payload), 1)
            .unwrap();
        assert_eq!(m.dl_vlan, 10);
        assert_eq!(m.dl_vlan_pcp, 3);
        assert_eq!(m.dl_type, ETHER_TYPE_IPV4);
        assert!(m.is_nw_dst_exact());
    }

    #[test]
    fn parse_arp() {
        let arp = [
            0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01, // request
            0xa8, 0x40, 0x25, 0x00, 0x00, 0x01, 192, 168, 1, 1, // sender
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 192, 168, 1, 9, // target
        ];
        let m = FlowMatch::from_packet(&eth(ETHER_TYPE_ARP, &arp), 1).unwrap();
        assert_eq!(m.nw_proto, 1);
        assert_eq!(m.nw_src, "192.168.1.1".parse().unwrap());
        assert_eq!(m.nw_dst, "192.168.1.9".parse().unwrap());
        assert!(m.wildcards.contains(Wildcards::TP_SRC));
    }

    #[test]
    fn non_ip_wildcards_network_fields() {
        let m = FlowMatch::from_packet(&eth(0x88cc, &[0u8; 32]), 1).unwrap();
        assert_eq!(m.dl_type, 0x88cc);
        assert!(m.wildcards.is_nw_src_wildcarded());
        assert!(m.wildcards.is_nw_dst_wildcarded());
        assert!(m.wildcards.contains(Wildcards::NW_PROTO));
    }

    #[test]
    fn truncated_ip_keeps_link_layer() {
        let m = FlowMatch::from_packet(&eth(ETHER_TYPE_IPV4, &[0x45, 0]), 1)
            .unwrap();
        assert_eq!(m.dl_type, ETHER_TYPE_IPV4);
        assert!(m.wildcards.is_nw_src_wildcarded());
    }

    #[test]
    fn short_frame() {
        assert_eq!(
            FlowMatch::from_packet(&[0u8; 10], 1),
            Err(ParseError::Truncated)
        );
    }
}
