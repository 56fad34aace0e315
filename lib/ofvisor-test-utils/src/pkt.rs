// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Frame builders.

use ofvisor::api::Ipv4Addr;
use ofvisor::api::MacAddr;
use smoltcp::wire::EthernetAddress;
use smoltcp::wire::EthernetFrame;
use smoltcp::wire::EthernetProtocol;
use smoltcp::wire::IpProtocol;
use smoltcp::wire::Ipv4Address;
use smoltcp::wire::Ipv4Packet;
use smoltcp::wire::UdpPacket;

const ETH_LEN: usize = 14;
const IP4_LEN: usize = 20;
const UDP_LEN: usize = 8;

/// An Ethernet/IPv4/UDP frame carrying `payload`.
pub fn udp_frame(
    eth_src: MacAddr,
    eth_dst: MacAddr,
    ip_src: Ipv4Addr,
    ip_dst: Ipv4Addr,
    sport: u16,
    dport: u16,
    payload: &[u8],
) -> Vec<u8> {
    let udp_len = UDP_LEN + payload.len();
    let mut buf = vec![0u8; ETH_LEN + IP4_LEN + udp_len];

    let mut eth = EthernetFrame::new_unchecked(&mut buf[..]);
    eth.set_src_addr(EthernetAddress::from(eth_src));
    eth.set_dst_addr(EthernetAddress::from(eth_dst));
    eth.set_ethertype(EthernetProtocol::Ipv4);

    let mut ip = Ipv4Packet::new_unchecked(&mut buf[ETH_LEN..]);
    ip.set_version(4);
    ip.set_header_len(IP4_LEN as u8);
    ip.set_total_len((IP4_LEN + udp_len) as u16);
    ip.set_hop_limit(64);
    ip.set_next_header(IpProtocol::Udp);
    ip.set_src_addr(Ipv4Address::from_bytes(&ip_src.bytes()));
    ip.set_dst_addr(Ipv4Address::from_bytes(&ip_dst.bytes()));
    ip.fill_checksum();

    let mut udp = UdpPacket::new_unchecked(&mut buf[ETH_LEN + IP4_LEN..]);
    udp.set_src_port(sport);
    udp.set_dst_port(dport);
    udp.set_len(udp_len as u16);
    udp.set_checksum(0);
    udp.payload_mut().copy_from_slice(payload);

    buf
}

/// A frame of `len` bytes with an EtherType nothing parses further.
pub fn opaque_frame(eth_src: MacAddr, eth_dst: MacAddr, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len.max(ETH_LEN)];
    buf[0..6].copy_from_slice(&eth_dst.bytes());
    buf[6..12].copy_from_slice(&eth_src.bytes());
    buf[12..14].copy_from_slice(&0x88b5u16.to_be_bytes());
    buf
}
