// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! OpenFlow 1.0 messages and actions, as values.
//!
//! Framing and byte-level encoding belong to the connection layer;
//! here a message is just its fields. The lengths carried by
//! [`PacketOut`] and reported by [`Action::len`] are the on-wire
//! lengths a serializer would produce.

use super::flow_match::FlowMatch;
use crate::api::Ipv4Addr;
use crate::api::MacAddr;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The buffer id meaning "the packet is carried inline".
pub const BUFFER_ID_NONE: u32 = 0xffff_ffff;

pub const OFP_HEADER_LEN: u16 = 8;
pub const PACKET_OUT_MIN_LEN: u16 = 16;
pub const PACKET_IN_MIN_LEN: u16 = 18;
pub const FLOW_MOD_MIN_LEN: u16 = 72;
pub const ERROR_MIN_LEN: u16 = 12;

/// An Ethernet header without any tag.
pub const ETHER_HDR_LEN: usize = 14;

/// The most bytes of an offending request echoed in an error.
pub const ERROR_DATA_MAX: usize = 64;

pub const OFPP_MAX: u16 = 0xff00;
pub const OFPP_IN_PORT: u16 = 0xfff8;
pub const OFPP_TABLE: u16 = 0xfff9;
pub const OFPP_NORMAL: u16 = 0xfffa;
pub const OFPP_FLOOD: u16 = 0xfffb;
pub const OFPP_ALL: u16 = 0xfffc;
pub const OFPP_CONTROLLER: u16 = 0xfffd;
pub const OFPP_LOCAL: u16 = 0xfffe;
pub const OFPP_NONE: u16 = 0xffff;

/// A port number as seen by an output action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PseudoPort {
    Physical(u16),
    InPort,
    Table,
    Normal,
    Flood,
    All,
    Controller,
    Local,
    None,
    /// Within the reserved range but not assigned a meaning.
    Reserved(u16),
}

impl From<u16> for PseudoPort {
    fn from(val: u16) -> Self {
        match val {
            p if p < OFPP_MAX => Self::Physical(p),
            OFPP_IN_PORT => Self::InPort,
            OFPP_TABLE => Self::Table,
            OFPP_NORMAL => Self::Normal,
            OFPP_FLOOD => Self::Flood,
            OFPP_ALL => Self::All,
            OFPP_CONTROLLER => Self::Controller,
            OFPP_LOCAL => Self::Local,
            OFPP_NONE => Self::None,
            p => Self::Reserved(p),
        }
    }
}

impl From<PseudoPort> for u16 {
    fn from(port: PseudoPort) -> u16 {
        match port {
            PseudoPort::Physical(p) | PseudoPort::Reserved(p) => p,
            PseudoPort::InPort => OFPP_IN_PORT,
            PseudoPort::Table => OFPP_TABLE,
            PseudoPort::Normal => OFPP_NORMAL,
            PseudoPort::Flood => OFPP_FLOOD,
            PseudoPort::All => OFPP_ALL,
            PseudoPort::Controller => OFPP_CONTROLLER,
            PseudoPort::Local => OFPP_LOCAL,
            PseudoPort::None => OFPP_NONE,
        }
    }
}

/// An OpenFlow 1.0 action.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Action {
    Output { port: u16, max_len: u16 },
    SetVlanVid(u16),
    SetVlanPcp(u8),
    StripVlan,
    SetDlSrc(MacAddr),
    SetDlDst(MacAddr),
    SetNwSrc(Ipv4Addr),
    SetNwDst(Ipv4Addr),
    SetNwTos(u8),
    SetTpSrc(u16),
    SetTpDst(u16),
    Enqueue { port: u16, queue_id: u32 },
}

impl Action {
    /// Output to `port` with no controller truncation.
    pub const fn output(port: u16) -> Self {
        Self::Output { port, max_len: 0 }
    }

    /// Output to `out` for a packet that arrived on `arrival`. A
    /// switch won't send a packet back out its ingress port unless
    /// told to with `IN_PORT`.
    pub const fn output_from(arrival: u16, out: u16) -> Self {
        if arrival == out {
            Self::output(OFPP_IN_PORT)
        } else {
            Self::output(out)
        }
    }

    /// The on-wire length of the action.
    pub const fn len(&self) -> u16 {
        match self {
            Self::SetDlSrc(_) | Self::SetDlDst(_) | Self::Enqueue { .. } => {
                16
            }
            _ => 8,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Output { port, .. } => write!(f, "output:{port}"),
            Self::SetVlanVid(vid) => write!(f, "set_vlan_vid:{vid}"),
            Self::SetVlanPcp(pcp) => write!(f, "set_vlan_pcp:{pcp}"),
            Self::StripVlan => write!(f, "strip_vlan"),
            Self::SetDlSrc(mac) => write!(f, "set_dl_src:{mac}"),
            Self::SetDlDst(mac) => write!(f, "set_dl_dst:{mac}"),
            Self::SetNwSrc(ip) => write!(f, "set_nw_src:{ip}"),
            Self::SetNwDst(ip) => write!(f, "set_nw_dst:{ip}"),
            Self::SetNwTos(tos) => write!(f, "set_nw_tos:{tos}"),
            Self::SetTpSrc(port) => write!(f, "set_tp_src:{port}"),
            Self::SetTpDst(port) => write!(f, "set_tp_dst:{port}"),
            Self::Enqueue { port, queue_id } => {
                write!(f, "enqueue:{port}:{queue_id}")
            }
        }
    }
}

/// Sum of the on-wire lengths of `actions`.
pub fn actions_len(actions: &[Action]) -> u16 {
    actions.iter().fold(0u16, |acc, a| acc.saturating_add(a.len()))
}

fn wire_len(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

/// A controller's request that a switch emit a packet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PacketOut {
    pub xid: u32,
    pub buffer_id: u32,
    pub in_port: u16,
    pub actions: Vec<Action>,
    pub data: Vec<u8>,
    pub actions_len: u16,
    pub length: u16,
}

impl PacketOut {
    pub fn new(
        xid: u32,
        buffer_id: u32,
        in_port: u16,
        actions: Vec<Action>,
        data: Vec<u8>,
    ) -> Self {
        let mut po = Self {
            xid,
            buffer_id,
            in_port,
            actions,
            data,
            actions_len: 0,
            length: 0,
        };
        po.recompute_len();
        po
    }

    /// A single-output, unbuffered PACKET_OUT carrying `data`.
    pub fn new_unbuffered(data: Vec<u8>, in_port: u16, out_port: u16) -> Self {
        Self::new(0, BUFFER_ID_NONE, in_port, vec![Action::output(out_port)], data)
    }

    /// Recompute the action block and total lengths from the current
    /// actions and payload.
    pub fn recompute_len(&mut self) {
        self.actions_len = actions_len(&self.actions);
        self.length = PACKET_OUT_MIN_LEN
            .saturating_add(self.actions_len)
            .saturating_add(wire_len(self.data.len()));
    }

    pub fn is_buffered(&self) -> bool {
        self.buffer_id != BUFFER_ID_NONE
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum PacketInReason {
    NoMatch,
    Action,
}

/// A packet handed by a switch to its controller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PacketIn {
    pub xid: u32,
    pub buffer_id: u32,
    pub total_len: u16,
    pub in_port: u16,
    pub reason: PacketInReason,
    pub data: Vec<u8>,
}

impl PacketIn {
    /// An unbuffered table-miss PACKET_IN carrying all of `data`.
    pub fn new(data: Vec<u8>, in_port: u16) -> Self {
        Self {
            xid: 0,
            buffer_id: BUFFER_ID_NONE,
            total_len: wire_len(data.len()),
            in_port,
            reason: PacketInReason::NoMatch,
            data,
        }
    }

    pub fn len(&self) -> u16 {
        PACKET_IN_MIN_LEN.saturating_add(wire_len(self.data.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FlowModCmd {
    Add,
    Modify,
    ModifyStrict,
    Delete,
    DeleteStrict,
}

/// A request to install, change or remove a flow table entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlowMod {
    pub xid: u32,
    pub fmatch: FlowMatch,
    pub cookie: u64,
    pub command: FlowModCmd,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: u32,
    pub out_port: u16,
    pub flags: u16,
    pub actions: Vec<Action>,
}

impl FlowMod {
    /// An `Add` with default timeouts and priority.
    pub fn add(fmatch: FlowMatch, cookie: u64, actions: Vec<Action>) -> Self {
        Self {
            xid: 0,
            fmatch,
            cookie,
            command: FlowModCmd::Add,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: 0x8000,
            buffer_id: BUFFER_ID_NONE,
            out_port: OFPP_NONE,
            flags: 0,
            actions,
        }
    }

    pub fn len(&self) -> u16 {
        FLOW_MOD_MIN_LEN.saturating_add(actions_len(&self.actions))
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BadRequestCode {
    BadVersion,
    BadType,
    BadStat,
    BadVendor,
    BadSubtype,
    Eperm,
    BadLen,
    BufferEmpty,
    BufferUnknown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BadActionCode {
    BadType,
    BadLen,
    BadVendor,
    BadVendorType,
    BadOutPort,
    BadArgument,
    Eperm,
    TooMany,
    BadQueue,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    BadRequest(BadRequestCode),
    BadAction(BadActionCode),
}

impl ErrorKind {
    /// The OpenFlow (type, code) pair.
    pub const fn type_code(&self) -> (u16, u16) {
        match self {
            Self::BadRequest(code) => (1, *code as u16),
            Self::BadAction(code) => (2, *code as u16),
        }
    }
}

/// An error reported to a controller about one of its requests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorMsg {
    pub xid: u32,
    pub kind: ErrorKind,
    pub data: Vec<u8>,
}

impl ErrorMsg {
    /// An error answering the request `xid`, echoing at most the
    /// first [`ERROR_DATA_MAX`] bytes of `data`.
    pub fn new(xid: u32, kind: ErrorKind, data: &[u8]) -> Self {
        let n = data.len().min(ERROR_DATA_MAX);
        Self { xid, kind, data: data[..n].to_vec() }
    }

    pub fn len(&self) -> u16 {
        ERROR_MIN_LEN.saturating_add(wire_len(self.data.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The messages exchanged with switches and controllers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Message {
    PacketOut(PacketOut),
    PacketIn(PacketIn),
    FlowMod(FlowMod),
    Error(ErrorMsg),
}

impl Message {
    pub fn xid(&self) -> u32 {
        match self {
            Self::PacketOut(m) => m.xid,
            Self::PacketIn(m) => m.xid,
            Self::FlowMod(m) => m.xid,
            Self::Error(m) => m.xid,
        }
    }
}
