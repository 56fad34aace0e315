// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod pkt;
pub mod topo;

// Let's make our lives easier and pub use a bunch of stuff.
pub use ofvisor::ExecCtx;
pub use ofvisor::api::Dpid;
pub use ofvisor::api::FlowId;
pub use ofvisor::api::Ipv4Addr;
pub use ofvisor::api::LinkId;
pub use ofvisor::api::MacAddr;
pub use ofvisor::api::PhysPort;
pub use ofvisor::api::TenantId;
pub use ofvisor::api::VirtPort;
pub use ofvisor::cfg::HvCfg;
pub use ofvisor::engine::Devirtualizer;
pub use ofvisor::engine::Outcome;
pub use ofvisor::engine::action::DenyReason;
pub use ofvisor::engine::action::DropReason;
pub use ofvisor::engine::flow_id::MacPair;
pub use ofvisor::engine::flow_match::FlowMatch;
pub use ofvisor::engine::flow_match::Wildcards;
pub use ofvisor::engine::link_tag::LinkTag;
pub use ofvisor::engine::network::NetworkMap;
pub use ofvisor::engine::network::VirtualNetwork;
pub use ofvisor::engine::ofp::*;
pub use ofvisor::engine::switch::VirtualSwitch;
pub use ofvisor::engine::transport::Northbound;
pub use ofvisor::engine::transport::Southbound;
pub use ofvisor::provider::LogLevel;
pub use ofvisor::provider::LogProvider;
pub use pkt::*;
pub use std::sync::Arc;
pub use topo::*;

use ofvisor::sync::KMutex;

/// A log provider keeping every message for later inspection.
#[derive(Clone, Default)]
pub struct CaptureLog {
    entries: Arc<KMutex<Vec<(LogLevel, String)>>>,
}

impl CaptureLog {
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().clone()
    }

    /// Whether a message at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.lock().iter().filter(|(l, _)| *l == level).count()
    }
}

impl LogProvider for CaptureLog {
    fn log(&self, level: LogLevel, msg: &str) {
        println!("{level} {msg}");
        self.entries.lock().push((level, msg.to_string()));
    }
}

/// Records every message sent to a physical switch.
#[derive(Default)]
pub struct RecordingSouth {
    sent: KMutex<Vec<(Dpid, Message)>>,
}

impl RecordingSouth {
    pub fn sent(&self) -> Vec<(Dpid, Message)> {
        self.sent.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    pub fn packet_outs(&self) -> Vec<(Dpid, PacketOut)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(d, m)| match m {
                Message::PacketOut(po) => Some((*d, po.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn flow_mods(&self) -> Vec<(Dpid, FlowMod)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(d, m)| match m {
                Message::FlowMod(fm) => Some((*d, fm.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Southbound for RecordingSouth {
    fn send(&self, phys: Dpid, msg: Message) {
        self.sent.lock().push((phys, msg));
    }
}

/// Records every message sent to a tenant controller.
#[derive(Default)]
pub struct RecordingNorth {
    sent: KMutex<Vec<(TenantId, Dpid, Message)>>,
}

impl RecordingNorth {
    pub fn sent(&self) -> Vec<(TenantId, Dpid, Message)> {
        self.sent.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    pub fn errors(&self) -> Vec<ErrorMsg> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(_, _, m)| match m {
                Message::Error(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn packet_ins(&self) -> Vec<(Dpid, PacketIn)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(_, d, m)| match m {
                Message::PacketIn(pi) => Some((*d, pi.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Northbound for RecordingNorth {
    fn send(&self, tenant: TenantId, vswitch: Dpid, msg: Message) {
        self.sent.lock().push((tenant, vswitch, msg));
    }
}

/// A devirtualizer wired to recording transports and a capturing
/// log, with a single tenant network.
pub struct Harness {
    pub cfg: HvCfg,
    pub dv: Devirtualizer,
    pub net: Arc<VirtualNetwork>,
    pub south: Arc<RecordingSouth>,
    pub north: Arc<RecordingNorth>,
    pub log: CaptureLog,
}

impl Harness {
    pub fn new(cfg: HvCfg) -> Self {
        let log = CaptureLog::default();
        let ectx = Arc::new(ExecCtx { log: Box::new(log.clone()) });
        let map = Arc::new(NetworkMap::new());
        let net = map.add(VirtualNetwork::new(tenant(), &cfg));
        let south = Arc::new(RecordingSouth::default());
        let north = Arc::new(RecordingNorth::default());
        let dv =
            Devirtualizer::new(ectx, &cfg, map, south.clone(), north.clone());
        Self { cfg, dv, net, south, north, log }
    }

    pub fn switch(&self, dpid: Dpid) -> Arc<VirtualSwitch> {
        self.net.switch(dpid).unwrap()
    }

    /// The physical address standing for tenant address `ip`.
    pub fn phys_ip(&self, ip: Ipv4Addr) -> Ipv4Addr {
        self.dv.addrs().physical_ip(tenant(), ip).unwrap()
    }
}
