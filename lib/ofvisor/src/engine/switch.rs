// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Virtual switches and their ports.

use super::buffer::BufferMap;
use super::ofp::FlowMod;
use super::route::PhysPath;
use super::route::RouteError;
use super::route::SwitchRoute;
use crate::api::Dpid;
use crate::api::PhysPort;
use crate::api::TenantId;
use crate::api::VirtPort;
use crate::cfg::HvCfg;
use crate::sync::KMutex;
use core::fmt;
use core::fmt::Display;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// How a virtual port connects to the rest of the tenant's network.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PortKind {
    /// Faces a host.
    Edge,

    /// Attached to a virtual link.
    Link,
}

/// A port of a virtual switch, backed by exactly one physical port.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VirtualPort {
    number: u16,
    phys: PhysPort,
    kind: PortKind,
}

impl VirtualPort {
    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn phys(&self) -> PhysPort {
        self.phys
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn is_edge(&self) -> bool {
        self.kind == PortKind::Edge
    }

    pub fn is_link(&self) -> bool {
        self.kind == PortKind::Link
    }
}

impl Display for VirtualPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.number, self.phys)
    }
}

#[derive(Debug)]
pub enum SwitchKind {
    /// Backed one to one by a physical switch.
    Simple { phys: Dpid },

    /// Backed by a connected set of physical switches, with a route
    /// for every (ingress, egress) pair of ports on different
    /// members.
    Aggregate {
        members: BTreeSet<Dpid>,
        routes: BTreeMap<(u16, u16), Arc<SwitchRoute>>,
    },
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SwitchError {
    #[error("port {0} already exists")]
    PortExists(u16),

    #[error("port number {0} is reserved")]
    ReservedPort(u16),

    #[error("physical port {0} already backs port {1}")]
    PhysPortTaken(PhysPort, u16),

    #[error("physical switch {0} does not back this switch")]
    ForeignPhysSwitch(Dpid),

    #[error("no such port: {0}")]
    NoSuchPort(u16),

    #[error("routes only exist on aggregate switches")]
    NotAggregate,

    #[error("bad route: {0}")]
    Route(#[from] RouteError),
}

/// A tenant-visible OpenFlow switch.
pub struct VirtualSwitch {
    tenant: TenantId,
    dpid: Dpid,
    ports: BTreeMap<u16, VirtualPort>,
    kind: SwitchKind,
    buffers: BufferMap,
    flow_mods: KMutex<BTreeMap<u64, FlowMod>>,
}

impl VirtualSwitch {
    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    pub fn dpid(&self) -> Dpid {
        self.dpid
    }

    pub fn kind(&self) -> &SwitchKind {
        &self.kind
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, SwitchKind::Aggregate { .. })
    }

    pub fn port(&self, number: u16) -> Option<&VirtualPort> {
        self.ports.get(&number)
    }

    /// All ports, in port number order.
    pub fn ports(&self) -> impl Iterator<Item = &VirtualPort> {
        self.ports.values()
    }

    /// The tenant-wide name of port `number`.
    pub fn vport(&self, number: u16) -> VirtPort {
        VirtPort { dpid: self.dpid, port: number }
    }

    /// The route from port `ingress` to port `egress`, when the two
    /// sit on different members of an aggregate switch.
    pub fn route(&self, ingress: u16, egress: u16) -> Option<Arc<SwitchRoute>> {
        match &self.kind {
            SwitchKind::Aggregate { routes, .. } => {
                routes.get(&(ingress, egress)).cloned()
            }
            SwitchKind::Simple { .. } => None,
        }
    }

    /// Whether traffic from `ingress` to `egress` has to travel
    /// between physical switches.
    pub fn crosses_switches(
        &self,
        ingress: &VirtualPort,
        egress: &VirtualPort,
    ) -> bool {
        self.is_aggregate() && ingress.phys.dpid != egress.phys.dpid
    }

    pub fn buffers(&self) -> &BufferMap {
        &self.buffers
    }

    /// Record a tenant rule under its cookie, returning the rule it
    /// replaced.
    pub fn add_flow_mod(&self, fm: FlowMod) -> Option<FlowMod> {
        self.flow_mods.lock().insert(fm.cookie, fm)
    }

    pub fn flow_mod(&self, cookie: u64) -> Option<FlowMod> {
        self.flow_mods.lock().get(&cookie).cloned()
    }

    pub fn remove_flow_mod(&self, cookie: u64) -> Option<FlowMod> {
        self.flow_mods.lock().remove(&cookie)
    }
}

impl fmt::Debug for VirtualSwitch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VirtualSwitch")
            .field("tenant", &self.tenant)
            .field("dpid", &self.dpid)
            .field("ports", &self.ports)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Display for VirtualSwitch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.dpid, self.tenant)
    }
}

/// Assembles a [`VirtualSwitch`], checking every port and route
/// against the physical switches backing it.
pub struct SwitchBuilder {
    tenant: TenantId,
    dpid: Dpid,
    ports: BTreeMap<u16, VirtualPort>,
    kind: SwitchKind,
}

impl SwitchBuilder {
    pub fn simple(tenant: TenantId, dpid: Dpid, phys: Dpid) -> Self {
        Self {
            tenant,
            dpid,
            ports: BTreeMap::new(),
            kind: SwitchKind::Simple { phys },
        }
    }

    pub fn aggregate(
        tenant: TenantId,
        dpid: Dpid,
        members: impl IntoIterator<Item = Dpid>,
    ) -> Self {
        Self {
            tenant,
            dpid,
            ports: BTreeMap::new(),
            kind: SwitchKind::Aggregate {
                members: members.into_iter().collect(),
                routes: BTreeMap::new(),
            },
        }
    }

    fn backs(&self, phys: Dpid) -> bool {
        match &self.kind {
            SwitchKind::Simple { phys: p } => *p == phys,
            SwitchKind::Aggregate { members, .. } => members.contains(&phys),
        }
    }

    pub fn add_port(
        &mut self,
        number: u16,
        phys: PhysPort,
        kind: PortKind,
    ) -> Result<&mut Self, SwitchError> {
        if number == 0 || number >= super::ofp::OFPP_MAX {
            return Err(SwitchError::ReservedPort(number));
        }

        if self.ports.contains_key(&number) {
            return Err(SwitchError::PortExists(number));
        }

        if !self.backs(phys.dpid) {
            return Err(SwitchError::ForeignPhysSwitch(phys.dpid));
        }

        if let Some(p) = self.ports.values().find(|p| p.phys == phys) {
            return Err(SwitchError::PhysPortTaken(phys, p.number));
        }

        self.ports.insert(number, VirtualPort { number, phys, kind });
        Ok(self)
    }

    /// Add the route carrying traffic from port `ingress` to port
    /// `egress` over `path`.
    pub fn add_route(
        &mut self,
        ingress: u16,
        egress: u16,
        path: PhysPath,
    ) -> Result<&mut Self, SwitchError> {
        let in_phys = self
            .ports
            .get(&ingress)
            .ok_or(SwitchError::NoSuchPort(ingress))?
            .phys;
        let out_phys = self
            .ports
            .get(&egress)
            .ok_or(SwitchError::NoSuchPort(egress))?
            .phys;

        let SwitchKind::Aggregate { members, routes } = &mut self.kind else {
            return Err(SwitchError::NotAggregate);
        };

        if let Some(foreign) = path.switches().find(|d| !members.contains(d)) {
            return Err(RouteError::ForeignSwitch(foreign).into());
        }

        let route = SwitchRoute::new(in_phys, out_phys, path)?;
        routes.insert((ingress, egress), Arc::new(route));
        Ok(self)
    }

    pub fn create(self, cfg: &HvCfg) -> VirtualSwitch {
        VirtualSwitch {
            tenant: self.tenant,
            dpid: self.dpid,
            ports: self.ports,
            kind: self.kind,
            buffers: BufferMap::new(cfg.buffer_capacity),
            flow_mods: KMutex::new(BTreeMap::new()),
        }
    }
}
