// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Tenant networks: the virtual switches, links and hosts of each
//! tenant, plus the flow ids multiplexing the tenant's traffic over
//! its links.

use super::flow_id::FlowIdPool;
use super::flow_id::MacPair;
use super::link::VirtualLink;
use super::resource::FiniteResource;
use super::resource::ResourceError;
use super::route::PhysPath;
use super::switch::VirtualSwitch;
use super::transport::Southbound;
use crate::api::ApiError;
use crate::api::Dpid;
use crate::api::FlowId;
use crate::api::LinkId;
use crate::api::MacAddr;
use crate::api::TenantId;
use crate::api::VirtPort;
use crate::cfg::HvCfg;
use crate::sync::KRwLock;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One tenant's virtual network.
pub struct VirtualNetwork {
    tenant: TenantId,
    switches: KRwLock<BTreeMap<Dpid, Arc<VirtualSwitch>>>,
    neighbors: KRwLock<BTreeMap<VirtPort, VirtPort>>,
    links: KRwLock<BTreeMap<(VirtPort, VirtPort), Arc<VirtualLink>>>,
    hosts: KRwLock<BTreeSet<MacAddr>>,
    flows: FlowIdPool,
}

impl VirtualNetwork {
    pub fn new(tenant: TenantId, cfg: &HvCfg) -> Self {
        Self {
            tenant,
            switches: KRwLock::new(BTreeMap::new()),
            neighbors: KRwLock::new(BTreeMap::new()),
            links: KRwLock::new(BTreeMap::new()),
            hosts: KRwLock::new(BTreeSet::new()),
            flows: FlowIdPool::new(cfg.max_flow_ids),
        }
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    pub fn add_switch(&self, sw: VirtualSwitch) -> Arc<VirtualSwitch> {
        let sw = Arc::new(sw);
        self.switches.write().insert(sw.dpid(), sw.clone());
        sw
    }

    pub fn switch(&self, dpid: Dpid) -> Option<Arc<VirtualSwitch>> {
        self.switches.read().get(&dpid).cloned()
    }

    fn check_link_port(&self, vp: VirtPort) -> Result<(), ApiError> {
        let sw = self.switch(vp.dpid).ok_or(ApiError::NoSuchSwitch(vp.dpid))?;
        match sw.port(vp.port) {
            Some(p) if p.is_link() => Ok(()),
            _ => Err(ApiError::NoSuchPort(vp)),
        }
    }

    /// Add one direction of a virtual link from `src` to `dst`. Both
    /// must be link ports of switches already in the network, and
    /// neither may face any other port.
    pub fn add_link(
        &self,
        id: LinkId,
        src: VirtPort,
        dst: VirtPort,
        path: PhysPath,
    ) -> Result<Arc<VirtualLink>, ApiError> {
        self.check_link_port(src)?;
        self.check_link_port(dst)?;

        let mut neighbors = self.neighbors.write();
        for (a, b) in [(src, dst), (dst, src)] {
            if let Some(n) = neighbors.get(&a) {
                if *n != b {
                    return Err(ApiError::PortBusy(a));
                }
            }
        }

        let link = Arc::new(VirtualLink::new(self.tenant, id, src, dst, path));
        neighbors.insert(src, dst);
        neighbors.insert(dst, src);
        self.links.write().insert((src, dst), link.clone());
        Ok(link)
    }

    /// The port at the far end of the link attached to `vp`.
    pub fn neighbor_port(&self, vp: &VirtPort) -> Option<VirtPort> {
        self.neighbors.read().get(vp).copied()
    }

    /// The link carrying traffic from `src` to `dst`.
    pub fn link(
        &self,
        src: &VirtPort,
        dst: &VirtPort,
    ) -> Option<Arc<VirtualLink>> {
        self.links.read().get(&(*src, *dst)).cloned()
    }

    /// The flow id of `pair`, allocating one on first use.
    pub fn store_flow(&self, pair: &MacPair) -> Result<FlowId, ResourceError> {
        self.flows.obtain(pair)
    }

    /// The flow id of `pair`, if one is allocated.
    pub fn flow_id(&self, pair: &MacPair) -> Option<FlowId> {
        self.flows.get(pair)
    }

    pub fn flow_pair(&self, flow: FlowId) -> Option<MacPair> {
        self.flows.pair(flow)
    }

    /// Give up the flow id of `pair`, and the link rules installed
    /// for it.
    pub fn invalidate_flow(
        &self,
        pair: &MacPair,
        south: &dyn Southbound,
    ) {
        let Some(flow) = self.flows.get(pair) else {
            return;
        };

        for link in self.links.read().values() {
            link.remove_rules(flow, south);
        }
        self.flows.release(pair, flow);
    }

    pub fn add_host(&self, mac: MacAddr) {
        self.hosts.write().insert(mac);
    }

    pub fn has_host(&self, mac: &MacAddr) -> bool {
        self.hosts.read().contains(mac)
    }
}

/// Every tenant network known to the hypervisor.
#[derive(Default)]
pub struct NetworkMap {
    nets: KRwLock<BTreeMap<TenantId, Arc<VirtualNetwork>>>,
}

impl NetworkMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, net: VirtualNetwork) -> Arc<VirtualNetwork> {
        let net = Arc::new(net);
        self.nets.write().insert(net.tenant(), net.clone());
        net
    }

    pub fn network(
        &self,
        tenant: TenantId,
    ) -> Result<Arc<VirtualNetwork>, ApiError> {
        self.nets
            .read()
            .get(&tenant)
            .cloned()
            .ok_or(ApiError::NoSuchTenant(tenant))
    }

    pub fn remove(&self, tenant: TenantId) -> Option<Arc<VirtualNetwork>> {
        self.nets.write().remove(&tenant)
    }
}
