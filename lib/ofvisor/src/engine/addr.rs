// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Tenant to physical IPv4 address translation.
//!
//! Tenants may reuse each other's addresses, so on the substrate every
//! (tenant, address) pair is represented by a distinct physical
//! address. Packets are rewritten to physical addresses as they enter
//! the network and back to tenant addresses as they leave it.

use super::flow_match::FlowMatch;
use super::ofp::Action;
use super::resource::FiniteResource;
use super::resource::Resource;
use super::resource::ResourceEntry;
use super::resource::ResourceError;
use crate::api::Ipv4Addr;
use crate::api::TenantId;
use crate::cfg::HvCfg;
use crate::sync::KMutex;
use std::collections::BTreeMap;

/// Translates between tenant and physical IPv4 addresses.
pub trait AddressMapper: Send + Sync {
    /// The physical address standing for `ip` of `tenant`, assigning
    /// one on first use.
    fn physical_ip(
        &self,
        tenant: TenantId,
        ip: Ipv4Addr,
    ) -> Result<Ipv4Addr, ResourceError>;

    /// The tenant address a physical address stands for.
    fn virtual_ip(&self, phys: Ipv4Addr) -> Option<(TenantId, Ipv4Addr)>;
}

impl ResourceEntry for Ipv4Addr {}

#[derive(Default)]
struct AddrState {
    to_phys: BTreeMap<(TenantId, Ipv4Addr), Ipv4Addr>,
    to_virt: BTreeMap<Ipv4Addr, (TenantId, Ipv4Addr)>,
    free: Vec<Ipv4Addr>,
    next: u32,
}

/// A pool of physical addresses, `base..base + capacity`, handed out
/// on first use.
pub struct AddrMap {
    base: u32,
    capacity: u32,
    state: KMutex<AddrState>,
}

impl AddrMap {
    pub fn new(base: Ipv4Addr, capacity: u32) -> Self {
        Self {
            base: u32::from(base),
            capacity,
            state: KMutex::new(AddrState::default()),
        }
    }

    pub fn from_cfg(cfg: &HvCfg) -> Self {
        Self::new(cfg.phys_ip_base, cfg.phys_ip_capacity)
    }

    pub fn len(&self) -> usize {
        self.state.lock().to_phys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Resource for AddrMap {}

impl FiniteResource for AddrMap {
    type Key = (TenantId, Ipv4Addr);
    type Entry = Ipv4Addr;

    fn obtain(
        &self,
        key: &(TenantId, Ipv4Addr),
    ) -> Result<Ipv4Addr, ResourceError> {
        let mut state = self.state.lock();
        if let Some(phys) = state.to_phys.get(key) {
            return Ok(*phys);
        }

        let phys = match state.free.pop() {
            Some(phys) => phys,
            None => {
                let phys = (state.next < self.capacity)
                    .then(|| self.base.checked_add(state.next))
                    .flatten()
                    .ok_or(ResourceError::Exhausted)?;
                state.next += 1;
                Ipv4Addr::from(phys)
            }
        };

        state.to_phys.insert(*key, phys);
        state.to_virt.insert(phys, *key);
        Ok(phys)
    }

    fn release(&self, key: &(TenantId, Ipv4Addr), phys: Ipv4Addr) {
        let mut state = self.state.lock();
        if state.to_phys.get(key) != Some(&phys) {
            return;
        }

        state.to_phys.remove(key);
        state.to_virt.remove(&phys);
        state.free.push(phys);
    }
}

impl AddressMapper for AddrMap {
    fn physical_ip(
        &self,
        tenant: TenantId,
        ip: Ipv4Addr,
    ) -> Result<Ipv4Addr, ResourceError> {
        self.obtain(&(tenant, ip))
    }

    fn virtual_ip(&self, phys: Ipv4Addr) -> Option<(TenantId, Ipv4Addr)> {
        self.state.lock().to_virt.get(&phys).copied()
    }
}

/// The rewrites taking a packet described by `m` from tenant to
/// physical addresses: `nw_src` first, then `nw_dst`, each only when
/// exactly matched.
pub fn rewrite_actions(
    mapper: &dyn AddressMapper,
    tenant: TenantId,
    m: &FlowMatch,
) -> Result<Vec<Action>, ResourceError> {
    let mut acts = Vec::with_capacity(2);
    if !m.wildcards.is_nw_src_wildcarded() {
        acts.push(Action::SetNwSrc(mapper.physical_ip(tenant, m.nw_src)?));
    }
    if !m.wildcards.is_nw_dst_wildcarded() {
        acts.push(Action::SetNwDst(mapper.physical_ip(tenant, m.nw_dst)?));
    }
    Ok(acts)
}

/// The rewrites restoring the tenant addresses of `m`.
pub fn unrewrite_actions(m: &FlowMatch) -> Vec<Action> {
    let mut acts = Vec::with_capacity(2);
    if !m.wildcards.is_nw_src_wildcarded() {
        acts.push(Action::SetNwSrc(m.nw_src));
    }
    if !m.wildcards.is_nw_dst_wildcarded() {
        acts.push(Action::SetNwDst(m.nw_dst));
    }
    acts
}

/// `m` as it appears on the substrate: exact network addresses are
/// replaced with their physical counterparts.
pub fn physical_match(
    mapper: &dyn AddressMapper,
    tenant: TenantId,
    m: &FlowMatch,
) -> Result<FlowMatch, ResourceError> {
    let mut phys = m.clone();
    if !m.wildcards.is_nw_src_wildcarded() {
        phys.nw_src = mapper.physical_ip(tenant, m.nw_src)?;
    }
    if !m.wildcards.is_nw_dst_wildcarded() {
        phys.nw_dst = mapper.physical_ip(tenant, m.nw_dst)?;
    }
    Ok(phys)
}
