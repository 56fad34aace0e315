// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use super::action::ActionError;
use super::action::DropReason;
use super::addr;
use super::addr::AddrMap;
use super::addr::AddressMapper;
use super::network::NetworkMap;
use super::network::VirtualNetwork;
use super::ofp::BUFFER_ID_NONE;
use super::ofp::FlowMod;
use super::switch::VirtualSwitch;
use super::transport::Northbound;
use super::transport::Southbound;
use super::xid::XidMap;
use super::xid::XidTranslator;
use crate::ExecCtx;
use crate::api::Ipv4Addr;
use crate::api::TenantId;
use crate::cfg::HvCfg;
use crate::provider::LogLevel;
use std::sync::Arc;

/// Turns tenant messages into their physical equivalents.
///
/// Holds the state shared by every virtual switch: the tenant
/// networks, address and xid translation, and the connections
/// messages are sent on.
pub struct Devirtualizer {
    pub(crate) ectx: Arc<ExecCtx>,
    pub(crate) map: Arc<NetworkMap>,
    pub(crate) addrs: Arc<dyn AddressMapper>,
    pub(crate) xids: Arc<dyn XidTranslator>,
    pub(crate) south: Arc<dyn Southbound>,
    pub(crate) north: Arc<dyn Northbound>,
}

impl Devirtualizer {
    pub fn new(
        ectx: Arc<ExecCtx>,
        cfg: &HvCfg,
        map: Arc<NetworkMap>,
        south: Arc<dyn Southbound>,
        north: Arc<dyn Northbound>,
    ) -> Self {
        Self {
            ectx,
            map,
            addrs: Arc::new(AddrMap::from_cfg(cfg)),
            xids: Arc::new(XidMap::new(cfg.xid_window)),
            south,
            north,
        }
    }

    pub fn with_addrs(mut self, addrs: Arc<dyn AddressMapper>) -> Self {
        self.addrs = addrs;
        self
    }

    pub fn with_xids(mut self, xids: Arc<dyn XidTranslator>) -> Self {
        self.xids = xids;
        self
    }

    pub fn map(&self) -> &Arc<NetworkMap> {
        &self.map
    }

    pub fn addrs(&self) -> &Arc<dyn AddressMapper> {
        &self.addrs
    }

    pub(crate) fn network(
        &self,
        sw: &VirtualSwitch,
    ) -> Result<Arc<VirtualNetwork>, ActionError> {
        self.map.network(sw.tenant()).map_err(|e| {
            self.ectx.log.log(LogLevel::Warn, &format!("{sw}: {e}"));
            ActionError::Dropped(DropReason::UnknownTenant(sw.tenant()))
        })
    }

    pub(crate) fn physical_ip(
        &self,
        tenant: TenantId,
        ip: Ipv4Addr,
    ) -> Result<Ipv4Addr, ActionError> {
        self.addrs.physical_ip(tenant, ip).map_err(|e| {
            self.ectx.log.log(
                LogLevel::Error,
                &format!("no physical address for {ip} of tenant {tenant}: {e}"),
            );
            ActionError::Dropped(DropReason::AddrsExhausted)
        })
    }

    /// `fm` as the basis of rules installed on the substrate on the
    /// tenant's behalf.
    pub(crate) fn physical_template(
        &self,
        tenant: TenantId,
        fm: &FlowMod,
    ) -> Result<FlowMod, ActionError> {
        let mut tmpl = fm.clone();
        tmpl.fmatch = addr::physical_match(&*self.addrs, tenant, &fm.fmatch)
            .map_err(|e| {
                self.ectx.log.log(
                    LogLevel::Error,
                    &format!("cannot map match {} of tenant {tenant}: {e}", fm.fmatch),
                );
                ActionError::Dropped(DropReason::AddrsExhausted)
            })?;
        tmpl.buffer_id = BUFFER_ID_NONE;
        Ok(tmpl)
    }
}
