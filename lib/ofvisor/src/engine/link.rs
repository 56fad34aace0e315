// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use super::link_tag::LinkTag;
use super::ofp::FlowMod;
use super::ofp::FlowModCmd;
use super::ofp::Message;
use super::route::PhysPath;
use super::transport::Southbound;
use crate::api::Dpid;
use crate::api::FlowId;
use crate::api::LinkId;
use crate::api::TenantId;
use crate::api::VirtPort;
use crate::sync::KMutex;
use std::collections::BTreeMap;

/// One direction of a tenant's virtual link, realized over a physical
/// path from the physical port of `src` to that of `dst`.
///
/// The switches between the two ends forward tagged traffic by rules
/// the link installs per flow id; the ends themselves are programmed
/// through the tenant's own rules on the attached virtual switches.
#[derive(Debug)]
pub struct VirtualLink {
    id: LinkId,
    tenant: TenantId,
    src: VirtPort,
    dst: VirtPort,
    path: PhysPath,
    installed: KMutex<BTreeMap<FlowId, Vec<(Dpid, FlowMod)>>>,
}

impl VirtualLink {
    pub fn new(
        tenant: TenantId,
        id: LinkId,
        src: VirtPort,
        dst: VirtPort,
        path: PhysPath,
    ) -> Self {
        Self {
            id,
            tenant,
            src,
            dst,
            path,
            installed: KMutex::new(BTreeMap::new()),
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    pub fn src(&self) -> VirtPort {
        self.src
    }

    pub fn dst(&self) -> VirtPort {
        self.dst
    }

    pub fn path(&self) -> &PhysPath {
        &self.path
    }

    pub fn tag(&self, flow: FlowId) -> LinkTag {
        LinkTag::new(self.tenant, self.id, flow)
    }

    /// Install the transit rules carrying `flow` along the link,
    /// derived from `template`. Returns the number of rules sent.
    ///
    /// Several tenant rules may share a flow id, so the rules of each
    /// are kept until the flow is removed. A rule with the same switch,
    /// match and priority as one already installed overwrites it on
    /// the switch, and so replaces it here too.
    pub fn install_rules(
        &self,
        template: &FlowMod,
        flow: FlowId,
        south: &dyn Southbound,
    ) -> usize {
        let mut tmpl = template.clone();
        self.tag(flow).tag_match(&mut tmpl.fmatch);
        let rules = self.path.hop_rules(&tmpl, None);
        let n = rules.len();

        let mut installed = self.installed.lock();
        let held = installed.entry(flow).or_default();
        for (dpid, fm) in rules {
            south.send(dpid, Message::FlowMod(fm.clone()));

            let same = held.iter_mut().find(|old| {
                old.0 == dpid
                    && old.1.fmatch == fm.fmatch
                    && old.1.priority == fm.priority
            });
            match same {
                Some(old) => old.1 = fm,
                None => held.push((dpid, fm)),
            }
        }
        n
    }

    /// The rules currently installed for `flow`.
    pub fn installed(&self, flow: FlowId) -> Vec<(Dpid, FlowMod)> {
        self.installed.lock().get(&flow).cloned().unwrap_or_default()
    }

    /// Remove the rules installed for `flow`, returning how many
    /// deletions were sent.
    pub fn remove_rules(&self, flow: FlowId, south: &dyn Southbound) -> usize {
        let Some(rules) = self.installed.lock().remove(&flow) else {
            return 0;
        };

        let n = rules.len();
        for (dpid, mut fm) in rules {
            fm.command = FlowModCmd::DeleteStrict;
            fm.actions.clear();
            south.send(dpid, Message::FlowMod(fm));
        }
        n
    }
}
