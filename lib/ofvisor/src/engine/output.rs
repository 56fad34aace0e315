// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Virtualization of the OUTPUT action.
//!
//! An output names virtual ports; realizing it depends on where those
//! ports sit on the substrate and on whether the output belongs to a
//! persistent rule or to a one-shot send.
//!
//! For a rule, each target port contributes physical actions to the
//! rule being installed on the ingress switch. Traffic entering a
//! virtual link is tagged (see [`LinkTag`]) and the switches along the
//! link get rules for the tag; traffic crossing an aggregate switch
//! is carried by rules along the aggregate's internal route, the last
//! of which applies whatever the target port calls for.
//!
//! For a one-shot send, targets reachable by the ingress switch are
//! output in band. Everything else is delivered out of band right
//! away: a packet leaving by a virtual link shows up as a PACKET_IN
//! at the far end, and a packet for another member of an aggregate
//! switch is sent straight to that member.
//!
//! [`LinkTag`]: super::link_tag::LinkTag

use super::action::ActionError;
use super::action::DropReason;
use super::addr::unrewrite_actions;
use super::devirt::Devirtualizer;
use super::flow_id::MacPair;
use super::flow_match::MatchCtx;
use super::flow_match::VirtMatch;
use super::flow_match::Wildcards;
use super::link_tag::LinkTag;
use super::network::VirtualNetwork;
use super::ofp::Action;
use super::ofp::FlowMod;
use super::ofp::Message;
use super::ofp::PacketIn;
use super::ofp::PacketOut;
use super::port_list;
use super::switch::PortKind;
use super::switch::VirtualPort;
use super::switch::VirtualSwitch;
use crate::provider::LogLevel;

pub(crate) fn virtualize_output(
    dv: &Devirtualizer,
    sw: &VirtualSwitch,
    out: u16,
    approved: &mut Vec<Action>,
    vm: &VirtMatch,
) -> Result<(), ActionError> {
    let in_no = vm.in_port();
    let Some(in_port) = sw.port(in_no).copied() else {
        dv.ectx.log.log(
            LogLevel::Error,
            &format!("{sw}: output from unknown port {in_no}"),
        );
        return Err(ActionError::Dropped(DropReason::UnknownPort(in_no)));
    };

    let targets = port_list::resolve(sw, in_no, out).unwrap_or_else(|e| {
        dv.ectx.log.log(LogLevel::Warn, &format!("{sw}: {e}"));
        vec![]
    });

    let net = dv.network(sw)?;

    match &vm.ctx {
        MatchCtx::FlowMod { cookie } => {
            let Some(fm) = sw.flow_mod(*cookie) else {
                dv.ectx.log.log(
                    LogLevel::Error,
                    &format!("{sw}: no rule with cookie {cookie:#x}"),
                );
                return Err(ActionError::Dropped(DropReason::UnknownFlowMod(
                    *cookie,
                )));
            };

            let rule = RuleOutput {
                dv,
                sw,
                net: &net,
                vm,
                in_port,
                template: dv.physical_template(sw.tenant(), &fm)?,
            };

            for target in targets {
                rule.output(target, approved)?;
            }
        }

        MatchCtx::PacketOut { data } => {
            let send = SendOutput { dv, sw, net: &net, vm, in_port, data };
            let mut in_band = false;
            for target in targets {
                in_band |= send.output(target, approved);
            }

            if !in_band {
                return Err(ActionError::Dropped(DropReason::NotInBand));
            }
        }
    }

    Ok(())
}

/// Output as part of the persistent rule `template`.
struct RuleOutput<'a> {
    dv: &'a Devirtualizer,
    sw: &'a VirtualSwitch,
    net: &'a VirtualNetwork,
    vm: &'a VirtMatch,
    in_port: VirtualPort,
    template: FlowMod,
}

impl RuleOutput<'_> {
    /// The host pair the rule carries over a link. Only a rule for
    /// exact Ethernet addresses names one.
    fn pair(&self) -> Result<MacPair, ActionError> {
        let m = &self.vm.fmatch;
        if m.wildcards.intersects(Wildcards::DL_SRC | Wildcards::DL_DST) {
            return Err(self.dropped(DropReason::InexactMacs));
        }
        Ok(MacPair::new(m.dl_src, m.dl_dst))
    }

    fn dropped(&self, reason: DropReason) -> ActionError {
        self.dv.ectx.log.log(
            LogLevel::Error,
            &format!(
                "{}: {reason}, dropping rule {:#x}",
                self.sw, self.template.cookie
            ),
        );
        ActionError::Dropped(reason)
    }

    fn output(
        &self,
        out: &VirtualPort,
        approved: &mut Vec<Action>,
    ) -> Result<(), ActionError> {
        let arrival = self.in_port.phys().port;

        if self.sw.crosses_switches(&self.in_port, out) {
            let route = self.sw.route(self.in_port.number(), out.number());
            let Some(route) = route else {
                return Err(self.dropped(DropReason::NoRoute {
                    ingress: self.in_port.number(),
                    egress: out.number(),
                }));
            };

            if self.in_port.is_link() {
                approved.extend(self.leave_link()?);
            }

            let trailing = match out.kind() {
                PortKind::Edge => unrewrite_actions(&self.vm.fmatch),
                PortKind::Link => self.enter_link(out)?,
            };

            route.install_rules(&self.template, &trailing, &*self.dv.south);
            let first_hop = route.path_src_port().port;
            approved.push(Action::output_from(arrival, first_hop));
            return Ok(());
        }

        match (self.in_port.kind(), out.kind()) {
            (PortKind::Edge, PortKind::Edge) => {
                approved.extend(unrewrite_actions(&self.vm.fmatch));
            }

            (PortKind::Link, PortKind::Edge) => {
                approved.extend(unrewrite_actions(&self.vm.fmatch));
                approved.extend(self.leave_link()?);
            }

            (_, PortKind::Link) => {
                approved.extend(self.enter_link(out)?);
            }
        }

        approved.push(Action::output_from(arrival, out.phys().port));
        Ok(())
    }

    /// Install the transit rules of the link attached to `out` and
    /// return the actions tagging traffic for it.
    fn enter_link(
        &self,
        out: &VirtualPort,
    ) -> Result<Vec<Action>, ActionError> {
        let src = self.sw.vport(out.number());
        let dst = self
            .net
            .neighbor_port(&src)
            .ok_or_else(|| self.dropped(DropReason::NoNeighbor(src)))?;
        let link = self
            .net
            .link(&src, &dst)
            .ok_or_else(|| self.dropped(DropReason::NoLink { src, dst }))?;

        let pair = self.pair()?;
        let flow = self.net.store_flow(&pair).map_err(|_| {
            self.dv.ectx.log.log(
                LogLevel::Error,
                &format!(
                    "tenant {} has too many host pairs to carry {pair}",
                    self.sw.tenant()
                ),
            );
            ActionError::Dropped(DropReason::FlowIdsExhausted)
        })?;

        link.install_rules(&self.template, flow, &*self.dv.south);
        Ok(link.tag(flow).set_link_fields())
    }

    /// The actions restoring the tenant addresses of traffic arriving
    /// over the link attached to the ingress port.
    fn leave_link(&self) -> Result<Vec<Action>, ActionError> {
        let dst = self.sw.vport(self.in_port.number());
        let src = self
            .net
            .neighbor_port(&dst)
            .ok_or_else(|| self.dropped(DropReason::NoNeighbor(dst)))?;
        if self.net.link(&src, &dst).is_none() {
            return Err(self.dropped(DropReason::NoLink { src, dst }));
        }

        // Either end of the link may be programmed first, so the flow
        // id is bound here too.
        let pair = self.pair()?;
        self.net
            .store_flow(&pair)
            .map_err(|_| self.dropped(DropReason::FlowIdsExhausted))?;
        Ok(LinkTag::unset_link_fields(&pair))
    }
}

/// Output as part of a one-shot send of `data`.
struct SendOutput<'a> {
    dv: &'a Devirtualizer,
    sw: &'a VirtualSwitch,
    net: &'a VirtualNetwork,
    vm: &'a VirtMatch,
    in_port: VirtualPort,
    data: &'a [u8],
}

impl SendOutput<'_> {
    /// Handle one target, returning whether it was output in band.
    fn output(&self, out: &VirtualPort, approved: &mut Vec<Action>) -> bool {
        if out.is_link() {
            self.cross_link(out);
            return false;
        }

        if self.sw.crosses_switches(&self.in_port, out) {
            self.cross_switches(out);
            return false;
        }

        // The port is named even when it is the ingress port. A switch
        // honoring OpenFlow 1.0 drops such an output; only IN_PORT
        // sends a packet back where it came from.
        approved.extend(unrewrite_actions(&self.vm.fmatch));
        approved.push(Action::output(out.phys().port));
        true
    }

    fn cross_link(&self, out: &VirtualPort) {
        let src = self.sw.vport(out.number());
        let Some(far) = self.net.neighbor_port(&src) else {
            self.dv.ectx.log.log(
                LogLevel::Error,
                &format!("{}: no link attached to {src}, skipping", self.sw),
            );
            return;
        };

        let pi = PacketIn::new(self.data.to_vec(), far.port);
        self.dv.north.send(self.sw.tenant(), far.dpid, Message::PacketIn(pi));
        self.dv.ectx.log.log(
            LogLevel::Note,
            &format!(
                "{}: packet over link {src} -> {far} sent to controller",
                self.sw
            ),
        );
    }

    fn cross_switches(&self, out: &VirtualPort) {
        let route = self.sw.route(self.in_port.number(), out.number());
        let Some(route) = route else {
            self.dv.ectx.log.log(
                LogLevel::Error,
                &format!(
                    "{}: no route from port {} to port {}, skipping",
                    self.sw,
                    self.in_port.number(),
                    out.number()
                ),
            );
            return;
        };

        let egress = out.phys();
        let po = PacketOut::new_unbuffered(
            self.data.to_vec(),
            route.path_dst_port().port,
            egress.port,
        );
        self.dv.south.send(egress.dpid, Message::PacketOut(po));
        self.dv.ectx.log.log(
            LogLevel::Note,
            &format!("{}: packet sent straight to {egress}", self.sw),
        );
    }
}
