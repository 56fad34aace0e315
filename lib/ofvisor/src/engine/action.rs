// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Virtualization of individual actions.
//!
//! Each tenant action is turned into zero or more physical actions
//! appended to an accumulator, possibly with side effects elsewhere
//! on the substrate. An action that can't be virtualized fails the
//! message it belongs to.

use super::devirt::Devirtualizer;
use super::flow_match::VirtMatch;
use super::ofp::Action;
use super::ofp::BadActionCode;
use super::output;
use super::switch::VirtualSwitch;
use crate::api::MacAddr;
use crate::api::TenantId;
use crate::api::VirtPort;
use core::fmt;
use core::fmt::Display;

/// Why a message was dropped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DropReason {
    UnknownBuffer(u32),
    UnknownPort(u16),
    UnknownTenant(TenantId),
    UnknownFlowMod(u64),
    NoRoute { ingress: u16, egress: u16 },
    NoNeighbor(VirtPort),
    NoLink { src: VirtPort, dst: VirtPort },
    FlowIdsExhausted,
    AddrsExhausted,

    /// A rule over a virtual link wildcards an Ethernet address, so
    /// there is no host pair to give a flow id.
    InexactMacs,

    /// A one-shot send had no target reachable from the switch it
    /// was sent to.
    NotInBand,
}

impl Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownBuffer(id) => write!(f, "unknown buffer id {id}"),
            Self::UnknownPort(p) => write!(f, "unknown port {p}"),
            Self::UnknownTenant(t) => write!(f, "unknown tenant {t}"),
            Self::UnknownFlowMod(c) => write!(f, "no rule with cookie {c:#x}"),
            Self::NoRoute { ingress, egress } => {
                write!(f, "no route from port {ingress} to port {egress}")
            }
            Self::NoNeighbor(vp) => write!(f, "no link attached to {vp}"),
            Self::NoLink { src, dst } => write!(f, "no link {src} -> {dst}"),
            Self::FlowIdsExhausted => write!(f, "flow ids exhausted"),
            Self::AddrsExhausted => write!(f, "physical addresses exhausted"),
            Self::InexactMacs => {
                write!(f, "link traffic must match exact Ethernet addresses")
            }
            Self::NotInBand => write!(f, "nothing left to send in band"),
        }
    }
}

/// Why an action was refused. The tenant's controller is told.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DenyReason {
    /// Rewrite to an address not belonging to one of the tenant's
    /// hosts.
    ForeignMac(MacAddr),

    /// Queues are not virtualized.
    Queue { port: u16, queue_id: u32 },
}

impl DenyReason {
    pub fn code(&self) -> BadActionCode {
        match self {
            Self::ForeignMac(_) => BadActionCode::BadArgument,
            Self::Queue { .. } => BadActionCode::BadQueue,
        }
    }
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ForeignMac(mac) => write!(f, "{mac} is not a tenant host"),
            Self::Queue { port, queue_id } => {
                write!(f, "queue {queue_id} on port {port} not virtualized")
            }
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActionError {
    /// Drop the message without telling the controller.
    Dropped(DropReason),

    /// Refuse the message and report it to the controller.
    Denied(DenyReason),
}

impl Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Dropped(r) => write!(f, "dropped: {r}"),
            Self::Denied(r) => write!(f, "denied: {r}"),
        }
    }
}

/// An action a tenant may use.
pub trait VirtualizableAction {
    /// Append the physical equivalent of `self` to `approved`, for
    /// traffic described by `vm` on `sw`.
    fn virtualize(
        &self,
        dv: &Devirtualizer,
        sw: &VirtualSwitch,
        approved: &mut Vec<Action>,
        vm: &VirtMatch,
    ) -> Result<(), ActionError>;
}

impl VirtualizableAction for Action {
    fn virtualize(
        &self,
        dv: &Devirtualizer,
        sw: &VirtualSwitch,
        approved: &mut Vec<Action>,
        vm: &VirtMatch,
    ) -> Result<(), ActionError> {
        match self {
            Self::Output { port, .. } => {
                output::virtualize_output(dv, sw, *port, approved, vm)
            }

            Self::SetNwSrc(ip) => {
                let phys = dv.physical_ip(sw.tenant(), *ip)?;
                approved.push(Self::SetNwSrc(phys));
                Ok(())
            }

            Self::SetNwDst(ip) => {
                let phys = dv.physical_ip(sw.tenant(), *ip)?;
                approved.push(Self::SetNwDst(phys));
                Ok(())
            }

            Self::SetDlSrc(mac) | Self::SetDlDst(mac) => {
                if !dv.network(sw)?.has_host(mac) {
                    return Err(ActionError::Denied(DenyReason::ForeignMac(
                        *mac,
                    )));
                }
                approved.push(self.clone());
                Ok(())
            }

            Self::Enqueue { port, queue_id } => {
                Err(ActionError::Denied(DenyReason::Queue {
                    port: *port,
                    queue_id: *queue_id,
                }))
            }

            Self::SetVlanVid(_)
            | Self::SetVlanPcp(_)
            | Self::StripVlan
            | Self::SetNwTos(_)
            | Self::SetTpSrc(_)
            | Self::SetTpDst(_) => {
                approved.push(self.clone());
                Ok(())
            }
        }
    }
}
