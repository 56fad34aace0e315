// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Devirtualization of PACKET_OUT.

use super::action::ActionError;
use super::action::DenyReason;
use super::action::DropReason;
use super::action::VirtualizableAction;
use super::addr;
use super::devirt::Devirtualizer;
use super::flow_match::FlowMatch;
use super::flow_match::VirtMatch;
use super::ofp::Action;
use super::ofp::BadRequestCode;
use super::ofp::BUFFER_ID_NONE;
use super::ofp::ETHER_HDR_LEN;
use super::ofp::ErrorKind;
use super::ofp::ErrorMsg;
use super::ofp::Message;
use super::ofp::PacketOut;
use super::switch::VirtualSwitch;
use crate::provider::LogLevel;
use core::fmt;
use core::fmt::Display;

/// The fate of a tenant message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The physical equivalent was sent.
    Forwarded,

    /// Nothing was sent to the controller.
    Dropped { reason: DropReason },

    /// An action was refused; the controller was sent a BAD_ACTION
    /// error.
    Denied { reason: DenyReason },

    /// The message was malformed; the controller was sent a
    /// BAD_REQUEST error.
    Rejected { code: BadRequestCode },
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Forwarded => write!(f, "forwarded"),
            Self::Dropped { reason } => write!(f, "dropped: {reason}"),
            Self::Denied { reason } => write!(f, "denied: {reason}"),
            Self::Rejected { code } => write!(f, "rejected: {code:?}"),
        }
    }
}

impl Devirtualizer {
    /// Send the physical equivalent of the PACKET_OUT `msg` the
    /// controller of `sw` sent.
    ///
    /// The packet's match is recovered from the inline data or the
    /// buffered PACKET_IN it names, then every action is virtualized
    /// in order. The first action failing fails the whole message,
    /// though out-of-band sends made for earlier outputs stand. The
    /// resulting message has the physical in-port, addresses
    /// rewritten to physical ones ahead of every other action, and a
    /// physical xid.
    pub fn devirtualize_packet_out(
        &self,
        sw: &VirtualSwitch,
        mut msg: PacketOut,
    ) -> Outcome {
        let vm = match self.packet_out_match(sw, &mut msg) {
            Ok(vm) => vm,
            Err(outcome) => return outcome,
        };

        let mut approved = Vec::with_capacity(msg.actions.len() + 2);
        for act in &msg.actions {
            if let Err(e) = act.virtualize(self, sw, &mut approved, &vm) {
                return self.action_failed(sw, &msg, act, e);
            }
        }

        let Some(in_port) = sw.port(msg.in_port) else {
            self.ectx.log.log(
                LogLevel::Error,
                &format!("{sw}: PACKET_OUT from unknown port {}", msg.in_port),
            );
            return Outcome::Dropped {
                reason: DropReason::UnknownPort(msg.in_port),
            };
        };
        let phys = in_port.phys();

        let rewrites =
            match addr::rewrite_actions(&*self.addrs, sw.tenant(), &vm.fmatch) {
                Ok(acts) => acts,
                Err(e) => {
                    self.ectx.log.log(
                        LogLevel::Error,
                        &format!("{sw}: cannot map {}: {e}", vm.fmatch),
                    );
                    return Outcome::Dropped {
                        reason: DropReason::AddrsExhausted,
                    };
                }
            };
        for act in rewrites {
            approved.insert(0, act);
        }

        msg.in_port = phys.port;
        msg.actions = approved;
        msg.recompute_len();
        msg.xid = self.xids.translate(msg.xid, sw, phys.dpid);
        self.south.send(phys.dpid, Message::PacketOut(msg));
        Outcome::Forwarded
    }

    /// Recover the match of the packet `msg` sends, adopting the
    /// buffered PACKET_IN when there is one.
    fn packet_out_match(
        &self,
        sw: &VirtualSwitch,
        msg: &mut PacketOut,
    ) -> Result<VirtMatch, Outcome> {
        if msg.buffer_id == BUFFER_ID_NONE {
            let fmatch = match msg.data.len() {
                n if n <= ETHER_HDR_LEN => None,
                _ => FlowMatch::from_packet(&msg.data, msg.in_port).ok(),
            };

            let Some(fmatch) = fmatch else {
                self.ectx.log.log(
                    LogLevel::Error,
                    &format!(
                        "{sw}: PACKET_OUT {} has neither buffer nor data",
                        msg.xid
                    ),
                );
                let code = BadRequestCode::BadLen;
                let err =
                    ErrorMsg::new(msg.xid, ErrorKind::BadRequest(code), &msg.data);
                self.north.send(sw.tenant(), sw.dpid(), Message::Error(err));
                return Err(Outcome::Rejected { code });
            };

            return Ok(VirtMatch::packet_out(fmatch, msg.data.clone()));
        }

        let Some(cause) = sw.buffers().get(msg.buffer_id) else {
            self.ectx.log.log(
                LogLevel::Error,
                &format!("{sw}: unknown buffer id {}, dropping", msg.buffer_id),
            );
            return Err(Outcome::Dropped {
                reason: DropReason::UnknownBuffer(msg.buffer_id),
            });
        };

        let fmatch = match FlowMatch::from_packet(&cause.data, msg.in_port) {
            Ok(m) => m,
            Err(e) => {
                self.ectx.log.log(
                    LogLevel::Error,
                    &format!("{sw}: buffer {}: {e}", msg.buffer_id),
                );
                return Err(Outcome::Dropped {
                    reason: DropReason::UnknownBuffer(msg.buffer_id),
                });
            }
        };

        msg.buffer_id = cause.buffer_id;
        if cause.buffer_id == BUFFER_ID_NONE {
            msg.data = cause.data.clone();
        }

        Ok(VirtMatch::packet_out(fmatch, cause.data))
    }

    fn action_failed(
        &self,
        sw: &VirtualSwitch,
        msg: &PacketOut,
        act: &Action,
        e: ActionError,
    ) -> Outcome {
        match e {
            ActionError::Denied(reason) => {
                self.ectx.log.log(
                    LogLevel::Warn,
                    &format!("{sw}: cannot virtualize {act}: {reason}"),
                );
                let err = ErrorMsg::new(
                    msg.xid,
                    ErrorKind::BadAction(reason.code()),
                    &msg.data,
                );
                self.north.send(sw.tenant(), sw.dpid(), Message::Error(err));
                Outcome::Denied { reason }
            }

            ActionError::Dropped(reason) => {
                self.ectx.log.log(
                    LogLevel::Note,
                    &format!("{sw}: dropping PACKET_OUT {}: {reason}", msg.xid),
                );
                Outcome::Dropped { reason }
            }
        }
    }
}
