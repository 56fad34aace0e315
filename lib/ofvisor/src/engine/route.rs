// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Physical paths, and the routes an aggregate switch uses to carry
//! traffic between its ports.

use super::flow_match::Wildcards;
use super::ofp::Action;
use super::ofp::BUFFER_ID_NONE;
use super::ofp::FlowMod;
use super::ofp::Message;
use super::transport::Southbound;
use crate::api::Dpid;
use crate::api::PhysPort;
use core::fmt;
use core::fmt::Display;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum RouteError {
    #[error("path has no links")]
    Empty,

    #[error("link {at} does not start where the link before it ends")]
    Discontiguous { at: usize },

    #[error("path visits {0} more than once")]
    Loop(Dpid),

    #[error("path starts at {actual}, expected {expected}")]
    BadIngress { expected: Dpid, actual: Dpid },

    #[error("path ends at {actual}, expected {expected}")]
    BadEgress { expected: Dpid, actual: Dpid },

    #[error("path crosses {0}, which does not back the switch")]
    ForeignSwitch(Dpid),
}

/// A unidirectional physical link.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PhysLink {
    pub src: PhysPort,
    pub dst: PhysPort,
}

impl PhysLink {
    pub const fn new(src: PhysPort, dst: PhysPort) -> Self {
        Self { src, dst }
    }
}

impl Display for PhysLink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// A loop-free sequence of physical links, each starting on the
/// switch where the previous one ends.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PhysPath {
    links: Vec<PhysLink>,
}

impl PhysPath {
    pub fn new(links: Vec<PhysLink>) -> Result<Self, RouteError> {
        if links.is_empty() {
            return Err(RouteError::Empty);
        }

        for (at, pair) in links.windows(2).enumerate() {
            if pair[0].dst.dpid != pair[1].src.dpid {
                return Err(RouteError::Discontiguous { at: at + 1 });
            }
        }

        let mut seen = BTreeSet::new();
        for dpid in Self::switches_of(&links) {
            if !seen.insert(dpid) {
                return Err(RouteError::Loop(dpid));
            }
        }

        Ok(Self { links })
    }

    fn switches_of(links: &[PhysLink]) -> impl Iterator<Item = Dpid> + '_ {
        links
            .iter()
            .map(|l| l.src.dpid)
            .chain(links.last().map(|l| l.dst.dpid))
    }

    pub fn links(&self) -> &[PhysLink] {
        &self.links
    }

    /// The switches visited, in order.
    pub fn switches(&self) -> impl Iterator<Item = Dpid> + '_ {
        Self::switches_of(&self.links)
    }

    /// The port the path leaves its first switch by.
    pub fn src_port(&self) -> PhysPort {
        self.links[0].src
    }

    /// The port the path arrives at its last switch on.
    pub fn dst_port(&self) -> PhysPort {
        self.links[self.links.len() - 1].dst
    }

    /// The rules forwarding traffic matched by `template` along the
    /// path, one for every switch after the first. The first switch
    /// is where the traffic is steered onto the path, which is not
    /// the path's business.
    ///
    /// With `exit`, the last switch applies `exit.0` and outputs to
    /// port `exit.1`; without it the last switch is left alone as
    /// well.
    pub fn hop_rules(
        &self,
        template: &FlowMod,
        exit: Option<(&[Action], u16)>,
    ) -> Vec<(Dpid, FlowMod)> {
        let mut rules = Vec::with_capacity(self.links.len());

        for pair in self.links.windows(2) {
            let arrival = pair[0].dst;
            let mut fm = Self::hop_rule(template, arrival.port);
            fm.actions = vec![Action::output_from(arrival.port, pair[1].src.port)];
            rules.push((arrival.dpid, fm));
        }

        if let Some((trailing, port)) = exit {
            let arrival = self.dst_port();
            let mut fm = Self::hop_rule(template, arrival.port);
            fm.actions = trailing.to_vec();
            fm.actions.push(Action::output_from(arrival.port, port));
            rules.push((arrival.dpid, fm));
        }

        rules
    }

    fn hop_rule(template: &FlowMod, in_port: u16) -> FlowMod {
        let mut fm = template.clone();
        fm.fmatch.in_port = in_port;
        fm.fmatch.wildcards.remove(Wildcards::IN_PORT);
        fm.buffer_id = BUFFER_ID_NONE;
        fm.actions.clear();
        fm
    }
}

/// The path an aggregate switch uses between an ingress and an
/// egress physical port on different physical switches.
#[derive(Debug)]
pub struct SwitchRoute {
    ingress: PhysPort,
    egress: PhysPort,
    path: PhysPath,
}

impl SwitchRoute {
    pub fn new(
        ingress: PhysPort,
        egress: PhysPort,
        path: PhysPath,
    ) -> Result<Self, RouteError> {
        let first = path.src_port().dpid;
        if first != ingress.dpid {
            return Err(RouteError::BadIngress {
                expected: ingress.dpid,
                actual: first,
            });
        }

        let last = path.dst_port().dpid;
        if last != egress.dpid {
            return Err(RouteError::BadEgress {
                expected: egress.dpid,
                actual: last,
            });
        }

        Ok(Self { ingress, egress, path })
    }

    pub fn ingress(&self) -> PhysPort {
        self.ingress
    }

    pub fn egress(&self) -> PhysPort {
        self.egress
    }

    pub fn path(&self) -> &PhysPath {
        &self.path
    }

    /// The first hop out of the ingress switch.
    pub fn path_src_port(&self) -> PhysPort {
        self.path.src_port()
    }

    /// The arrival port on the egress switch.
    pub fn path_dst_port(&self) -> PhysPort {
        self.path.dst_port()
    }

    /// The rules carrying `template`'s traffic from the ingress
    /// switch to the egress port, applying `trailing` on the egress
    /// switch.
    pub fn hop_rules(
        &self,
        template: &FlowMod,
        trailing: &[Action],
    ) -> Vec<(Dpid, FlowMod)> {
        self.path.hop_rules(template, Some((trailing, self.egress.port)))
    }

    /// Send the route's hop rules south, returning how many were
    /// sent.
    pub fn install_rules(
        &self,
        template: &FlowMod,
        trailing: &[Action],
        south: &dyn Southbound,
    ) -> usize {
        let rules = self.hop_rules(template, trailing);
        let n = rules.len();
        for (dpid, fm) in rules {
            south.send(dpid, Message::FlowMod(fm));
        }
        n
    }
}
