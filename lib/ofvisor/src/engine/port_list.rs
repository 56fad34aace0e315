// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Expansion of an output port into the virtual ports it names.

use super::ofp::PseudoPort;
use super::switch::VirtualPort;
use super::switch::VirtualSwitch;
use core::fmt;
use core::fmt::Display;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PortListError {
    /// The switch has no such port.
    UnknownPort(u16),

    /// The port is a reserved port with no virtual counterpart.
    Unsupported(u16),
}

impl Display for PortListError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownPort(p) => write!(f, "unknown output port {p}"),
            Self::Unsupported(p) => {
                write!(f, "output port 0x{p:04x} not supported")
            }
        }
    }
}

/// The ports of `sw` an output to `out` reaches for a packet that
/// arrived on `in_port`, in port number order.
///
/// `FLOOD` reaches every port but the ingress port; `ALL` reaches
/// every port.
pub fn resolve(
    sw: &VirtualSwitch,
    in_port: u16,
    out: u16,
) -> Result<Vec<&VirtualPort>, PortListError> {
    match PseudoPort::from(out) {
        PseudoPort::Physical(p) => sw
            .port(p)
            .map(|vp| vec![vp])
            .ok_or(PortListError::UnknownPort(p)),
        PseudoPort::Flood => {
            Ok(sw.ports().filter(|vp| vp.number() != in_port).collect())
        }
        PseudoPort::All => Ok(sw.ports().collect()),
        _ => Err(PortListError::Unsupported(out)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Dpid;
    use crate::api::PhysPort;
    use crate::api::TenantId;
    use crate::cfg::HvCfg;
    use crate::engine::ofp::OFPP_ALL;
    use crate::engine::ofp::OFPP_CONTROLLER;
    use crate::engine::ofp::OFPP_FLOOD;
    use crate::engine::ofp::OFPP_IN_PORT;
    use crate::engine::switch::PortKind;
    use crate::engine::switch::SwitchBuilder;

    fn sw() -> VirtualSwitch {
        let mut b = SwitchBuilder::simple(
            TenantId::new(1).unwrap(),
            Dpid(0x100),
            Dpid(1),
        );
        for n in [3, 1, 2] {
            b.add_port(n, PhysPort::new(1, n + 10), PortKind::Edge).unwrap();
        }
        b.create(&HvCfg::default())
    }

    fn numbers(ports: Vec<&VirtualPort>) -> Vec<u16> {
        ports.into_iter().map(|p| p.number()).collect()
    }

    #[test]
    fn single_port() {
        let sw = sw();
        assert_eq!(numbers(resolve(&sw, 1, 2).unwrap()), [2]);
        assert_eq!(resolve(&sw, 1, 9), Err(PortListError::UnknownPort(9)));
    }

    #[test]
    fn flood_excludes_ingress() {
        let sw = sw();
        assert_eq!(numbers(resolve(&sw, 2, OFPP_FLOOD).unwrap()), [1, 3]);
    }

    #[test]
    fn all_includes_ingress() {
        let sw = sw();
        assert_eq!(numbers(resolve(&sw, 2, OFPP_ALL).unwrap()), [1, 2, 3]);
    }

    #[test]
    fn reserved_ports_unsupported() {
        let sw = sw();
        for p in [OFPP_CONTROLLER, OFPP_IN_PORT, 0xff00] {
            assert_eq!(resolve(&sw, 1, p), Err(PortListError::Unsupported(p)));
        }
    }
}
