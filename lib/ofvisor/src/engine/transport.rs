// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Where devirtualized messages go.
//!
//! Sends are fire-and-forget: the engine never waits on a switch or
//! controller, and delivery failures are the connection layer's to
//! report.

use super::ofp::Message;
use crate::api::Dpid;
use crate::api::TenantId;

/// Connections to physical switches.
pub trait Southbound: Send + Sync {
    fn send(&self, phys: Dpid, msg: Message);
}

/// Connections to tenant controllers, addressed by the virtual switch
/// the message is from.
pub trait Northbound: Send + Sync {
    fn send(&self, tenant: TenantId, vswitch: Dpid, msg: Message);
}
