// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The devirtualization engine of an OpenFlow network hypervisor.
//!
//! Tenants program virtual switches with OpenFlow 1.0 messages. The
//! engine translates those messages into the physical equivalents
//! that realize the tenant's intent on the shared substrate: output
//! actions are resolved to physical ports, tenant addresses are
//! rewritten to their physical counterparts, and traffic crossing a
//! virtual link or a big-switch route is tagged and routed hop by
//! hop.
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

use provider::LogProvider;

pub mod api;
pub mod cfg;
pub mod engine;
pub mod provider;
pub mod sync;

/// The execution context handed to the engine by its host.
pub struct ExecCtx {
    pub log: Box<dyn LogProvider>,
}
