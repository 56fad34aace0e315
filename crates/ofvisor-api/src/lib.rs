// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types shared between the hypervisor engine and its consumers.
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

use thiserror::Error;

pub mod id;
pub mod ip;
pub mod mac;

pub use id::*;
pub use ip::*;
pub use mac::*;

/// The overall version of the API. Anytime an API type is added,
/// removed, or modified, this number should increment.
pub const API_VERSION: u64 = 3;

/// Errors produced when constructing or resolving API values.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ApiError {
    #[error("tenant id {0} exceeds the 24-bit tenant space")]
    TenantOutOfRange(u32),

    #[error("link id {0} exceeds the 16-bit link space")]
    LinkOutOfRange(u32),

    #[error("no such tenant: {0}")]
    NoSuchTenant(TenantId),

    #[error("no such virtual switch: {0}")]
    NoSuchSwitch(Dpid),

    #[error("no such virtual port: {0}")]
    NoSuchPort(VirtPort),

    #[error("port {0} is already attached to a link")]
    PortBusy(VirtPort),

    #[error("malformed {kind}: {val}")]
    Malformed { kind: &'static str, val: String },
}
