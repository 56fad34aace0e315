// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The devirtualization engine.
pub mod action;
pub mod addr;
pub mod buffer;
pub mod devirt;
pub mod flow_id;
pub mod flow_match;
pub mod link;
pub mod link_tag;
pub mod network;
pub mod ofp;
pub mod output;
pub mod packet_out;
pub mod port_list;
pub mod resource;
pub mod route;
pub mod switch;
pub mod transport;
pub mod xid;

pub use devirt::Devirtualizer;
pub use packet_out::Outcome;
