// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! PACKET_INs retained for a virtual switch's controller.
//!
//! A PACKET_IN forwarded to a tenant controller is stored under a
//! virtual buffer id which the controller may later quote in a
//! PACKET_OUT or FLOW_MOD. The stored message keeps the physical
//! buffer id assigned by the physical switch.

use super::ofp::BUFFER_ID_NONE;
use super::ofp::PacketIn;
use crate::sync::KMutex;
use std::collections::BTreeMap;
use std::collections::VecDeque;

struct BufferState {
    entries: BTreeMap<u32, PacketIn>,
    order: VecDeque<u32>,
    next: u32,
}

/// A bounded map from virtual buffer id to PACKET_IN.
///
/// Once full, adding an entry evicts the oldest one.
pub struct BufferMap {
    capacity: usize,
    state: KMutex<BufferState>,
}

impl BufferMap {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: KMutex::new(BufferState {
                entries: BTreeMap::new(),
                order: VecDeque::new(),
                next: 0,
            }),
        }
    }

    /// Retain `pi`, returning the virtual buffer id it is known by.
    pub fn add(&self, pi: PacketIn) -> u32 {
        let mut state = self.state.lock();
        while state.entries.len() >= self.capacity {
            match state.order.pop_front() {
                Some(old) => {
                    state.entries.remove(&old);
                }
                None => break,
            }
        }

        let mut id = state.next;
        while id == BUFFER_ID_NONE || state.entries.contains_key(&id) {
            id = id.wrapping_add(1);
        }
        state.next = id.wrapping_add(1);

        state.entries.insert(id, pi);
        state.order.push_back(id);
        id
    }

    /// The PACKET_IN retained under `id`. The entry stays in the map.
    pub fn get(&self, id: u32) -> Option<PacketIn> {
        self.state.lock().entries.get(&id).cloned()
    }

    pub fn remove(&self, id: u32) -> Option<PacketIn> {
        let mut state = self.state.lock();
        let pi = state.entries.remove(&id)?;
        state.order.retain(|o| *o != id);
        Some(pi)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
