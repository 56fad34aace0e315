// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Per-tenant flow identifiers.
//!
//! A flow id stands in for a tenant (source, destination) MAC pair
//! while packets of that pair travel over a virtual link, where the
//! Ethernet addresses are taken over by the link tag.

use super::resource::FiniteResource;
use super::resource::Resource;
use super::resource::ResourceEntry;
use super::resource::ResourceError;
use crate::api::FlowId;
use crate::api::MacAddr;
use crate::sync::KMutex;
use core::fmt;
use core::fmt::Display;
use std::collections::BTreeMap;

/// A (source, destination) Ethernet address pair.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MacPair {
    pub src: MacAddr,
    pub dst: MacAddr,
}

impl MacPair {
    pub const fn new(src: MacAddr, dst: MacAddr) -> Self {
        Self { src, dst }
    }
}

impl Display for MacPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

impl ResourceEntry for FlowId {}

struct PoolState {
    by_pair: BTreeMap<MacPair, FlowId>,
    by_id: BTreeMap<FlowId, MacPair>,
    free: Vec<FlowId>,
    next: u64,
}

/// A bounded pool of flow ids, `1..=max`.
pub struct FlowIdPool {
    max: u32,
    state: KMutex<PoolState>,
}

impl FlowIdPool {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            state: KMutex::new(PoolState {
                by_pair: BTreeMap::new(),
                by_id: BTreeMap::new(),
                free: Vec::new(),
                next: 1,
            }),
        }
    }

    /// The flow id bound to `pair`, without allocating.
    pub fn get(&self, pair: &MacPair) -> Option<FlowId> {
        self.state.lock().by_pair.get(pair).copied()
    }

    /// The pair bound to `id`.
    pub fn pair(&self, id: FlowId) -> Option<MacPair> {
        self.state.lock().by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.state.lock().by_pair.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Resource for FlowIdPool {}

impl FiniteResource for FlowIdPool {
    type Key = MacPair;
    type Entry = FlowId;

    fn obtain(&self, pair: &MacPair) -> Result<FlowId, ResourceError> {
        let mut state = self.state.lock();
        if let Some(id) = state.by_pair.get(pair) {
            return Ok(*id);
        }

        let id = match state.free.pop() {
            Some(id) => id,
            None if state.next <= u64::from(self.max) => {
                let id = FlowId::new(state.next as u32);
                state.next += 1;
                id
            }
            None => return Err(ResourceError::Exhausted),
        };

        state.by_pair.insert(*pair, id);
        state.by_id.insert(id, *pair);
        Ok(id)
    }

    fn release(&self, pair: &MacPair, id: FlowId) {
        let mut state = self.state.lock();
        if state.by_pair.get(pair) != Some(&id) {
            return;
        }

        state.by_pair.remove(pair);
        state.by_id.remove(&id);
        state.free.push(id);
    }
}
