// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Transaction id translation.
//!
//! Every tenant controller picks its own xids, so the xid of a
//! message relayed to a physical switch is replaced with one unique
//! on that switch's connection. The original is remembered so that a
//! reply can be returned to the right virtual switch.

use super::switch::VirtualSwitch;
use crate::api::Dpid;
use crate::sync::KMutex;
use crate::sync::KRwLock;
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

pub trait XidTranslator: Send + Sync {
    /// The xid to use on the connection to `phys` for a message sent
    /// by `sw` with `xid`.
    fn translate(&self, xid: u32, sw: &VirtualSwitch, phys: Dpid) -> u32;
}

struct XidState {
    next: u32,
    pending: BTreeMap<u32, (u32, Dpid)>,
    order: VecDeque<u32>,
}

/// Per-physical-switch xid translation remembering the last `window`
/// translations of each switch.
pub struct XidMap {
    window: usize,
    switches: KRwLock<BTreeMap<Dpid, Arc<KMutex<XidState>>>>,
}

impl XidMap {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(1), switches: KRwLock::new(BTreeMap::new()) }
    }

    fn switch(&self, phys: Dpid) -> Arc<KMutex<XidState>> {
        if let Some(st) = self.switches.read().get(&phys) {
            return st.clone();
        }

        self.switches
            .write()
            .entry(phys)
            .or_insert_with(|| {
                Arc::new(KMutex::new(XidState {
                    next: 1,
                    pending: BTreeMap::new(),
                    order: VecDeque::new(),
                }))
            })
            .clone()
    }

    /// The (virtual xid, virtual switch) behind `xid` as seen on the
    /// connection to `phys`.
    pub fn untranslate(&self, phys: Dpid, xid: u32) -> Option<(u32, Dpid)> {
        let st = self.switches.read().get(&phys)?.clone();
        st.lock().pending.get(&xid).copied()
    }
}

impl XidTranslator for XidMap {
    fn translate(&self, xid: u32, sw: &VirtualSwitch, phys: Dpid) -> u32 {
        let st = self.switch(phys);
        let mut st = st.lock();

        while st.pending.len() >= self.window {
            match st.order.pop_front() {
                Some(old) => {
                    st.pending.remove(&old);
                }
                None => break,
            }
        }

        let mut pxid = st.next;
        while pxid == 0 || st.pending.contains_key(&pxid) {
            pxid = pxid.wrapping_add(1);
        }
        st.next = pxid.wrapping_add(1);

        st.pending.insert(pxid, (xid, sw.dpid()));
        st.order.push_back(pxid);
        pxid
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::TenantId;
    use crate::cfg::HvCfg;
    use crate::engine::switch::SwitchBuilder;

    fn sw(dpid: u64) -> VirtualSwitch {
        SwitchBuilder::simple(TenantId::new(1).unwrap(), Dpid(dpid), Dpid(1))
            .create(&HvCfg::default())
    }

    #[test]
    fn same_virtual_xid_from_two_switches() {
        let xids = XidMap::new(16);
        let (a, b) = (sw(0x10), sw(0x20));
        let pa = xids.translate(7, &a, Dpid(1));
        let pb = xids.translate(7, &b, Dpid(1));
        assert_ne!(pa, pb);
        assert_eq!(xids.untranslate(Dpid(1), pa), Some((7, Dpid(0x10))));
        assert_eq!(xids.untranslate(Dpid(1), pb), Some((7, Dpid(0x20))));
        assert_eq!(xids.untranslate(Dpid(2), pa), None);
    }

    #[test]
    fn window_forgets_oldest() {
        let xids = XidMap::new(2);
        let a = sw(0x10);
        let first = xids.translate(1, &a, Dpid(1));
        let second = xids.translate(2, &a, Dpid(1));
        let third = xids.translate(3, &a, Dpid(1));
        assert_eq!(xids.untranslate(Dpid(1), first), None);
        assert_eq!(xids.untranslate(Dpid(1), second), Some((2, Dpid(0x10))));
        assert_eq!(xids.untranslate(Dpid(1), third), Some((3, Dpid(0x10))));
    }
}
