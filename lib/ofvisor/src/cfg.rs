// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Hypervisor configuration.

use crate::api::Ipv4Addr;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CfgError {
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables for a hypervisor instance.
///
/// Every field has a usable default, so an empty document is a valid
/// configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HvCfg {
    /// Flow ids available to each tenant for multiplexing MAC pairs
    /// over virtual links.
    pub max_flow_ids: u32,

    /// Buffered PACKET_INs retained per virtual switch.
    pub buffer_capacity: usize,

    /// Outstanding translated xids remembered per physical switch.
    pub xid_window: usize,

    /// First address of the physical IPv4 pool.
    pub phys_ip_base: Ipv4Addr,

    /// Number of addresses in the physical IPv4 pool.
    pub phys_ip_capacity: u32,
}

impl Default for HvCfg {
    fn default() -> Self {
        Self {
            max_flow_ids: u16::MAX as u32,
            buffer_capacity: 256,
            xid_window: 1024,
            phys_ip_base: Ipv4Addr::from_const([10, 0, 0, 1]),
            phys_ip_capacity: 1 << 20,
        }
    }
}

impl HvCfg {
    pub fn from_toml(s: &str) -> Result<Self, CfgError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CfgError> {
        if self.max_flow_ids == 0 {
            return Err(CfgError::Invalid {
                field: "max_flow_ids",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.buffer_capacity == 0 {
            return Err(CfgError::Invalid {
                field: "buffer_capacity",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.xid_window == 0 {
            return Err(CfgError::Invalid {
                field: "xid_window",
                reason: "must be at least 1".to_string(),
            });
        }

        let base = u32::from(self.phys_ip_base);
        if self.phys_ip_capacity == 0
            || base.checked_add(self.phys_ip_capacity - 1).is_none()
        {
            return Err(CfgError::Invalid {
                field: "phys_ip_capacity",
                reason: format!(
                    "{} addresses starting at {} do not fit in IPv4",
                    self.phys_ip_capacity, self.phys_ip_base
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_is_default() {
        assert_eq!(HvCfg::from_toml("").unwrap(), HvCfg::default());
    }

    #[test]
    fn partial_override() {
        let cfg = HvCfg::from_toml(
            r#"
            max_flow_ids = 4
            phys_ip_base = "172.16.0.1"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.max_flow_ids, 4);
        assert_eq!(cfg.phys_ip_base, Ipv4Addr::from_const([172, 16, 0, 1]));
        assert_eq!(cfg.buffer_capacity, HvCfg::default().buffer_capacity);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            HvCfg::from_toml("max_flow_ids = 0"),
            Err(CfgError::Invalid { field: "max_flow_ids", .. })
        ));
        assert!(matches!(
            HvCfg::from_toml(
                "phys_ip_base = \"255.255.255.0\"\nphys_ip_capacity = 512"
            ),
            Err(CfgError::Invalid { field: "phys_ip_capacity", .. })
        ));
        assert!(matches!(
            HvCfg::from_toml("no_such_knob = 1"),
            Err(CfgError::Toml(_))
        ));
    }
}
