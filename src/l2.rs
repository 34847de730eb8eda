/*
 * Copyright 2025 Oxide Computer Company
 */

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::ifname::InterfaceName;
use crate::path;
use crate::update::{Update, Updates};
use crate::vlan;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchPortMode {
    Access,
    Trunk,
}

impl std::fmt::Display for SwitchPortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SwitchPortMode::Access => "access",
                SwitchPortMode::Trunk => "trunk",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanningTreeMode {
    Edge,
    Network,
    Trunk,
}

impl std::fmt::Display for SpanningTreeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SpanningTreeMode::Edge => "edge",
                SpanningTreeMode::Network => "network",
                SpanningTreeMode::Trunk => "trunk",
            }
        )
    }
}

/*
 * Switch port settings.  The access VLAN only means something in access
 * mode, and the native and allowed VLANs only in trunk mode; choosing a mode
 * discards the settings of the other one.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct L2Config {
    mode: Option<SwitchPortMode>,
    access_vlan: Option<u16>,
    native_vlan: Option<u16>,
    allowed_vlans: BTreeSet<u16>,
    stp: Option<SpanningTreeMode>,
}

fn vlan_ref(id: u16) -> String {
    format!("vlan-{id}")
}

impl L2Config {
    pub fn new() -> L2Config {
        Default::default()
    }

    pub fn access(mut self, vlan: u16) -> Result<L2Config> {
        let vlan = vlan::check(vlan)?;

        self.mode = Some(SwitchPortMode::Access);
        self.access_vlan = Some(vlan);
        self.native_vlan = None;
        self.allowed_vlans.clear();
        Ok(self)
    }

    /*
     * An empty allowed set leaves the device default (all VLANs) in place.
     */
    pub fn trunk(
        mut self,
        native: Option<u16>,
        allowed: BTreeSet<u16>,
    ) -> Result<L2Config> {
        let native = native.map(vlan::check).transpose()?;
        for &id in &allowed {
            vlan::check(id)?;
        }

        self.mode = Some(SwitchPortMode::Trunk);
        self.access_vlan = None;
        self.native_vlan = native;
        self.allowed_vlans = allowed;
        Ok(self)
    }

    pub fn spanning_tree(mut self, mode: SpanningTreeMode) -> L2Config {
        self.stp = Some(mode);
        self
    }

    pub fn mode(&self) -> Option<SwitchPortMode> {
        self.mode
    }

    pub fn spanning_tree_mode(&self) -> Option<SpanningTreeMode> {
        self.stp
    }

    fn switchport(&self) -> Option<Map<String, Value>> {
        let mode = self.mode?;

        let mut o = Map::new();
        o.insert("mode".into(), json!(mode.to_string()));
        match mode {
            SwitchPortMode::Access => {
                if let Some(id) = self.access_vlan {
                    o.insert("accessVlan".into(), json!(vlan_ref(id)));
                }
            }
            SwitchPortMode::Trunk => {
                if let Some(id) = self.native_vlan {
                    o.insert("nativeVlan".into(), json!(vlan_ref(id)));
                }
                if !self.allowed_vlans.is_empty() {
                    o.insert(
                        "trunkVlans".into(),
                        json!(vlan::compress(&self.allowed_vlans)),
                    );
                }
            }
        }
        Some(o)
    }

    /*
     * Fold the layer and switch port fields into the parent's base node.
     */
    pub(crate) fn fold(&self, base: &mut Map<String, Value>) {
        base.insert("layer".into(), json!("Layer2"));
        if let Some(sp) = self.switchport() {
            base.extend(sp);
        }
    }

    /*
     * The updates that follow the parent's base Replace: a Merge of the
     * switch port fields if a mode is set, then the spanning tree subtree if
     * a spanning tree mode is set.
     */
    pub fn compile(&self, name: &InterfaceName) -> Updates {
        let mut out = Updates::new();

        if let Some(sp) = self.switchport() {
            out.push(Update::merge(name.path(), Value::Object(sp)));
        }

        if let Some(stp) = self.stp {
            let id = name.to_string();
            out.push(Update::replace(
                path::stp_if(&id),
                json!({ "id": id, "mode": stp.to_string() }),
            ));
        }

        out
    }
}

impl std::str::FromStr for SpanningTreeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "edge" => SpanningTreeMode::Edge,
            "network" => SpanningTreeMode::Network,
            "trunk" => SpanningTreeMode::Trunk,
            other => {
                return Err(Error::invalid_value("spanning tree mode", other))
            }
        })
    }
}
