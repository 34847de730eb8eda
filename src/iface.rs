/*
 * Copyright 2025 Oxide Computer Company
 */

use log::trace;
use serde_json::{json, Map, Value};

use crate::client::Oracle;
use crate::error::{Error, Result};
use crate::ifname::InterfaceName;
use crate::l2::L2Config;
use crate::l3::L3Config;
use crate::path;
use crate::update::Updates;

pub const MTU_MIN: u16 = 576;
pub const MTU_MAX: u16 = 9216;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminState {
    #[default]
    Up,
    Down,
}

impl std::fmt::Display for AdminState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AdminState::Up => "up",
                AdminState::Down => "down",
            }
        )
    }
}

impl From<bool> for AdminState {
    fn from(enable: bool) -> Self {
        if enable {
            AdminState::Up
        } else {
            AdminState::Down
        }
    }
}

/*
 * An interface is either a switch port or a routed port, never both.
 * Replacing the layer drops whatever was configured for the other one.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum PortLayer {
    L2(L2Config),
    L3(L3Config),
}

pub fn check_mtu(mtu: u16) -> Result<u16> {
    if mtu < MTU_MIN || mtu > MTU_MAX {
        return Err(Error::out_of_range(
            "MTU",
            mtu,
            MTU_MIN.into(),
            MTU_MAX.into(),
        ));
    }
    Ok(mtu)
}

pub fn check_vrf(vrf: &str) -> Result<String> {
    let bad = |c: char| matches!(c, '[' | ']' | '/' | '\'');
    if vrf.is_empty() || vrf.contains(bad) {
        return Err(Error::invalid_value("VRF name", vrf));
    }
    Ok(vrf.to_string())
}

/*
 * The settings shared by every kind of interface base node.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Common {
    pub description: Option<String>,
    pub admin: AdminState,
    pub mtu: Option<u16>,
    pub vrf: Option<String>,
}

impl Common {
    pub fn vrf(&self) -> &str {
        self.vrf.as_deref().unwrap_or(path::DEFAULT_VRF)
    }

    /*
     * Produce the base node value.  The caller folds layer-specific fields
     * into it before emitting it as a Replace.
     */
    pub fn base(&self, id: &str) -> Map<String, Value> {
        let mut o = Map::new();
        o.insert("id".into(), json!(id));
        o.insert("adminSt".into(), json!(self.admin.to_string()));
        if let Some(d) = &self.description {
            o.insert("descr".into(), json!(d));
        }
        if let Some(mtu) = self.mtu {
            o.insert("mtu".into(), json!(mtu));
        }
        if let Some(vrf) = &self.vrf {
            o.insert(
                "rtvrfMbr-items".into(),
                json!({ "tDn": path::vrf_dn(vrf) }),
            );
        }
        o
    }
}

/*
 * The base node of a port (physical or aggregate), with the layer
 * discriminator and switch port or medium fields folded in.
 */
pub(crate) fn port_base(
    name: &InterfaceName,
    common: &Common,
    layer: Option<&PortLayer>,
) -> Map<String, Value> {
    let mut o = common.base(&name.to_string());
    match layer {
        Some(PortLayer::L2(l2)) => l2.fold(&mut o),
        Some(PortLayer::L3(l3)) => l3.fold(&mut o),
        None => (),
    }
    o
}

/*
 * The updates that hang off a port's base node once it has been replaced.
 */
pub(crate) fn layer_updates(
    name: &InterfaceName,
    common: &Common,
    layer: Option<&PortLayer>,
) -> Updates {
    match layer {
        Some(PortLayer::L2(l2)) => l2.compile(name),
        Some(PortLayer::L3(l3)) => l3.compile(name, common.vrf()),
        None => Updates::new(),
    }
}

pub(crate) async fn check_layer(
    o: &dyn Oracle,
    layer: Option<&PortLayer>,
) -> Result<()> {
    if let Some(PortLayer::L3(l3)) = layer {
        l3.check_dependencies(o).await?;
    }
    Ok(())
}

/*
 * Record which fields were set by the operator rather than left at the
 * device default.  The device ignores layer and MTU settings that are not
 * flagged here.
 */
pub(crate) fn user_configured_flags(o: &mut Map<String, Value>) {
    let mut flags = vec!["admin_state"];
    if o.contains_key("layer") {
        flags.push("admin_layer");
    }
    if o.contains_key("mtu") {
        flags.push("admin_mtu");
    }
    o.insert("userCfgdFlags".into(), json!(flags.join(",")));
}

/*
 * Fail with a dependency error unless the node at "path" is present on the
 * device.  Transport failures pass through unchanged.
 */
pub(crate) async fn require(
    o: &dyn Oracle,
    what: impl std::fmt::Display,
    path: String,
) -> Result<()> {
    trace!("checking for {what} at {path}");
    if o.exists(&path).await? {
        Ok(())
    } else {
        Err(Error::MissingDependency { what: what.to_string(), path })
    }
}
