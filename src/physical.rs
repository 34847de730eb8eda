/*
 * Copyright 2025 Oxide Computer Company
 */

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{json, Value};

use crate::client::Oracle;
use crate::entity::Configurable;
use crate::error::Result;
use crate::iface::{self, AdminState, Common, PortLayer};
use crate::ifname::InterfaceName;
use crate::l2::L2Config;
use crate::l3::L3Config;
use crate::path;
use crate::update::{Update, Updates};

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalInterface {
    name: InterfaceName,
    common: Common,
    layer: Option<PortLayer>,
}

impl PhysicalInterface {
    pub fn new(name: &str) -> Result<PhysicalInterface> {
        Ok(PhysicalInterface {
            name: InterfaceName::parse_ethernet(name)?,
            common: Default::default(),
            layer: None,
        })
    }

    pub fn name(&self) -> &InterfaceName {
        &self.name
    }

    pub fn description(mut self, desc: &str) -> PhysicalInterface {
        self.common.description = Some(desc.to_string());
        self
    }

    pub fn admin_state(mut self, st: AdminState) -> PhysicalInterface {
        self.common.admin = st;
        self
    }

    pub fn mtu(mut self, mtu: u16) -> Result<PhysicalInterface> {
        self.common.mtu = Some(iface::check_mtu(mtu)?);
        Ok(self)
    }

    pub fn vrf(mut self, vrf: &str) -> Result<PhysicalInterface> {
        self.common.vrf = Some(iface::check_vrf(vrf)?);
        Ok(self)
    }

    /*
     * Make this a switch port, discarding any routed port configuration.
     */
    pub fn l2(mut self, l2: L2Config) -> PhysicalInterface {
        self.layer = Some(PortLayer::L2(l2));
        self
    }

    /*
     * Make this a routed port, discarding any switch port configuration.
     */
    pub fn l3(mut self, l3: L3Config) -> PhysicalInterface {
        self.layer = Some(PortLayer::L3(l3));
        self
    }
}

impl std::fmt::Display for PhysicalInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "physical interface {}", self.name)
    }
}

#[async_trait]
impl Configurable for PhysicalInterface {
    async fn compile(&self, o: &dyn Oracle) -> Result<Updates> {
        iface::check_layer(o, self.layer.as_ref()).await?;

        let mut base =
            iface::port_base(&self.name, &self.common, self.layer.as_ref());
        iface::user_configured_flags(&mut base);

        let mut out = Updates::new();
        out.push(Update::replace(self.name.path(), Value::Object(base)));
        out.extend(iface::layer_updates(
            &self.name,
            &self.common,
            self.layer.as_ref(),
        ));

        debug!("{self}: compiled {} updates", out.len());
        Ok(out)
    }

    /*
     * A physical port cannot be removed, only returned to its defaults.  The
     * spanning tree settings live elsewhere in the tree and must go first,
     * but only if they are there at all.
     */
    async fn reset(&self, o: &dyn Oracle) -> Result<Updates> {
        let mut out = Updates::new();

        let stp = path::stp_if(&self.name.to_string());
        if o.exists(&stp).await? {
            out.push(Update::delete(stp));
        } else {
            warn!("{self}: no spanning tree settings to remove");
        }

        out.push(Update::replace(self.name.path(), json!({})));
        Ok(out)
    }
}
