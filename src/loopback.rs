/*
 * Copyright 2025 Oxide Computer Company
 */

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::client::Oracle;
use crate::entity::Configurable;
use crate::error::{Error, Result};
use crate::iface::{self, AdminState, Common};
use crate::ifname::InterfaceName;
use crate::l3::L3Config;
use crate::update::{Update, Updates};

/*
 * Loopbacks are always routed and have no physical medium, so only numbered
 * addressing makes sense for them.  There is no Layer-2 configuration.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct LoopbackInterface {
    name: InterfaceName,
    common: Common,
    l3: Option<L3Config>,
}

impl LoopbackInterface {
    pub fn new(name: &str) -> Result<LoopbackInterface> {
        Ok(LoopbackInterface {
            name: InterfaceName::parse_loopback(name)?,
            common: Default::default(),
            l3: None,
        })
    }

    pub fn name(&self) -> &InterfaceName {
        &self.name
    }

    pub fn description(mut self, desc: &str) -> LoopbackInterface {
        self.common.description = Some(desc.to_string());
        self
    }

    pub fn admin_state(mut self, st: AdminState) -> LoopbackInterface {
        self.common.admin = st;
        self
    }

    pub fn mtu(mut self, mtu: u16) -> Result<LoopbackInterface> {
        self.common.mtu = Some(iface::check_mtu(mtu)?);
        Ok(self)
    }

    pub fn vrf(mut self, vrf: &str) -> Result<LoopbackInterface> {
        self.common.vrf = Some(iface::check_vrf(vrf)?);
        Ok(self)
    }

    pub fn l3(mut self, l3: L3Config) -> Result<LoopbackInterface> {
        if l3.is_unnumbered() {
            return Err(Error::Invalid(format!(
                "{} cannot use unnumbered addressing",
                self.name
            )));
        }
        if l3.has_medium() {
            return Err(Error::Invalid(format!(
                "{} cannot have a medium",
                self.name
            )));
        }

        self.l3 = Some(l3);
        Ok(self)
    }
}

impl std::fmt::Display for LoopbackInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "loopback interface {}", self.name)
    }
}

#[async_trait]
impl Configurable for LoopbackInterface {
    async fn compile(&self, _o: &dyn Oracle) -> Result<Updates> {
        let base = self.common.base(&self.name.to_string());

        let mut out = Updates::new();
        out.push(Update::replace(self.name.path(), Value::Object(base)));
        if let Some(l3) = &self.l3 {
            out.extend(l3.compile(&self.name, self.common.vrf()));
        }

        debug!("{self}: compiled {} updates", out.len());
        Ok(out)
    }

    async fn reset(&self, _o: &dyn Oracle) -> Result<Updates> {
        Ok(vec![Update::delete(self.name.path())].into())
    }
}
