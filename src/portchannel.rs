/*
 * Copyright 2025 Oxide Computer Company
 */

use std::collections::BTreeSet;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
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

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortChannelMode {
    #[default]
    Active,
    Passive,
    On,
}

impl std::fmt::Display for PortChannelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PortChannelMode::Active => "active",
                PortChannelMode::Passive => "passive",
                PortChannelMode::On => "on",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortChannel {
    name: InterfaceName,
    common: Common,
    layer: Option<PortLayer>,
    members: BTreeSet<InterfaceName>,
    mode: PortChannelMode,
}

impl PortChannel {
    pub fn new(name: &str) -> Result<PortChannel> {
        Ok(PortChannel {
            name: InterfaceName::parse_port_channel(name)?,
            common: Default::default(),
            layer: None,
            members: Default::default(),
            mode: Default::default(),
        })
    }

    pub fn name(&self) -> &InterfaceName {
        &self.name
    }

    pub fn description(mut self, desc: &str) -> PortChannel {
        self.common.description = Some(desc.to_string());
        self
    }

    pub fn admin_state(mut self, st: AdminState) -> PortChannel {
        self.common.admin = st;
        self
    }

    pub fn mtu(mut self, mtu: u16) -> Result<PortChannel> {
        self.common.mtu = Some(iface::check_mtu(mtu)?);
        Ok(self)
    }

    pub fn vrf(mut self, vrf: &str) -> Result<PortChannel> {
        self.common.vrf = Some(iface::check_vrf(vrf)?);
        Ok(self)
    }

    /*
     * Members are physical ports, named in either long or short form.
     */
    pub fn members<S: AsRef<str>>(
        mut self,
        members: &[S],
    ) -> Result<PortChannel> {
        self.members = members
            .iter()
            .map(|m| InterfaceName::parse_ethernet(m.as_ref()))
            .collect::<Result<_>>()?;
        Ok(self)
    }

    pub fn mode(mut self, mode: PortChannelMode) -> PortChannel {
        self.mode = mode;
        self
    }

    pub fn l2(mut self, l2: L2Config) -> PortChannel {
        self.layer = Some(PortLayer::L2(l2));
        self
    }

    pub fn l3(mut self, l3: L3Config) -> PortChannel {
        self.layer = Some(PortLayer::L3(l3));
        self
    }
}

impl std::fmt::Display for PortChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "port-channel {}", self.name)
    }
}

#[async_trait]
impl Configurable for PortChannel {
    async fn compile(&self, o: &dyn Oracle) -> Result<Updates> {
        /*
         * Check every reference before producing anything, so that a missing
         * member never leaves a partial update list behind.
         */
        for m in &self.members {
            iface::require(o, format!("member interface {m}"), m.path())
                .await?;
        }
        iface::check_layer(o, self.layer.as_ref()).await?;

        let mut base =
            iface::port_base(&self.name, &self.common, self.layer.as_ref());
        base.insert("pcMode".into(), json!(self.mode.to_string()));
        if !self.members.is_empty() {
            let members = self
                .members
                .iter()
                .map(|m| json!({ "tDn": path::phys_if_dn(&m.to_string()) }))
                .collect::<Vec<_>>();
            base.insert(
                "rsmbrIfs-items".into(),
                json!({ "RsMbrIfs-list": members }),
            );
        }
        iface::user_configured_flags(&mut base);

        let mut out = Updates::new();
        out.push(Update::merge(
            path::FEATURE_LACP,
            json!({ "adminSt": "enabled" }),
        ));
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
     * Unlike a physical port, the aggregate itself is deleted.  The spanning
     * tree settings are a sibling subtree with no ordering dependency on it.
     */
    async fn reset(&self, o: &dyn Oracle) -> Result<Updates> {
        let mut out = Updates::new();
        out.push(Update::delete(self.name.path()));

        let stp = path::stp_if(&self.name.to_string());
        if o.exists(&stp).await? {
            out.push(Update::delete(stp));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::test::MockOracle;
    use crate::error::ErrorKind;
    use crate::l2::SpanningTreeMode;

    const ETH1: &str = "System/intf-items/phys-items/PhysIf-list[id=eth1/1]";
    const ETH2: &str = "System/intf-items/phys-items/PhysIf-list[id=eth1/2]";
    const STP: &str = "System/stp-items/inst-items/if-items/If-list[id=po10]";

    #[test]
    fn construction() {
        assert!(PortChannel::new("Port-Channel10").is_ok());
        assert!(PortChannel::new("po0").is_err());
        assert!(PortChannel::new("eth1/1").is_err());

        let pc = PortChannel::new("po1").unwrap();
        assert!(pc.clone().members(&["eth1/1", "Ethernet1/2"]).is_ok());
        assert!(pc.members(&["eth1/1", "lo0"]).is_err());
    }

    #[tokio::test]
    async fn compile() -> Result<()> {
        let pc = PortChannel::new("po10")?
            .members(&["Ethernet1/2", "eth1/1"])?
            .mode(PortChannelMode::Active)
            .mtu(9216)?
            .l2(L2Config::new()
                .trunk(None, [100, 101, 102].into())?
                .spanning_tree(SpanningTreeMode::Network));

        let o = MockOracle::with(&[ETH1, ETH2]);
        let u = pc.compile(&o).await?;

        assert_eq!(u.len(), 4);
        assert_eq!(
            u[0],
            Update::merge(
                "System/fm-items/lacp-items",
                json!({ "adminSt": "enabled" })
            )
        );
        assert_eq!(
            u[1],
            Update::replace(
                "System/intf-items/aggr-items/AggrIf-list[id=po10]",
                json!({
                    "id": "po10",
                    "adminSt": "up",
                    "mtu": 9216,
                    "layer": "Layer2",
                    "mode": "trunk",
                    "trunkVlans": "100-102",
                    "pcMode": "active",
                    "rsmbrIfs-items": { "RsMbrIfs-list": [
                        { "tDn": "/System/intf-items/phys-items/PhysIf-list[id='eth1/1']" },
                        { "tDn": "/System/intf-items/phys-items/PhysIf-list[id='eth1/2']" },
                    ]},
                    "userCfgdFlags": "admin_state,admin_layer,admin_mtu",
                }),
            )
        );
        assert!(u[2].is_merge());
        assert_eq!(u[3].path(), STP);
        Ok(())
    }

    #[tokio::test]
    async fn missing_member_is_a_dependency_error() -> Result<()> {
        let pc = PortChannel::new("po10")?.members(&["eth1/1", "eth1/2"])?;

        let o = MockOracle::with(&[ETH1]);
        let e = pc.compile(&o).await.unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Dependency);
        assert!(e.to_string().contains("eth1/2"));

        let e = pc.compile(&MockOracle::down()).await.unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Transport);
        Ok(())
    }

    #[tokio::test]
    async fn reset() -> Result<()> {
        let pc = PortChannel::new("po10")?;

        let u = pc.reset(&MockOracle::with(&[STP])).await?;
        assert_eq!(
            u.into_vec(),
            vec![
                Update::delete(
                    "System/intf-items/aggr-items/AggrIf-list[id=po10]"
                ),
                Update::delete(STP),
            ]
        );

        let u = pc.reset(&MockOracle::new()).await?;
        assert_eq!(u.len(), 1);
        Ok(())
    }
}
