/*
 * Copyright 2025 Oxide Computer Company
 */

/*
 * Intent files describe the desired state of a device in TOML.  Each table
 * is turned into a validated entity, so a bad value is reported when the
 * file is loaded rather than halfway through talking to a device.
 */

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::entity::Configurable;
use crate::ifname::InterfaceName;
use crate::iface::AdminState;
use crate::l2::{L2Config, SpanningTreeMode, SwitchPortMode};
use crate::l3::{L3Config, Medium};
use crate::loopback::LoopbackInterface;
use crate::ospf::{LogLevel, OspfInterface, OspfProcess};
use crate::physical::PhysicalInterface;
use crate::portchannel::{PortChannel, PortChannelMode};
use crate::trustpoint::TrustAnchor;
use crate::vlan;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TemplateFile {
    interface: Option<TemplateInterface>,
    ospf: Option<BTreeMap<String, TemplateOspf>>,
    ospf_interface: Option<Vec<TemplateOspfInterface>>,
    trust_anchor: Option<BTreeMap<String, TemplateTrustAnchor>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TemplateInterface {
    ethernet: Option<BTreeMap<String, TemplateEthernet>>,
    loopback: Option<BTreeMap<String, TemplateLoopback>>,
    port_channel: Option<BTreeMap<String, TemplatePortChannel>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateEthernet {
    enable: Option<bool>,
    desc: Option<String>,
    mtu: Option<u16>,
    vrf: Option<String>,
    l2: Option<TemplateL2>,
    l3: Option<TemplateL3>,
}

impl TemplateEthernet {
    fn enable(&self) -> bool {
        self.enable.unwrap_or(true)
    }

    fn build(&self, name: &str) -> Result<PhysicalInterface> {
        let mut p = PhysicalInterface::new(name)?
            .admin_state(AdminState::from(self.enable()));
        if let Some(desc) = self.desc.as_deref() {
            p = p.description(desc);
        }
        if let Some(mtu) = self.mtu {
            p = p.mtu(mtu)?;
        }
        if let Some(vrf) = self.vrf.as_deref() {
            p = p.vrf(vrf)?;
        }
        match (&self.l2, &self.l3) {
            (Some(_), Some(_)) => bail!("cannot be both l2 and l3"),
            (Some(l2), None) => p = p.l2(l2.build()?),
            (None, Some(l3)) => p = p.l3(l3.build()?),
            (None, None) => (),
        }
        Ok(p)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateLoopback {
    enable: Option<bool>,
    desc: Option<String>,
    mtu: Option<u16>,
    vrf: Option<String>,
    l3: Option<TemplateL3>,
}

impl TemplateLoopback {
    fn enable(&self) -> bool {
        self.enable.unwrap_or(true)
    }

    fn build(&self, name: &str) -> Result<LoopbackInterface> {
        let mut lo = LoopbackInterface::new(name)?
            .admin_state(AdminState::from(self.enable()));
        if let Some(desc) = self.desc.as_deref() {
            lo = lo.description(desc);
        }
        if let Some(mtu) = self.mtu {
            lo = lo.mtu(mtu)?;
        }
        if let Some(vrf) = self.vrf.as_deref() {
            lo = lo.vrf(vrf)?;
        }
        if let Some(l3) = &self.l3 {
            lo = lo.l3(l3.build()?)?;
        }
        Ok(lo)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplatePortChannel {
    enable: Option<bool>,
    desc: Option<String>,
    mtu: Option<u16>,
    vrf: Option<String>,
    members: Option<Vec<String>>,
    mode: Option<PortChannelMode>,
    l2: Option<TemplateL2>,
    l3: Option<TemplateL3>,
}

impl TemplatePortChannel {
    fn enable(&self) -> bool {
        self.enable.unwrap_or(true)
    }

    fn build(&self, name: &str) -> Result<PortChannel> {
        let mut pc = PortChannel::new(name)?
            .admin_state(AdminState::from(self.enable()))
            .mode(self.mode.unwrap_or_default());
        if let Some(desc) = self.desc.as_deref() {
            pc = pc.description(desc);
        }
        if let Some(mtu) = self.mtu {
            pc = pc.mtu(mtu)?;
        }
        if let Some(vrf) = self.vrf.as_deref() {
            pc = pc.vrf(vrf)?;
        }
        if let Some(members) = &self.members {
            pc = pc.members(members.as_slice())?;
        }
        match (&self.l2, &self.l3) {
            (Some(_), Some(_)) => bail!("cannot be both l2 and l3"),
            (Some(l2), None) => pc = pc.l2(l2.build()?),
            (None, Some(l3)) => pc = pc.l3(l3.build()?),
            (None, None) => (),
        }
        Ok(pc)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateL2 {
    mode: Option<SwitchPortMode>,
    vlan: Option<u16>,
    native: Option<u16>,
    allowed: Option<String>,
    stp: Option<SpanningTreeMode>,
}

impl TemplateL2 {
    fn build(&self) -> Result<L2Config> {
        let mut l2 = L2Config::new();

        match self.mode {
            Some(SwitchPortMode::Access) => {
                if self.native.is_some() || self.allowed.is_some() {
                    bail!("access ports have no native or allowed VLANs");
                }
                let Some(vlan) = self.vlan else {
                    bail!("access ports need a VLAN");
                };
                l2 = l2.access(vlan)?;
            }
            Some(SwitchPortMode::Trunk) => {
                if self.vlan.is_some() {
                    bail!("trunk ports use \"native\", not \"vlan\"");
                }
                let allowed = match self.allowed.as_deref() {
                    Some(list) => vlan::expand(list)?,
                    None => BTreeSet::new(),
                };
                l2 = l2.trunk(self.native, allowed)?;
            }
            None => {
                if self.vlan.is_some()
                    || self.native.is_some()
                    || self.allowed.is_some()
                {
                    bail!("VLANs given without a switch port mode");
                }
            }
        }

        if let Some(stp) = self.stp {
            l2 = l2.spanning_tree(stp);
        }
        Ok(l2)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateL3 {
    medium: Option<Medium>,
    #[serde(default)]
    ipv4: Vec<String>,
    #[serde(default)]
    ipv6: Vec<String>,
    unnumbered: Option<String>,
}

impl TemplateL3 {
    fn build(&self) -> Result<L3Config> {
        let mut l3 = L3Config::new();
        if let Some(medium) = self.medium {
            l3 = l3.medium(medium)?;
        }

        if let Some(lo) = self.unnumbered.as_deref() {
            if !self.ipv4.is_empty() || !self.ipv6.is_empty() {
                bail!("unnumbered ports cannot have their own addresses");
            }
            l3 = l3.unnumbered(lo)?;
        } else if !self.ipv4.is_empty() || !self.ipv6.is_empty() {
            l3 = l3.numbered(self.ipv4.as_slice(), self.ipv6.as_slice())?;
        }
        Ok(l3)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateOspf {
    router_id: String,
    enable: Option<bool>,
    distance: Option<u32>,
    reference_bandwidth: Option<u32>,
    max_lsa: Option<u32>,
    log: Option<LogLevel>,
    default_originate: Option<bool>,
    redistribute: Option<Vec<TemplateRedistribute>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateRedistribute {
    protocol: String,
    route_map: String,
}

impl TemplateOspf {
    fn enable(&self) -> bool {
        self.enable.unwrap_or(true)
    }

    fn build(&self, name: &str) -> Result<OspfProcess> {
        let mut p = OspfProcess::new(name, &self.router_id)?
            .admin_state(AdminState::from(self.enable()))
            .log_level(self.log.unwrap_or_default())
            .default_originate(self.default_originate.unwrap_or(false));
        if let Some(d) = self.distance {
            p = p.distance(d)?;
        }
        if let Some(bw) = self.reference_bandwidth {
            p = p.reference_bandwidth(bw)?;
        }
        if let Some(n) = self.max_lsa {
            p = p.max_lsa(n)?;
        }
        for r in self.redistribute.iter().flatten() {
            p = p.redistribute(&r.protocol, &r.route_map)?;
        }
        Ok(p)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateOspfInterface {
    interface: String,
    process: String,
    area: String,
    vrf: Option<String>,
    #[serde(default)]
    point_to_point: bool,
    #[serde(default)]
    disable_passive: bool,
}

impl TemplateOspfInterface {
    fn build(&self) -> Result<OspfInterface> {
        let mut b =
            OspfInterface::new(&self.interface, &self.process, &self.area)?
                .point_to_point(self.point_to_point)
                .disable_passive(self.disable_passive);
        if let Some(vrf) = self.vrf.as_deref() {
            b = b.vrf(vrf)?;
        }
        Ok(b)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateTrustAnchor {}

/*
 * Make sure that two spellings of the same interface name do not both
 * appear in one section.
 */
fn check_unique<'a, I>(section: &str, names: I) -> Result<()>
where
    I: Iterator<Item = &'a String>,
{
    let mut seen = BTreeSet::new();
    for n in names {
        let name = InterfaceName::parse(n)
            .with_context(|| format!("{section} interface {n:?}"))?;
        if !seen.insert(name.clone()) {
            bail!("{section} interface {name} appears more than once");
        }
    }
    Ok(())
}

impl TemplateFile {
    pub fn parse(s: &str) -> Result<TemplateFile> {
        let t: TemplateFile = toml::from_str(s)?;

        if let Some(iface) = &t.interface {
            if let Some(eth) = &iface.ethernet {
                check_unique("ethernet", eth.keys())?;
            }
            if let Some(lo) = &iface.loopback {
                check_unique("loopback", lo.keys())?;
            }
            if let Some(pc) = &iface.port_channel {
                check_unique("port-channel", pc.keys())?;
            }
        }

        /*
         * Building every entity once checks all of the values.
         */
        t.entities()?;

        Ok(t)
    }

    /*
     * The entities in this file, ordered so that anything an entity refers
     * to comes before it.  Removal should walk the list backwards.
     */
    pub fn entities(&self) -> Result<Vec<Box<dyn Configurable>>> {
        let mut out: Vec<Box<dyn Configurable>> = Vec::new();

        for n in self.trust_anchor.iter().flat_map(|m| m.keys()) {
            let ta = TrustAnchor::new(n)
                .with_context(|| format!("trust anchor {n:?}"))?;
            out.push(Box::new(ta));
        }

        let iface = self.interface.as_ref();
        for (n, lo) in iface
            .and_then(|i| i.loopback.as_ref())
            .into_iter()
            .flatten()
        {
            let lo = lo.build(n).with_context(|| format!("loopback {n:?}"))?;
            out.push(Box::new(lo));
        }
        for (n, eth) in iface
            .and_then(|i| i.ethernet.as_ref())
            .into_iter()
            .flatten()
        {
            let eth = eth
                .build(n)
                .with_context(|| format!("ethernet interface {n:?}"))?;
            out.push(Box::new(eth));
        }
        for (n, pc) in iface
            .and_then(|i| i.port_channel.as_ref())
            .into_iter()
            .flatten()
        {
            let pc =
                pc.build(n).with_context(|| format!("port-channel {n:?}"))?;
            out.push(Box::new(pc));
        }

        for (n, p) in self.ospf.iter().flatten() {
            let p =
                p.build(n).with_context(|| format!("OSPF process {n:?}"))?;
            out.push(Box::new(p));
        }
        for (i, b) in self.ospf_interface.iter().flatten().enumerate() {
            let b = b.build().with_context(|| {
                format!("OSPF interface {:?} (entry {i})", b.interface)
            })?;
            out.push(Box::new(b));
        }

        Ok(out)
    }
}

pub fn load(name: &str) -> Result<TemplateFile> {
    let f = std::fs::read_to_string(name)
        .map_err(|e| anyhow!("reading {name:?}: {e}"))?;
    TemplateFile::parse(&f).with_context(|| format!("loading {name:?}"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::test::MockOracle;
    use crate::update::Update;
    use serde_json::json;

    const FULL: &str = r#"
        [trust_anchor.gnmi]

        [interface.loopback.lo0]
        desc = "router id"
        l3 = { ipv4 = ["10.255.0.1/32"] }

        [interface.ethernet."Ethernet1/1"]
        mtu = 9216
        l2 = { mode = "trunk", native = 200, allowed = "10,20-22", stp = "network" }

        [interface.ethernet."eth1/2"]
        l3 = { medium = "p2p", unnumbered = "lo0" }

        [interface.ethernet."eth1/3"]
        enable = false

        [interface.port_channel.po10]
        members = ["eth1/5", "eth1/6"]
        mode = "passive"
        l2 = { mode = "access", vlan = 30 }

        [ospf.1]
        router_id = "10.255.0.1"
        distance = 110
        redistribute = [{ protocol = "direct", route_map = "CONNECTED" }]

        [[ospf_interface]]
        interface = "eth1/2"
        process = "1"
        area = "0.0.0.0"
        point_to_point = true
    "#;

    #[test]
    fn dependency_order() -> Result<()> {
        let t = TemplateFile::parse(FULL)?;
        let names = t
            .entities()?
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>();

        assert_eq!(
            names,
            vec![
                "trust anchor gnmi",
                "loopback interface lo0",
                "physical interface eth1/1",
                "physical interface eth1/2",
                "physical interface eth1/3",
                "port-channel po10",
                "OSPF process 1",
                "OSPF interface eth1/2 (process 1, area 0.0.0.0)",
            ]
        );
        Ok(())
    }

    #[test]
    fn empty_file() -> Result<()> {
        assert!(TemplateFile::parse("")?.entities()?.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_fields() {
        assert!(TemplateFile::parse("[bogus]\n").is_err());
        assert!(TemplateFile::parse(
            "[interface.ethernet.\"eth1/1\"]\nspeed = 100\n"
        )
        .is_err());
    }

    #[test]
    fn construction_errors_name_the_entity() {
        let e =
            TemplateFile::parse("[interface.ethernet.\"eth1/1\"]\nmtu = 100\n")
                .unwrap_err();
        assert!(format!("{e:#}").contains("ethernet interface \"eth1/1\""));

        let e = TemplateFile::parse(
            "[interface.port_channel.po10]\nmembers = [\"lo0\"]\n",
        )
        .unwrap_err();
        assert!(format!("{e:#}").contains("port-channel \"po10\""));

        let e = TemplateFile::parse("[ospf.1]\nrouter_id = \"nope\"\n")
            .unwrap_err();
        assert!(format!("{e:#}").contains("OSPF process \"1\""));
    }

    #[test]
    fn bad_layers() {
        for bad in [
            "l2 = { mode = \"access\" }",
            "l2 = { mode = \"access\", vlan = 10, native = 20 }",
            "l2 = { mode = \"trunk\", vlan = 10 }",
            "l2 = { vlan = 10 }",
            "l2 = { mode = \"trunk\", allowed = \"10-x\" }",
            "l3 = { unnumbered = \"lo0\" }",
            "l3 = { medium = \"p2p\", unnumbered = \"lo0\", ipv4 = [\"10.0.0.0/31\"] }",
            "l3 = { ipv4 = [\"10.0.0.0/31\", \"10.0.0.1/31\"] }",
            "l2 = { mode = \"access\", vlan = 10 }\nl3 = { ipv4 = [\"10.0.0.0/31\"] }",
        ] {
            let doc = format!("[interface.ethernet.\"eth1/1\"]\n{bad}\n");
            assert!(TemplateFile::parse(&doc).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn duplicate_spellings() {
        let doc = "[interface.ethernet.\"eth1/1\"]\n\
            [interface.ethernet.\"Ethernet1/1\"]\n";
        let e = TemplateFile::parse(doc).unwrap_err();
        assert!(e.to_string().contains("more than once"));
    }

    #[test]
    fn loopbacks_are_routed_only() {
        assert!(TemplateFile::parse(
            "[interface.loopback.lo0]\nl3 = { medium = \"p2p\" }\n"
        )
        .is_err());
        assert!(TemplateFile::parse(
            "[interface.loopback.lo0]\nl2 = { mode = \"access\" }\n"
        )
        .is_err());
        assert!(TemplateFile::parse("[interface.loopback.lo0]\nmtu = 100\n")
            .is_err());
    }

    #[tokio::test]
    async fn loopback_mtu() -> Result<()> {
        let t =
            TemplateFile::parse("[interface.loopback.lo0]\nmtu = 9000\n")?;
        let e = t.entities()?;
        assert_eq!(e.len(), 1);

        let u = e[0].compile(&MockOracle::new()).await?;
        assert_eq!(u.len(), 1);
        assert_eq!(
            u[0],
            Update::replace(
                "System/intf-items/lb-items/LbRtdIf-list[id=lo0]",
                json!({ "id": "lo0", "adminSt": "up", "mtu": 9000 }),
            )
        );
        Ok(())
    }
}
