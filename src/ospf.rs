/*
 * Copyright 2025 Oxide Computer Company
 */

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::client::Oracle;
use crate::entity::Configurable;
use crate::error::{Error, Result};
use crate::iface::{self, AdminState};
use crate::ifname::InterfaceName;
use crate::path;
use crate::update::{Update, Updates};

pub const DISTANCE_MIN: u32 = 1;
pub const DISTANCE_MAX: u32 = 255;
pub const REFERENCE_BANDWIDTH_MIN: u32 = 1;
pub const REFERENCE_BANDWIDTH_MAX: u32 = 999_999;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    None,
    Brief,
    Detail,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                LogLevel::None => "none",
                LogLevel::Brief => "brief",
                LogLevel::Detail => "detail",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RedistributeProtocol {
    Direct,
    Static,
}

impl std::str::FromStr for RedistributeProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "direct" => RedistributeProtocol::Direct,
            "static" => RedistributeProtocol::Static,
            other => {
                return Err(Error::invalid_value(
                    "redistribution protocol",
                    other,
                ))
            }
        })
    }
}

impl std::fmt::Display for RedistributeProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RedistributeProtocol::Direct => "direct",
                RedistributeProtocol::Static => "static",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Redistribution {
    pub protocol: RedistributeProtocol,
    pub route_map: String,
}

fn enabled(st: AdminState) -> &'static str {
    match st {
        AdminState::Up => "enabled",
        AdminState::Down => "disabled",
    }
}

/*
 * OSPF area identifiers are 32-bit numbers that may be written either as a
 * plain decimal number or in dotted-quad form.  The latter is not an
 * address, it is just another way of spelling the number.
 */
pub fn parse_area(s: &str) -> Result<u32> {
    if s.contains('.') {
        s.parse::<Ipv4Addr>()
            .map(u32::from)
            .map_err(|_| Error::invalid_value("OSPF area", s))
    } else if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse::<u32>().map_err(|_| Error::invalid_value("OSPF area", s))
    } else {
        Err(Error::invalid_value("OSPF area", s))
    }
}

fn area_string(area: u32) -> String {
    Ipv4Addr::from(area).to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct OspfProcess {
    name: String,
    router_id: Ipv4Addr,
    admin: AdminState,
    distance: Option<u8>,
    reference_bandwidth: Option<u32>,
    max_lsa: Option<u32>,
    log: LogLevel,
    default_originate: bool,
    redistribution: BTreeSet<Redistribution>,
}

impl OspfProcess {
    pub fn new(name: &str, router_id: &str) -> Result<OspfProcess> {
        if name.is_empty() {
            return Err(Error::invalid_value("OSPF process name", name));
        }
        let router_id = router_id
            .parse::<Ipv4Addr>()
            .map_err(|_| Error::invalid_value("router ID", router_id))?;

        Ok(OspfProcess {
            name: name.to_string(),
            router_id,
            admin: AdminState::Up,
            distance: None,
            reference_bandwidth: None,
            max_lsa: None,
            log: LogLevel::None,
            default_originate: false,
            redistribution: Default::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn admin_state(mut self, st: AdminState) -> OspfProcess {
        self.admin = st;
        self
    }

    pub fn distance(mut self, d: u32) -> Result<OspfProcess> {
        if d < DISTANCE_MIN || d > DISTANCE_MAX {
            return Err(Error::out_of_range(
                "administrative distance",
                d,
                DISTANCE_MIN.into(),
                DISTANCE_MAX.into(),
            ));
        }
        self.distance = Some(d as u8);
        Ok(self)
    }

    /*
     * In Mbps.
     */
    pub fn reference_bandwidth(mut self, bw: u32) -> Result<OspfProcess> {
        if bw < REFERENCE_BANDWIDTH_MIN || bw > REFERENCE_BANDWIDTH_MAX {
            return Err(Error::out_of_range(
                "reference bandwidth",
                bw,
                REFERENCE_BANDWIDTH_MIN.into(),
                REFERENCE_BANDWIDTH_MAX.into(),
            ));
        }
        self.reference_bandwidth = Some(bw);
        Ok(self)
    }

    pub fn max_lsa(mut self, n: u32) -> Result<OspfProcess> {
        if n == 0 {
            return Err(Error::out_of_range("max LSA", n, 1, u32::MAX.into()));
        }
        self.max_lsa = Some(n);
        Ok(self)
    }

    pub fn log_level(mut self, log: LogLevel) -> OspfProcess {
        self.log = log;
        self
    }

    pub fn default_originate(mut self, on: bool) -> OspfProcess {
        self.default_originate = on;
        self
    }

    pub fn redistribute(
        mut self,
        protocol: &str,
        route_map: &str,
    ) -> Result<OspfProcess> {
        let protocol = protocol.parse::<RedistributeProtocol>()?;
        if route_map.is_empty() {
            return Err(Error::invalid_value("route map", route_map));
        }

        let r = Redistribution { protocol, route_map: route_map.to_string() };
        if self.redistribution.contains(&r) {
            return Err(Error::Duplicate {
                what: "redistribution",
                value: format!("{protocol} route-map {route_map}"),
            });
        }
        self.redistribution.insert(r);
        Ok(self)
    }

    fn domain(&self) -> Map<String, Value> {
        let mut o = Map::new();
        o.insert("name".into(), json!(path::DEFAULT_VRF));
        o.insert("adminSt".into(), json!("enabled"));
        o.insert("rtrId".into(), json!(self.router_id.to_string()));
        o.insert("adjChangeLogLevel".into(), json!(self.log.to_string()));

        if let Some(d) = self.distance {
            o.insert("dist".into(), json!(d));
        }
        if let Some(bw) = self.reference_bandwidth {
            o.insert("bwRef".into(), json!(bw));
            o.insert("bwRefUnit".into(), json!("mbps"));
        }
        if let Some(n) = self.max_lsa {
            o.insert(
                "maxlsap-items".into(),
                json!({ "maxLsa": n, "action": "reject" }),
            );
        }
        if self.default_originate {
            o.insert("defrtleak-items".into(), json!({ "always": "no" }));
        }
        if !self.redistribution.is_empty() {
            let leaks = self
                .redistribution
                .iter()
                .map(|r| {
                    json!({
                        "proto": r.protocol.to_string(),
                        "inst": "none",
                        "asn": "none",
                        "rtMap": r.route_map,
                    })
                })
                .collect::<Vec<_>>();
            o.insert(
                "interleak-items".into(),
                json!({ "InterLeakP-list": leaks }),
            );
        }

        o
    }
}

impl std::fmt::Display for OspfProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OSPF process {}", self.name)
    }
}

#[async_trait]
impl Configurable for OspfProcess {
    async fn compile(&self, _o: &dyn Oracle) -> Result<Updates> {
        let mut out = Updates::new();
        out.push(Update::merge(
            path::FEATURE_OSPF,
            json!({ "adminSt": "enabled" }),
        ));
        out.push(Update::replace(
            path::ospf_inst(&self.name),
            json!({
                "name": self.name,
                "adminSt": enabled(self.admin),
                "dom-items": { "Dom-list": [Value::Object(self.domain())] },
            }),
        ));

        debug!("{self}: compiled {} updates", out.len());
        Ok(out)
    }

    async fn reset(&self, _o: &dyn Oracle) -> Result<Updates> {
        Ok(vec![Update::delete(path::ospf_inst(&self.name))].into())
    }
}

/*
 * Attaches an interface to an area of an OSPF process.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct OspfInterface {
    name: InterfaceName,
    process: String,
    vrf: String,
    area: u32,
    point_to_point: bool,
    passive_disabled: bool,
}

impl OspfInterface {
    pub fn new(
        interface: &str,
        process: &str,
        area: &str,
    ) -> Result<OspfInterface> {
        if process.is_empty() {
            return Err(Error::invalid_value("OSPF process name", process));
        }

        Ok(OspfInterface {
            name: InterfaceName::parse(interface)?,
            process: process.to_string(),
            vrf: path::DEFAULT_VRF.to_string(),
            area: parse_area(area)?,
            point_to_point: false,
            passive_disabled: false,
        })
    }

    pub fn vrf(mut self, vrf: &str) -> Result<OspfInterface> {
        self.vrf = iface::check_vrf(vrf)?;
        Ok(self)
    }

    pub fn point_to_point(mut self, on: bool) -> OspfInterface {
        self.point_to_point = on;
        self
    }

    /*
     * Explicitly keep the interface out of passive mode, even if the
     * process makes interfaces passive by default.
     */
    pub fn disable_passive(mut self, on: bool) -> OspfInterface {
        self.passive_disabled = on;
        self
    }

    pub fn area(&self) -> u32 {
        self.area
    }

    fn path(&self) -> String {
        path::ospf_if(&self.process, &self.vrf, &self.name.to_string())
    }
}

impl std::fmt::Display for OspfInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OSPF interface {} (process {}, area {})",
            self.name,
            self.process,
            area_string(self.area)
        )
    }
}

#[async_trait]
impl Configurable for OspfInterface {
    async fn compile(&self, o: &dyn Oracle) -> Result<Updates> {
        iface::require(
            o,
            format!("{} {}", self.name.kind(), self.name),
            self.name.path(),
        )
        .await?;

        let mut v = Map::new();
        v.insert("id".into(), json!(self.name.to_string()));
        v.insert("adminSt".into(), json!("enabled"));
        v.insert("area".into(), json!(area_string(self.area)));
        if self.point_to_point {
            v.insert("nwT".into(), json!("p2p"));
        }
        if self.passive_disabled {
            v.insert("passive".into(), json!("disabled"));
        }

        debug!("{self}: compiled 1 update");
        Ok(vec![Update::replace(self.path(), Value::Object(v))].into())
    }

    async fn reset(&self, _o: &dyn Oracle) -> Result<Updates> {
        Ok(vec![Update::delete(self.path())].into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::test::MockOracle;
    use crate::error::ErrorKind;

    #[test]
    fn areas() {
        assert_eq!(parse_area("0").unwrap(), 0);
        assert_eq!(parse_area("0.0.0.1").unwrap(), 1);
        assert_eq!(parse_area("4294967295").unwrap(), u32::MAX);
        assert_eq!(parse_area("0.0.1.0").unwrap(), 256);
        assert_eq!(parse_area("255.255.255.255").unwrap(), u32::MAX);

        assert!(parse_area("4294967296").is_err());
        assert!(parse_area("not-an-ip").is_err());
        assert!(parse_area("1.2.3").is_err());
        assert!(parse_area("-1").is_err());
        assert!(parse_area("+5").is_err());
        assert!(parse_area(" 5").is_err());
        assert!(parse_area("").is_err());

        assert_eq!(area_string(1), "0.0.0.1");
    }

    #[test]
    fn process_validation() {
        assert!(OspfProcess::new("", "1.1.1.1").is_err());
        assert!(OspfProcess::new("UNDERLAY", "1.1.1").is_err());

        let p = OspfProcess::new("UNDERLAY", "10.0.0.1").unwrap();
        assert!(p.clone().distance(0).is_err());
        assert!(p.clone().distance(256).is_err());
        assert!(p.clone().distance(255).is_ok());
        assert!(p.clone().reference_bandwidth(0).is_err());
        assert!(p.clone().reference_bandwidth(1_000_000).is_err());
        assert!(p.clone().reference_bandwidth(999_999).is_ok());
        assert!(p.clone().max_lsa(0).is_err());
        assert!(p.clone().max_lsa(1).is_ok());
        assert!(p.clone().redistribute("bgp", "RM").is_err());
        assert!(p.clone().redistribute("static", "").is_err());
    }

    #[test]
    fn duplicate_redistribution() {
        let p = OspfProcess::new("UNDERLAY", "10.0.0.1")
            .unwrap()
            .redistribute("static", "RM-STATIC")
            .unwrap()
            .redistribute("direct", "RM-STATIC")
            .unwrap();

        assert!(matches!(
            p.clone().redistribute("static", "RM-STATIC"),
            Err(Error::Duplicate { .. })
        ));
        assert!(p.redistribute("static", "RM-OTHER").is_ok());
    }

    #[tokio::test]
    async fn process_compile() -> Result<()> {
        let p = OspfProcess::new("UNDERLAY", "10.0.0.1")?
            .distance(110)?
            .reference_bandwidth(400_000)?
            .max_lsa(12000)?
            .log_level(LogLevel::Detail)
            .default_originate(true)
            .redistribute("static", "RM-STATIC")?;

        let o = MockOracle::down();
        let u = p.compile(&o).await?;
        assert!(o.queries().is_empty());

        assert_eq!(u.len(), 2);
        assert_eq!(
            u[0],
            Update::merge(
                "System/fm-items/ospf-items",
                json!({ "adminSt": "enabled" })
            )
        );
        assert_eq!(
            u[1],
            Update::replace(
                "System/ospf-items/inst-items/Inst-list[name=UNDERLAY]",
                json!({
                    "name": "UNDERLAY",
                    "adminSt": "enabled",
                    "dom-items": { "Dom-list": [{
                        "name": "default",
                        "adminSt": "enabled",
                        "rtrId": "10.0.0.1",
                        "adjChangeLogLevel": "detail",
                        "dist": 110,
                        "bwRef": 400000,
                        "bwRefUnit": "mbps",
                        "maxlsap-items": { "maxLsa": 12000, "action": "reject" },
                        "defrtleak-items": { "always": "no" },
                        "interleak-items": { "InterLeakP-list": [{
                            "proto": "static",
                            "inst": "none",
                            "asn": "none",
                            "rtMap": "RM-STATIC",
                        }]},
                    }]},
                }),
            )
        );
        Ok(())
    }

    #[tokio::test]
    async fn log_level_always_present() -> Result<()> {
        for (l, want) in [
            (LogLevel::None, "none"),
            (LogLevel::Brief, "brief"),
            (LogLevel::Detail, "detail"),
        ] {
            let p = OspfProcess::new("P", "1.1.1.1")?.log_level(l);
            let u = p.compile(&MockOracle::new()).await?;
            let dom = &u[1].value().unwrap()["dom-items"]["Dom-list"][0];
            assert_eq!(dom["adjChangeLogLevel"], json!(want));
            assert!(dom.get("dist").is_none());
            assert!(dom.get("interleak-items").is_none());
        }
        Ok(())
    }

    #[tokio::test]
    async fn process_reset() -> Result<()> {
        let p = OspfProcess::new("UNDERLAY", "10.0.0.1")?
            .admin_state(AdminState::Down);
        let u = p.reset(&MockOracle::new()).await?;
        assert_eq!(
            u.into_vec(),
            vec![Update::delete(
                "System/ospf-items/inst-items/Inst-list[name=UNDERLAY]"
            )]
        );
        Ok(())
    }

    #[tokio::test]
    async fn interface_binding() -> Result<()> {
        let b = OspfInterface::new("Ethernet1/1", "OSPF1", "0.0.0.0")?
            .point_to_point(true)
            .disable_passive(true);

        let o = MockOracle::with(&[
            "System/intf-items/phys-items/PhysIf-list[id=eth1/1]",
        ]);
        let u = b.compile(&o).await?;
        assert_eq!(
            u.into_vec(),
            vec![Update::replace(
                "System/ospf-items/inst-items/Inst-list[name=OSPF1]\
                /dom-items/Dom-list[name=default]/if-items/If-list[id=eth1/1]",
                json!({
                    "id": "eth1/1",
                    "adminSt": "enabled",
                    "area": "0.0.0.0",
                    "nwT": "p2p",
                    "passive": "disabled",
                }),
            )]
        );

        let u = b.reset(&o).await?;
        assert!(u[0].is_delete());
        Ok(())
    }

    #[tokio::test]
    async fn interface_binding_needs_interface() -> Result<()> {
        let b = OspfInterface::new("lo0", "OSPF1", "100")?.vrf("blue")?;
        assert_eq!(b.area(), 100);

        let e = b.compile(&MockOracle::new()).await.unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Dependency);

        let e = b.compile(&MockOracle::down()).await.unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Transport);

        let o = MockOracle::with(&[
            "System/intf-items/lb-items/LbRtdIf-list[id=lo0]",
        ]);
        let u = b.compile(&o).await?;
        assert!(u[0].path().contains("Dom-list[name=blue]"));
        assert_eq!(u[0].value().unwrap()["area"], json!("0.0.0.100"));
        Ok(())
    }

    #[test]
    fn interface_binding_validation() {
        assert!(OspfInterface::new("eth1/1", "", "0").is_err());
        assert!(OspfInterface::new("gi1", "P", "0").is_err());
        assert!(OspfInterface::new("eth1/1", "P", "4294967296").is_err());
        assert!(OspfInterface::new("eth1/1", "P", "not-an-ip").is_err());
    }
}
