/*
 * Copyright 2025 Oxide Computer Company
 */

use std::str::FromStr;

use ipnetwork::{Ipv4Network, Ipv6Network};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::client::Oracle;
use crate::error::{Error, Result};
use crate::ifname::InterfaceName;
use crate::iface::require;
use crate::path;
use crate::update::{Update, Updates};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
pub enum Medium {
    #[serde(rename = "broadcast")]
    Broadcast,
    #[serde(rename = "p2p")]
    PointToPoint,
}

impl std::fmt::Display for Medium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Medium::Broadcast => "broadcast",
                Medium::PointToPoint => "p2p",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Addressing {
    Numbered { ipv4: Vec<Ipv4Network>, ipv6: Vec<Ipv6Network> },
    Unnumbered(InterfaceName),
}

/*
 * Routed port settings.  A port either carries its own prefixes or borrows
 * the address of a loopback, and the latter is only possible on a
 * point-to-point medium.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct L3Config {
    medium: Option<Medium>,
    addressing: Option<Addressing>,
}

fn parse_prefixes<N, S>(what: &'static str, list: &[S]) -> Result<Vec<N>>
where
    N: FromStr,
    S: AsRef<str>,
{
    list.iter()
        .map(|s| {
            let s = s.as_ref();
            if !s.contains('/') {
                return Err(Error::invalid_value(what, s));
            }
            N::from_str(s).map_err(|_| Error::invalid_value(what, s))
        })
        .collect()
}

/*
 * Reject any pair of prefixes that are identical or whose ranges intersect.
 * These lists are short, so the pairwise check is fine.
 */
fn check_disjoint<N>(
    list: &[N],
    same: impl Fn(&N, &N) -> bool,
    overlaps: impl Fn(&N, &N) -> bool,
) -> Result<()>
where
    N: std::fmt::Display,
{
    for (i, a) in list.iter().enumerate() {
        for b in list.iter().skip(i + 1) {
            if same(a, b) {
                return Err(Error::Duplicate {
                    what: "prefix",
                    value: a.to_string(),
                });
            }
            if overlaps(a, b) {
                return Err(Error::OverlappingPrefixes(
                    a.to_string(),
                    b.to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn overlaps_v4(a: &Ipv4Network, b: &Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

fn overlaps_v6(a: &Ipv6Network, b: &Ipv6Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

impl L3Config {
    pub fn new() -> L3Config {
        Default::default()
    }

    pub fn medium(mut self, medium: Medium) -> Result<L3Config> {
        if self.is_unnumbered() && medium != Medium::PointToPoint {
            return Err(Error::Invalid(format!(
                "unnumbered addressing requires a p2p medium, not {medium}"
            )));
        }
        self.medium = Some(medium);
        Ok(self)
    }

    /*
     * Give the port its own prefixes, e.g. "10.0.0.1/31".  The first IPv4
     * prefix becomes the primary address and the rest are secondaries.
     */
    pub fn numbered<S: AsRef<str>>(
        mut self,
        ipv4: &[S],
        ipv6: &[S],
    ) -> Result<L3Config> {
        if ipv4.is_empty() && ipv6.is_empty() {
            return Err(Error::Invalid(
                "numbered addressing requires at least one prefix".into(),
            ));
        }

        let ipv4: Vec<Ipv4Network> = parse_prefixes("IPv4 prefix", ipv4)?;
        let ipv6: Vec<Ipv6Network> = parse_prefixes("IPv6 prefix", ipv6)?;

        check_disjoint(&ipv4, |a, b| a == b, overlaps_v4)?;
        check_disjoint(&ipv6, |a, b| a == b, overlaps_v6)?;

        self.addressing = Some(Addressing::Numbered { ipv4, ipv6 });
        Ok(self)
    }

    /*
     * Borrow the address of a loopback interface.
     */
    pub fn unnumbered(mut self, loopback: &str) -> Result<L3Config> {
        let lo = InterfaceName::parse_loopback(loopback)?;

        if self.medium != Some(Medium::PointToPoint) {
            return Err(Error::Invalid(
                "unnumbered addressing requires a p2p medium".into(),
            ));
        }

        self.addressing = Some(Addressing::Unnumbered(lo));
        Ok(self)
    }

    pub fn has_medium(&self) -> bool {
        self.medium.is_some()
    }

    pub fn is_unnumbered(&self) -> bool {
        matches!(self.addressing, Some(Addressing::Unnumbered(_)))
    }

    pub(crate) fn fold(&self, base: &mut Map<String, Value>) {
        base.insert("layer".into(), json!("Layer3"));
        if let Some(m) = self.medium {
            base.insert("medium".into(), json!(m.to_string()));
        }
    }

    /*
     * The unnumbered source must already be on the device; nothing else here
     * refers outside the parent interface.
     */
    pub async fn check_dependencies(&self, o: &dyn Oracle) -> Result<()> {
        if let Some(Addressing::Unnumbered(lo)) = &self.addressing {
            require(o, format!("unnumbered source {lo}"), lo.path()).await?;
        }
        Ok(())
    }

    pub fn compile(&self, name: &InterfaceName, vrf: &str) -> Updates {
        let mut out = Updates::new();
        let id = name.to_string();

        match &self.addressing {
            None => (),
            Some(Addressing::Unnumbered(lo)) => {
                out.push(Update::replace(
                    path::ipv4_if(vrf, &id),
                    json!({ "id": id, "unnumbered": lo.to_string() }),
                ));
            }
            Some(Addressing::Numbered { ipv4, ipv6 }) => {
                if !ipv4.is_empty() {
                    let addrs = ipv4
                        .iter()
                        .enumerate()
                        .map(|(i, a)| {
                            let t = match i {
                                0 => "primary",
                                _ => "secondary",
                            };
                            json!({ "addr": a.to_string(), "type": t })
                        })
                        .collect::<Vec<_>>();

                    out.push(Update::replace(
                        path::ipv4_if(vrf, &id),
                        json!({
                            "id": id,
                            "addr-items": { "Addr-list": addrs },
                        }),
                    ));
                }

                if !ipv6.is_empty() {
                    let addrs = ipv6
                        .iter()
                        .map(|a| json!({ "addr": a.to_string() }))
                        .collect::<Vec<_>>();

                    out.push(Update::replace(
                        path::ipv6_if(vrf, &id),
                        json!({
                            "id": id,
                            "addr-items": { "Addr-list": addrs },
                        }),
                    ));
                }
            }
        }

        out
    }
}
